//! Lifecycle Events
//!
//! Best-effort notifications fired by the manager around refresh operations.
//! Dispatch goes through a broadcast channel, so observers run in their own
//! tasks and a misbehaving observer can never abort the token operation that
//! produced the event.

use tokio::sync::broadcast;

use crate::types::Credential;

/// Notification fired by the lifecycle manager. Per logical operation the
/// order is `RefreshStarted`, then either `Refreshed` or `RefreshFailed`,
/// each at most once.
#[derive(Clone, Debug)]
pub enum TokenEvent {
    /// A refresh (or initial fetch) is about to run.
    RefreshStarted,
    /// A refresh completed and produced a new credential.
    Refreshed { credential: Credential },
    /// A refresh or persistence step failed.
    RefreshFailed { message: String },
}

/// Broadcast bus for lifecycle events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TokenEvent>,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.sender.subscribe()
    }

    /// Emit an event. Lagging or absent receivers are not an error.
    pub fn emit(&self, event: TokenEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit(TokenEvent::RefreshStarted);
    }

    #[tokio::test]
    async fn test_subscriber_sees_events_in_order() {
        let bus = EventBus::new(4);
        let mut receiver = bus.subscribe();

        bus.emit(TokenEvent::RefreshStarted);
        bus.emit(TokenEvent::RefreshFailed {
            message: "provider down".to_string(),
        });

        assert!(matches!(
            receiver.try_recv().unwrap(),
            TokenEvent::RefreshStarted
        ));
        assert!(matches!(
            receiver.try_recv().unwrap(),
            TokenEvent::RefreshFailed { .. }
        ));
        assert!(receiver.try_recv().is_err());
    }
}
