//! Token Lifecycle Manager
//!
//! Caches the active credential, decides when it is stale, refreshes it
//! through the injected authorization client, and optionally keeps it fresh
//! from a background task. All refresh traffic is funneled through a single
//! async mutex so concurrent callers never trigger duplicate refreshes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::error::{
    ConfigurationError, LifecycleError, NetworkError, TokenError,
};
use crate::events::{EventBus, TokenEvent};
use crate::refresh::AuthorizationClient;
use crate::storage::CredentialStorage;
use crate::types::{now_ms, Credential, ManagerConfig};

/// Shared state between the manager and its background sync task.
struct ManagerState {
    refresher: Arc<dyn AuthorizationClient>,
    storage: Option<Arc<dyn CredentialStorage>>,
    config: ManagerConfig,
    cache: RwLock<Option<Credential>>,
    refresh_gate: Mutex<()>,
    events: EventBus,
}

impl ManagerState {
    fn is_fresh(&self, credential: &Credential) -> bool {
        credential.is_fresh(now_ms(), self.config.grace_period)
    }

    async fn cached(&self) -> Option<Credential> {
        self.cache.read().await.clone()
    }

    /// Load the persisted credential, treating an unreadable one as absent.
    async fn load_stored(&self) -> Result<Option<Credential>, LifecycleError> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        match storage.load().await {
            Ok(credential) => Ok(credential),
            Err(error) if error.indicates_unusable_stored_credential() => {
                warn!(%error, "stored credential is unreadable, treating as absent");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn store_cache(&self, credential: &Credential) {
        *self.cache.write().await = Some(credential.clone());
    }

    async fn persist(&self, credential: &Credential) -> Result<(), LifecycleError> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        match timeout(self.config.operation_timeout, storage.save(credential)).await {
            Ok(result) => result,
            Err(_) => Err(LifecycleError::Network(NetworkError::Timeout {
                timeout: self.config.operation_timeout,
            })),
        }
    }

    /// Return a fresh credential, refreshing through the gate if needed.
    ///
    /// With `force` set the refresh happens even if the cached credential
    /// is still fresh.
    #[instrument(skip(self))]
    async fn ensure_fresh(&self, force: bool) -> Result<Credential, LifecycleError> {
        if !force {
            if let Some(credential) = self.cached().await {
                if self.is_fresh(&credential) {
                    return Ok(credential);
                }
            }
        }

        let _guard = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited on the gate.
        let mut previous = self.cached().await;
        if !force {
            if let Some(credential) = &previous {
                if self.is_fresh(credential) {
                    return Ok(credential.clone());
                }
            }
        }

        // The cache is absent or stale. Another instance sharing the
        // backend may have persisted a newer credential, possibly with a
        // rotated refresh token, so prefer what storage has.
        if previous
            .as_ref()
            .map_or(true, |credential| !self.is_fresh(credential))
        {
            if let Some(stored) = self.load_stored().await? {
                self.store_cache(&stored).await;
                previous = Some(stored);
            }
        }

        if !force {
            if let Some(credential) = &previous {
                if self.is_fresh(credential) {
                    return Ok(credential.clone());
                }
            }
        }

        let Some(refresh_token) = previous
            .as_ref()
            .and_then(|credential| credential.refresh_token.clone())
            .or_else(|| self.config.fallback_refresh_token.clone())
        else {
            let error = LifecycleError::Token(TokenError::MissingRefreshToken);
            self.events.emit(TokenEvent::RefreshFailed {
                message: error.to_string(),
            });
            return Err(error);
        };

        self.events.emit(TokenEvent::RefreshStarted);
        debug!("refreshing credential");

        let result = match timeout(
            self.config.operation_timeout,
            self.refresher.refresh(&refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LifecycleError::Network(NetworkError::Timeout {
                timeout: self.config.operation_timeout,
            })),
        };

        match result {
            Ok(mut credential) => {
                // Servers that do not rotate refresh tokens omit the field.
                if credential.refresh_token.is_none() {
                    credential.refresh_token =
                        previous.and_then(|previous| previous.refresh_token);
                }
                self.store_cache(&credential).await;
                // A credential that could not be persisted must not be
                // handed out; the cache and the backend would diverge.
                if let Err(error) = self.persist(&credential).await {
                    *self.cache.write().await = None;
                    self.events.emit(TokenEvent::RefreshFailed {
                        message: error.to_string(),
                    });
                    warn!(%error, "failed to persist refreshed credential");
                    return Err(error);
                }
                self.events.emit(TokenEvent::Refreshed {
                    credential: credential.clone(),
                });
                info!("credential refreshed");
                Ok(credential)
            }
            Err(error) => {
                *self.cache.write().await = None;
                self.events.emit(TokenEvent::RefreshFailed {
                    message: error.to_string(),
                });
                warn!(%error, "credential refresh failed");
                Err(error)
            }
        }
    }
}

/// Manages the lifecycle of a single credential.
pub struct TokenLifecycleManager {
    state: Arc<ManagerState>,
    sync_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TokenLifecycleManager {
    /// Create a manager without persistent storage.
    pub fn new(refresher: Arc<dyn AuthorizationClient>, config: ManagerConfig) -> Self {
        Self::build(refresher, None, config)
    }

    /// Create a manager that persists credentials to `storage`.
    pub fn with_storage(
        refresher: Arc<dyn AuthorizationClient>,
        storage: Arc<dyn CredentialStorage>,
        config: ManagerConfig,
    ) -> Self {
        Self::build(refresher, Some(storage), config)
    }

    fn build(
        refresher: Arc<dyn AuthorizationClient>,
        storage: Option<Arc<dyn CredentialStorage>>,
        config: ManagerConfig,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            state: Arc::new(ManagerState {
                refresher,
                storage,
                config,
                cache: RwLock::new(None),
                refresh_gate: Mutex::new(()),
                events,
            }),
            sync_task: std::sync::Mutex::new(None),
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TokenEvent> {
        self.state.events.subscribe()
    }

    /// Return a fresh access token, refreshing first if the cached
    /// credential is missing or within the grace period of expiry.
    pub async fn access_token(&self) -> Result<String, LifecycleError> {
        let credential = self.state.ensure_fresh(false).await?;
        Ok(credential.access_token)
    }

    /// Force a refresh regardless of the cached credential's freshness.
    pub async fn refresh(&self) -> Result<Credential, LifecycleError> {
        self.state.ensure_fresh(true).await
    }

    /// Return the current credential without refreshing, if one exists.
    pub async fn token_data(&self) -> Result<Option<Credential>, LifecycleError> {
        if let Some(credential) = self.state.cached().await {
            return Ok(Some(credential));
        }
        let stored = self.state.load_stored().await?;
        if let Some(credential) = &stored {
            self.state.store_cache(credential).await;
        }
        Ok(stored)
    }

    /// Install a credential obtained out of band (e.g. from an initial
    /// authorization flow), caching and persisting it.
    pub async fn install(&self, credential: Credential) -> Result<(), LifecycleError> {
        self.state.store_cache(&credential).await;
        if let Err(error) = self.state.persist(&credential).await {
            *self.state.cache.write().await = None;
            return Err(error);
        }
        Ok(())
    }

    /// Complete an authorization code exchange and install the resulting
    /// credential.
    #[instrument(skip(self, code))]
    pub async fn login(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, LifecycleError> {
        let credential = timeout(
            self.state.config.operation_timeout,
            self.state.refresher.exchange_code(code, redirect_uri),
        )
        .await
        .map_err(|_| {
            LifecycleError::Network(NetworkError::Timeout {
                timeout: self.state.config.operation_timeout,
            })
        })??;

        self.install(credential.clone()).await?;
        self.state.events.emit(TokenEvent::Refreshed {
            credential: credential.clone(),
        });
        Ok(credential)
    }

    /// Start the background sync task. Returns an error if no sync
    /// interval is configured; a no-op if the task is already running.
    pub fn start_background_sync(&self) -> Result<(), LifecycleError> {
        let Some(sync_interval) = self.state.config.sync_interval else {
            return Err(LifecycleError::Configuration(
                ConfigurationError::InvalidConfig {
                    message: "no sync interval configured".to_string(),
                },
            ));
        };

        let mut task = self.sync_task.lock().unwrap();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        *task = Some(tokio::spawn(async move {
            Self::sync_loop(state, sync_interval).await;
        }));
        info!(interval = ?sync_interval, "background sync started");
        Ok(())
    }

    /// Stop the background sync task. Safe to call when not running.
    pub fn stop_background_sync(&self) {
        if let Some(handle) = self.sync_task.lock().unwrap().take() {
            handle.abort();
            info!("background sync stopped");
        }
    }

    /// Stop syncing, clear the cache, and delete the persisted credential.
    pub async fn destroy(&self) -> Result<(), LifecycleError> {
        self.stop_background_sync();
        *self.state.cache.write().await = None;
        if let Some(storage) = &self.state.storage {
            storage.delete().await?;
        }
        Ok(())
    }

    async fn sync_loop(state: Arc<ManagerState>, sync_interval: Duration) {
        let mut ticker = interval(sync_interval);
        // A tick that outlasts its interval (slow refresh) must not be
        // followed by a burst of catch-up ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the caller just configured the
        // manager, so wait a full interval before doing anything.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(error) = state.ensure_fresh(false).await {
                warn!(%error, "background sync failed");
            }
        }
    }
}

impl Drop for TokenLifecycleManager {
    fn drop(&mut self) {
        if let Some(handle) = self.sync_task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
