//! Configuration Types
//!
//! Authorization client and lifecycle manager configuration.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default timeout applied to refresh and storage calls.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Authorization server endpoint configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Authorization endpoint URL.
    pub authorization_endpoint: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
}

/// Client credentials for token endpoint authentication.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: String,
    /// Client secret (for confidential clients).
    pub client_secret: Option<SecretString>,
    /// Client authentication method.
    pub auth_method: ClientAuthMethod,
}

impl Default for ClientCredentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_method: ClientAuthMethod::ClientSecretBasic,
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

/// Client authentication method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// client_id and client_secret in the request body.
    ClientSecretPost,
    /// HTTP Basic Authentication header.
    ClientSecretBasic,
    /// No client authentication (public client).
    None,
}

impl Default for ClientAuthMethod {
    fn default() -> Self {
        Self::ClientSecretBasic
    }
}

/// Configuration for the HTTP authorization client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Provider endpoints.
    pub provider: ProviderConfig,
    /// Client credentials.
    pub credentials: ClientCredentials,
    /// Default scopes to request.
    pub default_scopes: Vec<String>,
    /// HTTP timeout for token endpoint calls.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            credentials: ClientCredentials::default(),
            default_scopes: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Lifecycle manager configuration.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Lead time before actual expiry at which proactive refresh triggers.
    /// Zero means refresh only once the token has strictly expired.
    pub grace_period: Duration,
    /// Background sync period. `None` disables the scheduler.
    pub sync_interval: Option<Duration>,
    /// Statically configured refresh token, used when neither the cached nor
    /// the stored credential carries one.
    pub fallback_refresh_token: Option<String>,
    /// Timeout applied to each refresh and storage call.
    pub operation_timeout: Duration,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::ZERO,
            sync_interval: None,
            fallback_refresh_token: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            event_capacity: 16,
        }
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("grace_period", &self.grace_period)
            .field("sync_interval", &self.sync_interval)
            .field(
                "fallback_refresh_token",
                &self.fallback_refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("operation_timeout", &self.operation_timeout)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.grace_period, Duration::ZERO);
        assert!(config.sync_interval.is_none());
        assert!(config.fallback_refresh_token.is_none());
        assert_eq!(config.operation_timeout, DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn test_client_credentials_debug_redacts_secret() {
        let credentials = ClientCredentials {
            client_id: "my-client".to_string(),
            client_secret: Some(SecretString::new("hunter2".to_string())),
            auth_method: ClientAuthMethod::ClientSecretBasic,
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("my-client"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_manager_config_debug_redacts_fallback_token() {
        let config = ManagerConfig {
            fallback_refresh_token: Some("static-refresh".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("static-refresh"));
    }
}
