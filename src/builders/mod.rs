//! Builders
//!
//! Fluent builders for the client configuration and the manager itself.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{ConfigurationError, LifecycleError};
use crate::manager::TokenLifecycleManager;
use crate::refresh::AuthorizationClient;
use crate::storage::CredentialStorage;
use crate::types::{
    ClientAuthMethod, ClientConfig, ClientCredentials, ManagerConfig, ProviderConfig,
    DEFAULT_OPERATION_TIMEOUT,
};

/// Client configuration builder.
#[derive(Default)]
pub struct ClientConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: Option<ClientAuthMethod>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    default_scopes: Vec<String>,
    timeout: Duration,
}

impl ClientConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_OPERATION_TIMEOUT,
            ..Default::default()
        }
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set default scopes.
    pub fn default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Add a default scope.
    pub fn add_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scopes.push(scope.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> Result<ClientConfig, LifecycleError> {
        let client_id = self.client_id.ok_or_else(|| {
            LifecycleError::Configuration(ConfigurationError::MissingField {
                field: "client_id".to_string(),
            })
        })?;

        let authorization_endpoint = self.authorization_endpoint.ok_or_else(|| {
            LifecycleError::Configuration(ConfigurationError::MissingField {
                field: "authorization_endpoint".to_string(),
            })
        })?;

        let token_endpoint = self.token_endpoint.ok_or_else(|| {
            LifecycleError::Configuration(ConfigurationError::MissingField {
                field: "token_endpoint".to_string(),
            })
        })?;

        let auth_method = self.auth_method.unwrap_or(ClientAuthMethod::ClientSecretBasic);

        // Confidential auth methods need a secret to authenticate with.
        if matches!(
            auth_method,
            ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost
        ) && self.client_secret.is_none()
        {
            return Err(LifecycleError::Configuration(
                ConfigurationError::MissingField {
                    field: "client_secret".to_string(),
                },
            ));
        }

        Ok(ClientConfig {
            credentials: ClientCredentials {
                client_id,
                client_secret: self.client_secret,
                auth_method,
            },
            provider: ProviderConfig {
                authorization_endpoint,
                token_endpoint,
            },
            default_scopes: self.default_scopes,
            timeout: self.timeout,
        })
    }
}

/// Create a new client configuration builder.
pub fn client_config() -> ClientConfigBuilder {
    ClientConfigBuilder::new()
}

/// Token lifecycle manager builder.
pub struct TokenLifecycleManagerBuilder {
    refresher: Option<Arc<dyn AuthorizationClient>>,
    storage: Option<Arc<dyn CredentialStorage>>,
    config: ManagerConfig,
}

impl TokenLifecycleManagerBuilder {
    /// Create new manager builder.
    pub fn new() -> Self {
        Self {
            refresher: None,
            storage: None,
            config: ManagerConfig::default(),
        }
    }

    /// Set the authorization client used for refreshes and code exchanges.
    pub fn refresher(mut self, refresher: Arc<dyn AuthorizationClient>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Set the credential storage backend.
    pub fn storage(mut self, storage: Arc<dyn CredentialStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Refresh this long before the credential actually expires.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.config.grace_period = grace_period;
        self
    }

    /// Enable background sync at this interval.
    pub fn sync_interval(mut self, sync_interval: Duration) -> Self {
        self.config.sync_interval = Some(sync_interval);
        self
    }

    /// Set the refresh token used when no credential carries one.
    pub fn fallback_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.config.fallback_refresh_token = Some(token.into());
        self
    }

    /// Set the per-operation timeout for refresh and exchange calls.
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the manager.
    pub fn build(self) -> Result<TokenLifecycleManager, LifecycleError> {
        let refresher = self.refresher.ok_or_else(|| {
            LifecycleError::Configuration(ConfigurationError::MissingField {
                field: "refresher".to_string(),
            })
        })?;

        Ok(match self.storage {
            Some(storage) => {
                TokenLifecycleManager::with_storage(refresher, storage, self.config)
            }
            None => TokenLifecycleManager::new(refresher, self.config),
        })
    }
}

impl Default for TokenLifecycleManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a new token lifecycle manager builder.
pub fn token_lifecycle() -> TokenLifecycleManagerBuilder {
    TokenLifecycleManagerBuilder::new()
}
