//! Token Lifecycle Manager
//!
//! Caches, refreshes, persists, and proactively renews OAuth2 credentials.
//!
//! # Features
//!
//! - In-memory credential cache with an expiry grace period
//! - Single-flight token refresh (RFC 6749 Section 6)
//! - Refresh token rotation with fallback preservation
//! - Background sync task with non-overlapping ticks
//! - Pluggable credential storage, including an authenticated-encryption
//!   blob format (AES-256-GCM over an Argon2id-derived key)
//! - Lifecycle event notifications
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use token_lifecycle::{
//!     client_config, token_lifecycle, HttpAuthorizationClient, ReqwestHttpTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = client_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .authorization_endpoint("https://provider.com/authorize")
//!         .token_endpoint("https://provider.com/token")
//!         .add_default_scope("openid")
//!         .build()?;
//!
//!     let transport = Arc::new(ReqwestHttpTransport::new()?);
//!     let refresher = Arc::new(HttpAuthorizationClient::new(config, transport));
//!
//!     let manager = token_lifecycle()
//!         .refresher(refresher)
//!         .grace_period(Duration::from_secs(60))
//!         .sync_interval(Duration::from_secs(300))
//!         .build()?;
//!
//!     manager.login("auth-code", "https://myapp.com/callback").await?;
//!     manager.start_background_sync()?;
//!
//!     let token = manager.access_token().await?;
//!     println!("Bearer {}", token);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several sub-modules:
//!
//! - `types`: Credential, token response, and configuration types
//! - `error`: Error hierarchy with RFC error response mapping
//! - `crypto`: Authenticated encryption for persisted credentials
//! - `transport`: HTTP form-POST transport abstraction
//! - `refresh`: Authorization client (token refresh, code exchange)
//! - `storage`: Credential storage backends
//! - `events`: Lifecycle event bus
//! - `manager`: The token lifecycle manager itself
//! - `builders`: Fluent builders for configuration and the manager

pub mod builders;
pub mod crypto;
pub mod error;
pub mod events;
pub mod manager;
pub mod refresh;
pub mod storage;
pub mod transport;
pub mod types;

// Re-export the manager
pub use manager::TokenLifecycleManager;

// Re-export builders
pub use builders::{
    client_config, token_lifecycle, ClientConfigBuilder, TokenLifecycleManagerBuilder,
};

// Re-export errors
pub use error::{
    create_error_from_response, parse_error_response, ConfigurationError, CryptoError,
    LifecycleError, LifecycleResult, NetworkError, ProtocolError, ProviderError,
    ProviderErrorResponse, StorageError, TokenError,
};

// Re-export types
pub use types::{
    now_ms, ClientAuthMethod, ClientConfig, ClientCredentials, Credential, ManagerConfig,
    ProviderConfig, TokenResponse,
};

// Re-export refresh clients
pub use refresh::{AuthorizationClient, HttpAuthorizationClient, MockAuthorizationClient};

// Re-export transport
pub use transport::{
    FormRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export storage backends
pub use storage::{
    BlobCredentialStorage, BlobStorage, CredentialStorage, InMemoryCredentialStorage,
    MemoryBlobStorage, MockCredentialStorage,
};

// Re-export events
pub use events::{EventBus, TokenEvent};
