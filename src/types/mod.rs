//! Data Types
//!
//! Credential data model and configuration types.

mod config;
mod credential;

pub use config::{
    ClientAuthMethod, ClientConfig, ClientCredentials, ManagerConfig, ProviderConfig,
    DEFAULT_OPERATION_TIMEOUT,
};
pub use credential::{now_ms, Credential, TokenResponse, DEFAULT_LIFETIME_SECS};
