//! Error Types
//!
//! Error hierarchy for the token lifecycle manager and its capabilities.

use std::time::Duration;
use thiserror::Error;

/// Root error type for token lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl LifecycleError {
    /// Check if the failed operation is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::Provider(ProviderError::ServerError { .. }) => true,
            Self::Provider(ProviderError::TemporarilyUnavailable { .. }) => true,
            _ => false,
        }
    }

    /// Check if the error means the user must re-authorize from scratch.
    pub fn needs_reauth(&self) -> bool {
        matches!(
            self,
            Self::Token(TokenError::MissingRefreshToken)
                | Self::Token(TokenError::RefreshFailed { .. })
                | Self::Provider(ProviderError::InvalidGrant { .. })
        )
    }

    /// Check if the error indicates a persisted credential that cannot be
    /// used (failed decryption or corrupted serialization). The manager
    /// treats such a load as "storage returned absent" rather than failing,
    /// since a damaged cache file must not permanently block operation.
    pub fn indicates_unusable_stored_credential(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::DecryptionFailed)
                | Self::Storage(StorageError::CorruptedData { .. })
        )
    }
}

/// Configuration/builder validation error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Token lifecycle error.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No refresh token available from cache, storage, or configuration")]
    MissingRefreshToken,

    #[error("Token refresh failed: {message}")]
    RefreshFailed { message: String },
}

/// Network/transport error.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl NetworkError {
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Storage capability error.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Delete failed: {message}")]
    DeleteFailed { message: String },

    #[error("Corrupted data: {message}")]
    CorruptedData { message: String },
}

/// Credential encryption error.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {message}")]
    EncryptionFailed { message: String },

    #[error("Decryption failed: authentication tag mismatch or malformed blob")]
    DecryptionFailed,

    #[error("Key derivation failed: {message}")]
    KeyDerivationFailed { message: String },
}

/// Response parsing error.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Authorization server error (RFC 6749 Section 5.2).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid client credentials")]
    InvalidClient { error_description: Option<String> },

    #[error("Invalid grant: {message}")]
    InvalidGrant { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid scope: {scope}")]
    InvalidScope { scope: String },

    #[error("Unauthorized client")]
    UnauthorizedClient { error_description: Option<String> },

    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType { grant_type: String },

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("Server temporarily unavailable")]
    TemporarilyUnavailable { retry_after: Option<Duration> },
}

/// Result type for token lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Error response body from the authorization server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProviderErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

/// Map a token endpoint error response to an error type.
pub fn map_provider_error(response: &ProviderErrorResponse) -> ProviderError {
    match response.error.as_str() {
        "invalid_client" => ProviderError::InvalidClient {
            error_description: response.error_description.clone(),
        },
        "invalid_grant" => ProviderError::InvalidGrant {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Invalid grant".to_string()),
        },
        "invalid_request" => ProviderError::InvalidRequest {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Invalid request".to_string()),
        },
        "invalid_scope" => ProviderError::InvalidScope {
            scope: response.error_description.clone().unwrap_or_default(),
        },
        "unauthorized_client" => ProviderError::UnauthorizedClient {
            error_description: response.error_description.clone(),
        },
        "unsupported_grant_type" => ProviderError::UnsupportedGrantType {
            grant_type: response.error_description.clone().unwrap_or_default(),
        },
        "server_error" => ProviderError::ServerError {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| "Server error".to_string()),
        },
        "temporarily_unavailable" => {
            ProviderError::TemporarilyUnavailable { retry_after: None }
        }
        _ => ProviderError::InvalidRequest {
            message: response
                .error_description
                .clone()
                .unwrap_or_else(|| response.error.clone()),
        },
    }
}

/// Parse an error response from an HTTP body.
pub fn parse_error_response(body: &str) -> Option<ProviderErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create an error from a non-success HTTP token endpoint response.
pub fn create_error_from_response(status: u16, body: &str) -> LifecycleError {
    if let Some(response) = parse_error_response(body) {
        return LifecycleError::Provider(map_provider_error(&response));
    }

    let error = match status {
        400 => ProviderError::InvalidRequest {
            message: format!("Bad request: {}", truncate(body, 256)),
        },
        401 => ProviderError::InvalidClient {
            error_description: Some("Unauthorized".to_string()),
        },
        403 => ProviderError::UnauthorizedClient {
            error_description: Some("Forbidden".to_string()),
        },
        429 => ProviderError::TemporarilyUnavailable {
            retry_after: Some(Duration::from_secs(60)),
        },
        _ => ProviderError::ServerError {
            message: format!("HTTP {}: {}", status, truncate(body, 256)),
        },
    };

    LifecycleError::Provider(error)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(LifecycleError::Network(NetworkError::Timeout {
            timeout: Duration::from_secs(30)
        })
        .is_retryable());
        assert!(LifecycleError::Provider(ProviderError::ServerError {
            message: "boom".to_string()
        })
        .is_retryable());
        assert!(!LifecycleError::Token(TokenError::MissingRefreshToken).is_retryable());
    }

    #[test]
    fn test_needs_reauth() {
        assert!(LifecycleError::Token(TokenError::MissingRefreshToken).needs_reauth());
        assert!(LifecycleError::Provider(ProviderError::InvalidGrant {
            message: "expired".to_string()
        })
        .needs_reauth());
        assert!(!LifecycleError::Crypto(CryptoError::DecryptionFailed).needs_reauth());
    }

    #[test]
    fn test_unusable_stored_credential_classification() {
        assert!(LifecycleError::Crypto(CryptoError::DecryptionFailed)
            .indicates_unusable_stored_credential());
        assert!(LifecycleError::Storage(StorageError::CorruptedData {
            message: "not json".to_string()
        })
        .indicates_unusable_stored_credential());
        assert!(!LifecycleError::Storage(StorageError::ReadFailed {
            message: "io".to_string()
        })
        .indicates_unusable_stored_credential());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":"invalid_grant","error_description":"The token is revoked"}"#;
        let response = parse_error_response(body).unwrap();
        assert_eq!(response.error, "invalid_grant");
        assert_eq!(
            response.error_description,
            Some("The token is revoked".to_string())
        );
    }

    #[test]
    fn test_create_error_from_response_maps_rfc_error() {
        let body = r#"{"error":"invalid_grant"}"#;
        let error = create_error_from_response(400, body);
        assert!(matches!(
            error,
            LifecycleError::Provider(ProviderError::InvalidGrant { .. })
        ));
    }

    #[test]
    fn test_create_error_from_response_status_fallback() {
        let error = create_error_from_response(503, "upstream down");
        assert!(matches!(
            error,
            LifecycleError::Provider(ProviderError::ServerError { .. })
        ));
        assert!(error.to_string().contains("503"));
    }
}
