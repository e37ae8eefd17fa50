//! Authorization Client
//!
//! The injected capability that talks to the authorization server: turn a
//! refresh token or authorization code into a new credential, and build the
//! user-facing authorization URL.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{
    create_error_from_response, ConfigurationError, LifecycleError, ProtocolError,
};
use crate::transport::{FormRequest, HttpTransport};
use crate::types::{now_ms, ClientAuthMethod, ClientConfig, Credential, TokenResponse};

/// Authorization server interface (for dependency injection).
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Exchange a refresh token for a new credential.
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, LifecycleError>;

    /// Exchange an authorization code for a credential.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, LifecycleError>;

    /// Build the authorization URL to send the user to.
    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, LifecycleError>;
}

/// Generic RFC 6749 token endpoint client over an injected transport.
pub struct HttpAuthorizationClient<T: HttpTransport> {
    config: ClientConfig,
    transport: Arc<T>,
}

impl<T: HttpTransport> HttpAuthorizationClient<T> {
    /// Create a new client.
    pub fn new(config: ClientConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    fn encode_form(params: &[(&str, &str)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn build_body(&self, mut params: Vec<(&str, String)>) -> String {
        if self.config.credentials.auth_method == ClientAuthMethod::ClientSecretPost {
            params.push(("client_id", self.config.credentials.client_id.clone()));
            if let Some(secret) = &self.config.credentials.client_secret {
                params.push(("client_secret", secret.expose_secret().to_string()));
            }
        }

        let borrowed: Vec<(&str, &str)> =
            params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Self::encode_form(&borrowed)
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());

        if self.config.credentials.auth_method == ClientAuthMethod::ClientSecretBasic {
            if let Some(secret) = &self.config.credentials.client_secret {
                let credentials = format!(
                    "{}:{}",
                    self.config.credentials.client_id,
                    secret.expose_secret()
                );
                headers.insert(
                    "authorization".to_string(),
                    format!("Basic {}", BASE64.encode(credentials)),
                );
            }
        }

        headers
    }

    async fn request_credential(&self, body: String) -> Result<Credential, LifecycleError> {
        let request = FormRequest {
            url: self.config.provider.token_endpoint.clone(),
            headers: self.build_headers(),
            body,
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.post_form(request).await?;

        if !(200..300).contains(&response.status) {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| {
                LifecycleError::Protocol(ProtocolError::InvalidJson {
                    message: e.to_string(),
                })
            })?;

        Ok(Credential::from_response(token_response, now_ms()))
    }
}

#[async_trait]
impl<T: HttpTransport> AuthorizationClient for HttpAuthorizationClient<T> {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, LifecycleError> {
        let body = self.build_body(vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ]);
        self.request_credential(body).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, LifecycleError> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
        ];
        // Public clients still identify themselves on code exchange.
        if self.config.credentials.auth_method != ClientAuthMethod::ClientSecretPost {
            params.push(("client_id", self.config.credentials.client_id.clone()));
        }
        let body = self.build_body(params);
        self.request_credential(body).await
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, LifecycleError> {
        let mut url = url::Url::parse(&self.config.provider.authorization_endpoint).map_err(
            |_| {
                LifecycleError::Configuration(ConfigurationError::InvalidEndpoint {
                    url: self.config.provider.authorization_endpoint.clone(),
                })
            },
        )?;

        let scopes = if scopes.is_empty() {
            &self.config.default_scopes
        } else {
            scopes
        };

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.credentials.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            if !scopes.is_empty() {
                query.append_pair("scope", &scopes.join(" "));
            }
        }

        Ok(url.into())
    }
}

/// Mock authorization client for testing.
///
/// Tracks call history and the maximum number of concurrently running
/// refresh calls, which is what the single-flight and scheduler tests
/// assert on.
#[derive(Default)]
pub struct MockAuthorizationClient {
    refresh_history: Mutex<Vec<String>>,
    exchange_history: Mutex<Vec<(String, String)>>,
    next_credential: Mutex<Option<Credential>>,
    next_error: Mutex<Option<LifecycleError>>,
    refresh_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    serial: AtomicUsize,
}

impl MockAuthorizationClient {
    /// Create a new mock client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the credential returned by the next refresh/exchange call.
    pub fn set_next_credential(&self, credential: Credential) -> &Self {
        *self.next_credential.lock().unwrap() = Some(credential);
        self
    }

    /// Set the error returned by the next refresh/exchange call.
    pub fn set_next_error(&self, error: LifecycleError) -> &Self {
        *self.next_error.lock().unwrap() = Some(error);
        self
    }

    /// Make every refresh call take `delay` before completing.
    pub fn set_refresh_delay(&self, delay: Duration) -> &Self {
        *self.refresh_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Refresh tokens passed to `refresh`, in order.
    pub fn refresh_history(&self) -> Vec<String> {
        self.refresh_history.lock().unwrap().clone()
    }

    /// Number of refresh calls observed.
    pub fn refresh_count(&self) -> usize {
        self.refresh_history.lock().unwrap().len()
    }

    /// (code, redirect_uri) pairs passed to `exchange_code`.
    pub fn exchange_history(&self) -> Vec<(String, String)> {
        self.exchange_history.lock().unwrap().clone()
    }

    /// Maximum number of refresh calls that were ever running at once.
    pub fn max_concurrent_refreshes(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn default_credential(&self) -> Credential {
        let n = self.serial.fetch_add(1, Ordering::SeqCst);
        Credential {
            access_token: format!("refreshed-token-{}", n),
            refresh_token: Some("rotated-refresh-token".to_string()),
            expires_at: now_ms() + 3_600_000,
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }

    async fn produce(&self) -> Result<Credential, LifecycleError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Err(error);
        }
        if let Some(credential) = self.next_credential.lock().unwrap().take() {
            return Ok(credential);
        }
        Ok(self.default_credential())
    }
}

#[async_trait]
impl AuthorizationClient for MockAuthorizationClient {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential, LifecycleError> {
        self.refresh_history
            .lock()
            .unwrap()
            .push(refresh_token.to_string());
        self.produce().await
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<Credential, LifecycleError> {
        self.exchange_history
            .lock()
            .unwrap()
            .push((code.to_string(), redirect_uri.to_string()));
        self.produce().await
    }

    fn authorization_url(
        &self,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<String, LifecycleError> {
        Ok(format!(
            "https://mock.example.com/authorize?redirect_uri={}&scope={}",
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" "))
        ))
    }
}
