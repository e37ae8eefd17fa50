//! HTTP Transport
//!
//! The injected HTTP boundary for token endpoint calls. Token endpoints are
//! only ever POSTed urlencoded forms, so the interface is deliberately
//! narrower than a general HTTP client.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{LifecycleError, NetworkError, ProtocolError};

/// Maximum token endpoint response size accepted (1 MiB).
const MAX_RESPONSE_SIZE: usize = 1_048_576;

/// An urlencoded form POST to a token endpoint.
#[derive(Clone, Debug)]
pub struct FormRequest {
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Urlencoded form body.
    pub body: String,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

/// HTTP response from a token endpoint.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers (lowercased names).
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST an urlencoded form and return the response.
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, LifecycleError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpTransport {
    /// Create a transport with default settings.
    pub fn new() -> Result<Self, LifecycleError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a transport with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, LifecycleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // Token endpoints must not silently redirect.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                LifecycleError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, LifecycleError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut builder = self.client.post(&request.url).timeout(timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            if e.is_timeout() {
                LifecycleError::Network(NetworkError::Timeout { timeout })
            } else {
                LifecycleError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            }
        })?;

        let status = response.status().as_u16();

        if (300..400).contains(&status) {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(LifecycleError::Protocol(ProtocolError::UnexpectedRedirect {
                location,
            }));
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.as_str().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_SIZE {
                return Err(LifecycleError::Protocol(ProtocolError::ResponseTooLarge {
                    size: len as usize,
                }));
            }
        }

        let body = response.text().await.map_err(|e| {
            LifecycleError::Protocol(ProtocolError::InvalidResponse {
                message: e.to_string(),
            })
        })?;

        if body.len() > MAX_RESPONSE_SIZE {
            return Err(LifecycleError::Protocol(ProtocolError::ResponseTooLarge {
                size: body.len(),
            }));
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: std::sync::Mutex<Vec<HttpResponse>>,
    request_history: std::sync::Mutex<Vec<FormRequest>>,
}

impl MockHttpTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    /// Queue a JSON response with the given status.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: serde_json::to_string(body).unwrap(),
        })
    }

    /// Get the request history.
    pub fn requests(&self) -> Vec<FormRequest> {
        self.request_history.lock().unwrap().clone()
    }

    /// Get the most recent request.
    pub fn last_request(&self) -> Option<FormRequest> {
        self.request_history.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn post_form(&self, request: FormRequest) -> Result<HttpResponse, LifecycleError> {
        self.request_history.lock().unwrap().push(request);

        self.responses.lock().unwrap().pop().ok_or_else(|| {
            LifecycleError::Network(NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            })
        })
    }
}
