//! Credential Types
//!
//! The cached/persisted credential unit and the wire-level token response
//! it is built from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Lifetime assumed when the authorization server omits `expires_in`.
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Token response from the authorization server.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// The credential managed by this crate: access/refresh token pair plus
/// expiry metadata.
///
/// A credential is only ever constructed through [`Credential::from_response`]
/// or deserialized from a blob that was written that way, so `access_token`
/// and `expires_at` are always jointly present.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Opaque bearer string.
    pub access_token: String,
    /// Refresh token; absent means the credential cannot be renewed once
    /// expired without an externally supplied refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry instant, epoch milliseconds.
    pub expires_at: u64,
    /// Advisory token type.
    pub token_type: String,
    /// Advisory scope string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Credential {
    /// Build a credential from a token response, computing `expires_at` from
    /// the server-reported lifetime. Servers that omit `expires_in` get the
    /// fixed default lifetime.
    pub fn from_response(response: TokenResponse, now: u64) -> Self {
        let lifetime_secs = response.expires_in.unwrap_or(DEFAULT_LIFETIME_SECS);
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            // Saturate rather than trust the server to report a sane
            // lifetime; an absurd `expires_in` becomes "never expires".
            expires_at: now.saturating_add(lifetime_secs.saturating_mul(1000)),
            token_type: response.token_type,
            scope: response.scope,
        }
    }

    /// Freshness policy: fresh iff `now < expires_at - grace_period`.
    ///
    /// A zero grace period means refresh happens only once the token has
    /// strictly expired; a positive grace period triggers proactive refresh
    /// ahead of expiry.
    pub fn is_fresh(&self, now: u64, grace_period: Duration) -> bool {
        let grace_ms = grace_period.as_millis() as u64;
        now < self.expires_at.saturating_sub(grace_ms)
    }

    /// Remaining lifetime, zero if already expired.
    pub fn remaining(&self, now: u64) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now))
    }

    /// Format as an Authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}
