//! Types for bearer-token credentials.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Errors that can occur while obtaining a token.
#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    Request(String),

    #[error("token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed token response: {0}")]
    Malformed(String),

    #[error("cannot build HTTP client: {0}")]
    Client(String),
}

/// A bearer token and its expiry.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw token, for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True when the token expires within `margin` of `now`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .is_none_or(|refresh_at| refresh_at <= now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
