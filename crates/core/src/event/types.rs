//! Inbound event types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event type sent once when a webhook subscription is created.
pub const SUBSCRIPTION_VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// Errors that make an event permanently unprocessable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed event: invalid JSON: {0}")]
    InvalidJson(String),

    #[error("malformed event: missing data.url")]
    MissingUrl,

    #[error("malformed event: url {url} does not contain {marker}")]
    MarkerNotFound { url: String, marker: String },

    #[error("malformed event: url {0} does not name a container and a path")]
    IncompleteAddress(String),
}

/// An Event Grid event, as delivered to a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventGridEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl EventGridEvent {
    /// The changed object's address, if present.
    pub fn url(&self) -> Option<&str> {
        self.data.get("url").and_then(Value::as_str)
    }

    pub fn is_subscription_validation(&self) -> bool {
        self.event_type == SUBSCRIPTION_VALIDATION_EVENT
    }

    /// Code to echo back during the subscription handshake.
    pub fn validation_code(&self) -> Option<&str> {
        self.data.get("validationCode").and_then(Value::as_str)
    }
}
