//! Types for blob storage access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the blob store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid JSON in {location}: {message}")]
    Decode { location: String, message: String },

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("invalid blob address: {0}")]
    InvalidAddress(String),
}

impl StorageError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Timeout
        } else {
            StorageError::Transport(err.to_string())
        }
    }
}

/// One addressable object in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Container (namespace) name.
    pub container: String,
    /// Object path inside the container, `/`-separated.
    pub path: String,
}

impl StorageLocation {
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

/// Trait for blob store backends.
///
/// Each call performs exactly one remote request and holds no connection
/// once it returns.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Whether the object currently exists.
    ///
    /// A missing object is `Ok(false)`, never an error. Errors are reserved
    /// for transport and authorization failures.
    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError>;

    /// Download the object and decode it as JSON.
    async fn fetch_json(&self, location: &StorageLocation) -> Result<Value, StorageError>;
}
