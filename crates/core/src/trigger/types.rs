//! Trigger types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TriggerConfig;

/// Errors that can occur while starting the downstream job.
#[derive(Debug, Clone, Error)]
pub enum TriggerError {
    #[error("trigger is not configured")]
    NotConfigured,

    #[error("failed to obtain credential: {0}")]
    Credential(String),

    #[error("start rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("start request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

impl TriggerError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TriggerError::Timeout
        } else {
            TriggerError::Transport(err.to_string())
        }
    }
}

/// Identifies the compute job to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub subscription_id: String,
    pub resource_group: String,
    pub container_group_name: String,
}

impl From<&TriggerConfig> for TriggerRequest {
    fn from(config: &TriggerConfig) -> Self {
        Self {
            subscription_id: config.subscription_id.clone(),
            resource_group: config.resource_group.clone(),
            container_group_name: config.container_group_name.clone(),
        }
    }
}

impl std::fmt::Display for TriggerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.container_group_name)
    }
}

/// Trait for compute backends that can start a job.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Ask the backend to start the job. Returns once the request is
    /// accepted; does not wait for the job to run.
    async fn start(&self, request: &TriggerRequest) -> Result<(), TriggerError>;
}
