//! Mock compute client for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::trigger::{ComputeClient, TriggerError, TriggerRequest};

/// Mock implementation of the ComputeClient trait.
///
/// Records every start request; a configured error is returned once.
#[derive(Debug, Default)]
pub struct MockComputeClient {
    /// Recorded start requests.
    starts: Arc<RwLock<Vec<TriggerRequest>>>,
    /// If set, the next start will fail with this error.
    next_error: Arc<RwLock<Option<TriggerError>>>,
}

impl MockComputeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_next_error(&self, error: TriggerError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn recorded_starts(&self) -> Vec<TriggerRequest> {
        self.starts.read().await.clone()
    }
}

#[async_trait]
impl ComputeClient for MockComputeClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(&self, request: &TriggerRequest) -> Result<(), TriggerError> {
        self.starts.write().await.push(request.clone());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(())
    }
}
