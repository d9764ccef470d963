//! One-shot dispatch of the downstream job.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::TriggerConfig;
use crate::gate::Readiness;
use crate::metrics;

use super::{ComputeClient, TriggerError, TriggerRequest};

/// Starts the configured job once the gate has opened.
#[derive(Clone)]
pub struct TriggerDispatcher {
    client: Arc<dyn ComputeClient>,
    request: Option<TriggerRequest>,
}

impl TriggerDispatcher {
    pub fn new(client: Arc<dyn ComputeClient>, request: Option<TriggerRequest>) -> Self {
        Self { client, request }
    }

    pub fn from_config(client: Arc<dyn ComputeClient>, config: Option<&TriggerConfig>) -> Self {
        Self::new(client, config.map(TriggerRequest::from))
    }

    pub fn is_configured(&self) -> bool {
        self.request.is_some()
    }

    /// Issue a single start call. Does not wait for the job to run.
    pub async fn trigger(&self, readiness: Readiness<'_>) -> Result<(), TriggerError> {
        let Some(request) = &self.request else {
            warn!("Artifacts ready but no trigger is configured");
            metrics::TRIGGER_DISPATCHES
                .with_label_values(&["failed"])
                .inc();
            return Err(TriggerError::NotConfigured);
        };

        info!(
            target_job = %request,
            backend = self.client.name(),
            artifacts = readiness.gate().outcomes.len(),
            "Dispatching trigger"
        );

        match self.client.start(request).await {
            Ok(()) => {
                metrics::TRIGGER_DISPATCHES
                    .with_label_values(&["success"])
                    .inc();
                Ok(())
            }
            Err(e) => {
                error!(target_job = %request, error = %e, "Trigger dispatch failed");
                metrics::TRIGGER_DISPATCHES
                    .with_label_values(&["failed"])
                    .inc();
                Err(e)
            }
        }
    }
}
