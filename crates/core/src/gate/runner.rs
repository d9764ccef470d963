//! Concurrent polling of required artifacts.

use std::sync::Arc;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::storage::{BlobStore, StorageLocation};

use super::types::{ArtifactError, ArtifactOutcome, GateResult, PollPolicy};

/// Waits until every required artifact exists or its budget runs out.
#[derive(Clone)]
pub struct ReadinessGate {
    store: Arc<dyn BlobStore>,
}

impl ReadinessGate {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Poll all artifacts concurrently and aggregate the verdict.
    pub async fn await_all(&self, artifacts: &[StorageLocation], policy: &PollPolicy) -> GateResult {
        self.await_all_until(artifacts, policy, &CancellationToken::new())
            .await
    }

    /// Like [`await_all`](Self::await_all), but stops early once `cancel` fires.
    ///
    /// Artifacts still outstanding at cancellation resolve as timed out.
    pub async fn await_all_until(
        &self,
        artifacts: &[StorageLocation],
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> GateResult {
        if artifacts.is_empty() {
            debug!("No required artifacts, gate is open");
            return GateResult::from_outcomes(Vec::new());
        }

        info!(
            artifacts = artifacts.len(),
            timeout_secs = policy.timeout.as_secs_f64(),
            interval_secs = policy.interval.as_secs_f64(),
            single_check = policy.is_single_check(),
            backend = self.store.name(),
            "Waiting for artifacts"
        );

        let started = Instant::now();
        let waits = artifacts
            .iter()
            .map(|location| self.await_one(location, policy, cancel));
        let result = GateResult::from_outcomes(futures::future::join_all(waits).await);

        let verdict = if result.all_found { "ready" } else { "not_ready" };
        metrics::GATE_VERDICTS.with_label_values(&[verdict]).inc();
        metrics::GATE_DURATION
            .with_label_values(&[verdict])
            .observe(started.elapsed().as_secs_f64());

        info!(
            all_found = result.all_found,
            found = result.found_count(),
            total = result.outcomes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gate finished"
        );

        result
    }

    async fn await_one(
        &self,
        location: &StorageLocation,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> ArtifactOutcome {
        let started = Instant::now();
        let deadline = started + policy.timeout;
        // Checks run on a fixed grid from the first one; no tick lands past the deadline.
        let mut next_tick = started + policy.interval;
        let mut attempts = 0u32;
        let mut last_error: Option<String>;

        loop {
            let check = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return cancelled(location, attempts, started);
                }
                check = self.store.exists(location) => check,
            };
            attempts += 1;

            match check {
                Ok(true) => {
                    metrics::ARTIFACT_CHECKS.with_label_values(&["found"]).inc();
                    let elapsed = started.elapsed();
                    debug!(
                        location = %location,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Artifact present"
                    );
                    return ArtifactOutcome::found(location.clone(), attempts, elapsed);
                }
                Ok(false) => {
                    metrics::ARTIFACT_CHECKS.with_label_values(&["absent"]).inc();
                    debug!(location = %location, attempts, "Artifact not present yet");
                    last_error = None;
                }
                Err(e) => {
                    metrics::ARTIFACT_CHECKS.with_label_values(&["error"]).inc();
                    warn!(location = %location, attempts, error = %e, "Existence check failed");
                    last_error = Some(e.to_string());
                }
            }

            if policy.is_single_check() || Instant::now() >= deadline || next_tick > deadline {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return cancelled(location, attempts, started);
                }
                _ = sleep_until(next_tick) => {}
            }
            next_tick += policy.interval;
        }

        let elapsed = started.elapsed();
        let error = match last_error {
            Some(message) => ArtifactError::TransportFailure(message),
            None => ArtifactError::Timeout,
        };
        warn!(
            location = %location,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "Artifact not available"
        );
        ArtifactOutcome::missing(location.clone(), attempts, elapsed, error)
    }
}

fn cancelled(location: &StorageLocation, attempts: u32, started: Instant) -> ArtifactOutcome {
    debug!(location = %location, attempts, "Wait cancelled");
    ArtifactOutcome::missing(
        location.clone(),
        attempts,
        started.elapsed(),
        ArtifactError::Timeout,
    )
}
