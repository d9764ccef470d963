//! Event orchestrator implementation.
//!
//! Drives one event through the state machine:
//! decoding → resolving config → gating → dispatching → done.
//! `skipped` (gate closed) and `failed` (any stage) are the other terminal
//! states.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::event::{DecodeError, NotificationDecoder};
use crate::gate::{GateResult, PollPolicy, ReadinessGate};
use crate::job::JobConfigResolver;
use crate::metrics;
use crate::storage::{BlobStore, StorageLocation};
use crate::trigger::TriggerDispatcher;

use super::types::{ErrorKind, EventOutcome, HandlingState, OutcomeStatus, Stage};

/// Handles storage-change events end to end.
pub struct EventOrchestrator {
    decoder: NotificationDecoder,
    store: Option<Arc<dyn BlobStore>>,
    dispatcher: TriggerDispatcher,
    policy: PollPolicy,
    artifact_container: Option<String>,
    shutdown: CancellationToken,
}

/// Result of a stage that may end handling early.
type StageResult<T> = Result<T, Box<OutcomeStatus>>;

impl EventOrchestrator {
    /// Create an orchestrator.
    ///
    /// `store` is `None` when no storage credential is configured; every
    /// event then fails before any remote call. Cancelling `shutdown` ends
    /// all in-flight gates.
    pub fn new(
        config: &Config,
        store: Option<Arc<dyn BlobStore>>,
        dispatcher: TriggerDispatcher,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            decoder: NotificationDecoder::new(config.events.domain_marker.clone()),
            store,
            dispatcher,
            policy: config.poll.policy(),
            artifact_container: config
                .storage
                .artifact_container
                .clone()
                .filter(|c| !c.trim().is_empty()),
            shutdown,
        }
    }

    /// Default poll policy.
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn is_storage_configured(&self) -> bool {
        self.store.is_some()
    }

    /// Handle a raw event payload.
    pub async fn handle(&self, raw: &[u8]) -> EventOutcome {
        let parsed: Result<Value, DecodeError> =
            serde_json::from_slice(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()));
        self.run(parsed, None, &CancellationToken::new()).await
    }

    /// Handle an event that was already parsed as JSON.
    pub async fn handle_value(&self, event: &Value) -> EventOutcome {
        self.handle_with(event, None, &CancellationToken::new())
            .await
    }

    /// Handle an event with an optional policy override and a cancellation token.
    pub async fn handle_with(
        &self,
        event: &Value,
        policy: Option<PollPolicy>,
        cancel: &CancellationToken,
    ) -> EventOutcome {
        self.run(Ok(event.clone()), policy, cancel).await
    }

    async fn run(
        &self,
        parsed: Result<Value, DecodeError>,
        policy: Option<PollPolicy>,
        cancel: &CancellationToken,
    ) -> EventOutcome {
        let received_at = Utc::now();
        let run_id = Uuid::new_v4();
        let event_id = parsed
            .as_ref()
            .ok()
            .and_then(|v| v.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let span = info_span!("event", event_id = %event_id, run_id = %run_id);
        let mut location = None;
        let status = self
            .drive(parsed, policy.unwrap_or(self.policy), cancel, &mut location)
            .instrument(span.clone())
            .await;

        let kind = status.kind().map(|k| k.as_str()).unwrap_or("none");
        metrics::EVENT_OUTCOMES
            .with_label_values(&[status.as_str(), kind])
            .inc();

        span.in_scope(|| match &status {
            OutcomeStatus::Done { .. } => info!("Event handled, job started"),
            OutcomeStatus::Skipped { gate } => warn!(
                missing = gate.missing().count(),
                "Required artifacts not available, job not started"
            ),
            OutcomeStatus::Failed {
                stage,
                kind,
                message,
                ..
            } => error!(
                stage = stage.as_str(),
                kind = kind.as_str(),
                error = %message,
                "Event handling failed"
            ),
        });

        EventOutcome {
            event_id,
            run_id,
            location,
            received_at,
            finished_at: Utc::now(),
            status,
        }
    }

    async fn drive(
        &self,
        parsed: Result<Value, DecodeError>,
        policy: PollPolicy,
        cancel: &CancellationToken,
        location_out: &mut Option<StorageLocation>,
    ) -> OutcomeStatus {
        let mut state = HandlingState::Decoding;
        debug!(state = %state, "Handling event");

        let Some(store) = &self.store else {
            return failed(
                Stage::Decoding,
                ErrorKind::StorageNotConfigured,
                "storage connection is not configured".to_string(),
                None,
            );
        };

        let location = match self.decode(parsed) {
            Ok(location) => location,
            Err(status) => return *status,
        };
        *location_out = Some(location.clone());

        advance(&mut state, HandlingState::ResolvingConfig);
        let artifacts = match self.resolve(store, &location).await {
            Ok(artifacts) => artifacts,
            Err(status) => return *status,
        };

        advance(&mut state, HandlingState::Gating);
        let gate = self.gate(store, &artifacts, &policy, cancel).await;

        let Some(readiness) = gate.readiness() else {
            advance(&mut state, HandlingState::Skipped);
            return OutcomeStatus::Skipped { gate };
        };

        advance(&mut state, HandlingState::Dispatching);
        if let Err(e) = self.dispatcher.trigger(readiness).await {
            advance(&mut state, HandlingState::Failed(Stage::Dispatching));
            return failed(
                Stage::Dispatching,
                ErrorKind::from(&e),
                e.to_string(),
                Some(gate),
            );
        }

        advance(&mut state, HandlingState::Done);
        OutcomeStatus::Done { gate }
    }

    fn decode(&self, parsed: Result<Value, DecodeError>) -> StageResult<StorageLocation> {
        parsed
            .and_then(|value| self.decoder.decode_value(&value))
            .map_err(|e| {
                Box::new(failed(
                    Stage::Decoding,
                    ErrorKind::from(&e),
                    e.to_string(),
                    None,
                ))
            })
    }

    async fn resolve(
        &self,
        store: &Arc<dyn BlobStore>,
        location: &StorageLocation,
    ) -> StageResult<Vec<StorageLocation>> {
        let resolver = JobConfigResolver::new(Arc::clone(store));
        let job = resolver
            .resolve(&location.container, &location.path)
            .await
            .map_err(|e| {
                Box::new(failed(
                    Stage::ResolvingConfig,
                    ErrorKind::from(&e),
                    e.to_string(),
                    None,
                ))
            })?;

        let default_container = self
            .artifact_container
            .as_deref()
            .unwrap_or(&location.container);
        Ok(job.artifact_locations(default_container))
    }

    /// Run the gate, stopping early on either the per-call or the process token.
    async fn gate(
        &self,
        store: &Arc<dyn BlobStore>,
        artifacts: &[StorageLocation],
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> GateResult {
        let gate = ReadinessGate::new(Arc::clone(store));
        let combined = cancel.child_token();

        let wait = gate.await_all_until(artifacts, policy, &combined);
        tokio::pin!(wait);

        tokio::select! {
            result = &mut wait => result,
            _ = self.shutdown.cancelled() => {
                info!("Shutdown requested, ending wait");
                combined.cancel();
                wait.await
            }
        }
    }
}

fn advance(state: &mut HandlingState, next: HandlingState) {
    debug_assert!(!state.is_terminal(), "transition out of terminal state {}", state);
    if let HandlingState::Failed(stage) = next {
        debug_assert_eq!(state.stage(), Some(stage), "failure reported for another stage");
    }
    debug!(from = %state, to = %next, "State transition");
    *state = next;
}

fn failed(stage: Stage, kind: ErrorKind, message: String, gate: Option<GateResult>) -> OutcomeStatus {
    OutcomeStatus::Failed {
        stage,
        kind,
        message,
        gate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::ArtifactError;
    use crate::testing::{fixtures, MockBlobStore, MockComputeClient};
    use crate::trigger::TriggerError;
    use serde_json::json;
    use std::time::Duration;

    struct Harness {
        store: Arc<MockBlobStore>,
        compute: Arc<MockComputeClient>,
        orchestrator: EventOrchestrator,
    }

    fn harness_with(config: Config, shutdown: CancellationToken) -> Harness {
        let store = Arc::new(MockBlobStore::new());
        let compute = Arc::new(MockComputeClient::new());
        let dispatcher = TriggerDispatcher::from_config(compute.clone(), config.trigger.as_ref());
        let orchestrator = EventOrchestrator::new(
            &config,
            Some(store.clone() as Arc<dyn BlobStore>),
            dispatcher,
            shutdown,
        );
        Harness {
            store,
            compute,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(fixtures::config(), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_present_dispatches_once() {
        let h = harness();
        h.store
            .put_json("jobs", "cfg.json", json!({"files": ["a.txt", "b.txt"]}))
            .await;
        h.store.touch("jobs", "a.txt").await;
        h.store.touch("jobs", "b.txt").await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-1", "jobs", "cfg.json")).await;

        assert!(outcome.is_done(), "{:?}", outcome.status);
        assert_eq!(outcome.event_id, "evt-1");
        assert_eq!(outcome.location, Some(StorageLocation::new("jobs", "cfg.json")));
        let gate = outcome.status.gate().unwrap();
        assert!(gate.all_found);
        assert!(gate.outcomes.iter().all(|o| o.attempts == 1));
        assert_eq!(h.compute.recorded_starts().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_artifact_skips() {
        let h = harness_with(fixtures::config_with_policy(4, 2), CancellationToken::new());
        h.store
            .put_json("jobs", "cfg.json", json!({"files": ["a.txt", "b.txt"]}))
            .await;
        h.store.touch("jobs", "a.txt").await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-2", "jobs", "cfg.json")).await;

        assert!(outcome.is_skipped());
        let gate = outcome.status.gate().unwrap();
        assert!(!gate.all_found);
        assert_eq!(gate.outcomes[1].error, Some(ArtifactError::Timeout));
        assert!(h.compute.recorded_starts().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_event_fails_at_decoding() {
        let h = harness();
        let outcome = h.orchestrator.handle(b"{not json").await;

        assert_eq!(outcome.event_id, "");
        assert_eq!(outcome.status.kind(), Some(ErrorKind::MalformedEvent));
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed { stage: Stage::Decoding, .. }
        ));
        assert_eq!(h.store.total_calls().await, 0);
    }

    #[tokio::test]
    async fn test_missing_url_fails_at_decoding() {
        let h = harness();
        let outcome = h.orchestrator.handle_value(&json!({"id": "evt-3", "data": {}})).await;

        assert_eq!(outcome.event_id, "evt-3");
        assert_eq!(outcome.status.kind(), Some(ErrorKind::MalformedEvent));
        assert!(outcome.location.is_none());
    }

    #[tokio::test]
    async fn test_missing_config_is_unavailable() {
        let h = harness();
        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-4", "jobs", "cfg.json")).await;

        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed {
                stage: Stage::ResolvingConfig,
                kind: ErrorKind::ConfigUnavailable,
                ..
            }
        ));
        assert_eq!(h.store.total_checks().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_config() {
        let h = harness();
        h.store.put_object("jobs", "cfg.json", b"not json".to_vec()).await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-5", "jobs", "cfg.json")).await;
        assert_eq!(outcome.status.kind(), Some(ErrorKind::ConfigMalformed));
    }

    #[tokio::test]
    async fn test_empty_files_dispatches_without_checks() {
        let h = harness();
        h.store.put_json("jobs", "cfg.json", json!({"files": []})).await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-6", "jobs", "cfg.json")).await;

        assert!(outcome.is_done());
        assert_eq!(h.store.total_checks().await, 0);
        assert_eq!(h.compute.recorded_starts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_not_configured() {
        let config = fixtures::config();
        let compute = Arc::new(MockComputeClient::new());
        let orchestrator = EventOrchestrator::new(
            &config,
            None,
            TriggerDispatcher::from_config(compute.clone(), config.trigger.as_ref()),
            CancellationToken::new(),
        );

        let outcome = orchestrator
            .handle_value(&fixtures::blob_created_event("evt-7", "jobs", "cfg.json"))
            .await;

        assert!(!orchestrator.is_storage_configured());
        assert!(matches!(
            outcome.status,
            OutcomeStatus::Failed {
                stage: Stage::Decoding,
                kind: ErrorKind::StorageNotConfigured,
                ..
            }
        ));
        assert!(compute.recorded_starts().await.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_not_configured_keeps_gate_verdict() {
        let mut config = fixtures::config();
        config.trigger = None;
        let h = harness_with(config, CancellationToken::new());
        h.store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;
        h.store.touch("jobs", "a.txt").await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-8", "jobs", "cfg.json")).await;

        match &outcome.status {
            OutcomeStatus::Failed {
                stage,
                kind,
                gate: Some(gate),
                ..
            } => {
                assert_eq!(*stage, Stage::Dispatching);
                assert_eq!(*kind, ErrorKind::TriggerFailed);
                assert!(gate.all_found);
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_trigger_rejected() {
        let h = harness();
        h.store.put_json("jobs", "cfg.json", json!({"files": []})).await;
        h.compute
            .set_next_error(TriggerError::Transport("connection refused".to_string()))
            .await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-9", "jobs", "cfg.json")).await;
        assert_eq!(outcome.status.kind(), Some(ErrorKind::TriggerFailed));
        assert_eq!(outcome.status.gate().map(|g| g.all_found), Some(true));
    }

    #[tokio::test]
    async fn test_artifact_container_precedence() {
        let mut config = fixtures::config();
        config.storage.artifact_container = Some("landing".to_string());
        let h = harness_with(config, CancellationToken::new());
        h.store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;
        h.store.touch("landing", "a.txt").await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-10", "jobs", "cfg.json")).await;
        assert!(outcome.is_done());

        h.store
            .put_json("jobs", "cfg2.json", json!({"files": ["b.txt"], "container": "explicit"}))
            .await;
        h.store.touch("explicit", "b.txt").await;

        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-11", "jobs", "cfg2.json")).await;
        assert!(outcome.is_done());
        assert_eq!(
            outcome.status.gate().unwrap().outcomes[0].location,
            StorageLocation::new("explicit", "b.txt")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_override() {
        let h = harness();
        h.store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;

        let started = tokio::time::Instant::now();
        let outcome = h
            .orchestrator
            .handle_with(
                &fixtures::blob_created_event("evt-12", "jobs", "cfg.json"),
                Some(PollPolicy::from_secs(1, 0)),
                &CancellationToken::new(),
            )
            .await;

        assert!(outcome.is_skipped());
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(h.store.check_count(&StorageLocation::new("jobs", "a.txt")).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_gate() {
        let shutdown = CancellationToken::new();
        let h = harness_with(fixtures::config_with_policy(600, 2), shutdown.clone());
        h.store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            shutdown.cancel();
        });

        let started = tokio::time::Instant::now();
        let outcome = h.orchestrator.handle_value(&fixtures::blob_created_event("evt-13", "jobs", "cfg.json")).await;

        assert!(outcome.is_skipped());
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(h.compute.recorded_starts().await.is_empty());
    }

    #[tokio::test]
    async fn test_redelivery_gets_new_run_id() {
        let h = harness();
        h.store.put_json("jobs", "cfg.json", json!({"files": []})).await;
        let event = fixtures::blob_created_event("evt-14", "jobs", "cfg.json");

        let first = h.orchestrator.handle_value(&event).await;
        let second = h.orchestrator.handle_value(&event).await;

        assert_eq!(first.event_id, second.event_id);
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(h.compute.recorded_starts().await.len(), 2);
    }
}
