//! Types for the event orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::DecodeError;
use crate::gate::GateResult;
use crate::job::JobConfigError;
use crate::storage::StorageLocation;
use crate::trigger::TriggerError;

/// Where an event currently is in its handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlingState {
    Decoding,
    ResolvingConfig,
    Gating,
    Dispatching,
    Done,
    Skipped,
    Failed(Stage),
}

impl HandlingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HandlingState::Done | HandlingState::Skipped | HandlingState::Failed(_)
        )
    }

    /// The stage this state belongs to, if it is not terminal.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            HandlingState::Decoding => Some(Stage::Decoding),
            HandlingState::ResolvingConfig => Some(Stage::ResolvingConfig),
            HandlingState::Gating => Some(Stage::Gating),
            HandlingState::Dispatching => Some(Stage::Dispatching),
            _ => None,
        }
    }
}

impl std::fmt::Display for HandlingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlingState::Decoding => write!(f, "decoding"),
            HandlingState::ResolvingConfig => write!(f, "resolving_config"),
            HandlingState::Gating => write!(f, "gating"),
            HandlingState::Dispatching => write!(f, "dispatching"),
            HandlingState::Done => write!(f, "done"),
            HandlingState::Skipped => write!(f, "skipped"),
            HandlingState::Failed(stage) => write!(f, "failed({})", stage.as_str()),
        }
    }
}

/// Non-terminal handling stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decoding,
    ResolvingConfig,
    Gating,
    Dispatching,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decoding => "decoding",
            Stage::ResolvingConfig => "resolving_config",
            Stage::Gating => "gating",
            Stage::Dispatching => "dispatching",
        }
    }
}

/// Failure classification carried in an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StorageNotConfigured,
    MalformedEvent,
    ConfigUnavailable,
    ConfigMalformed,
    TriggerFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StorageNotConfigured => "storage_not_configured",
            ErrorKind::MalformedEvent => "malformed_event",
            ErrorKind::ConfigUnavailable => "config_unavailable",
            ErrorKind::ConfigMalformed => "config_malformed",
            ErrorKind::TriggerFailed => "trigger_failed",
        }
    }
}

impl From<&DecodeError> for ErrorKind {
    fn from(_: &DecodeError) -> Self {
        ErrorKind::MalformedEvent
    }
}

impl From<&JobConfigError> for ErrorKind {
    fn from(err: &JobConfigError) -> Self {
        match err {
            JobConfigError::ConfigUnavailable { .. } => ErrorKind::ConfigUnavailable,
            JobConfigError::ConfigMalformed { .. } => ErrorKind::ConfigMalformed,
        }
    }
}

impl From<&TriggerError> for ErrorKind {
    fn from(_: &TriggerError) -> Self {
        ErrorKind::TriggerFailed
    }
}

/// Terminal status of a handled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Every artifact was present and the trigger was accepted.
    Done { gate: GateResult },
    /// At least one artifact never appeared. Not an error.
    Skipped { gate: GateResult },
    /// Handling stopped at `stage`.
    Failed {
        stage: Stage,
        kind: ErrorKind,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gate: Option<GateResult>,
    },
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Done { .. } => "done",
            OutcomeStatus::Skipped { .. } => "skipped",
            OutcomeStatus::Failed { .. } => "failed",
        }
    }

    pub fn gate(&self) -> Option<&GateResult> {
        match self {
            OutcomeStatus::Done { gate } | OutcomeStatus::Skipped { gate } => Some(gate),
            OutcomeStatus::Failed { gate, .. } => gate.as_ref(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            OutcomeStatus::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Record of one handled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOutcome {
    /// Event id from the payload, empty when it could not be read.
    pub event_id: String,
    /// Unique per handling, distinguishes redeliveries of the same event.
    pub run_id: Uuid,
    /// The job config the event pointed at, once decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<StorageLocation>,
    pub received_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl EventOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self.status, OutcomeStatus::Done { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_outcome_serialization() {
        let outcome = EventOutcome {
            event_id: "evt-1".to_string(),
            run_id: Uuid::nil(),
            location: None,
            received_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            finished_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:01Z")
                .unwrap()
                .with_timezone(&Utc),
            status: OutcomeStatus::Failed {
                stage: Stage::Decoding,
                kind: ErrorKind::MalformedEvent,
                message: "missing data.url".to_string(),
                gate: None,
            },
        };

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["stage"], "decoding");
        assert_eq!(value["kind"], "malformed_event");
        assert!(value.get("gate").is_none());
        assert!(value.get("location").is_none());

        let parsed: EventOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, outcome);
    }

    #[test]
    fn test_done_outcome_serialization() {
        let gate = GateResult::from_outcomes(Vec::new());
        let value = serde_json::to_value(OutcomeStatus::Done { gate }).unwrap();
        assert_eq!(value, json!({"status": "done", "gate": {"outcomes": [], "all_found": true}}));
    }

    #[test]
    fn test_handling_state() {
        assert!(!HandlingState::Gating.is_terminal());
        assert!(HandlingState::Failed(Stage::Gating).is_terminal());
        assert_eq!(HandlingState::ResolvingConfig.stage(), Some(Stage::ResolvingConfig));
        assert_eq!(HandlingState::Done.stage(), None);
        assert_eq!(
            HandlingState::Failed(Stage::Dispatching).to_string(),
            "failed(dispatching)"
        );
    }

    #[test]
    fn test_error_kind_from_job_error() {
        let err = JobConfigError::ConfigMalformed {
            location: StorageLocation::new("jobs", "cfg.json"),
            message: "bad".to_string(),
        };
        assert_eq!(ErrorKind::from(&err), ErrorKind::ConfigMalformed);
        assert_eq!(ErrorKind::from(&err).as_str(), "config_malformed");
    }
}
