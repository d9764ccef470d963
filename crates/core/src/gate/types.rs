//! Readiness gate types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageLocation;

/// How long and how often to look for each artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Budget per artifact, measured from its first check.
    pub timeout: Duration,
    /// Pause between checks.
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    pub fn from_secs(timeout_secs: u64, interval_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(timeout_secs),
            Duration::from_secs(interval_secs),
        )
    }

    /// Only the immediate check is performed.
    pub fn is_single_check(&self) -> bool {
        self.interval.is_zero() || self.interval >= self.timeout
    }
}

/// Why an artifact was not found.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ArtifactError {
    /// Budget ran out while the artifact was absent.
    #[error("timed out waiting for artifact")]
    Timeout,
    /// Budget ran out while the store kept failing.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

/// Result of waiting on one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactOutcome {
    pub location: StorageLocation,
    pub found: bool,
    /// Completed existence checks, the first one included.
    pub attempts: u32,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ArtifactError>,
}

impl ArtifactOutcome {
    pub fn found(location: StorageLocation, attempts: u32, elapsed: Duration) -> Self {
        Self {
            location,
            found: true,
            attempts,
            elapsed,
            error: None,
        }
    }

    pub fn missing(
        location: StorageLocation,
        attempts: u32,
        elapsed: Duration,
        error: ArtifactError,
    ) -> Self {
        Self {
            location,
            found: false,
            attempts,
            elapsed,
            error: Some(error),
        }
    }

    fn is_ready(&self) -> bool {
        self.found && self.error.is_none()
    }
}

/// Aggregate verdict over all artifacts of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    /// One outcome per artifact, in input order.
    pub outcomes: Vec<ArtifactOutcome>,
    pub all_found: bool,
}

impl GateResult {
    pub fn from_outcomes(outcomes: Vec<ArtifactOutcome>) -> Self {
        let all_found = outcomes.iter().all(ArtifactOutcome::is_ready);
        Self {
            outcomes,
            all_found,
        }
    }

    /// Proof that every artifact is present, if that is the case.
    pub fn readiness(&self) -> Option<Readiness<'_>> {
        self.all_found.then_some(Readiness { gate: self })
    }

    pub fn found_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.found).count()
    }

    pub fn missing(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ready())
    }
}

/// A gate result whose verdict is true.
///
/// Only [`GateResult::readiness`] constructs one.
#[derive(Debug, Clone, Copy)]
pub struct Readiness<'a> {
    gate: &'a GateResult,
}

impl<'a> Readiness<'a> {
    pub fn gate(&self) -> &'a GateResult {
        self.gate
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
