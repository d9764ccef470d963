//! Readiness gate.
//!
//! Polls every required artifact concurrently and reports whether all of
//! them appeared within their time budget. Each artifact gets:
//! - one immediate check
//! - then a check every `interval` until `timeout` has elapsed since its
//!   first check
//!
//! The gate always waits for every artifact before producing a verdict.

mod runner;
mod types;

pub use runner::ReadinessGate;
pub use types::{ArtifactError, ArtifactOutcome, GateResult, PollPolicy, Readiness};
