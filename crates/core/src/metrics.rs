//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Readiness gate (existence checks, verdicts, duration)
//! - Event handling (terminal outcomes by status)
//! - Trigger dispatch and remote call latency

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Readiness Gate
// =============================================================================

/// Existence checks by result.
pub static ARTIFACT_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "blobgate_artifact_checks_total",
            "Total artifact existence checks",
        ),
        &["result"], // "found", "absent", "error"
    )
    .unwrap()
});

/// Gate verdicts.
pub static GATE_VERDICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("blobgate_gate_verdicts_total", "Total readiness gate verdicts"),
        &["verdict"], // "ready", "not_ready"
    )
    .unwrap()
});

/// Time from gate start until every artifact resolved.
pub static GATE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "blobgate_gate_duration_seconds",
            "Duration of readiness gate runs",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["verdict"],
    )
    .unwrap()
});

// =============================================================================
// Events
// =============================================================================

/// Terminal event outcomes by status.
pub static EVENT_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("blobgate_event_outcomes_total", "Total handled events by outcome"),
        &["status", "kind"], // status: "done", "skipped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Trigger and remote calls
// =============================================================================

/// Trigger dispatches by result.
pub static TRIGGER_DISPATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("blobgate_trigger_dispatches_total", "Total trigger dispatches"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Remote call latency.
pub static REMOTE_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "blobgate_remote_call_duration_seconds",
            "Duration of calls to remote services",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Gate
        Box::new(ARTIFACT_CHECKS.clone()),
        Box::new(GATE_VERDICTS.clone()),
        Box::new(GATE_DURATION.clone()),
        // Events
        Box::new(EVENT_OUTCOMES.clone()),
        // Trigger and remote calls
        Box::new(TRIGGER_DISPATCHES.clone()),
        Box::new(REMOTE_CALL_DURATION.clone()),
    ]
}
