//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the webhook server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Webhook deliveries and background handling
//! - Core gate, event and trigger metrics (registered from `blobgate_core`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "blobgate_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("blobgate_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "blobgate_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Webhook Metrics
// =============================================================================

/// Events received on the webhook, by kind.
pub static EVENTS_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("blobgate_events_received_total", "Events received on the webhook"),
        &["kind"], // "validation", "notification"
    )
    .unwrap()
});

/// Events currently handled in the background.
pub static EVENTS_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "blobgate_events_in_progress",
        "Number of events currently being handled",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Webhook
    registry
        .register(Box::new(EVENTS_RECEIVED.clone()))
        .unwrap();
    registry
        .register(Box::new(EVENTS_IN_PROGRESS.clone()))
        .unwrap();

    // Core metrics (gate, events, trigger, remote calls)
    for metric in blobgate_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a path for metric labels (replace event ids with a placeholder).
pub fn normalize_path(path: &str) -> String {
    const OUTCOMES: &str = "/api/v1/outcomes/";

    match path.strip_prefix(OUTCOMES) {
        Some(rest) if !rest.is_empty() => format!("{}{{event_id}}", OUTCOMES),
        _ => path.to_string(),
    }
}
