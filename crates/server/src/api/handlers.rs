use axum::{extract::State, http::header, response::IntoResponse, Json};
use blobgate_core::SanitizedConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage_configured: bool,
    pub trigger_configured: bool,
    pub started_at: DateTime<Utc>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        storage_configured: state.orchestrator().is_storage_configured(),
        trigger_configured: state.config().trigger.is_some(),
        started_at: state.started_at(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
