//! Outcome history API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use blobgate_core::EventOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// Default limit for outcome queries
const DEFAULT_LIMIT: usize = 100;

/// Query parameters for listing outcomes
#[derive(Debug, Deserialize)]
pub struct ListOutcomesParams {
    /// Maximum number of outcomes to return
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListOutcomesResponse {
    pub outcomes: Vec<EventOutcome>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeErrorResponse {
    pub error: String,
}

/// List recent outcomes, newest first.
pub async fn list_outcomes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListOutcomesParams>,
) -> Json<ListOutcomesResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    Json(ListOutcomesResponse {
        outcomes: state.recent_outcomes(limit).await,
    })
}

/// Most recent outcome for an event id.
pub async fn get_outcome(
    State(state): State<Arc<AppState>>,
    Path(event_id): Path<String>,
) -> Result<Json<EventOutcome>, impl IntoResponse> {
    match state.find_outcome(&event_id).await {
        Some(outcome) => Ok(Json(outcome)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(OutcomeErrorResponse {
                error: format!("no outcome recorded for event {}", event_id),
            }),
        )),
    }
}
