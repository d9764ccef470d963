//! Webhook endpoint for storage-change events.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blobgate_core::{EventGridEvent, EventOutcome, PollPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::{EVENTS_IN_PROGRESS, EVENTS_RECEIVED};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a delivery
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryParams {
    /// Handle events before answering and return their outcomes
    #[serde(default)]
    pub wait: bool,
    /// Override the per-artifact budget for this delivery
    pub timeout_secs: Option<u64>,
    /// Override the poll interval for this delivery
    pub interval_secs: Option<u64>,
}

impl DeliveryParams {
    fn policy(&self, default: PollPolicy) -> Option<PollPolicy> {
        if self.timeout_secs.is_none() && self.interval_secs.is_none() {
            return None;
        }
        Some(PollPolicy::new(
            self.timeout_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or(default.timeout),
            self.interval_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or(default.interval),
        ))
    }
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: Vec<String>,
    #[serde(rename = "validationResponse", skip_serializing_if = "Option::is_none")]
    pub validation_response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OutcomesResponse {
    pub outcomes: Vec<EventOutcome>,
    #[serde(rename = "validationResponse", skip_serializing_if = "Option::is_none")]
    pub validation_response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventErrorResponse {
    pub error: String,
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(EventErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// Receive a delivery of one or more events.
pub async fn receive_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeliveryParams>,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected delivery with invalid JSON body");
            return bad_request(format!("invalid JSON body: {}", e));
        }
    };

    let events = match payload {
        Value::Array(events) => events,
        event @ Value::Object(_) => vec![event],
        _ => return bad_request("expected an event object or an array of events"),
    };

    // Validation events are answered; everything else in the delivery is still handled.
    let (validations, events): (Vec<Value>, Vec<Value>) =
        events.into_iter().partition(is_subscription_validation);
    let validation_response = match subscription_handshake(&validations) {
        Ok(code) => code,
        Err(response) => return response,
    };
    if let (true, Some(code)) = (events.is_empty(), &validation_response) {
        return (StatusCode::OK, Json(json!({ "validationResponse": code }))).into_response();
    }
    // The handshake only succeeds on a 200.
    let status = if validation_response.is_some() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };

    EVENTS_RECEIVED
        .with_label_values(&["notification"])
        .inc_by(events.len() as u64);

    let policy = params.policy(state.orchestrator().policy());
    let ids: Vec<String> = events.iter().map(event_id).collect();
    info!(count = events.len(), wait = params.wait, "Received events");

    if params.wait {
        let handling = events.iter().map(|event| {
            let state = Arc::clone(&state);
            async move {
                EVENTS_IN_PROGRESS.inc();
                let outcome = state
                    .orchestrator()
                    .handle_with(event, policy, &CancellationToken::new())
                    .await;
                EVENTS_IN_PROGRESS.dec();
                state.record_outcome(outcome.clone()).await;
                outcome
            }
        });
        let outcomes = futures::future::join_all(handling).await;
        let body = OutcomesResponse {
            outcomes,
            validation_response,
        };
        return (StatusCode::OK, Json(body)).into_response();
    }

    for event in events {
        let state_for_task = Arc::clone(&state);
        state.tracker().spawn(async move {
            EVENTS_IN_PROGRESS.inc();
            let outcome = state_for_task
                .orchestrator()
                .handle_with(&event, policy, &CancellationToken::new())
                .await;
            EVENTS_IN_PROGRESS.dec();
            state_for_task.record_outcome(outcome).await;
        });
    }

    let body = AcceptedResponse {
        accepted: ids,
        validation_response,
    };
    (status, Json(body)).into_response()
}

fn is_subscription_validation(event: &Value) -> bool {
    serde_json::from_value::<EventGridEvent>(event.clone())
        .is_ok_and(|event| event.is_subscription_validation())
}

/// Code to echo for the handshake sent when a webhook subscription is created.
fn subscription_handshake(validations: &[Value]) -> Result<Option<String>, Response> {
    let Some(first) = validations.first() else {
        return Ok(None);
    };
    let event = serde_json::from_value::<EventGridEvent>(first.clone())
        .map_err(|e| bad_request(format!("invalid validation event: {}", e)))?;

    EVENTS_RECEIVED
        .with_label_values(&["validation"])
        .inc_by(validations.len() as u64);

    match event.validation_code() {
        Some(code) => {
            info!(event_id = %event.id, "Answering subscription validation");
            Ok(Some(code.to_string()))
        }
        None => Err(bad_request("validation event without data.validationCode")),
    }
}

fn event_id(event: &Value) -> String {
    let id = event
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if id.is_empty() {
        debug!("Event without id");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_policy_override() {
        let default = PollPolicy::from_secs(10, 2);

        assert_eq!(DeliveryParams::default().policy(default), None);

        let params = DeliveryParams {
            wait: true,
            timeout_secs: Some(4),
            interval_secs: None,
        };
        let policy = params.policy(default).unwrap();
        assert_eq!(policy.timeout, Duration::from_secs(4));
        assert_eq!(policy.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_handshake_detection() {
        use blobgate_core::testing::fixtures;

        assert!(is_subscription_validation(&fixtures::validation_event("abc")));
        assert!(!is_subscription_validation(&fixtures::blob_created_event(
            "evt-1", "jobs", "cfg.json",
        )));

        let code = subscription_handshake(&[fixtures::validation_event("abc")]).unwrap();
        assert_eq!(code.as_deref(), Some("abc"));
        assert_eq!(subscription_handshake(&[]).unwrap(), None);
    }

    #[test]
    fn test_handshake_without_code_is_rejected() {
        let event = json!({
            "id": "v-1",
            "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent",
            "data": {}
        });
        let response = subscription_handshake(&[event]).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
