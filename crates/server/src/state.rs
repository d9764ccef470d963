use std::collections::VecDeque;
use std::sync::Arc;

use blobgate_core::{Config, EventOrchestrator, EventOutcome, SanitizedConfig};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<EventOrchestrator>,
    tracker: TaskTracker,
    /// Recent outcomes, newest first.
    outcomes: RwLock<VecDeque<EventOutcome>>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<EventOrchestrator>, tracker: TaskTracker) -> Self {
        Self {
            config,
            orchestrator,
            tracker,
            outcomes: RwLock::new(VecDeque::new()),
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<EventOrchestrator> {
        &self.orchestrator
    }

    /// Tracks background event handling so shutdown can wait for it.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Keep an outcome, dropping the oldest beyond `server.outcome_history`.
    pub async fn record_outcome(&self, outcome: EventOutcome) {
        let capacity = self.config.server.outcome_history;
        if capacity == 0 {
            return;
        }
        let mut outcomes = self.outcomes.write().await;
        outcomes.push_front(outcome);
        outcomes.truncate(capacity);
    }

    pub async fn recent_outcomes(&self, limit: usize) -> Vec<EventOutcome> {
        self.outcomes
            .read()
            .await
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Most recent outcome for `event_id`.
    pub async fn find_outcome(&self, event_id: &str) -> Option<EventOutcome> {
        self.outcomes
            .read()
            .await
            .iter()
            .find(|o| o.event_id == event_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blobgate_core::testing::{fixtures, MockComputeClient};
    use blobgate_core::TriggerDispatcher;
    use tokio_util::sync::CancellationToken;

    fn state_with_history(history: usize) -> AppState {
        let mut config = fixtures::config();
        config.server.outcome_history = history;
        let dispatcher = TriggerDispatcher::from_config(
            Arc::new(MockComputeClient::new()),
            config.trigger.as_ref(),
        );
        let orchestrator =
            EventOrchestrator::new(&config, None, dispatcher, CancellationToken::new());
        AppState::new(config, Arc::new(orchestrator), TaskTracker::new())
    }

    async fn outcome(state: &AppState, id: &str) -> EventOutcome {
        state
            .orchestrator()
            .handle_value(&fixtures::blob_created_event(id, "jobs", "cfg.json"))
            .await
    }

    #[tokio::test]
    async fn test_history_is_bounded_newest_first() {
        let state = state_with_history(2);
        for id in ["evt-1", "evt-2", "evt-3"] {
            let o = outcome(&state, id).await;
            state.record_outcome(o).await;
        }

        let recent = state.recent_outcomes(10).await;
        let ids: Vec<&str> = recent.iter().map(|o| o.event_id.as_str()).collect();
        assert_eq!(ids, vec!["evt-3", "evt-2"]);
        assert!(state.find_outcome("evt-1").await.is_none());
        assert!(state.find_outcome("evt-3").await.is_some());
    }

    #[tokio::test]
    async fn test_zero_history_keeps_nothing() {
        let state = state_with_history(0);
        let o = outcome(&state, "evt-1").await;
        state.record_outcome(o).await;
        assert!(state.recent_outcomes(10).await.is_empty());
    }
}
