//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, enabling E2E testing without a storage
//! account or a subscription.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower::ServiceExt;

use blobgate_core::{
    testing::{MockBlobStore, MockComputeClient},
    BlobStore, Config, EventOrchestrator, TriggerDispatcher,
};
use blobgate_server::state::AppState;

/// Re-export fixtures for test convenience
pub use blobgate_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Blob storage (MockBlobStore)
/// - Compute start calls (MockComputeClient)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_delivery() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/events?wait=true", json!([
///         fixtures::blob_created_event("evt-1", "jobs", "cfg.json")
///     ])).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state behind the router
    pub state: Arc<AppState>,
    /// Mock blob store - put job configs and artifacts here
    pub store: Arc<MockBlobStore>,
    /// Mock compute client - inspect start calls
    pub compute: Arc<MockComputeClient>,
    /// Process-wide shutdown token given to the orchestrator
    pub shutdown: CancellationToken,
    /// Tracker for background event handling
    pub tracker: TaskTracker,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Options for building a fixture.
pub struct TestConfig {
    pub config: Config,
    /// Wire the mock store in; `false` simulates a missing storage credential.
    pub storage_configured: bool,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            config: fixtures::config(),
            storage_configured: true,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let store = Arc::new(MockBlobStore::new());
        let compute = Arc::new(MockComputeClient::new());
        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();

        let config = test_config.config;
        let dispatcher = TriggerDispatcher::from_config(compute.clone(), config.trigger.as_ref());
        let orchestrator = EventOrchestrator::new(
            &config,
            test_config
                .storage_configured
                .then(|| Arc::clone(&store) as Arc<dyn BlobStore>),
            dispatcher,
            shutdown.clone(),
        );

        let state = Arc::new(AppState::new(config, Arc::new(orchestrator), tracker.clone()));
        let router = blobgate_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            store,
            compute,
            shutdown,
            tracker,
        }
    }

    /// Wait until every event accepted without `wait=true` has been handled.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Body::empty(), None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            "POST",
            path,
            Body::from(body.to_string()),
            Some("application/json"),
        )
        .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request(
            "POST",
            path,
            Body::from(body.to_string()),
            Some("application/json"),
        )
        .await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            builder = builder.header("Content-Type", content_type);
        }
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
