//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing end-to-end testing without a storage account or a subscription.
//!
//! # Example
//!
//! ```rust,ignore
//! use blobgate_core::testing::{fixtures, MockBlobStore, MockComputeClient};
//!
//! let store = MockBlobStore::new();
//! let compute = MockComputeClient::new();
//!
//! store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;
//! store.touch("jobs", "a.txt").await;
//!
//! let event = fixtures::blob_created_event("evt-1", "jobs", "cfg.json");
//! ```

mod mock_blob_store;
mod mock_compute;

pub use mock_blob_store::MockBlobStore;
pub use mock_compute::MockComputeClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::config::{Config, TriggerConfig};
    use crate::event::SUBSCRIPTION_VALIDATION_EVENT;
    use crate::trigger::TriggerRequest;

    /// Trigger settings matching [`trigger_request`].
    pub fn trigger_config() -> TriggerConfig {
        TriggerConfig {
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-data".to_string(),
            container_group_name: "nightly-etl".to_string(),
            management_endpoint: "https://management.azure.com".to_string(),
            timeout_secs: 30,
        }
    }

    pub fn trigger_request() -> TriggerRequest {
        TriggerRequest::from(&trigger_config())
    }

    /// Default configuration with a trigger.
    pub fn config() -> Config {
        Config {
            trigger: Some(trigger_config()),
            ..Config::default()
        }
    }

    /// Configuration with a specific poll policy, in seconds.
    pub fn config_with_policy(timeout_secs: u64, interval_secs: u64) -> Config {
        let mut config = config();
        config.poll.timeout_secs = timeout_secs;
        config.poll.interval_secs = interval_secs;
        config
    }

    /// Public cloud URL of a blob.
    pub fn blob_url(container: &str, path: &str) -> String {
        format!("https://acct.blob.core.windows.net/{}/{}", container, path)
    }

    /// A `BlobCreated` event for `container/path`.
    pub fn blob_created_event(id: &str, container: &str, path: &str) -> Value {
        json!({
            "id": id,
            "topic": "/subscriptions/sub-1/resourceGroups/rg-data/providers/Microsoft.Storage/storageAccounts/acct",
            "subject": format!("/blobServices/default/containers/{}/blobs/{}", container, path),
            "eventType": "Microsoft.Storage.BlobCreated",
            "eventTime": "2024-01-01T00:00:00Z",
            "dataVersion": "",
            "data": {
                "api": "PutBlob",
                "contentType": "application/json",
                "blobType": "BlockBlob",
                "url": blob_url(container, path)
            }
        })
    }

    /// The handshake event sent when a webhook subscription is created.
    pub fn validation_event(code: &str) -> Value {
        json!({
            "id": "validation-1",
            "topic": "/subscriptions/sub-1",
            "subject": "",
            "eventType": SUBSCRIPTION_VALIDATION_EVENT,
            "eventTime": "2024-01-01T00:00:00Z",
            "data": {
                "validationCode": code,
                "validationUrl": "https://rp-westus.eventgrid.azure.net/validate"
            }
        })
    }
}
