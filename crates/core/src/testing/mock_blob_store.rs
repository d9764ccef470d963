//! Mock blob store for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{BlobStore, StorageError, StorageLocation};

/// Injected failures for one location.
#[derive(Debug, Clone)]
struct FailurePlan {
    remaining: u32,
    error: StorageError,
}

/// Mock implementation of the BlobStore trait.
///
/// Provides controllable behavior for testing:
/// - Objects that exist from the start or appear after N checks
/// - Transient or persistent existence-check failures
/// - Per-location latency (uses tokio time, so paused clocks apply)
/// - Call counters for assertions
///
/// # Example
///
/// ```rust,ignore
/// use blobgate_core::testing::MockBlobStore;
///
/// let store = MockBlobStore::new();
/// store.put_json("jobs", "cfg.json", json!({"files": ["a.txt"]})).await;
/// store.appear_after_checks(&StorageLocation::new("jobs", "a.txt"), 2).await;
/// ```
#[derive(Debug, Default)]
pub struct MockBlobStore {
    /// Stored objects and their raw bodies.
    objects: Arc<RwLock<HashMap<StorageLocation, Vec<u8>>>>,
    /// Locations that only exist after this many checks.
    appear_after: Arc<RwLock<HashMap<StorageLocation, u32>>>,
    /// Locations whose next checks fail.
    failures: Arc<RwLock<HashMap<StorageLocation, FailurePlan>>>,
    /// Simulated latency per existence check.
    delays: Arc<RwLock<HashMap<StorageLocation, Duration>>>,
    /// If set, the next fetch will fail with this error.
    next_fetch_error: Arc<RwLock<Option<StorageError>>>,
    /// Existence checks per location.
    checks: Arc<RwLock<HashMap<StorageLocation, u32>>>,
    /// Fetches per location.
    fetches: Arc<RwLock<HashMap<StorageLocation, u32>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an empty object.
    pub async fn touch(&self, container: &str, path: &str) {
        self.put_object(container, path, Vec::new()).await;
    }

    /// Store a JSON document.
    pub async fn put_json(&self, container: &str, path: &str, value: Value) {
        let body = serde_json::to_vec(&value).unwrap_or_default();
        self.put_object(container, path, body).await;
    }

    /// Store raw bytes.
    pub async fn put_object(&self, container: &str, path: &str, body: Vec<u8>) {
        self.objects
            .write()
            .await
            .insert(StorageLocation::new(container, path), body);
    }

    /// The first `checks` existence checks report absent, later ones present.
    pub async fn appear_after_checks(&self, location: &StorageLocation, checks: u32) {
        self.appear_after
            .write()
            .await
            .insert(location.clone(), checks);
    }

    /// The next `count` existence checks for `location` fail with `error`.
    pub async fn fail_checks(&self, location: &StorageLocation, count: u32, error: StorageError) {
        self.failures.write().await.insert(
            location.clone(),
            FailurePlan {
                remaining: count,
                error,
            },
        );
    }

    /// Every existence check for `location` takes `delay`.
    pub async fn set_check_delay(&self, location: &StorageLocation, delay: Duration) {
        self.delays.write().await.insert(location.clone(), delay);
    }

    /// Make the next fetch fail.
    pub async fn set_next_fetch_error(&self, error: StorageError) {
        *self.next_fetch_error.write().await = Some(error);
    }

    pub async fn check_count(&self, location: &StorageLocation) -> u32 {
        self.checks.read().await.get(location).copied().unwrap_or(0)
    }

    pub async fn fetch_count(&self, location: &StorageLocation) -> u32 {
        self.fetches.read().await.get(location).copied().unwrap_or(0)
    }

    pub async fn total_checks(&self) -> u32 {
        self.checks.read().await.values().sum()
    }

    /// Existence checks plus fetches.
    pub async fn total_calls(&self) -> u32 {
        self.total_checks().await + self.fetches.read().await.values().sum::<u32>()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        let delay = self.delays.read().await.get(location).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let check = {
            let mut checks = self.checks.write().await;
            let count = checks.entry(location.clone()).or_insert(0);
            *count += 1;
            *count
        };

        {
            let mut failures = self.failures.write().await;
            if let Some(plan) = failures.get_mut(location) {
                if plan.remaining > 0 {
                    plan.remaining -= 1;
                    return Err(plan.error.clone());
                }
            }
        }

        if let Some(threshold) = self.appear_after.read().await.get(location) {
            return Ok(check > *threshold);
        }

        Ok(self.objects.read().await.contains_key(location))
    }

    async fn fetch_json(&self, location: &StorageLocation) -> Result<Value, StorageError> {
        *self
            .fetches
            .write()
            .await
            .entry(location.clone())
            .or_insert(0) += 1;

        if let Some(error) = self.next_fetch_error.write().await.take() {
            return Err(error);
        }

        let objects = self.objects.read().await;
        let body = objects
            .get(location)
            .ok_or_else(|| StorageError::NotFound(location.to_string()))?;

        serde_json::from_slice(body).map_err(|e| StorageError::Decode {
            location: location.to_string(),
            message: e.to_string(),
        })
    }
}
