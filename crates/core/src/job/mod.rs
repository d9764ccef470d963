//! Job configuration documents.
//!
//! A job configuration is a small JSON document listing the artifacts a job
//! needs before it may start:
//!
//! ```json
//! { "files": ["input/a.csv", "input/b.csv"], "container": "pipeline-files" }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::storage::{BlobStore, StorageError, StorageLocation};

/// Errors that can occur while resolving a job configuration.
#[derive(Debug, Clone, Error)]
pub enum JobConfigError {
    /// The document could not be fetched (network, auth, not found).
    #[error("job config unavailable at {location}: {source}")]
    ConfigUnavailable {
        location: StorageLocation,
        #[source]
        source: StorageError,
    },

    /// The document was fetched but is not a valid job config.
    #[error("job config at {location} is malformed: {message}")]
    ConfigMalformed {
        location: StorageLocation,
        message: String,
    },
}

/// Artifacts a job depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Paths relative to the artifact container, in document order.
    #[serde(rename = "files", default)]
    pub required_artifacts: Vec<String>,
    /// Container holding the artifacts, when the document names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl JobConfig {
    /// Resolve every required artifact to a location.
    ///
    /// The document's own `container` wins over `default_container`.
    pub fn artifact_locations(&self, default_container: &str) -> Vec<StorageLocation> {
        let container = self.container.as_deref().unwrap_or(default_container);
        self.required_artifacts
            .iter()
            .map(|path| StorageLocation::new(container, path.trim_start_matches('/')))
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(container) = &self.container {
            if container.trim().is_empty() {
                return Err("container is empty".to_string());
            }
        }
        if let Some(idx) = self
            .required_artifacts
            .iter()
            .position(|p| p.trim_start_matches('/').trim().is_empty())
        {
            return Err(format!("files[{}] is empty", idx));
        }
        Ok(())
    }
}

/// Fetches and parses job configuration documents.
pub struct JobConfigResolver {
    store: Arc<dyn BlobStore>,
}

impl JobConfigResolver {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Fetch `container/path` once and decode it. No retries.
    pub async fn resolve(&self, container: &str, path: &str) -> Result<JobConfig, JobConfigError> {
        let location = StorageLocation::new(container, path);

        let value = self.store.fetch_json(&location).await.map_err(|e| {
            error!(location = %location, error = %e, "Failed to read job config");
            match e {
                StorageError::Decode { message, .. } => JobConfigError::ConfigMalformed {
                    location: location.clone(),
                    message,
                },
                source => JobConfigError::ConfigUnavailable {
                    location: location.clone(),
                    source,
                },
            }
        })?;

        let config: JobConfig =
            serde_json::from_value(value).map_err(|e| JobConfigError::ConfigMalformed {
                location: location.clone(),
                message: e.to_string(),
            })?;

        config
            .validate()
            .map_err(|message| JobConfigError::ConfigMalformed {
                location: location.clone(),
                message,
            })?;

        info!(
            location = %location,
            files = ?config.required_artifacts,
            "Resolved job config"
        );

        Ok(config)
    }
}
