//! Azure Container Instances over the resource manager REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header::CONTENT_LENGTH, Client, Url};
use tracing::{debug, info};

use crate::credential::CredentialProvider;
use crate::metrics;

use super::{ComputeClient, TriggerError, TriggerRequest};

const API_VERSION: &str = "2023-05-01";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Longest error body carried into an outcome message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Starts container groups.
pub struct ContainerInstanceClient {
    client: Client,
    endpoint: Url,
    credential: CredentialProvider,
}

impl ContainerInstanceClient {
    pub fn new(
        endpoint: &str,
        credential: CredentialProvider,
        timeout: Duration,
    ) -> Result<Self, TriggerError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TriggerError::Transport(format!("invalid management endpoint: {}", e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TriggerError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            credential,
        })
    }

    fn start_url(&self, request: &TriggerRequest) -> Result<Url, TriggerError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| TriggerError::Transport(format!("invalid management endpoint: {}", self.endpoint)))?
            .pop_if_empty()
            .extend([
                "subscriptions",
                request.subscription_id.as_str(),
                "resourceGroups",
                request.resource_group.as_str(),
                "providers",
                "Microsoft.ContainerInstance",
                "containerGroups",
                request.container_group_name.as_str(),
                "start",
            ]);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }
}

#[async_trait]
impl ComputeClient for ContainerInstanceClient {
    fn name(&self) -> &str {
        "container_instances"
    }

    async fn start(&self, request: &TriggerRequest) -> Result<(), TriggerError> {
        let url = self.start_url(request)?;
        let token = self
            .credential
            .token(MANAGEMENT_SCOPE)
            .await
            .map_err(|e| TriggerError::Credential(e.to_string()))?;

        debug!(url = %url, "Starting container group");
        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(TriggerError::from_reqwest);
        metrics::REMOTE_CALL_DURATION
            .with_label_values(&["container_instances", "start"])
            .observe(started.elapsed().as_secs_f64());

        let response = response?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriggerError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        info!(
            container_group = %request.container_group_name,
            resource_group = %request.resource_group,
            status = %status,
            "Container group start accepted"
        );
        Ok(())
    }
}
