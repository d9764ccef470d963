//! Azure Blob Storage backend over the REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header::AUTHORIZATION, Client, Method, Response, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::credential::CredentialProvider;
use crate::metrics;

use super::{shared_key, BlobStore, ConnectionString, StorageError, StorageLocation};

const API_VERSION: &str = "2021-08-06";
const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// How requests are authorized.
enum BlobAuth {
    SharedKey { account: String, key: String },
    Sas(String),
    Bearer(CredentialProvider),
}

/// Blob store backed by an Azure storage account.
pub struct AzureBlobStore {
    client: Client,
    endpoint: Url,
    auth: BlobAuth,
}

impl AzureBlobStore {
    /// Create a store for the account described by `connection`.
    ///
    /// An account key takes precedence over a SAS token; with neither, bearer
    /// tokens from `credential` are used.
    pub fn new(
        connection: ConnectionString,
        credential: CredentialProvider,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&connection.blob_endpoint)
            .map_err(|e| StorageError::InvalidConnectionString(format!("BlobEndpoint: {}", e)))?;

        let auth = match (connection.account_name, connection.account_key, connection.sas_token) {
            (Some(account), Some(key), _) => BlobAuth::SharedKey { account, key },
            (_, _, Some(sas)) => BlobAuth::Sas(sas),
            _ => BlobAuth::Bearer(credential),
        };

        // No idle connections: nothing outlives the call that opened it.
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            auth,
        })
    }

    /// Short name of the authorization mode, for logs.
    pub fn auth_kind(&self) -> &'static str {
        match self.auth {
            BlobAuth::SharedKey { .. } => "shared_key",
            BlobAuth::Sas(_) => "sas",
            BlobAuth::Bearer(_) => "bearer",
        }
    }

    /// Full URL of a blob. Segments are percent-encoded.
    fn blob_url(&self, location: &StorageLocation) -> Result<Url, StorageError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidAddress(self.endpoint.to_string()))?;
            segments.pop_if_empty();
            segments.push(&location.container);
            for segment in location.path.split('/') {
                segments.push(segment);
            }
        }
        if let BlobAuth::Sas(sas) = &self.auth {
            url.set_query(Some(sas.as_str()));
        }
        Ok(url)
    }

    async fn send(&self, method: Method, location: &StorageLocation) -> Result<Response, StorageError> {
        let url = self.blob_url(location)?;
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION);

        match &self.auth {
            BlobAuth::SharedKey { account, key } => {
                let sts = shared_key::string_to_sign(
                    method.as_str(),
                    &url,
                    account,
                    &[("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)],
                );
                request = request.header(AUTHORIZATION, shared_key::authorization(account, key, &sts)?);
            }
            BlobAuth::Sas(_) => {}
            BlobAuth::Bearer(credential) => {
                let token = credential
                    .token(STORAGE_SCOPE)
                    .await
                    .map_err(|e| StorageError::Unauthorized(e.to_string()))?;
                request = request.bearer_auth(token.secret());
            }
        }

        let started = Instant::now();
        let response = request.send().await.map_err(StorageError::from_reqwest);
        metrics::REMOTE_CALL_DURATION
            .with_label_values(&["blob_storage", method.as_str()])
            .observe(started.elapsed().as_secs_f64());
        response
    }
}

fn status_error(status: StatusCode, location: &StorageLocation) -> StorageError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StorageError::Unauthorized(format!("HTTP {} for {}", status, location))
        }
        _ => StorageError::Transport(format!("HTTP {} for {}", status, location)),
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn name(&self) -> &str {
        "azure_blob"
    }

    async fn exists(&self, location: &StorageLocation) -> Result<bool, StorageError> {
        let response = self.send(Method::HEAD, location).await?;
        let status = response.status();
        debug!(location = %location, status = %status, "Blob existence check");

        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(status_error(status, location))
        }
    }

    async fn fetch_json(&self, location: &StorageLocation) -> Result<Value, StorageError> {
        let response = self.send(Method::GET, location).await?;
        let status = response.status();
        debug!(location = %location, status = %status, "Blob download");

        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(location.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(status, location));
        }

        let body = response.bytes().await.map_err(StorageError::from_reqwest)?;
        serde_json::from_slice(&body).map_err(|e| StorageError::Decode {
            location: location.to_string(),
            message: e.to_string(),
        })
    }
}
