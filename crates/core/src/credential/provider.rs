//! Credential selection and token acquisition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::CredentialConfig;

use super::{AccessToken, CredentialError};

const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN_MINUTES: i64 = 5;

const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lifetime assumed when a token response carries no usable expiry.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Where tokens come from.
enum CredentialSource {
    /// Explicit service principal (client credentials grant).
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
        authority_host: String,
        client: Client,
    },
    /// Platform managed identity. Uses the hosting platform's identity
    /// endpoint when configured, the instance metadata service otherwise.
    ManagedIdentity {
        endpoint: Option<(String, String)>,
        client_id: Option<String>,
        client: Client,
    },
    /// Fixed token, for local development and tests.
    Static(AccessToken),
}

struct Inner {
    source: CredentialSource,
    cache: RwLock<HashMap<String, AccessToken>>,
    /// Held while a token is fetched so concurrent callers share one request.
    refresh: Mutex<()>,
}

/// Opaque provider of bearer tokens for a scope.
///
/// Cheap to clone; clones share the token cache.
#[derive(Clone)]
pub struct CredentialProvider {
    inner: Arc<Inner>,
}

/// True when tenant, client id and client secret are all set.
pub fn has_service_principal(config: &CredentialConfig) -> bool {
    let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    present(&config.tenant_id) && present(&config.client_id) && present(&config.client_secret)
}

/// Pick the credential for this process.
///
/// An explicit service principal wins when fully configured; otherwise the
/// ambient managed identity is used.
pub fn select_credential(config: &CredentialConfig) -> Result<CredentialProvider, CredentialError> {
    let client = Client::builder()
        .timeout(StdDuration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| CredentialError::Client(e.to_string()))?;

    let source = if has_service_principal(config) {
        info!("Using service principal credential");
        CredentialSource::ServicePrincipal {
            tenant_id: config.tenant_id.clone().unwrap_or_default(),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            authority_host: config
                .authority_host
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            client,
        }
    } else {
        info!("Using managed identity credential");
        let endpoint = match (&config.identity_endpoint, &config.identity_header) {
            (Some(endpoint), Some(header)) => Some((endpoint.clone(), header.clone())),
            _ => None,
        };
        CredentialSource::ManagedIdentity {
            endpoint,
            client_id: config.client_id.clone(),
            client,
        }
    };

    Ok(CredentialProvider::from_source(source))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    expires_on: Option<Value>,
}

/// Token endpoints disagree on whether numbers are strings.
fn as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TokenResponse {
    fn into_token(self, now: DateTime<Utc>) -> AccessToken {
        let expires_at = self
            .expires_on
            .as_ref()
            .and_then(as_seconds)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .or_else(|| {
                self.expires_in
                    .as_ref()
                    .and_then(as_seconds)
                    .and_then(Duration::try_seconds)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
            })
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        AccessToken::new(self.access_token, expires_at)
    }
}

/// `https://storage.azure.com/.default` -> `https://storage.azure.com/`
fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix(".default").unwrap_or(scope)
}

impl CredentialProvider {
    fn from_source(source: CredentialSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache: RwLock::new(HashMap::new()),
                refresh: Mutex::new(()),
            }),
        }
    }

    /// A provider that always hands out the same token.
    pub fn from_static_token(token: impl Into<String>) -> Self {
        Self::from_source(CredentialSource::Static(AccessToken::new(
            token,
            DateTime::<Utc>::MAX_UTC,
        )))
    }

    /// Short name of the selected source, for logs.
    pub fn kind(&self) -> &'static str {
        match self.inner.source {
            CredentialSource::ServicePrincipal { .. } => "service_principal",
            CredentialSource::ManagedIdentity { .. } => "managed_identity",
            CredentialSource::Static(_) => "static",
        }
    }

    /// Get a token for `scope`, reusing a cached one until shortly before it expires.
    pub async fn token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        if let CredentialSource::Static(token) = &self.inner.source {
            return Ok(token.clone());
        }

        if let Some(token) = self.cached(scope).await {
            return Ok(token);
        }

        let _refresh = self.inner.refresh.lock().await;
        // Another caller may have fetched it while we waited.
        if let Some(token) = self.cached(scope).await {
            return Ok(token);
        }

        let token = self.request_token(scope).await?;
        debug!(scope = %scope, expires_at = %token.expires_at(), "Acquired access token");

        self.inner
            .cache
            .write()
            .await
            .insert(scope.to_string(), token.clone());

        Ok(token)
    }

    async fn cached(&self, scope: &str) -> Option<AccessToken> {
        let margin = Duration::minutes(REFRESH_MARGIN_MINUTES);
        self.inner
            .cache
            .read()
            .await
            .get(scope)
            .filter(|token| !token.expires_within(margin, Utc::now()))
            .cloned()
    }

    async fn request_token(&self, scope: &str) -> Result<AccessToken, CredentialError> {
        let request = match &self.inner.source {
            CredentialSource::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
                authority_host,
                client,
            } => {
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority_host.trim_end_matches('/'),
                    tenant_id
                );
                client.post(url).form(&[
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                    ("scope", scope),
                ])
            }
            CredentialSource::ManagedIdentity {
                endpoint: Some((endpoint, header)),
                client_id,
                client,
            } => {
                let mut query = vec![
                    ("resource", scope_to_resource(scope)),
                    ("api-version", APP_SERVICE_API_VERSION),
                ];
                if let Some(id) = client_id.as_deref() {
                    query.push(("client_id", id));
                }
                client
                    .get(endpoint)
                    .query(&query)
                    .header("X-IDENTITY-HEADER", header)
            }
            CredentialSource::ManagedIdentity {
                endpoint: None,
                client_id,
                client,
            } => {
                let mut query = vec![
                    ("resource", scope_to_resource(scope)),
                    ("api-version", IMDS_API_VERSION),
                ];
                if let Some(id) = client_id.as_deref() {
                    query.push(("client_id", id));
                }
                client
                    .get(IMDS_TOKEN_ENDPOINT)
                    .query(&query)
                    .header("Metadata", "true")
            }
            CredentialSource::Static(token) => return Ok(token.clone()),
        };

        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;

        Ok(parsed.into_token(Utc::now()))
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("kind", &self.kind())
            .finish()
    }
}
