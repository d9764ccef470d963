//! Storage connection string parsing.

use super::StorageError;

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

const DEFAULT_PROTOCOL: &str = "https";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// A parsed storage connection string.
///
/// Understands `AccountName`, `AccountKey`, `DefaultEndpointsProtocol`,
/// `EndpointSuffix`, `BlobEndpoint`, `SharedAccessSignature` and
/// `UseDevelopmentStorage=true`. Other keys are ignored.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub blob_endpoint: String,
    pub sas_token: Option<String>,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut suffix = None;
        let mut blob_endpoint = None;
        let mut sas_token = None;
        let mut development = false;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (keys, SAS tokens) may themselves contain '='.
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StorageError::InvalidConnectionString(format!("segment without '=': {}", part))
            })?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => account_name = Some(value),
                "accountkey" => account_key = Some(value),
                "defaultendpointsprotocol" => protocol = Some(value),
                "endpointsuffix" => suffix = Some(value),
                "blobendpoint" => blob_endpoint = Some(value),
                "sharedaccesssignature" => {
                    sas_token = Some(value.trim_start_matches('?').to_string())
                }
                "usedevelopmentstorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Ok(Self {
                account_name: Some(DEV_ACCOUNT_NAME.to_string()),
                account_key: Some(DEV_ACCOUNT_KEY.to_string()),
                blob_endpoint: blob_endpoint.unwrap_or_else(|| DEV_BLOB_ENDPOINT.to_string()),
                sas_token: None,
            });
        }

        if account_key.is_some() && account_name.is_none() {
            return Err(StorageError::InvalidConnectionString(
                "AccountKey requires AccountName".to_string(),
            ));
        }

        let blob_endpoint = match (blob_endpoint, &account_name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!(
                "{}://{}.blob.{}",
                protocol.as_deref().unwrap_or(DEFAULT_PROTOCOL),
                account,
                suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX)
            ),
            (None, None) => {
                return Err(StorageError::InvalidConnectionString(
                    "neither BlobEndpoint nor AccountName is set".to_string(),
                ))
            }
        };

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint: blob_endpoint.trim_end_matches('/').to_string(),
            sas_token,
        })
    }
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &self.account_key.as_ref().map(|_| "<redacted>"))
            .field("blob_endpoint", &self.blob_endpoint)
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
