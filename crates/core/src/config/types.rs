use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::gate::PollPolicy;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub events: EventsConfig,
    /// Downstream compute resource. Without it the gate still runs but
    /// nothing can be started.
    #[serde(default)]
    pub trigger: Option<TriggerConfig>,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How many recent event outcomes are kept for inspection.
    #[serde(default = "default_outcome_history")]
    pub outcome_history: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outcome_history: default_outcome_history(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

fn default_outcome_history() -> usize {
    100
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Storage connection string. Required before any event can be handled.
    #[serde(default)]
    pub connection_string: Option<String>,
    /// Container holding the required artifacts when the job config does not
    /// name one. Falls back to the container of the job config itself.
    #[serde(default)]
    pub artifact_container: Option<String>,
    /// Per-request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            artifact_container: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// Default poll cadence for the readiness gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollConfig {
    /// Per-artifact budget in seconds (default: 10)
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
    /// Delay between checks in seconds (default: 2)
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            interval_secs: default_poll_interval(),
        }
    }
}

impl PollConfig {
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.timeout_secs),
            Duration::from_secs(self.interval_secs),
        )
    }
}

fn default_poll_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    2
}

/// Inbound notification decoding
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Marker separating the account host from `<container>/<path>` in blob URLs.
    #[serde(default = "default_domain_marker")]
    pub domain_marker: String,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            domain_marker: default_domain_marker(),
        }
    }
}

fn default_domain_marker() -> String {
    crate::event::DEFAULT_DOMAIN_MARKER.to_string()
}

/// Container group started once every artifact is present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub container_group_name: String,
    /// Resource manager endpoint (default: public cloud)
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

/// Credentials for bearer-token authenticated calls.
///
/// When tenant, client id and secret are all present a service principal is
/// used; otherwise the ambient managed identity is discovered.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialConfig {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Login endpoint (default: public cloud)
    #[serde(default)]
    pub authority_host: Option<String>,
    /// Managed identity endpoint provided by the hosting platform.
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    #[serde(default)]
    pub identity_header: Option<String>,
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: SanitizedStorageConfig,
    pub poll: PollConfig,
    pub events: EventsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerConfig>,
    pub credential: SanitizedCredentialConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub connection_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_container: Option<String>,
    pub request_timeout_secs: u64,
}

/// Sanitized credential config (secret hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialConfig {
    /// "service_principal" or "managed_identity"
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let credential = &config.credential;
        let method = if crate::credential::has_service_principal(credential) {
            "service_principal"
        } else {
            "managed_identity"
        };

        Self {
            server: config.server.clone(),
            storage: SanitizedStorageConfig {
                connection_configured: config
                    .storage
                    .connection_string
                    .as_deref()
                    .is_some_and(|s| !s.trim().is_empty()),
                artifact_container: config.storage.artifact_container.clone(),
                request_timeout_secs: config.storage.request_timeout_secs,
            },
            poll: config.poll.clone(),
            events: config.events.clone(),
            trigger: config.trigger.clone(),
            credential: SanitizedCredentialConfig {
                method: method.to_string(),
                tenant_id: credential.tenant_id.clone(),
                client_id: credential.client_id.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.poll.timeout_secs, 10);
        assert_eq!(config.poll.interval_secs, 2);
        assert_eq!(config.events.domain_marker, ".blob.core.windows.net/");
        assert!(config.storage.connection_string.is_none());
        assert!(config.trigger.is_none());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
outcome_history = 10

[storage]
connection_string = "UseDevelopmentStorage=true"
artifact_container = "pipeline-files"

[poll]
timeout_secs = 60
interval_secs = 5

[trigger]
subscription_id = "sub-1"
resource_group = "rg-jobs"
container_group_name = "acg-worker"

[credential]
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.outcome_history, 10);
        assert_eq!(
            config.storage.artifact_container.as_deref(),
            Some("pipeline-files")
        );
        assert_eq!(config.poll.policy().timeout, Duration::from_secs(60));
        assert_eq!(config.poll.policy().interval, Duration::from_secs(5));

        let trigger = config.trigger.as_ref().unwrap();
        assert_eq!(trigger.resource_group, "rg-jobs");
        assert_eq!(trigger.management_endpoint, "https://management.azure.com");
        assert_eq!(trigger.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_trigger_missing_field_fails() {
        let toml = r#"
[trigger]
resource_group = "rg-jobs"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config = Config::default();
        config.storage.connection_string =
            Some("AccountName=acct;AccountKey=c2VjcmV0".to_string());
        config.credential = CredentialConfig {
            tenant_id: Some("tenant".to_string()),
            client_id: Some("client".to_string()),
            client_secret: Some("very-secret".to_string()),
            ..Default::default()
        };

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.storage.connection_configured);
        assert_eq!(sanitized.credential.method, "service_principal");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("very-secret"));
        assert!(!json.contains("c2VjcmV0"));
    }

    #[test]
    fn test_sanitized_config_managed_identity() {
        let sanitized = SanitizedConfig::from(&Config::default());
        assert!(!sanitized.storage.connection_configured);
        assert_eq!(sanitized.credential.method, "managed_identity");
        assert!(sanitized.trigger.is_none());
    }
}
