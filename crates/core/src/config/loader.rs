use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `BLOBGATE_POLL__TIMEOUT_SECS=30`.
pub const ENV_PREFIX: &str = "BLOBGATE_";

/// Unprefixed variable names understood for compatibility with existing
/// deployments, mapped to their config key.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("APP_STORAGE_CONNECTION", "storage.connection_string"),
    ("FILE_CHECK_TIMEOUT", "poll.timeout_secs"),
    ("FILE_CHECK_INTERVAL", "poll.interval_secs"),
    ("SUBSCRIPTION_ID", "trigger.subscription_id"),
    ("RG_NAME", "trigger.resource_group"),
    ("CONTAINER_GROUP_NAME", "trigger.container_group_name"),
    ("AZURE_TENANT_ID", "credential.tenant_id"),
    ("CICD_CLIENT_ID", "credential.client_id"),
    ("CICD_CLIENT_SECRET", "credential.client_secret"),
    ("IDENTITY_ENDPOINT", "credential.identity_endpoint"),
    ("IDENTITY_HEADER", "credential.identity_header"),
];

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, path)| (*path).into())
    })
}

/// Load configuration from an optional TOML file with environment overrides.
///
/// Precedence, lowest first: file, legacy variables, `BLOBGATE_` variables.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let config: Config = figment
        .merge(legacy_env())
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
