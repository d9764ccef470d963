use super::{types::Config, ConfigError};
use crate::storage::ConnectionString;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Poll interval is non-zero and shorter than the poll timeout
/// - Storage connection string, when present, parses
/// - Remote call timeouts are non-zero
/// - Trigger identifiers, when a trigger is configured, are not blank
///
/// A missing storage connection string is not an error here; it is reported
/// when the first event is handled.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.poll.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "poll.interval_secs cannot be 0".to_string(),
        ));
    }

    if config.poll.interval_secs >= config.poll.timeout_secs {
        return Err(ConfigError::ValidationError(format!(
            "poll.interval_secs ({}) must be less than poll.timeout_secs ({})",
            config.poll.interval_secs, config.poll.timeout_secs
        )));
    }

    if config.events.domain_marker.is_empty() {
        return Err(ConfigError::ValidationError(
            "events.domain_marker cannot be empty".to_string(),
        ));
    }

    if config.storage.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "storage.request_timeout_secs cannot be 0".to_string(),
        ));
    }

    if let Some(conn) = config.storage.connection_string.as_deref() {
        if !conn.trim().is_empty() {
            ConnectionString::parse(conn).map_err(|e| {
                ConfigError::ValidationError(format!("storage.connection_string: {}", e))
            })?;
        }
    }

    if let Some(trigger) = &config.trigger {
        if trigger.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "trigger.timeout_secs cannot be 0".to_string(),
            ));
        }

        for (name, value) in [
            ("trigger.subscription_id", &trigger.subscription_id),
            ("trigger.resource_group", &trigger.resource_group),
            ("trigger.container_group_name", &trigger.container_group_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }
    }

    Ok(())
}
