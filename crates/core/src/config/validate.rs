use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Backend base URL is non-empty and uses http or https
/// - Timeouts and the poll interval are not 0
/// - Poll ceilings, when set, are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base_url = config.backend.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "backend.base_url cannot be empty".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "backend.base_url must start with http:// or https://, got {}",
            base_url
        )));
    }

    if config.backend.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "backend.request_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.backend.upload_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "backend.upload_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.polling.interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "polling.interval_ms cannot be 0".to_string(),
        ));
    }
    if config.polling.max_attempts == Some(0) {
        return Err(ConfigError::ValidationError(
            "polling.max_attempts cannot be 0".to_string(),
        ));
    }
    if config.polling.max_duration_secs == Some(0) {
        return Err(ConfigError::ValidationError(
            "polling.max_duration_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
