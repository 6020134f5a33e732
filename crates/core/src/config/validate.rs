use super::{types::Config, ConfigError};

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let url = config.source.url.trim();
    if url.is_empty() {
        return Err(invalid("source.url cannot be empty"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(invalid("source.url must be an http(s) URL"));
    }
    if config.source.timeout_secs == 0 {
        return Err(invalid("source.timeout_secs must be > 0"));
    }

    if config.import.batch_size == 0 {
        return Err(invalid("import.batch_size must be > 0"));
    }
    if config.import.store_batch_size == 0 {
        return Err(invalid("import.store_batch_size must be > 0"));
    }
    if config.import.retention_days == 0 {
        return Err(invalid("import.retention_days must be > 0"));
    }

    if config.updater.check_freshness && config.updater.max_age_days == 0 {
        return Err(invalid(
            "updater.max_age_days must be > 0 when check_freshness is enabled",
        ));
    }
    if config.updater.enabled && config.updater.poll_interval_secs == 0 {
        return Err(invalid("updater.poll_interval_secs must be > 0"));
    }

    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
