use crate::config::types::{
    Config, DocumentsConfig, FetchConfig, RateLimitConfig, SmmsConfig, StorageConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_documents_config(&config.documents)?;
    validate_storage_config(&config.storage)?;
    validate_fetch_config(&config.fetch)?;
    validate_rate_limit_config(&config.rate_limit)?;
    if let Some(smms) = &config.smms {
        validate_smms_config(smms)?;
    }
    Ok(())
}

fn validate_documents_config(config: &DocumentsConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "documents.root cannot be empty".to_string(),
        ));
    }

    let extension = config.extension.trim_start_matches('.');
    if extension.is_empty() {
        return Err(ConfigError::Validation(
            "documents.extension cannot be empty".to_string(),
        ));
    }

    if extension.contains(['/', '\\']) {
        return Err(ConfigError::Validation(format!(
            "documents.extension must be a bare extension, got '{}'",
            config.extension
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.image_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage.image-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "fetch.timeout-secs must be between 1 and 600, got {}",
            config.timeout_secs
        )));
    }

    if config.concurrency < 1 || config.concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "fetch.concurrency must be between 1 and 32, got {}",
            config.concurrency
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "fetch.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit.per-minute must be >= 1, got {}",
            config.per_minute
        )));
    }

    if config.per_hour < config.per_minute {
        return Err(ConfigError::Validation(format!(
            "rate-limit.per-hour ({}) must be >= per-minute ({})",
            config.per_hour, config.per_minute
        )));
    }

    Ok(())
}

fn validate_smms_config(config: &SmmsConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint).map_err(|e| {
        ConfigError::Validation(format!("Invalid smms.endpoint '{}': {}", config.endpoint, e))
    })?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "smms.endpoint must use http or https, got '{}'",
            config.endpoint
        )));
    }

    Ok(())
}
