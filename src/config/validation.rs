use crate::config::run::{RunConfig, MAX_TIMEOUT_SECS};
use crate::config::target::validate_slug;
use crate::config::types::{ApiConfig, Config, OutputConfig, ToolConfig};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.crawl)?;
    validate_tool_config(&config.tool)?;
    validate_api_config(&config.api)?;
    validate_output_config(&config.output)?;

    if let Some(slug) = &config.target.slug {
        validate_slug(slug)?;
    }

    Ok(())
}

/// Validates crawl parameters
///
/// Also run on the parameters after command-line overrides have been applied.
pub fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    if config.limit < 1 {
        return Err(ConfigError::Validation(format!(
            "limit must be >= 1, got {}",
            config.limit
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.poll_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "poll_interval must be >= 1s, got {}s",
            config.poll_interval_secs
        )));
    }

    if config.timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "timeout must be >= 1s; omit it to wait indefinitely".to_string(),
        ));
    }

    if let Some(timeout) = config.timeout_secs.filter(|t| *t > MAX_TIMEOUT_SECS) {
        return Err(ConfigError::Validation(format!(
            "timeout must be <= {}s, got {}s; omit it to wait indefinitely",
            MAX_TIMEOUT_SECS, timeout
        )));
    }

    for pattern in config.include_paths.iter().chain(&config.exclude_paths) {
        if pattern.trim().is_empty() || pattern.contains(',') {
            return Err(ConfigError::Validation(format!(
                "path patterns must be non-empty and must not contain ',', got '{}'",
                pattern
            )));
        }
    }

    Ok(())
}

/// Validates the crawl tool invocation
fn validate_tool_config(config: &ToolConfig) -> Result<(), ConfigError> {
    if config.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "tool command cannot be empty".to_string(),
        ));
    }

    if config.output_file.is_empty() {
        return Err(ConfigError::Validation(
            "tool output_file cannot be empty".to_string(),
        ));
    }

    let output = Path::new(&config.output_file);
    if output.is_absolute() || output.components().any(|c| c.as_os_str() == "..") {
        return Err(ConfigError::Validation(format!(
            "tool output_file must be a relative path inside the artifact directory, got '{}'",
            config.output_file
        )));
    }

    Ok(())
}

/// Validates the remote job API configuration
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api base_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "api base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1s, got {}s",
            config.request_timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.artifact_root.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_root cannot be empty".to_string(),
        ));
    }

    Ok(())
}
