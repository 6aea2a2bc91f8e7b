//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationIssue};

/// Environment variable overriding `scorer.api_key`.
pub const SCORER_API_KEY_ENV: &str = "SCORER_API_KEY";
/// Environment variable overriding `admin.api_key`.
pub const ADMIN_API_KEY_ENV: &str = "ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse, apply environment overrides and validate.
pub fn parse_config(content: &str) -> Result<ServiceConfig, ConfigError> {
    let mut config: ServiceConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets may come from the environment instead of the file.
pub fn apply_env_overrides(config: &mut ServiceConfig) {
    if let Ok(key) = std::env::var(SCORER_API_KEY_ENV) {
        if !key.is_empty() {
            config.scorer.api_key = Some(key);
        }
    }
    if let Ok(key) = std::env::var(ADMIN_API_KEY_ENV) {
        if !key.is_empty() {
            config.admin.api_key = key;
        }
    }
}
