//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, timeouts > 0, addresses parse)
//! - Catch unsafe combinations (admin enabled with the placeholder key)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationIssue>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{ServiceConfig, PLACEHOLDER_ADMIN_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ValidationIssue::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        issues.push(ValidationIssue::new("server.request_timeout_secs", "must be greater than zero"));
    }

    if config.breaker.failure_threshold == 0 {
        issues.push(ValidationIssue::new("breaker.failure_threshold", "must be greater than zero"));
    }
    if config.breaker.success_threshold == 0 {
        issues.push(ValidationIssue::new("breaker.success_threshold", "must be greater than zero"));
    }

    let orch = &config.orchestrator;
    if orch.max_batch_size == 0 {
        issues.push(ValidationIssue::new("orchestrator.max_batch_size", "must be greater than zero"));
    }
    if orch.max_items == 0 {
        issues.push(ValidationIssue::new("orchestrator.max_items", "must be greater than zero"));
    }
    if orch.max_batch_size > orch.max_items {
        issues.push(ValidationIssue::new(
            "orchestrator.max_batch_size",
            format!("{} exceeds max_items ({})", orch.max_batch_size, orch.max_items),
        ));
    }
    if orch.chunk_timeout_ms == 0 {
        issues.push(ValidationIssue::new("orchestrator.chunk_timeout_ms", "must be greater than zero"));
    }
    if orch.abort_failure_threshold == 0 {
        issues.push(ValidationIssue::new(
            "orchestrator.abort_failure_threshold",
            "must be greater than zero",
        ));
    }

    if config.cache.ttl_secs == 0 {
        issues.push(ValidationIssue::new("cache.ttl_secs", "must be greater than zero"));
    }

    match Url::parse(&config.scorer.endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => issues.push(ValidationIssue::new(
            "scorer.endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => issues.push(ValidationIssue::new("scorer.endpoint", e.to_string())),
    }
    if config.scorer.timeout_ms == 0 {
        issues.push(ValidationIssue::new("scorer.timeout_ms", "must be greater than zero"));
    }
    if config.scorer.max_attempts == 0 {
        issues.push(ValidationIssue::new("scorer.max_attempts", "must be at least 1"));
    }

    if config.persistence.enabled && config.persistence.path.as_deref().map_or(true, str::is_empty) {
        issues.push(ValidationIssue::new("persistence.path", "required when persistence is enabled"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ValidationIssue::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && (config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_ADMIN_KEY) {
        issues.push(ValidationIssue::new("admin.api_key", "set a real key before enabling the admin API"));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
