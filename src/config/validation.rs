//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, batch sizes >= 1)
//! - Check that referenced endpoints parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RateLimitConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let gateway = &config.gateway;
    if gateway.timeout_ms == 0 {
        errors.push(ValidationError::new("gateway.timeout_ms", "must be greater than 0"));
    }
    if gateway.retries == 0 {
        errors.push(ValidationError::new("gateway.retries", "must be at least 1"));
    }
    if gateway.cache_enabled && gateway.cache_ttl_ms == 0 {
        errors.push(ValidationError::new(
            "gateway.cache_ttl_ms",
            "must be greater than 0 when caching is enabled",
        ));
    }
    if gateway.max_result_size == 0 {
        errors.push(ValidationError::new("gateway.max_result_size", "must be at least 1"));
    }

    let audit = &config.audit;
    if audit.batch_size == 0 {
        errors.push(ValidationError::new("audit.batch_size", "must be at least 1"));
    }
    if audit.batch_timeout_ms == 0 {
        errors.push(ValidationError::new("audit.batch_timeout_ms", "must be greater than 0"));
    }
    if audit.max_pending < audit.batch_size {
        errors.push(ValidationError::new(
            "audit.max_pending",
            format!("must be at least batch_size ({})", audit.batch_size),
        ));
    }
    if audit.table.trim().is_empty() {
        errors.push(ValidationError::new("audit.table", "must not be empty"));
    }

    check_rate_limit("monitor.rate_limit", &config.monitor.rate_limit, &mut errors);
    check_rate_limit("monitor.login_rate_limit", &config.monitor.login_rate_limit, &mut errors);
    if config.monitor.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("monitor.sweep_interval_secs", "must be greater than 0"));
    }

    if let Err(e) = Url::parse(&config.store.base_url) {
        errors.push(ValidationError::new("store.base_url", format!("invalid URL: {}", e)));
    }

    if config.admin.enabled && config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
        errors.push(ValidationError::new(
            "admin.api_key",
            "placeholder key must be replaced when the admin API is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_rate_limit(field: &'static str, limit: &RateLimitConfig, errors: &mut Vec<ValidationError>) {
    if limit.max_attempts == 0 {
        errors.push(ValidationError::new(field, "max_attempts must be at least 1"));
    }
    if limit.window_ms == 0 {
        errors.push(ValidationError::new(field, "window_ms must be greater than 0"));
    }
}
