//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate endpoint URL and resource paths
//! - Validate value ranges (intervals > 0, history capacity bounded)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TelemetryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::TelemetryConfig;

/// Largest accepted per-replica history capacity.
pub const MAX_HISTORY_CAPACITY: usize = 10_000;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("endpoint.base_url '{0}' is not a valid http(s) URL")]
    InvalidBaseUrl(String),

    #[error("{field} must start with '/', got '{value}'")]
    InvalidPath { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("history.max_samples must be between 1 and 10000, got {0}")]
    HistoryCapacity(usize),

    #[error("stream.reconnect.base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &TelemetryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.base_url() {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(config.endpoint.base_url.clone())),
    }

    let paths = [
        ("endpoint.stream_path", &config.endpoint.stream_path),
        ("endpoint.rate_limit_path", &config.endpoint.rate_limit_path),
        ("endpoint.circuit_breaker_path", &config.endpoint.circuit_breaker_path),
        ("endpoint.load_balancer_path", &config.endpoint.load_balancer_path),
    ];
    for (field, value) in paths {
        if !value.starts_with('/') {
            errors.push(ValidationError::InvalidPath {
                field,
                value: value.clone(),
            });
        }
    }

    if config.polling.interval_ms == 0 {
        errors.push(ValidationError::Zero("polling.interval_ms"));
    }
    if config.polling.timeout_ms == 0 {
        errors.push(ValidationError::Zero("polling.timeout_ms"));
    }
    if config.dashboard.refresh_ms == 0 {
        errors.push(ValidationError::Zero("dashboard.refresh_ms"));
    }

    let capacity = config.history.max_samples;
    if capacity == 0 || capacity > MAX_HISTORY_CAPACITY {
        errors.push(ValidationError::HistoryCapacity(capacity));
    }

    let reconnect = &config.stream.reconnect;
    if reconnect.base_delay_ms > reconnect.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: reconnect.base_delay_ms,
            max: reconnect.max_delay_ms,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
