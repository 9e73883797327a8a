//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation of the framework sub-record (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject channel names `EnvFilter` cannot express
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FrameworkConfig → Result<(), Vec<ValidationError>>
//! - Runs before observability is initialized

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{FrameworkConfig, LogOutput};

/// Upper bound for `shutdown_timeout_secs`.
pub const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 3600;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate the framework sub-record.
pub fn validate_framework(config: &FrameworkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service_name.trim().is_empty() {
        errors.push(ValidationError::new("framework.service_name", "must not be empty"));
    }

    if config.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "framework.shutdown_timeout_secs",
            "must be greater than zero",
        ));
    } else if config.shutdown_timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS {
        errors.push(ValidationError::new(
            "framework.shutdown_timeout_secs",
            format!("must be at most {}", MAX_SHUTDOWN_TIMEOUT_SECS),
        ));
    }

    if config.logging.output == LogOutput::File && config.logging.file_path.trim().is_empty() {
        errors.push(ValidationError::new(
            "framework.logging.file_path",
            "required when output is 'file'",
        ));
    }

    for channel in config.logging.filtered_channels.keys() {
        let valid = !channel.is_empty()
            && channel
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'));
        if !valid {
            errors.push(ValidationError::new(
                format!("framework.logging.filtered_channels.{}", channel),
                "invalid channel name",
            ));
        }
    }

    if let Some(endpoint) = &config.otlp_endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ValidationError::new(
                "framework.otlp_endpoint",
                format!("'{}' must be an http:// or https:// URL", endpoint),
            ));
        }
    }

    if let Some(addr) = &config.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "framework.metrics_address",
                format!("'{}' is not a socket address", addr),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
