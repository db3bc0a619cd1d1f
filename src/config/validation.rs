//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate socket addresses, log filter directives and health credentials
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Non-positive durations are valid; they disable the bound

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("observability.log_filter is invalid: {0}")]
    LogFilter(String),

    #[error("health.auth.username must not be empty")]
    EmptyAuthUsername,
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if let Err(e) = EnvFilter::try_new(&observability.log_filter) {
        errors.push(ValidationError::LogFilter(e.to_string()));
    }

    if config.health.auth.as_ref().is_some_and(|auth| auth.username.is_empty()) {
        errors.push(ValidationError::EmptyAuthUsername);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
