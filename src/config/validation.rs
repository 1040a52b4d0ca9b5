//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates > 0, addresses parse)
//! - Check that trusted origins are usable as header values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::data::{MAX_PASSWORD_COST, MIN_PASSWORD_COST};

/// A single semantic problem with a configuration.
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

/// Check every semantic constraint on `config`.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    let limiter = &config.rate_limit;
    if !(limiter.requests_per_second.is_finite() && limiter.requests_per_second > 0.0) {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_second",
            "must be a positive number",
        ));
    }
    if limiter.burst == 0 {
        errors.push(ValidationError::new("rate_limit.burst", "must be at least 1"));
    }
    if limiter.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be greater than zero",
        ));
    }
    if limiter.stale_after_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.stale_after_secs",
            "must be greater than zero",
        ));
    }

    if config.store.timeout_secs == 0 {
        errors.push(ValidationError::new("store.timeout_secs", "must be greater than zero"));
    }

    if config.tokens.activation_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.activation_ttl_secs",
            "must be greater than zero",
        ));
    }
    if config.tokens.authentication_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "tokens.authentication_ttl_secs",
            "must be greater than zero",
        ));
    }

    for origin in &config.cors.trusted_origins {
        if HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::new(
                "cors.trusted_origins",
                format!("'{origin}' is not a valid header value"),
            ));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than zero"));
    }

    if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&config.security.password_cost) {
        errors.push(ValidationError::new(
            "security.password_cost",
            format!("must be between {} and {}", MIN_PASSWORD_COST, MAX_PASSWORD_COST),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.requests_per_second = 0.0;
        config.rate_limit.burst = 0;
        config.store.timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "rate_limit.requests_per_second",
                "rate_limit.burst",
                "store.timeout_secs",
            ]
        );
    }

    #[test]
    fn test_rejects_non_finite_rate() {
        let mut config = AppConfig::default();
        config.rate_limit.requests_per_second = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_password_cost_bounds() {
        let mut config = AppConfig::default();
        config.security.password_cost = 3;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "security.password_cost");

        config.security.password_cost = MIN_PASSWORD_COST;
        assert!(validate_config(&config).is_ok());
    }
}
