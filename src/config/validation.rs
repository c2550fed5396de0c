//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit > 0, timeout > 0)
//! - Check that persistent mode has somewhere to write its log
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - The placeholder secret is a warning, not an error, so local runs work;
//!   warnings are returned so the caller can log them once logging is up

use std::net::SocketAddr;

use crate::config::schema::{AppConfig, DatabaseMode, DEFAULT_SECRET};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
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

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than zero"));
    }
    if config.listener.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than zero"));
    }

    if config.session.secret.is_empty() {
        errors.push(ValidationError::new("session.secret", "must not be empty"));
    }
    if !is_cookie_token(&config.session.cookie_name) {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must be a non-empty cookie token",
        ));
    }

    if config.csrf.enabled && config.csrf.form_field.is_empty() {
        errors.push(ValidationError::new("csrf.form_field", "must not be empty when CSRF is enabled"));
    }

    if config.database.mode == DatabaseMode::Persistent && config.database.log_path.is_none() {
        errors.push(ValidationError::new("database.log_path", "required in persistent mode"));
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

/// Settings that are valid but unsafe outside local runs.
pub fn config_warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.session.secret == DEFAULT_SECRET {
        warnings.push("session.secret is the built-in placeholder; set a real secret in production".to_string());
    }
    if !config.session.secure {
        warnings.push("session.secure is off; the session cookie is sent over plain HTTP".to_string());
    }
    warnings
}

fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}
