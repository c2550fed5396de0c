//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! dispatch pipeline. All types derive Serde traits for deserialization from
//! config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::security::CSRF_FORM_FIELD;

/// Placeholder secret shipped in defaults. Validation warns when it is used.
pub const DEFAULT_SECRET: &str = "CHANGE_ME_IN_PRODUCTION";

/// Root configuration for the application.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// Database connection mode.
    pub database: DatabaseConfig,

    /// Static file fallback.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Optional request timeout in seconds. Absent means no timeout layer.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            request_timeout_secs: None,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name carrying the signed session.
    pub cookie_name: String,

    /// Signing secret for session cookies and CSRF tokens.
    pub secret: String,

    /// Add the `Secure` attribute.
    pub secure: bool,

    /// `Max-Age` in seconds. Absent means a browser-session cookie.
    pub max_age_secs: Option<u64>,

    /// `Domain` attribute.
    pub domain: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            // WARNING: This is a placeholder! Change this in production.
            secret: DEFAULT_SECRET.to_string(),
            secure: false,
            max_age_secs: None,
            domain: None,
        }
    }
}

/// CSRF protection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Validate tokens on POST/PUT/PATCH/DELETE routes.
    pub enabled: bool,

    /// Hidden form field carrying the token.
    pub form_field: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            form_field: CSRF_FORM_FIELD.to_string(),
        }
    }
}

/// How each request obtains its database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseMode {
    /// No database; `Context::db` is `None`.
    #[default]
    None,
    /// A fresh in-memory connection per request.
    Ephemeral,
    /// A log-backed connection.
    Persistent,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection mode.
    pub mode: DatabaseMode,

    /// Transaction log for persistent mode.
    pub log_path: Option<PathBuf>,

    /// Persistent mode only: share one connection across requests (written
    /// back after each request) instead of replaying the log per request.
    pub shared: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mode: DatabaseMode::None,
            log_path: None,
            shared: true,
        }
    }
}

/// Static file fallback configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory served for unmatched GET requests.
    pub root: Option<PathBuf>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
