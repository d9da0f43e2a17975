//! # Design
//!
//! - Keep error messages constant; carry the offending variable in fields.
//! - Preserve `.env` parsing sources for diagnostics.

use thiserror::Error;

/// Primary error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was present but could not be parsed or failed validation.
    #[error("invalid configuration field")]
    InvalidField {
        /// Environment variable or field name.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A `.env` file existed but could not be read or parsed.
    #[error("failed to load .env file")]
    EnvFile {
        /// Underlying dotenvy error.
        source: dotenvy::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidField {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
