//! Error types for configuration validation.

use thiserror::Error;

/// Error type for configuration operations.
///
/// Only semantic validation of the merged view is an error. Problems with an
/// individual layer are reported as [`super::LayerLoad`] outcomes instead, so
/// a broken file never stops the others from contributing.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value could not be parsed into the expected type.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// The offending value
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Missing required value.
    #[error("Missing required value: {key}. {hint}")]
    MissingRequired {
        /// Configuration key
        key: &'static str,
        /// Hint for how to provide the value
        hint: &'static str,
    },

    /// Failed to serialize the configuration for display.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an `InvalidValue` error.
    #[must_use]
    pub fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `MissingRequired` error for a required key.
    #[must_use]
    pub const fn missing(key: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { key, hint }
    }
}
