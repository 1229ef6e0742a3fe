//! Error types for authentication setup.

use thiserror::Error;

/// Error type for authentication mode selection.
///
/// Every variant is a fatal validation failure: the agent must not serve a
/// control surface whose key material it cannot check.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A setting required for stored-key mode is absent.
    #[error(
        "API key authentication is enabled but {key} is not configured. \
         Configure a key (see `diagmon generatekey`), or start with --temp-apikey or --no-auth"
    )]
    MissingSetting {
        /// Configuration key
        key: &'static str,
    },

    /// The configured hash algorithm is not supported.
    #[error("Unsupported API key hash algorithm '{0}' (expected SHA256, SHA384 or SHA512)")]
    UnsupportedAlgorithm(String),

    /// The configured hash is not valid for its algorithm.
    #[error("Invalid API key hash: {0}")]
    MalformedHash(String),
}
