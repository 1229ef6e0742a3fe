//! Error types for listener binding.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Why certificate material could not be turned into a TLS configuration.
#[derive(Debug, Error)]
pub enum TlsMaterialError {
    /// No certificate or key path is configured.
    #[error("no certificate configured (set Tls:Certificate:Path and Tls:Certificate:KeyPath)")]
    NotConfigured,

    /// A configured file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Unreadable {
        /// The file that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A configured file is not valid PEM for its purpose.
    #[error("invalid PEM in '{}': {reason}", path.display())]
    InvalidPem {
        /// The file that failed.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// The certificate and key were read but rejected by the TLS stack.
    #[error("certificate rejected: {0}")]
    Rejected(#[from] rustls::Error),
}

impl TlsMaterialError {
    /// Returns `true` when the material is absent or unusable, which makes
    /// an `https` listener fall back to plaintext instead of failing.
    #[must_use]
    pub const fn is_missing_material(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Error type for binding one listener. Always fatal for the process.
#[derive(Debug, Error)]
pub enum BindError {
    /// The URL cannot be bound.
    #[error("Invalid listener URL '{url}': {reason}")]
    InvalidUrl {
        /// The configured URL.
        url: String,
        /// What was wrong.
        reason: String,
    },

    /// The host name did not resolve to any address.
    #[error("Cannot resolve host for '{url}': {source}")]
    Resolve {
        /// The configured URL.
        url: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The socket could not be bound (for example, address in use).
    #[error("Cannot bind {addr} for '{url}': {source}")]
    Bind {
        /// The configured URL.
        url: String,
        /// The address that failed.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Certificate material exists but is unusable in a way that does not
    /// permit plaintext fallback.
    #[error("TLS setup failed for '{url}': {source}")]
    Tls {
        /// The configured URL.
        url: String,
        /// Underlying TLS error.
        #[source]
        source: TlsMaterialError,
    },
}
