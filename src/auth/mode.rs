//! Selection of the process-wide authentication mode.

use std::fmt;

use super::error::AuthError;
use super::key::{ApiKeyHash, GeneratedApiKey, HashAlgorithm, credential_lines};
use crate::config::{ConfigurationView, LayerData, keys};

/// What the operator asked for at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthRequest {
    /// Disable authentication entirely.
    pub no_auth: bool,
    /// Generate a key valid for this run only.
    pub use_temporary_key: bool,
}

/// Discriminant of [`AuthenticationMode`], safe to log and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthModeKind {
    /// No authentication.
    NoAuth,
    /// A key generated for this run.
    TemporaryKey,
    /// A key whose hash is configured.
    StoredKey,
}

impl AuthModeKind {
    /// Picks the mode for a request. `no_auth` wins over a temporary key.
    #[must_use]
    pub const fn for_request(request: AuthRequest) -> Self {
        if request.no_auth {
            Self::NoAuth
        } else if request.use_temporary_key {
            Self::TemporaryKey
        } else {
            Self::StoredKey
        }
    }

    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoAuth => "NoAuth",
            Self::TemporaryKey => "TemporaryKey",
            Self::StoredKey => "StoredKey",
        }
    }
}

impl fmt::Display for AuthModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authentication mode of this process. Immutable once selected.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthenticationMode {
    /// Every request is allowed.
    NoAuth,
    /// A key generated at startup. The raw key is kept only to show it once.
    TemporaryKey {
        /// Hash of the generated key.
        hash: ApiKeyHash,
        /// Bearer credential to print for the operator.
        raw_key_for_display: String,
    },
    /// A key whose hash comes from configuration.
    StoredKey {
        /// Hash configured at startup.
        hash: ApiKeyHash,
    },
}

impl AuthenticationMode {
    /// The mode's discriminant.
    #[must_use]
    pub const fn kind(&self) -> AuthModeKind {
        match self {
            Self::NoAuth => AuthModeKind::NoAuth,
            Self::TemporaryKey { .. } => AuthModeKind::TemporaryKey,
            Self::StoredKey { .. } => AuthModeKind::StoredKey,
        }
    }

    /// The key hash selected at startup, if key auth is enabled.
    #[must_use]
    pub const fn key_hash(&self) -> Option<&ApiKeyHash> {
        match self {
            Self::NoAuth => None,
            Self::TemporaryKey { hash, .. } | Self::StoredKey { hash } => Some(hash),
        }
    }

    /// Lines announcing a temporary key to the operator.
    #[must_use]
    pub fn temporary_key_lines(&self) -> Option<[String; 3]> {
        match self {
            Self::TemporaryKey {
                hash,
                raw_key_for_display,
            } => Some(credential_lines(raw_key_for_display, hash)),
            Self::NoAuth | Self::StoredKey { .. } => None,
        }
    }

    /// Returns `true` unless authentication is disabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoAuth)
    }
}

impl fmt::Debug for AuthenticationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuth => f.write_str("NoAuth"),
            Self::TemporaryKey { hash, .. } => f
                .debug_struct("TemporaryKey")
                .field("hash", hash)
                .field("raw_key_for_display", &"<redacted>")
                .finish(),
            Self::StoredKey { hash } => f.debug_struct("StoredKey").field("hash", hash).finish(),
        }
    }
}

/// Authentication decided before configuration is resolved.
///
/// Temporary keys are generated here so their hash can be injected into the
/// in-memory override layer; the raw key never enters configuration.
#[derive(Debug)]
pub struct PreparedAuth {
    kind: AuthModeKind,
    temporary: Option<GeneratedApiKey>,
}

impl PreparedAuth {
    /// The selected mode.
    #[must_use]
    pub const fn kind(&self) -> AuthModeKind {
        self.kind
    }

    /// Values to place in the in-memory override layer.
    #[must_use]
    pub fn config_overrides(&self) -> LayerData {
        let mut data = LayerData::new();
        if let Some(key) = &self.temporary {
            data.insert(keys::API_KEY_HASH.to_string(), key.hash().to_hex());
            data.insert(
                keys::API_KEY_HASH_TYPE.to_string(),
                key.hash().algorithm().to_string(),
            );
        }
        data
    }
}

/// Chooses exactly one [`AuthenticationMode`] per process.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthenticationModeSelector {
    algorithm: HashAlgorithm,
}

impl AuthenticationModeSelector {
    /// Creates a selector generating temporary keys with the default algorithm.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `algorithm` for temporary keys.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// First step: picks the mode and generates a temporary key if needed.
    #[must_use]
    pub fn prepare(&self, request: AuthRequest) -> PreparedAuth {
        let kind = AuthModeKind::for_request(request);
        let temporary =
            (kind == AuthModeKind::TemporaryKey).then(|| GeneratedApiKey::generate(self.algorithm));
        PreparedAuth { kind, temporary }
    }

    /// Second step: completes the mode from the resolved configuration.
    ///
    /// # Errors
    ///
    /// In stored-key mode, returns an error if the hash or its algorithm is
    /// missing or malformed.
    pub fn select(
        &self,
        prepared: PreparedAuth,
        view: &ConfigurationView,
    ) -> Result<AuthenticationMode, AuthError> {
        match (prepared.kind, prepared.temporary) {
            (AuthModeKind::NoAuth, _) => Ok(AuthenticationMode::NoAuth),
            (AuthModeKind::TemporaryKey, Some(key)) => {
                let (raw_key_for_display, hash) = key.into_parts();
                Ok(AuthenticationMode::TemporaryKey {
                    hash,
                    raw_key_for_display,
                })
            }
            // A temporary mode without a key cannot come out of `prepare`;
            // treat it like a stored key.
            (AuthModeKind::TemporaryKey | AuthModeKind::StoredKey, _) => {
                Ok(AuthenticationMode::StoredKey {
                    hash: stored_key_hash(view)?,
                })
            }
        }
    }

    /// Runs both steps against an already resolved view.
    ///
    /// # Errors
    ///
    /// See [`select`](Self::select).
    pub fn select_now(
        &self,
        request: AuthRequest,
        view: &ConfigurationView,
    ) -> Result<AuthenticationMode, AuthError> {
        self.select(self.prepare(request), view)
    }
}

/// Reads and validates the configured key hash.
///
/// # Errors
///
/// Returns an error if the hash or its algorithm is missing or malformed.
pub fn stored_key_hash(view: &ConfigurationView) -> Result<ApiKeyHash, AuthError> {
    let hash = view
        .get_non_empty(keys::API_KEY_HASH)
        .ok_or(AuthError::MissingSetting {
            key: keys::API_KEY_HASH,
        })?;
    let algorithm: HashAlgorithm = view
        .get_non_empty(keys::API_KEY_HASH_TYPE)
        .ok_or(AuthError::MissingSetting {
            key: keys::API_KEY_HASH_TYPE,
        })?
        .parse()?;
    ApiKeyHash::parse(algorithm, hash)
}
