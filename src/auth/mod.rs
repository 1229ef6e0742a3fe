//! Authentication and authorization for the control surface.
//!
//! This module provides:
//! - API key hashing, verification and generation ([`ApiKeyHash`], [`GeneratedApiKey`])
//! - Process-wide mode selection ([`AuthenticationModeSelector`], [`AuthenticationMode`])
//! - The scheme/policy table ([`AuthPlan`]) and its request middleware
//!   ([`require_authorized_user`])
//!
//! # Mode precedence
//!
//! `--no-auth` wins over `--temp-apikey`, which wins over the default
//! stored-key mode. Stored-key mode without a valid configured hash is a
//! fatal startup error.

mod error;
mod key;
mod middleware;
mod mode;
mod policy;


pub use error::AuthError;
pub use key::{
    API_KEY_SCHEME, ApiKeyHash, GENERATED_KEY_BYTES, GeneratedApiKey, HashAlgorithm, credential_lines,
};
pub use middleware::{AuthState, require_authorized_user};
pub use mode::{
    AuthModeKind, AuthRequest, AuthenticationMode, AuthenticationModeSelector, PreparedAuth,
    stored_key_hash,
};
pub use policy::{
    AUTHORIZED_USER_POLICY, AuthPlan, AuthScheme, AuthorizationPolicy, Decision, Identity,
    NEGOTIATE_SCHEME, Principal, current_os_user,
};
