//! Authentication schemes and the authorization policy.
//!
//! [`AuthPlan::for_mode`] is the single table mapping a mode to the schemes
//! the request pipeline registers and the policy it enforces. It is
//! evaluated once at startup.

use std::fmt;

use super::key::API_KEY_SCHEME;
use super::mode::{AuthModeKind, AuthenticationMode};

/// Name of the one authorization policy guarding the control surface.
pub const AUTHORIZED_USER_POLICY: &str = "AuthorizedUserPolicy";

/// Name of the OS-integrated negotiation scheme.
pub const NEGOTIATE_SCHEME: &str = "Negotiate";

/// A request authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// `Authorization: MonitorApiKey <key>`.
    MonitorApiKey,
    /// OS-integrated negotiation (Windows only).
    Negotiate,
}

impl AuthScheme {
    /// Header spelling of the scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MonitorApiKey => API_KEY_SCHEME,
            Self::Negotiate => NEGOTIATE_SCHEME,
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Holder of this process's API key.
    ApiKeyHolder,
    /// An OS account, as `DOMAIN\user` or `user`.
    OsUser(String),
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Scheme that authenticated the caller.
    pub scheme: AuthScheme,
    /// The authenticated identity.
    pub identity: Identity,
}

impl Principal {
    /// The principal created by a valid API key.
    #[must_use]
    pub const fn api_key_holder() -> Self {
        Self {
            scheme: AuthScheme::MonitorApiKey,
            identity: Identity::ApiKeyHolder,
        }
    }
}

/// Outcome of evaluating the policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through.
    Allow,
    /// No acceptable credentials: answer 401 with a challenge.
    Challenge,
    /// Authenticated but not the authorized user: answer 403.
    Forbid,
}

/// The authorized-user policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationPolicy {
    name: &'static str,
    enabled: bool,
    schemes: Vec<AuthScheme>,
    process_user: Option<String>,
}

impl AuthorizationPolicy {
    /// Policy name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `false` if the policy allows everything.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decides whether `principal` may proceed.
    #[must_use]
    pub fn evaluate(&self, principal: Option<&Principal>) -> Decision {
        if !self.enabled {
            return Decision::Allow;
        }
        let Some(principal) = principal else {
            return Decision::Challenge;
        };
        if !self.schemes.contains(&principal.scheme) {
            return Decision::Challenge;
        }
        match &principal.identity {
            Identity::ApiKeyHolder => Decision::Allow,
            Identity::OsUser(user) => {
                let authorized = self
                    .process_user
                    .as_deref()
                    .is_some_and(|me| same_account(me, user));
                if authorized {
                    Decision::Allow
                } else {
                    Decision::Forbid
                }
            }
        }
    }
}

/// Declarative authentication plan for the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPlan {
    mode: AuthModeKind,
    schemes: Vec<AuthScheme>,
    policy: AuthorizationPolicy,
}

impl AuthPlan {
    /// Builds the plan for `mode`.
    ///
    /// `negotiate` requests the negotiation scheme; it is added only where
    /// the platform provides it.
    #[must_use]
    pub fn for_mode(mode: &AuthenticationMode, negotiate: bool) -> Self {
        Self::for_platform(mode, negotiate, cfg!(windows), current_os_user())
    }

    /// [`for_mode`](Self::for_mode) with the platform facts spelled out.
    #[must_use]
    pub fn for_platform(
        mode: &AuthenticationMode,
        negotiate: bool,
        platform_has_negotiate: bool,
        process_user: Option<String>,
    ) -> Self {
        let schemes = if mode.is_enabled() {
            let mut schemes = vec![AuthScheme::MonitorApiKey];
            if negotiate && platform_has_negotiate {
                schemes.push(AuthScheme::Negotiate);
            }
            schemes
        } else {
            Vec::new()
        };
        Self {
            mode: mode.kind(),
            policy: AuthorizationPolicy {
                name: AUTHORIZED_USER_POLICY,
                enabled: mode.is_enabled(),
                schemes: schemes.clone(),
                process_user,
            },
            schemes,
        }
    }

    /// The mode the plan was built for.
    #[must_use]
    pub const fn mode(&self) -> AuthModeKind {
        self.mode
    }

    /// Registered schemes; the first one is the default and challenge scheme.
    #[must_use]
    pub fn schemes(&self) -> &[AuthScheme] {
        &self.schemes
    }

    /// Default authenticate and challenge scheme, if any.
    #[must_use]
    pub fn default_scheme(&self) -> Option<AuthScheme> {
        self.schemes.first().copied()
    }

    /// The authorization policy.
    #[must_use]
    pub const fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }
}

/// Account names are case-insensitive on Windows only.
fn same_account(a: &str, b: &str) -> bool {
    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Name of the OS user that launched this process.
#[must_use]
pub fn current_os_user() -> Option<String> {
    os_user()
}

#[cfg(unix)]
fn os_user() -> Option<String> {
    use nix::unistd::{User, getuid};
    User::from_uid(getuid()).ok().flatten().map(|u| u.name)
}

#[cfg(windows)]
fn os_user() -> Option<String> {
    let user = std::env::var("USERNAME").ok()?;
    Some(match std::env::var("USERDOMAIN") {
        Ok(domain) if !domain.is_empty() => format!("{domain}\\{user}"),
        _ => user,
    })
}

#[cfg(not(any(unix, windows)))]
fn os_user() -> Option<String> {
    None
}
