//! Request-pipeline enforcement of the authorized-user policy.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderMap, HeaderValue, StatusCode};

use super::key::ApiKeyHash;
use super::mode::{AuthenticationMode, stored_key_hash};
use super::policy::{AuthPlan, AuthScheme, Decision, Principal};
use crate::config::ConfigHandle;

/// Shared state of the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    plan: Arc<AuthPlan>,
    mode: Arc<AuthenticationMode>,
    config: Option<ConfigHandle>,
}

impl AuthState {
    /// Creates the middleware state.
    ///
    /// With a `config` handle, stored keys are re-read from the live view on
    /// every request so a rotated hash applies without restart.
    #[must_use]
    pub const fn new(
        plan: Arc<AuthPlan>,
        mode: Arc<AuthenticationMode>,
        config: Option<ConfigHandle>,
    ) -> Self {
        Self { plan, mode, config }
    }

    /// The plan being enforced.
    #[must_use]
    pub fn plan(&self) -> &AuthPlan {
        &self.plan
    }

    fn current_hash(&self) -> Option<ApiKeyHash> {
        match (self.mode.as_ref(), &self.config) {
            (AuthenticationMode::StoredKey { hash }, Some(config)) => {
                match stored_key_hash(&config.snapshot()) {
                    Ok(live) => Some(live),
                    Err(e) => {
                        tracing::debug!("Using startup API key hash, live one is unusable: {e}");
                        Some(hash.clone())
                    }
                }
            }
            (mode, _) => mode.key_hash().cloned(),
        }
    }

    /// Authenticates a request from its headers.
    #[must_use]
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        if !self.plan.schemes().contains(&AuthScheme::MonitorApiKey) {
            return None;
        }
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, credential) = value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case(AuthScheme::MonitorApiKey.as_str()) {
            return None;
        }
        self.current_hash()?
            .verify_encoded(credential)
            .then(Principal::api_key_holder)
    }
}

/// Rejects requests that do not satisfy the authorized-user policy.
///
/// Unauthenticated requests get `401` with one challenge per registered
/// scheme; authenticated callers who are not the authorized user get `403`.
pub async fn require_authorized_user(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let principal = auth.authenticate(request.headers());
    match auth.plan.policy().evaluate(principal.as_ref()) {
        Decision::Allow => next.run(request).await,
        Decision::Challenge => challenge(&auth.plan),
        Decision::Forbid => StatusCode::FORBIDDEN.into_response(),
    }
}

fn challenge(plan: &AuthPlan) -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    for scheme in plan.schemes() {
        response
            .headers_mut()
            .append(WWW_AUTHENTICATE, HeaderValue::from_static(scheme.as_str()));
    }
    response
}
