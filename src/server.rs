//! Request serving for the control and metrics surfaces.
//!
//! Every bound socket gets its own accept loop; every connection runs on
//! its own task and is driven by hyper's HTTP/1 server. On cancellation the
//! accept loops stop, open connections are asked to finish their current
//! request, and serving returns once they are drained or the grace period
//! elapses.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware};
use http::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::auth::{AuthModeKind, AuthState, require_authorized_user};
use crate::config::ConnectionMode;
use crate::listener::{BoundListener, Surface};
use crate::metrics::MetricsStore;

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;

/// Content type of the metrics exposition.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for serving failures.
#[derive(Debug, Error)]
pub enum ServeError {
    /// There is nothing to serve on.
    #[error("No listeners were bound")]
    NoListeners,

    /// An accept loop panicked.
    #[error("Accept loop failed: {0}")]
    AcceptLoop(#[from] tokio::task::JoinError),
}

/// Facts reported by `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Crate version.
    pub version: String,
    /// Active authentication mode.
    pub auth_mode: String,
    /// Diagnostic port connection mode.
    pub diagnostic_port_mode: String,
}

impl ServiceInfo {
    /// Describes this process.
    #[must_use]
    pub fn new(auth_mode: AuthModeKind, diagnostic_port_mode: ConnectionMode) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth_mode: auth_mode.to_string(),
            diagnostic_port_mode: diagnostic_port_mode.to_string(),
        }
    }
}

/// State shared by every request handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Samples served by `/metrics`.
    pub metrics: Arc<MetricsStore>,
    /// Served by `/info`.
    pub info: Arc<ServiceInfo>,
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, METRICS_CONTENT_TYPE)], state.metrics.render())
}

async fn info(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(state.info.as_ref().clone())
}

/// Routes of the control surface. `/info` requires the authorized user;
/// `/metrics` stays anonymous.
pub fn control_router(state: AppState, auth: AuthState) -> Router {
    Router::new()
        .route("/info", get(info))
        .route_layer(middleware::from_fn_with_state(auth, require_authorized_user))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Routes of the metrics surface.
pub fn metrics_router(state: AppState) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(state)
}

/// Serves bound listeners until cancelled.
#[derive(Debug)]
pub struct Server {
    listeners: Vec<BoundListener>,
    control: Router,
    metrics: Router,
    grace_period: Duration,
}

impl Server {
    /// Creates a server for `listeners` with one router per surface.
    #[must_use]
    pub const fn new(
        listeners: Vec<BoundListener>,
        control: Router,
        metrics: Router,
        grace_period: Duration,
    ) -> Self {
        Self {
            listeners,
            control,
            metrics,
            grace_period,
        }
    }

    /// Accepts connections until `cancel` fires, then drains them.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::NoListeners`] for an empty listener set and
    /// [`ServeError::AcceptLoop`] if an accept loop panicked.
    pub async fn serve(self, cancel: CancellationToken) -> Result<(), ServeError> {
        if self.listeners.is_empty() {
            return Err(ServeError::NoListeners);
        }

        let connections = TaskTracker::new();
        let mut accept_loops = JoinSet::new();
        for listener in self.listeners {
            let router = match listener.surface {
                Surface::Control => self.control.clone(),
                Surface::Metrics => self.metrics.clone(),
            };
            accept_loops.spawn(accept_loop(
                listener,
                router,
                connections.clone(),
                cancel.clone(),
            ));
        }

        let mut result = Ok(());
        while let Some(joined) = accept_loops.join_next().await {
            if let Err(e) = joined {
                cancel.cancel();
                result = Err(ServeError::AcceptLoop(e));
            }
        }

        connections.close();
        if tokio::time::timeout(self.grace_period, connections.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "Grace period of {}s elapsed with {} connection(s) still open",
                self.grace_period.as_secs(),
                connections.len()
            );
        }
        result
    }
}

async fn accept_loop(
    bound: BoundListener,
    router: Router,
    connections: TaskTracker,
    cancel: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = bound.listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!("Accept failed on {}: {e}", bound.url);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let router = router.clone();
        let tls = bound.tls.clone();
        let cancel = cancel.clone();
        connections.spawn(async move {
            match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => serve_connection(stream, router, cancel).await,
                    Err(e) => tracing::debug!("TLS handshake with {peer} failed: {e}"),
                },
                None => serve_connection(stream, router, cancel).await,
            }
        });
    }
    tracing::debug!("Stopped accepting on {}", bound.url);
}

async fn serve_connection<S>(stream: S, router: Router, cancel: CancellationToken)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = TowerToHyperService::new(router);
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    let mut conn = std::pin::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        () = cancel.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        tracing::debug!("Connection closed with error: {e}");
    }
}
