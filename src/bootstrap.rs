//! Startup orchestration.
//!
//! [`Bootstrap::run`] walks a linear sequence of phases: resolve
//! configuration, select the authentication mode, bind listeners, serve
//! until cancelled, then drain. A failure after configuration is resolved
//! moves to [`Phase::Faulted`] without serving anything; a cancellation
//! before serving starts releases what was acquired, moves to
//! [`Phase::Stopped`] and returns [`BootstrapOutcome::Aborted`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::auth::{
    AuthError, AuthPlan, AuthRequest, AuthState, AuthenticationMode, AuthenticationModeSelector,
};
use crate::config::{
    ConfigError, ConfigHandle, ConfigurationResolver, ConfigurationView, DiagnosticPortOptions,
    HostEnvironment, MetricsOptions, ShutdownOptions, StartupSettings, StorageOptions, defaults,
    defaults_layer, keys,
};
use crate::listener::{
    BindError, BoundListener, ListenerUrls, Surface, TlsSettings, UrlOverrides, bind, plan,
};
use crate::metrics::{Collector, MetricIdentifier, MetricsStore, SELF_PROVIDER};
use crate::server::{AppState, ServeError, Server, ServiceInfo, control_router, metrics_router};

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    Uninitialized,
    /// The merged configuration view exists.
    ConfigurationResolved,
    /// Options validated and the authentication mode fixed.
    AuthModeSelected,
    /// Every listener is bound.
    ListenersBound,
    /// Requests are being served.
    Serving,
    /// Cancellation received; draining connections.
    ShuttingDown,
    /// Clean exit.
    Stopped,
    /// Startup failed.
    Faulted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Fatal startup or serving failure.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// An option failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigError),

    /// The authentication mode could not be completed.
    #[error("Authentication setup failed: {0}")]
    Auth(#[from] AuthError),

    /// A listener could not be bound.
    #[error("{0}")]
    Bind(#[from] BindError),

    /// Serving failed.
    #[error("{0}")]
    Serve(#[from] ServeError),
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Served until cancelled, then drained.
    Stopped,
    /// Cancelled before serving started.
    Aborted,
}

/// Everything validated before listeners are bound.
struct Validated {
    view: Arc<ConfigurationView>,
    metrics: MetricsOptions,
    diagnostic_port: DiagnosticPortOptions,
    shutdown: ShutdownOptions,
    negotiate: bool,
    mode: AuthenticationMode,
}

/// One-shot startup sequence of the agent.
#[derive(Debug)]
pub struct Bootstrap {
    settings: StartupSettings,
    host: HostEnvironment,
    selector: AuthenticationModeSelector,
    phase: watch::Sender<Phase>,
}

impl Bootstrap {
    /// Creates the orchestrator for the given startup settings and host.
    #[must_use]
    pub fn new(settings: StartupSettings, host: HostEnvironment) -> Self {
        let (phase, _) = watch::channel(Phase::Uninitialized);
        Self {
            settings,
            host,
            selector: AuthenticationModeSelector::new(),
            phase,
        }
    }

    /// Uses `selector` for the authentication mode.
    #[must_use]
    pub const fn with_selector(mut self, selector: AuthenticationModeSelector) -> Self {
        self.selector = selector;
        self
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Observes phase transitions.
    #[must_use]
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn advance(&self, next: Phase) {
        let previous = self.phase.send_replace(next);
        tracing::debug!("Bootstrap phase {previous} -> {next}");
    }

    /// Runs the agent until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns a [`BootstrapError`] for invalid configuration, an unusable
    /// stored key, a listener that cannot be bound, or a serving failure.
    /// The error has already been logged.
    pub async fn run(self, cancel: CancellationToken) -> Result<BootstrapOutcome, BootstrapError> {
        let result = self.run_phases(&cancel).await;
        match &result {
            Ok(BootstrapOutcome::Stopped) => self.advance(Phase::Stopped),
            Ok(BootstrapOutcome::Aborted) => {
                tracing::info!("Startup cancelled before serving");
                self.advance(Phase::Stopped);
            }
            Err(e) => {
                tracing::error!("{e}");
                self.advance(Phase::Faulted);
            }
        }
        result
    }

    async fn run_phases(&self, cancel: &CancellationToken) -> Result<BootstrapOutcome, BootstrapError> {
        let prepared = self.selector.prepare(AuthRequest {
            no_auth: self.settings.no_auth,
            use_temporary_key: self.settings.temp_api_key,
        });
        let resolver = ConfigurationResolver::standard(
            prepared.config_overrides(),
            self.settings.command_line_layer(),
            defaults_layer(),
            &self.host,
        )
        .with_poll_interval(defaults::watch_interval());
        let config = resolver.handle();
        self.advance(Phase::ConfigurationResolved);
        if cancel.is_cancelled() {
            return Ok(BootstrapOutcome::Aborted);
        }

        let view = config.snapshot();
        let validated = Validated {
            metrics: MetricsOptions::from_view(&view)?,
            diagnostic_port: DiagnosticPortOptions::from_view(&view)?,
            shutdown: ShutdownOptions::from_view(&view)?,
            negotiate: view.get_bool(keys::API_ENABLE_NEGOTIATE)?.unwrap_or(false),
            mode: self.selector.select(prepared, &view)?,
            view,
        };
        let storage = StorageOptions::from_view(&validated.view);
        tracing::debug!("Dump temp folder: {}", storage.dump_temp_folder.display());
        announce(&validated);
        self.advance(Phase::AuthModeSelected);
        if cancel.is_cancelled() {
            return Ok(BootstrapOutcome::Aborted);
        }

        let urls = ListenerUrls::resolve(
            &validated.view,
            &validated.metrics,
            &UrlOverrides::from_host(&self.host),
        );
        let plan = plan(
            &urls.control,
            validated.metrics.enabled,
            &urls.metrics,
            TlsSettings::from_view(&validated.view),
        );
        // Host-name resolution can stall; cancellation must not wait for it.
        let report = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(BootstrapOutcome::Aborted),
            report = bind(&plan) => report,
        };
        let listeners = report.into_result()?;
        self.advance(Phase::ListenersBound);
        if cancel.is_cancelled() {
            return Ok(BootstrapOutcome::Aborted);
        }

        self.serve(resolver, config, validated, listeners, cancel).await?;
        Ok(BootstrapOutcome::Stopped)
    }

    async fn serve(
        &self,
        resolver: ConfigurationResolver,
        config: ConfigHandle,
        validated: Validated,
        listeners: Vec<BoundListener>,
        cancel: &CancellationToken,
    ) -> Result<(), BootstrapError> {
        let cancel = cancel.child_token();
        let auth_plan = Arc::new(AuthPlan::for_mode(&validated.mode, validated.negotiate));
        let store = Arc::new(MetricsStore::new(validated.metrics.metric_count));
        let state = AppState {
            metrics: Arc::clone(&store),
            info: Arc::new(ServiceInfo::new(
                validated.mode.kind(),
                validated.diagnostic_port.mode,
            )),
        };
        let auth = AuthState::new(auth_plan, Arc::new(validated.mode), Some(config.clone()));

        let watcher = resolver.spawn(cancel.clone());
        let collector = (validated.metrics.enabled && validated.metrics.include_default_providers)
            .then(|| {
                let collector = Collector::new(store, validated.metrics.update_interval)
                    .with_config(config)
                    .with_gauge(listener_gauge(&listeners, Surface::Control))
                    .with_gauge(listener_gauge(&listeners, Surface::Metrics));
                tokio::spawn(collector.run(cancel.clone()))
            });

        let server = Server::new(
            listeners,
            control_router(state.clone(), auth),
            metrics_router(state),
            validated.shutdown.grace_period,
        );
        let serving = server.serve(cancel.clone());
        let mut serving = std::pin::pin!(serving);
        self.advance(Phase::Serving);

        let result = tokio::select! {
            result = serving.as_mut() => result,
            () = cancel.cancelled() => {
                self.advance(Phase::ShuttingDown);
                serving.as_mut().await
            }
        };

        // Stops the watcher and collector when serving ended on its own.
        cancel.cancel();
        if let Err(e) = watcher.await {
            tracing::warn!("Configuration watcher failed: {e}");
        }
        if let Some(task) = collector {
            if let Err(e) = task.await {
                tracing::warn!("Metrics collector failed: {e}");
            }
        }
        result.map_err(BootstrapError::from)
    }
}

fn announce(validated: &Validated) {
    tracing::info!("Authentication mode: {}", validated.mode.kind());
    if let Some(lines) = validated.mode.temporary_key_lines() {
        tracing::warn!(
            "Generated a temporary API key for this process:\n{}",
            lines.join("\n")
        );
    }
    if !validated.mode.is_enabled() {
        tracing::warn!("Authentication is disabled; the control surface is open to every caller");
    }
    tracing::info!("Diagnostic port mode: {}", validated.diagnostic_port.mode);
}

#[allow(clippy::cast_precision_loss)]
fn listener_gauge(listeners: &[BoundListener], surface: Surface) -> MetricIdentifier {
    let count = listeners.iter().filter(|l| l.surface == surface).count();
    MetricIdentifier::new(
        SELF_PROVIDER,
        format!("listeners{{surface=\"{surface}\"}}"),
        Some("count"),
        count as f64,
    )
}
