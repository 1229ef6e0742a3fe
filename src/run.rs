//! Application execution logic.
//!
//! This module wires the command-line front end to the bootstrap core:
//! running the agent, printing the merged configuration, and generating
//! API keys.

use tokio::signal;
use tokio_util::sync::CancellationToken;

use diagmon::auth::{AuthRequest, AuthenticationModeSelector, GeneratedApiKey, HashAlgorithm};
use diagmon::bootstrap::{Bootstrap, BootstrapError, BootstrapOutcome};
use diagmon::config::{
    ConfigError, ConfigurationResolver, DisplayLevel, HostEnvironment, StartupSettings,
    defaults_layer, render,
};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Runs the agent until Ctrl+C or SIGTERM.
///
/// # Errors
///
/// Returns the fatal startup or serving error, already logged by the
/// bootstrap core.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
pub async fn collect(settings: StartupSettings) -> Result<BootstrapOutcome, BootstrapError> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, stopping...");
        on_signal.cancel();
    });

    let outcome = Bootstrap::new(settings, HostEnvironment::from_process())
        .run(cancel)
        .await?;
    tracing::info!("Application stopped");
    Ok(outcome)
}

/// Renders the configuration `collect` would start with.
///
/// A temporary key requested on the command line contributes its hash just
/// as it would at startup.
///
/// # Errors
///
/// Returns an error if the merged view cannot be serialized.
pub fn show_config(
    settings: &StartupSettings,
    host: &HostEnvironment,
    level: DisplayLevel,
) -> Result<String, ConfigError> {
    let prepared = AuthenticationModeSelector::new().prepare(AuthRequest {
        no_auth: settings.no_auth,
        use_temporary_key: settings.temp_api_key,
    });
    let resolver = ConfigurationResolver::standard(
        prepared.config_overrides(),
        settings.command_line_layer(),
        defaults_layer(),
        host,
    );
    render(&resolver.resolve(), level)
}

/// Generates a new API key and returns the lines to print.
#[must_use]
pub fn generate_key() -> [String; 3] {
    GeneratedApiKey::generate(HashAlgorithm::default()).display_lines()
}

/// Returns a future that completes when a shutdown signal is received.
///
/// Excluded from coverage - requires OS signal handling.
#[cfg(not(tarpaulin_include))]
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
