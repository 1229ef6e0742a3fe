//! diagmon: diagnostics sidecar agent
//!
//! Entry point for the diagmon application.

use diagmon::config::{Cli, Command, ConfigAction, HostEnvironment};
use std::process::ExitCode;

mod app;
mod run;

use app::{exit_code, setup_tracing};

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();
    setup_tracing(cli.verbose);
    let settings = cli.startup_settings();

    match cli.command {
        Some(Command::Generatekey) => {
            for line in run::generate_key() {
                println!("{line}");
            }
            exit_code::SUCCESS
        }
        Some(Command::Config {
            action: ConfigAction::Show { level },
        }) => match run::show_config(&settings, &HostEnvironment::from_process(), level.into()) {
            Ok(json) => {
                println!("{json}");
                exit_code::SUCCESS
            }
            Err(e) => {
                tracing::error!("Cannot render configuration: {e}");
                exit_code::fatal()
            }
        },
        Some(Command::Collect) | None => run_application(settings),
    }
}

/// Runs the agent until a shutdown signal arrives.
///
/// Excluded from coverage - requires async runtime.
#[cfg(not(tarpaulin_include))]
fn run_application(settings: diagmon::config::StartupSettings) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {e}");
            return exit_code::fatal();
        }
    };

    // The bootstrap core has already logged the fatal condition.
    match runtime.block_on(run::collect(settings)) {
        Ok(_) => exit_code::SUCCESS,
        Err(_) => exit_code::fatal(),
    }
}
