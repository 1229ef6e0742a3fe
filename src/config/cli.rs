//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use super::display::DisplayLevel;
use super::startup::StartupSettings;

/// diagmon: diagnostics monitoring agent
///
/// Collects diagnostics from target processes and exposes them over a
/// control surface and a metrics surface.
#[derive(Debug, Parser)]
#[command(name = "diagmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (defaults to `collect`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Startup options shared by `collect` and `config show`
    #[command(flatten)]
    pub startup: StartupArgs,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Options that shape how the agent starts.
#[derive(Debug, Clone, Default, Args)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally boolean
pub struct StartupArgs {
    /// Bindings for the control surface (';'-separated)
    #[arg(long, value_delimiter = ';', global = true)]
    pub urls: Option<Vec<String>>,

    /// Bindings for the metrics surface (';'-separated)
    #[arg(
        long = "metricUrls",
        alias = "metric-urls",
        value_delimiter = ';',
        global = true
    )]
    pub metric_urls: Option<Vec<String>>,

    /// Enable or disable the metrics surface
    #[arg(long, value_name = "BOOL", action = ArgAction::Set, global = true)]
    pub metrics: Option<bool>,

    /// Listen on this diagnostic port instead of connecting to targets
    #[arg(long = "diagnostic-port", value_name = "NAME", global = true)]
    pub diagnostic_port: Option<String>,

    /// Turn off authentication on the control surface
    #[arg(long = "no-auth", global = true)]
    pub no_auth: bool,

    /// Generate a temporary API key valid for this run only
    #[arg(long = "temp-apikey", global = true)]
    pub temp_api_key: bool,
}

impl From<StartupArgs> for StartupSettings {
    fn from(args: StartupArgs) -> Self {
        Self {
            urls: args.urls,
            metric_urls: args.metric_urls,
            metrics: args.metrics,
            diagnostic_port: args.diagnostic_port,
            no_auth: args.no_auth,
            temp_api_key: args.temp_api_key,
        }
    }
}

/// Subcommands for diagmon
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect diagnostics and serve them (the default)
    Collect,

    /// Inspect the merged configuration
    Config {
        /// Configuration action
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate an API key and its hash
    Generatekey,
}

/// `config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the merged configuration as JSON
    Show {
        /// How much to reveal
        #[arg(long, value_enum, default_value = "Redacted")]
        level: DisplayLevelArg,
    },
}

/// Display level argument for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DisplayLevelArg {
    /// Print every value
    #[value(name = "Full", alias = "full")]
    Full,
    /// Hide sensitive values
    #[value(name = "Redacted", alias = "redacted")]
    Redacted,
}

impl From<DisplayLevelArg> for DisplayLevel {
    fn from(arg: DisplayLevelArg) -> Self {
        match arg {
            DisplayLevelArg::Full => Self::Full,
            DisplayLevelArg::Redacted => Self::Redacted,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this run generates an API key and exits.
    #[must_use]
    pub const fn is_generate_key(&self) -> bool {
        matches!(self.command, Some(Command::Generatekey))
    }

    /// Returns the startup settings for the bootstrap core.
    #[must_use]
    pub fn startup_settings(&self) -> StartupSettings {
        self.startup.clone().into()
    }
}
