//! Typed option sections read from a [`ConfigurationView`].
//!
//! Each section applies its defaults from [`super::defaults`] for keys no
//! layer defines and validates what is present. Validation failures are
//! fatal at startup.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::defaults;
use super::error::ConfigError;
use super::keys;
use super::view::ConfigurationView;

/// Splits a `;`-separated URL list, dropping blank entries.
#[must_use]
pub fn split_urls(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `Metrics` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsOptions {
    /// Whether the metrics surface is bound at all.
    pub enabled: bool,
    /// Metrics-surface URLs.
    pub endpoints: Vec<String>,
    /// Interval between collections.
    pub update_interval: Duration,
    /// Samples retained per metric.
    pub metric_count: usize,
    /// Whether the default provider set is collected.
    pub include_default_providers: bool,
}

impl MetricsOptions {
    /// Reads and validates the section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values or a zero
    /// interval or count.
    pub fn from_view(view: &ConfigurationView) -> Result<Self, ConfigError> {
        let interval_secs = view
            .get_parsed::<u64>(keys::METRICS_UPDATE_INTERVAL)?
            .unwrap_or(defaults::METRICS_UPDATE_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::invalid(
                keys::METRICS_UPDATE_INTERVAL,
                "0",
                "must be at least 1 second",
            ));
        }

        let metric_count = view
            .get_parsed::<usize>(keys::METRICS_COUNT)?
            .unwrap_or(defaults::METRICS_COUNT);
        if metric_count == 0 {
            return Err(ConfigError::invalid(
                keys::METRICS_COUNT,
                "0",
                "must be at least 1",
            ));
        }

        Ok(Self {
            enabled: view
                .get_bool(keys::METRICS_ENABLED)?
                .unwrap_or(defaults::METRICS_ENABLED),
            endpoints: view
                .get(keys::METRICS_ENDPOINTS)
                .map(split_urls)
                .unwrap_or_default(),
            update_interval: Duration::from_secs(interval_secs),
            metric_count,
            include_default_providers: view
                .get_bool(keys::METRICS_INCLUDE_DEFAULT_PROVIDERS)?
                .unwrap_or(defaults::METRICS_INCLUDE_DEFAULT_PROVIDERS),
        })
    }
}

/// The `Storage` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    /// Where temporary dump files are written.
    pub dump_temp_folder: PathBuf,
}

impl StorageOptions {
    /// Reads the section. Never fails.
    #[must_use]
    pub fn from_view(view: &ConfigurationView) -> Self {
        Self {
            dump_temp_folder: view
                .get_non_empty(keys::STORAGE_DUMP_TEMP_FOLDER)
                .map_or_else(defaults::dump_temp_folder, PathBuf::from),
        }
    }
}

/// How the agent reaches target processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    /// The agent connects to each target's own endpoint.
    #[default]
    Connect,
    /// Targets connect to an endpoint the agent listens on.
    Listen,
}

impl ConnectionMode {
    /// Picks the mode implied by a diagnostic port name.
    #[must_use]
    pub fn for_endpoint(endpoint_name: Option<&str>) -> Self {
        match endpoint_name {
            Some(name) if !name.trim().is_empty() => Self::Listen,
            _ => Self::Connect,
        }
    }

    /// Returns the configuration spelling of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::Listen => "Listen",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("connect") {
            Ok(Self::Connect)
        } else if s.eq_ignore_ascii_case("listen") {
            Ok(Self::Listen)
        } else {
            Err("expected 'Connect' or 'Listen'".to_string())
        }
    }
}

/// The `DiagnosticPort` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticPortOptions {
    /// Connection mode.
    pub mode: ConnectionMode,
    /// Endpoint the agent listens on in [`ConnectionMode::Listen`].
    pub endpoint_name: Option<String>,
}

impl DiagnosticPortOptions {
    /// Reads and validates the section.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown mode, or for `Listen` mode without an
    /// endpoint name.
    pub fn from_view(view: &ConfigurationView) -> Result<Self, ConfigError> {
        let endpoint_name = view
            .get_non_empty(keys::DIAGNOSTIC_PORT_ENDPOINT_NAME)
            .map(str::to_string);
        let mode = view
            .get_parsed::<ConnectionMode>(keys::DIAGNOSTIC_PORT_CONNECTION_MODE)?
            .unwrap_or_default();

        if mode == ConnectionMode::Listen && endpoint_name.is_none() {
            return Err(ConfigError::missing(
                keys::DIAGNOSTIC_PORT_ENDPOINT_NAME,
                "Listen mode requires an endpoint name (use --diagnostic-port).",
            ));
        }
        Ok(Self {
            mode,
            endpoint_name,
        })
    }
}

/// The `Shutdown` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOptions {
    /// How long in-flight requests may take to drain.
    pub grace_period: Duration,
}

impl ShutdownOptions {
    /// Reads the section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value is not a number of
    /// seconds.
    pub fn from_view(view: &ConfigurationView) -> Result<Self, ConfigError> {
        Ok(Self {
            grace_period: view
                .get_parsed::<u64>(keys::SHUTDOWN_GRACE_PERIOD)?
                .map_or_else(defaults::shutdown_grace_period, Duration::from_secs),
        })
    }
}

impl Default for ShutdownOptions {
    fn default() -> Self {
        Self {
            grace_period: defaults::shutdown_grace_period(),
        }
    }
}
