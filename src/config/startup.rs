//! Startup settings handed to the bootstrap core by the front end.

use super::defaults;
use super::keys;
use super::layer::LayerData;
use super::options::ConnectionMode;

/// Values the operator passed explicitly when starting the agent.
///
/// `None` means "not given", so lower layers and defaults still apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct StartupSettings {
    /// Control-surface URLs.
    pub urls: Option<Vec<String>>,
    /// Metrics-surface URLs.
    pub metric_urls: Option<Vec<String>>,
    /// Whether to expose the metrics surface.
    pub metrics: Option<bool>,
    /// Diagnostic port endpoint name; implies listen mode.
    pub diagnostic_port: Option<String>,
    /// Disable authentication entirely.
    pub no_auth: bool,
    /// Generate a temporary API key for this run.
    pub temp_api_key: bool,
}

impl StartupSettings {
    /// Returns the command-line layer: only explicitly given values.
    #[must_use]
    pub fn command_line_layer(&self) -> LayerData {
        let mut data = LayerData::new();
        if let Some(urls) = &self.urls {
            data.insert(keys::URLS.to_string(), urls.join(";"));
        }
        if let Some(urls) = &self.metric_urls {
            data.insert(keys::METRICS_ENDPOINTS.to_string(), urls.join(";"));
        }
        if let Some(enabled) = self.metrics {
            data.insert(keys::METRICS_ENABLED.to_string(), enabled.to_string());
        }
        if let Some(name) = self.diagnostic_port.as_deref().filter(|n| !n.trim().is_empty()) {
            data.insert(
                keys::DIAGNOSTIC_PORT_CONNECTION_MODE.to_string(),
                ConnectionMode::for_endpoint(Some(name)).to_string(),
            );
            data.insert(keys::DIAGNOSTIC_PORT_ENDPOINT_NAME.to_string(), name.to_string());
        }
        data
    }
}

/// Returns the built-in defaults layer.
#[must_use]
pub fn defaults_layer() -> LayerData {
    [
        (keys::URLS, defaults::URLS.to_string()),
        (keys::METRICS_ENDPOINTS, defaults::METRICS_URLS.to_string()),
        (keys::METRICS_ENABLED, defaults::METRICS_ENABLED.to_string()),
        (
            keys::METRICS_UPDATE_INTERVAL,
            defaults::METRICS_UPDATE_INTERVAL_SECS.to_string(),
        ),
        (keys::METRICS_COUNT, defaults::METRICS_COUNT.to_string()),
        (
            keys::METRICS_INCLUDE_DEFAULT_PROVIDERS,
            defaults::METRICS_INCLUDE_DEFAULT_PROVIDERS.to_string(),
        ),
        (
            keys::STORAGE_DUMP_TEMP_FOLDER,
            defaults::dump_temp_folder().display().to_string(),
        ),
        (
            keys::DIAGNOSTIC_PORT_CONNECTION_MODE,
            ConnectionMode::default().to_string(),
        ),
        (
            keys::SHUTDOWN_GRACE_PERIOD,
            defaults::SHUTDOWN_GRACE_PERIOD_SECS.to_string(),
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
