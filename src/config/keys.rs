//! Well-known configuration keys.
//!
//! Keys are hierarchical, with [`SEPARATOR`] between segments, and are
//! compared case-insensitively.

/// Hierarchy separator inside a configuration key.
pub const SEPARATOR: char = ':';

/// Control-surface URLs, `;`-separated.
pub const URLS: &str = "urls";

/// Metrics section.
pub const METRICS: &str = "Metrics";
/// Metrics-surface URLs, `;`-separated.
pub const METRICS_ENDPOINTS: &str = "Metrics:Endpoints";
/// Whether metrics exposition is enabled.
pub const METRICS_ENABLED: &str = "Metrics:Enabled";
/// Seconds between metric collections.
pub const METRICS_UPDATE_INTERVAL: &str = "Metrics:UpdateIntervalSeconds";
/// Samples retained per metric.
pub const METRICS_COUNT: &str = "Metrics:MetricCount";
/// Whether the default provider set is collected.
pub const METRICS_INCLUDE_DEFAULT_PROVIDERS: &str = "Metrics:IncludeDefaultProviders";

/// Diagnostic port connection mode (`Connect` or `Listen`).
pub const DIAGNOSTIC_PORT_CONNECTION_MODE: &str = "DiagnosticPort:ConnectionMode";
/// Diagnostic port endpoint name.
pub const DIAGNOSTIC_PORT_ENDPOINT_NAME: &str = "DiagnosticPort:EndpointName";

/// Folder for temporary dump files.
pub const STORAGE_DUMP_TEMP_FOLDER: &str = "Storage:DumpTempFolder";

/// API key authentication section.
pub const API_AUTHENTICATION: &str = "ApiAuthentication";
/// Hex-encoded hash of the API key.
pub const API_KEY_HASH: &str = "ApiAuthentication:ApiKeyHash";
/// Algorithm used to produce [`API_KEY_HASH`].
pub const API_KEY_HASH_TYPE: &str = "ApiAuthentication:ApiKeyHashType";
/// Whether OS-integrated negotiation is offered where the platform supports it.
pub const API_ENABLE_NEGOTIATE: &str = "ApiAuthentication:EnableNegotiate";

/// PEM certificate chain used for TLS listeners.
pub const TLS_CERTIFICATE_PATH: &str = "Tls:Certificate:Path";
/// PEM private key used for TLS listeners.
pub const TLS_CERTIFICATE_KEY_PATH: &str = "Tls:Certificate:KeyPath";

/// Seconds in-flight requests may take to drain on shutdown.
pub const SHUTDOWN_GRACE_PERIOD: &str = "Shutdown:GracePeriodSeconds";

/// Joins key segments with the hierarchy separator.
#[must_use]
pub fn combine(segments: &[&str]) -> String {
    let mut key = String::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        if !key.is_empty() {
            key.push(SEPARATOR);
        }
        key.push_str(segment);
    }
    key
}

/// Returns the case-folded form used for key comparison.
#[must_use]
pub fn fold(key: &str) -> String {
    key.to_ascii_lowercase()
}
