//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Default control-surface URL.
pub const URLS: &str = "https://localhost:52323";

/// Default metrics-surface URL.
pub const METRICS_URLS: &str = "http://localhost:52325";

/// Metrics exposition is enabled unless turned off.
pub const METRICS_ENABLED: bool = true;

/// Default metric collection interval in seconds.
pub const METRICS_UPDATE_INTERVAL_SECS: u64 = 10;

/// Default number of samples retained per metric.
pub const METRICS_COUNT: usize = 3;

/// The default provider set is collected unless turned off.
pub const METRICS_INCLUDE_DEFAULT_PROVIDERS: bool = true;

/// Prefix of environment variables mapped into configuration.
pub const ENV_PREFIX: &str = "DIAGMON_";

/// Default interval between configuration change checks, in seconds.
pub const WATCH_INTERVAL_SECS: u64 = 2;

/// Default shutdown grace period in seconds.
pub const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

/// Default hash algorithm for generated API keys.
pub const API_KEY_HASH_TYPE: &str = "SHA256";

/// Default metric collection interval as Duration.
#[must_use]
pub const fn metrics_update_interval() -> Duration {
    Duration::from_secs(METRICS_UPDATE_INTERVAL_SECS)
}

/// Default configuration watch interval as Duration.
#[must_use]
pub const fn watch_interval() -> Duration {
    Duration::from_secs(WATCH_INTERVAL_SECS)
}

/// Default shutdown grace period as Duration.
#[must_use]
pub const fn shutdown_grace_period() -> Duration {
    Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)
}

/// Default folder for temporary dump files.
#[must_use]
pub fn dump_temp_folder() -> PathBuf {
    std::env::temp_dir()
}
