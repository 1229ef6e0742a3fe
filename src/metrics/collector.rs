//! Periodic collection of the process's own metrics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::normalize::MetricIdentifier;
use super::store::MetricsStore;
use crate::config::ConfigHandle;

/// Provider name of the built-in samples.
pub const SELF_PROVIDER: &str = "diagmon";

/// Samples process-level gauges into a [`MetricsStore`] on a fixed interval.
#[derive(Debug)]
pub struct Collector {
    store: Arc<MetricsStore>,
    interval: Duration,
    started: Instant,
    config: Option<ConfigHandle>,
    gauges: Vec<MetricIdentifier>,
}

impl Collector {
    /// Creates a collector writing to `store` every `interval`.
    #[must_use]
    pub fn new(store: Arc<MetricsStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            started: Instant::now(),
            config: None,
            gauges: Vec::new(),
        }
    }

    /// Also reports the configuration generation.
    #[must_use]
    pub fn with_config(mut self, handle: ConfigHandle) -> Self {
        self.config = Some(handle);
        self
    }

    /// Adds a fixed-value gauge recorded on every collection.
    #[must_use]
    pub fn with_gauge(mut self, sample: MetricIdentifier) -> Self {
        self.gauges.push(sample);
        self
    }

    /// Records one sample of every gauge.
    #[allow(clippy::cast_precision_loss)]
    pub fn collect_once(&self) {
        self.store.record(MetricIdentifier::new(
            SELF_PROVIDER,
            "uptime_seconds",
            None,
            self.started.elapsed().as_secs_f64(),
        ));
        if let Some(config) = &self.config {
            self.store.record(MetricIdentifier::new(
                SELF_PROVIDER,
                "config_generation",
                Some("count"),
                config.snapshot().generation() as f64,
            ));
        }
        for gauge in &self.gauges {
            self.store.record(gauge.clone());
        }
    }

    /// Collects immediately and then every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => self.collect_once(),
            }
        }
        tracing::debug!("Metrics collector stopped");
    }
}
