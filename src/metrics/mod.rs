//! Metrics exposition layer.
//!
//! This module provides:
//! - Wire-safe metric naming ([`normalize`], [`NormalizedMetric`])
//! - The sample type collectors produce ([`MetricIdentifier`])
//! - Retention and text rendering of recent samples ([`MetricsStore`])
//! - Periodic sampling of the process's own gauges ([`Collector`])

mod collector;
mod normalize;
mod store;

#[cfg(test)]
mod collector_tests;

pub use collector::{Collector, SELF_PROVIDER};
pub use normalize::{MetricIdentifier, NormalizedMetric, normalize};
pub use store::MetricsStore;
