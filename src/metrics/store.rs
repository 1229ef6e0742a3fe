//! In-memory store of the most recent metric samples.
//!
//! Collectors push samples through [`MetricsStore::record`]; the exposition
//! endpoint renders the retained samples with [`MetricsStore::render`].

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Mutex;

use super::normalize::MetricIdentifier;

/// Retains the last `capacity` samples for every (provider, name) pair.
#[derive(Debug)]
pub struct MetricsStore {
    capacity: usize,
    samples: Mutex<BTreeMap<(String, String), VecDeque<MetricIdentifier>>>,
}

impl MetricsStore {
    /// Creates a store that keeps at most `capacity` samples per metric.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the per-metric sample capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records a sample, evicting the oldest one for the same metric when full.
    pub fn record(&self, sample: MetricIdentifier) {
        let key = (sample.provider.clone(), sample.name.clone());
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let queue = samples.entry(key).or_default();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(sample);
    }

    /// Removes every retained sample.
    pub fn clear(&self) {
        self.samples
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// Returns the number of distinct metrics currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns true if no samples are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders retained samples in the text exposition format.
    ///
    /// Samples are grouped by wire name, so labelled variants of one metric
    /// share a single `# TYPE <name> gauge` line. Each group is followed by
    /// one `<name> <value line>` line per retained sample, oldest first
    /// within a label set. Groups are ordered by wire name.
    #[must_use]
    pub fn render(&self) -> String {
        let samples = self
            .samples
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut families: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for sample in samples.values().flatten() {
            let metric = sample.normalize();
            let line = metric.line();
            families.entry(metric.wire_name).or_default().push(line);
        }
        drop(samples);

        let mut out = String::new();
        for (wire_name, lines) in &families {
            let _ = writeln!(out, "# TYPE {wire_name} gauge");
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
        }
        out
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(crate::config::defaults::METRICS_COUNT)
    }
}
