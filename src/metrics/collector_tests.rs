//! Tests for the self-metrics collector.

use super::collector::Collector;
use super::normalize::MetricIdentifier;
use super::store::MetricsStore;
use crate::config::ConfigurationResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[test]
fn collect_once_records_uptime_and_gauges() {
    let store = Arc::new(MetricsStore::new(3));
    let collector = Collector::new(Arc::clone(&store), Duration::from_secs(10)).with_gauge(
        MetricIdentifier::new("diagmon", "listeners{surface=\"control\"}", Some("count"), 2.0),
    );

    collector.collect_once();

    let rendered = store.render();
    assert!(rendered.contains("# TYPE diagmon_uptime_seconds gauge\n"));
    assert!(rendered.contains("diagmon_listeners {surface=\"control\"} 2\n"));
}

#[test]
fn config_generation_is_reported_when_attached() {
    let store = Arc::new(MetricsStore::new(3));
    let resolver = ConfigurationResolver::new(Vec::new());
    let collector =
        Collector::new(Arc::clone(&store), Duration::from_secs(10)).with_config(resolver.handle());

    collector.collect_once();

    assert!(store.render().contains("diagmon_config_generation 0\n"));
}

#[tokio::test(start_paused = true)]
async fn run_collects_every_interval_until_cancelled() {
    let store = Arc::new(MetricsStore::new(5));
    let cancel = CancellationToken::new();
    let collector = Collector::new(Arc::clone(&store), Duration::from_secs(10));
    let task = tokio::spawn(collector.run(cancel.clone()));

    tokio::time::sleep(Duration::from_secs(25)).await;
    cancel.cancel();
    task.await.unwrap();

    let samples = store
        .render()
        .lines()
        .filter(|line| line.starts_with("diagmon_uptime_seconds "))
        .count();
    assert_eq!(samples, 3);
}
