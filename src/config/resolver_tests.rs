//! Tests for merging, reloading and watching.

use super::layer::{JsonFileSource, LayerData, LayerKind, LayerSource, MemorySource};
use super::paths::{ConfigPaths, HostEnvironment, SHARED_DIRECTORY_OVERRIDE, USER_DIRECTORY_OVERRIDE};
use super::resolver::ConfigurationResolver;
use super::view::merge;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn data(pairs: &[(&str, &str)]) -> LayerData {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

fn memory(kind: LayerKind, pairs: &[(&str, &str)]) -> Box<dyn LayerSource> {
    Box::new(MemorySource::new(kind, data(pairs)))
}

fn json(kind: LayerKind, path: &Path) -> Box<dyn LayerSource> {
    Box::new(JsonFileSource::new(kind, path))
}

/// Tests vary the content length between writes so the fingerprint moves
/// even on filesystems with coarse timestamps.
fn write_settings(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
}

mod precedence {
    use super::*;

    #[test]
    fn higher_layer_wins_regardless_of_registration_order() {
        let forward = ConfigurationResolver::new(vec![
            memory(LayerKind::Defaults, &[("urls", "default")]),
            memory(LayerKind::Environment, &[("urls", "env")]),
            memory(LayerKind::CommandLine, &[("urls", "cli")]),
        ]);
        let backward = ConfigurationResolver::new(vec![
            memory(LayerKind::CommandLine, &[("urls", "cli")]),
            memory(LayerKind::Environment, &[("urls", "env")]),
            memory(LayerKind::Defaults, &[("urls", "default")]),
        ]);

        assert_eq!(forward.resolve().get("urls"), Some("cli"));
        assert_eq!(backward.resolve().get("urls"), Some("cli"));
        assert_eq!(
            forward.resolve().source_of("urls"),
            Some(LayerKind::CommandLine)
        );
    }

    #[test]
    fn overrides_beat_command_line() {
        let resolver = ConfigurationResolver::new(vec![
            memory(LayerKind::CommandLine, &[("ApiAuthentication:ApiKeyHash", "cli")]),
            memory(
                LayerKind::InMemoryOverrides,
                &[("ApiAuthentication:ApiKeyHash", "generated")],
            ),
        ]);

        assert_eq!(
            resolver.resolve().get("ApiAuthentication:ApiKeyHash"),
            Some("generated")
        );
    }

    #[test]
    fn keys_compare_case_insensitively() {
        let resolver = ConfigurationResolver::new(vec![
            memory(LayerKind::Environment, &[("METRICS:ENABLED", "false")]),
            memory(LayerKind::Defaults, &[("Metrics:Enabled", "true")]),
        ]);
        let view = resolver.resolve();

        assert_eq!(view.get("metrics:enabled"), Some("false"));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn lower_layers_fill_gaps() {
        let resolver = ConfigurationResolver::new(vec![
            memory(LayerKind::CommandLine, &[("a", "1")]),
            memory(LayerKind::Defaults, &[("a", "0"), ("b", "2")]),
        ]);
        let view = resolver.resolve();

        assert_eq!(view.get("a"), Some("1"));
        assert_eq!(view.get("b"), Some("2"));
        assert_eq!(view.source_of("b"), Some(LayerKind::Defaults));
    }

    #[test]
    fn merge_is_a_pure_function_of_layer_contents() {
        let high = data(&[("x", "high")]);
        let low = data(&[("x", "low"), ("y", "low")]);

        let a = merge([(LayerKind::UserFile, &high), (LayerKind::SharedFile, &low)], 7);
        let b = merge([(LayerKind::SharedFile, &low), (LayerKind::UserFile, &high)], 7);

        assert_eq!(a, b);
        assert_eq!(a.generation(), 7);
    }
}

mod view {
    use super::*;

    #[test]
    fn section_lists_children_only() {
        let resolver = ConfigurationResolver::new(vec![memory(
            LayerKind::Defaults,
            &[("Metrics:Enabled", "true"), ("Metrics:MetricCount", "3"), ("MetricsX", "no")],
        )]);
        let view = resolver.resolve();

        let keys: Vec<_> = view.section("metrics").map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Metrics:Enabled", "Metrics:MetricCount"]);
        assert!(view.has_section("Metrics"));
        assert!(!view.has_section("Tls"));
    }

    #[test]
    fn get_bool_rejects_other_text() {
        let resolver = ConfigurationResolver::new(vec![memory(
            LayerKind::Defaults,
            &[("a", "TRUE"), ("b", "yes"), ("c", " ")],
        )]);
        let view = resolver.resolve();

        assert_eq!(view.get_bool("a").unwrap(), Some(true));
        assert!(view.get_bool("b").is_err());
        assert_eq!(view.get_bool("c").unwrap(), None);
        assert_eq!(view.get_bool("absent").unwrap(), None);
    }
}

mod reload {
    use super::*;

    #[test]
    fn changed_file_publishes_new_view() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_settings(&path, r#"{"Metrics": {"Enabled": "true"}}"#);

        let mut resolver = ConfigurationResolver::new(vec![json(LayerKind::UserFile, &path)]);
        assert_eq!(resolver.resolve().get("Metrics:Enabled"), Some("true"));

        write_settings(&path, r#"{"Metrics": {"Enabled": "false", "MetricCount": 4}}"#);
        let event = resolver.reload().expect("change should be detected");

        assert_eq!(event.layers, vec![LayerKind::UserFile]);
        assert_eq!(event.generation, 1);
        let view = resolver.resolve();
        assert_eq!(view.get("Metrics:Enabled"), Some("false"));
        assert_eq!(view.get("Metrics:MetricCount"), Some("4"));
        assert_eq!(view.generation(), 1);
    }

    #[test]
    fn invalid_document_keeps_previous_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_settings(&path, r#"{"urls": "http://localhost:1"}"#);

        let mut resolver = ConfigurationResolver::new(vec![
            json(LayerKind::UserFile, &path),
            memory(LayerKind::Defaults, &[("Metrics:Enabled", "true")]),
        ]);
        let before = resolver.resolve();

        write_settings(&path, "{ this is not json at all");
        assert!(resolver.reload().is_none());

        let after = resolver.resolve();
        assert_eq!(after.get("urls"), Some("http://localhost:1"));
        assert_eq!(after.get("Metrics:Enabled"), Some("true"));
        assert_eq!(after.generation(), before.generation());
    }

    #[test]
    fn deleted_file_drops_only_its_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_settings(&path, r#"{"urls": "from-file"}"#);

        let mut resolver = ConfigurationResolver::new(vec![
            json(LayerKind::UserFile, &path),
            memory(LayerKind::Defaults, &[("urls", "default"), ("other", "kept")]),
        ]);
        assert_eq!(resolver.resolve().get("urls"), Some("from-file"));

        fs::remove_file(&path).unwrap();
        assert!(resolver.reload().is_some());

        let view = resolver.resolve();
        assert_eq!(view.get("urls"), Some("default"));
        assert_eq!(view.get("other"), Some("kept"));
    }

    #[test]
    fn unchanged_sources_publish_nothing() {
        let mut resolver =
            ConfigurationResolver::new(vec![memory(LayerKind::CommandLine, &[("a", "1")])]);

        assert!(resolver.reload().is_none());
        assert_eq!(resolver.resolve().generation(), 0);
    }

    #[test]
    fn snapshots_held_by_readers_are_immutable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_settings(&path, r#"{"a": "1"}"#);
        let mut resolver = ConfigurationResolver::new(vec![json(LayerKind::SharedFile, &path)]);
        let held = resolver.resolve();

        write_settings(&path, r#"{"a": "22"}"#);
        resolver.reload();

        assert_eq!(held.get("a"), Some("1"));
        assert_eq!(resolver.resolve().get("a"), Some("22"));
    }
}

mod watching {
    use super::*;
    use tokio_stream::StreamExt;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn watcher_emits_change_event_and_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        write_settings(&path, r#"{"a": "1"}"#);

        let resolver = ConfigurationResolver::new(vec![json(LayerKind::UserFile, &path)])
        .with_poll_interval(Duration::from_millis(20));
        let handle = resolver.handle();
        let mut changes = Box::pin(resolver.watch());
        let cancel = CancellationToken::new();
        let task = resolver.spawn(cancel.clone());

        write_settings(&path, r#"{"a": "changed"}"#);
        let event = tokio::time::timeout(Duration::from_secs(5), changes.next())
            .await
            .expect("change event within timeout")
            .expect("stream open");

        assert_eq!(event.layers, vec![LayerKind::UserFile]);
        assert_eq!(handle.snapshot().get("a"), Some("changed"));
        assert_eq!(handle.snapshot().generation(), event.generation);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watcher stops after cancel")
            .unwrap();
    }
}

mod standard_layers {
    use super::*;

    fn host(shared: &Path, user: &Path, extra: &[(&str, &str)]) -> HostEnvironment {
        let mut vars: BTreeMap<String, String> = extra
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        vars.insert(
            SHARED_DIRECTORY_OVERRIDE.to_string(),
            shared.display().to_string(),
        );
        vars.insert(USER_DIRECTORY_OVERRIDE.to_string(), user.display().to_string());
        HostEnvironment::from_vars(ConfigPaths::new("/nonexistent/shared", None), vars)
    }

    #[test]
    fn test_overrides_redirect_directories() {
        let shared = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let host = host(shared.path(), user.path(), &[]);

        assert_eq!(host.paths.shared_dir(), shared.path());
        assert_eq!(host.paths.user_dir(), Some(user.path()));
        assert_eq!(
            host.paths.user_settings(),
            Some(user.path().join("settings.json"))
        );
    }

    #[test]
    fn full_precedence_chain() {
        let shared = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(
            shared.path().join("settings.json"),
            r#"{"a": "shared", "b": "shared", "c": "shared"}"#,
        )
        .unwrap();
        fs::write(user.path().join("settings.json"), r#"{"a": "user", "b": "user"}"#).unwrap();
        fs::write(shared.path().join("c"), "key-per-file").unwrap();
        fs::write(shared.path().join("d"), "key-per-file").unwrap();
        let host = host(
            shared.path(),
            user.path(),
            &[("DIAGMON_d", "env"), ("DIAGMON_e", "env")],
        );

        let resolver = ConfigurationResolver::standard(
            data(&[("a", "override")]),
            LayerData::new(),
            data(&[("e", "default"), ("f", "default")]),
            &host,
        );
        let view = resolver.resolve();

        assert_eq!(view.get("a"), Some("override"));
        assert_eq!(view.get("b"), Some("user"));
        assert_eq!(view.get("c"), Some("shared"));
        assert_eq!(view.get("d"), Some("key-per-file"));
        assert_eq!(view.get("e"), Some("env"));
        assert_eq!(view.get("f"), Some("default"));
        assert!(view.get("settings.json").is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn orchestrator_reads_data_directory() {
        let shared = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(shared.path().join("top"), "top-level").unwrap();
        fs::create_dir(shared.path().join("..data")).unwrap();
        fs::write(shared.path().join("..data").join("mounted"), "from-data").unwrap();

        let orchestrated = host(
            shared.path(),
            user.path(),
            &[("KUBERNETES_SERVICE_HOST", "10.0.0.1")],
        );
        let plain = host(shared.path(), user.path(), &[]);

        let view = ConfigurationResolver::standard(
            LayerData::new(),
            LayerData::new(),
            LayerData::new(),
            &orchestrated,
        )
        .resolve();
        assert_eq!(view.get("mounted"), Some("from-data"));
        assert!(view.get("top").is_none());

        let view =
            ConfigurationResolver::standard(LayerData::new(), LayerData::new(), LayerData::new(), &plain)
                .resolve();
        assert_eq!(view.get("top"), Some("top-level"));
        assert!(view.get("mounted").is_none());
    }
}
