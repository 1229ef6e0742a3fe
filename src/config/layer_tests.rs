//! Tests for layer sources.

use super::layer::{
    EnvironmentSource, JsonFileSource, KeyPerFileSource, LayerData, LayerKind, LayerLoad,
    LayerSource, MemorySource, flatten_json,
};
use std::fs;
use tempfile::TempDir;

fn loaded(load: LayerLoad) -> LayerData {
    match load {
        LayerLoad::Loaded(data) => data,
        other => panic!("expected Loaded, got {other:?}"),
    }
}

mod kind {
    use super::*;

    #[test]
    fn ordering_follows_precedence() {
        let mut kinds = vec![
            LayerKind::Defaults,
            LayerKind::Environment,
            LayerKind::UserFile,
            LayerKind::InMemoryOverrides,
            LayerKind::KeyPerFile,
            LayerKind::CommandLine,
            LayerKind::SharedFile,
        ];
        kinds.sort();

        assert_eq!(
            kinds,
            vec![
                LayerKind::InMemoryOverrides,
                LayerKind::CommandLine,
                LayerKind::UserFile,
                LayerKind::SharedFile,
                LayerKind::KeyPerFile,
                LayerKind::Environment,
                LayerKind::Defaults,
            ]
        );
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(LayerKind::KeyPerFile.to_string(), "key-per-file directory");
    }
}

mod memory {
    use super::*;

    #[test]
    fn returns_its_data_and_never_changes() {
        let data = LayerData::from([("a:b".to_string(), "1".to_string())]);
        let source = MemorySource::new(LayerKind::CommandLine, data.clone());

        assert_eq!(source.kind(), LayerKind::CommandLine);
        assert_eq!(loaded(source.load()), data);
        assert!(source.fingerprint().is_none());
    }
}

mod json_file {
    use super::*;

    #[test]
    fn missing_file_is_missing() {
        let dir = TempDir::new().unwrap();
        let source = JsonFileSource::new(LayerKind::UserFile, dir.path().join("settings.json"));

        assert_eq!(source.load(), LayerLoad::Missing);
    }

    #[test]
    fn nested_document_is_flattened() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "Metrics": { "Enabled": false, "MetricCount": 5, "Providers": ["a", "b"] },
                "Storage": { "DumpTempFolder": null }
            }"#,
        )
        .unwrap();

        let data = loaded(JsonFileSource::new(LayerKind::SharedFile, &path).load());

        assert_eq!(data.get("Metrics:Enabled").map(String::as_str), Some("false"));
        assert_eq!(data.get("Metrics:MetricCount").map(String::as_str), Some("5"));
        assert_eq!(data.get("Metrics:Providers:0").map(String::as_str), Some("a"));
        assert_eq!(data.get("Metrics:Providers:1").map(String::as_str), Some("b"));
        assert_eq!(data.get("Storage:DumpTempFolder").map(String::as_str), Some(""));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let load = JsonFileSource::new(LayerKind::UserFile, &path).load();

        assert!(matches!(load, LayerLoad::Malformed { .. }));
    }

    #[test]
    fn non_object_root_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[1, 2]").unwrap();

        let load = JsonFileSource::new(LayerKind::UserFile, &path).load();

        assert!(matches!(load, LayerLoad::Malformed { reason } if reason.contains("object")));
    }

    #[test]
    fn fingerprint_tracks_content_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let source = JsonFileSource::new(LayerKind::UserFile, &path);

        let absent = source.fingerprint();
        fs::write(&path, "{}").unwrap();
        let present = source.fingerprint();
        fs::write(&path, r#"{"a": "longer"}"#).unwrap();
        let changed = source.fingerprint();

        assert_ne!(absent, present);
        assert_ne!(present, changed);
    }
}

mod key_per_file {
    use super::*;

    #[test]
    fn each_file_is_a_key_with_trimmed_value() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ApiAuthentication__ApiKeyHash"), "ABCD\n").unwrap();
        fs::write(dir.path().join("urls"), "  http://localhost:1  ").unwrap();

        let data = loaded(KeyPerFileSource::new(dir.path()).load());

        assert_eq!(
            data.get("ApiAuthentication:ApiKeyHash").map(String::as_str),
            Some("ABCD")
        );
        assert_eq!(data.get("urls").map(String::as_str), Some("http://localhost:1"));
    }

    #[test]
    fn skips_bookkeeping_entries_and_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("..2024_01_01"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("inner"), "y").unwrap();
        fs::write(dir.path().join("kept"), "z").unwrap();

        let data = loaded(KeyPerFileSource::new(dir.path()).load());

        assert_eq!(data.len(), 1);
        assert_eq!(data.get("kept").map(String::as_str), Some("z"));
    }

    #[test]
    fn ignored_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("settings.json"), "{}").unwrap();
        fs::write(dir.path().join("kept"), "z").unwrap();

        let data = loaded(
            KeyPerFileSource::new(dir.path())
                .ignoring("Settings.JSON")
                .load(),
        );

        assert!(!data.contains_key("settings.json"));
        assert!(data.contains_key("kept"));
    }

    #[test]
    fn missing_directory_is_missing() {
        let dir = TempDir::new().unwrap();
        let source = KeyPerFileSource::new(dir.path().join("absent"));

        assert_eq!(source.load(), LayerLoad::Missing);
        assert_eq!(source.kind(), LayerKind::KeyPerFile);
    }
}

mod environment {
    use super::*;

    #[test]
    fn strips_prefix_and_maps_separator() {
        let source = EnvironmentSource::from_vars(
            "DIAGMON_",
            [
                ("DIAGMON_Metrics__Enabled", "false"),
                ("diagmon_urls", "http://+:1"),
                ("OTHER_Metrics__Enabled", "true"),
                ("DIAGMON_", "ignored"),
            ],
        );

        let data = loaded(source.load());

        assert_eq!(data.len(), 2);
        assert_eq!(data.get("Metrics:Enabled").map(String::as_str), Some("false"));
        assert_eq!(data.get("urls").map(String::as_str), Some("http://+:1"));
    }

    #[test]
    fn short_or_non_ascii_names_are_ignored() {
        let source = EnvironmentSource::from_vars("DIAGMON_", [("DIAG", "x"), ("DIAGMÖN_a", "y")]);

        assert!(loaded(source.load()).is_empty());
    }
}

mod flattening {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_keep_their_text() {
        let mut out = LayerData::new();
        flatten_json("root", &json!({"n": 1.5, "b": true, "s": "x"}), &mut out);

        assert_eq!(out.get("root:n").map(String::as_str), Some("1.5"));
        assert_eq!(out.get("root:b").map(String::as_str), Some("true"));
        assert_eq!(out.get("root:s").map(String::as_str), Some("x"));
    }

    #[test]
    fn arrays_of_objects_use_indices() {
        let mut out = LayerData::new();
        flatten_json("list", &json!([{"a": 1}, {"a": 2}]), &mut out);

        assert_eq!(out.get("list:0:a").map(String::as_str), Some("1"));
        assert_eq!(out.get("list:1:a").map(String::as_str), Some("2"));
    }
}
