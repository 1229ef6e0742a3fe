//! Tests for listener planning and URL parsing.

use super::error::BindError;
use super::plan::{ListenAddress, ListenHost, ListenerUrls, Surface, UrlOverrides, plan};
use super::tls::TlsSettings;
use crate::config::{
    ConfigPaths, HostEnvironment, LayerData, LayerKind, MetricsOptions, defaults_layer, merge,
};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

mod planning {
    use super::*;

    #[test]
    fn control_first_then_metrics() {
        let plan = plan(
            &urls(&["https://localhost:52323"]),
            true,
            &urls(&["http://localhost:52325"]),
            TlsSettings::default(),
        );

        let specs = plan.specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].url, "https://localhost:52323");
        assert_eq!(specs[0].surface, Surface::Control);
        assert!(specs[0].require_tls);
        assert_eq!(specs[1].surface, Surface::Metrics);
        assert!(!specs[1].require_tls);
    }

    #[test]
    fn metrics_disabled_plans_no_metrics_listeners() {
        let plan = plan(
            &urls(&["http://localhost:1"]),
            false,
            &urls(&["http://localhost:2", "http://localhost:3"]),
            TlsSettings::default(),
        );

        assert_eq!(plan.count(Surface::Metrics), 0);
        assert_eq!(plan.count(Surface::Control), 1);
    }

    #[test]
    fn same_inputs_give_same_plan() {
        let control = urls(&["http://a:1", "http://b:2"]);
        let metrics = urls(&["http://c:3"]);

        assert_eq!(
            plan(&control, true, &metrics, TlsSettings::default()),
            plan(&control, true, &metrics, TlsSettings::default())
        );
    }

    #[test]
    fn duplicates_and_blanks_are_dropped() {
        let plan = plan(
            &urls(&["http://localhost:1", " ", "HTTP://LOCALHOST:1"]),
            true,
            &urls(&["http://localhost:1", "http://localhost:2"]),
            TlsSettings::default(),
        );

        let planned: Vec<_> = plan.specs().iter().map(|s| (s.url.as_str(), s.surface)).collect();
        assert_eq!(
            planned,
            vec![
                ("http://localhost:1", Surface::Control),
                ("http://localhost:2", Surface::Metrics),
            ]
        );
    }

    #[test]
    fn ephemeral_port_urls_are_never_merged() {
        let plan = plan(
            &urls(&["http://127.0.0.1:0"]),
            true,
            &urls(&["http://127.0.0.1:0"]),
            TlsSettings::default(),
        );

        assert_eq!(plan.count(Surface::Control), 1);
        assert_eq!(plan.count(Surface::Metrics), 1);
    }
}

mod parsing {
    use super::*;

    #[test]
    fn localhost_is_loopback() {
        let address = ListenAddress::parse("https://localhost:52323").unwrap();

        assert_eq!(address.host, ListenHost::Loopback);
        assert_eq!(address.port, 52323);
    }

    #[test]
    fn wildcards_bind_all_ipv4() {
        for raw in ["http://*:80", "http://+:80", "http://0.0.0.0:80"] {
            let address = ListenAddress::parse(raw).unwrap();
            assert_eq!(address.host, ListenHost::AnyV4, "{raw}");
            assert_eq!(address.port, 80);
        }
    }

    #[test]
    fn ipv6_any_and_literals() {
        assert_eq!(
            ListenAddress::parse("http://[::]:8080").unwrap().host,
            ListenHost::AnyV6
        );
        assert_eq!(
            ListenAddress::parse("http://10.0.0.5:8080").unwrap().host,
            ListenHost::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)))
        );
    }

    #[test]
    fn missing_port_uses_scheme_default() {
        assert_eq!(ListenAddress::parse("http://localhost").unwrap().port, 80);
        assert_eq!(ListenAddress::parse("https://localhost/").unwrap().port, 443);
        assert_eq!(ListenAddress::parse("http://*").unwrap().port, 80);
    }

    #[test]
    fn other_names_are_resolved_later() {
        assert_eq!(
            ListenAddress::parse("http://monitor.internal:9000").unwrap().host,
            ListenHost::Name("monitor.internal".to_string())
        );
    }

    #[test]
    fn unsupported_urls_are_rejected() {
        for raw in ["localhost:80", "ftp://localhost:21", "http://"] {
            let err = ListenAddress::parse(raw).unwrap_err();
            assert!(matches!(err, BindError::InvalidUrl { .. }), "{raw}");
        }
    }
}

mod precedence {
    use super::*;

    fn host(vars: &[(&str, &str)]) -> HostEnvironment {
        let vars: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        HostEnvironment::from_vars(ConfigPaths::new("/nonexistent", None), vars)
    }

    fn resolve(command_line: &[(&str, &str)], vars: &[(&str, &str)]) -> ListenerUrls {
        let cli: LayerData = command_line
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let defaults = defaults_layer();
        let view = merge(
            [(LayerKind::CommandLine, &cli), (LayerKind::Defaults, &defaults)],
            0,
        );
        let metrics = MetricsOptions::from_view(&view).unwrap();
        ListenerUrls::resolve(&view, &metrics, &UrlOverrides::from_host(&host(vars)))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let urls = resolve(&[], &[]);

        assert_eq!(urls.control, vec!["https://localhost:52323"]);
        assert_eq!(urls.metrics, vec!["http://localhost:52325"]);
    }

    #[test]
    fn command_line_beats_defaults() {
        let urls = resolve(&[("urls", "http://localhost:1;http://localhost:2")], &[]);

        assert_eq!(urls.control, vec!["http://localhost:1", "http://localhost:2"]);
    }

    #[test]
    fn environment_beats_command_line() {
        let urls = resolve(
            &[("urls", "http://localhost:1")],
            &[
                ("DIAGMON_URLS", "http://localhost:7"),
                ("DIAGMON_METRICS_URLS", "http://localhost:8;http://localhost:9"),
            ],
        );

        assert_eq!(urls.control, vec!["http://localhost:7"]);
        assert_eq!(urls.metrics, vec!["http://localhost:8", "http://localhost:9"]);
    }
}
