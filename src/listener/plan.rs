//! Deterministic listener planning.
//!
//! A [`BindingPlan`] is a pure function of the URL lists, the metrics switch
//! and the TLS settings: identical inputs give an identical ordered plan.

use std::fmt;
use std::net::IpAddr;

use url::{Host, Url};

use super::error::BindError;
use super::tls::TlsSettings;
use crate::config::{ConfigurationView, HostEnvironment, MetricsOptions, keys, split_urls};

/// Environment variable overriding the control-surface URLs.
pub const URLS_ENV: &str = "DIAGMON_URLS";

/// Environment variable overriding the metrics-surface URLs.
pub const METRICS_URLS_ENV: &str = "DIAGMON_METRICS_URLS";

/// Which logical surface a listener serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Authenticated control operations.
    Control,
    /// Anonymous plaintext metrics.
    Metrics,
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "control",
            Self::Metrics => "metrics",
        })
    }
}

/// One URL to bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    /// The URL as configured.
    pub url: String,
    /// Surface the listener serves.
    pub surface: Surface,
    /// `true` for `https` URLs.
    pub require_tls: bool,
}

impl ListenerSpec {
    /// Creates a spec; TLS is required for `https` URLs.
    #[must_use]
    pub fn new(url: impl Into<String>, surface: Surface) -> Self {
        let url = url.into();
        let require_tls = url
            .split_once("://")
            .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case("https"));
        Self {
            url,
            surface,
            require_tls,
        }
    }

    /// Parses the URL into a bindable address.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::InvalidUrl`] for malformed URLs or schemes other
    /// than `http` and `https`.
    pub fn address(&self) -> Result<ListenAddress, BindError> {
        ListenAddress::parse(&self.url)
    }
}

/// Host part of a listen URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenHost {
    /// `localhost`: every loopback address.
    Loopback,
    /// `*`, `+` or `0.0.0.0`: every IPv4 interface.
    AnyV4,
    /// `[::]`: every IPv6 interface.
    AnyV6,
    /// A literal address.
    Ip(IpAddr),
    /// A name for the system resolver.
    Name(String),
}

/// A parsed listen URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    /// Host to bind.
    pub host: ListenHost,
    /// Port to bind (the scheme default when the URL has none).
    pub port: u16,
}

impl ListenAddress {
    /// Parses `scheme://host[:port][/path]`.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::InvalidUrl`] if the URL cannot be bound.
    pub fn parse(raw: &str) -> Result<Self, BindError> {
        let invalid = |reason: &str| BindError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = raw.trim().split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        let authority_end = rest.find('/').unwrap_or(rest.len());
        let (authority, path) = rest.split_at(authority_end);

        // Wildcard hosts are not valid URL hosts; bind them as 0.0.0.0.
        let wildcard_port = authority
            .strip_prefix('*')
            .or_else(|| authority.strip_prefix('+'))
            .filter(|port| port.is_empty() || port.starts_with(':'));
        let normalized = match wildcard_port {
            Some(port) => format!("{scheme}://0.0.0.0{port}{path}"),
            None => raw.trim().to_string(),
        };

        let url = Url::parse(&normalized).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https are supported"));
        }
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let host = match url.host() {
            Some(Host::Domain(name)) if name.eq_ignore_ascii_case("localhost") => {
                ListenHost::Loopback
            }
            Some(Host::Domain(name)) => ListenHost::Name(name.to_string()),
            Some(Host::Ipv4(ip)) if ip.is_unspecified() => ListenHost::AnyV4,
            Some(Host::Ipv6(ip)) if ip.is_unspecified() => ListenHost::AnyV6,
            Some(Host::Ipv4(ip)) => ListenHost::Ip(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => ListenHost::Ip(IpAddr::V6(ip)),
            None => return Err(invalid("missing host")),
        };
        Ok(Self { host, port })
    }
}

/// Environment overrides for the URL lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOverrides {
    /// Replaces the control-surface URLs.
    pub urls: Option<String>,
    /// Replaces the metrics-surface URLs.
    pub metrics_urls: Option<String>,
}

impl UrlOverrides {
    /// Reads the override variables from the host environment.
    #[must_use]
    pub fn from_host(host: &HostEnvironment) -> Self {
        Self {
            urls: host.var(URLS_ENV).map(str::to_string),
            metrics_urls: host.var(METRICS_URLS_ENV).map(str::to_string),
        }
    }
}

/// The URL sets to bind, after precedence is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerUrls {
    /// Control-surface URLs.
    pub control: Vec<String>,
    /// Metrics-surface URLs.
    pub metrics: Vec<String>,
}

impl ListenerUrls {
    /// Applies precedence: environment override, then the merged view (which
    /// already holds command-line values over defaults).
    #[must_use]
    pub fn resolve(view: &ConfigurationView, metrics: &MetricsOptions, overrides: &UrlOverrides) -> Self {
        let control = overrides
            .urls
            .as_deref()
            .or_else(|| view.get(keys::URLS))
            .map(split_urls)
            .unwrap_or_default();
        let metrics = overrides
            .metrics_urls
            .as_deref()
            .map_or_else(|| metrics.endpoints.clone(), split_urls);
        Self { control, metrics }
    }
}

/// Ordered listeners to bind plus the TLS settings they share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPlan {
    specs: Vec<ListenerSpec>,
    tls: TlsSettings,
}

impl BindingPlan {
    /// Listeners in bind order.
    #[must_use]
    pub fn specs(&self) -> &[ListenerSpec] {
        &self.specs
    }

    /// TLS settings for `https` listeners.
    #[must_use]
    pub const fn tls(&self) -> &TlsSettings {
        &self.tls
    }

    /// Number of listeners on `surface`.
    #[must_use]
    pub fn count(&self, surface: Surface) -> usize {
        self.specs.iter().filter(|s| s.surface == surface).count()
    }
}

/// Builds the binding plan.
///
/// Control URLs come first in input order, then metrics URLs if metrics are
/// enabled. A URL appearing twice is planned once, on its first surface,
/// unless it asks for an ephemeral port: every port-0 URL gets its own
/// socket, so repeats never collide.
#[must_use]
pub fn plan(
    control_urls: &[String],
    metrics_enabled: bool,
    metrics_urls: &[String],
    tls: TlsSettings,
) -> BindingPlan {
    let metrics: &[String] = if metrics_enabled { metrics_urls } else { &[] };
    let mut specs: Vec<ListenerSpec> = Vec::new();

    let candidates = control_urls
        .iter()
        .map(|u| (u, Surface::Control))
        .chain(metrics.iter().map(|u| (u, Surface::Metrics)));
    for (url, surface) in candidates {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        let ephemeral = ListenAddress::parse(url).is_ok_and(|a| a.port == 0);
        if !ephemeral && specs.iter().any(|s| s.url.eq_ignore_ascii_case(url)) {
            continue;
        }
        specs.push(ListenerSpec::new(url, surface));
    }
    BindingPlan { specs, tls }
}
