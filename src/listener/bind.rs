//! Binding planned listeners to sockets.
//!
//! Each URL is bound independently and reported as a typed
//! [`ListenerBindingResult`]. Missing certificate material downgrades an
//! `https` URL to plaintext; every other failure is reported as an error
//! the caller treats as fatal.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{TcpListener, lookup_host};
use tokio_rustls::TlsAcceptor;

use super::error::BindError;
use super::plan::{BindingPlan, ListenHost, ListenerSpec, Surface};
use super::tls::TlsSettings;

/// Scheme a listener actually serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundScheme {
    /// Plaintext HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl fmt::Display for BoundScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
        })
    }
}

/// Summary of how one URL was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Bound with the requested scheme.
    Bound,
    /// An `https` URL bound as plaintext because TLS material was missing.
    BoundWithFallback,
    /// Binding failed.
    Failed,
}

/// Diagnostics for one planned URL.
#[derive(Debug)]
pub struct ListenerBindingResult {
    /// The configured URL.
    pub url: String,
    /// Surface the URL serves.
    pub surface: Surface,
    /// Scheme the sockets serve.
    pub bound_scheme: BoundScheme,
    /// `true` when an `https` URL fell back to `http`.
    pub fallback_applied: bool,
    /// Set when binding failed.
    pub error: Option<BindError>,
    /// Addresses actually bound.
    pub local_addrs: Vec<SocketAddr>,
}

impl ListenerBindingResult {
    fn new(spec: &ListenerSpec) -> Self {
        Self {
            url: spec.url.clone(),
            surface: spec.surface,
            bound_scheme: BoundScheme::Http,
            fallback_applied: false,
            error: None,
            local_addrs: Vec::new(),
        }
    }

    /// Classifies the result.
    #[must_use]
    pub const fn outcome(&self) -> BindOutcome {
        if self.error.is_some() {
            BindOutcome::Failed
        } else if self.fallback_applied {
            BindOutcome::BoundWithFallback
        } else {
            BindOutcome::Bound
        }
    }
}

/// A bound socket ready to accept connections.
pub struct BoundListener {
    /// Surface served on this socket.
    pub surface: Surface,
    /// The configured URL this socket belongs to.
    pub url: String,
    /// The socket.
    pub listener: TcpListener,
    /// Present when connections must complete a TLS handshake first.
    pub tls: Option<TlsAcceptor>,
}

impl BoundListener {
    /// Address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the address cannot be queried.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundListener")
            .field("surface", &self.surface)
            .field("url", &self.url)
            .field("local_addr", &self.listener.local_addr().ok())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// Everything [`bind`] produced.
#[derive(Debug, Default)]
pub struct BindReport {
    /// One entry per planned URL, in plan order.
    pub results: Vec<ListenerBindingResult>,
    /// Sockets for every URL that bound.
    pub listeners: Vec<BoundListener>,
}

impl BindReport {
    /// The first failure in plan order.
    #[must_use]
    pub fn first_error(&self) -> Option<&BindError> {
        self.results.iter().find_map(|r| r.error.as_ref())
    }

    /// Returns the listeners if every URL bound.
    ///
    /// # Errors
    ///
    /// Returns the first [`BindError`] in plan order; all sockets are
    /// dropped.
    pub fn into_result(self) -> Result<Vec<BoundListener>, BindError> {
        match self.results.into_iter().find_map(|r| r.error) {
            Some(err) => Err(err),
            None => Ok(self.listeners),
        }
    }
}

/// Binds every URL in the plan.
pub async fn bind(plan: &BindingPlan) -> BindReport {
    let mut report = BindReport::default();
    for spec in plan.specs() {
        let mut result = ListenerBindingResult::new(spec);
        match bind_spec(spec, plan.tls()).await {
            Ok((tls, sockets)) => {
                result.fallback_applied = spec.require_tls && tls.is_none();
                if tls.is_some() {
                    result.bound_scheme = BoundScheme::Https;
                }
                for listener in sockets {
                    if let Ok(addr) = listener.local_addr() {
                        tracing::info!(
                            "Now listening on: {}://{addr} ({})",
                            result.bound_scheme,
                            spec.surface
                        );
                        result.local_addrs.push(addr);
                    }
                    report.listeners.push(BoundListener {
                        surface: spec.surface,
                        url: spec.url.clone(),
                        listener,
                        tls: tls.clone(),
                    });
                }
            }
            Err(err) => {
                tracing::debug!("Binding {} failed: {err}", spec.url);
                result.error = Some(err);
            }
        }
        report.results.push(result);
    }
    report
}

async fn bind_spec(
    spec: &ListenerSpec,
    tls: &TlsSettings,
) -> Result<(Option<TlsAcceptor>, Vec<TcpListener>), BindError> {
    let address = spec.address()?;
    let acceptor = acceptor_for(spec, tls)?;
    let port = address.port;

    let sockets = match address.host {
        ListenHost::Loopback => {
            let v4 = bind_addr(&spec.url, SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
            // Port 0 must resolve to the same port on both loopbacks.
            let actual = v4.local_addr().map_or(port, |a| a.port());
            let mut sockets = vec![v4];
            match TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, actual))).await {
                Ok(v6) => sockets.push(v6),
                Err(e) => tracing::debug!("Skipping [::1]:{actual} for {}: {e}", spec.url),
            }
            sockets
        }
        ListenHost::AnyV4 => {
            vec![bind_addr(&spec.url, SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?]
        }
        ListenHost::AnyV6 => {
            vec![bind_addr(&spec.url, SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))).await?]
        }
        ListenHost::Ip(ip) => vec![bind_addr(&spec.url, SocketAddr::new(ip, port)).await?],
        ListenHost::Name(name) => {
            let resolve_err = |source| BindError::Resolve {
                url: spec.url.clone(),
                source,
            };
            let addr = lookup_host((name.as_str(), port))
                .await
                .map_err(resolve_err)?
                .next()
                .ok_or_else(|| resolve_err(io::Error::new(io::ErrorKind::NotFound, "no addresses")))?;
            vec![bind_addr(&spec.url, addr).await?]
        }
    };
    Ok((acceptor, sockets))
}

fn acceptor_for(spec: &ListenerSpec, tls: &TlsSettings) -> Result<Option<TlsAcceptor>, BindError> {
    if !spec.require_tls {
        return Ok(None);
    }
    match tls.load() {
        Ok(config) => Ok(Some(TlsAcceptor::from(config))),
        Err(e) if e.is_missing_material() => {
            tracing::warn!("Binding {} without TLS: {e}", spec.url);
            Ok(None)
        }
        Err(source) => Err(BindError::Tls {
            url: spec.url.clone(),
            source,
        }),
    }
}

async fn bind_addr(url: &str, addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr).await.map_err(|source| BindError::Bind {
        url: url.to_string(),
        addr,
        source,
    })
}
