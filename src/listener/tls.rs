//! TLS settings and server configuration loading.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::ServerConfig;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use super::error::TlsMaterialError;
use crate::config::{ConfigurationView, keys};

const ALPN_HTTP1: &[u8] = b"http/1.1";

/// Certificate material for `https` listeners.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    certificate: Option<PathBuf>,
    key: Option<PathBuf>,
}

impl TlsSettings {
    /// Creates settings from explicit paths.
    #[must_use]
    pub const fn new(certificate: Option<PathBuf>, key: Option<PathBuf>) -> Self {
        Self { certificate, key }
    }

    /// Reads the `Tls:Certificate` section.
    #[must_use]
    pub fn from_view(view: &ConfigurationView) -> Self {
        Self {
            certificate: view.get_non_empty(keys::TLS_CERTIFICATE_PATH).map(PathBuf::from),
            key: view.get_non_empty(keys::TLS_CERTIFICATE_KEY_PATH).map(PathBuf::from),
        }
    }

    /// Returns `true` if both paths are set.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.certificate.is_some() && self.key.is_some()
    }

    /// Loads the PEM chain and key into a server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TlsMaterialError`] if material is missing, unreadable,
    /// not valid PEM, or rejected by the TLS stack.
    pub fn load(&self) -> Result<Arc<ServerConfig>, TlsMaterialError> {
        let (Some(cert_path), Some(key_path)) = (&self.certificate, &self.key) else {
            return Err(TlsMaterialError::NotConfigured);
        };

        let certs = read_certificates(cert_path)?;
        let key = read_private_key(key_path)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![ALPN_HTTP1.to_vec()];
        Ok(Arc::new(config))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, TlsMaterialError> {
    std::fs::read(path).map_err(|source| TlsMaterialError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsMaterialError> {
    let pem = read(path)?;
    let invalid = |reason: String| TlsMaterialError::InvalidPem {
        path: path.to_path_buf(),
        reason,
    };
    let certs = CertificateDer::pem_slice_iter(&pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| invalid(e.to_string()))?;
    if certs.is_empty() {
        return Err(invalid("no certificates found".to_string()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsMaterialError> {
    let pem = read(path)?;
    PrivateKeyDer::from_pem_slice(&pem).map_err(|e| TlsMaterialError::InvalidPem {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
