// Shared transport configuration.
//
// The account client shares TLS, timeout and user-agent settings through
// this module; the push socket takes its TLS trust from the same `TlsMode`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rustls::RootCertStore;
use rustls_pki_types::CertificateDer;
use rustls_pki_types::pem::PemObject;
use tokio_tungstenite::Connector;

use crate::error::Error;

const USER_AGENT: &str = concat!("pushover-open-client/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the bundled web PKI roots.
    #[default]
    System,
    /// Trust an additional CA certificate from the given PEM file
    /// (intercepting proxies, test fixtures).
    CustomCa(PathBuf),
}

impl TlsMode {
    /// TLS connector for the push socket.
    ///
    /// `None` keeps tokio-tungstenite's default (web PKI roots). A custom
    /// CA is trusted on top of the web PKI roots, matching the HTTP client.
    pub fn socket_connector(&self) -> Result<Option<Connector>, Error> {
        let Self::CustomCa(path) = self else {
            return Ok(None);
        };

        let pem = std::fs::read(path)
            .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;

        let mut roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let mut added = 0_usize;
        for cert in CertificateDer::pem_slice_iter(&pem) {
            let cert = cert.map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            roots
                .add(cert)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            added += 1;
        }
        if added == 0 {
            return Err(Error::Tls(format!(
                "no certificates found in {}",
                path.display()
            )));
        }

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("failed to build TLS config: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Some(Connector::Rustls(Arc::new(config))))
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let TlsMode::CustomCa(path) = &self.tls {
            let cert_pem = std::fs::read(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&cert_pem)
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// Timeout in whole seconds, for error reporting.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}
