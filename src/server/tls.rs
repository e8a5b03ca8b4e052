//! Transport credentials and rustls server configuration.
//!
//! Credentials select the encrypted transport: when present, every accepted
//! stream is wrapped in a TLS handshake before it reaches the HTTP layer;
//! when absent, the server speaks plaintext. All parsing happens before the
//! socket is opened, so malformed material fails the bind, not a connection.

use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::error::{Error, Result};

/// Tracks if the default cryptography provider for `rustls` has been set.
static DEFAULT_CRYPTO_PROVIDER_SET: OnceLock<()> = OnceLock::new();

fn ensure_crypto_provider() {
    DEFAULT_CRYPTO_PROVIDER_SET.get_or_init(|| {
        // Another component in the process may have installed one already;
        // the install result is irrelevant as long as some provider is set.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Key/certificate material selecting encrypted transport.
///
/// Holds PEM bytes, matching the shape callers get from reading `key.pem` /
/// `cert.pem` files. The optional CA bundle enables verification of client
/// certificates when clients offer them; clients without certificates are
/// still accepted.
#[derive(Clone)]
pub struct TransportCredentials {
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
    ca_pem: Option<Vec<u8>>,
}

impl std::fmt::Debug for TransportCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of debug output.
        f.debug_struct("TransportCredentials")
            .field("cert_pem_len", &self.cert_pem.len())
            .field("has_ca", &self.ca_pem.is_some())
            .finish()
    }
}

impl TransportCredentials {
    /// Create credentials from PEM-encoded certificate chain and private key.
    #[must_use]
    pub fn new(cert_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: key_pem.into(),
            ca_pem: None,
        }
    }

    /// Attach a PEM-encoded CA bundle used to verify client certificates.
    #[must_use]
    pub fn with_ca(mut self, ca_pem: impl Into<Vec<u8>>) -> Self {
        self.ca_pem = Some(ca_pem.into());
        self
    }

    /// Load credentials from PEM files on disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if any file cannot be read.
    pub fn from_pem_files(cert: &Path, key: &Path, ca: Option<&Path>) -> Result<Self> {
        let read = |path: &Path| -> Result<Vec<u8>> {
            std::fs::read(path)
                .map_err(|e| Error::credentials(format!("cannot read {}: {e}", path.display())))
        };

        let mut creds = Self::new(read(cert)?, read(key)?);
        if let Some(ca) = ca {
            creds = creds.with_ca(read(ca)?);
        }
        Ok(creds)
    }

    /// Build a TLS acceptor from this material.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the PEM material does not parse or
    /// the certificate/key pair is inconsistent.
    pub(crate) fn acceptor(&self) -> Result<TlsAcceptor> {
        ensure_crypto_provider();

        let certs = rustls_pemfile::certs(&mut BufReader::new(self.cert_pem.as_slice()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::credentials(format!("unreadable certificate: {e}")))?;
        if certs.is_empty() {
            return Err(Error::credentials("no certificates found in PEM material"));
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(self.key_pem.as_slice()))
            .map_err(|e| Error::credentials(format!("unreadable private key: {e}")))?
            .ok_or_else(|| Error::credentials("no private key found in PEM material"))?;

        let builder = match &self.ca_pem {
            Some(ca_pem) => {
                let mut roots = RootCertStore::empty();
                for cert in rustls_pemfile::certs(&mut BufReader::new(ca_pem.as_slice())) {
                    let cert =
                        cert.map_err(|e| Error::credentials(format!("unreadable CA: {e}")))?;
                    roots
                        .add(cert)
                        .map_err(|e| Error::credentials(format!("invalid CA certificate: {e}")))?;
                }
                let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                    .allow_unauthenticated()
                    .build()
                    .map_err(|e| Error::credentials(format!("client verifier: {e}")))?;
                ServerConfig::builder().with_client_cert_verifier(verifier)
            },
            None => ServerConfig::builder().with_no_client_auth(),
        };

        let config = builder
            .with_single_cert(certs, key)
            .map_err(|e| Error::credentials(format!("certificate/key mismatch: {e}")))?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}
