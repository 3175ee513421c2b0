//! Throwaway certificate authority for TLS tests
//!
//! Issues a CA and a server certificate signed by it, and serves the
//! certificate through a `TlsAcceptor` for [`MockSpamd`](super::mock_spamd::MockSpamd).
#![allow(dead_code)] // Test utility module - not all methods used in every test

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use tokio_rustls::{
    TlsAcceptor,
    rustls::{
        ServerConfig,
        pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer},
    },
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A CA plus a server certificate it signed.
pub struct TestPki {
    ca_pem: String,
    acceptor: TlsAcceptor,
}

impl TestPki {
    /// Issue a fresh CA and a server certificate valid for `server_name`
    ///
    /// # Errors
    ///
    /// Returns an error if key generation, signing, or the server config fails
    pub fn generate(server_name: &str) -> Result<Self, BoxError> {
        let ca_key = KeyPair::generate()?;
        let mut ca_params = CertificateParams::new(Vec::<String>::new())?;
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = ca_params.self_signed(&ca_key)?;

        let server_key = KeyPair::generate()?;
        let server_cert = CertificateParams::new(vec![server_name.to_string()])?
            .signed_by(&server_key, &ca_cert, &ca_key)?;

        let chain = vec![server_cert.der().clone(), ca_cert.der().clone()];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(server_key.serialize_der()));
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(chain, key)?;

        Ok(Self {
            ca_pem: ca_cert.pem(),
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Acceptor presenting the server certificate
    #[must_use]
    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }

    /// Write the CA certificate as PEM into `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn write_ca(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join("spamd-ca.pem");
        std::fs::write(&path, &self.ca_pem)?;
        Ok(path)
    }
}
