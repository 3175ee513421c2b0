//! TLS configuration for daemon connections.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// TLS settings for a spamd connection.
///
/// When `enabled` is set without a `root_ca`, the platform trust store is
/// used to validate the daemon's certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TlsConfig {
    /// Whether to wrap the connection in TLS.
    ///
    /// Default: `false`
    #[serde(default)]
    pub enabled: bool,

    /// PEM file holding the CA certificate(s) that sign the daemon's certificate.
    #[serde(default)]
    pub root_ca: Option<PathBuf>,

    /// Name to verify the daemon certificate against.
    ///
    /// Defaults to the host part of the configured address.
    #[serde(default)]
    pub server_name: Option<String>,
}

impl TlsConfig {
    /// TLS disabled.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            root_ca: None,
            server_name: None,
        }
    }

    /// TLS enabled, trusting the certificates in `root_ca`.
    #[must_use]
    pub fn with_root_ca(root_ca: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            root_ca: Some(root_ca.into()),
            server_name: None,
        }
    }

    /// TLS enabled, trusting the platform certificate store.
    #[must_use]
    pub const fn native_roots() -> Self {
        Self {
            enabled: true,
            root_ca: None,
            server_name: None,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }
}
