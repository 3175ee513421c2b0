//! Client configuration.

use std::{
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use spamd_common::config::{ClientTimeouts, RetryPolicy, TlsConfig};

use crate::error::{ClientError, Result};

/// Port spamd listens on by default.
pub const DEFAULT_PORT: u16 = 783;

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A Unix domain socket.
    Unix(PathBuf),
    /// A TCP endpoint.
    Tcp { host: String, port: u16 },
}

impl Address {
    /// Parses an address.
    ///
    /// A leading `/` selects a Unix socket. Anything else is a TCP host,
    /// optionally followed by `:port`; IPv6 literals take a port only in
    /// brackets (`[::1]:783`). `default_port` fills in a missing port.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] for an empty host or an
    /// invalid port.
    pub fn parse(address: &str, default_port: u16) -> Result<Self> {
        let address = address.trim();
        if address.starts_with('/') {
            return Ok(Self::Unix(PathBuf::from(address)));
        }

        let (host, port) = if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                ClientError::Configuration(format!("Unterminated IPv6 literal in '{address}'"))
            })?;
            let port = match tail {
                "" => None,
                tail => Some(tail.strip_prefix(':').ok_or_else(|| {
                    ClientError::Configuration(format!("Unexpected '{tail}' in '{address}'"))
                })?),
            };
            (host, port)
        } else if address.matches(':').count() == 1 {
            let (host, port) = address.split_once(':').unwrap_or((address, ""));
            (host, Some(port))
        } else {
            (address, None)
        };

        if host.is_empty() {
            return Err(ClientError::Configuration(format!(
                "Missing host in address '{address}'"
            )));
        }

        let port = match port {
            None => default_port,
            Some(port) => port.parse::<u16>().map_err(|e| {
                ClientError::Configuration(format!("Invalid port '{port}' in '{address}': {e}"))
            })?,
        };

        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }

    #[must_use]
    pub const fn is_unix(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    /// The socket path, for Unix addresses.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Unix(path) => Some(path),
            Self::Tcp { .. } => None,
        }
    }

    /// The host name, for TCP addresses.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match self {
            Self::Unix(_) => None,
            Self::Tcp { host, .. } => Some(host),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Everything a [`Client`](crate::Client) needs to reach and talk to spamd.
///
/// Loadable from TOML:
///
/// ```toml
/// address = "spamd.example.com"
/// user = "exim"
/// compression = true
///
/// [tls]
/// enabled = true
/// root_ca = "/etc/spamd/ca.pem"
///
/// [timeouts]
/// command_ms = 10000
///
/// [retry]
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// `host`, `host:port`, `[v6]:port`, or an absolute Unix socket path.
    pub address: String,

    /// Port used when `address` does not name one.
    ///
    /// Default: 783
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// User spamd should scan the message as.
    pub user: String,

    /// Send request bodies zlib-compressed.
    #[serde(default)]
    pub compression: bool,

    /// Decode CHECK responses as message echoes and keep the undecoded body.
    #[serde(default)]
    pub raw_body: bool,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub timeouts: ClientTimeouts,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Largest response body accepted, after decompression.
    ///
    /// Default: 32 MiB
    #[serde(default = "defaults::max_response_size")]
    pub max_response_size: usize,
}

impl ClientConfig {
    /// A configuration with default timeouts, retries, and no TLS or
    /// compression.
    #[must_use]
    pub fn new(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: defaults::port(),
            user: user.into(),
            compression: false,
            raw_body: false,
            tls: TlsConfig::default(),
            timeouts: ClientTimeouts::default(),
            retry: RetryPolicy::default(),
            max_response_size: defaults::max_response_size(),
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the text is invalid.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(spamd_common::config::from_toml(text)?)
    }

    /// The parsed daemon address.
    ///
    /// # Errors
    ///
    /// See [`Address::parse`].
    pub fn parsed_address(&self) -> Result<Address> {
        Address::parse(&self.address, self.port)
    }

    /// Checks the configuration for values that could never work.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] describing the first problem.
    pub fn validate(&self) -> Result<Address> {
        if self.user.is_empty() {
            return Err(ClientError::Configuration("User must not be empty".into()));
        }
        if self.user.contains(['\r', '\n']) {
            return Err(ClientError::Configuration(
                "User must not contain line breaks".into(),
            ));
        }
        if self.max_response_size == 0 {
            return Err(ClientError::Configuration(
                "max_response_size must be positive".into(),
            ));
        }
        if !self.retry.has_valid_jitter() {
            return Err(ClientError::Configuration(format!(
                "retry.jitter_factor must be a finite, non-negative number, got {}",
                self.retry.jitter_factor
            )));
        }

        let address = self.parsed_address()?;
        if self.tls.enabled && address.is_unix() {
            return Err(ClientError::Configuration(format!(
                "TLS is not supported over the Unix socket {address}"
            )));
        }

        Ok(address)
    }
}

mod defaults {
    pub const fn port() -> u16 {
        super::DEFAULT_PORT
    }

    pub const fn max_response_size() -> usize {
        32 * 1024 * 1024
    }
}
