//! Error types for the spamd client.

use std::{fmt, io, time::Duration};

use thiserror::Error;

use crate::{headers::Headers, status::StatusCode};

/// The suspension point at which a call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Handshake,
    Write,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Handshake => "TLS handshake",
            Self::Write => "request write",
            Self::Read => "response read",
        })
    }
}

/// Errors that can occur when talking to spamd.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Every dial attempt failed; carries the last underlying cause.
    #[error("Failed to connect to {address} after {attempts} attempt(s): {source}")]
    Connection {
        address: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// The TLS trust root could not be loaded or parsed.
    #[error("TLS trust configuration error: {0}")]
    TrustConfiguration(String),

    /// The TLS handshake failed, typically because the daemon certificate
    /// does not validate against the trust root.
    #[error("TLS handshake with {server} failed: {source}")]
    Handshake {
        server: String,
        #[source]
        source: io::Error,
    },

    /// Compressing the request body failed.
    #[error("Failed to encode request: {0}")]
    Encoding(#[source] io::Error),

    /// The daemon's reply is not a well-formed spamd response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The daemon answered with a non-zero status code.
    #[error("spamd returned status {code}: {message}")]
    Daemon {
        code: StatusCode,
        message: String,
        /// Headers that accompanied the failure, for diagnostics.
        headers: Headers,
    },

    /// The connection closed before the full response arrived.
    #[error("Response truncated after {received} bytes{}", expected_suffix(.expected))]
    TruncatedResponse {
        /// The declared `Content-length`, when the header block was complete.
        expected: Option<usize>,
        received: usize,
    },

    /// A deadline expired.
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    /// I/O failure on an established connection.
    #[error("I/O error during {phase}: {source}")]
    Io {
        phase: Phase,
        #[source]
        source: io::Error,
    },

    /// The caller-supplied message stream could not be read.
    #[error("Failed to read message: {0}")]
    Message(#[source] io::Error),

    /// Invalid client configuration.
    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

fn expected_suffix(expected: &Option<usize>) -> String {
    expected.map_or_else(String::new, |n| format!(" (expected {n})"))
}

impl ClientError {
    /// Returns `true` if a deadline expired.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the request may have reached the daemon.
    ///
    /// Such failures are never retried automatically.
    #[must_use]
    pub const fn request_possibly_sent(&self) -> bool {
        match self {
            Self::Timeout { phase, .. } | Self::Io { phase, .. } => {
                matches!(phase, Phase::Write | Phase::Read)
            }
            Self::Protocol(_) | Self::Daemon { .. } | Self::TruncatedResponse { .. } => true,
            _ => false,
        }
    }
}

impl From<spamd_common::config::ConfigError> for ClientError {
    fn from(err: spamd_common::config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Specialized `Result` type for spamd client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
