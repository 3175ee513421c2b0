//! Timeout configuration for spamd requests.
//!
//! Two deadlines govern every call:
//! - **connect**: one dial attempt, including the TLS handshake
//! - **command**: writing the request and reading the full response

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client-side timeouts, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// Ceiling for a single dial attempt (plus TLS handshake).
    ///
    /// Default: 5000 ms
    #[serde(default = "defaults::connect_ms")]
    pub connect_ms: u64,

    /// Ceiling for the request write and response read combined.
    ///
    /// Default: 30000 ms
    #[serde(default = "defaults::command_ms")]
    pub command_ms: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_ms: defaults::connect_ms(),
            command_ms: defaults::command_ms(),
        }
    }
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    /// Sets the connect timeout, saturating at `u64::MAX` milliseconds.
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    /// Sets the command timeout, saturating at `u64::MAX` milliseconds.
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }
}

mod defaults {
    pub const fn connect_ms() -> u64 {
        5_000
    }

    pub const fn command_ms() -> u64 {
        30_000
    }
}
