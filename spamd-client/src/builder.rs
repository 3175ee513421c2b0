//! Builder for [`Client`].

use std::{path::PathBuf, time::Duration};

use spamd_common::config::{RetryPolicy, TlsConfig};

use crate::{
    client::Client,
    config::ClientConfig,
    error::Result,
    transport::{Connector, TlsSettings},
};

/// Builder for creating a [`Client`].
///
/// All settings are fixed once [`build`](Self::build) returns; the client
/// never mutates them afterwards.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use spamd_client::ClientBuilder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new("spamd.example.com", "exim")
///     .tls_root_ca("/etc/ssl/spamd-ca.pem")
///     .compression(true)
///     .command_timeout(Duration::from_secs(10))
///     .retries(3)
///     .build()?;
///
/// let response = client.check(&b"Subject: hi\r\n\r\nhello\r\n"[..]).await?;
/// println!("spam: {} ({}/{})", response.is_spam, response.score, response.threshold);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Creates a builder for the daemon at `address`, submitting as `user`.
    ///
    /// `address` is a host name, an IP address, `host:port`, or an absolute
    /// Unix socket path.
    #[must_use]
    pub fn new(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(address, user),
        }
    }

    /// Starts from a loaded configuration.
    #[must_use]
    pub const fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Port used when the address does not carry one.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enables TLS, trusting only the certificates in the PEM file at `path`.
    #[must_use]
    pub fn tls_root_ca(mut self, path: impl Into<PathBuf>) -> Self {
        let server_name = self.config.tls.server_name.take();
        self.config.tls = TlsConfig::with_root_ca(path);
        self.config.tls.server_name = server_name;
        self
    }

    /// Enables TLS against the platform's trust store.
    #[must_use]
    pub fn tls_native_roots(mut self) -> Self {
        self.config.tls.enabled = true;
        self.config.tls.root_ca = None;
        self
    }

    /// Name the daemon certificate must match. Defaults to the host.
    #[must_use]
    pub fn tls_server_name(mut self, name: impl Into<String>) -> Self {
        self.config.tls.server_name = Some(name.into());
        self
    }

    /// Compresses request bodies with zlib.
    #[must_use]
    pub const fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Keeps the undecoded body on every response.
    #[must_use]
    pub const fn raw_body(mut self, enabled: bool) -> Self {
        self.config.raw_body = enabled;
        self
    }

    /// Deadline for each dial attempt, including the TLS handshake.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.set_connect_timeout(timeout);
        self
    }

    /// Deadline for writing the request and reading the response.
    #[must_use]
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeouts.set_command_timeout(timeout);
        self
    }

    /// Total dial attempts. Zero is treated as one.
    #[must_use]
    pub const fn retries(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Largest response body accepted, after decompression.
    #[must_use]
    pub const fn max_response_size(mut self, bytes: usize) -> Self {
        self.config.max_response_size = bytes;
        self
    }

    /// Validates the configuration, loads TLS trust roots, and returns an
    /// immutable client.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Configuration`](crate::ClientError::Configuration)
    ///   for invalid settings, including TLS over a Unix socket
    /// - [`ClientError::TrustConfiguration`](crate::ClientError::TrustConfiguration)
    ///   if the root CA cannot be loaded
    pub fn build(self) -> Result<Client> {
        let address = self.config.validate()?;

        let tls = if self.config.tls.is_enabled() {
            Some(TlsSettings::load(&self.config.tls, &address)?)
        } else {
            None
        };

        let connector = Connector::new(address, tls, self.config.timeouts, self.config.retry);
        Ok(Client::new(self.config, connector))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ClientError;

    #[test]
    fn test_builder_settings() {
        let builder = ClientBuilder::new("spamd.local", "exim")
            .port(7830)
            .compression(true)
            .raw_body(true)
            .connect_timeout(Duration::from_millis(250))
            .command_timeout(Duration::from_secs(3))
            .retries(5)
            .max_response_size(1024);

        let config = &builder.config;
        assert_eq!(config.port, 7830);
        assert!(config.compression);
        assert!(config.raw_body);
        assert_eq!(config.timeouts.connect_timeout(), Duration::from_millis(250));
        assert_eq!(config.timeouts.command_timeout(), Duration::from_secs(3));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.max_response_size, 1024);
    }

    #[test]
    fn test_tls_server_name_survives_root_ca() {
        let builder = ClientBuilder::new("10.0.0.5", "exim")
            .tls_server_name("spamd.example.com")
            .tls_root_ca("/etc/ssl/ca.pem");

        let tls = &builder.config.tls;
        assert!(tls.enabled);
        assert_eq!(tls.root_ca.as_deref(), Some(std::path::Path::new("/etc/ssl/ca.pem")));
        assert_eq!(tls.server_name.as_deref(), Some("spamd.example.com"));
    }

    #[test]
    fn test_build_plain_tcp() {
        let client = ClientBuilder::new("127.0.0.1:7830", "exim").build().unwrap();
        assert_eq!(client.address().to_string(), "127.0.0.1:7830");
    }

    #[test]
    fn test_build_rejects_tls_over_unix() {
        let result = ClientBuilder::new("/var/run/spamd.sock", "exim")
            .tls_native_roots()
            .build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_missing_root_ca() {
        let result = ClientBuilder::new("127.0.0.1", "exim")
            .tls_root_ca("/nonexistent/ca.pem")
            .build();
        assert!(matches!(result, Err(ClientError::TrustConfiguration(_))));
    }

    #[test]
    fn test_build_rejects_empty_user() {
        let result = ClientBuilder::new("127.0.0.1", "").build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
