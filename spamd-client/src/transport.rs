//! Connections to spamd over TCP, Unix sockets, or TLS over TCP.

use std::{
    io,
    path::Path,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use spamd_common::{
    config::{ClientTimeouts, RetryPolicy, TlsConfig},
    internal,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::{TcpStream, UnixStream},
};
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig as TlsClientConfig, RootCertStore, pki_types::ServerName},
};

use crate::{
    config::Address,
    deadline::Deadline,
    error::{ClientError, Phase, Result},
};

/// An established connection to spamd.
pub enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(stream) => f.debug_tuple("Tcp").field(stream).finish(),
            Self::Unix(stream) => f.debug_tuple("Unix").field(stream).finish(),
            Self::Tls(stream) => f.debug_tuple("Tls").field(stream.get_ref().0).finish(),
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// TLS settings resolved once when the client is built.
#[derive(Clone)]
pub struct TlsSettings {
    connector: TlsConnector,
    server: String,
    server_name: ServerName<'static>,
}

impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl TlsSettings {
    /// Loads the trust roots named by `config` and resolves the name the
    /// daemon certificate must match.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TrustConfiguration`] if the root CA file is
    /// unreadable or holds no usable certificate, and
    /// [`ClientError::Configuration`] if the server name is invalid.
    pub fn load(config: &TlsConfig, address: &Address) -> Result<Self> {
        let roots = match &config.root_ca {
            Some(path) => load_root_ca(path)?,
            None => load_native_roots()?,
        };

        let tls = TlsClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let name = config
            .server_name
            .as_deref()
            .or_else(|| address.host())
            .ok_or_else(|| {
                ClientError::Configuration(format!("No TLS server name for {address}"))
            })?;
        let server_name = ServerName::try_from(name.to_string()).map_err(|e| {
            ClientError::Configuration(format!("Invalid TLS server name '{name}': {e}"))
        })?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(tls)),
            server: name.to_string(),
            server_name,
        })
    }
}

fn load_root_ca(path: &Path) -> Result<RootCertStore> {
    let pem = std::fs::read(path).map_err(|e| {
        ClientError::TrustConfiguration(format!(
            "Unable to read root CA {}: {e}",
            path.display()
        ))
    })?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| {
            ClientError::TrustConfiguration(format!(
                "Invalid PEM in root CA {}: {e}",
                path.display()
            ))
        })?;

    if certs.is_empty() {
        return Err(ClientError::TrustConfiguration(format!(
            "No certificates found in root CA {}",
            path.display()
        )));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(|e| {
            ClientError::TrustConfiguration(format!(
                "Unusable certificate in root CA {}: {e}",
                path.display()
            ))
        })?;
    }

    Ok(roots)
}

fn load_native_roots() -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for cert in native.certs {
        roots.add(cert).map_err(|e| {
            ClientError::TrustConfiguration(format!("Failed to add native certificate: {e}"))
        })?;
    }
    if !native.errors.is_empty() {
        tracing::warn!(errors = ?native.errors, "Some native certificates could not be loaded");
    }

    Ok(roots)
}

/// Opens connections to one daemon, retrying transient dial failures.
#[derive(Debug, Clone)]
pub struct Connector {
    address: Address,
    tls: Option<TlsSettings>,
    timeouts: ClientTimeouts,
    retry: RetryPolicy,
}

impl Connector {
    #[must_use]
    pub const fn new(
        address: Address,
        tls: Option<TlsSettings>,
        timeouts: ClientTimeouts,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            address,
            tls,
            timeouts,
            retry,
        }
    }

    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Dials the daemon.
    ///
    /// Each attempt gets its own connect deadline, covering the TLS
    /// handshake when TLS is enabled. Only dial failures are retried; a
    /// failed handshake or a non-transient error ends the call at once.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Connection`] once every attempt has failed
    /// - [`ClientError::Handshake`] if TLS negotiation fails
    /// - [`ClientError::Timeout`] if the handshake outlives the connect
    ///   deadline
    pub async fn open(&self) -> Result<Connection> {
        let attempts = self.retry.attempts();
        let mut attempt = 1;

        loop {
            let deadline = Deadline::after(self.timeouts.connect_timeout());

            let error = match self.dial(deadline).await {
                Ok(connection) => {
                    internal!(
                        level = DEBUG,
                        "Connected to {} on attempt {attempt}",
                        self.address
                    );
                    return self.secure(connection, deadline).await;
                }
                Err(error) => error,
            };

            let transient = is_transient(&error);
            if !transient || !self.retry.should_retry(attempt) {
                internal!(
                    level = WARN,
                    "Giving up on {} after {attempt} attempt(s): {error}",
                    self.address
                );
                return Err(ClientError::Connection {
                    address: self.address.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.retry.backoff(attempt);
            tracing::warn!(
                address = %self.address,
                attempt,
                max_attempts = attempts,
                ?delay,
                "Connect failed: {error}; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// One dial attempt. Deadline expiry surfaces as `TimedOut`.
    async fn dial(&self, deadline: Deadline) -> io::Result<Connection> {
        let connect = async {
            match &self.address {
                Address::Unix(path) => UnixStream::connect(path).await.map(Connection::Unix),
                Address::Tcp { host, port } => TcpStream::connect((host.as_str(), *port))
                    .await
                    .map(Connection::Tcp),
            }
        };

        match deadline.within(Phase::Connect, connect).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timed out after {:?}", deadline.budget()),
            )),
        }
    }

    async fn secure(&self, connection: Connection, deadline: Deadline) -> Result<Connection> {
        let (tls, stream) = match (&self.tls, connection) {
            (Some(tls), Connection::Tcp(stream)) => (tls, stream),
            (_, connection) => return Ok(connection),
        };

        let handshake = tls.connector.connect(tls.server_name.clone(), stream);
        let stream = deadline
            .within(Phase::Handshake, handshake)
            .await?
            .map_err(|source| ClientError::Handshake {
                server: tls.server.clone(),
                source,
            })?;

        internal!(level = DEBUG, "TLS established with {}", tls.server);
        Ok(Connection::Tls(Box::new(stream)))
    }
}

/// Dial failures worth another attempt.
fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::NotFound
            | io::ErrorKind::Interrupted
    )
}
