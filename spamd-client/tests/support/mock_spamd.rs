//! Mock spamd daemon for integration tests
//!
//! This module provides a configurable mock spamd that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Answer every spamd command with a canned, well-formed response
//! - Replace the response for a command with arbitrary bytes
//! - Stall after reading a request to exercise command timeouts
//! - Drop the connection after reading a request
//! - Serve over TLS with a caller-supplied acceptor
//! - Record every request and count connections
//!
//! # Example
//!
//! ```rust,no_run
//! use support::mock_spamd::MockSpamd;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockSpamd::builder()
//!     .with_verdict(true, 15.0, 5.0)
//!     .with_stall_on("REPORT")
//!     .build_tcp()
//!     .await?;
//!
//! // Point a client at server.address()
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use spamd_client::compression;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{TcpListener, UnixListener},
    sync::RwLock,
    time::timeout,
};
use tokio_rustls::TlsAcceptor;

/// Rule report returned for REPORT and `REPORT_IFSPAM`.
pub const REPORT_BODY: &str =
    "0.0/0\n1.5 TEST_RULE_ONE Some rule description\n2.0 TEST_RULE_TWO Another\n";

/// Symbol list returned for SYMBOLS.
pub const SYMBOLS_BODY: &str = "TEST_RULE_ONE,TEST_RULE_TWO";

/// A request as the mock daemon saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    /// The request line, e.g. `CHECK SPAMC/1.5`.
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    /// The body as sent on the wire.
    pub raw_body: Vec<u8>,
    /// The body after zlib decompression, if it was compressed.
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    /// The command verb.
    #[must_use]
    pub fn command(&self) -> &str {
        self.request_line.split(' ').next().unwrap_or_default()
    }

    /// First header named `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone)]
struct MockConfig {
    is_spam: bool,
    score: f64,
    threshold: f64,
    responses: HashMap<String, Vec<u8>>,
    stall_on: Option<String>,
    drop_after_request: bool,
    tls: Option<TlsAcceptor>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            is_spam: false,
            score: 1.5,
            threshold: 5.0,
            responses: HashMap::new(),
            stall_on: None,
            drop_after_request: false,
            tls: None,
        }
    }
}

trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    async fn accept(&self) -> std::io::Result<Box<dyn Stream>> {
        Ok(match self {
            Self::Tcp(listener) => Box::new(listener.accept().await?.0),
            Self::Unix(listener) => Box::new(listener.accept().await?.0),
        })
    }
}

/// Mock spamd daemon
pub struct MockSpamd {
    address: String,
    requests: Arc<RwLock<Vec<ReceivedRequest>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl MockSpamd {
    /// Create a new builder for configuring the mock daemon
    #[must_use]
    pub fn builder() -> MockSpamdBuilder {
        MockSpamdBuilder {
            config: MockConfig::default(),
        }
    }

    /// Address to hand to a client: `127.0.0.1:<port>` or a socket path
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Every request read so far
    pub async fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.read().await.clone()
    }

    /// Number of connections accepted
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Shutdown the daemon
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        stream: Box<dyn Stream>,
        config: Arc<MockConfig>,
        requests: Arc<RwLock<Vec<ReceivedRequest>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let stream: Box<dyn Stream> = match &config.tls {
            Some(acceptor) => Box::new(acceptor.accept(stream).await?),
            None => stream,
        };
        let mut stream = BufReader::new(stream);

        let Some(request) = timeout(Duration::from_secs(10), read_request(&mut stream)).await??
        else {
            return Ok(());
        };
        tracing::debug!("Mock spamd received: {}", request.request_line);
        requests.write().await.push(request.clone());

        if config.drop_after_request {
            return Ok(());
        }

        if config.stall_on.as_deref() == Some(request.command()) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            return Ok(());
        }

        let response = config
            .responses
            .get(request.command())
            .cloned()
            .unwrap_or_else(|| canned_response(&config, &request));

        stream.write_all(&response).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Reads one request. `None` if the peer closed without sending anything.
async fn read_request<R>(reader: &mut R) -> std::io::Result<Option<ReceivedRequest>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let request_line = line.trim_end().to_string();

    let mut headers = Vec::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let mut request = ReceivedRequest {
        request_line,
        headers,
        raw_body: Vec::new(),
        body: Vec::new(),
    };

    if let Some(length) = request.header("Content-length") {
        let length: usize = length
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut raw_body = vec![0; length];
        reader.read_exact(&mut raw_body).await?;
        request.raw_body = raw_body;
    }

    request.body = if request.header("Compress").is_some() {
        compression::decompress(&request.raw_body, 32 * 1024 * 1024)?
    } else {
        request.raw_body.clone()
    };

    Ok(Some(request))
}

fn canned_response(config: &MockConfig, request: &ReceivedRequest) -> Vec<u8> {
    let verdict = format!(
        "Spam: {} ; {:.1} / {:.1}\r\n",
        if config.is_spam { "True" } else { "False" },
        config.score,
        config.threshold
    );

    let (extra_headers, body) = match request.command() {
        "PING" => return b"SPAMD/1.5 0 PONG\r\n".to_vec(),
        "TELL" => {
            let mut acknowledged = String::new();
            if request.header("Set").is_some() {
                acknowledged.push_str("DidSet: local\r\n");
            }
            if request.header("Remove").is_some() {
                acknowledged.push_str("DidRemove: local\r\n");
            }
            (acknowledged, Vec::new())
        }
        "CHECK" => (verdict, Vec::new()),
        "SYMBOLS" => (verdict, SYMBOLS_BODY.as_bytes().to_vec()),
        "REPORT" | "REPORT_IFSPAM" => (verdict, REPORT_BODY.as_bytes().to_vec()),
        "PROCESS" => {
            let mut body = b"X-Spam-Flag: YES\r\n".to_vec();
            body.extend_from_slice(&request.body);
            (verdict, body)
        }
        "HEADERS" => {
            let mut body = b"X-Spam-Flag: YES\r\n".to_vec();
            let end = find_header_end(&request.body).unwrap_or(request.body.len());
            body.extend_from_slice(&request.body[..end]);
            (verdict, body)
        }
        _ => return b"SPAMD/1.5 76 Bad header line\r\n\r\n".to_vec(),
    };

    let (compress_header, body) = if request.header("Compress").is_some() && !body.is_empty() {
        (
            "Compress: zlib\r\n",
            compression::compress(&body).unwrap_or(body),
        )
    } else {
        ("", body)
    };

    let mut response = format!(
        "SPAMD/1.5 0 EX_OK\r\n{extra_headers}{compress_header}Content-length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(&body);
    response
}

/// Offset just past the blank line ending a message's header block.
fn find_header_end(message: &[u8]) -> Option<usize> {
    message
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|position| position + 4)
}

/// Builder for configuring a `MockSpamd`
pub struct MockSpamdBuilder {
    config: MockConfig,
}

impl MockSpamdBuilder {
    /// Set the verdict reported by scanning commands
    #[must_use]
    pub fn with_verdict(mut self, is_spam: bool, score: f64, threshold: f64) -> Self {
        self.config.is_spam = is_spam;
        self.config.score = score;
        self.config.threshold = threshold;
        self
    }

    /// Answer `command` with exactly `response`, then close
    #[must_use]
    pub fn with_response(mut self, command: &str, response: impl Into<Vec<u8>>) -> Self {
        self.config
            .responses
            .insert(command.to_string(), response.into());
        self
    }

    /// Never answer `command`
    #[must_use]
    pub fn with_stall_on(mut self, command: &str) -> Self {
        self.config.stall_on = Some(command.to_string());
        self
    }

    /// Close every connection after reading its request
    #[must_use]
    pub const fn with_drop_after_request(mut self) -> Self {
        self.config.drop_after_request = true;
        self
    }

    /// Complete a TLS handshake with `acceptor` before reading requests
    #[must_use]
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.config.tls = Some(acceptor);
        self
    }

    /// Build and start the daemon on a random loopback port
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound
    pub async fn build_tcp(self) -> std::io::Result<MockSpamd> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        Ok(self.spawn(Listener::Tcp(listener), address))
    }

    /// Build and start the daemon on a Unix socket at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound
    pub fn build_unix(self, path: &Path) -> std::io::Result<MockSpamd> {
        let listener = UnixListener::bind(path)?;
        let address = PathBuf::from(path).display().to_string();
        Ok(self.spawn(Listener::Unix(listener), address))
    }

    fn spawn(self, listener: Listener, address: String) -> MockSpamd {
        let config = Arc::new(self.config);
        let requests = Arc::new(RwLock::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let requests_clone = Arc::clone(&requests);
        let connections_clone = Arc::clone(&connections);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept with a timeout so the shutdown flag is observed
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok(stream)) = accepted {
                    connections_clone.fetch_add(1, Ordering::Relaxed);
                    let config = Arc::clone(&config);
                    let requests = Arc::clone(&requests_clone);

                    tokio::spawn(async move {
                        if let Err(e) = MockSpamd::handle_client(stream, config, requests).await {
                            tracing::debug!("Mock spamd client error: {}", e);
                        }
                    });
                }
            }
        });

        MockSpamd {
            address,
            requests,
            connections,
            shutdown,
        }
    }
}
