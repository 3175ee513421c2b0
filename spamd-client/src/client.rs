//! The spamd client facade.

use std::sync::Arc;

use spamd_common::internal;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::Instrument;

use crate::{
    command::{Command, MessageClass, TellAction},
    config::{Address, ClientConfig},
    deadline::Deadline,
    error::{ClientError, Phase, Result},
    request::Request,
    response::{Decoder, Response},
    transport::{Connection, Connector},
};

#[derive(Debug)]
struct Inner {
    config: ClientConfig,
    connector: Connector,
}

/// A configured spamd client.
///
/// Cheap to clone and safe to share between tasks. Every call opens its own
/// connection, so concurrent calls never wait on each other and a timeout in
/// one leaves the others untouched.
///
/// Calls are not cancel-safe in the sense of resuming: dropping a call
/// future closes its connection.
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub(crate) fn new(config: ClientConfig, connector: Connector) -> Self {
        Self {
            inner: Arc::new(Inner { config, connector }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn address(&self) -> &Address {
        self.inner.connector.address()
    }

    /// Asks whether `message` is spam.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn check<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Check, message).await
    }

    /// Checks `message` and lists the rules it matched.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn symbols<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Symbols, message).await
    }

    /// Checks `message` and returns the full rule report.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn report<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Report, message).await
    }

    /// Like [`report`](Self::report), but the daemon omits the report for
    /// ham.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn report_if_spam<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::ReportIfSpam, message).await
    }

    /// Checks `message` and returns it rewritten with spamd's markup.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn process<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Process, message).await
    }

    /// Checks `message` and returns only its rewritten headers.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn headers<M>(&self, message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Headers, message).await
    }

    /// Checks that the daemon is alive.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn ping(&self) -> Result<Response> {
        self.execute(Command::Ping, tokio::io::empty()).await
    }

    /// Trains the daemon's local database with `message`.
    ///
    /// Check [`Response::did_set`] or [`Response::did_remove`] for the
    /// daemon's acknowledgement.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn tell<M>(
        &self,
        message: M,
        class: MessageClass,
        action: TellAction,
    ) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        self.execute(Command::Tell { class, action }, message)
            .await
    }

    /// Sends `command` with `message` as its body over a fresh connection.
    ///
    /// The message is read to the end before dialing. Dial failures are
    /// retried per the retry policy; nothing is retried once the request
    /// may have reached the daemon.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Message`] if `message` cannot be read
    /// - [`ClientError::Connection`] if every dial attempt fails
    /// - [`ClientError::Handshake`] if TLS negotiation fails
    /// - [`ClientError::Timeout`] if a connect or command deadline expires
    /// - [`ClientError::Io`] for I/O failures on the connection
    /// - [`ClientError::Daemon`] for a non-zero daemon status
    /// - [`ClientError::Protocol`] or [`ClientError::TruncatedResponse`]
    ///   for a malformed or incomplete reply
    pub async fn execute<M>(&self, command: Command, mut message: M) -> Result<Response>
    where
        M: AsyncRead + Unpin,
    {
        let span = tracing::info_span!(
            "spamd",
            command = %command,
            address = %self.address(),
        );

        async move {
            let mut body = Vec::new();
            if command.has_body() {
                message
                    .read_to_end(&mut body)
                    .await
                    .map_err(ClientError::Message)?;
            }

            let result = self.send(command, &body).await;
            match &result {
                Ok(response) => internal!(
                    level = DEBUG,
                    "{command} completed: spam={} score={}/{}",
                    response.is_spam,
                    response.score,
                    response.threshold
                ),
                Err(error) => tracing::warn!("{command} failed: {error}"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn send(&self, command: Command, body: &[u8]) -> Result<Response> {
        let request = Request::encode(command, &self.inner.config, body)?;
        let mut connection = self.inner.connector.open().await?;

        let deadline = Deadline::after(self.inner.config.timeouts.command_timeout());
        let result = self.exchange(&mut connection, &request, deadline).await;

        close(&mut connection, deadline).await;

        result
    }

    async fn exchange(
        &self,
        connection: &mut Connection,
        request: &Request,
        deadline: Deadline,
    ) -> Result<Response> {
        deadline
            .within(Phase::Write, async {
                connection.write_all(request.as_bytes()).await?;
                connection.flush().await
            })
            .await?
            .map_err(|source| ClientError::Io {
                phase: Phase::Write,
                source,
            })?;

        let mut reader = BufReader::new(connection);
        Decoder::new(request.command(), &self.inner.config)
            .decode(&mut reader, deadline)
            .await
    }
}

/// Best-effort shutdown once the response is complete or abandoned.
async fn close<S>(stream: &mut S, deadline: Deadline)
where
    S: AsyncWrite + Unpin,
{
    match deadline.within(Phase::Write, stream.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => internal!(level = DEBUG, "Connection shutdown failed: {error}"),
        Err(error) => internal!(level = DEBUG, "Connection shutdown abandoned: {error}"),
    }
}
