//! Request framing.
//!
//! ```text
//! <COMMAND> SPAMC/1.5\r\n
//! Content-length: <n>\r\n
//! User: <user>\r\n
//! Compress: zlib\r\n
//! Message-class: <ham|spam>\r\n
//! <Set|Remove>: local\r\n
//! \r\n
//! <body>
//! ```

use std::borrow::Cow;

use spamd_common::outgoing;

use crate::{
    command::Command,
    compression,
    config::ClientConfig,
    error::{ClientError, Result},
};

/// Protocol token sent on every request line.
pub const PROTOCOL_VERSION: &str = "SPAMC/1.5";

/// Training database targeted by TELL directives.
const TELL_TARGET: &str = "local";

/// A fully framed request, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: Command,
    bytes: Vec<u8>,
    header_len: usize,
}

impl Request {
    /// Frames `message` for `command` using the user and compression
    /// settings of `config`.
    ///
    /// The body is compressed before `Content-length` is computed, so the
    /// declared length always matches the bytes that follow. PING carries
    /// neither a body nor a `Content-length` header.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Encoding`] if compression fails.
    pub fn encode(command: Command, config: &ClientConfig, message: &[u8]) -> Result<Self> {
        let compress = config.compression && command.has_body();

        let body: Cow<'_, [u8]> = if !command.has_body() {
            Cow::Borrowed(&[])
        } else if compress {
            Cow::Owned(compression::compress(message).map_err(ClientError::Encoding)?)
        } else {
            Cow::Borrowed(message)
        };

        let mut head = format!("{command} {PROTOCOL_VERSION}\r\n");
        if command.has_body() {
            head.push_str(&format!("Content-length: {}\r\n", body.len()));
        }
        head.push_str(&format!("User: {}\r\n", config.user));
        if compress {
            head.push_str(&format!("Compress: {}\r\n", compression::ZLIB));
        }
        if let Command::Tell { class, action } = command {
            head.push_str(&format!("Message-class: {}\r\n", class.as_str()));
            head.push_str(&format!("{}: {TELL_TARGET}\r\n", action.header()));
        }
        head.push_str("\r\n");

        for line in head.lines().filter(|line| !line.is_empty()) {
            outgoing!("{line}");
        }

        let header_len = head.len();
        let mut bytes = Vec::with_capacity(header_len + body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&body);

        Ok(Self {
            command,
            bytes,
            header_len,
        })
    }

    #[must_use]
    pub const fn command(&self) -> Command {
        self.command
    }

    /// The complete wire representation.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The header block, including the terminating blank line.
    #[must_use]
    pub fn head(&self) -> &[u8] {
        &self.bytes[..self.header_len]
    }

    /// The (possibly compressed) body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    /// The declared `Content-length`, absent for PING.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.command.has_body().then(|| self.body().len())
    }
}
