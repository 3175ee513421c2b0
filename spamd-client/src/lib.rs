//! Async client for the `SpamAssassin` spamd protocol.
//!
//! A [`Client`] submits messages to spamd over TCP, a Unix socket, or TLS,
//! and decodes the verdict, rule report, or rewritten message it returns.
//!
//! ```no_run
//! use spamd_client::{ClientBuilder, MessageClass, TellAction};
//!
//! # async fn example() -> Result<(), spamd_client::ClientError> {
//! let client = ClientBuilder::new("/var/run/spamd.sock", "exim").build()?;
//!
//! let message = b"Subject: cheap pills\r\n\r\nbuy now\r\n";
//! let report = client.report(&message[..]).await?;
//! for rule in &report.rules {
//!     println!("{:>5.1} {} {}", rule.score, rule.name, rule.description);
//! }
//!
//! if report.is_spam {
//!     client
//!         .tell(&message[..], MessageClass::Spam, TellAction::Learn)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod command;
pub mod compression;
pub mod config;
pub mod deadline;
pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;
pub mod transport;

pub use builder::ClientBuilder;
pub use client::Client;
pub use command::{Command, MessageClass, TellAction};
pub use config::{Address, ClientConfig};
pub use error::{ClientError, Phase, Result};
pub use headers::Headers;
pub use response::{Message, Response, Rule};
pub use status::StatusCode;
