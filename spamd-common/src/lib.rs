//! Configuration primitives and logging shared by the spamd client crates.

pub mod config;
pub mod logging;

pub use tracing;
