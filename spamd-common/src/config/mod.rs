//! Configuration types for the spamd client.
//!
//! ## Modules
//!
//! - [`timeouts`]: connect and command deadlines
//! - [`tls`]: TLS enablement and trust root selection
//! - [`retry`]: pre-flight dial retry policy

pub mod retry;
pub mod timeouts;
pub mod tls;

use serde::de::DeserializeOwned;
use thiserror::Error;

pub use retry::RetryPolicy;
pub use timeouts::ClientTimeouts;
pub use tls::TlsConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration text is not valid TOML for the requested type.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Reading a configuration file failed.
    #[error("Failed to read configuration from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Deserializes a configuration value from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the text is not valid for `T`.
pub fn from_toml<T: DeserializeOwned>(text: &str) -> Result<T, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Reads and deserializes a TOML configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read, or
/// [`ConfigError::Parse`] if its contents are invalid.
pub fn from_toml_file<T: DeserializeOwned>(
    path: impl AsRef<std::path::Path>,
) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    from_toml(&text)
}
