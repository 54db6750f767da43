//! Error types for startup and configuration.

use thiserror::Error;

/// Error raised while loading or validating the renderer configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of range or cannot be parsed
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
