//! Error types shared across restkit crates

use thiserror::Error;

/// Result type alias for restkit operations
pub type Result<T> = std::result::Result<T, RestkitError>;

/// Errors raised outside the request path (startup, sinks, configuration)
#[derive(Error, Debug)]
pub enum RestkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RestkitError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
