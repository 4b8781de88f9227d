//! Error types for rk-listener
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for rk-listener
#[derive(Error, Debug)]
pub enum Error {
    /// Bootstrap configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint URL could not be parsed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport errors (control API, audio stream)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Control API answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Control { status: u16, message: String },

    /// Control API answered with a body we cannot use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Audio stream ended or failed
    #[error("Stream error: {0}")]
    Stream(String),

    /// Console input errors
    #[error("Invalid command: {0}")]
    Command(String),
}

/// Convenience Result type using rk-listener Error
pub type Result<T> = std::result::Result<T, Error>;
