//! Common error types for RK

use thiserror::Error;

/// Common result type for RK operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across RK crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML bootstrap file could not be parsed
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
