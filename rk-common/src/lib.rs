//! # RK Common Library
//!
//! Shared code for the RK broadcast clients including:
//! - Real-time event types (ServerEvent enum) and their decoder
//! - Player state and queue snapshot types
//! - Bootstrap configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{DecodeError, ServerEvent};
