//! Real-time channel connection
//!
//! - `backoff`: reconnect delay computation
//! - `transport`: socket abstraction and the WebSocket implementation
//! - `manager`: lifecycle, token handling and reconnect scheduling

pub mod backoff;
pub mod manager;
pub mod transport;

pub use backoff::BackoffConfig;
pub use manager::{ConnectionManager, SocketOutcome, TOKEN_QUERY_PARAM};
pub use transport::{SocketEvent, SocketId, Transport, WsTransport};
