//! RK Listener library
//!
//! Real-time synchronization layer of the listener client:
//! - [`connection`]: channel lifecycle with token and backoff
//! - [`router`]: inbound frame decoding into store mutations
//! - [`state`]: shared state store
//! - [`playback`]: reconciler driving the local audio output
//!
//! plus the control API client, the console front end and the tokio
//! runtime wiring used by the `rk-listener` binary.

pub mod config;
pub mod connection;
pub mod console;
pub mod control;
pub mod error;
pub mod playback;
pub mod router;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod state;

pub use error::{Error, Result};
pub use session::{Handled, Input, ListenerSession, SessionParts, UserAction};
pub use state::{AppSnapshot, Store};
