//! Test helpers for rk-listener integration tests
//!
//! - fakes: in-memory transport, audio output and control dispatcher
//! - harness: a session wired to the fakes and a virtual-time scheduler

#![allow(dead_code)]

pub mod fakes;
pub mod harness;

pub use fakes::{FakeOutput, FakeTransport, RecordingDispatcher};
pub use harness::{frames, Harness};
