//! Connection manager
//!
//! Owns the lifecycle of one real-time channel socket at a time:
//! connect with the current credential, track open/close, route inbound
//! frames, and reconnect with backoff until stopped.
//!
//! Stop is checked when a reconnect timer fires rather than by cancelling
//! the timer. Timers carry the start generation, so a timer left over from
//! an earlier start/stop cycle is ignored as well.

use super::backoff::BackoffConfig;
use super::transport::{SocketEvent, SocketId, Transport};
use crate::config::with_query_param;
use crate::router::{EventRouter, RouteOutcome};
use crate::scheduler::{Scheduler, Timer};
use crate::state::{ConnectionStatus, Store};
use rand::RngCore;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameter carrying the bearer credential
pub const TOKEN_QUERY_PARAM: &str = "token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketPhase {
    Connecting,
    Open,
}

#[derive(Debug, Clone, Copy)]
struct LiveSocket {
    id: SocketId,
    phase: SocketPhase,
}

/// What the manager did with one socket event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketOutcome {
    /// Event for a socket that is no longer the live one
    Ignored,
    Opened,
    Routed(RouteOutcome),
    ErrorNoted,
    /// Socket closed; reconnect scheduled after the delay unless stopped
    Closed { reconnect_in: Option<Duration> },
}

/// Real-time channel lifecycle manager
pub struct ConnectionManager {
    base_url: Url,
    backoff: BackoffConfig,
    transport: Box<dyn Transport>,
    rng: Box<dyn RngCore>,
    router: EventRouter,
    stopped: bool,
    generation: u64,
    socket: Option<LiveSocket>,
    attempt: u32,
}

impl ConnectionManager {
    /// Create a stopped manager
    pub fn new(
        base_url: Url,
        backoff: BackoffConfig,
        transport: Box<dyn Transport>,
        rng: Box<dyn RngCore>,
        router: EventRouter,
    ) -> Self {
        Self {
            base_url,
            backoff,
            transport,
            rng,
            router,
            stopped: true,
            generation: 0,
            socket: None,
            attempt: 0,
        }
    }

    /// Begin connecting. No-op while already running.
    pub fn start(&mut self, store: &Store) -> bool {
        if !self.stopped {
            debug!("Connection manager already running");
            return false;
        }
        self.stopped = false;
        self.generation += 1;
        self.attempt = 0;
        info!("Connection manager started");
        self.connect(store);
        true
    }

    /// Stop, close the live socket and suppress future reconnects
    ///
    /// Closing an open socket is recorded as the final status transition;
    /// nothing else is written to the store until the next `start()`.
    pub fn stop(&mut self, store: &mut Store) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        if let Some(socket) = self.socket.take() {
            self.transport.close(socket.id);
            if socket.phase == SocketPhase::Open {
                store.set_connection_status(ConnectionStatus::Disconnected);
            }
        }
        info!("Connection manager stopped");
        true
    }

    /// Channel URL for the next attempt, credential read from the store now
    pub fn channel_url(&self, store: &Store) -> Url {
        let credential = store.snapshot().credential.as_ref().map(|c| c.as_str());
        with_query_param(&self.base_url, TOKEN_QUERY_PARAM, credential)
    }

    /// Handle activity of a socket opened by this manager
    pub fn on_socket_event(
        &mut self,
        id: SocketId,
        event: SocketEvent,
        store: &mut Store,
        scheduler: &mut dyn Scheduler,
    ) -> SocketOutcome {
        let live = match self.socket {
            Some(socket) if socket.id == id && !self.stopped => socket,
            _ => {
                debug!("Ignoring {:?} for stale socket {:?}", event, id);
                return SocketOutcome::Ignored;
            }
        };

        match event {
            SocketEvent::Opened => {
                self.socket = Some(LiveSocket {
                    id: live.id,
                    phase: SocketPhase::Open,
                });
                self.attempt = 0;
                store.set_connection_status(ConnectionStatus::Connected);
                info!("Real-time channel connected");
                SocketOutcome::Opened
            }
            SocketEvent::Message(frame) => {
                SocketOutcome::Routed(self.router.route(&frame, store, scheduler))
            }
            SocketEvent::Error(message) => {
                // Close follows and drives the reconnect
                warn!("Real-time channel error: {}", message);
                SocketOutcome::ErrorNoted
            }
            SocketEvent::Closed => {
                self.socket = None;
                store.set_connection_status(ConnectionStatus::Disconnected);
                let reconnect_in = self.schedule_reconnect(scheduler);
                SocketOutcome::Closed { reconnect_in }
            }
        }
    }

    /// Reconnect timer fired
    pub fn on_reconnect_timer(&mut self, generation: u64, store: &Store) -> bool {
        if self.stopped || generation != self.generation {
            debug!("Ignoring reconnect timer (stopped or from earlier start)");
            return false;
        }
        self.connect(store)
    }

    fn connect(&mut self, store: &Store) -> bool {
        if self.stopped || self.socket.is_some() {
            return false;
        }
        let url = self.channel_url(store);
        debug!(
            "Connecting to {}{} (credential: {})",
            url.host_str().unwrap_or(""),
            url.path(),
            store.snapshot().credential.is_some()
        );
        let id = self.transport.open(&url);
        self.socket = Some(LiveSocket {
            id,
            phase: SocketPhase::Connecting,
        });
        true
    }

    fn schedule_reconnect(&mut self, scheduler: &mut dyn Scheduler) -> Option<Duration> {
        if self.stopped {
            return None;
        }
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.backoff.delay(self.attempt, self.rng.as_mut());
        info!("Reconnecting in {:?} (attempt {})", delay, self.attempt);
        scheduler.schedule(
            delay,
            Timer::Reconnect {
                generation: self.generation,
            },
        );
        Some(delay)
    }
}
