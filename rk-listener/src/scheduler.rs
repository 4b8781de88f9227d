//! Timer scheduling
//!
//! Components never sleep. They ask a [`Scheduler`] for a [`Timer`] to be
//! delivered after a delay; the session loop receives it later as
//! [`Input::Timer`] and dispatches it like any other input.
//!
//! Two implementations:
//! - [`TokioScheduler`]: real time, one sleeping task per timer
//! - [`ManualScheduler`]: virtual time driven by tests

use crate::session::Input;
use crate::state::NoticeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Handle of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// What a timer means when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Reconnect attempt for the given start generation
    Reconnect { generation: u64 },
    /// Clear the donation preview if it is still the given one
    DonationExpiry { seq: u64 },
    /// Drop a transient notice
    NoticeExpiry(NoticeId),
    /// Sample the local output position
    PositionSample,
    /// Load the given stream source attempt after a failure
    SourceReload { attempt: u64 },
}

/// Timer source injected into the session
pub trait Scheduler {
    /// Deliver `timer` after `delay`
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerId;

    /// Forget a timer that has not fired yet. Unknown ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// Real-time scheduler posting fired timers into the session channel
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Input>,
    tasks: HashMap<TimerId, JoinHandle<()>>,
    next_id: u64,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<Input>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of timers not yet fired or cancelled
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerId {
        self.tasks.retain(|_, handle| !handle.is_finished());

        let id = TimerId(self.next_id);
        self.next_id += 1;

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the session is shutting down
            let _ = tx.send(Input::Timer(timer));
        });
        trace!("Scheduled {:?} in {:?}", timer, delay);
        self.tasks.insert(id, handle);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.tasks.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

#[derive(Debug)]
struct PendingTimer {
    due: Duration,
    id: TimerId,
    timer: Timer,
}

#[derive(Debug, Default)]
struct ManualInner {
    now: Duration,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

/// Virtual-time scheduler
///
/// Cloning yields another handle to the same timer list, so a test can keep
/// one handle while the session owns another. Timers due at the same instant
/// fire in scheduling order.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualInner>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time since creation
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to it
    ///
    /// Returns `None` once nothing is due; the clock is then left unchanged,
    /// call [`ManualScheduler::set_now`] to finish the advance.
    pub fn pop_due(&self, until: Duration) -> Option<Timer> {
        let mut inner = self.inner.borrow_mut();
        let index = inner
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= until)
            .min_by_key(|(_, p)| (p.due, p.id.0))
            .map(|(i, _)| i)?;
        let fired = inner.pending.remove(index);
        if fired.due > inner.now {
            inner.now = fired.due;
        }
        Some(fired.timer)
    }

    /// Move the clock forward (never backwards)
    pub fn set_now(&self, now: Duration) {
        let mut inner = self.inner.borrow_mut();
        if now > inner.now {
            inner.now = now;
        }
    }

    /// Timers still pending, with their due times, in firing order
    pub fn pending(&self) -> Vec<(Duration, Timer)> {
        let inner = self.inner.borrow();
        let mut list: Vec<_> = inner.pending.iter().map(|p| (p.due, p.id.0, p.timer)).collect();
        list.sort_by_key(|(due, id, _)| (*due, *id));
        list.into_iter().map(|(due, _, timer)| (due, timer)).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, timer: Timer) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_id);
        inner.next_id += 1;
        let due = inner.now + delay;
        inner.pending.push(PendingTimer { due, id, timer });
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.inner.borrow_mut().pending.retain(|p| p.id != id);
    }
}
