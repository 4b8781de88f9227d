//! Event decoder/router
//!
//! Turns one raw inbound frame into exactly one store mutation, or discards
//! it. Discards are returned as values, never raised: a frame that fails to
//! parse or carries an unknown shape leaves the store untouched.

use crate::scheduler::{Scheduler, Timer};
use crate::state::Store;
use rk_common::events::{DecodeError, Role, ServerEvent};
use std::time::Duration;
use tracing::debug;

/// Mutation performed for an applied frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    PlayerState,
    QueueReplaced { len: usize },
    QueueAppended { id: String },
    DonationPreview { seq: u64 },
    Role(Role),
}

/// Result of routing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Applied(Applied),
    Discarded(DecodeError),
}

impl RouteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RouteOutcome::Applied(_))
    }
}

/// Routes decoded server events into the store
#[derive(Debug, Clone)]
pub struct EventRouter {
    donation_preview_ttl: Duration,
}

impl EventRouter {
    pub fn new(donation_preview_ttl: Duration) -> Self {
        Self {
            donation_preview_ttl,
        }
    }

    /// Decode and apply one raw frame
    pub fn route(
        &self,
        frame: &str,
        store: &mut Store,
        scheduler: &mut dyn Scheduler,
    ) -> RouteOutcome {
        match ServerEvent::decode(frame) {
            Ok(event) => RouteOutcome::Applied(self.apply(event, store, scheduler)),
            Err(e) => {
                debug!("Discarding frame: {}", e);
                RouteOutcome::Discarded(e)
            }
        }
    }

    /// Apply an already decoded event
    pub fn apply(
        &self,
        event: ServerEvent,
        store: &mut Store,
        scheduler: &mut dyn Scheduler,
    ) -> Applied {
        debug!("Applying {} event", event.event_type());
        match event {
            ServerEvent::PlayerState(state) => {
                store.set_player_state(state);
                Applied::PlayerState
            }
            ServerEvent::QueueUpdate(queue) => {
                let len = queue.len();
                store.replace_queue(queue);
                Applied::QueueReplaced { len }
            }
            ServerEvent::TrackAdded(entry) => {
                let id = entry.id.clone();
                store.append_queue(entry);
                Applied::QueueAppended { id }
            }
            ServerEvent::DonationReceived(preview) => {
                let seq = store.show_donation_preview(preview);
                scheduler.schedule(self.donation_preview_ttl, Timer::DonationExpiry { seq });
                Applied::DonationPreview { seq }
            }
            ServerEvent::AuthUpdate(role) => {
                store.set_role(role);
                Applied::Role(role)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    fn router() -> EventRouter {
        EventRouter::new(Duration::from_millis(6000))
    }

    #[test]
    fn test_discard_leaves_store_unchanged() {
        let mut store = Store::new();
        let mut sched = ManualScheduler::new();
        let before = store.snapshot().clone();

        for frame in [
            "",
            "{",
            "null",
            r#"{"type":"player_state","data":{"isPlaying":"yes"}}"#,
            r#"{"type":"volume_changed","data":{"volume":0.5}}"#,
            r#"{"type":"track_added","data":{"title":"no id"}}"#,
        ] {
            let outcome = router().route(frame, &mut store, &mut sched);
            assert!(!outcome.is_applied(), "frame {:?} should be discarded", frame);
        }

        assert_eq!(store.snapshot(), &before);
        assert!(store.take_changes().is_empty());
        assert!(sched.pending().is_empty());
    }

    #[test]
    fn test_auth_update_sets_role() {
        let mut store = Store::new();
        let mut sched = ManualScheduler::new();
        let outcome = router().route(
            r#"{"type":"auth_update","data":{"role":"owner"}}"#,
            &mut store,
            &mut sched,
        );
        assert_eq!(outcome, RouteOutcome::Applied(Applied::Role(Role::Owner)));
        assert_eq!(store.snapshot().role, Role::Owner);
        assert!(store.snapshot().controls_enabled());
    }

    #[test]
    fn test_donation_schedules_expiry() {
        let mut store = Store::new();
        let mut sched = ManualScheduler::new();
        let outcome = router().route(
            r#"{"type":"donation_received","data":{"donorNick":"alice","message":"gg"}}"#,
            &mut store,
            &mut sched,
        );
        assert_eq!(outcome, RouteOutcome::Applied(Applied::DonationPreview { seq: 1 }));
        assert_eq!(
            sched.pending(),
            vec![(Duration::from_millis(6000), Timer::DonationExpiry { seq: 1 })]
        );
    }
}
