//! Listener session
//!
//! Owns the store and every component, and processes one [`Input`] at a time
//! to completion. Socket events, timer firings, output events, user actions
//! and control replies all arrive through the same channel, so the store is
//! only ever touched from here.
//!
//! After each input the recorded store changes are settled: a new player
//! state is handed to the reconciler and new transient notices get their
//! expiry timer.

use crate::config::ListenerSettings;
use crate::connection::{ConnectionManager, SocketEvent, SocketId, SocketOutcome, Transport};
use crate::control::{ControlDispatcher, ControlKind, ControlReply, ControlRequest, ControlResponse};
use crate::playback::{AudioOutput, OutputEvent, PlaybackReconciler, ReconcileOutcome, SourceId};
use crate::router::EventRouter;
use crate::scheduler::{Scheduler, Timer};
use crate::state::{AppSnapshot, NoticeId, NoticeKind, Observer, StateChange, Store};
use rand::RngCore;
use rk_common::events::current_count;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

/// Everything the session loop reacts to
#[derive(Debug)]
pub enum Input {
    Socket { id: SocketId, event: SocketEvent },
    Timer(Timer),
    Audio { source: SourceId, event: OutputEvent },
    User(UserAction),
    Control(ControlReply),
}

/// Actions requested by the listener
#[derive(Clone, PartialEq)]
pub enum UserAction {
    Login { username: String, password: String },
    Logout,
    Play,
    Pause,
    Next,
    Prev,
    /// Set the local volume and send it to the server
    SetVolume(f32),
    AddTrack(String),
    /// Start local playback after an autoplay rejection
    Listen,
    /// Dismiss the notice whose short id starts with the prefix, or all
    Dismiss(Option<String>),
}

impl std::fmt::Debug for UserAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserAction::Login { username, .. } => write!(f, "Login({}, ***)", username),
            UserAction::Logout => write!(f, "Logout"),
            UserAction::Play => write!(f, "Play"),
            UserAction::Pause => write!(f, "Pause"),
            UserAction::Next => write!(f, "Next"),
            UserAction::Prev => write!(f, "Prev"),
            UserAction::SetVolume(v) => write!(f, "SetVolume({})", v),
            UserAction::AddTrack(url) => write!(f, "AddTrack({})", url),
            UserAction::Listen => write!(f, "Listen"),
            UserAction::Dismiss(id) => write!(f, "Dismiss({:?})", id),
        }
    }
}

/// What handling one input did
#[derive(Debug, Clone, PartialEq)]
pub enum Handled {
    Socket(SocketOutcome),
    Reconnect { attempted: bool },
    DonationExpired(bool),
    NoticeExpired(bool),
    Sampled(f64),
    Playback(ReconcileOutcome),
    Dispatched(ControlKind),
    /// Control refused locally, role unknown
    Refused(ControlKind),
    Reply(ControlKind),
    VolumeSet(f32),
    LoggedOut,
    Dismissed(usize),
}

/// Collaborators the session drives
pub struct SessionParts {
    pub transport: Box<dyn Transport>,
    pub output: Box<dyn AudioOutput>,
    pub scheduler: Box<dyn Scheduler>,
    pub dispatcher: Box<dyn ControlDispatcher>,
    pub rng: Box<dyn RngCore>,
}

/// Listener session state machine
pub struct ListenerSession {
    store: Store,
    manager: ConnectionManager,
    reconciler: PlaybackReconciler,
    scheduler: Box<dyn Scheduler>,
    dispatcher: Box<dyn ControlDispatcher>,
    notice_ttl: Duration,
    /// Transient notices with an expiry timer scheduled
    expiring: HashSet<NoticeId>,
}

impl ListenerSession {
    pub fn new(settings: &ListenerSettings, parts: SessionParts) -> Self {
        let router = EventRouter::new(settings.donation_preview_ttl);
        let manager = ConnectionManager::new(
            settings.ws_url.clone(),
            settings.backoff,
            parts.transport,
            parts.rng,
            router,
        );
        let reconciler = PlaybackReconciler::new(
            parts.output,
            settings.stream_url.clone(),
            settings.backoff,
            settings.initial_volume,
            settings.position_sample_interval,
        );

        Self {
            store: Store::new(),
            manager,
            reconciler,
            scheduler: parts.scheduler,
            dispatcher: parts.dispatcher,
            notice_ttl: settings.notice_ttl,
            expiring: HashSet::new(),
        }
    }

    /// Register a store observer
    pub fn subscribe(&mut self, observer: Observer) {
        self.store.subscribe(observer);
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        self.store.snapshot()
    }

    /// Position to display for the current player state
    pub fn displayed_position(&self) -> f64 {
        self.reconciler
            .displayed_position(self.store.snapshot().player.as_ref())
    }

    pub fn local_volume(&self) -> f32 {
        self.reconciler.local_volume()
    }

    /// Autoplay was rejected and the listener has not started playback yet
    pub fn awaiting_gesture(&self) -> bool {
        self.reconciler.awaiting_gesture()
    }

    /// Connect, attach the output and fetch the initial player state
    ///
    /// No-op while already started.
    pub fn start(&mut self) {
        if !self.manager.start(&self.store) {
            return;
        }
        info!("Starting listener session");
        self.reconciler.attach(self.scheduler.as_mut());
        self.dispatch(ControlRequest::FetchPlayerState);
        self.settle();
    }

    /// Stop reconnecting, close the socket and release the output
    pub fn shutdown(&mut self) {
        info!("Shutting down listener session");
        self.manager.stop(&mut self.store);
        self.reconciler.release(self.scheduler.as_mut());
        self.settle();
    }

    /// Process one input to completion
    pub fn handle(&mut self, input: Input) -> Handled {
        let handled = match input {
            Input::Socket { id, event } => Handled::Socket(self.manager.on_socket_event(
                id,
                event,
                &mut self.store,
                self.scheduler.as_mut(),
            )),
            Input::Timer(timer) => self.on_timer(timer),
            Input::Audio {
                source,
                event: OutputEvent::CanPlay,
            } => Handled::Playback(
                self.reconciler
                    .on_can_play(source, self.store.snapshot().player.as_ref()),
            ),
            Input::Audio {
                source,
                event: OutputEvent::Error(message),
            } => Handled::Playback(self.reconciler.on_output_error(
                source,
                &message,
                &mut self.store,
                self.scheduler.as_mut(),
            )),
            Input::User(action) => self.on_user(action),
            Input::Control(reply) => self.on_reply(reply),
        };
        self.settle();
        handled
    }

    fn on_timer(&mut self, timer: Timer) -> Handled {
        match timer {
            Timer::Reconnect { generation } => Handled::Reconnect {
                attempted: self.manager.on_reconnect_timer(generation, &self.store),
            },
            Timer::DonationExpiry { seq } => {
                Handled::DonationExpired(self.store.expire_donation_preview(seq))
            }
            Timer::NoticeExpiry(id) => {
                self.expiring.remove(&id);
                Handled::NoticeExpired(self.store.dismiss_notice(id))
            }
            Timer::PositionSample => {
                Handled::Sampled(self.reconciler.on_sample_tick(self.scheduler.as_mut()))
            }
            Timer::SourceReload { attempt } => Handled::Playback(
                self.reconciler
                    .on_reload_timer(attempt, self.store.snapshot().player.as_ref()),
            ),
        }
    }

    fn on_user(&mut self, action: UserAction) -> Handled {
        debug!("User action: {:?}", action);
        match action {
            UserAction::Login { username, password } => {
                self.dispatch(ControlRequest::Login { username, password })
            }
            UserAction::Logout => {
                self.store.set_credential(None);
                self.store
                    .push_notice(NoticeKind::Info, "Session", Some("Logged out".to_string()));
                Handled::LoggedOut
            }
            UserAction::Play => self.command(ControlRequest::Play),
            UserAction::Pause => self.command(ControlRequest::Pause),
            UserAction::Next => self.command(ControlRequest::Next),
            UserAction::Prev => self.command(ControlRequest::Prev),
            UserAction::AddTrack(url) => self.command(ControlRequest::AddTrack(url)),
            UserAction::SetVolume(volume) => {
                let applied = self.reconciler.set_local_volume(volume);
                // Local volume applies regardless of role
                if self.store.snapshot().controls_enabled() {
                    self.dispatch(ControlRequest::SetVolume(applied));
                }
                Handled::VolumeSet(applied)
            }
            UserAction::Listen => Handled::Playback(self.reconciler.user_play()),
            UserAction::Dismiss(prefix) => {
                let ids: Vec<NoticeId> = self
                    .store
                    .snapshot()
                    .notices
                    .iter()
                    .filter(|n| prefix.as_deref().map_or(true, |p| n.id.short().starts_with(p)))
                    .map(|n| n.id)
                    .collect();
                let dismissed = ids
                    .into_iter()
                    .filter(|id| self.store.dismiss_notice(*id))
                    .count();
                Handled::Dismissed(dismissed)
            }
        }
    }

    fn on_reply(&mut self, reply: ControlReply) -> Handled {
        let kind = reply.kind;
        match (kind, reply.result) {
            (_, Ok(ControlResponse::PlayerState(state))) => {
                self.reconciler.seed_volume(state.volume);
                self.store.set_player_state(state);
            }
            (_, Ok(ControlResponse::Queue(queue))) => {
                if current_count(&queue) > 1 {
                    debug!("Ignoring playlist with several current entries");
                } else {
                    self.store.replace_queue(queue);
                }
            }
            (_, Ok(ControlResponse::Token(credential))) => {
                self.store.set_credential(Some(credential));
                self.store
                    .push_notice(NoticeKind::Success, "Login", Some("Logged in".to_string()));
                // Channel picks the credential up on its next attempt
                self.dispatch(ControlRequest::FetchQueue);
            }
            (ControlKind::SetVolume, Ok(ControlResponse::Ack)) => {}
            (_, Ok(ControlResponse::Ack)) => {
                self.store.push_notice(
                    NoticeKind::Success,
                    "Player",
                    Some(kind.label().to_string()),
                );
            }
            // Playlist refresh failures stay silent, the channel catches up
            (ControlKind::FetchQueue, Err(e)) => debug!("Playlist fetch failed: {}", e),
            (ControlKind::FetchPlayerState, Err(e)) => {
                self.store.push_notice(
                    NoticeKind::Error,
                    "Player",
                    Some(format!("Could not fetch player state: {}", e)),
                );
            }
            (_, Err(e)) => {
                self.store
                    .push_notice(NoticeKind::Error, kind.label(), Some(e));
            }
        }
        Handled::Reply(kind)
    }

    /// Dispatch an owner command, refusing it while the role is unknown
    fn command(&mut self, request: ControlRequest) -> Handled {
        let kind = request.kind();
        if !self.store.snapshot().controls_enabled() {
            self.store.push_notice(
                NoticeKind::Info,
                kind.label(),
                Some("Controls are available once the server assigns a role".to_string()),
            );
            return Handled::Refused(kind);
        }
        self.dispatch(request)
    }

    fn dispatch(&mut self, request: ControlRequest) -> Handled {
        let kind = request.kind();
        self.dispatcher
            .dispatch(request, self.store.snapshot().credential.as_ref());
        Handled::Dispatched(kind)
    }

    fn settle(&mut self) {
        loop {
            let changes = self.store.take_changes();
            if changes.is_empty() {
                break;
            }
            for change in changes {
                match change {
                    StateChange::Player => {
                        if let Some(state) = self.store.snapshot().player.as_ref() {
                            let outcome = self.reconciler.on_player_state(state);
                            debug!("Reconciled player state: {:?}", outcome);
                        }
                    }
                    StateChange::Notices => self.schedule_notice_expiry(),
                    _ => {}
                }
            }
        }
    }

    fn schedule_notice_expiry(&mut self) {
        let notices = &self.store.snapshot().notices;
        self.expiring
            .retain(|id| notices.iter().any(|n| n.id == *id));
        for notice in notices.iter().filter(|n| n.kind.is_transient()) {
            if self.expiring.insert(notice.id) {
                self.scheduler
                    .schedule(self.notice_ttl, Timer::NoticeExpiry(notice.id));
            }
        }
    }
}

impl Drop for ListenerSession {
    fn drop(&mut self) {
        self.manager.stop(&mut self.store);
        self.reconciler.release(self.scheduler.as_mut());
    }
}
