//! Session harness
//!
//! A [`ListenerSession`] wired to fakes and a [`ManualScheduler`]. Time only
//! moves through [`Harness::advance`], which delivers due timers in order.

use super::fakes::{FakeOutput, FakeTransport, RecordingDispatcher};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rk_common::config::TomlConfig;
use rk_listener::config::ListenerSettings;
use rk_listener::connection::{SocketEvent, SocketId};
use rk_listener::control::{ControlKind, ControlReply, ControlResponse};
use rk_listener::playback::OutputEvent;
use rk_listener::scheduler::ManualScheduler;
use rk_listener::{AppSnapshot, Handled, Input, ListenerSession, SessionParts, UserAction};
use std::time::Duration;

pub struct Harness {
    pub session: ListenerSession,
    pub scheduler: ManualScheduler,
    pub transport: FakeTransport,
    pub output: FakeOutput,
    pub dispatcher: RecordingDispatcher,
}

impl Harness {
    pub fn settings() -> ListenerSettings {
        ListenerSettings::from_toml(&TomlConfig::default()).expect("default settings")
    }

    pub fn new() -> Self {
        Self::build(Self::settings(), FakeOutput::default())
    }

    pub fn with_output(output: FakeOutput) -> Self {
        Self::build(Self::settings(), output)
    }

    pub fn build(settings: ListenerSettings, output: FakeOutput) -> Self {
        let scheduler = ManualScheduler::new();
        let transport = FakeTransport::default();
        let dispatcher = RecordingDispatcher::default();
        let parts = SessionParts {
            transport: Box::new(transport.clone()),
            output: Box::new(output.clone()),
            scheduler: Box::new(scheduler.clone()),
            dispatcher: Box::new(dispatcher.clone()),
            rng: Box::new(StdRng::seed_from_u64(7)),
        };
        Self {
            session: ListenerSession::new(&settings, parts),
            scheduler,
            transport,
            output,
            dispatcher,
        }
    }

    /// Started session with an open channel
    pub fn connected() -> Self {
        let mut h = Self::new();
        h.session.start();
        h.open();
        h
    }

    pub fn snapshot(&self) -> &AppSnapshot {
        self.session.snapshot()
    }

    /// Move virtual time forward, handling every timer that falls due
    pub fn advance(&mut self, by: Duration) -> Vec<Handled> {
        let until = self.scheduler.now() + by;
        let mut handled = Vec::new();
        while let Some(timer) = self.scheduler.pop_due(until) {
            handled.push(self.session.handle(Input::Timer(timer)));
        }
        self.scheduler.set_now(until);
        handled
    }

    pub fn socket_event(&mut self, id: SocketId, event: SocketEvent) -> Handled {
        self.session.handle(Input::Socket { id, event })
    }

    pub fn open(&mut self) -> Handled {
        let id = self.transport.last_socket();
        self.socket_event(id, SocketEvent::Opened)
    }

    pub fn close(&mut self) -> Handled {
        let id = self.transport.last_socket();
        self.socket_event(id, SocketEvent::Closed)
    }

    pub fn frame(&mut self, frame: &str) -> Handled {
        let id = self.transport.last_socket();
        self.socket_event(id, SocketEvent::Message(frame.to_string()))
    }

    /// Output event from the source loaded last
    pub fn audio(&mut self, event: OutputEvent) -> Handled {
        let source = self.output.source();
        self.session.handle(Input::Audio { source, event })
    }

    pub fn user(&mut self, action: UserAction) -> Handled {
        self.session.handle(Input::User(action))
    }

    pub fn reply(
        &mut self,
        kind: ControlKind,
        result: Result<ControlResponse, String>,
    ) -> Handled {
        self.session.handle(Input::Control(ControlReply { kind, result }))
    }
}

/// Frame builders
pub mod frames {
    pub fn player_state(is_playing: bool, is_paused: bool, position: f64) -> String {
        format!(
            r#"{{"type":"player_state","data":{{"isPlaying":{},"isPaused":{},"volume":0.5,"positionSec":{},"durationSec":200,"current":{{"id":"t1","title":"Song","url":"https://yt/1","addedByNick":"bob"}}}}}}"#,
            is_playing, is_paused, position
        )
    }

    pub fn auth(role: &str) -> String {
        format!(r#"{{"type":"auth_update","data":{{"role":"{}"}}}}"#, role)
    }

    pub fn donation(nick: &str, message: &str) -> String {
        format!(
            r#"{{"type":"donation_received","data":{{"donorNick":"{}","message":"{}"}}}}"#,
            nick, message
        )
    }

    pub fn entry(id: &str, status: &str) -> String {
        format!(
            r#"{{"id":"{0}","title":"Track {0}","url":"https://yt/{0}","status":"{1}"}}"#,
            id, status
        )
    }

    pub fn queue_update(entries: &[String]) -> String {
        format!(
            r#"{{"type":"queue_update","data":[{}]}}"#,
            entries.join(",")
        )
    }

    pub fn track_added(entry: &str) -> String {
        format!(r#"{{"type":"track_added","data":{}}}"#, entry)
    }
}
