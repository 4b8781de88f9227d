//! In-memory collaborators
//!
//! Each fake is a cheap handle over shared state, so the test keeps one
//! clone while the session owns another.

use rk_listener::connection::{SocketId, Transport};
use rk_listener::control::{ControlDispatcher, ControlRequest};
use rk_listener::playback::{AudioOutput, PlayRejected, PlayTrigger, SourceId};
use rk_listener::state::Credential;
use std::cell::RefCell;
use std::rc::Rc;
use url::Url;

#[derive(Debug, Default)]
pub struct TransportLog {
    pub opened: Vec<(SocketId, Url)>,
    pub closed: Vec<SocketId>,
    next_id: u64,
}

/// Transport that records open/close calls
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    pub log: Rc<RefCell<TransportLog>>,
}

impl FakeTransport {
    pub fn open_count(&self) -> usize {
        self.log.borrow().opened.len()
    }

    pub fn last_socket(&self) -> SocketId {
        self.log.borrow().opened.last().map(|(id, _)| *id).expect("no socket opened")
    }

    pub fn last_url(&self) -> Url {
        self.log.borrow().opened.last().map(|(_, url)| url.clone()).expect("no socket opened")
    }

    pub fn closed(&self) -> Vec<SocketId> {
        self.log.borrow().closed.clone()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self, url: &Url) -> SocketId {
        let mut log = self.log.borrow_mut();
        log.next_id += 1;
        let id = SocketId::new(log.next_id);
        log.opened.push((id, url.clone()));
        id
    }

    fn close(&mut self, id: SocketId) {
        self.log.borrow_mut().closed.push(id);
    }
}

#[derive(Debug, Default)]
pub struct OutputLog {
    pub loads: Vec<String>,
    pub source: Option<SourceId>,
    pub plays: Vec<PlayTrigger>,
    pub pauses: usize,
    pub volume: Option<f32>,
    pub released: bool,
    pub reject_automatic: bool,
    pub position: f64,
}

/// Audio output that records calls and can refuse autoplay
#[derive(Debug, Clone, Default)]
pub struct FakeOutput {
    pub log: Rc<RefCell<OutputLog>>,
}

impl FakeOutput {
    pub fn rejecting_autoplay() -> Self {
        let output = Self::default();
        output.log.borrow_mut().reject_automatic = true;
        output
    }

    pub fn set_position(&self, secs: f64) {
        self.log.borrow_mut().position = secs;
    }

    /// Source of the last load
    pub fn source(&self) -> SourceId {
        self.log.borrow().source.expect("no source loaded")
    }

    pub fn loads(&self) -> Vec<String> {
        self.log.borrow().loads.clone()
    }

    pub fn plays(&self) -> Vec<PlayTrigger> {
        self.log.borrow().plays.clone()
    }

    pub fn pauses(&self) -> usize {
        self.log.borrow().pauses
    }

    pub fn volume(&self) -> Option<f32> {
        self.log.borrow().volume
    }
}

impl AudioOutput for FakeOutput {
    fn load_source(&mut self, source: SourceId, url: &Url) {
        let mut log = self.log.borrow_mut();
        log.loads.push(url.to_string());
        log.source = Some(source);
        log.position = 0.0;
    }

    fn play(&mut self, trigger: PlayTrigger) -> Result<(), PlayRejected> {
        let mut log = self.log.borrow_mut();
        if log.reject_automatic && trigger == PlayTrigger::Automatic {
            return Err(PlayRejected::new("autoplay blocked"));
        }
        log.plays.push(trigger);
        Ok(())
    }

    fn pause(&mut self) {
        self.log.borrow_mut().pauses += 1;
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.borrow_mut().volume = Some(volume);
    }

    fn position_secs(&self) -> f64 {
        self.log.borrow().position
    }

    fn release(&mut self) {
        self.log.borrow_mut().released = true;
    }
}

/// Dispatcher that records requests with the credential they carried
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    pub requests: Rc<RefCell<Vec<(ControlRequest, Option<String>)>>>,
}

impl RecordingDispatcher {
    pub fn requests(&self) -> Vec<ControlRequest> {
        self.requests.borrow().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn last(&self) -> Option<(ControlRequest, Option<String>)> {
        self.requests.borrow().last().cloned()
    }
}

impl ControlDispatcher for RecordingDispatcher {
    fn dispatch(&mut self, request: ControlRequest, credential: Option<&Credential>) {
        self.requests
            .borrow_mut()
            .push((request, credential.map(|c| c.as_str().to_string())));
    }
}
