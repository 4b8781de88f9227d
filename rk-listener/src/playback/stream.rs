//! HTTP stream output
//!
//! Consumes the broadcast audio stream over HTTP and keeps a play clock.
//! Audio is not decoded: bytes are drained as they arrive so the server
//! keeps the connection live, and the position is the time spent playing
//! since the source was loaded.
//!
//! The stream is only fetched while playing. Loading a source records it,
//! the first play opens the request and pause drops it. A failed request is
//! not reopened for the same source.
//!
//! Autoplay policy: with autoplay disabled, automatic play attempts are
//! rejected until the listener has made one explicit gesture.

use super::output::{AudioOutput, OutputEvent, PlayRejected, PlayTrigger, SourceId};
use crate::error::{Error, Result};
use crate::session::Input;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};
use url::Url;

/// Elapsed play time, paused and resumed with the output
#[derive(Debug, Default)]
struct PlayClock {
    accumulated: Duration,
    started: Option<Instant>,
}

impl PlayClock {
    fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.accumulated += started.elapsed();
        }
    }

    fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started = None;
    }

    fn elapsed(&self) -> Duration {
        self.accumulated + self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

/// Audio output backed by an HTTP stream
pub struct HttpStreamOutput {
    client: reqwest::Client,
    tx: mpsc::UnboundedSender<Input>,
    autoplay: bool,
    gesture_seen: bool,
    volume: f32,
    source: Option<(SourceId, Url)>,
    /// Request for the current source; kept after it finishes
    fetch: Option<JoinHandle<()>>,
    clock: PlayClock,
}

impl HttpStreamOutput {
    pub fn new(client: reqwest::Client, tx: mpsc::UnboundedSender<Input>, autoplay: bool) -> Self {
        Self {
            client,
            tx,
            autoplay,
            gesture_seen: false,
            volume: 1.0,
            source: None,
            fetch: None,
            clock: PlayClock::default(),
        }
    }

    /// Volume last applied
    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn abort_fetch(&mut self) {
        if let Some(handle) = self.fetch.take() {
            handle.abort();
        }
    }

    fn ensure_fetch(&mut self) {
        if self.fetch.is_some() {
            return;
        }
        if let Some((source, url)) = self.source.as_ref() {
            self.fetch = Some(tokio::spawn(fetch_stream(
                self.client.clone(),
                *source,
                url.clone(),
                self.tx.clone(),
            )));
        }
    }
}

impl AudioOutput for HttpStreamOutput {
    fn load_source(&mut self, source: SourceId, url: &Url) {
        self.abort_fetch();
        self.clock.reset();
        self.source = Some((source, url.clone()));
    }

    fn play(&mut self, trigger: PlayTrigger) -> std::result::Result<(), PlayRejected> {
        if self.source.is_none() {
            return Err(PlayRejected::new("no source loaded"));
        }
        match trigger {
            PlayTrigger::UserGesture => self.gesture_seen = true,
            PlayTrigger::Automatic if !self.autoplay && !self.gesture_seen => {
                return Err(PlayRejected::new("autoplay disabled until the listener starts playback"));
            }
            PlayTrigger::Automatic => {}
        }
        self.clock.start();
        self.ensure_fetch();
        Ok(())
    }

    fn pause(&mut self) {
        self.clock.stop();
        self.abort_fetch();
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn position_secs(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    fn release(&mut self) {
        self.abort_fetch();
        self.clock.reset();
        self.source = None;
    }
}

impl Drop for HttpStreamOutput {
    fn drop(&mut self) {
        self.abort_fetch();
    }
}

/// Fetch task: reports `CanPlay` once headers arrive and `Error` when the
/// stream fails or ends (a live stream never ends on its own)
async fn fetch_stream(
    client: reqwest::Client,
    source: SourceId,
    url: Url,
    tx: mpsc::UnboundedSender<Input>,
) {
    let message = match drain(&client, source, url, &tx).await {
        Ok(received) => format!("stream ended after {} bytes", received),
        Err(e) => e.to_string(),
    };
    let _ = tx.send(Input::Audio {
        source,
        event: OutputEvent::Error(message),
    });
}

async fn drain(
    client: &reqwest::Client,
    source: SourceId,
    url: Url,
    tx: &mpsc::UnboundedSender<Input>,
) -> Result<u64> {
    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(Error::Stream(format!("HTTP {}", response.status())));
    }
    debug!("Audio stream responded, can play");
    let _ = tx.send(Input::Audio {
        source,
        event: OutputEvent::CanPlay,
    });

    let mut received: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        received += chunk.len() as u64;
        trace!("Stream chunk: {} bytes ({} total)", chunk.len(), received);
    }
    Ok(received)
}
