//! Playback reconciler
//!
//! Keeps the local audio output consistent with server-authoritative player
//! state:
//! - pause when the server is paused or stopped, otherwise attempt play
//! - output volume follows the locally held volume only
//! - displayed position comes from the output while streaming, from the
//!   server otherwise
//! - a failed source is replaced by a fresh one (`?v=<attempt>`), never
//!   retried as is
//!
//! Play/pause is applied when the (is_playing, is_paused) pair changes, not
//! on every push, so a rejected autoplay is not re-attempted on every
//! position update.
//!
//! Source reloads go through the scheduler with a backoff that grows with
//! consecutive failures and resets once a source reports it can play. While
//! the stream stays down a single recovery notice is kept on display.

use super::output::{AudioOutput, PlayTrigger, SourceId};
use crate::config::with_query_param;
use crate::connection::BackoffConfig;
use crate::scheduler::{Scheduler, Timer, TimerId};
use crate::state::{NoticeId, NoticeKind, Store};
use rk_common::events::PlayerState;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameter carrying the source attempt number
pub const SOURCE_ATTEMPT_PARAM: &str = "v";

/// What the reconciler did with one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do for the output
    Unchanged,
    Paused,
    Started,
    /// Platform refused to start playback; a user gesture is needed
    PlayRejected,
    /// Failed source dropped, next attempt loads after `delay`
    ReloadScheduled { attempt: u64, delay: Duration },
    /// Output pointed at a fresh source
    SourceReloaded { attempt: u64 },
    /// Event or timer belongs to a source that is no longer current
    Stale,
    /// Output not attached, nothing was touched
    Detached,
}

#[derive(Debug, Clone, Copy)]
struct PendingReload {
    timer: TimerId,
    attempt: u64,
}

/// Maps player state onto the local audio output
pub struct PlaybackReconciler {
    output: Box<dyn AudioOutput>,
    stream_url: Url,
    recovery: BackoffConfig,
    source_attempt: u64,
    next_source: u64,
    /// Source whose events are current; `None` once it failed or was released
    source: Option<SourceId>,
    reload: Option<PendingReload>,
    /// Failures since a source last reported it can play
    failures: u32,
    recovery_notice: Option<NoticeId>,
    attached: bool,
    /// (is_playing, is_paused) last applied to the output
    last_flags: Option<(bool, bool)>,
    local_volume: f32,
    volume_seeded: bool,
    sample_interval: Duration,
    sample_timer: Option<TimerId>,
    sampled_position: f64,
    awaiting_gesture: bool,
}

impl PlaybackReconciler {
    pub fn new(
        output: Box<dyn AudioOutput>,
        stream_url: Url,
        recovery: BackoffConfig,
        initial_volume: f32,
        sample_interval: Duration,
    ) -> Self {
        Self {
            output,
            stream_url,
            recovery,
            source_attempt: 0,
            next_source: 0,
            source: None,
            reload: None,
            failures: 0,
            recovery_notice: None,
            attached: false,
            last_flags: None,
            local_volume: initial_volume.clamp(0.0, 1.0),
            volume_seeded: false,
            sample_interval,
            sample_timer: None,
            sampled_position: 0.0,
            awaiting_gesture: false,
        }
    }

    /// Acquire the output: load the current source and start sampling
    pub fn attach(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        if self.attached {
            return false;
        }
        self.attached = true;
        info!("Attaching audio output to {}", self.source_url());
        self.load_current();
        self.sample_timer = Some(scheduler.schedule(self.sample_interval, Timer::PositionSample));
        true
    }

    /// Release the output and stop sampling
    pub fn release(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        if !self.attached {
            return false;
        }
        self.attached = false;
        if let Some(id) = self.sample_timer.take() {
            scheduler.cancel(id);
        }
        if let Some(reload) = self.reload.take() {
            scheduler.cancel(reload.timer);
        }
        self.output.release();
        self.source = None;
        self.failures = 0;
        self.recovery_notice = None;
        // Re-attaching applies the next state from scratch
        self.last_flags = None;
        self.awaiting_gesture = false;
        info!("Audio output released");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Stream locator for the current source attempt
    pub fn source_url(&self) -> Url {
        let attempt = self.source_attempt.to_string();
        with_query_param(&self.stream_url, SOURCE_ATTEMPT_PARAM, Some(&attempt))
    }

    pub fn source_attempt(&self) -> u64 {
        self.source_attempt
    }

    /// Source whose events are currently accepted
    pub fn current_source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn local_volume(&self) -> f32 {
        self.local_volume
    }

    /// A play attempt was rejected and no gesture has started playback since
    pub fn awaiting_gesture(&self) -> bool {
        self.awaiting_gesture
    }

    /// New server player state
    pub fn on_player_state(&mut self, state: &PlayerState) -> ReconcileOutcome {
        if !self.volume_seeded {
            self.seed_volume(state.volume);
        }

        let flags = (state.is_playing, state.is_paused);
        if self.last_flags == Some(flags) {
            return ReconcileOutcome::Unchanged;
        }
        if !self.attached {
            return ReconcileOutcome::Detached;
        }
        self.last_flags = Some(flags);

        if state.is_streaming() {
            self.try_play(PlayTrigger::Automatic)
        } else {
            self.output.pause();
            self.awaiting_gesture = false;
            debug!("Server {}, output paused", state.state_label());
            ReconcileOutcome::Paused
        }
    }

    /// Output reported a playback or stream error for `source`
    ///
    /// Drops the source and schedules the next attempt. Player state is left
    /// alone; the recovery notice is raised once per outage.
    pub fn on_output_error(
        &mut self,
        source: SourceId,
        message: &str,
        store: &mut Store,
        scheduler: &mut dyn Scheduler,
    ) -> ReconcileOutcome {
        if !self.attached {
            return ReconcileOutcome::Detached;
        }
        if self.source != Some(source) {
            debug!("Ignoring error from replaced source {:?}: {}", source, message);
            return ReconcileOutcome::Stale;
        }
        warn!("Audio output error: {}", message);
        self.source = None;

        let delay = self.recovery.base_delay(self.failures);
        self.failures = self.failures.saturating_add(1);
        let attempt = self.source_attempt + 1;
        let timer = scheduler.schedule(delay, Timer::SourceReload { attempt });
        self.reload = Some(PendingReload { timer, attempt });

        let shown = self
            .recovery_notice
            .is_some_and(|id| store.snapshot().notices.iter().any(|n| n.id == id));
        if !shown {
            self.recovery_notice = Some(store.push_notice(
                NoticeKind::Info,
                "Stream",
                Some("Stream dropped, reconnecting...".to_string()),
            ));
        }
        debug!("Source attempt {} in {:?}", attempt, delay);
        ReconcileOutcome::ReloadScheduled { attempt, delay }
    }

    /// Reload timer fired: load the next attempt and resume if streaming
    pub fn on_reload_timer(
        &mut self,
        attempt: u64,
        player: Option<&PlayerState>,
    ) -> ReconcileOutcome {
        match self.reload {
            Some(pending) if self.attached && pending.attempt == attempt => {}
            _ => return ReconcileOutcome::Stale,
        }
        self.reload = None;
        self.source_attempt = attempt;
        self.load_current();
        info!("Reloaded audio source (attempt {})", attempt);

        if let Some(state) = player.filter(|s| s.is_streaming()) {
            let outcome = self.try_play(PlayTrigger::Automatic);
            debug!("Resume after reload while {}: {:?}", state.state_label(), outcome);
        }
        ReconcileOutcome::SourceReloaded { attempt }
    }

    /// Output is ready; start if the server is streaming
    pub fn on_can_play(
        &mut self,
        source: SourceId,
        player: Option<&PlayerState>,
    ) -> ReconcileOutcome {
        if !self.attached {
            return ReconcileOutcome::Detached;
        }
        if self.source != Some(source) {
            return ReconcileOutcome::Stale;
        }
        self.failures = 0;
        match player {
            Some(state) if state.is_streaming() => self.try_play(PlayTrigger::Automatic),
            _ => ReconcileOutcome::Unchanged,
        }
    }

    /// Listener asked to start playback
    pub fn user_play(&mut self) -> ReconcileOutcome {
        if !self.attached {
            return ReconcileOutcome::Detached;
        }
        self.try_play(PlayTrigger::UserGesture)
    }

    /// Position sampling tick; schedules the next one
    pub fn on_sample_tick(&mut self, scheduler: &mut dyn Scheduler) -> f64 {
        if !self.attached {
            return self.sampled_position;
        }
        self.sampled_position = self.output.position_secs();
        self.sample_timer = Some(scheduler.schedule(self.sample_interval, Timer::PositionSample));
        self.sampled_position
    }

    /// Position to show for `player`
    pub fn displayed_position(&self, player: Option<&PlayerState>) -> f64 {
        match player {
            Some(state) if state.is_streaming() => self.sampled_position,
            Some(state) => state.position_sec,
            None => 0.0,
        }
    }

    /// Set the local volume, clamped to `0.0..=1.0`; returns the applied value
    pub fn set_local_volume(&mut self, volume: f32) -> f32 {
        if volume.is_nan() {
            return self.local_volume;
        }
        self.seed_volume(volume);
        self.local_volume
    }

    /// Adopt a server volume as the local volume
    pub fn seed_volume(&mut self, volume: f32) {
        self.local_volume = volume.clamp(0.0, 1.0);
        self.volume_seeded = true;
        self.output.set_volume(self.local_volume);
    }

    fn load_current(&mut self) {
        self.next_source += 1;
        let source = SourceId::new(self.next_source);
        let url = self.source_url();
        self.output.load_source(source, &url);
        self.output.set_volume(self.local_volume);
        self.source = Some(source);
        self.sampled_position = 0.0;
    }

    fn try_play(&mut self, trigger: PlayTrigger) -> ReconcileOutcome {
        match self.output.play(trigger) {
            Ok(()) => {
                self.awaiting_gesture = false;
                debug!("Output playing ({:?})", trigger);
                ReconcileOutcome::Started
            }
            Err(e) => {
                debug!("{}", e);
                self.awaiting_gesture = true;
                ReconcileOutcome::PlayRejected
            }
        }
    }
}
