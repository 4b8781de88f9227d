//! Local audio output handle
//!
//! The reconciler drives an [`AudioOutput`]; the output reports asynchronous
//! conditions back into the session loop as [`OutputEvent`]s.

use thiserror::Error;
use url::Url;

/// What caused a play attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTrigger {
    /// Server state asked for playback
    Automatic,
    /// The listener explicitly asked to listen
    UserGesture,
}

/// Play attempt refused by the platform (autoplay policy)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("play rejected: {reason}")]
pub struct PlayRejected {
    pub reason: String,
}

impl PlayRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Identifies one loaded source; events of a replaced source are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Asynchronous output conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Source responded and playback can begin
    CanPlay,
    /// Source failed or ended
    Error(String),
}

/// Playback device abstraction owned by the reconciler
pub trait AudioOutput {
    /// Point the output at a new source, discarding the previous one.
    /// Resets the local position to zero. Events for this source carry
    /// `source`.
    fn load_source(&mut self, source: SourceId, url: &Url);

    /// Start or resume playback. Nothing is fetched before the first play.
    fn play(&mut self, trigger: PlayTrigger) -> Result<(), PlayRejected>;

    /// Pause playback and stop pulling from the source
    fn pause(&mut self);

    /// Set output volume, `0.0..=1.0`
    fn set_volume(&mut self, volume: f32);

    /// Seconds played from the current source
    fn position_secs(&self) -> f64;

    /// Drop the source and any transport behind it
    fn release(&mut self);
}
