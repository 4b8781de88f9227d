//! Local playback
//!
//! - `output`: audio output abstraction and its events
//! - `reconciler`: maps server player state onto the output
//! - `stream`: HTTP stream implementation of the output

pub mod output;
pub mod reconciler;
pub mod stream;

pub use output::{AudioOutput, OutputEvent, PlayRejected, PlayTrigger, SourceId};
pub use reconciler::{PlaybackReconciler, ReconcileOutcome, SOURCE_ATTEMPT_PARAM};
pub use stream::HttpStreamOutput;
