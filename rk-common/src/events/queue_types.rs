//! Queue type definitions
//!
//! Queue snapshot entries as sent in `queue_update` and `track_added` events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::shared_types::empty_string_as_none;

/// Position of an entry relative to the playing track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueEntryStatus {
    /// Already played
    Prev,
    /// Playing now
    Current,
    /// Waiting to play
    #[default]
    Next,
}

impl std::fmt::Display for QueueEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueEntryStatus::Prev => write!(f, "prev"),
            QueueEntryStatus::Current => write!(f, "current"),
            QueueEntryStatus::Next => write!(f, "next"),
        }
    }
}

/// One entry of a queue snapshot
///
/// `id` is unique within a single snapshot only. Entries appended through
/// `track_added` are not checked against existing ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Queue entry identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// Source locator (upstream URL)
    #[serde(rename = "url")]
    pub locator: String,
    /// Nick of whoever added the track
    #[serde(
        rename = "addedByNick",
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub attribution: Option<String>,
    /// When the entry was queued
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub added_at: Option<DateTime<Utc>>,
    /// Entry was queued by a donation
    #[serde(default)]
    pub is_donation: bool,
    /// Position relative to the playing track
    #[serde(default)]
    pub status: QueueEntryStatus,
}

/// Count entries marked as currently playing
pub fn current_count(queue: &[QueueEntry]) -> usize {
    queue
        .iter()
        .filter(|e| e.status == QueueEntryStatus::Current)
        .count()
}

/// Accept RFC 3339 timestamps; treat an empty string as absent
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
