//! Player state type definitions
//!
//! Server-authoritative playback state as pushed over the real-time channel.

use serde::{Deserialize, Serialize};

use super::shared_types::empty_string_as_none;

/// Track currently loaded on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTrack {
    /// Track identifier assigned by the server
    pub id: String,
    /// Display title
    pub title: String,
    /// Source locator of the track (upstream URL)
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
}

/// Full player state
///
/// Replaced wholesale on every server push, never merged field by field.
/// `is_paused` is the server's pause flag and is independent of `is_playing`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Server has a track running
    pub is_playing: bool,
    /// Server-authoritative pause
    pub is_paused: bool,
    /// Broadcast volume (0.0-1.0)
    pub volume: f32,
    /// Loaded track, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<CurrentTrack>,
    /// Server-reported position in seconds
    pub position_sec: f64,
    /// Track duration in seconds
    pub duration_sec: f64,
}

impl PlayerState {
    /// True when the server is playing and not paused
    pub fn is_streaming(&self) -> bool {
        self.is_playing && !self.is_paused
    }

    /// Short label for the play state, as shown next to the title
    pub fn state_label(&self) -> &'static str {
        if self.is_paused {
            "PAUSED"
        } else if self.is_playing {
            "PLAYING"
        } else {
            "STOPPED"
        }
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("volume {} outside 0..=1", self.volume));
        }
        if !self.position_sec.is_finite() || self.position_sec < 0.0 {
            return Err(format!("negative position {}", self.position_sec));
        }
        if !self.duration_sec.is_finite() || self.duration_sec < 0.0 {
            return Err(format!("negative duration {}", self.duration_sec));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(volume: f32, position_sec: f64) -> PlayerState {
        PlayerState {
            is_playing: true,
            is_paused: false,
            volume,
            current: None,
            position_sec,
            duration_sec: 200.0,
        }
    }

    #[test]
    fn test_player_state_accepts_integer_seconds() {
        let json = r#"{"isPlaying":true,"isPaused":false,"volume":0.7,"positionSec":10,"durationSec":100}"#;
        let st: PlayerState = serde_json::from_str(json).unwrap();
        assert_eq!(st.position_sec, 10.0);
        assert_eq!(st.duration_sec, 100.0);
        assert!(st.current.is_none());
    }

    #[test]
    fn test_current_track_wire_names() {
        let json = r#"{"id":"t1","title":"Song","url":"https://y","addedByNick":"nick"}"#;
        let track: CurrentTrack = serde_json::from_str(json).unwrap();
        assert_eq!(track.locator, "https://y");
        assert_eq!(track.attribution.as_deref(), Some("nick"));

        let empty = r#"{"id":"t1","title":"Song","url":"https://y","addedByNick":""}"#;
        let track: CurrentTrack = serde_json::from_str(empty).unwrap();
        assert!(track.attribution.is_none());
    }

    #[test]
    fn test_is_streaming() {
        let mut st = state(0.5, 0.0);
        assert!(st.is_streaming());
        st.is_paused = true;
        assert!(!st.is_streaming());
        assert_eq!(st.state_label(), "PAUSED");
        st.is_paused = false;
        st.is_playing = false;
        assert!(!st.is_streaming());
        assert_eq!(st.state_label(), "STOPPED");
    }

    #[test]
    fn test_validate_ranges() {
        assert!(state(0.0, 0.0).validate().is_ok());
        assert!(state(1.0, 12.5).validate().is_ok());
        assert!(state(1.2, 0.0).validate().is_err());
        assert!(state(-0.1, 0.0).validate().is_err());
        assert!(state(0.5, -1.0).validate().is_err());
    }
}
