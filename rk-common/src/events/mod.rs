//! Real-time event types for the RK broadcast channel
//!
//! Every frame on the channel is a JSON object `{"type": ..., "data": ...}`.
//! [`ServerEvent::decode`] turns one raw text frame into a typed event or a
//! [`DecodeError`] describing why the frame cannot be used. Decoding never
//! panics; callers decide what to do with rejected frames.

mod player_types;
mod queue_types;
mod shared_types;

pub use player_types::{CurrentTrack, PlayerState};
pub use queue_types::{current_count, QueueEntry, QueueEntryStatus};
pub use shared_types::{DonationPreview, Role};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::AuthUpdate;
use thiserror::Error;

/// Wire tag of the `player_state` event
pub const EVENT_PLAYER_STATE: &str = "player_state";
/// Wire tag of the `queue_update` event
pub const EVENT_QUEUE_UPDATE: &str = "queue_update";
/// Wire tag of the `track_added` event
pub const EVENT_TRACK_ADDED: &str = "track_added";
/// Wire tag of the `donation_received` event
pub const EVENT_DONATION_RECEIVED: &str = "donation_received";
/// Wire tag of the `auth_update` event
pub const EVENT_AUTH_UPDATE: &str = "auth_update";

/// Events pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Full player state, replaces the previous one
    PlayerState(PlayerState),
    /// Full queue snapshot, replaces the previous queue
    QueueUpdate(Vec<QueueEntry>),
    /// One entry appended to the end of the queue
    TrackAdded(QueueEntry),
    /// Donation to preview
    DonationReceived(DonationPreview),
    /// Role asserted for this connection
    AuthUpdate(Role),
}

/// Why a frame was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not JSON, or not an object carrying a string `type`
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// `type` tag not known to this client
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// Known `type` but the `data` payload does not fit
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: &'static str, reason: String },
}

/// Outer envelope, decoded before the payload
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// `track_added` payloads come either bare or wrapped in `{"entry": ...}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TrackAddedPayload {
    Wrapped { entry: QueueEntry },
    Bare(QueueEntry),
}

impl ServerEvent {
    /// Decode one raw text frame
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(frame)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match envelope.kind.as_str() {
            EVENT_PLAYER_STATE => {
                let state: PlayerState = payload(EVENT_PLAYER_STATE, envelope.data)?;
                state.validate().map_err(|reason| DecodeError::InvalidPayload {
                    kind: EVENT_PLAYER_STATE,
                    reason,
                })?;
                Ok(ServerEvent::PlayerState(state))
            }
            EVENT_QUEUE_UPDATE => {
                let queue: Vec<QueueEntry> = payload(EVENT_QUEUE_UPDATE, envelope.data)?;
                let current = current_count(&queue);
                if current > 1 {
                    return Err(DecodeError::InvalidPayload {
                        kind: EVENT_QUEUE_UPDATE,
                        reason: format!("{} entries marked current", current),
                    });
                }
                Ok(ServerEvent::QueueUpdate(queue))
            }
            EVENT_TRACK_ADDED => {
                let entry = match payload(EVENT_TRACK_ADDED, envelope.data)? {
                    TrackAddedPayload::Wrapped { entry } => entry,
                    TrackAddedPayload::Bare(entry) => entry,
                };
                Ok(ServerEvent::TrackAdded(entry))
            }
            EVENT_DONATION_RECEIVED => Ok(ServerEvent::DonationReceived(payload(
                EVENT_DONATION_RECEIVED,
                envelope.data,
            )?)),
            EVENT_AUTH_UPDATE => {
                let update: AuthUpdate = payload(EVENT_AUTH_UPDATE, envelope.data)?;
                if update.role == Role::Unknown {
                    return Err(DecodeError::InvalidPayload {
                        kind: EVENT_AUTH_UPDATE,
                        reason: "role must be owner or listener".to_string(),
                    });
                }
                Ok(ServerEvent::AuthUpdate(update.role))
            }
            other => Err(DecodeError::UnknownType(other.to_string())),
        }
    }

    /// Wire tag of this event
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::PlayerState(_) => EVENT_PLAYER_STATE,
            ServerEvent::QueueUpdate(_) => EVENT_QUEUE_UPDATE,
            ServerEvent::TrackAdded(_) => EVENT_TRACK_ADDED,
            ServerEvent::DonationReceived(_) => EVENT_DONATION_RECEIVED,
            ServerEvent::AuthUpdate(_) => EVENT_AUTH_UPDATE,
        }
    }

    /// Encode as a wire frame (bare `track_added` form)
    pub fn to_frame(&self) -> serde_json::Result<String> {
        let data = match self {
            ServerEvent::PlayerState(state) => serde_json::to_value(state)?,
            ServerEvent::QueueUpdate(queue) => serde_json::to_value(queue)?,
            ServerEvent::TrackAdded(entry) => serde_json::to_value(entry)?,
            ServerEvent::DonationReceived(preview) => serde_json::to_value(preview)?,
            ServerEvent::AuthUpdate(role) => serde_json::to_value(AuthUpdate { role: *role })?,
        };
        serde_json::to_string(&Frame {
            kind: self.event_type(),
            data,
        })
    }
}

#[derive(Serialize)]
struct Frame {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Value,
}

fn payload<T>(kind: &'static str, data: Value) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_player_state() {
        let frame = r#"{"type":"player_state","data":{"isPlaying":true,"isPaused":false,
            "volume":0.7,"positionSec":10,"durationSec":100,
            "current":{"id":"t1","title":"Song","url":"https://y","addedByNick":"nick"}}}"#;
        match ServerEvent::decode(frame).unwrap() {
            ServerEvent::PlayerState(st) => {
                assert!(st.is_streaming());
                assert_eq!(st.current.unwrap().title, "Song");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_auth_update() {
        let frame = r#"{"type":"auth_update","data":{"role":"owner"}}"#;
        assert_eq!(
            ServerEvent::decode(frame).unwrap(),
            ServerEvent::AuthUpdate(Role::Owner)
        );
    }

    #[test]
    fn test_decode_auth_update_rejects_unknown_role() {
        let frame = r#"{"type":"auth_update","data":{"role":"unknown"}}"#;
        assert!(matches!(
            ServerEvent::decode(frame),
            Err(DecodeError::InvalidPayload { kind: EVENT_AUTH_UPDATE, .. })
        ));

        let frame = r#"{"type":"auth_update","data":{"role":"admin"}}"#;
        assert!(ServerEvent::decode(frame).is_err());
    }

    #[test]
    fn test_decode_track_added_both_shapes() {
        let bare = r#"{"type":"track_added","data":{"id":"q9","title":"T","url":"u","isDonation":true}}"#;
        let wrapped = r#"{"type":"track_added","data":{"entry":{"id":"q9","title":"T","url":"u","isDonation":true}}}"#;

        let a = ServerEvent::decode(bare).unwrap();
        let b = ServerEvent::decode(wrapped).unwrap();
        assert_eq!(a, b);
        match a {
            ServerEvent::TrackAdded(entry) => {
                assert_eq!(entry.id, "q9");
                assert!(entry.is_donation);
                assert_eq!(entry.status, QueueEntryStatus::Next);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_donation() {
        let frame = r#"{"type":"donation_received","data":{"donorNick":"alice","message":"gg"}}"#;
        match ServerEvent::decode(frame).unwrap() {
            ServerEvent::DonationReceived(p) => {
                assert_eq!(p.donor_nick, "alice");
                assert_eq!(p.message, "gg");
                assert!(p.track_locator.is_none());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_decode_queue_update_rejects_two_current() {
        let frame = r#"{"type":"queue_update","data":[
            {"id":"a","title":"A","url":"u","status":"current"},
            {"id":"b","title":"B","url":"u","status":"current"}]}"#;
        assert!(matches!(
            ServerEvent::decode(frame),
            Err(DecodeError::InvalidPayload { kind: EVENT_QUEUE_UPDATE, .. })
        ));
    }

    #[test]
    fn test_decode_empty_queue_update() {
        let frame = r#"{"type":"queue_update","data":[]}"#;
        assert_eq!(
            ServerEvent::decode(frame).unwrap(),
            ServerEvent::QueueUpdate(Vec::new())
        );
    }

    #[test]
    fn test_decode_rejections() {
        assert!(matches!(ServerEvent::decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(ServerEvent::decode("[1,2]"), Err(DecodeError::Malformed(_))));
        assert!(matches!(ServerEvent::decode(r#"{"data":{}}"#), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"chat","data":{}}"#),
            Err(DecodeError::UnknownType(t)) if t == "chat"
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"player_state"}"#),
            Err(DecodeError::InvalidPayload { kind: EVENT_PLAYER_STATE, .. })
        ));
        assert!(matches!(
            ServerEvent::decode(r#"{"type":"player_state","data":{"isPlaying":true,"isPaused":false,"volume":3,"positionSec":0,"durationSec":0}}"#),
            Err(DecodeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_to_frame_decodes_back() {
        let event = ServerEvent::DonationReceived(DonationPreview {
            donor_nick: "bob".to_string(),
            message: "hi".to_string(),
            track_locator: Some("https://t".to_string()),
            amount: None,
        });
        let frame = event.to_frame().unwrap();
        assert_eq!(ServerEvent::decode(&frame).unwrap(), event);
    }
}
