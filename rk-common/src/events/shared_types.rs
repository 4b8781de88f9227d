//! Shared type definitions for event data
//!
//! Role and donation payloads plus serde helpers used by several events.

use serde::{Deserialize, Deserializer, Serialize};

/// Role the server asserts for this client
///
/// Starts as `Unknown` and only changes on an `auth_update` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Unknown,
    Owner,
    Listener,
}

impl Role {
    /// Control affordances are enabled once the server asserted any role
    pub fn controls_enabled(&self) -> bool {
        !matches!(self, Role::Unknown)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Unknown => write!(f, "unknown"),
            Role::Owner => write!(f, "owner"),
            Role::Listener => write!(f, "listener"),
        }
    }
}

/// Donation announced by the server
///
/// Shown for a fixed window, then cleared locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationPreview {
    pub donor_nick: String,
    pub message: String,
    /// Track link extracted from the donation message
    #[serde(
        rename = "trackUrl",
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub track_locator: Option<String>,
    /// Donated amount, display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// `auth_update` payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct AuthUpdate {
    pub role: Role,
}

/// Deserialize an optional string, mapping `""` to `None`
pub(crate) fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}
