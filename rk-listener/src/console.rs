//! Console front end
//!
//! Line commands on stdin, status lines on stdout.

use crate::error::{Error, Result};
use crate::session::{ListenerSession, UserAction};
use crate::state::{AppSnapshot, ConnectionStatus, NoticeId, NoticeKind, StateChange};
use std::collections::HashSet;
use std::str::FromStr;

pub const HELP: &str = "commands: login <user> <pass> | logout | play | pause | next | prev | \
vol <0..1> | add <url> | listen | dismiss [id] | status | help | quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Action(UserAction),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(Error::Command("empty line".to_string()));
        };
        let args: Vec<&str> = words.collect();

        let action = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("login", [user, pass]) => UserAction::Login {
                username: user.to_string(),
                password: pass.to_string(),
            },
            ("login", _) => return Err(Error::Command("usage: login <user> <pass>".to_string())),
            ("logout", []) => UserAction::Logout,
            ("play", []) => UserAction::Play,
            ("pause", []) => UserAction::Pause,
            ("next", []) => UserAction::Next,
            ("prev", []) => UserAction::Prev,
            ("vol" | "volume", [value]) => {
                let volume: f32 = value
                    .parse()
                    .map_err(|_| Error::Command(format!("not a volume: {}", value)))?;
                if !volume.is_finite() {
                    return Err(Error::Command(format!("not a volume: {}", value)));
                }
                UserAction::SetVolume(volume)
            }
            ("add", [url]) => UserAction::AddTrack(url.to_string()),
            ("listen", []) => UserAction::Listen,
            ("dismiss", []) => UserAction::Dismiss(None),
            ("dismiss", [id]) => UserAction::Dismiss(Some(id.to_string())),
            ("status", []) => return Ok(Command::Status),
            ("help" | "?", []) => return Ok(Command::Help),
            ("quit" | "exit", []) => return Ok(Command::Quit),
            (other, _) => return Err(Error::Command(format!("{} (try 'help')", other))),
        };
        Ok(Command::Action(action))
    }
}

/// `mm:ss`
pub fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Full status line for the `status` command
pub fn render_status(session: &ListenerSession) -> String {
    let snapshot = session.snapshot();
    let mut line = format!("[{}] role={}", snapshot.connection, snapshot.role);

    match snapshot.player.as_ref() {
        Some(player) => {
            let title = player.current.as_ref().map_or("-", |c| c.title.as_str());
            line.push_str(&format!(
                " {} {} {} / {}",
                player.state_label(),
                title,
                format_time(session.displayed_position()),
                format_time(player.duration_sec)
            ));
            if let Some(nick) = player.current.as_ref().and_then(|c| c.attribution.as_deref()) {
                line.push_str(&format!(" (added by {})", nick));
            }
        }
        None => line.push_str(" no player state"),
    }

    line.push_str(&format!(
        " vol {}% queue {}",
        (session.local_volume() * 100.0).round() as u32,
        snapshot.queue.len()
    ));
    if !snapshot.controls_enabled() {
        line.push_str(" [controls disabled]");
    }
    if session.awaiting_gesture() {
        line.push_str(" (type 'listen' to start audio)");
    }
    line
}

/// Turns store changes into console lines
///
/// Remembers which notices were already printed so each is shown once.
#[derive(Debug, Default)]
pub struct ChangePrinter {
    shown: HashSet<NoticeId>,
}

impl ChangePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&mut self, change: StateChange, snapshot: &AppSnapshot) -> Vec<String> {
        match change {
            StateChange::Connection => vec![match snapshot.connection {
                ConnectionStatus::Connected => "channel connected".to_string(),
                ConnectionStatus::Disconnected => "channel disconnected".to_string(),
            }],
            StateChange::Role => vec![format!("role: {}", snapshot.role)],
            StateChange::Credential => vec![],
            StateChange::Player => snapshot
                .player
                .as_ref()
                .map(|p| {
                    let title = p.current.as_ref().map_or("-", |c| c.title.as_str());
                    vec![format!("{} {}", p.state_label(), title)]
                })
                .unwrap_or_default(),
            StateChange::QueueReplaced => vec![format!("queue: {} entries", snapshot.queue.len())],
            StateChange::QueueAppended => snapshot
                .queue
                .last()
                .map(|e| vec![format!("queue: + {}", e.title)])
                .unwrap_or_default(),
            StateChange::DonationPreview => snapshot
                .donation_preview
                .as_ref()
                .map(|d| {
                    let mut line = format!("donation from {}", d.donor_nick);
                    if let Some(amount) = d.amount {
                        line.push_str(&format!(" ({})", amount));
                    }
                    if !d.message.is_empty() {
                        line.push_str(&format!(": {}", d.message));
                    }
                    vec![line]
                })
                .unwrap_or_default(),
            StateChange::Notices => {
                self.shown
                    .retain(|id| snapshot.notices.iter().any(|n| n.id == *id));
                snapshot
                    .notices
                    .iter()
                    .filter(|n| self.shown.insert(n.id))
                    .map(|n| {
                        let kind = match n.kind {
                            NoticeKind::Info => "info",
                            NoticeKind::Success => "ok",
                            NoticeKind::Error => "error",
                        };
                        match n.message.as_deref() {
                            Some(message) => {
                                format!("[{} {}] {}: {}", kind, n.id.short(), n.title, message)
                            }
                            None => format!("[{} {}] {}", kind, n.id.short(), n.title),
                        }
                    })
                    .collect()
            }
        }
    }
}
