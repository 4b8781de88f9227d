//! Shared state store
//!
//! Single mutable structure holding connection status, role, credential,
//! player state, queue, donation preview and notices. Owned by the session
//! and passed explicitly to the router, connection manager and reconciler.
//!
//! Every mutation replaces one top-level field and then notifies observers
//! synchronously with the complete new snapshot. All access happens on the
//! session loop, so no locking is involved.

use rk_common::events::{DonationPreview, PlayerState, QueueEntry, Role};
use uuid::Uuid;

/// Real-time channel status as last observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connected => write!(f, "connected"),
        }
    }
}

/// Opaque bearer credential, held in memory only
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential(***)")
    }
}

/// Notice identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoticeId(Uuid);

impl NoticeId {
    /// Short form for display and console dismissal
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl NoticeKind {
    /// Info and success notices expire on their own; errors wait for dismissal
    pub fn is_transient(&self) -> bool {
        !matches!(self, NoticeKind::Error)
    }
}

/// User-visible notice
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: NoticeId,
    pub kind: NoticeKind,
    pub title: String,
    pub message: Option<String>,
}

/// Complete store contents at one point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSnapshot {
    pub connection: ConnectionStatus,
    pub role: Role,
    pub credential: Option<Credential>,
    /// None until the first state arrives
    pub player: Option<PlayerState>,
    pub queue: Vec<QueueEntry>,
    pub donation_preview: Option<DonationPreview>,
    pub notices: Vec<Notice>,
}

impl AppSnapshot {
    /// Control affordances are enabled once the server asserted a role
    pub fn controls_enabled(&self) -> bool {
        self.role.controls_enabled()
    }
}

/// Which top-level field a mutation replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Connection,
    Role,
    Credential,
    Player,
    QueueReplaced,
    QueueAppended,
    DonationPreview,
    Notices,
}

/// Synchronous store observer
pub type Observer = Box<dyn FnMut(StateChange, &AppSnapshot)>;

/// Shared state store
pub struct Store {
    snapshot: AppSnapshot,
    donation_seq: u64,
    observers: Vec<Observer>,
    changes: Vec<StateChange>,
}

impl Store {
    /// Create a store with initial values
    pub fn new() -> Self {
        Self {
            snapshot: AppSnapshot::default(),
            donation_seq: 0,
            observers: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &AppSnapshot {
        &self.snapshot
    }

    /// Register an observer called after every mutation
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    /// Drain the changes recorded since the last call
    pub fn take_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn set_connection_status(&mut self, status: ConnectionStatus) {
        self.snapshot.connection = status;
        self.commit(StateChange::Connection);
    }

    pub fn set_role(&mut self, role: Role) {
        self.snapshot.role = role;
        self.commit(StateChange::Role);
    }

    /// Store or clear the bearer credential
    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.snapshot.credential = credential;
        self.commit(StateChange::Credential);
    }

    /// Replace player state wholesale
    pub fn set_player_state(&mut self, state: PlayerState) {
        self.snapshot.player = Some(state);
        self.commit(StateChange::Player);
    }

    /// Replace the queue with a full snapshot
    pub fn replace_queue(&mut self, queue: Vec<QueueEntry>) {
        self.snapshot.queue = queue;
        self.commit(StateChange::QueueReplaced);
    }

    /// Append one entry to the end of the queue, without id deduplication
    pub fn append_queue(&mut self, entry: QueueEntry) {
        let mut queue = std::mem::take(&mut self.snapshot.queue);
        queue.push(entry);
        self.snapshot.queue = queue;
        self.commit(StateChange::QueueAppended);
    }

    /// Show a donation preview, returning its sequence number for expiry
    pub fn show_donation_preview(&mut self, preview: DonationPreview) -> u64 {
        self.donation_seq += 1;
        self.snapshot.donation_preview = Some(preview);
        self.commit(StateChange::DonationPreview);
        self.donation_seq
    }

    /// Clear the donation preview (manual dismissal)
    pub fn clear_donation_preview(&mut self) -> bool {
        if self.snapshot.donation_preview.is_none() {
            return false;
        }
        self.snapshot.donation_preview = None;
        self.commit(StateChange::DonationPreview);
        true
    }

    /// Clear the preview only if `seq` is still the one on display
    pub fn expire_donation_preview(&mut self, seq: u64) -> bool {
        if seq != self.donation_seq {
            return false;
        }
        self.clear_donation_preview()
    }

    /// Add a notice
    pub fn push_notice(
        &mut self,
        kind: NoticeKind,
        title: impl Into<String>,
        message: Option<String>,
    ) -> NoticeId {
        let id = NoticeId(Uuid::new_v4());
        let mut notices = std::mem::take(&mut self.snapshot.notices);
        notices.push(Notice {
            id,
            kind,
            title: title.into(),
            message,
        });
        self.snapshot.notices = notices;
        self.commit(StateChange::Notices);
        id
    }

    /// Remove a notice; unknown ids are a no-op
    pub fn dismiss_notice(&mut self, id: NoticeId) -> bool {
        if !self.snapshot.notices.iter().any(|n| n.id == id) {
            return false;
        }
        let notices = std::mem::take(&mut self.snapshot.notices)
            .into_iter()
            .filter(|n| n.id != id)
            .collect();
        self.snapshot.notices = notices;
        self.commit(StateChange::Notices);
        true
    }

    fn commit(&mut self, change: StateChange) {
        self.changes.push(change);
        for observer in self.observers.iter_mut() {
            observer(change, &self.snapshot);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
