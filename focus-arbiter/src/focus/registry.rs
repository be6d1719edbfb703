//! Non-owning handle table of registered sessions
//!
//! The arbiter never holds a session; it holds the session's listener and a
//! shared [`Liveness`] record. Unregistering revokes the record, so any
//! notification still queued for the session is recognised as dead on
//! arrival instead of acting on a torn-down session.

use focus_common::{FocusChange, FocusState, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Notification dispatched by the arbiter to one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub session: SessionId,
    pub change: FocusChange,
    /// Recipient's epoch when the arbiter committed the transition
    pub epoch: u64,
}

/// Receiving end of arbiter notifications
///
/// `deliver` runs while the arbiter's lock is held. It must only enqueue
/// (never block or call back into the arbiter); the reaction itself runs
/// later on the session's own task, in delivery order.
pub trait FocusListener: Send + Sync {
    fn deliver(&self, notification: Notification);
}

/// Liveness flag plus epoch, shared between the arbiter and one session
///
/// The epoch advances whenever the session abandons, making notifications
/// dispatched before the abandon stale.
#[derive(Debug)]
pub struct Liveness {
    alive: AtomicBool,
    epoch: AtomicU64,
}

impl Liveness {
    fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// True if a notification stamped with `epoch` may still be acted on
    pub fn is_current(&self, epoch: u64) -> bool {
        self.is_alive() && self.epoch() == epoch
    }

    pub(crate) fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn revoke(&self) {
        self.alive.store(false, Ordering::Release);
        self.advance();
    }
}

/// What a session gets back from registering
#[derive(Debug, Clone)]
pub struct Registration {
    pub session: SessionId,
    pub liveness: Arc<Liveness>,
}

/// One row of the handle table
pub(crate) struct Entry {
    pub label: String,
    pub listener: Arc<dyn FocusListener>,
    pub liveness: Arc<Liveness>,
    /// Arbiter's view of the session's focus state
    pub state: FocusState,
}

/// Handle table keyed by session id
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<SessionId, Entry>,
}

impl Registry {
    pub fn insert(&mut self, label: String, listener: Arc<dyn FocusListener>) -> Registration {
        let session = SessionId::new();
        let liveness = Arc::new(Liveness::new());
        self.entries.insert(
            session,
            Entry {
                label,
                listener,
                liveness: Arc::clone(&liveness),
                state: FocusState::Idle,
            },
        );
        Registration { session, liveness }
    }

    pub fn get_mut(&mut self, session: SessionId) -> Option<&mut Entry> {
        self.entries.get_mut(&session)
    }

    pub fn contains(&self, session: SessionId) -> bool {
        self.entries.contains_key(&session)
    }

    /// Remove the row and revoke its liveness
    pub fn remove(&mut self, session: SessionId) -> Option<Entry> {
        let entry = self.entries.remove(&session)?;
        entry.liveness.revoke();
        Some(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &Entry)> {
        self.entries.iter()
    }
}
