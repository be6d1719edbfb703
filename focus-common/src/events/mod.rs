//! Event types for the focus event system
//!
//! Provides shared focus vocabulary, the FocusEvent enum and the EventBus.

// Sub-modules (supporting types)
mod focus_types;

pub use focus_types::{DurationHint, FocusChange, FocusState, SessionId};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a notification was dropped instead of reaching a session's policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Session was unregistered before the notification was handled
    Unregistered,
    /// Session abandoned (or re-requested) after the notification was dispatched
    Superseded,
    /// Notification does not apply to the session's current state
    NotApplicable,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::Unregistered => write!(f, "unregistered"),
            DropReason::Superseded => write!(f, "superseded"),
            DropReason::NotApplicable => write!(f, "not applicable"),
        }
    }
}

/// Focus event types
///
/// Events are broadcast via EventBus and can be serialized for external
/// observers (the demo binary prints them as JSON lines).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FocusEvent {
    /// A session registered with the arbiter
    SessionRegistered {
        session: SessionId,
        label: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A request was granted and the requester became holder
    FocusGranted {
        session: SessionId,
        hint: DurationHint,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The arbiter dispatched a notification to a session
    ///
    /// Emitted for every notification, including the grant itself.
    FocusChanged {
        session: SessionId,
        change: FocusChange,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session abandoned its request
    FocusAbandoned {
        session: SessionId,
        /// Session promoted from the displaced stack, if any
        restored: Option<SessionId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was removed from the arbiter's handle table
    SessionUnregistered {
        session: SessionId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session's reaction policy changed local state
    ReactionApplied {
        session: SessionId,
        from: FocusState,
        to: FocusState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A notification reached a session but was not acted on
    NotificationDropped {
        session: SessionId,
        change: FocusChange,
        reason: DropReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl FocusEvent {
    /// Session the event is about
    pub fn session(&self) -> SessionId {
        match self {
            FocusEvent::SessionRegistered { session, .. }
            | FocusEvent::FocusGranted { session, .. }
            | FocusEvent::FocusChanged { session, .. }
            | FocusEvent::FocusAbandoned { session, .. }
            | FocusEvent::SessionUnregistered { session, .. }
            | FocusEvent::ReactionApplied { session, .. }
            | FocusEvent::NotificationDropped { session, .. } => *session,
        }
    }

    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            FocusEvent::SessionRegistered { .. } => "SessionRegistered",
            FocusEvent::FocusGranted { .. } => "FocusGranted",
            FocusEvent::FocusChanged { .. } => "FocusChanged",
            FocusEvent::FocusAbandoned { .. } => "FocusAbandoned",
            FocusEvent::SessionUnregistered { .. } => "SessionUnregistered",
            FocusEvent::ReactionApplied { .. } => "ReactionApplied",
            FocusEvent::NotificationDropped { .. } => "NotificationDropped",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central distribution bus for focus events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block the arbiter)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use focus_common::events::{EventBus, FocusEvent, SessionId};
///
/// let event_bus = EventBus::new(64);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(FocusEvent::SessionUnregistered {
///     session: SessionId::new(),
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<FocusEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Older events are dropped for subscribers that fall more than
    /// `capacity` events behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<FocusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: FocusEvent,
    ) -> Result<usize, broadcast::error::SendError<FocusEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: FocusEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
