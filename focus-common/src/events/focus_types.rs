//! Focus-related type definitions
//!
//! Supporting types for session identity, focus requests and the
//! per-session focus state machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque session identity, stable for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form keeps log lines readable
        let full = self.0.simple().to_string();
        write!(f, "{}", &full[..8])
    }
}

/// Granted-duration category a session asks for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DurationHint {
    /// Long-running playback; the displaced holder loses focus outright
    Exclusive,
    /// Short playback; the displaced holder should pause
    Transient,
    /// Short playback; the displaced holder may keep playing at reduced volume
    TransientMayDuck,
}

impl DurationHint {
    /// Notification the displaced holder receives when a request with this
    /// hint wins the grant. The loser reacts to the winner's category.
    pub fn loss_for_displaced(self) -> FocusChange {
        match self {
            DurationHint::Exclusive => FocusChange::Loss,
            DurationHint::Transient => FocusChange::LossTransient,
            DurationHint::TransientMayDuck => FocusChange::LossTransientCanDuck,
        }
    }
}

impl std::fmt::Display for DurationHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationHint::Exclusive => write!(f, "EXCLUSIVE"),
            DurationHint::Transient => write!(f, "TRANSIENT"),
            DurationHint::TransientMayDuck => write!(f, "TRANSIENT_MAY_DUCK"),
        }
    }
}

impl std::str::FromStr for DurationHint {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "exclusive" => Ok(DurationHint::Exclusive),
            "transient" => Ok(DurationHint::Transient),
            "transient-may-duck" => Ok(DurationHint::TransientMayDuck),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown duration hint '{}'",
                other
            ))),
        }
    }
}

/// Notification kinds dispatched by the arbiter to a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusChange {
    /// The session's own request was granted
    Granted,
    /// Focus restored after a displacement
    Gain,
    /// Displaced by an exclusive request
    Loss,
    /// Displaced by a transient request
    LossTransient,
    /// Displaced by a transient request that allows ducking
    LossTransientCanDuck,
}

impl FocusChange {
    /// State the session ends up in after reacting to this change
    pub fn resulting_state(self) -> FocusState {
        match self {
            FocusChange::Granted | FocusChange::Gain => FocusState::Holding,
            FocusChange::Loss => FocusState::PausedLost,
            FocusChange::LossTransient => FocusState::PausedTransient,
            FocusChange::LossTransientCanDuck => FocusState::Ducked,
        }
    }
}

impl std::fmt::Display for FocusChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusChange::Granted => write!(f, "GRANTED"),
            FocusChange::Gain => write!(f, "GAIN"),
            FocusChange::Loss => write!(f, "LOSS"),
            FocusChange::LossTransient => write!(f, "LOSS_TRANSIENT"),
            FocusChange::LossTransientCanDuck => write!(f, "LOSS_TRANSIENT_CAN_DUCK"),
        }
    }
}

/// Local focus state of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FocusState {
    /// Holds exclusive rendering rights
    Holding,
    /// Displaced but still rendering at reduced volume
    Ducked,
    /// Paused by a transient displacement
    PausedTransient,
    /// Paused by an exclusive displacement
    PausedLost,
    /// No outstanding request
    #[default]
    Idle,
}

impl FocusState {
    /// True for the states a session can be in while sitting on the displaced stack
    pub fn is_displaced(self) -> bool {
        matches!(
            self,
            FocusState::Ducked | FocusState::PausedTransient | FocusState::PausedLost
        )
    }
}

impl std::fmt::Display for FocusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FocusState::Holding => write!(f, "HOLDING"),
            FocusState::Ducked => write!(f, "DUCKED"),
            FocusState::PausedTransient => write!(f, "PAUSED_TRANSIENT"),
            FocusState::PausedLost => write!(f, "PAUSED_LOST"),
            FocusState::Idle => write!(f, "IDLE"),
        }
    }
}
