//! Focus request values

use focus_common::{DurationHint, SessionId};
use serde::{Deserialize, Serialize};

/// A session's demand for output rights
///
/// Immutable once built. A session may have only one request outstanding;
/// it must abandon before requesting again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusRequest {
    session: SessionId,
    hint: DurationHint,
}

impl FocusRequest {
    pub fn new(session: SessionId, hint: DurationHint) -> Self {
        Self { session, hint }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn hint(&self) -> DurationHint {
        self.hint
    }
}

/// Arbiter answer to a [`FocusRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusResponse {
    Granted,
    /// Only for requesters unknown to the arbiter; there is no priority-based denial
    Denied,
}

impl FocusResponse {
    pub fn is_granted(self) -> bool {
        self == FocusResponse::Granted
    }
}
