//! Error types for focus-arbiter
//!
//! Contract violations that must never crash (late notifications, double
//! release, unknown-session abandons) are not represented here; they are
//! logged and ignored where they are detected.

use focus_common::SessionId;
use thiserror::Error;

/// Main error type for the focus-arbiter crate
#[derive(Error, Debug)]
pub enum Error {
    /// Session already has a request outstanding and must abandon first
    #[error("Session {0} already has an outstanding focus request")]
    RequestOutstanding(SessionId),

    /// Requester is not registered with the arbiter
    #[error("Focus denied for session {0}: not registered")]
    FocusDenied(SessionId),

    /// Rendering resource could not be started
    #[error("Rendering resource for session {session} failed to start: {reason}")]
    ResourceAcquisition { session: SessionId, reason: String },

    /// Lifecycle call on a session that has been released
    #[error("Session {0} has been released")]
    Released(SessionId),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Rendering subsystem errors
    #[error("Render error: {0}")]
    Render(String),
}

/// Convenience Result type using focus-arbiter Error
pub type Result<T> = std::result::Result<T, Error>;
