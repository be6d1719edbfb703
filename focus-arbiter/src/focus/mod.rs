//! Focus arbitration
//!
//! A single [`FocusArbiter`] per application context holds the current
//! grant, the stack of displaced sessions and a non-owning handle table of
//! registered sessions. Sessions talk to it through [`FocusRequest`]s and
//! receive [`Notification`]s through their [`FocusListener`].

pub mod arbiter;
pub mod registry;
pub mod request;

pub use arbiter::{FocusArbiter, FocusSnapshot, SessionView};
pub use registry::{FocusListener, Liveness, Notification, Registration};
pub use request::{FocusRequest, FocusResponse};
