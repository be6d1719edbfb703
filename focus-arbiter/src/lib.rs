//! # Audio Focus Arbiter (focus-arbiter)
//!
//! In-process arbitration of a single shared audio output between
//! independent playback sessions.
//!
//! **Purpose:** Grant output rights to one session at a time, notify
//! displaced sessions how to yield (pause, duck or stop), and restore the
//! most recently displaced session when the holder gives up focus.
//!
//! **Architecture:** A [`FocusArbiter`] commits every transition under one
//! lock and enqueues notifications into per-session inboxes. Each
//! [`PlaybackSession`] drains its inbox on its own task through a pure
//! [`ReactionPolicy`](session::ReactionPolicy) and drives the external
//! rendering subsystem through the [`Renderer`](render::Renderer) trait.

pub mod error;
pub mod focus;
pub mod render;
pub mod session;
pub mod state;

pub use error::{Error, Result};
pub use focus::{FocusArbiter, FocusRequest, FocusResponse, FocusSnapshot};
pub use session::{PlaybackSession, SessionOptions};
pub use state::AppContext;
