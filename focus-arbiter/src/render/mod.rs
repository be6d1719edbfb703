//! Rendering subsystem interface
//!
//! Decoding and output belong to an external rendering subsystem. The focus
//! core only drives it through the [`Renderer`] trait and learns about
//! natural end-of-track through a [`CompletionNotifier`].

pub mod simulated;

pub use simulated::SimulatedRenderer;

use crate::error::Result;
use focus_common::SessionId;
use std::sync::Arc;

/// Operations the focus core needs from the rendering subsystem
///
/// All calls are keyed by session id. Implementations must tolerate calls
/// for sessions they have never seen (treat as no-ops, `is_rendering` false).
pub trait Renderer: Send + Sync {
    /// Begin or resume rendering. Fails if the resource cannot be acquired.
    fn start_rendering(&self, session: SessionId) -> Result<()>;

    /// Pause rendering, keeping position
    fn pause_rendering(&self, session: SessionId);

    /// Stop rendering and rewind
    fn stop_rendering(&self, session: SessionId);

    /// Per-channel volume, each in 0.0..=1.0
    fn set_channel_volume(&self, session: SessionId, left: f32, right: f32);

    fn is_rendering(&self, session: SessionId) -> bool;

    /// A looping track never reports completion
    fn set_looping(&self, session: SessionId, looping: bool);

    /// Free all rendering resources held for the session
    fn release(&self, session: SessionId);

    /// Register where end-of-track is reported for `notifier.session()`
    fn attach_completion(&self, notifier: CompletionNotifier);
}

/// Handle the rendering subsystem uses to report end-of-track
///
/// Cloneable and cheap; notifying after the session is released is harmless.
#[derive(Clone)]
pub struct CompletionNotifier {
    session: SessionId,
    notify: Arc<dyn Fn() + Send + Sync>,
}

impl CompletionNotifier {
    pub fn new(session: SessionId, notify: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            session,
            notify: Arc::new(notify),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Report that rendering reached its natural end
    pub fn notify(&self) {
        (self.notify)();
    }
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("session", &self.session)
            .finish()
    }
}
