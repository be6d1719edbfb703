//! In-memory rendering subsystem
//!
//! Tracks per-session rendering state without touching an audio device.
//! Used by the demo binary and by tests; supports start-failure injection
//! and manual end-of-track.

use super::{CompletionNotifier, Renderer};
use crate::error::{Error, Result};
use focus_common::SessionId;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Rendering state for one session
#[derive(Debug, Clone)]
struct Track {
    rendering: bool,
    volume: (f32, f32),
    looping: bool,
    released: bool,
    start_count: u32,
    notifier: Option<CompletionNotifier>,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            rendering: false,
            volume: (1.0, 1.0),
            looping: false,
            released: false,
            start_count: 0,
            notifier: None,
        }
    }
}

/// Simulated renderer
#[derive(Debug, Default)]
pub struct SimulatedRenderer {
    tracks: Mutex<HashMap<SessionId, Track>>,
    fail_next_start: Mutex<HashSet<SessionId>>,
}

impl SimulatedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracks(&self) -> MutexGuard<'_, HashMap<SessionId, Track>> {
        self.tracks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `start_rendering` for `session` fail
    pub fn fail_next_start(&self, session: SessionId) {
        self.fail_next_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session);
    }

    /// Current channel volumes, if the session is known
    pub fn volume(&self, session: SessionId) -> Option<(f32, f32)> {
        self.tracks().get(&session).map(|t| t.volume)
    }

    pub fn is_released(&self, session: SessionId) -> bool {
        self.tracks().get(&session).is_some_and(|t| t.released)
    }

    /// Number of successful `start_rendering` calls
    pub fn start_count(&self, session: SessionId) -> u32 {
        self.tracks().get(&session).map_or(0, |t| t.start_count)
    }

    /// Simulate end-of-track
    ///
    /// Returns true if a completion was reported. Looping, idle and released
    /// tracks never complete.
    pub fn complete(&self, session: SessionId) -> bool {
        let notifier = {
            let mut tracks = self.tracks();
            let Some(track) = tracks.get_mut(&session) else {
                return false;
            };
            if track.looping || track.released || !track.rendering {
                return false;
            }
            track.rendering = false;
            track.notifier.clone()
        };

        // Notify outside the lock; the session may call back into us
        match notifier {
            Some(notifier) => {
                debug!("Simulated end-of-track for session {}", session);
                notifier.notify();
                true
            }
            None => false,
        }
    }
}

impl Renderer for SimulatedRenderer {
    fn start_rendering(&self, session: SessionId) -> Result<()> {
        let injected = self
            .fail_next_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
        if injected {
            return Err(Error::Render("injected start failure".to_string()));
        }

        let mut tracks = self.tracks();
        let track = tracks.entry(session).or_default();
        if track.released {
            return Err(Error::Render(format!(
                "rendering resources for session {} already released",
                session
            )));
        }
        if !track.rendering {
            track.rendering = true;
            track.start_count += 1;
        }
        Ok(())
    }

    fn pause_rendering(&self, session: SessionId) {
        if let Some(track) = self.tracks().get_mut(&session) {
            track.rendering = false;
        }
    }

    fn stop_rendering(&self, session: SessionId) {
        if let Some(track) = self.tracks().get_mut(&session) {
            track.rendering = false;
        }
    }

    fn set_channel_volume(&self, session: SessionId, left: f32, right: f32) {
        let mut tracks = self.tracks();
        let track = tracks.entry(session).or_default();
        track.volume = (left.clamp(0.0, 1.0), right.clamp(0.0, 1.0));
    }

    fn is_rendering(&self, session: SessionId) -> bool {
        self.tracks().get(&session).is_some_and(|t| t.rendering)
    }

    fn set_looping(&self, session: SessionId, looping: bool) {
        self.tracks().entry(session).or_default().looping = looping;
    }

    fn release(&self, session: SessionId) {
        let mut tracks = self.tracks();
        let track = tracks.entry(session).or_default();
        track.rendering = false;
        track.released = true;
        track.notifier = None;
    }

    fn attach_completion(&self, notifier: CompletionNotifier) {
        let session = notifier.session();
        self.tracks().entry(session).or_default().notifier = Some(notifier);
    }
}
