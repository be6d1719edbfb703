//! Application context
//!
//! One per application. Owns the arbiter, the event bus and the rendering
//! subsystem handle, and injects them into every session it creates.

use crate::focus::{FocusArbiter, FocusSnapshot};
use crate::render::Renderer;
use crate::session::{PlaybackSession, SessionOptions};
use focus_common::config::FocusConfig;
use focus_common::events::{EventBus, FocusEvent};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Shared application context
///
/// Cheap to clone; clones share the same arbiter and renderer.
#[derive(Clone)]
pub struct AppContext {
    arbiter: FocusArbiter,
    renderer: Arc<dyn Renderer>,
    config: Arc<FocusConfig>,
}

impl AppContext {
    /// Create the context and its arbiter
    pub fn new(config: FocusConfig, renderer: Arc<dyn Renderer>) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        info!(
            "Focus context ready (duck factor {}, event bus capacity {})",
            config.duck_factor, config.event_bus_capacity
        );
        Self {
            arbiter: FocusArbiter::new(event_bus),
            renderer,
            config: Arc::new(config),
        }
    }

    pub fn arbiter(&self) -> &FocusArbiter {
        &self.arbiter
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        self.arbiter.event_bus()
    }

    /// Subscribe to focus events
    pub fn subscribe_events(&self) -> broadcast::Receiver<FocusEvent> {
        self.arbiter.event_bus().subscribe()
    }

    /// Register and spawn a new playback session
    pub async fn create_session(&self, options: SessionOptions) -> PlaybackSession {
        PlaybackSession::spawn(
            self.arbiter.clone(),
            Arc::clone(&self.renderer),
            self.config.duck_factor,
            options,
        )
        .await
    }

    pub async fn snapshot(&self) -> FocusSnapshot {
        self.arbiter.snapshot().await
    }
}
