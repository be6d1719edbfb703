//! Shared helpers for focus-arbiter integration tests
//!
//! - Harness: application context wired to a simulated renderer
//! - RecordingListener: raw arbiter listener that keeps every notification
//! - Event helpers for draining and filtering the focus event bus

#![allow(dead_code)]

use focus_arbiter::focus::{FocusListener, Notification};
use focus_arbiter::render::SimulatedRenderer;
use focus_arbiter::{AppContext, PlaybackSession, SessionOptions};
use focus_common::config::FocusConfig;
use focus_common::{DurationHint, FocusEvent, SessionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Application context plus direct access to the simulated renderer
pub struct Harness {
    pub context: AppContext,
    pub renderer: Arc<SimulatedRenderer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(FocusConfig {
            event_bus_capacity: 4096,
            ..FocusConfig::default()
        })
    }

    pub fn with_config(config: FocusConfig) -> Self {
        let renderer = Arc::new(SimulatedRenderer::new());
        let context = AppContext::new(config, renderer.clone());
        Self { context, renderer }
    }

    pub async fn session(&self, label: &str, hint: DurationHint) -> PlaybackSession {
        self.context
            .create_session(SessionOptions::new(label, hint))
            .await
    }

    pub fn events(&self) -> broadcast::Receiver<FocusEvent> {
        self.context.subscribe_events()
    }
}

/// Let every listed session react to everything queued so far
///
/// Two rounds: a reaction in one session (e.g. an abandon on completion)
/// can enqueue a notification for another.
pub async fn settle(sessions: &[&PlaybackSession]) {
    for _ in 0..2 {
        for session in sessions {
            session.sync().await;
        }
    }
}

/// Everything currently buffered on the receiver
pub fn drain(events: &mut broadcast::Receiver<FocusEvent>) -> Vec<FocusEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Events concerning one session, in emission order
pub fn events_for(events: &[FocusEvent], session: SessionId) -> Vec<FocusEvent> {
    events
        .iter()
        .filter(|e| e.session() == session)
        .cloned()
        .collect()
}

/// Wait (bounded) for the first event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<FocusEvent>,
    timeout: Duration,
    predicate: F,
) -> Option<FocusEvent>
where
    F: Fn(&FocusEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Listener that records notifications instead of reacting to them
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<Notification>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

impl FocusListener for RecordingListener {
    fn deliver(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}
