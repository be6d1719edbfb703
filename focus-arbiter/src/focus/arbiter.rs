//! Focus arbiter
//!
//! Process-wide authority over the single shared output. All transitions
//! (`request_focus`, `abandon`, `unregister`) run under one lock, so no two
//! transitions interleave. Notifications are enqueued to the affected
//! sessions' listeners before the lock is released, which keeps each
//! session's delivery order equal to commit order; the reactions run later
//! on the sessions' own tasks.
//!
//! # Grant policy
//!
//! Every request from a registered session is granted. The newest request
//! always wins and the incumbent is displaced; there is no priority
//! comparison and no denial. The displaced holder's notification is keyed
//! to the *winner's* duration hint:
//!
//! - `EXCLUSIVE` → `LOSS`
//! - `TRANSIENT` → `LOSS_TRANSIENT`
//! - `TRANSIENT_MAY_DUCK` → `LOSS_TRANSIENT_CAN_DUCK`
//!
//! Transiently displaced sessions (paused or ducked) go on a
//! most-recent-first stack. When the holder abandons, the top of the stack
//! is promoted and receives `GAIN`. A `LOSS` is definitive: that session is
//! not kept for restoration and must request again.

use super::registry::{FocusListener, Notification, Registration, Registry};
use super::request::{FocusRequest, FocusResponse};
use crate::error::{Error, Result};
use focus_common::events::{EventBus, FocusEvent};
use focus_common::{DurationHint, FocusChange, FocusState, SessionId};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A session holding (or waiting to regain) the grant, with the hint it asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grant {
    session: SessionId,
    hint: DurationHint,
}

struct ArbiterInner {
    registry: Registry,
    holder: Option<Grant>,
    /// Front is the most recently displaced session
    displaced: VecDeque<Grant>,
}

impl ArbiterInner {
    fn is_tracked(&self, session: SessionId) -> bool {
        self.holder.is_some_and(|g| g.session == session)
            || self.displaced.iter().any(|g| g.session == session)
    }

    /// Record the resulting state and enqueue the notification
    fn dispatch(&mut self, session: SessionId, change: FocusChange, event_bus: &EventBus) {
        let Some(entry) = self.registry.get_mut(session) else {
            warn!("Dropping {} for unregistered session {}", change, session);
            return;
        };
        entry.state = change.resulting_state();
        let notification = Notification {
            session,
            change,
            epoch: entry.liveness.epoch(),
        };
        debug!("Dispatching {} to {} ({})", change, session, entry.label);
        entry.listener.deliver(notification);

        event_bus.emit_lossy(FocusEvent::FocusChanged {
            session,
            change,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Drop `session` from holder/stack; promote the next displaced session
    /// if it was the holder. Returns the promoted session.
    fn vacate(&mut self, session: SessionId, event_bus: &EventBus) -> Option<SessionId> {
        if self.holder.is_some_and(|g| g.session == session) {
            self.holder = None;
            let next = self.displaced.pop_front()?;
            self.holder = Some(next);
            self.dispatch(next.session, FocusChange::Gain, event_bus);
            return Some(next.session);
        }
        self.displaced.retain(|g| g.session != session);
        None
    }
}

/// Arbiter's view of one registered session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session: SessionId,
    pub label: String,
    pub state: FocusState,
}

/// Consistent copy of the arbiter state, taken under the lock
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FocusSnapshot {
    pub holder: Option<SessionId>,
    pub holder_hint: Option<DurationHint>,
    /// Most recently displaced first
    pub displaced: Vec<SessionId>,
    pub sessions: Vec<SessionView>,
}

impl FocusSnapshot {
    /// Number of sessions the arbiter considers to be holding focus
    pub fn holding_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state == FocusState::Holding)
            .count()
    }

    pub fn state_of(&self, session: SessionId) -> Option<FocusState> {
        self.sessions
            .iter()
            .find(|s| s.session == session)
            .map(|s| s.state)
    }
}

/// Focus arbiter handle
///
/// Cheap to clone; all clones share one state. Construct one per
/// application context and inject it into sessions.
#[derive(Clone)]
pub struct FocusArbiter {
    inner: Arc<Mutex<ArbiterInner>>,
    event_bus: EventBus,
}

impl FocusArbiter {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ArbiterInner {
                registry: Registry::default(),
                holder: None,
                displaced: VecDeque::new(),
            })),
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Add a session to the handle table
    pub async fn register(&self, label: &str, listener: Arc<dyn FocusListener>) -> Registration {
        let registration = self.inner.lock().await.registry.insert(label.to_string(), listener);
        info!("Registered session {} ({})", registration.session, label);

        self.event_bus.emit_lossy(FocusEvent::SessionRegistered {
            session: registration.session,
            label: label.to_string(),
            timestamp: chrono::Utc::now(),
        });
        registration
    }

    /// Request focus
    ///
    /// A registered requester is always granted: the current holder (if any)
    /// is notified according to the request's hint and, unless that is a
    /// full `LOSS`, kept on the displaced stack, then the requester receives `GRANTED`. Unregistered requesters
    /// are denied. A session with a request already outstanding gets
    /// [`Error::RequestOutstanding`].
    pub async fn request_focus(&self, request: FocusRequest) -> Result<FocusResponse> {
        let session = request.session();
        let mut inner = self.inner.lock().await;

        if !inner.registry.contains(session) {
            warn!("Focus request from unregistered session {}", session);
            return Ok(FocusResponse::Denied);
        }
        if inner.is_tracked(session) {
            return Err(Error::RequestOutstanding(session));
        }

        if let Some(previous) = inner.holder.take() {
            let change = request.hint().loss_for_displaced();
            info!(
                "Session {} displaces {} ({} -> {})",
                session,
                previous.session,
                request.hint(),
                change
            );
            if change != FocusChange::Loss {
                inner.displaced.push_front(previous);
            }
            inner.dispatch(previous.session, change, &self.event_bus);
        }

        inner.holder = Some(Grant {
            session,
            hint: request.hint(),
        });
        inner.dispatch(session, FocusChange::Granted, &self.event_bus);
        info!("Focus granted to {} ({})", session, request.hint());

        self.event_bus.emit_lossy(FocusEvent::FocusGranted {
            session,
            hint: request.hint(),
            timestamp: chrono::Utc::now(),
        });
        Ok(FocusResponse::Granted)
    }

    /// Give up the grant, or the place on the displaced stack
    ///
    /// If the session was the holder, the most recently displaced session is
    /// promoted and receives `GAIN`; that session is returned. Abandoning a
    /// session that is not tracked is a no-op.
    pub async fn abandon(&self, session: SessionId) -> Option<SessionId> {
        let mut inner = self.inner.lock().await;

        if !inner.is_tracked(session) {
            // Sessions that lost focus outright are untracked but still PAUSED_LOST
            if let Some(entry) = inner.registry.get_mut(session) {
                entry.state = FocusState::Idle;
            }
            debug!("Abandon for untracked session {} ignored", session);
            return None;
        }

        if let Some(entry) = inner.registry.get_mut(session) {
            entry.state = FocusState::Idle;
            entry.liveness.advance();
        }
        let restored = inner.vacate(session, &self.event_bus);

        match restored {
            Some(next) => info!("Session {} abandoned focus, restored {}", session, next),
            None => info!("Session {} abandoned focus", session),
        }
        self.event_bus.emit_lossy(FocusEvent::FocusAbandoned {
            session,
            restored,
            timestamp: chrono::Utc::now(),
        });
        restored
    }

    /// Remove every trace of a session without notifying it
    ///
    /// Must be called at or before session teardown. Any notification still
    /// queued for the session is dropped on arrival. If the session was the
    /// holder, the next displaced session is promoted as with `abandon`.
    /// Returns false for sessions that were not registered.
    pub async fn unregister(&self, session: SessionId) -> bool {
        let mut inner = self.inner.lock().await;

        if inner.registry.remove(session).is_none() {
            debug!("Unregister for unknown session {} ignored", session);
            return false;
        }
        let restored = inner.vacate(session, &self.event_bus);
        info!(
            "Unregistered session {} (restored: {:?})",
            session,
            restored.map(|s| s.to_string())
        );

        self.event_bus.emit_lossy(FocusEvent::SessionUnregistered {
            session,
            timestamp: chrono::Utc::now(),
        });
        true
    }

    /// Current holder, if any
    pub async fn holder(&self) -> Option<SessionId> {
        self.inner.lock().await.holder.map(|g| g.session)
    }

    pub async fn is_registered(&self, session: SessionId) -> bool {
        self.inner.lock().await.registry.contains(session)
    }

    /// Consistent copy of holder, stack and per-session states
    pub async fn snapshot(&self) -> FocusSnapshot {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<SessionView> = inner
            .registry
            .iter()
            .map(|(id, entry)| SessionView {
                session: *id,
                label: entry.label.clone(),
                state: entry.state,
            })
            .collect();
        sessions.sort_by(|a, b| a.label.cmp(&b.label).then(a.session.cmp(&b.session)));

        FocusSnapshot {
            holder: inner.holder.map(|g| g.session),
            holder_hint: inner.holder.map(|g| g.hint),
            displaced: inner.displaced.iter().map(|g| g.session).collect(),
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder(StdMutex<Vec<FocusChange>>);

    impl Recorder {
        fn take(&self) -> Vec<FocusChange> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl FocusListener for Recorder {
        fn deliver(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification.change);
        }
    }

    async fn register(arbiter: &FocusArbiter, label: &str) -> (SessionId, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let registration = arbiter.register(label, recorder.clone()).await;
        (registration.session, recorder)
    }

    fn request(session: SessionId, hint: DurationHint) -> FocusRequest {
        FocusRequest::new(session, hint)
    }

    #[tokio::test]
    async fn test_first_request_granted_immediately() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, rec_a) = register(&arbiter, "a").await;

        let response = arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        assert_eq!(response, FocusResponse::Granted);
        assert_eq!(arbiter.holder().await, Some(a));
        assert_eq!(rec_a.take(), vec![FocusChange::Granted]);

        let snapshot = arbiter.snapshot().await;
        assert_eq!(snapshot.holder_hint, Some(DurationHint::Exclusive));
        assert_eq!(snapshot.state_of(a), Some(FocusState::Holding));
        assert!(snapshot.displaced.is_empty());
    }

    #[tokio::test]
    async fn test_loser_notification_follows_winner_hint() {
        for (hint, expected) in [
            (DurationHint::Exclusive, FocusChange::Loss),
            (DurationHint::Transient, FocusChange::LossTransient),
            (DurationHint::TransientMayDuck, FocusChange::LossTransientCanDuck),
        ] {
            let arbiter = FocusArbiter::new(EventBus::new(16));
            let (a, rec_a) = register(&arbiter, "a").await;
            let (b, rec_b) = register(&arbiter, "b").await;

            arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
            rec_a.take();

            let response = arbiter.request_focus(request(b, hint)).await.unwrap();
            assert!(response.is_granted());
            assert_eq!(rec_a.take(), vec![expected]);
            assert_eq!(rec_b.take(), vec![FocusChange::Granted]);

            let restorable = if expected == FocusChange::Loss { vec![] } else { vec![a] };
            let snapshot = arbiter.snapshot().await;
            assert_eq!(snapshot.holder, Some(b));
            assert_eq!(snapshot.displaced, restorable);
            assert_eq!(snapshot.state_of(a), Some(expected.resulting_state()));
            assert_eq!(snapshot.holding_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_abandon_restores_most_recently_displaced() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, rec_a) = register(&arbiter, "a").await;
        let (b, rec_b) = register(&arbiter, "b").await;
        let (c, _rec_c) = register(&arbiter, "c").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        arbiter.request_focus(request(b, DurationHint::TransientMayDuck)).await.unwrap();
        arbiter.request_focus(request(c, DurationHint::Transient)).await.unwrap();
        assert_eq!(arbiter.snapshot().await.displaced, vec![b, a]);
        rec_a.take();
        rec_b.take();

        assert_eq!(arbiter.abandon(c).await, Some(b));
        assert_eq!(rec_b.take(), vec![FocusChange::Gain]);
        assert!(rec_a.take().is_empty());

        assert_eq!(arbiter.abandon(b).await, Some(a));
        assert_eq!(rec_a.take(), vec![FocusChange::Gain]);
        assert_eq!(arbiter.holder().await, Some(a));

        assert_eq!(arbiter.abandon(a).await, None);
        assert_eq!(arbiter.holder().await, None);
    }

    #[tokio::test]
    async fn test_full_loss_is_not_restored() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, rec_a) = register(&arbiter, "a").await;
        let (b, _rec_b) = register(&arbiter, "b").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        arbiter.request_focus(request(b, DurationHint::Exclusive)).await.unwrap();
        assert_eq!(rec_a.take(), vec![FocusChange::Granted, FocusChange::Loss]);

        assert_eq!(arbiter.abandon(b).await, None);
        assert!(rec_a.take().is_empty());
        assert_eq!(arbiter.holder().await, None);
        assert_eq!(arbiter.snapshot().await.state_of(a), Some(FocusState::PausedLost));

        assert_eq!(arbiter.abandon(a).await, None);
        assert_eq!(arbiter.snapshot().await.state_of(a), Some(FocusState::Idle));

        // The loser is no longer tracked and may ask again
        assert!(arbiter.request_focus(request(a, DurationHint::Exclusive)).await.is_ok());
        assert_eq!(arbiter.holder().await, Some(a));
    }

    #[tokio::test]
    async fn test_abandon_from_stack_does_not_notify() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, rec_a) = register(&arbiter, "a").await;
        let (b, rec_b) = register(&arbiter, "b").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        arbiter.request_focus(request(b, DurationHint::Transient)).await.unwrap();
        rec_a.take();
        rec_b.take();

        assert_eq!(arbiter.abandon(a).await, None);
        let snapshot = arbiter.snapshot().await;
        assert_eq!(snapshot.holder, Some(b));
        assert!(snapshot.displaced.is_empty());
        assert_eq!(snapshot.state_of(a), Some(FocusState::Idle));

        // Holder leaving now restores nobody
        assert_eq!(arbiter.abandon(b).await, None);
        assert!(rec_a.take().is_empty());
    }

    #[tokio::test]
    async fn test_abandon_is_idempotent() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, _rec) = register(&arbiter, "a").await;

        assert_eq!(arbiter.abandon(a).await, None);
        assert_eq!(arbiter.abandon(SessionId::new()).await, None);

        arbiter.request_focus(request(a, DurationHint::Transient)).await.unwrap();
        arbiter.abandon(a).await;
        arbiter.abandon(a).await;
        assert_eq!(arbiter.holder().await, None);
    }

    #[tokio::test]
    async fn test_outstanding_request_rejected() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, _) = register(&arbiter, "a").await;
        let (b, _) = register(&arbiter, "b").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        let again = arbiter.request_focus(request(a, DurationHint::Transient)).await;
        assert!(matches!(again, Err(Error::RequestOutstanding(id)) if id == a));

        // Still outstanding while displaced
        arbiter.request_focus(request(b, DurationHint::Transient)).await.unwrap();
        let again = arbiter.request_focus(request(a, DurationHint::Exclusive)).await;
        assert!(matches!(again, Err(Error::RequestOutstanding(_))));

        // After abandoning, a new request is fine
        arbiter.abandon(a).await;
        assert!(arbiter.request_focus(request(a, DurationHint::Exclusive)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unregistered_requester_denied() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let response = arbiter
            .request_focus(request(SessionId::new(), DurationHint::Exclusive))
            .await
            .unwrap();
        assert_eq!(response, FocusResponse::Denied);
        assert_eq!(arbiter.holder().await, None);
    }

    #[tokio::test]
    async fn test_unregister_is_silent_and_promotes_next() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let (a, rec_a) = register(&arbiter, "a").await;
        let (b, rec_b) = register(&arbiter, "b").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        arbiter.request_focus(request(b, DurationHint::Transient)).await.unwrap();
        rec_a.take();
        rec_b.take();

        assert!(arbiter.unregister(b).await);
        assert!(rec_b.take().is_empty());
        assert_eq!(rec_a.take(), vec![FocusChange::Gain]);
        assert_eq!(arbiter.holder().await, Some(a));
        assert!(!arbiter.is_registered(b).await);

        // Second unregister is a no-op
        assert!(!arbiter.unregister(b).await);
    }

    #[tokio::test]
    async fn test_abandon_advances_epoch() {
        let arbiter = FocusArbiter::new(EventBus::new(16));
        let recorder = Arc::new(Recorder::default());
        let registration = arbiter.register("a", recorder).await;
        let a = registration.session;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        let before = registration.liveness.epoch();
        arbiter.abandon(a).await;
        assert_eq!(registration.liveness.epoch(), before + 1);

        arbiter.unregister(a).await;
        assert!(!registration.liveness.is_alive());
    }

    #[tokio::test]
    async fn test_events_emitted_for_transitions() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let arbiter = FocusArbiter::new(bus);
        let (a, _) = register(&arbiter, "a").await;
        let (b, _) = register(&arbiter, "b").await;

        arbiter.request_focus(request(a, DurationHint::Exclusive)).await.unwrap();
        arbiter.request_focus(request(b, DurationHint::TransientMayDuck)).await.unwrap();
        arbiter.abandon(b).await;

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type());
        }
        assert_eq!(
            types,
            vec![
                "SessionRegistered",
                "SessionRegistered",
                "FocusChanged",
                "FocusGranted",
                "FocusChanged",
                "FocusChanged",
                "FocusGranted",
                "FocusChanged",
                "FocusAbandoned",
            ]
        );
    }
}
