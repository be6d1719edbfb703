//! Playback session
//!
//! A logical sound producer. Each session registers with the arbiter on
//! creation and owns an ordered inbox that the arbiter (and the rendering
//! subsystem's completion callback) feed. A dedicated reaction task drains
//! the inbox and runs the [`ReactionPolicy`], so a session observes its
//! notifications in exactly the order the arbiter committed them.
//!
//! Before acting on a notification the task checks the shared liveness
//! record: notifications that arrive after `release()` (unregistered) or
//! after an abandon (stale epoch) are dropped.
//!
//! Every grant starts a new rendering run with its own
//! [`CompletionNotifier`]. End-of-track reported through the notifier of an
//! earlier run is ignored.

use super::policy::{Outcome, PolicyEvent, Reaction, ReactionPolicy};
use crate::error::{Error, Result};
use crate::focus::{
    FocusArbiter, FocusListener, FocusRequest, FocusResponse, Liveness, Notification,
};
use crate::render::{CompletionNotifier, Renderer};
use focus_common::events::{DropReason, FocusEvent};
use focus_common::{DurationHint, FocusChange, FocusState, SessionId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

/// How a session identifies itself and what it asks the arbiter for
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub label: String,
    pub hint: DurationHint,
}

impl SessionOptions {
    pub fn new(label: impl Into<String>, hint: DurationHint) -> Self {
        Self {
            label: label.into(),
            hint,
        }
    }
}

/// Messages drained by the reaction task, in arrival order
enum SessionMessage {
    Notify(Notification),
    /// End-of-track for the given rendering run
    Completed(u64),
    /// Acknowledged once everything queued before it was handled
    Flush(oneshot::Sender<()>),
    /// Like `Flush`, also hands back the failure of the latest grant reaction
    CollectStart(oneshot::Sender<Option<Error>>),
}

/// Arbiter-facing listener; only enqueues
struct InboxListener {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl FocusListener for InboxListener {
    fn deliver(&self, notification: Notification) {
        // A closed inbox means the reaction task is gone with the session
        let _ = self.tx.send(SessionMessage::Notify(notification));
    }
}

struct SessionCore {
    policy: ReactionPolicy,
    /// Volume set by the owner; "full volume" for focus reactions
    base_volume: (f32, f32),
    /// Volume last pushed to the renderer
    applied_volume: (f32, f32),
    start_failure: Option<Error>,
    /// Current rendering run, advanced on every grant
    run: u64,
    /// Completion handle attached to the renderer for `run`
    notifier: CompletionNotifier,
}

/// Completion handle that reports end-of-track for one rendering run
///
/// Holds only a weak sender so an attached notifier never keeps the
/// session's inbox open.
fn run_notifier(
    session: SessionId,
    inbox: mpsc::WeakUnboundedSender<SessionMessage>,
    run: u64,
) -> CompletionNotifier {
    CompletionNotifier::new(session, move || {
        if let Some(tx) = inbox.upgrade() {
            let _ = tx.send(SessionMessage::Completed(run));
        }
    })
}

struct SessionShared {
    id: SessionId,
    label: String,
    hint: DurationHint,
    duck_factor: f32,
    arbiter: FocusArbiter,
    renderer: Arc<dyn Renderer>,
    liveness: Arc<Liveness>,
    released: AtomicBool,
    inbox: mpsc::WeakUnboundedSender<SessionMessage>,
    core: Mutex<SessionCore>,
}

impl SessionShared {
    fn emit(&self, event: FocusEvent) {
        self.arbiter.event_bus().emit_lossy(event);
    }

    fn dropped(&self, change: FocusChange, reason: DropReason) {
        debug!(
            "Session {} ({}) dropped {}: {}",
            self.id, self.label, change, reason
        );
        self.emit(FocusEvent::NotificationDropped {
            session: self.id,
            change,
            reason,
            timestamp: chrono::Utc::now(),
        });
    }

    fn push_volume(&self, core: &mut SessionCore, left: f32, right: f32) {
        self.renderer.set_channel_volume(self.id, left, right);
        core.applied_volume = (left, right);
    }

    fn start_error(&self, e: Error) -> Error {
        Error::ResourceAcquisition {
            session: self.id,
            reason: e.to_string(),
        }
    }

    /// Carry out reactions in order. Stops at the first start failure.
    async fn perform(&self, core: &mut SessionCore, reactions: &[Reaction]) -> Option<Error> {
        for reaction in reactions {
            match reaction {
                Reaction::StartAtFullVolume => {
                    core.run += 1;
                    core.notifier = run_notifier(self.id, self.inbox.clone(), core.run);
                    self.renderer.attach_completion(core.notifier.clone());

                    let (left, right) = core.base_volume;
                    self.push_volume(core, left, right);
                    if let Err(e) = self.renderer.start_rendering(self.id) {
                        return Some(self.start_error(e));
                    }
                }
                Reaction::ResumeAtFullVolume => {
                    if !self.renderer.is_rendering(self.id) {
                        if let Err(e) = self.renderer.start_rendering(self.id) {
                            return Some(self.start_error(e));
                        }
                    }
                    let (left, right) = core.base_volume;
                    self.push_volume(core, left, right);
                }
                Reaction::PauseRendering => self.renderer.pause_rendering(self.id),
                Reaction::Duck => {
                    let (left, right) = core.base_volume;
                    self.push_volume(core, left * self.duck_factor, right * self.duck_factor);
                }
                Reaction::StopRendering => self.renderer.stop_rendering(self.id),
                Reaction::Abandon => {
                    self.arbiter.abandon(self.id).await;
                }
                Reaction::Unregister => {
                    self.arbiter.unregister(self.id).await;
                }
                Reaction::FreeResources => self.renderer.release(self.id),
            }
        }
        None
    }

    /// Run one policy event to completion. Returns the start failure, if the
    /// event's reactions could not start rendering; the session has already
    /// abandoned focus in that case.
    async fn apply(&self, core: &mut SessionCore, event: PolicyEvent) -> Option<Error> {
        let Outcome::Transition {
            from,
            to,
            reactions,
        } = core.policy.apply(event)
        else {
            match event {
                PolicyEvent::Focus(change) => self.dropped(change, DropReason::NotApplicable),
                other => debug!(
                    "Session {} ignored {:?} in state {}",
                    self.id,
                    other,
                    core.policy.state()
                ),
            }
            return None;
        };

        debug!("Session {} ({}): {} -> {} on {:?}", self.id, self.label, from, to, event);
        let failure = self.perform(core, &reactions).await;
        self.emit(FocusEvent::ReactionApplied {
            session: self.id,
            from,
            to,
            timestamp: chrono::Utc::now(),
        });

        let failure = failure?;
        error!("Session {} ({}): {}", self.id, self.label, failure);
        if let Outcome::Transition {
            from,
            to,
            reactions,
        } = core.policy.apply(PolicyEvent::StartFailed)
        {
            self.perform(core, &reactions).await;
            self.emit(FocusEvent::ReactionApplied {
                session: self.id,
                from,
                to,
                timestamp: chrono::Utc::now(),
            });
        }
        Some(failure)
    }

    async fn react(&self, notification: Notification) {
        let mut core = self.core.lock().await;

        if !self.liveness.is_alive() {
            self.dropped(notification.change, DropReason::Unregistered);
            return;
        }
        if !self.liveness.is_current(notification.epoch) {
            self.dropped(notification.change, DropReason::Superseded);
            return;
        }

        let failure = self
            .apply(&mut core, PolicyEvent::Focus(notification.change))
            .await;
        if notification.change == FocusChange::Granted {
            core.start_failure = failure;
        }
    }

    async fn complete(&self, run: u64) {
        let mut core = self.core.lock().await;
        if !self.liveness.is_alive() {
            debug!("Completion for released session {} ignored", self.id);
            return;
        }
        if run != core.run {
            debug!(
                "Completion of run {} for session {} ignored, current run is {}",
                run, self.id, core.run
            );
            return;
        }
        info!("Session {} ({}) finished rendering", self.id, self.label);
        self.apply(&mut core, PolicyEvent::Completed).await;
    }

    async fn release_now(&self) {
        let mut core = self.core.lock().await;
        self.apply(&mut core, PolicyEvent::Release).await;
        info!("Session {} ({}) released", self.id, self.label);
    }
}

async fn run_reactions(
    shared: Arc<SessionShared>,
    mut inbox: mpsc::UnboundedReceiver<SessionMessage>,
) {
    while let Some(message) = inbox.recv().await {
        match message {
            SessionMessage::Notify(notification) => shared.react(notification).await,
            SessionMessage::Completed(run) => shared.complete(run).await,
            SessionMessage::Flush(reply) => {
                let _ = reply.send(());
            }
            SessionMessage::CollectStart(reply) => {
                let failure = shared.core.lock().await.start_failure.take();
                let _ = reply.send(failure);
            }
        }
    }
    debug!("Reaction task for session {} finished", shared.id);
}

/// One logical sound producer competing for the shared output
///
/// Owned exclusively by its creator. Dropping a session without calling
/// [`release`](Self::release) schedules the release on the current runtime.
pub struct PlaybackSession {
    shared: Arc<SessionShared>,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl PlaybackSession {
    /// Register a new session with the arbiter and start its reaction task
    ///
    /// Must be called from within a tokio runtime.
    pub async fn spawn(
        arbiter: FocusArbiter,
        renderer: Arc<dyn Renderer>,
        duck_factor: f32,
        options: SessionOptions,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(InboxListener { tx: tx.clone() });
        let registration = arbiter.register(&options.label, listener).await;

        let inbox = tx.downgrade();
        let notifier = run_notifier(registration.session, inbox.clone(), 0);
        renderer.attach_completion(notifier.clone());

        let shared = Arc::new(SessionShared {
            id: registration.session,
            label: options.label,
            hint: options.hint,
            duck_factor,
            arbiter,
            renderer,
            liveness: registration.liveness,
            released: AtomicBool::new(false),
            inbox,
            core: Mutex::new(SessionCore {
                policy: ReactionPolicy::new(),
                base_volume: (1.0, 1.0),
                applied_volume: (1.0, 1.0),
                start_failure: None,
                run: 0,
                notifier,
            }),
        });

        tokio::spawn(run_reactions(Arc::clone(&shared), rx));

        Self { shared, tx }
    }

    pub fn id(&self) -> SessionId {
        self.shared.id
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    pub fn hint(&self) -> DurationHint {
        self.shared.hint
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::Acquire)
    }

    /// Local focus state as last updated by the reaction policy
    pub async fn focus_state(&self) -> FocusState {
        self.shared.core.lock().await.policy.state()
    }

    /// Channel volumes currently applied to the renderer
    pub async fn volume(&self) -> (f32, f32) {
        self.shared.core.lock().await.applied_volume
    }

    pub fn is_rendering(&self) -> bool {
        self.shared.renderer.is_rendering(self.shared.id)
    }

    /// Handle for the rendering subsystem to report end-of-track of the
    /// current run
    pub async fn completion_notifier(&self) -> CompletionNotifier {
        self.shared.core.lock().await.notifier.clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(Error::Released(self.id()));
        }
        Ok(())
    }

    /// Wait until every notification queued before this call has been handled
    pub async fn sync(&self) {
        let (reply, done) = oneshot::channel();
        if self.tx.send(SessionMessage::Flush(reply)).is_ok() {
            let _ = done.await;
        }
    }

    /// Request focus with the session's hint and start rendering once granted
    ///
    /// Returns after the grant has been reacted to. If rendering cannot be
    /// started the session abandons focus, returns to `IDLE` and the failure
    /// is returned.
    pub async fn start(&self) -> Result<()> {
        self.ensure_live()?;

        let request = FocusRequest::new(self.id(), self.hint());
        let response = self.shared.arbiter.request_focus(request).await?;
        if response == FocusResponse::Denied {
            return Err(Error::FocusDenied(self.id()));
        }
        info!("Session {} ({}) granted focus", self.id(), self.label());

        let (reply, outcome) = oneshot::channel();
        if self.tx.send(SessionMessage::CollectStart(reply)).is_err() {
            return Err(Error::InvalidState(format!(
                "reaction task for session {} is gone",
                self.id()
            )));
        }
        match outcome.await {
            Ok(Some(failure)) => Err(failure),
            Ok(None) => Ok(()),
            Err(_) => Err(Error::InvalidState(format!(
                "reaction task for session {} stopped",
                self.id()
            ))),
        }
    }

    /// Pause rendering; focus is kept
    pub async fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        let _core = self.shared.core.lock().await;
        if self.shared.renderer.is_rendering(self.id()) {
            self.shared.renderer.pause_rendering(self.id());
        }
        Ok(())
    }

    /// Resume rendering after `pause()`; only while holding or ducked
    pub async fn resume(&self) -> Result<()> {
        self.ensure_live()?;
        let mut core = self.shared.core.lock().await;

        let state = core.policy.state();
        if !matches!(state, FocusState::Holding | FocusState::Ducked) {
            return Err(Error::InvalidState(format!(
                "session {} cannot resume while {}",
                self.id(),
                state
            )));
        }
        if self.shared.renderer.is_rendering(self.id()) {
            return Ok(());
        }
        if let Err(e) = self.shared.renderer.start_rendering(self.id()) {
            let failure = self.shared.start_error(e);
            error!("Session {} ({}): {}", self.id(), self.label(), failure);
            self.shared.apply(&mut core, PolicyEvent::StartFailed).await;
            return Err(failure);
        }
        Ok(())
    }

    /// Stop rendering and abandon focus; the session may start again
    pub async fn stop(&self) -> Result<()> {
        self.ensure_live()?;
        let mut core = self.shared.core.lock().await;
        self.shared.apply(&mut core, PolicyEvent::Stop).await;
        Ok(())
    }

    /// Abandon and unregister, stop rendering, free rendering resources
    ///
    /// Idempotent, including under concurrent calls.
    pub async fn release(&self) -> Result<()> {
        if self.shared.released.swap(true, Ordering::AcqRel) {
            debug!("Session {} already released", self.id());
            return Ok(());
        }
        self.shared.release_now().await;
        Ok(())
    }

    /// Set the base channel volumes (clamped to 0.0..=1.0)
    ///
    /// While ducked the renderer receives the base volume scaled by the duck
    /// factor; the base is restored in full when focus returns.
    pub async fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        self.ensure_live()?;
        let mut core = self.shared.core.lock().await;
        let base = (left.clamp(0.0, 1.0), right.clamp(0.0, 1.0));
        core.base_volume = base;

        let factor = if core.policy.state() == FocusState::Ducked {
            self.shared.duck_factor
        } else {
            1.0
        };
        self.shared.push_volume(&mut core, base.0 * factor, base.1 * factor);
        Ok(())
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        self.ensure_live()?;
        self.shared.renderer.set_looping(self.id(), looping);
        Ok(())
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.shared.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { shared.release_now().await });
            }
            Err(_) => warn!(
                "Session {} dropped outside a runtime without release()",
                shared.id
            ),
        }
    }
}
