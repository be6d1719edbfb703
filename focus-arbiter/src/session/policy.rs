//! Per-session reaction policy
//!
//! Pure state machine interpreting arbiter notifications and lifecycle
//! events. It never touches the renderer or the arbiter itself; it returns
//! the [`Reaction`]s the owning session must carry out, in order.
//!
//! | Current                          | Event                   | Next             |
//! |----------------------------------|-------------------------|------------------|
//! | any                              | GRANTED                 | HOLDING          |
//! | HOLDING                          | LOSS                    | PAUSED_LOST      |
//! | HOLDING                          | LOSS_TRANSIENT          | PAUSED_TRANSIENT |
//! | HOLDING                          | LOSS_TRANSIENT_CAN_DUCK | DUCKED           |
//! | PAUSED_TRANSIENT/PAUSED_LOST/DUCKED | GAIN                 | HOLDING          |
//! | not IDLE                         | completion              | IDLE             |
//! | any                              | STOP                    | IDLE             |
//! | any                              | RELEASE                 | IDLE (terminal)  |
//!
//! Anything else is ignored. Once released, every event is ignored.

use focus_common::{FocusChange, FocusState};

/// Input to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyEvent {
    /// Notification dispatched by the arbiter
    Focus(FocusChange),
    /// Rendering subsystem reported end-of-track
    Completed,
    /// Rendering could not be started after a grant or restore
    StartFailed,
    /// Explicit stop; the session may start again later
    Stop,
    /// Explicit release; terminal
    Release,
}

/// Side effect the session must perform, in the order returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Apply the base volume and start (or resume) rendering
    StartAtFullVolume,
    /// Resume rendering if it is not already running, then apply the base volume
    ResumeAtFullVolume,
    PauseRendering,
    /// Scale both channels by the duck factor, keep rendering
    Duck,
    StopRendering,
    /// Give up the grant (or the place on the displaced stack)
    Abandon,
    /// Remove the session from the arbiter's handle table
    Unregister,
    /// Free rendering resources
    FreeResources,
}

/// Result of feeding one event to the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// State changed (or was re-entered); perform `reactions`
    Transition {
        from: FocusState,
        to: FocusState,
        reactions: Vec<Reaction>,
    },
    /// Event does not apply to the current state
    Ignored,
}

/// Reaction state machine for one session
#[derive(Debug, Clone, Default)]
pub struct ReactionPolicy {
    state: FocusState,
    released: bool,
}

impl ReactionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FocusState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Feed one event, updating state
    pub fn apply(&mut self, event: PolicyEvent) -> Outcome {
        if self.released {
            return Outcome::Ignored;
        }

        let from = self.state;
        let (to, reactions) = match (from, event) {
            (_, PolicyEvent::Focus(FocusChange::Granted)) => {
                (FocusState::Holding, vec![Reaction::StartAtFullVolume])
            }
            (FocusState::Holding, PolicyEvent::Focus(FocusChange::Loss)) => {
                (FocusState::PausedLost, vec![Reaction::PauseRendering])
            }
            (FocusState::Holding, PolicyEvent::Focus(FocusChange::LossTransient)) => {
                (FocusState::PausedTransient, vec![Reaction::PauseRendering])
            }
            (FocusState::Holding, PolicyEvent::Focus(FocusChange::LossTransientCanDuck)) => {
                (FocusState::Ducked, vec![Reaction::Duck])
            }
            (state, PolicyEvent::Focus(FocusChange::Gain)) if state.is_displaced() => {
                (FocusState::Holding, vec![Reaction::ResumeAtFullVolume])
            }
            (FocusState::Idle, PolicyEvent::Completed) => return Outcome::Ignored,
            (_, PolicyEvent::Completed) => (
                FocusState::Idle,
                vec![Reaction::StopRendering, Reaction::Abandon],
            ),
            (_, PolicyEvent::StartFailed) => (FocusState::Idle, vec![Reaction::Abandon]),
            (_, PolicyEvent::Stop) => (
                FocusState::Idle,
                vec![Reaction::StopRendering, Reaction::Abandon],
            ),
            (_, PolicyEvent::Release) => {
                self.released = true;
                (
                    FocusState::Idle,
                    vec![
                        Reaction::Abandon,
                        Reaction::Unregister,
                        Reaction::StopRendering,
                        Reaction::FreeResources,
                    ],
                )
            }
            _ => return Outcome::Ignored,
        };

        self.state = to;
        Outcome::Transition {
            from,
            to,
            reactions,
        }
    }
}
