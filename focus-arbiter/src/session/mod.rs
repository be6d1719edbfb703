//! Playback sessions and their focus reactions

pub mod playback;
pub mod policy;

pub use playback::{PlaybackSession, SessionOptions};
pub use policy::{Outcome, PolicyEvent, Reaction, ReactionPolicy};
