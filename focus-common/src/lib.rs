//! # Focus Common Library
//!
//! Shared code for the audio focus workspace including:
//! - Session identity and focus vocabulary (duration hints, focus changes, focus states)
//! - Focus event types and the EventBus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{DurationHint, EventBus, FocusChange, FocusEvent, FocusState, SessionId};
