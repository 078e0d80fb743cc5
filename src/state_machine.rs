//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvState, Message, MessageContent, Sender, SessionState, Turn};
pub use transition::{
    transition, user_facing_error, TransitionError, TransitionResult, CAPACITY_REACHED,
    NOT_INITIALIZED, SYSTEM_ERROR,
};
