//! Runtime for executing sessions
//!
//! `Session` owns one conversation and runs its exchanges inline;
//! `SessionHandle` moves a session onto its own task and feeds it commands
//! in arrival order.

mod executor;
mod handle;


pub use executor::Session;
pub use handle::{SessionClosed, SessionHandle};

use crate::action::Action;
use crate::state_machine::Message;

/// Events published to observers of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Loading(bool),
    Message(Message),
    FocusQuery(Option<Action>),
    Error(Option<String>),
    /// The current turn is over
    TurnSettled,
}
