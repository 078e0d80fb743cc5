//! Effects produced by state transitions

use super::state::MessageContent;
use crate::action::Action;
use crate::classifier::Rejection;

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append a message to the log
    AppendMessage(MessageContent),

    /// Replace the user-facing error
    SetError(Option<String>),

    /// Set or clear the pending focus query
    SetFocusQuery(Option<Action>),

    /// Send a prompt over the channel and stream the reply
    RequestExchange {
        prompt: String,
        attempt: u32,
        /// Why the previous attempt was rejected, when this is the retry
        retry_reason: Option<Rejection>,
    },

    /// The turn is over; the session accepts input again
    NotifyTurnSettled,
}

impl Effect {
    pub fn append_user(text: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageContent::UserText(text.into()))
    }

    pub fn append_agent(text: impl Into<String>) -> Self {
        Effect::AppendMessage(MessageContent::AgentText(text.into()))
    }

    pub fn append_action(action: Action) -> Self {
        Effect::AppendMessage(MessageContent::AgentAction(action))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Effect::SetError(Some(message.into()))
    }

    pub fn first_exchange(prompt: impl Into<String>) -> Self {
        Effect::RequestExchange {
            prompt: prompt.into(),
            attempt: 1,
            retry_reason: None,
        }
    }
}
