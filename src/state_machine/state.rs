//! Conversation state types

use crate::action::Action;
use crate::recovery::RecoveryPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Agent,
}

/// Body of a message about to be appended
///
/// Transitions emit contents; the runtime stamps them into `Message`s so
/// the transition function stays free of clocks and id generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    UserText(String),
    AgentText(String),
    AgentAction(Action),
}

/// One entry in the conversation log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    sender: Sender,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<Action>,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(content: MessageContent) -> Self {
        let (sender, text, action) = match content {
            MessageContent::UserText(text) => (Sender::User, text, None),
            MessageContent::AgentText(text) => (Sender::Agent, text, None),
            MessageContent::AgentAction(action) => (Sender::Agent, String::new(), Some(action)),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            text,
            action,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageContent::UserText(text.into()))
    }

    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::new(MessageContent::AgentText(text.into()))
    }

    pub fn agent_action(action: Action) -> Self {
        Self::new(MessageContent::AgentAction(action))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The user turn currently being answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Original user text, reused verbatim by the amended retry prompt
    pub user_text: String,
    pub phase: RecoveryPhase,
}

impl Turn {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            phase: RecoveryPhase::Fresh,
        }
    }
}

/// Conversation phase
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// No channel open yet, or the session was cancelled
    #[default]
    Closed,

    /// Channel open, ready for user input
    Idle,

    /// Exchange in flight; spans the silent retry
    Exchanging { turn: Turn },

    /// Channel could not be opened; terminal for the session
    ChannelFailed { message: String },
}

impl ConvState {
    pub fn is_busy(&self) -> bool {
        matches!(self, ConvState::Exchanging { .. })
    }
}

/// Everything an observer can see about a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    phase: ConvState,
    messages: Vec<Message>,
    last_error: Option<String>,
    pending_focus_query: Option<Action>,
}

impl SessionState {
    pub fn phase(&self) -> &ConvState {
        &self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// True exactly while an exchange (or its retry) is in flight
    pub fn loading(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn pending_focus_query(&self) -> Option<&Action> {
        self.pending_focus_query.as_ref()
    }

    pub(crate) fn set_phase(&mut self, phase: ConvState) {
        self.phase = phase;
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn set_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub(crate) fn set_focus_query(&mut self, query: Option<Action>) {
        self.pending_focus_query = query;
    }
}
