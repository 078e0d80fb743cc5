//! Events that can occur in a session

use crate::llm::LlmErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // Channel lifecycle
    SessionStarted,
    SessionFailed {
        message: String,
    },

    // User events
    UserMessage {
        text: String,
    },
    FocusAnswer {
        answer: String,
    },
    Cancelled,

    // Exchange events
    ExchangeComplete {
        /// All chunks of the exchange, concatenated
        text: String,
    },
    ExchangeFailed {
        kind: LlmErrorKind,
        message: String,
        /// Whether the provider reported quota or rate exhaustion
        rate_limited: bool,
    },
}
