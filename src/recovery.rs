//! Recovery policy for malformed structured responses
//!
//! A turn gets at most one silent retry. The first attempt that comes back as
//! a rejected structured payload is retried with an amended prompt; anything
//! the retry produces is settled as-is.

use crate::action::Action;
use crate::classifier::Classification;
use serde::{Deserialize, Serialize};

/// Upper bound on exchanges per user turn
pub const MAX_ATTEMPTS: u32 = 2;

/// Transient agent message shown while the retry is in flight
pub const RECALIBRATING_NOTICE: &str = "[color:syntax]Recalibrating logic path...[/color]";

const PROTOCOL_REMINDER: &str = "Protocol error: Previous response was not valid JSON for a tool call. \
Adhere to protocol. Respond to the user's last message with either standard text or a single, raw JSON object.";

/// Where a turn is in its retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPhase {
    /// First attempt for this user turn
    #[default]
    Fresh,
    /// Second and final attempt
    Retrying,
    /// Terminal for this turn
    Exhausted,
}

impl RecoveryPhase {
    /// 1-based number of the attempt made in this phase
    #[must_use]
    pub fn attempt(self) -> u32 {
        match self {
            RecoveryPhase::Fresh => 1,
            RecoveryPhase::Retrying | RecoveryPhase::Exhausted => MAX_ATTEMPTS,
        }
    }
}

/// What a settled turn produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// Empty response: nothing is appended
    Silent,
    Text(String),
    Action(Action),
}

/// Outcome of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Settle(Settlement),
    /// Show the recalibrating notice and re-issue with `amend_prompt`
    Retry,
}

/// Decide what to do with one attempt's classification.
#[must_use]
pub fn decide(phase: RecoveryPhase, classification: Classification) -> (RecoveryPhase, Decision) {
    match (phase, classification) {
        (RecoveryPhase::Fresh, classification) if classification.is_failed_attempt() => {
            (RecoveryPhase::Retrying, Decision::Retry)
        }
        (_, classification) => (
            RecoveryPhase::Exhausted,
            Decision::Settle(settle(classification)),
        ),
    }
}

fn settle(classification: Classification) -> Settlement {
    match classification {
        Classification::Empty => Settlement::Silent,
        Classification::PlainText { text, .. } => Settlement::Text(text),
        Classification::StructuredAction(action) => Settlement::Action(action),
    }
}

/// Prompt for the retry attempt, restating the protocol before the user's
/// original message.
#[must_use]
pub fn amend_prompt(user_text: &str) -> String {
    format!("{PROTOCOL_REMINDER}\n\nUser's message: \"{user_text}\"")
}
