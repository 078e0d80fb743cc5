//! Pure state transition function

use super::state::{SessionState, Turn};
use super::{ConvState, Effect, Event};
use crate::classifier::{classify, Classification};
use crate::recovery::{amend_prompt, decide, Decision, Settlement, RECALIBRATING_NOTICE};
use thiserror::Error;

/// Shown when input arrives before the channel is open
pub const NOT_INITIALIZED: &str = "Chat is not initialized.";
/// Shown for quota and rate-limit failures
pub const CAPACITY_REACHED: &str = "System capacity reached. Please wait and try again.";
/// Shown for every other transport failure
pub const SYSTEM_ERROR: &str = "A system error occurred. Please try again later.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Agent is busy, wait for the current reply to finish")]
    AgentBusy,
    #[error("No focus query is pending")]
    NoPendingFocusQuery,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// User-facing text for a transport failure
#[must_use]
pub fn user_facing_error(rate_limited: bool) -> &'static str {
    if rate_limited {
        CAPACITY_REACHED
    } else {
        SYSTEM_ERROR
    }
}

/// Pure transition function
///
/// Given the same state and event it always produces the same result; ids
/// and timestamps are stamped later by the runtime.
pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state.phase(), event) {
        // ============================================================
        // Channel lifecycle
        // ============================================================
        (ConvState::Closed, Event::SessionStarted) => Ok(TransitionResult::new(ConvState::Idle)),

        (ConvState::Closed, Event::SessionFailed { message }) => Ok(TransitionResult::new(
            ConvState::ChannelFailed {
                message: message.clone(),
            },
        )
        .with_effect(Effect::error(message))),

        // ============================================================
        // User input
        // ============================================================
        (phase, Event::UserMessage { text }) => user_message(phase, text),

        (phase, Event::FocusAnswer { answer }) => {
            if state.pending_focus_query().is_none() {
                return Err(TransitionError::NoPendingFocusQuery);
            }
            if answer.trim().is_empty() {
                return Ok(TransitionResult::new(phase.clone())
                    .with_effect(Effect::SetFocusQuery(None)));
            }
            let mut result = user_message(phase, answer)?;
            result.effects.insert(0, Effect::SetFocusQuery(None));
            Ok(result)
        }

        // A cancelled turn appends nothing more
        (ConvState::Exchanging { .. }, Event::Cancelled) => {
            Ok(TransitionResult::new(ConvState::Closed).with_effect(Effect::NotifyTurnSettled))
        }
        (_, Event::Cancelled) => Ok(TransitionResult::new(ConvState::Closed)),

        // ============================================================
        // Exchange outcomes
        // ============================================================
        (ConvState::Exchanging { turn }, Event::ExchangeComplete { text }) => {
            Ok(exchange_complete(turn, &text))
        }

        (ConvState::Exchanging { .. }, Event::ExchangeFailed { rate_limited, .. }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::error(user_facing_error(rate_limited)))
                .with_effect(Effect::NotifyTurnSettled))
        }

        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in {phase:?}"
        ))),
    }
}

fn user_message(phase: &ConvState, text: String) -> Result<TransitionResult, TransitionError> {
    if text.trim().is_empty() {
        return Err(TransitionError::EmptyMessage);
    }
    match phase {
        ConvState::Closed => {
            Ok(TransitionResult::new(ConvState::Closed).with_effect(Effect::error(NOT_INITIALIZED)))
        }
        ConvState::ChannelFailed { message } => {
            Ok(TransitionResult::new(phase.clone()).with_effect(Effect::error(message.clone())))
        }
        ConvState::Exchanging { .. } => Err(TransitionError::AgentBusy),
        ConvState::Idle => Ok(TransitionResult::new(ConvState::Exchanging {
            turn: Turn::new(text.clone()),
        })
        .with_effect(Effect::SetError(None))
        .with_effect(Effect::append_user(text.clone()))
        .with_effect(Effect::first_exchange(text))),
    }
}

fn exchange_complete(turn: &Turn, text: &str) -> TransitionResult {
    let classification = classify(text);
    let rejection = match &classification {
        Classification::PlainText { rejection, .. } => rejection.clone(),
        _ => None,
    };

    let (next_phase, decision) = decide(turn.phase, classification);
    match decision {
        Decision::Retry => {
            let turn = Turn {
                user_text: turn.user_text.clone(),
                phase: next_phase,
            };
            TransitionResult::new(ConvState::Exchanging {
                turn: turn.clone(),
            })
            .with_effect(Effect::append_agent(RECALIBRATING_NOTICE))
            .with_effect(Effect::RequestExchange {
                prompt: amend_prompt(&turn.user_text),
                attempt: next_phase.attempt(),
                retry_reason: rejection,
            })
        }
        Decision::Settle(settlement) => {
            let result = TransitionResult::new(ConvState::Idle);
            let result = match settlement {
                Settlement::Silent => result,
                Settlement::Text(text) => result.with_effect(Effect::append_agent(text)),
                Settlement::Action(action) if action.is_focus_query() => {
                    result.with_effect(Effect::SetFocusQuery(Some(action)))
                }
                Settlement::Action(action) => result.with_effect(Effect::append_action(action)),
            };
            result.with_effect(Effect::NotifyTurnSettled)
        }
    }
}
