//! Property-based tests for the state machine
//!
//! These tests drive whole turns through `transition` with generated model
//! replies and check the invariants that must hold for every input:
//! - A turn makes at most two exchanges and always settles back to Idle
//! - Loading stays on from the user message until the turn settles
//! - Messages of sequential turns never interleave
//! - Transitions are deterministic

use super::*;
use crate::llm::LlmErrorKind;
use crate::schema::ActionKind;
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Test Helpers
// ============================================================================

/// Apply non-I/O effects the way the runtime does, returning the prompts
/// that would have been sent
fn apply(state: &mut SessionState, result: TransitionResult) -> Vec<String> {
    state.set_phase(result.new_state);
    let mut prompts = Vec::new();
    for effect in result.effects {
        match effect {
            Effect::AppendMessage(content) => state.push_message(Message::new(content)),
            Effect::SetError(error) => state.set_error(error),
            Effect::SetFocusQuery(query) => state.set_focus_query(query),
            Effect::RequestExchange { prompt, .. } => prompts.push(prompt),
            Effect::NotifyTurnSettled => {}
        }
    }
    prompts
}

/// Run one user turn, answering each exchange from `replies` in order.
/// Returns the number of exchanges made.
fn run_turn(state: &mut SessionState, text: &str, replies: &[Reply]) -> usize {
    let result = transition(
        state,
        Event::UserMessage {
            text: text.to_string(),
        },
    )
    .unwrap();
    let mut pending = apply(state, result);
    let mut exchanges = 0;
    let mut replies = replies.iter();

    while let Some(_prompt) = pending.pop() {
        exchanges += 1;
        assert!(state.loading(), "loading must stay on while exchanging");
        let event = match replies.next() {
            Some(Reply::Text(text)) => Event::ExchangeComplete { text: text.clone() },
            Some(Reply::Failure) => Event::ExchangeFailed {
                kind: LlmErrorKind::ServerError,
                message: "HTTP 503".to_string(),
                rate_limited: false,
            },
            None => Event::ExchangeComplete {
                text: String::new(),
            },
        };
        let result = transition(state, event).unwrap();
        pending.extend(apply(state, result));
    }
    exchanges
}

fn started() -> SessionState {
    let mut state = SessionState::default();
    let result = transition(&state, Event::SessionStarted).unwrap();
    apply(&mut state, result);
    state
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure,
}

fn arb_action_json() -> impl Strategy<Value = String> {
    prop::sample::select(ActionKind::ALL.to_vec()).prop_map(|kind| {
        let parameters: serde_json::Map<_, _> = kind
            .spec()
            .fields()
            .map(|(name, shape)| {
                let value = match shape {
                    crate::schema::FieldShape::String => json!("text"),
                    crate::schema::FieldShape::StringArray => json!(["a", "b"]),
                };
                (name.to_string(), value)
            })
            .collect();
        json!({ "kind": kind.as_str(), "parameters": parameters }).to_string()
    })
}

fn arb_reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(Reply::Text),
        Just(Reply::Text(String::new())),
        arb_action_json().prop_map(Reply::Text),
        Just(Reply::Text(r#"{"kind":"render_axiom_node","parameters":{}}"#.to_string())),
        Just(Reply::Text(r#"{"kind":"no_such_kind","parameters":{}}"#.to_string())),
        Just(Reply::Text("{\"kind\": \"focus_query\"".to_string())),
        Just(Reply::Failure),
    ]
}

fn arb_replies() -> impl Strategy<Value = Vec<Reply>> {
    prop::collection::vec(arb_reply(), 0..4)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn turn_makes_at_most_two_exchanges(replies in arb_replies()) {
        let mut state = started();
        let exchanges = run_turn(&mut state, "explain gravity", &replies);
        prop_assert!((1..=2).contains(&exchanges));
        prop_assert_eq!(state.phase(), &ConvState::Idle);
        prop_assert!(!state.loading());
    }

    #[test]
    fn sequential_turns_never_interleave(
        first in arb_replies(),
        second in arb_replies(),
    ) {
        let mut state = started();
        run_turn(&mut state, "turn A", &first);
        let after_first = state.messages().len();
        run_turn(&mut state, "turn B", &second);

        let messages = state.messages();
        prop_assert_eq!(messages[0].text(), "turn A");
        prop_assert_eq!(messages[0].sender(), Sender::User);
        prop_assert_eq!(messages[after_first].text(), "turn B");
        prop_assert_eq!(messages[after_first].sender(), Sender::User);
        // Only the two user messages come from the user
        let user_count = messages.iter().filter(|m| m.sender() == Sender::User).count();
        prop_assert_eq!(user_count, 2);
    }

    #[test]
    fn focus_query_is_never_logged(replies in arb_replies()) {
        let mut state = started();
        run_turn(&mut state, "ask me", &replies);
        let logged_focus = state
            .messages()
            .iter()
            .any(|m| m.action().is_some_and(crate::action::Action::is_focus_query));
        prop_assert!(!logged_focus);
    }

    #[test]
    fn transition_is_deterministic(reply in arb_reply()) {
        let mut state = started();
        let result = transition(&state, Event::UserMessage { text: "q".to_string() }).unwrap();
        apply(&mut state, result);

        let event = match reply {
            Reply::Text(text) => Event::ExchangeComplete { text },
            Reply::Failure => Event::ExchangeFailed {
                kind: LlmErrorKind::Network,
                message: "reset".to_string(),
                rate_limited: false,
            },
        };
        let a = transition(&state, event.clone()).unwrap();
        let b = transition(&state, event).unwrap();
        prop_assert_eq!(a.new_state, b.new_state);
        prop_assert_eq!(a.effects, b.effects);
    }

    #[test]
    fn blank_input_never_changes_state(text in "[ \t\n]{0,8}") {
        let state = started();
        let err = transition(&state, Event::UserMessage { text }).unwrap_err();
        prop_assert_eq!(err, TransitionError::EmptyMessage);
    }
}
