//! Property-based tests for the response classifier
//!
//! These tests verify the shielding invariants across generated payloads:
//! - Complete payloads for every kind classify as structured actions
//! - Dropping any required field falls back to the original text
//! - Unknown kinds and non-object text degrade to plain text, verbatim
//! - Chat text opening with bracket markup is never a failed attempt
//! - Classification has no hidden state

use super::*;
use crate::schema::{ActionKind, FieldShape};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

// ============================================================================
// Strategies
// ============================================================================

fn arb_kind() -> impl Strategy<Value = ActionKind> {
    prop::sample::select(ActionKind::ALL.to_vec())
}

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.!?,']{0,40}"
}

fn arb_value_for(shape: FieldShape) -> BoxedStrategy<Value> {
    match shape {
        FieldShape::String => arb_text().prop_map(Value::String).boxed(),
        FieldShape::StringArray => prop::collection::vec(arb_text(), 0..5)
            .prop_map(|items| Value::Array(items.into_iter().map(Value::String).collect()))
            .boxed(),
    }
}

/// A parameters object holding exactly the required fields of `kind`
fn arb_parameters(kind: ActionKind) -> BoxedStrategy<Map<String, Value>> {
    let fields: Vec<_> = kind.spec().fields().collect();
    let values: Vec<_> = fields.iter().map(|(_, shape)| arb_value_for(*shape)).collect();
    values
        .prop_map(move |values| {
            fields
                .iter()
                .zip(values)
                .map(|((name, _), value)| ((*name).to_string(), value))
                .collect()
        })
        .boxed()
}

fn arb_valid_payload() -> impl Strategy<Value = (ActionKind, Map<String, Value>)> {
    arb_kind().prop_flat_map(|kind| arb_parameters(kind).prop_map(move |params| (kind, params)))
}

fn payload_text(kind_name: &str, parameters: Map<String, Value>) -> String {
    json!({ "kind": kind_name, "parameters": Value::Object(parameters) }).to_string()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn complete_payload_is_structured((kind, params) in arb_valid_payload()) {
        let text = payload_text(kind.as_str(), params);
        match classify(&text) {
            Classification::StructuredAction(action) => {
                prop_assert_eq!(action.kind(), kind);
            }
            other => {
                prop_assert!(false, "expected action, got {:?}", other);
            }
        }
    }

    #[test]
    fn missing_field_falls_back_to_original_text(
        (kind, params) in arb_valid_payload(),
        index in any::<prop::sample::Index>(),
    ) {
        let names: Vec<_> = params.keys().cloned().collect();
        let dropped = index.get(&names).clone();
        let mut params = params;
        params.remove(&dropped);

        let text = payload_text(kind.as_str(), params);
        match classify(&text) {
            Classification::PlainText { text: shown, rejection } => {
                prop_assert_eq!(shown, text);
                let is_missing_field = matches!(rejection, Some(Rejection::MissingField { .. }));
                prop_assert!(is_missing_field);
            }
            other => {
                prop_assert!(false, "expected plain text, got {:?}", other);
            }
        }
    }

    #[test]
    fn unknown_kind_is_plain_text(
        name in "[a-z_]{1,24}",
        params in prop::collection::btree_map("[a-z_]{1,10}", "[a-z ]{0,10}", 0..4),
    ) {
        prop_assume!(ActionKind::from_name(&name).is_none());
        let params: Map<String, Value> =
            params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        let text = payload_text(&name, params);
        match classify(&text) {
            Classification::PlainText { text: shown, .. } => {
                prop_assert_eq!(shown, text);
            }
            other => {
                prop_assert!(false, "expected plain text, got {:?}", other);
            }
        }
    }

    #[test]
    fn non_object_text_is_returned_verbatim(
        lead in prop::sample::select(vec!["", "[color:keyword]", "[1] ", "[notes](#orbits) "]),
        body in "[a-zA-Z0-9 .,!?'{}:/\\[\\]-]{1,80}",
    ) {
        let text = format!("{lead}{body}");
        let trimmed = text.trim();
        prop_assume!(!trimmed.is_empty());
        prop_assume!(!looks_structured(trimmed));
        prop_assume!(serde_json::from_str::<Value>(trimmed).is_err());
        match classify(&text) {
            Classification::PlainText { text: shown, rejection } => {
                prop_assert_eq!(shown, trimmed);
                prop_assert_eq!(rejection, None);
            }
            other => {
                prop_assert!(false, "expected plain text, got {:?}", other);
            }
        }
    }

    #[test]
    fn classification_is_idempotent(text in any::<String>()) {
        prop_assert_eq!(classify(&text), classify(&text));
    }

    #[test]
    fn truncated_payload_is_a_failed_attempt(
        (kind, params) in arb_valid_payload(),
        cut in 1usize..8,
    ) {
        let text = payload_text(kind.as_str(), params);
        let truncated: String = text.chars().take(text.chars().count().saturating_sub(cut)).collect();
        prop_assert!(classify(&truncated).is_failed_attempt());
    }
}
