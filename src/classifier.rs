//! Response classifier
//!
//! Turns the fully assembled text of one exchange into an `Empty`,
//! `PlainText` or `StructuredAction` classification. Classification is total
//! (no error ever escapes) and deterministic (no hidden state).

#[cfg(test)]
mod proptests;

use crate::action::Action;
use crate::schema::{schema_for, ActionKind};
use serde_json::{Map, Value};
use thiserror::Error;

/// Key older model prompts used instead of `kind`
const LEGACY_KIND_KEY: &str = "tool_name";

/// Why a structured payload was not accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("response is not valid JSON: {0}")]
    Syntax(String),
    #[error("response is JSON but not an object")]
    NotAnObject,
    #[error("object has no string `kind` field")]
    MissingKind,
    #[error("object has no `parameters` object")]
    MissingParameters,
    #[error("unknown action kind `{0}`")]
    UnknownKind(String),
    #[error("`{kind}` is missing required parameter `{field}`")]
    MissingField { kind: ActionKind, field: &'static str },
    #[error("`{kind}` parameter `{field}` must be a {expected}")]
    WrongShape {
        kind: ActionKind,
        field: &'static str,
        expected: &'static str,
    },
    #[error("`{kind}` parameters do not match the typed record: {reason}")]
    Payload { kind: ActionKind, reason: String },
}

/// Result of validating one parsed JSON value against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid(Action),
    Invalid(Rejection),
}

/// Three-way outcome for one exchange's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing but whitespace came back
    Empty,
    /// Text to show as-is. `rejection` is set when the text was an attempted
    /// structured payload that failed to parse or validate.
    PlainText {
        text: String,
        rejection: Option<Rejection>,
    },
    StructuredAction(Action),
}

impl Classification {
    /// Plain text that was an attempted, rejected structured payload
    #[must_use]
    pub fn is_failed_attempt(&self) -> bool {
        matches!(
            self,
            Classification::PlainText {
                rejection: Some(_),
                ..
            }
        )
    }
}

/// Classify the concatenated output of one exchange.
#[must_use]
pub fn classify(raw: &str) -> Classification {
    let text = raw.trim();
    if text.is_empty() {
        return Classification::Empty;
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(e) => {
            let rejection = looks_structured(text).then(|| Rejection::Syntax(e.to_string()));
            return plain(text, rejection);
        }
    };

    // A bare scalar like `42` or `true` is an ordinary reply unless the
    // text opened like a payload.
    if !value.is_object() && !value.is_array() && !looks_structured(text) {
        return plain(text, None);
    }

    match validate(&value) {
        Validation::Valid(action) => Classification::StructuredAction(action),
        Validation::Invalid(rejection) => plain(text, Some(rejection)),
    }
}

/// Validate a parsed value as an action payload.
#[must_use]
pub fn validate(value: &Value) -> Validation {
    match validate_inner(value) {
        Ok(action) => Validation::Valid(action),
        Err(rejection) => Validation::Invalid(rejection),
    }
}

fn validate_inner(value: &Value) -> Result<Action, Rejection> {
    let object = value.as_object().ok_or(Rejection::NotAnObject)?;
    let kind_name = kind_name(object).ok_or(Rejection::MissingKind)?;
    let parameters = object
        .get("parameters")
        .and_then(Value::as_object)
        .ok_or(Rejection::MissingParameters)?;

    let spec = schema_for(kind_name).ok_or_else(|| Rejection::UnknownKind(kind_name.to_string()))?;
    let kind = ActionKind::from_name(kind_name)
        .ok_or_else(|| Rejection::UnknownKind(kind_name.to_string()))?;

    for (field, shape) in spec.fields() {
        let Some(param) = parameters.get(field) else {
            return Err(Rejection::MissingField { kind, field });
        };
        if !shape.matches(param) {
            return Err(Rejection::WrongShape {
                kind,
                field,
                expected: shape.describe(),
            });
        }
    }

    Action::from_parts(kind, Value::Object(parameters.clone())).map_err(|e| Rejection::Payload {
        kind,
        reason: e.to_string(),
    })
}

fn kind_name(object: &Map<String, Value>) -> Option<&str> {
    object
        .get("kind")
        .or_else(|| object.get(LEGACY_KIND_KEY))
        .and_then(Value::as_str)
}

/// Whether the text opens like a JSON payload or a fenced code block.
/// A leading `[` only counts when an object follows it, since chat replies
/// open with `[color:...]` markup, citations and links.
fn looks_structured(text: &str) -> bool {
    if text.starts_with('{') || text.starts_with("```") {
        return true;
    }
    text.strip_prefix('[')
        .is_some_and(|rest| rest.trim_start().starts_with('{'))
}

fn plain(text: &str, rejection: Option<Rejection>) -> Classification {
    Classification::PlainText {
        text: text.to_string(),
        rejection,
    }
}
