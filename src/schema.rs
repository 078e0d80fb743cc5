//! Schema registry for structured actions
//!
//! The set of action kinds is closed: adding one means adding an
//! `ActionKind` variant, its parameter spec, and a typed payload in
//! `crate::action`. Nothing is registered at runtime.

use serde_json::Value;
use std::fmt;

/// Primitive shape a required parameter must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    String,
    /// JSON array whose elements are all strings
    StringArray,
}

impl FieldShape {
    /// Check a JSON value against this shape. Arrays are never coerced:
    /// a single non-string element fails the whole field.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldShape::String => value.is_string(),
            FieldShape::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            FieldShape::String => "string",
            FieldShape::StringArray => "array of strings",
        }
    }
}

/// Required parameters of one action kind, in declaration order
#[derive(Debug, PartialEq, Eq)]
pub struct ParameterSpec {
    fields: &'static [(&'static str, FieldShape)],
}

impl ParameterSpec {
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, FieldShape)> + '_ {
        self.fields.iter().copied()
    }

    #[must_use]
    pub fn shape_of(&self, name: &str) -> Option<FieldShape> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, shape)| *shape)
    }
}

const AXIOM_NODE: ParameterSpec = ParameterSpec {
    fields: &[
        ("title", FieldShape::String),
        ("axioms", FieldShape::StringArray),
        ("subsequent_query", FieldShape::String),
    ],
};

const FOCUS_QUERY: ParameterSpec = ParameterSpec {
    fields: &[("query", FieldShape::String)],
};

const ISOMORPHISM: ParameterSpec = ParameterSpec {
    fields: &[
        ("title", FieldShape::String),
        ("isomorphic_system_description", FieldShape::String),
        ("concluding_query", FieldShape::String),
    ],
};

const SYNTHESIS_PROTOCOL: ParameterSpec = ParameterSpec {
    fields: &[
        ("language", FieldShape::String),
        ("scaffold_code", FieldShape::String),
        ("synthesis_task", FieldShape::String),
    ],
};

const COMPILE_SCHEMA: ParameterSpec = ParameterSpec {
    fields: &[("schema_points", FieldShape::StringArray)],
};

/// Every structured action the model may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Concept card: a title, its axioms, and a follow-up question
    RenderAxiomNode,
    /// Question answered through a dedicated input surface
    FocusQuery,
    /// Analogy between the topic and another system
    RenderIsomorphism,
    /// Code scaffold with a task for the user
    InitiateSynthesisProtocol,
    /// Summary of the points covered so far
    CompileSchema,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::RenderAxiomNode,
        ActionKind::FocusQuery,
        ActionKind::RenderIsomorphism,
        ActionKind::InitiateSynthesisProtocol,
        ActionKind::CompileSchema,
    ];

    /// Wire name used in the `kind` field
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::RenderAxiomNode => "render_axiom_node",
            ActionKind::FocusQuery => "focus_query",
            ActionKind::RenderIsomorphism => "render_isomorphism",
            ActionKind::InitiateSynthesisProtocol => "initiate_synthesis_protocol",
            ActionKind::CompileSchema => "compile_schema",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    #[must_use]
    pub fn spec(self) -> &'static ParameterSpec {
        match self {
            ActionKind::RenderAxiomNode => &AXIOM_NODE,
            ActionKind::FocusQuery => &FOCUS_QUERY,
            ActionKind::RenderIsomorphism => &ISOMORPHISM,
            ActionKind::InitiateSynthesisProtocol => &SYNTHESIS_PROTOCOL,
            ActionKind::CompileSchema => &COMPILE_SCHEMA,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up the required parameters for a wire kind name.
///
/// Unknown names return `None`, never an empty spec.
#[must_use]
pub fn schema_for(kind: &str) -> Option<&'static ParameterSpec> {
    ActionKind::from_name(kind).map(ActionKind::spec)
}
