//! Typed structured actions
//!
//! Strongly typed parameter records for each `ActionKind`. The wire form is
//! `{"kind": "<name>", "parameters": {...}}`, which is also how an `Action`
//! serializes.

use crate::schema::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxiomNodeParams {
    pub title: String,
    pub axioms: Vec<String>,
    pub subsequent_query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusQueryParams {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsomorphismParams {
    pub title: String,
    pub isomorphic_system_description: String,
    pub concluding_query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisProtocolParams {
    pub language: String,
    pub scaffold_code: String,
    pub synthesis_task: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSchemaParams {
    pub schema_points: Vec<String>,
}

/// A validated structured action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "parameters", rename_all = "snake_case")]
pub enum Action {
    RenderAxiomNode(AxiomNodeParams),
    FocusQuery(FocusQueryParams),
    RenderIsomorphism(IsomorphismParams),
    InitiateSynthesisProtocol(SynthesisProtocolParams),
    CompileSchema(CompileSchemaParams),
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::RenderAxiomNode(_) => ActionKind::RenderAxiomNode,
            Action::FocusQuery(_) => ActionKind::FocusQuery,
            Action::RenderIsomorphism(_) => ActionKind::RenderIsomorphism,
            Action::InitiateSynthesisProtocol(_) => ActionKind::InitiateSynthesisProtocol,
            Action::CompileSchema(_) => ActionKind::CompileSchema,
        }
    }

    /// Whether this action is answered through the focus input rather than
    /// rendered into the message log
    #[must_use]
    pub fn is_focus_query(&self) -> bool {
        matches!(self, Action::FocusQuery(_))
    }

    /// Build the typed action for `kind` from its parameters object.
    ///
    /// Unknown extra fields are ignored. Callers validate against the
    /// registry first; this only fails if the payload disagrees with the
    /// typed record.
    pub fn from_parts(kind: ActionKind, parameters: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ActionKind::RenderAxiomNode => Action::RenderAxiomNode(serde_json::from_value(parameters)?),
            ActionKind::FocusQuery => Action::FocusQuery(serde_json::from_value(parameters)?),
            ActionKind::RenderIsomorphism => {
                Action::RenderIsomorphism(serde_json::from_value(parameters)?)
            }
            ActionKind::InitiateSynthesisProtocol => {
                Action::InitiateSynthesisProtocol(serde_json::from_value(parameters)?)
            }
            ActionKind::CompileSchema => Action::CompileSchema(serde_json::from_value(parameters)?),
        })
    }

    /// Plain-text rendering, used by the terminal driver and for logging
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Action::RenderAxiomNode(p) => {
                let mut out = format!("{}\n", p.title);
                for axiom in &p.axioms {
                    out.push_str("  - ");
                    out.push_str(axiom);
                    out.push('\n');
                }
                out.push_str(&p.subsequent_query);
                out
            }
            Action::FocusQuery(p) => p.query.clone(),
            Action::RenderIsomorphism(p) => format!(
                "{}\n{}\n{}",
                p.title, p.isomorphic_system_description, p.concluding_query
            ),
            Action::InitiateSynthesisProtocol(p) => format!(
                "[{}]\n{}\n{}",
                p.language, p.scaffold_code, p.synthesis_task
            ),
            Action::CompileSchema(p) => p
                .schema_points
                .iter()
                .map(|point| format!("  * {point}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
