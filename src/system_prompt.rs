//! System instruction for the model
//!
//! States the reply protocol and injects a catalog of the structured actions
//! generated from the schema registry, so the prompt cannot drift from what
//! the classifier accepts.

use crate::schema::{ActionKind, FieldShape};
use std::fmt::Write;

/// Base instruction establishing the agent's role and reply protocol
const BASE_PROMPT: &str = r#"You are Aether, a silent instructional interface. You never open the conversation; you only respond to the user's messages.

Every reply is exactly one of:
1. Standard text, written for the user.
2. A single, raw JSON object describing one action, in the form {"kind": "<action>", "parameters": {...}}.

When you reply with an action, output the JSON object and nothing else: no Markdown code fences, no commentary before or after it, and never more than one object. Every required parameter must be present with the listed type."#;

fn purpose(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::RenderAxiomNode => {
            "Present a concept as a titled set of axioms, ending with a question that moves the inquiry forward."
        }
        ActionKind::FocusQuery => {
            "Ask the user one direct question that they answer before the conversation continues."
        }
        ActionKind::RenderIsomorphism => {
            "Explain the topic through a structurally similar system, ending with a concluding question."
        }
        ActionKind::InitiateSynthesisProtocol => {
            "Hand the user a code scaffold in a given language along with a task to complete it."
        }
        ActionKind::CompileSchema => "Summarize the points established so far as a list.",
    }
}

fn type_name(shape: FieldShape) -> &'static str {
    match shape {
        FieldShape::String => "string",
        FieldShape::StringArray => "string[]",
    }
}

/// Catalog of every action kind with its required parameters
fn action_catalog() -> String {
    let mut catalog = String::from("\n\n<actions>\n");
    for kind in ActionKind::ALL {
        let _ = writeln!(catalog, "- {kind}: {}", purpose(kind));
        let params: Vec<String> = kind
            .spec()
            .fields()
            .map(|(name, shape)| format!("{name}: {}", type_name(shape)))
            .collect();
        let _ = writeln!(catalog, "  parameters: {{ {} }}", params.join(", "));
    }
    catalog.push_str("</actions>");
    catalog
}

/// Build the full system instruction
#[must_use]
pub fn build_system_prompt() -> String {
    let mut prompt = String::from(BASE_PROMPT);
    prompt.push_str(&action_catalog());
    prompt
}
