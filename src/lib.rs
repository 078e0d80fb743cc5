//! Aether - shielded conversational front-end for a generative model
//!
//! Classifies free-form model output into plain text or validated
//! structured actions, retries once with a corrective prompt when a
//! structured payload is malformed, and keeps the conversation log ordered
//! through a pure state machine.

pub mod action;
pub mod classifier;
pub mod config;
pub mod llm;
pub mod recovery;
pub mod runtime;
pub mod schema;
pub mod state_machine;
pub mod system_prompt;
