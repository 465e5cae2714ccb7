//! Prompt rendering for the relay assistant.
//!
//! The funding rules shown to the language model are rendered from the same
//! criteria the engine enforces, so the prose and the policy cannot drift.

#![warn(missing_docs, clippy::pedantic)]

pub mod persona;
pub mod template;

pub use persona::{SystemInstruction, SystemInstructionBuilder};
pub use template::{PromptTemplate, TemplateError, TemplateResult};
