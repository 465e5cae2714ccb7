//! Configuration management for the fund authorization gate.
//!
//! Alignment criteria and the decision window are read once at startup and
//! never mutated afterwards.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigResult, from_toml_str, load, load_or_default};
pub use schema::{CriterionConfig, GateConfig, PersonaConfig};
