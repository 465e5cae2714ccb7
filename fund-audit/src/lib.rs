//! Append-only audit trail for funding decisions.
//!
//! Every concluded decision is written here before a transfer may be
//! authorized. Records are newline-delimited JSON so operators can inspect the
//! trail with ordinary tooling.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod log;
pub mod record;

pub use error::{AuditError, AuditResult};
pub use log::{AuditLog, FileAuditLog, InMemoryAuditLog};
pub use record::AuditRecord;
