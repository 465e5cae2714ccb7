//! Error types for the audit subsystem.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by audit components.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Underlying I/O failure while reading or writing the log file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// Audit record failed validation.
    #[error("invalid audit record: {0}")]
    InvalidRecord(&'static str),
    /// Storage backend rejected the write.
    #[error("audit backend failure: {reason}")]
    Backend {
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

impl AuditError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result type alias for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
