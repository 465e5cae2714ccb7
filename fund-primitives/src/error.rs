//! Shared error definitions for fund primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the gate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided request identifier could not be parsed.
    #[error("invalid request id: {source}")]
    InvalidRequestId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Session identifier failed validation.
    #[error("invalid session id `{id}`: {reason}")]
    InvalidSessionId {
        /// The offending identifier string.
        id: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// Recipient address does not match the expected on-chain format.
    #[error("invalid address format `{address}`: {reason}")]
    InvalidAddressFormat {
        /// The rejected input.
        address: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },

    /// Amount could not be parsed or is out of range.
    #[error("invalid amount `{input}`: {reason}")]
    InvalidAmount {
        /// The rejected input.
        input: String,
        /// Human-readable reason for rejection.
        reason: &'static str,
    },
}
