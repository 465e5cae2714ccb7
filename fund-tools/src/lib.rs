//! Function schemas for the relay assistant.
//!
//! [`FunctionCatalog::standard`] describes the functions the language model
//! may call. [`TransferArguments`] is the typed form of a `send_usdc` call;
//! it only ever feeds address confirmation, never a transfer.

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod schema;
pub mod transfer;

pub use catalog::{FunctionCall, FunctionCatalog, SEND_USDC};
pub use schema::{FunctionSchema, Parameter, ParameterKind};
pub use transfer::TransferArguments;

use thiserror::Error;

/// Result alias for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors produced by schema construction and call parsing.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Schema metadata failed validation.
    #[error("invalid function schema: {reason}")]
    InvalidSchema {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Function name collided with an existing entry.
    #[error("function `{name}` is already registered")]
    DuplicateFunction {
        /// Name of the offending function.
        name: String,
    },

    /// Requested function does not exist.
    #[error("function `{name}` is not registered")]
    UnknownFunction {
        /// Name of the missing function.
        name: String,
    },

    /// Call arguments did not match the schema.
    #[error("invalid arguments for `{function}`: {reason}")]
    InvalidArguments {
        /// Function being called.
        function: String,
        /// What was wrong.
        reason: String,
    },
}

impl ToolError {
    pub(crate) fn invalid_arguments(function: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function: function.to_owned(),
            reason: reason.into(),
        }
    }
}
