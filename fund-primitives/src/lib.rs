//! Core shared types for the fund authorization gate.

#![warn(missing_docs, clippy::pedantic)]

mod address;
mod amount;
mod error;
mod ids;
mod outcome;

/// On-chain recipient address validation.
pub use address::RecipientAddress;
/// USDC-denominated fixed-point amounts.
pub use amount::UsdcAmount;
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifiers for funding requests and chat sessions.
pub use ids::{RequestId, SessionId};
/// Outcome of a funding decision.
pub use outcome::Outcome;
