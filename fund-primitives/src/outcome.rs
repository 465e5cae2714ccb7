//! Funding decision outcomes.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Describes the outcome of a funding evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Transfer may be authorized.
    Approved,
    /// Request is rejected; the rationale explains why.
    Denied,
    /// More input is needed from the requester before a decision.
    Pending,
}

impl Outcome {
    /// Returns `true` for outcomes that conclude a request.
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns the lower-case label used in logs and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Pending => "pending",
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
