//! Audit record schema.

use chrono::{DateTime, Utc};
use fund_primitives::{Outcome, RequestId};
use serde::{Deserialize, Serialize};

use crate::{AuditError, AuditResult};

/// A single line of the audit log: `{timestamp, request_id, outcome, rationale}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    timestamp: DateTime<Utc>,
    request_id: RequestId,
    outcome: Outcome,
    rationale: String,
}

impl AuditRecord {
    /// Creates a record for a concluded decision.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidRecord`] for pending outcomes or an empty
    /// rationale; only concluded decisions belong in the trail.
    pub fn new(
        timestamp: DateTime<Utc>,
        request_id: RequestId,
        outcome: Outcome,
        rationale: impl Into<String>,
    ) -> AuditResult<Self> {
        if !outcome.is_final() {
            return Err(AuditError::InvalidRecord(
                "pending decisions are not audited",
            ));
        }
        let rationale = rationale.into();
        if rationale.trim().is_empty() {
            return Err(AuditError::InvalidRecord(
                "audited decisions require a rationale",
            ));
        }

        Ok(Self {
            timestamp,
            request_id,
            outcome,
            rationale,
        })
    }

    /// Returns when the decision was made.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the request the decision concluded.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the recorded outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the user-visible rationale.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }
}
