//! Funding decisions returned by the engine.

use chrono::{DateTime, Utc};
use fund_audit::{AuditRecord, AuditResult};
use fund_primitives::{Outcome, RequestId};
use serde::{Deserialize, Serialize};

/// Rationale shown when no usable address has been confirmed yet.
pub const ADDRESS_REQUIRED: &str = "address confirmation required";
/// Rationale shown once the exchange window has been exceeded.
pub const WINDOW_ELAPSED: &str = "decision window elapsed";
/// Rationale shown when the purpose matches no criterion.
pub const NO_ALIGNMENT: &str = "no alignment with funding goals";

/// Machine-readable basis for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No recipient address supplied yet.
    AddressRequired,
    /// An address was supplied but is malformed.
    InvalidAddressFormat,
    /// The exchange window elapsed before a decision.
    DeadlineExceeded,
    /// A disqualifying criterion matched.
    Disqualified,
    /// A positive criterion matched and nothing disqualified the request.
    Aligned,
    /// Nothing matched.
    NoAlignment,
    /// The request was aligned but asked for more than the per-request cap.
    AmountLimitExceeded,
}

/// Structured decision emitted by the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    request_id: RequestId,
    outcome: Outcome,
    reason: DecisionReason,
    rationale: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    matched_criteria: Vec<String>,
}

impl Decision {
    /// Returns an approval for the given request.
    #[must_use]
    pub fn approved(
        request_id: RequestId,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(request_id, Outcome::Approved, DecisionReason::Aligned, rationale, timestamp)
    }

    /// Returns a denial with an explanatory rationale.
    #[must_use]
    pub fn denied(
        request_id: RequestId,
        reason: DecisionReason,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(request_id, Outcome::Denied, reason, rationale, timestamp)
    }

    /// Returns a pending decision asking the caller to re-prompt.
    #[must_use]
    pub fn pending(
        request_id: RequestId,
        reason: DecisionReason,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(request_id, Outcome::Pending, reason, rationale, timestamp)
    }

    fn new(
        request_id: RequestId,
        outcome: Outcome,
        reason: DecisionReason,
        rationale: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            outcome,
            reason,
            rationale: rationale.into(),
            timestamp,
            matched_criteria: Vec::new(),
        }
    }

    /// Attaches the identifiers of the criteria behind the decision.
    #[must_use]
    pub fn with_matched_criteria(mut self, ids: Vec<String>) -> Self {
        self.matched_criteria = ids;
        self
    }

    /// Returns the request this decision concludes.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the outcome.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Returns the machine-readable reason.
    #[must_use]
    pub fn reason(&self) -> DecisionReason {
        self.reason
    }

    /// Returns the user-visible rationale.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Returns when the decision was made.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the identifiers of the criteria behind the decision.
    #[must_use]
    pub fn matched_criteria(&self) -> &[String] {
        &self.matched_criteria
    }

    /// Returns true when the transfer may proceed.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.outcome == Outcome::Approved
    }

    /// Returns true when the request was rejected.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.outcome == Outcome::Denied
    }

    /// Returns true when more input is needed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }

    /// Builds the audit line for a concluded decision.
    ///
    /// # Errors
    ///
    /// Fails for pending decisions, which are never audited.
    pub fn to_audit_record(&self) -> AuditResult<AuditRecord> {
        AuditRecord::new(self.timestamp, self.request_id, self.outcome, &self.rationale)
    }
}
