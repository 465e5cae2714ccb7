//! Policy engine trait and the deterministic fund authorization engine.

use std::sync::Arc;

use fund_primitives::UsdcAmount;
use thiserror::Error;
use tracing::{debug, info};

use crate::contracts::{EvaluationContext, FundingRequest};
use crate::criteria::AlignmentCriteria;
use crate::decision::{
    ADDRESS_REQUIRED, Decision, DecisionReason, NO_ALIGNMENT, WINDOW_ELAPSED,
};

/// Number of exchanges a request stays eligible for when not configured.
pub const DEFAULT_DECISION_WINDOW: u32 = 5;

/// Errors surfaced by policy engines.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Request failed validation before evaluation.
    #[error("invalid funding request: {0}")]
    InvalidRequest(&'static str),
    /// Criterion configuration error.
    #[error("invalid criterion `{id}`: {reason}")]
    InvalidCriterion {
        /// Identifier of the offending criterion (may be empty).
        id: String,
        /// Human-readable explanation.
        reason: &'static str,
    },
    /// Engine settings were rejected.
    #[error("invalid engine settings: {0}")]
    InvalidSettings(&'static str),
    /// Backend integration returned an error.
    #[error("policy backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
}

impl PolicyError {
    pub(crate) fn invalid_criterion(id: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidCriterion {
            id: id.into(),
            reason,
        }
    }

    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Trait implemented by policy engines.
///
/// Evaluation is synchronous and free of I/O; persistence and transfer
/// signalling happen in [`crate::gate::AuthorizationGate`].
pub trait PolicyEngine: Send + Sync {
    /// Evaluates the supplied funding request.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRequest`] for requests that cannot be
    /// judged at all.
    fn evaluate(
        &self,
        request: &FundingRequest,
        context: &EvaluationContext,
    ) -> PolicyResult<Decision>;
}

/// Tunables loaded at startup alongside the criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    decision_window: u32,
    max_amount: Option<UsdcAmount>,
}

impl EngineSettings {
    /// Creates settings with the given decision window.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidSettings`] for a zero-length window.
    pub fn new(decision_window: u32) -> PolicyResult<Self> {
        if decision_window == 0 {
            return Err(PolicyError::InvalidSettings(
                "decision window must allow at least one exchange",
            ));
        }
        Ok(Self {
            decision_window,
            max_amount: None,
        })
    }

    /// Caps the amount a single request may be approved for.
    #[must_use]
    pub fn with_max_amount(mut self, max_amount: UsdcAmount) -> Self {
        self.max_amount = Some(max_amount);
        self
    }

    /// Returns the number of exchanges a request stays eligible for.
    #[must_use]
    pub const fn decision_window(&self) -> u32 {
        self.decision_window
    }

    /// Returns the per-request cap, if any.
    #[must_use]
    pub const fn max_amount(&self) -> Option<UsdcAmount> {
        self.max_amount
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            decision_window: DEFAULT_DECISION_WINDOW,
            max_amount: None,
        }
    }
}

/// Deterministic engine enforcing address confirmation, the exchange
/// deadline, and alignment with the funding goals.
#[derive(Debug, Clone)]
pub struct FundAuthorizationEngine {
    criteria: Arc<AlignmentCriteria>,
    settings: EngineSettings,
}

impl FundAuthorizationEngine {
    /// Constructs an engine over a fixed criteria set.
    #[must_use]
    pub fn new(criteria: Arc<AlignmentCriteria>, settings: EngineSettings) -> Self {
        Self { criteria, settings }
    }

    /// Returns the criteria the engine judges against.
    #[must_use]
    pub fn criteria(&self) -> &AlignmentCriteria {
        &self.criteria
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    fn judge(
        &self,
        request: &FundingRequest,
        context: &EvaluationContext,
    ) -> PolicyResult<Decision> {
        let id = request.id();
        let at = context.evaluated_at();

        // Checked ahead of the address so an expired request never lingers
        // as pending.
        if request.exchange_count() > self.settings.decision_window {
            return Ok(Decision::denied(id, DecisionReason::DeadlineExceeded, WINDOW_ELAPSED, at));
        }

        match request.parsed_address() {
            None => {
                return Ok(Decision::pending(
                    id,
                    DecisionReason::AddressRequired,
                    ADDRESS_REQUIRED,
                    at,
                ));
            }
            Some(Err(err)) => {
                return Ok(Decision::pending(
                    id,
                    DecisionReason::InvalidAddressFormat,
                    format!("{ADDRESS_REQUIRED}: {err}"),
                    at,
                ));
            }
            Some(Ok(_)) => {}
        }

        // Expired and pending requests are answered before validation.
        if request.amount().is_zero() {
            return Err(PolicyError::InvalidRequest("requested amount must be positive"));
        }
        if request.purpose().trim().is_empty() {
            return Err(PolicyError::InvalidRequest("a stated purpose is required"));
        }

        let assessment = self.criteria.assess(request.purpose());
        if assessment.is_disqualified() {
            let ids = assessment.disqualifying.iter().map(|m| m.id.clone()).collect();
            return Ok(Decision::denied(
                id,
                DecisionReason::Disqualified,
                format!("disqualified: {}", assessment.describe_disqualifying()),
                at,
            )
            .with_matched_criteria(ids));
        }

        if !assessment.is_aligned() {
            return Ok(Decision::denied(id, DecisionReason::NoAlignment, NO_ALIGNMENT, at));
        }

        let ids = assessment.positive.iter().map(|m| m.id.clone()).collect();
        if let Some(limit) = self.settings.max_amount
            && request.amount() > limit
        {
            return Ok(Decision::denied(
                id,
                DecisionReason::AmountLimitExceeded,
                format!("requested amount exceeds the per-request limit of {limit} USDC"),
                at,
            )
            .with_matched_criteria(ids));
        }

        Ok(Decision::approved(
            id,
            format!("aligned with funding goals: {}", assessment.describe_positive()),
            at,
        )
        .with_matched_criteria(ids))
    }
}

impl PolicyEngine for FundAuthorizationEngine {
    fn evaluate(
        &self,
        request: &FundingRequest,
        context: &EvaluationContext,
    ) -> PolicyResult<Decision> {
        let decision = self.judge(request, context)?;
        debug!(
            request_id = %request.id(),
            exchange_count = request.exchange_count(),
            matched = ?decision.matched_criteria(),
            "funding request evaluated"
        );
        info!(
            request_id = %request.id(),
            session_id = %request.session_id(),
            outcome = %decision.outcome(),
            reason = ?decision.reason(),
            "funding decision"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use fund_primitives::{Outcome, SessionId};

    use super::*;
    use crate::criteria::{Criterion, CriterionKind};

    const ADDRESS: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

    fn engine(settings: EngineSettings) -> FundAuthorizationEngine {
        let criteria = AlignmentCriteria::new([
            Criterion::new("documentation", "documentation contributions", CriterionKind::Positive, ["docs"]).unwrap(),
            Criterion::new("community", "community building", CriterionKind::Positive, ["community", "workshop"]).unwrap(),
            Criterion::new("personal", "personal expenses", CriterionKind::Disqualifying, ["personal", "rent"]).unwrap(),
        ])
        .unwrap();
        FundAuthorizationEngine::new(Arc::new(criteria), settings)
    }

    fn request(purpose: &str) -> FundingRequest {
        FundingRequest::new(
            SessionId::new("chat").unwrap(),
            "@requester",
            UsdcAmount::from_whole(100).unwrap(),
            purpose,
        )
    }

    fn evaluate(engine: &FundAuthorizationEngine, request: &FundingRequest) -> Decision {
        engine
            .evaluate(request, &EvaluationContext::at(Utc::now()))
            .unwrap()
    }

    #[test]
    fn missing_address_is_pending() {
        let decision = evaluate(&engine(EngineSettings::default()), &request("docs"));
        assert_eq!(decision.outcome(), Outcome::Pending);
        assert_eq!(decision.rationale(), ADDRESS_REQUIRED);
    }

    #[test]
    fn malformed_address_is_pending_with_distinct_reason() {
        let request = request("docs").with_recipient_address("0x1234");
        let decision = evaluate(&engine(EngineSettings::default()), &request);
        assert!(decision.is_pending());
        assert_eq!(decision.reason(), DecisionReason::InvalidAddressFormat);
        assert!(decision.rationale().starts_with(ADDRESS_REQUIRED));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let engine = engine(EngineSettings::default());
        let at_limit = request("docs").with_recipient_address(ADDRESS).with_exchange_count(5);
        assert!(evaluate(&engine, &at_limit).is_approved());

        let past_limit = at_limit.clone().with_exchange_count(6);
        let decision = evaluate(&engine, &past_limit);
        assert_eq!(decision.reason(), DecisionReason::DeadlineExceeded);
    }

    #[test]
    fn expired_request_without_address_is_denied() {
        let decision = evaluate(
            &engine(EngineSettings::default()),
            &request("docs").with_exchange_count(9),
        );
        assert!(decision.is_denied());
        assert_eq!(decision.rationale(), WINDOW_ELAPSED);
    }

    #[test]
    fn disqualifiers_dominate_positive_matches() {
        let request = request("community docs for my personal blog").with_recipient_address(ADDRESS);
        let decision = evaluate(&engine(EngineSettings::default()), &request);
        assert!(decision.is_denied());
        assert_eq!(decision.matched_criteria(), ["personal"]);
        assert!(decision.rationale().contains("personal expenses"));
    }

    #[test]
    fn unmatched_purpose_is_denied() {
        let request = request("a new yacht").with_recipient_address(ADDRESS);
        let decision = evaluate(&engine(EngineSettings::default()), &request);
        assert_eq!(decision.reason(), DecisionReason::NoAlignment);
        assert_eq!(decision.rationale(), NO_ALIGNMENT);
    }

    #[test]
    fn amount_cap_applies_only_to_aligned_requests() {
        let settings = EngineSettings::default().with_max_amount(UsdcAmount::from_whole(50).unwrap());
        let engine = engine(settings);

        let decision = evaluate(&engine, &request("docs").with_recipient_address(ADDRESS));
        assert_eq!(decision.reason(), DecisionReason::AmountLimitExceeded);
        assert!(decision.rationale().contains("50 USDC"));

        let decision = evaluate(&engine, &request("rent").with_recipient_address(ADDRESS));
        assert_eq!(decision.reason(), DecisionReason::Disqualified);
    }

    #[test]
    fn rejects_zero_amount_and_blank_purpose() {
        let engine = engine(EngineSettings::default());
        let zero = FundingRequest::new(SessionId::new("chat").unwrap(), "@r", UsdcAmount::ZERO, "docs")
            .with_recipient_address(ADDRESS);
        assert!(matches!(
            engine.evaluate(&zero, &EvaluationContext::now()),
            Err(PolicyError::InvalidRequest(_))
        ));
        let blank = request("  ").with_recipient_address(ADDRESS);
        assert!(engine.evaluate(&blank, &EvaluationContext::now()).is_err());
    }

    #[test]
    fn expired_invalid_requests_are_still_denied() {
        let engine = engine(EngineSettings::default());
        let zero = FundingRequest::new(SessionId::new("chat").unwrap(), "@r", UsdcAmount::ZERO, "docs")
            .with_recipient_address(ADDRESS)
            .with_exchange_count(9);
        let decision = evaluate(&engine, &zero);
        assert!(decision.is_denied());
        assert_eq!(decision.rationale(), WINDOW_ELAPSED);

        let blank = request(" ").with_recipient_address(ADDRESS).with_exchange_count(6);
        assert_eq!(evaluate(&engine, &blank).reason(), DecisionReason::DeadlineExceeded);
    }

    #[test]
    fn invalid_request_without_address_is_pending() {
        let engine = engine(EngineSettings::default());
        let zero = FundingRequest::new(SessionId::new("chat").unwrap(), "@r", UsdcAmount::ZERO, "docs");
        let decision = evaluate(&engine, &zero);
        assert!(decision.is_pending());
        assert_eq!(decision.rationale(), ADDRESS_REQUIRED);

        let blank = request("").with_recipient_address("0x12");
        assert_eq!(evaluate(&engine, &blank).reason(), DecisionReason::InvalidAddressFormat);
    }

    #[test]
    fn settings_reject_zero_window() {
        assert!(matches!(
            EngineSettings::new(0),
            Err(PolicyError::InvalidSettings(_))
        ));
        assert_eq!(EngineSettings::new(3).unwrap().decision_window(), 3);
    }
}
