//! Audit-before-authorize wrapper around a policy engine.
//!
//! The gate remembers every request it has concluded. A request is audited
//! once and handed to the executor at most once; an approval whose hand-off
//! failed is retried without a second audit record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use fund_audit::{AuditError, AuditLog};
use fund_primitives::{RequestId, SessionId, UsdcAmount};
use thiserror::Error;
use tracing::{info, warn};

use crate::contracts::{EvaluationContext, FundingRequest};
use crate::decision::{Decision, DecisionReason, WINDOW_ELAPSED};
use crate::engine::{PolicyEngine, PolicyError};
use crate::integrations::{Authorization, TransferExecutor};
use crate::ledger::{LedgerError, SessionLedger};

/// Errors surfaced while gating a transfer.
#[derive(Debug, Error)]
pub enum GateError {
    /// The engine could not evaluate the request.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The decision could not be persisted; nothing was authorized.
    #[error("audit write failed for request {request_id}: {source}")]
    Audit {
        /// Request whose decision was not persisted.
        request_id: RequestId,
        /// Underlying audit failure.
        #[source]
        source: AuditError,
    },
    /// Earlier decisions could not be read back from the audit log.
    #[error("audit history unavailable: {0}")]
    History(#[source] AuditError),
    /// The request was already concluded, or is being concluded right now.
    #[error("request {request_id} has already been decided")]
    AlreadyConcluded {
        /// Request that was submitted again.
        request_id: RequestId,
    },
    /// The executor refused the authorization after it was audited.
    #[error("transfer executor rejected request {request_id}: {source}")]
    Executor {
        /// Request that was approved and audited.
        request_id: RequestId,
        /// Underlying executor failure.
        #[source]
        source: PolicyError,
    },
    /// Session bookkeeping failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;

/// Decision plus the authorization emitted for it, if any.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// The engine's decision.
    pub decision: Decision,
    /// Authorization handed to the executor; only set for approvals.
    pub authorization: Option<Authorization>,
}

#[derive(Debug, Clone)]
enum Settlement {
    /// Being audited or handed off.
    InFlight,
    /// Audited approval the executor has not accepted yet.
    AwaitingHandOff(Decision),
    /// Denied, or approved and handed off.
    Closed,
}

/// Runs the engine, persists concluded decisions, and only then signals the
/// transfer executor.
#[derive(Clone)]
pub struct AuthorizationGate {
    engine: Arc<dyn PolicyEngine>,
    audit: Arc<dyn AuditLog>,
    executor: Arc<dyn TransferExecutor>,
    settled: Arc<Mutex<HashMap<RequestId, Settlement>>>,
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

impl AuthorizationGate {
    /// Creates a gate over the given engine, audit log, and executor.
    #[must_use]
    pub fn new(
        engine: Arc<dyn PolicyEngine>,
        audit: Arc<dyn AuditLog>,
        executor: Arc<dyn TransferExecutor>,
    ) -> Self {
        Self {
            engine,
            audit,
            executor,
            settled: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn settled(&self) -> MutexGuard<'_, HashMap<RequestId, Settlement>> {
        self.settled.lock().expect("gate settlements poisoned")
    }

    /// Marks every request found in the audit log as concluded, so a fresh
    /// process never decides them again. Returns the number of requests
    /// recalled.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::History`] when the log cannot be read.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn recall_concluded(&self) -> GateResult<usize> {
        let records = self
            .audit
            .tail(usize::MAX)
            .await
            .map_err(GateError::History)?;
        let mut settled = self.settled();
        for record in &records {
            settled
                .entry(record.request_id())
                .or_insert(Settlement::Closed);
        }
        Ok(records.len())
    }

    /// Evaluates a request and, for approvals, emits an authorization.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::AlreadyConcluded`] for a request this gate has
    /// already decided, and [`GateError::Audit`] when a concluded decision
    /// could not be persisted; no authorization is emitted in either case.
    /// After [`GateError::Executor`] the same request may be submitted again
    /// to retry the hand-off.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn process(
        &self,
        request: &FundingRequest,
        context: &EvaluationContext,
    ) -> GateResult<GateOutcome> {
        let decision = self.decide(request, context).await?;
        self.authorize(request, decision).await
    }

    /// Evaluates the session's open request and, once any authorization has
    /// been accepted by the executor, records the result in the ledger.
    ///
    /// # Errors
    ///
    /// Propagates ledger, policy, audit, and executor failures. On audit or
    /// executor failure the request stays open in the ledger and the call
    /// can be retried.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn process_session(
        &self,
        ledger: &SessionLedger,
        session_id: &SessionId,
        context: &EvaluationContext,
    ) -> GateResult<GateOutcome> {
        let request = ledger.snapshot(session_id)?;
        let decision = self.decide(&request, context).await?;
        let outcome = self.authorize(&request, decision).await?;
        ledger.apply(session_id, &outcome.decision)?;
        Ok(outcome)
    }

    /// Denies and archives the session's request if it is past the ledger's
    /// decision window. Returns `None` while the window is still open.
    ///
    /// # Errors
    ///
    /// Propagates ledger and audit failures, and
    /// [`GateError::AlreadyConcluded`] for an approval still awaiting its
    /// hand-off.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn expire_session(
        &self,
        ledger: &SessionLedger,
        session_id: &SessionId,
        context: &EvaluationContext,
    ) -> GateResult<Option<Decision>> {
        let request = ledger.snapshot(session_id)?;
        if !ledger.is_elapsed(&request) {
            return Ok(None);
        }

        let decision = Decision::denied(
            request.id(),
            DecisionReason::DeadlineExceeded,
            WINDOW_ELAPSED,
            context.evaluated_at(),
        );
        let decision = self.record(request.id(), decision).await?;
        ledger.apply(session_id, &decision)?;
        Ok(Some(decision))
    }

    /// Expires every elapsed request in the ledger.
    ///
    /// # Errors
    ///
    /// Stops at the first session that could not be expired.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn expire_elapsed(
        &self,
        ledger: &SessionLedger,
        context: &EvaluationContext,
    ) -> GateResult<Vec<Decision>> {
        let mut expired = Vec::new();
        for session_id in ledger.elapsed_sessions() {
            if let Some(decision) = self.expire_session(ledger, &session_id, context).await? {
                expired.push(decision);
            }
        }
        Ok(expired)
    }

    /// Opens a request for the session, first denying an open request whose
    /// window has passed so the new ask starts a fresh window.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyOpen`] (wrapped) while a request is still
    /// within its window, and propagates audit failures from the expiry.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub async fn open_session(
        &self,
        ledger: &SessionLedger,
        session_id: SessionId,
        requester: impl Into<String>,
        amount: UsdcAmount,
        purpose: impl Into<String>,
        context: &EvaluationContext,
    ) -> GateResult<FundingRequest> {
        match self.expire_session(ledger, &session_id, context).await {
            Ok(_) | Err(GateError::Ledger(LedgerError::NoActiveRequest { .. })) => {}
            Err(err) => return Err(err),
        }
        Ok(ledger.open(session_id, requester, amount, purpose)?)
    }

    async fn decide(
        &self,
        request: &FundingRequest,
        context: &EvaluationContext,
    ) -> GateResult<Decision> {
        let request_id = request.id();
        if let Some(decision) = self.resume(request_id)? {
            info!(request_id = %request_id, "retrying hand-off of audited approval");
            return Ok(decision);
        }

        let decision = self.engine.evaluate(request, context)?;
        self.record(request_id, decision).await
    }

    /// Picks up an audited approval whose hand-off failed earlier.
    fn resume(&self, request_id: RequestId) -> GateResult<Option<Decision>> {
        let mut settled = self.settled();
        let decision = match settled.get(&request_id) {
            None => return Ok(None),
            Some(Settlement::AwaitingHandOff(decision)) => decision.clone(),
            Some(Settlement::InFlight | Settlement::Closed) => {
                return Err(GateError::AlreadyConcluded { request_id });
            }
        };
        settled.insert(request_id, Settlement::InFlight);
        Ok(Some(decision))
    }

    async fn record(&self, request_id: RequestId, decision: Decision) -> GateResult<Decision> {
        if decision.is_pending() {
            return Ok(decision);
        }

        {
            let mut settled = self.settled();
            if settled.contains_key(&request_id) {
                return Err(GateError::AlreadyConcluded { request_id });
            }
            settled.insert(request_id, Settlement::InFlight);
        }

        let persisted = match decision.to_audit_record() {
            Ok(record) => self.audit.append(&record).await,
            Err(err) => Err(err),
        };
        if let Err(source) = persisted {
            self.settled().remove(&request_id);
            warn!(
                request_id = %request_id,
                outcome = %decision.outcome(),
                error = %source,
                "audit write failed; withholding authorization"
            );
            return Err(GateError::Audit { request_id, source });
        }

        if !decision.is_approved() {
            self.settled().insert(request_id, Settlement::Closed);
        }
        Ok(decision)
    }

    async fn authorize(
        &self,
        request: &FundingRequest,
        decision: Decision,
    ) -> GateResult<GateOutcome> {
        if !decision.is_approved() {
            return Ok(GateOutcome {
                decision,
                authorization: None,
            });
        }

        let request_id = request.id();
        let handed_off = match Authorization::for_request(request) {
            Ok(authorization) => self
                .executor
                .submit(&authorization)
                .await
                .map(|()| authorization)
                .map_err(|source| GateError::Executor { request_id, source }),
            Err(err) => Err(err.into()),
        };
        let authorization = match handed_off {
            Ok(authorization) => authorization,
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    error = %err,
                    "hand-off failed; approval kept for retry"
                );
                self.settled()
                    .insert(request_id, Settlement::AwaitingHandOff(decision));
                return Err(err);
            }
        };

        self.settled().insert(request_id, Settlement::Closed);
        info!(
            request_id = %authorization.request_id,
            recipient = %authorization.recipient_address,
            amount = %authorization.amount,
            "transfer authorized"
        );

        Ok(GateOutcome {
            decision,
            authorization: Some(authorization),
        })
    }
}
