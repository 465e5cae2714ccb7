//! Per-session record of open funding requests.
//!
//! Each chat session holds at most one active request. Concluded requests are
//! moved into a bounded archive so a new ask starts a fresh window. A request
//! whose exchange count has passed the decision window is reported as elapsed;
//! [`crate::gate::AuthorizationGate::expire_session`] turns it into an audited
//! denial.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use fund_primitives::{RequestId, SessionId, UsdcAmount};
use thiserror::Error;
use tracing::{debug, info};

use crate::contracts::FundingRequest;
use crate::decision::{Decision, DecisionReason};
use crate::engine::DEFAULT_DECISION_WINDOW;
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleEvent, RequestState};

/// Errors emitted by the session ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No request is open for the session.
    #[error("no active funding request for session {session_id}")]
    NoActiveRequest {
        /// Session that was queried.
        session_id: SessionId,
    },
    /// A request is already open for the session.
    #[error("session {session_id} already has active request {request_id}")]
    AlreadyOpen {
        /// Session that was queried.
        session_id: SessionId,
        /// Request currently open.
        request_id: RequestId,
    },
    /// The open request's decision window has passed and it must be denied
    /// before the session can ask again.
    #[error("request {request_id} in session {session_id} is past its decision window")]
    WindowElapsed {
        /// Session that was queried.
        session_id: SessionId,
        /// Request awaiting its deadline denial.
        request_id: RequestId,
    },
    /// Decision belongs to a different request than the one open.
    #[error("decision for request {found} does not match active request {expected}")]
    RequestMismatch {
        /// Request open in the session.
        expected: RequestId,
        /// Request the decision refers to.
        found: RequestId,
    },
    /// The decision implied an invalid state transition.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A concluded request kept for inspection.
#[derive(Debug, Clone)]
pub struct ArchivedRequest {
    /// Request as it stood when concluded.
    pub request: FundingRequest,
    /// Terminal state reached.
    pub state: RequestState,
    /// Decision that concluded it.
    pub decision: Decision,
}

#[derive(Debug)]
struct Entry {
    request: FundingRequest,
    lifecycle: Lifecycle,
}

/// Active requests keyed by session, plus a bounded archive.
#[derive(Debug)]
pub struct SessionLedger {
    active: RwLock<HashMap<SessionId, Entry>>,
    archive: RwLock<VecDeque<ArchivedRequest>>,
    archive_capacity: NonZeroUsize,
    decision_window: u32,
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(256).expect("non-zero"))
    }
}

impl SessionLedger {
    /// Creates a ledger retaining up to `archive_capacity` concluded requests.
    #[must_use]
    pub fn new(archive_capacity: NonZeroUsize) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            archive: RwLock::new(VecDeque::with_capacity(archive_capacity.get())),
            archive_capacity,
            decision_window: DEFAULT_DECISION_WINDOW,
        }
    }

    /// Sets how many exchanges a request may take before it is elapsed.
    /// Keep it equal to the engine's window. Zero is treated as one.
    #[must_use]
    pub fn with_decision_window(mut self, decision_window: u32) -> Self {
        self.decision_window = decision_window.max(1);
        self
    }

    /// Returns the decision window used to detect elapsed requests.
    #[must_use]
    pub const fn decision_window(&self) -> u32 {
        self.decision_window
    }

    /// Returns whether `request` has taken more exchanges than the window.
    #[must_use]
    pub fn is_elapsed(&self, request: &FundingRequest) -> bool {
        request.exchange_count() > self.decision_window
    }

    fn active(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Entry>> {
        self.active.read().expect("session ledger poisoned")
    }

    fn active_mut(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Entry>> {
        self.active.write().expect("session ledger poisoned")
    }

    /// Opens a request on the first explicit ask in a session.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyOpen`] if the session already has an
    /// unresolved request, or [`LedgerError::WindowElapsed`] if that request
    /// is past its window and still has to be denied.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn open(
        &self,
        session_id: SessionId,
        requester: impl Into<String>,
        amount: UsdcAmount,
        purpose: impl Into<String>,
    ) -> LedgerResult<FundingRequest> {
        let mut active = self.active_mut();
        if let Some(entry) = active.get(&session_id) {
            let request_id = entry.request.id();
            if self.is_elapsed(&entry.request) {
                return Err(LedgerError::WindowElapsed {
                    session_id,
                    request_id,
                });
            }
            return Err(LedgerError::AlreadyOpen {
                session_id,
                request_id,
            });
        }

        let request = FundingRequest::new(session_id.clone(), requester, amount, purpose);
        info!(
            session_id = %session_id,
            request_id = %request.id(),
            amount = %request.amount(),
            "funding request opened"
        );
        active.insert(
            session_id,
            Entry {
                lifecycle: Lifecycle::new(request.id()),
                request: request.clone(),
            },
        );
        Ok(request)
    }

    /// Counts one more exchange for the session's request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoActiveRequest`] when nothing is open.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn record_exchange(&self, session_id: &SessionId) -> LedgerResult<u32> {
        let mut active = self.active_mut();
        let entry = active
            .get_mut(session_id)
            .ok_or_else(|| no_active(session_id))?;
        let count = entry.request.record_exchange();
        debug!(session_id = %session_id, exchange_count = count, "exchange recorded");
        Ok(count)
    }

    /// Stores the address the requester supplied; validation happens at
    /// evaluation time.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoActiveRequest`] when nothing is open.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn confirm_address(
        &self,
        session_id: &SessionId,
        address: impl Into<String>,
    ) -> LedgerResult<()> {
        let mut active = self.active_mut();
        let entry = active
            .get_mut(session_id)
            .ok_or_else(|| no_active(session_id))?;
        entry.request.confirm_address(address);
        Ok(())
    }

    /// Returns a copy of the session's open request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoActiveRequest`] when nothing is open.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn snapshot(&self, session_id: &SessionId) -> LedgerResult<FundingRequest> {
        self.active()
            .get(session_id)
            .map(|entry| entry.request.clone())
            .ok_or_else(|| no_active(session_id))
    }

    /// Returns the state of the session's open request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoActiveRequest`] when nothing is open.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn state(&self, session_id: &SessionId) -> LedgerResult<RequestState> {
        self.active()
            .get(session_id)
            .map(|entry| entry.lifecycle.state())
            .ok_or_else(|| no_active(session_id))
    }

    /// Drives the session's request with a decision, archiving it once a
    /// terminal state is reached.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RequestMismatch`] when the decision concerns a
    /// different request, or [`LedgerError::Lifecycle`] for impossible
    /// transitions.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    pub fn apply(&self, session_id: &SessionId, decision: &Decision) -> LedgerResult<RequestState> {
        let mut active = self.active_mut();
        let entry = active
            .get_mut(session_id)
            .ok_or_else(|| no_active(session_id))?;
        if entry.request.id() != decision.request_id() {
            return Err(LedgerError::RequestMismatch {
                expected: entry.request.id(),
                found: decision.request_id(),
            });
        }

        let events: &[LifecycleEvent] = match decision.reason() {
            DecisionReason::AddressRequired | DecisionReason::InvalidAddressFormat => {
                &[LifecycleEvent::AddressMissing]
            }
            DecisionReason::DeadlineExceeded => &[LifecycleEvent::DeadlineExpired],
            DecisionReason::Aligned => &[LifecycleEvent::AddressConfirmed, LifecycleEvent::Approve],
            DecisionReason::Disqualified
            | DecisionReason::NoAlignment
            | DecisionReason::AmountLimitExceeded => {
                &[LifecycleEvent::AddressConfirmed, LifecycleEvent::Deny]
            }
        };

        // Dry-run on a copy so a rejected event leaves the entry untouched.
        let mut lifecycle = entry.lifecycle;
        for event in events {
            lifecycle.transition(*event)?;
        }
        entry.lifecycle = lifecycle;
        let state = lifecycle.state();

        let concluded = if state.is_terminal() {
            active.remove(session_id)
        } else {
            None
        };
        drop(active);

        if let Some(entry) = concluded {
            self.archive(ArchivedRequest {
                request: entry.request,
                state,
                decision: decision.clone(),
            });
        }

        Ok(state)
    }

    fn archive(&self, archived: ArchivedRequest) {
        info!(
            session_id = %archived.request.session_id(),
            request_id = %archived.request.id(),
            state = ?archived.state,
            "funding request archived"
        );
        let mut archive = self.archive.write().expect("session ledger poisoned");
        archive.push_back(archived);
        while archive.len() > self.archive_capacity.get() {
            archive.pop_front();
        }
    }

    /// Returns up to `limit` most recently concluded requests, oldest first.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn archived(&self, limit: usize) -> Vec<ArchivedRequest> {
        let archive = self.archive.read().expect("session ledger poisoned");
        let skip = archive.len().saturating_sub(limit);
        archive.iter().skip(skip).cloned().collect()
    }

    /// Returns the sessions whose open request is past the decision window.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn elapsed_sessions(&self) -> Vec<SessionId> {
        self.active()
            .iter()
            .filter(|(_, entry)| self.is_elapsed(&entry.request))
            .map(|(session_id, _)| session_id.clone())
            .collect()
    }

    /// Returns the number of sessions with an open request.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock has been poisoned.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.active().len()
    }
}

fn no_active(session_id: &SessionId) -> LedgerError {
    LedgerError::NoActiveRequest {
        session_id: session_id.clone(),
    }
}
