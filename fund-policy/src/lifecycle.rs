//! Per-request state machine.

use fund_primitives::RequestId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// States a funding request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Request opened on the first explicit ask.
    Created,
    /// Waiting for the requester to confirm a valid recipient address.
    AwaitingAddress,
    /// Address confirmed; alignment is being judged.
    Evaluating,
    /// Transfer authorized.
    Approved,
    /// Request rejected, including by deadline expiry.
    Denied,
}

impl RequestState {
    /// Returns `true` once no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }
}

/// Events that trigger request transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// No valid address is available yet.
    AddressMissing,
    /// A valid address has been confirmed.
    AddressConfirmed,
    /// Alignment checks passed.
    Approve,
    /// Alignment checks failed.
    Deny,
    /// The exchange window elapsed.
    DeadlineExpired,
}

/// Request state manager.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    request_id: RequestId,
    state: RequestState,
}

impl Lifecycle {
    /// Constructs a lifecycle for a freshly created request.
    #[must_use]
    pub const fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RequestState::Created,
        }
    }

    /// Returns the owning request identifier.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: LifecycleEvent) -> LifecycleResult<RequestState> {
        let next = match (self.state, event) {
            (RequestState::Created | RequestState::AwaitingAddress, LifecycleEvent::AddressMissing) => {
                Some(RequestState::AwaitingAddress)
            }
            (RequestState::Created | RequestState::AwaitingAddress, LifecycleEvent::AddressConfirmed) => {
                Some(RequestState::Evaluating)
            }
            (RequestState::Evaluating, LifecycleEvent::Approve) => Some(RequestState::Approved),
            (RequestState::Evaluating, LifecycleEvent::Deny)
            | (
                RequestState::Created | RequestState::AwaitingAddress | RequestState::Evaluating,
                LifecycleEvent::DeadlineExpired,
            ) => Some(RequestState::Denied),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                request_id: self.request_id,
                from: self.state,
                event,
            });
        };

        if next_state != self.state {
            debug!(
                request_id = %self.request_id,
                from = ?self.state,
                to = ?next_state,
                ?event,
                "funding request transition"
            );
            self.state = next_state;
        }

        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid transition from {from:?} via {event:?} for request {request_id}")]
    InvalidTransition {
        /// Identifier of the request whose transition failed.
        request_id: RequestId,
        /// State prior to the attempted transition.
        from: RequestState,
        /// Event that triggered the failure.
        event: LifecycleEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
