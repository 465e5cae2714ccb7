//! Fund authorization policy for the relay assistant.
//!
//! [`engine::FundAuthorizationEngine`] turns a [`contracts::FundingRequest`]
//! into a [`decision::Decision`] without touching I/O. The
//! [`gate::AuthorizationGate`] wraps it with the audit-before-authorize
//! ordering, and [`ledger::SessionLedger`] keeps one request per chat session.

#![warn(missing_docs, clippy::pedantic)]

pub mod contracts;
pub mod criteria;
pub mod decision;
pub mod engine;
pub mod gate;
pub mod integrations;
pub mod ledger;
pub mod lifecycle;

pub use contracts::{EvaluationContext, FundingRequest};
pub use criteria::{AlignmentAssessment, AlignmentCriteria, Criterion, CriterionKind, CriterionMatch};
pub use decision::{Decision, DecisionReason};
pub use engine::{EngineSettings, FundAuthorizationEngine, PolicyEngine, PolicyError, PolicyResult};
pub use gate::{AuthorizationGate, GateError, GateOutcome, GateResult};
pub use integrations::{Authorization, ChannelExecutor, TransferExecutor};
pub use ledger::{ArchivedRequest, LedgerError, LedgerResult, SessionLedger};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleEvent, RequestState};
