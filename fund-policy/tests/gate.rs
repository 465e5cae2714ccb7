use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use fund_audit::{AuditError, AuditLog, AuditRecord, AuditResult, FileAuditLog, InMemoryAuditLog};
use fund_policy::decision::WINDOW_ELAPSED;
use fund_policy::{
    AlignmentCriteria, Authorization, ChannelExecutor, Criterion, CriterionKind, DecisionReason,
    EngineSettings, EvaluationContext, FundAuthorizationEngine, FundingRequest, GateError,
    AuthorizationGate, LedgerError, PolicyError, PolicyResult, RequestState, SessionLedger,
    TransferExecutor,
};
use fund_primitives::{Outcome, SessionId, UsdcAmount};

const ADDRESS: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

struct FailingAuditLog {
    attempts: AtomicUsize,
}

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _record: &AuditRecord) -> AuditResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AuditError::backend("disk full"))
    }

    async fn tail(&self, _limit: usize) -> AuditResult<Vec<AuditRecord>> {
        Ok(Vec::new())
    }
}

/// Refuses the first `failures` submissions, then accepts.
struct FlakyExecutor {
    failures: usize,
    attempts: AtomicUsize,
    accepted: std::sync::Mutex<Vec<Authorization>>,
}

impl FlakyExecutor {
    fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
            accepted: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransferExecutor for FlakyExecutor {
    async fn submit(&self, authorization: &Authorization) -> PolicyResult<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(PolicyError::backend("signer offline"));
        }
        self.accepted.lock().unwrap().push(authorization.clone());
        Ok(())
    }
}

fn engine() -> Arc<FundAuthorizationEngine> {
    let criteria = AlignmentCriteria::new([
        Criterion::new(
            "developer_tooling",
            "developer tooling",
            CriterionKind::Positive,
            ["dev tool", "sdk"],
        )
        .unwrap(),
        Criterion::new(
            "speculative_trading",
            "speculative trading",
            CriterionKind::Disqualifying,
            ["trading"],
        )
        .unwrap(),
    ])
    .unwrap();
    Arc::new(FundAuthorizationEngine::new(
        Arc::new(criteria),
        EngineSettings::default(),
    ))
}

fn request(purpose: &str) -> FundingRequest {
    FundingRequest::new(
        SessionId::new("chat-9").unwrap(),
        "@builder",
        UsdcAmount::parse("75.5").unwrap(),
        purpose,
    )
}

#[tokio::test]
async fn approval_is_audited_then_authorized() {
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));

    let request = request("an sdk for wallets").with_recipient_address(ADDRESS);
    let outcome = gate
        .process(&request, &EvaluationContext::now())
        .await
        .unwrap();

    assert!(outcome.decision.is_approved());
    let records = audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome(), Outcome::Approved);
    assert_eq!(records[0].request_id(), request.id());

    let authorization = receiver.try_recv().expect("authorization emitted");
    assert_eq!(authorization.request_id, request.id());
    assert_eq!(authorization.amount.to_string(), "75.5");
    assert_eq!(authorization.recipient_address.as_str(), ADDRESS);
    assert_eq!(outcome.authorization, Some(authorization));
}

#[tokio::test]
async fn audit_failure_withholds_authorization() {
    let audit = Arc::new(FailingAuditLog {
        attempts: AtomicUsize::new(0),
    });
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));

    let request = request("dev tool for auditors").with_recipient_address(ADDRESS);
    let err = gate
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("audit failure must surface");

    assert!(matches!(err, GateError::Audit { .. }));
    assert_eq!(audit.attempts.load(Ordering::SeqCst), 1);
    assert!(receiver.try_recv().is_err(), "no authorization may be emitted");

    // An unpersisted decision does not count as concluded.
    let err = gate
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("still failing");
    assert!(matches!(err, GateError::Audit { .. }));
    assert_eq!(audit.attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn replayed_request_is_authorized_once() {
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let request = request("an sdk for wallets").with_recipient_address(ADDRESS);

    gate.process(&request, &EvaluationContext::now()).await.unwrap();
    let err = gate
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("second run must be refused");
    assert!(matches!(err, GateError::AlreadyConcluded { request_id } if request_id == request.id()));

    // Clones share what has been decided.
    let err = gate
        .clone()
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("clone must refuse too");
    assert!(matches!(err, GateError::AlreadyConcluded { .. }));

    assert!(receiver.try_recv().is_ok());
    assert!(receiver.try_recv().is_err(), "exactly one authorization");
    assert_eq!(audit.records().await.len(), 1);
}

#[tokio::test]
async fn replayed_denial_is_audited_once() {
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, _receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let request = request("trading bot").with_recipient_address(ADDRESS);

    let outcome = gate.process(&request, &EvaluationContext::now()).await.unwrap();
    assert!(outcome.decision.is_denied());
    assert!(matches!(
        gate.process(&request, &EvaluationContext::now()).await,
        Err(GateError::AlreadyConcluded { .. })
    ));
    assert_eq!(audit.records().await.len(), 1);
}

#[tokio::test]
async fn recalled_history_refuses_requests_decided_by_an_earlier_gate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    let request = request("an sdk for wallets").with_recipient_address(ADDRESS);

    let (executor, mut first_receiver) = ChannelExecutor::new(8);
    let first = AuthorizationGate::new(
        engine(),
        Arc::new(FileAuditLog::open(&path).await.unwrap()),
        Arc::new(executor),
    );
    first.process(&request, &EvaluationContext::now()).await.unwrap();
    assert!(first_receiver.try_recv().is_ok());

    let audit = Arc::new(FileAuditLog::open(&path).await.unwrap());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let second = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    assert_eq!(second.recall_concluded().await.unwrap(), 1);

    let err = second
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("already in the audit log");
    assert!(matches!(err, GateError::AlreadyConcluded { .. }));
    assert!(receiver.try_recv().is_err());
    assert_eq!(audit.tail(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_hand_off_is_retried_without_reauditing() {
    let audit = Arc::new(InMemoryAuditLog::new());
    let executor = Arc::new(FlakyExecutor::new(1));
    let gate = AuthorizationGate::new(engine(), audit.clone(), executor.clone());
    let request = request("an sdk for wallets").with_recipient_address(ADDRESS);

    let err = gate
        .process(&request, &EvaluationContext::now())
        .await
        .expect_err("executor refuses first");
    assert!(matches!(err, GateError::Executor { .. }));

    let outcome = gate.process(&request, &EvaluationContext::now()).await.unwrap();
    assert_eq!(outcome.authorization.map(|a| a.request_id), Some(request.id()));
    assert_eq!(executor.attempts.load(Ordering::SeqCst), 2);
    assert_eq!(executor.accepted.lock().unwrap().len(), 1);
    assert_eq!(audit.records().await.len(), 1);

    assert!(matches!(
        gate.process(&request, &EvaluationContext::now()).await,
        Err(GateError::AlreadyConcluded { .. })
    ));
}

#[tokio::test]
async fn pending_decisions_skip_the_audit_log() {
    let audit = Arc::new(FailingAuditLog {
        attempts: AtomicUsize::new(0),
    });
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));

    let outcome = gate
        .process(&request("dev tool"), &EvaluationContext::now())
        .await
        .unwrap();

    assert!(outcome.decision.is_pending());
    assert_eq!(audit.attempts.load(Ordering::SeqCst), 0);
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn denials_are_audited_without_authorization() {
    let dir = tempfile::tempdir().unwrap();
    let audit = Arc::new(FileAuditLog::open(dir.path().join("audit.jsonl")).await.unwrap());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));

    let request = request("an sdk for my trading desk").with_recipient_address(ADDRESS);
    let outcome = gate
        .process(&request, &EvaluationContext::now())
        .await
        .unwrap();

    assert_eq!(outcome.decision.reason(), DecisionReason::Disqualified);
    assert!(outcome.authorization.is_none());
    assert!(receiver.try_recv().is_err());

    let tail = audit.tail(5).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert!(tail[0].rationale().contains("speculative trading"));
}

#[tokio::test]
async fn session_flow_walks_the_state_machine() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let session = SessionId::new("group-42").unwrap();

    ledger
        .open(
            session.clone(),
            "@builder",
            UsdcAmount::from_whole(40).unwrap(),
            "debugger dev tool",
        )
        .unwrap();

    let outcome = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .unwrap();
    assert!(outcome.decision.is_pending());
    assert_eq!(ledger.state(&session).unwrap(), RequestState::AwaitingAddress);

    ledger.record_exchange(&session).unwrap();
    ledger.confirm_address(&session, "0x12").unwrap();
    let outcome = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .unwrap();
    assert_eq!(outcome.decision.reason(), DecisionReason::InvalidAddressFormat);

    ledger.record_exchange(&session).unwrap();
    ledger.confirm_address(&session, ADDRESS).unwrap();
    let outcome = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .unwrap();
    assert!(outcome.decision.is_approved());
    assert_eq!(ledger.active_sessions(), 0);
    assert_eq!(ledger.archived(1)[0].state, RequestState::Approved);
    assert_eq!(audit.records().await.len(), 1);
    assert!(receiver.try_recv().is_ok());
}

#[tokio::test]
async fn session_times_out_while_awaiting_address() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let session = SessionId::new("dm-7").unwrap();

    ledger
        .open(session.clone(), "@late", UsdcAmount::from_whole(5).unwrap(), "sdk docs")
        .unwrap();
    for _ in 0..6 {
        ledger.record_exchange(&session).unwrap();
    }
    ledger.confirm_address(&session, ADDRESS).unwrap();

    let outcome = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .unwrap();
    assert_eq!(outcome.decision.reason(), DecisionReason::DeadlineExceeded);
    assert_eq!(ledger.archived(1)[0].state, RequestState::Denied);
    assert_eq!(audit.records().await[0].rationale(), "decision window elapsed");
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn failed_audit_leaves_session_open() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(FailingAuditLog {
        attempts: AtomicUsize::new(0),
    });
    let (executor, _receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit, Arc::new(executor));
    let session = SessionId::new("dm-8").unwrap();

    ledger
        .open(session.clone(), "@dev", UsdcAmount::from_whole(5).unwrap(), "sdk")
        .unwrap();
    ledger.confirm_address(&session, ADDRESS).unwrap();

    let err = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .expect_err("audit failure");
    assert!(matches!(err, GateError::Audit { .. }));
    assert_eq!(ledger.state(&session).unwrap(), RequestState::Created);
}

#[tokio::test]
async fn closed_executor_leaves_session_open() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, receiver) = ChannelExecutor::new(8);
    drop(receiver);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let session = SessionId::new("dm-9").unwrap();

    ledger
        .open(session.clone(), "@dev", UsdcAmount::from_whole(5).unwrap(), "sdk")
        .unwrap();
    ledger.confirm_address(&session, ADDRESS).unwrap();

    let err = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .expect_err("nobody is listening");
    assert!(matches!(err, GateError::Executor { .. }));
    assert_eq!(ledger.state(&session).unwrap(), RequestState::Created);
    assert_eq!(ledger.active_sessions(), 1);
    assert!(ledger.archived(10).is_empty());
    assert_eq!(audit.records().await.len(), 1);
}

#[tokio::test]
async fn session_hand_off_retry_archives_after_acceptance() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(InMemoryAuditLog::new());
    let executor = Arc::new(FlakyExecutor::new(1));
    let gate = AuthorizationGate::new(engine(), audit.clone(), executor.clone());
    let session = SessionId::new("dm-10").unwrap();

    ledger
        .open(session.clone(), "@dev", UsdcAmount::from_whole(5).unwrap(), "sdk")
        .unwrap();
    ledger.confirm_address(&session, ADDRESS).unwrap();

    assert!(
        gate.process_session(&ledger, &session, &EvaluationContext::now())
            .await
            .is_err()
    );
    assert_eq!(ledger.active_sessions(), 1);

    let outcome = gate
        .process_session(&ledger, &session, &EvaluationContext::now())
        .await
        .unwrap();
    assert!(outcome.authorization.is_some());
    assert_eq!(ledger.active_sessions(), 0);
    assert_eq!(ledger.archived(1)[0].state, RequestState::Approved);
    assert_eq!(executor.accepted.lock().unwrap().len(), 1);
    assert_eq!(audit.records().await.len(), 1);
}

#[tokio::test]
async fn elapsed_request_is_denied_when_session_asks_again() {
    let ledger = SessionLedger::default();
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, mut receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let session = SessionId::new("dm-11").unwrap();
    let context = EvaluationContext::now();

    let stale = gate
        .open_session(
            &ledger,
            session.clone(),
            "@dev",
            UsdcAmount::from_whole(5).unwrap(),
            "sdk",
            &context,
        )
        .await
        .unwrap();
    for _ in 0..20 {
        ledger.record_exchange(&session).unwrap();
    }
    assert!(matches!(
        ledger.open(session.clone(), "@dev", UsdcAmount::from_whole(6).unwrap(), "sdk"),
        Err(LedgerError::WindowElapsed { .. })
    ));

    let fresh = gate
        .open_session(
            &ledger,
            session.clone(),
            "@dev",
            UsdcAmount::from_whole(6).unwrap(),
            "sdk",
            &context,
        )
        .await
        .unwrap();
    assert_ne!(fresh.id(), stale.id());
    assert_eq!(fresh.exchange_count(), 0);
    assert_eq!(ledger.active_sessions(), 1);

    let archived = ledger.archived(1);
    assert_eq!(archived[0].request.id(), stale.id());
    assert_eq!(archived[0].state, RequestState::Denied);
    assert_eq!(archived[0].decision.rationale(), WINDOW_ELAPSED);

    let records = audit.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].request_id(), stale.id());
    assert_eq!(records[0].outcome(), Outcome::Denied);
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn open_session_refuses_while_window_is_open() {
    let ledger = SessionLedger::default();
    let (executor, _receiver) = ChannelExecutor::new(8);
    let audit = Arc::new(InMemoryAuditLog::new());
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let session = SessionId::new("dm-12").unwrap();
    let context = EvaluationContext::now();
    let amount = UsdcAmount::from_whole(5).unwrap();

    gate.open_session(&ledger, session.clone(), "@dev", amount, "sdk", &context)
        .await
        .unwrap();
    ledger.record_exchange(&session).unwrap();
    let err = gate
        .open_session(&ledger, session, "@dev", amount, "sdk", &context)
        .await
        .expect_err("window still open");
    assert!(matches!(err, GateError::Ledger(LedgerError::AlreadyOpen { .. })));
    assert!(audit.records().await.is_empty());
}

#[tokio::test]
async fn abandoned_sessions_are_swept() {
    let ledger = SessionLedger::default().with_decision_window(2);
    let audit = Arc::new(InMemoryAuditLog::new());
    let (executor, _receiver) = ChannelExecutor::new(8);
    let gate = AuthorizationGate::new(engine(), audit.clone(), Arc::new(executor));
    let amount = UsdcAmount::from_whole(5).unwrap();

    for (name, exchanges) in [("dm-13", 3), ("dm-14", 2), ("dm-15", 9)] {
        let session = SessionId::new(name).unwrap();
        ledger.open(session.clone(), "@dev", amount, "sdk").unwrap();
        for _ in 0..exchanges {
            ledger.record_exchange(&session).unwrap();
        }
    }

    let expired = gate
        .expire_elapsed(&ledger, &EvaluationContext::now())
        .await
        .unwrap();
    assert_eq!(expired.len(), 2);
    assert!(expired.iter().all(|d| d.reason() == DecisionReason::DeadlineExceeded));
    assert_eq!(ledger.active_sessions(), 1);
    assert!(ledger.state(&SessionId::new("dm-14").unwrap()).is_ok());
    assert_eq!(audit.records().await.len(), 2);
}
