//! Subcommand implementations, writing to any [`Write`] sink.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use fund_audit::{AuditLog, FileAuditLog, InMemoryAuditLog};
use fund_config::GateConfig;
use fund_policy::{
    AuthorizationGate, ChannelExecutor, EvaluationContext, FundAuthorizationEngine, FundingRequest,
};
use fund_prompts::SystemInstructionBuilder;
use fund_tools::FunctionCatalog;
use serde_json::json;
use tracing::{debug, info};

/// Runs one request through the gate and prints a JSON line with the
/// decision and the authorization, if any. `audit_path` of `None` keeps the
/// audit trail in memory.
pub async fn evaluate(
    config: &GateConfig,
    audit_path: Option<&Path>,
    input: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let request: FundingRequest =
        serde_json::from_str(input).context("parse funding request JSON")?;

    let engine = FundAuthorizationEngine::new(
        Arc::new(config.alignment_criteria()?),
        config.engine_settings()?,
    );
    let audit: Arc<dyn AuditLog> = match audit_path {
        Some(path) => Arc::new(FileAuditLog::open(path).await?),
        None => Arc::new(InMemoryAuditLog::new()),
    };
    let (executor, _authorizations) = ChannelExecutor::new(1);
    let gate = AuthorizationGate::new(Arc::new(engine), audit, Arc::new(executor));
    if audit_path.is_some() {
        let recalled = gate.recall_concluded().await?;
        debug!(recalled, "earlier decisions loaded from the audit log");
    }

    let outcome = gate.process(&request, &EvaluationContext::now()).await?;
    info!(
        request_id = %request.id(),
        outcome = %outcome.decision.outcome(),
        dry_run = audit_path.is_none(),
        "request evaluated"
    );
    writeln!(
        out,
        "{}",
        json!({
            "decision": outcome.decision,
            "authorization": outcome.authorization,
        })
    )?;
    Ok(())
}

/// Prints the system prompt rendered from the configured persona and rules.
pub fn prompt(config: &GateConfig, out: &mut impl Write) -> anyhow::Result<()> {
    let criteria = config.alignment_criteria()?;
    let instruction = SystemInstructionBuilder::new(&criteria, config.engine_settings()?)
        .name(config.persona.name.clone())
        .ecosystem(config.persona.ecosystem.clone())
        .extra_context(config.persona.extra_context.clone())
        .build()?;
    writeln!(out, "{instruction}")?;
    Ok(())
}

/// Prints the function schema array.
pub fn functions(pretty: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let schemas = FunctionCatalog::standard()?.to_json();
    let text = if pretty {
        serde_json::to_string_pretty(&schemas)?
    } else {
        serde_json::to_string(&schemas)?
    };
    writeln!(out, "{text}")?;
    Ok(())
}

/// Prints the last `limit` audit records as JSON lines.
pub async fn audit(path: &Path, limit: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let log = FileAuditLog::open(path).await?;
    for record in log.tail(limit).await? {
        writeln!(out, "{}", serde_json::to_string(&record)?)?;
    }
    Ok(())
}
