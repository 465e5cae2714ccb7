//! `fundgate` operator CLI.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fund_telemetry::{LogFormat, TracingOptions, init_tracing};
use tokio::io::AsyncReadExt as _;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "fundgate", version, about = "Fund authorization gate for the relay assistant")]
struct Args {
    /// TOML configuration file; built-in funding rules are used when absent.
    #[arg(long, env = "FUNDGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `audit_log_path` from the configuration.
    #[arg(long, env = "FUNDGATE_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Log line format on stderr (`text` or `json`).
    #[arg(long, env = "FUNDGATE_LOG_FORMAT", default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate a funding request read as JSON and print the decision.
    Evaluate {
        /// File holding the request; `-` or absent reads stdin.
        input: Option<PathBuf>,
        /// Record decisions in memory instead of the audit log.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the rendered system prompt.
    Prompt,
    /// Print the function schemas offered to the model.
    Functions {
        /// Pretty-print the JSON array.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the most recent audit records, oldest first.
    Audit {
        /// Number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&TracingOptions {
        default_filter: "warn,fund_policy=info,fundgate=info",
        format: args.log_format,
    })?;

    let config = fund_config::load_or_default(args.config.as_deref())?;
    let audit_path = args
        .audit_log
        .unwrap_or_else(|| config.audit_log_path.clone());
    let mut stdout = std::io::stdout().lock();

    match args.cmd {
        Command::Evaluate { input, dry_run } => {
            let text = read_input(input).await?;
            let target = if dry_run { None } else { Some(audit_path.as_path()) };
            commands::evaluate(&config, target, &text, &mut stdout).await?;
        }
        Command::Prompt => commands::prompt(&config, &mut stdout)?,
        Command::Functions { pretty } => commands::functions(pretty, &mut stdout)?,
        Command::Audit { limit } => commands::audit(&audit_path, limit, &mut stdout).await?,
    }

    Ok(())
}

async fn read_input(input: Option<PathBuf>) -> anyhow::Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("read funding request from {}", path.display())),
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("read funding request from stdin")?;
            Ok(text)
        }
    }
}
