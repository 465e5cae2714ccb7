//! Tracing subscriber initialisation.
//!
//! Logs go to stderr so command output on stdout stays machine readable.
//! `RUST_LOG` overrides the configured default filter.

#![warn(missing_docs, clippy::pedantic)]

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable single-line output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown log format `{other}`; expected `text` or `json`")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// Settings for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingOptions<'a> {
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: &'a str,
    /// Line format.
    pub format: LogFormat,
}

impl Default for TracingOptions<'_> {
    fn default() -> Self {
        Self {
            default_filter: "info",
            format: LogFormat::Text,
        }
    }
}

/// Builds the effective filter: `RUST_LOG` when set, the default otherwise.
///
/// # Errors
///
/// Returns an error if the default filter directive is malformed.
pub fn env_filter(default_filter: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log filter `{default_filter}`")),
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails for a malformed filter or when a global subscriber is already set.
pub fn init_tracing(options: &TracingOptions<'_>) -> anyhow::Result<()> {
    let filter = env_filter(options.default_filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match options.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
