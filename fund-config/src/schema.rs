//! Strongly typed configuration schema.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use fund_policy::engine::DEFAULT_DECISION_WINDOW;
use fund_policy::{AlignmentCriteria, Criterion, CriterionKind, EngineSettings, SessionLedger};
use fund_primitives::UsdcAmount;
use serde::{Deserialize, Serialize};

use crate::loader::{ConfigError, ConfigResult};

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Exchanges a request stays eligible for after the originating message.
    pub decision_window: u32,
    /// Optional cap on a single approved transfer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount_usdc: Option<UsdcAmount>,
    /// Where concluded decisions are appended as JSON lines.
    pub audit_log_path: PathBuf,
    /// Concluded requests kept in memory for inspection.
    pub archive_capacity: usize,
    /// Persona the system prompt is rendered for.
    pub persona: PersonaConfig,
    /// Positive and disqualifying criteria, in evaluation order.
    #[serde(rename = "criterion")]
    pub criteria: Vec<CriterionConfig>,
}

/// Assistant persona settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersonaConfig {
    /// Name the assistant introduces itself with.
    pub name: String,
    /// Ecosystem the fund supports.
    pub ecosystem: String,
    /// Free-form text appended to the system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_context: Option<String>,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Wit".into(),
            ecosystem: "open-source Ethereum and Base development".into(),
            extra_context: None,
        }
    }
}

/// One `[[criterion]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriterionConfig {
    /// Stable identifier.
    pub id: String,
    /// Label quoted in rationales and the system prompt.
    pub label: String,
    /// Positive or disqualifying.
    pub kind: CriterionKind,
    /// Keyword phrases recognising the criterion.
    pub keywords: Vec<String>,
}

impl CriterionConfig {
    fn new(id: &str, label: &str, kind: CriterionKind, keywords: &[&str]) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
        }
    }

    fn build(&self) -> ConfigResult<Criterion> {
        Ok(Criterion::new(
            self.id.clone(),
            self.label.clone(),
            self.kind,
            self.keywords.iter().cloned(),
        )?)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            decision_window: DEFAULT_DECISION_WINDOW,
            max_amount_usdc: None,
            audit_log_path: PathBuf::from("audit/decisions.jsonl"),
            archive_capacity: 256,
            persona: PersonaConfig::default(),
            criteria: default_criteria(),
        }
    }
}

impl GateConfig {
    /// Builds the immutable criteria set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Policy`] for blank, duplicate, or keyword-less
    /// criteria, or when no positive criterion is configured.
    pub fn alignment_criteria(&self) -> ConfigResult<AlignmentCriteria> {
        let criteria = self
            .criteria
            .iter()
            .map(CriterionConfig::build)
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(AlignmentCriteria::new(criteria)?)
    }

    /// Builds the engine settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Policy`] for a zero decision window.
    pub fn engine_settings(&self) -> ConfigResult<EngineSettings> {
        let mut settings = EngineSettings::new(self.decision_window)?;
        if let Some(limit) = self.max_amount_usdc {
            if limit.is_zero() {
                return Err(ConfigError::Invalid("max_amount_usdc must be positive"));
            }
            settings = settings.with_max_amount(limit);
        }
        Ok(settings)
    }

    /// Returns the archive capacity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the capacity is zero.
    pub fn archive_capacity(&self) -> ConfigResult<NonZeroUsize> {
        NonZeroUsize::new(self.archive_capacity)
            .ok_or(ConfigError::Invalid("archive_capacity must be at least 1"))
    }

    /// Builds a session ledger whose window matches the engine's.
    ///
    /// # Errors
    ///
    /// Fails like [`Self::engine_settings`] and [`Self::archive_capacity`].
    pub fn session_ledger(&self) -> ConfigResult<SessionLedger> {
        let settings = self.engine_settings()?;
        Ok(SessionLedger::new(self.archive_capacity()?)
            .with_decision_window(settings.decision_window()))
    }

    /// Checks every derived value so errors surface at startup.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> ConfigResult<()> {
        self.alignment_criteria()?;
        self.engine_settings()?;
        self.archive_capacity()?;
        if self.persona.name.trim().is_empty() {
            return Err(ConfigError::Invalid("persona.name must not be empty"));
        }
        Ok(())
    }
}

fn default_criteria() -> Vec<CriterionConfig> {
    use CriterionKind::{Disqualifying, Positive};

    vec![
        CriterionConfig::new(
            "documentation",
            "documentation contributions",
            Positive,
            &[
                "documentation", "docs", "doc", "readme", "tutorial", "guide",
                "technical writing", "translation",
            ],
        ),
        CriterionConfig::new(
            "developer_tooling",
            "developer tooling",
            Positive,
            &[
                "developer tool", "developer tooling", "dev tool", "tooling", "sdk", "library",
                "cli", "framework", "compiler", "debugger", "linter", "plugin",
            ],
        ),
        CriterionConfig::new(
            "education",
            "educational initiatives",
            Positive,
            &[
                "education", "educational", "workshop", "course", "curriculum", "bootcamp",
                "lecture", "teaching", "mentorship", "mentoring", "study group",
            ],
        ),
        CriterionConfig::new(
            "community",
            "community building",
            Positive,
            &[
                "community", "meetup", "hackathon", "conference", "local chapter", "ambassador",
                "onboarding", "grassroots",
            ],
        ),
        CriterionConfig::new(
            "speculative_trading",
            "speculative trading",
            Disqualifying,
            &[
                "trading", "trader", "day trade", "memecoin", "meme coin", "leveraged",
                "margin trading", "margin call", "speculation", "speculative", "pump and dump",
                "yield farming", "airdrop farming", "arbitrage bot",
            ],
        ),
        CriterionConfig::new(
            "personal_expenses",
            "personal expenses",
            Disqualifying,
            &[
                "personal expense", "personal use", "personal loan", "personal debt",
                "personal bill", "rent", "groceries", "grocery", "vacation", "holiday trip",
                "mortgage", "car payment", "credit card", "utility bill", "medical bill",
                "shopping spree", "wedding", "birthday gift",
            ],
        ),
        CriterionConfig::new(
            "no_technical_merit",
            "no clear technical merit",
            Disqualifying,
            &[
                "no code written", "no code yet", "no repo", "no repository", "no prototype",
                "just an idea", "nothing built", "not technical",
            ],
        ),
        CriterionConfig::new(
            "unverifiable_connection",
            "unverifiable project connection",
            Disqualifying,
            &[
                "anonymous team", "anonymous founder", "anonymous dev", "anon team", "anon dev",
                "trust me", "can't share", "cannot share", "private repo", "no proof",
                "stealth mode", "stealth project", "unverified",
            ],
        ),
    ]
}
