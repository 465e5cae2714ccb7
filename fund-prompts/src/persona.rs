//! System instruction for the relay persona.
//!
//! The funding section is generated from [`AlignmentCriteria`] and
//! [`EngineSettings`] rather than written by hand.

use std::collections::BTreeMap;

use fund_policy::{AlignmentCriteria, Criterion, EngineSettings};
use tracing::debug;

use crate::template::{PromptTemplate, TemplateResult};

const PERSONA_TEMPLATE: &str = "\
You are {{name}}, an assistant in Telegram chats for {{ecosystem}}. \
Keep replies concise and natural, and call the functions you are given when they help.

You manage a USDC treasury on the Base network. Follow these funding rules:
1. Never send funds until the requester has confirmed a Base address \
(0x followed by 40 hexadecimal characters). Ask for it before deciding.
2. Decide within {{window}} exchanges of the original request. \
After that the request is closed and has to be made again.
3. Fund work that advances the ecosystem:
{{positive}}
4. Never fund:
{{disqualifying}}
A request that matches any of these is declined even when it also fits the goals above.
{{limit}}Always explain the decision in one or two sentences.";

/// Rendered system instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInstruction {
    content: String,
}

impl SystemInstruction {
    /// Returns the instruction text.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Consumes the instruction and returns its text.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

impl std::fmt::Display for SystemInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.content)
    }
}

/// Builder for [`SystemInstruction`].
#[derive(Debug)]
pub struct SystemInstructionBuilder<'a> {
    name: String,
    ecosystem: String,
    extra_context: Option<String>,
    criteria: &'a AlignmentCriteria,
    settings: EngineSettings,
}

impl<'a> SystemInstructionBuilder<'a> {
    /// Starts a builder for the given rules.
    #[must_use]
    pub fn new(criteria: &'a AlignmentCriteria, settings: EngineSettings) -> Self {
        Self {
            name: "Wit".into(),
            ecosystem: "open-source Ethereum and Base development".into(),
            extra_context: None,
            criteria,
            settings,
        }
    }

    /// Sets the persona name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the ecosystem the fund supports.
    #[must_use]
    pub fn ecosystem(mut self, ecosystem: impl Into<String>) -> Self {
        self.ecosystem = ecosystem.into();
        self
    }

    /// Appends free-form context after the rules. Blank text is ignored.
    #[must_use]
    pub fn extra_context(mut self, context: Option<impl Into<String>>) -> Self {
        self.extra_context = context
            .map(Into::into)
            .filter(|text: &String| !text.trim().is_empty());
        self
    }

    /// Renders the instruction.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`](crate::TemplateError) if the built-in
    /// template references a value that was not supplied.
    pub fn build(self) -> TemplateResult<SystemInstruction> {
        let limit = self
            .settings
            .max_amount()
            .map(|cap| format!("5. Never send more than {cap} USDC in a single transfer.\n"))
            .unwrap_or_default();

        let mut values = BTreeMap::new();
        values.insert("name", self.name);
        values.insert("ecosystem", self.ecosystem);
        values.insert("window", self.settings.decision_window().to_string());
        values.insert("positive", bullet_list(self.criteria.positive()));
        values.insert("disqualifying", bullet_list(self.criteria.disqualifying()));
        values.insert("limit", limit);

        let mut content = PromptTemplate::new(PERSONA_TEMPLATE).render(&values)?;
        if let Some(extra) = self.extra_context {
            content.push_str("\n\n");
            content.push_str(extra.trim());
        }
        debug!(chars = content.len(), "system instruction rendered");
        Ok(SystemInstruction { content })
    }
}

fn bullet_list(criteria: &[Criterion]) -> String {
    criteria
        .iter()
        .map(|criterion| format!("   - {}", criterion.label()))
        .collect::<Vec<_>>()
        .join("\n")
}
