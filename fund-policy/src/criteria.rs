//! Alignment criteria used to judge a funding purpose.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::engine::{PolicyError, PolicyResult};

/// Whether a criterion argues for or against funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionKind {
    /// Matching purposes qualify for funding.
    Positive,
    /// Matching purposes are denied, whatever else they match.
    Disqualifying,
}

/// A named criterion recognised through keyword phrases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    id: String,
    label: String,
    kind: CriterionKind,
    keywords: Vec<String>,
    phrases: Vec<Vec<String>>,
}

impl Criterion {
    /// Creates a criterion.
    ///
    /// Keywords are matched as whole-word phrases, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidCriterion`] when the id or label is blank
    /// or when no keyword contains a word.
    pub fn new<I, S>(
        id: impl Into<String>,
        label: impl Into<String>,
        kind: CriterionKind,
        keywords: I,
    ) -> PolicyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PolicyError::invalid_criterion(id, "criterion id cannot be empty"));
        }
        let label = label.into();
        if label.trim().is_empty() {
            return Err(PolicyError::invalid_criterion(id, "criterion label cannot be empty"));
        }

        let mut kept = Vec::new();
        let mut phrases = Vec::new();
        for keyword in keywords {
            let keyword = keyword.into();
            let words = tokenize(&keyword);
            if words.is_empty() {
                continue;
            }
            kept.push(keyword.trim().to_owned());
            phrases.push(words);
        }
        if phrases.is_empty() {
            return Err(PolicyError::invalid_criterion(
                id,
                "criterion needs at least one keyword",
            ));
        }

        Ok(Self {
            id,
            label,
            kind,
            keywords: kept,
            phrases,
        })
    }

    /// Returns the stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the label quoted in rationales.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the criterion kind.
    #[must_use]
    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    /// Returns the configured keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Returns the first keyword found in the tokenized purpose.
    fn first_match(&self, tokens: &[String]) -> Option<&str> {
        self.phrases
            .iter()
            .zip(&self.keywords)
            .find(|(phrase, _)| contains_phrase(tokens, phrase))
            .map(|(_, keyword)| keyword.as_str())
    }
}

/// A criterion that matched a purpose, with the keyword that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionMatch {
    /// Identifier of the matched criterion.
    pub id: String,
    /// Label of the matched criterion.
    pub label: String,
    /// Keyword that matched.
    pub keyword: String,
}

impl CriterionMatch {
    fn describe(&self) -> String {
        format!("{} (matched \"{}\")", self.label, self.keyword)
    }
}

/// Result of checking a purpose against every criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentAssessment {
    /// Disqualifying criteria that matched, in configuration order.
    pub disqualifying: Vec<CriterionMatch>,
    /// Positive criteria that matched, in configuration order.
    pub positive: Vec<CriterionMatch>,
}

impl AlignmentAssessment {
    /// Returns `true` when any disqualifying criterion matched.
    #[must_use]
    pub fn is_disqualified(&self) -> bool {
        !self.disqualifying.is_empty()
    }

    /// Returns `true` when any positive criterion matched.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        !self.positive.is_empty()
    }

    /// Comma-separated description of the disqualifying matches.
    #[must_use]
    pub fn describe_disqualifying(&self) -> String {
        join(&self.disqualifying)
    }

    /// Comma-separated description of the positive matches.
    #[must_use]
    pub fn describe_positive(&self) -> String {
        join(&self.positive)
    }
}

fn join(matches: &[CriterionMatch]) -> String {
    matches
        .iter()
        .map(CriterionMatch::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Immutable set of positive and disqualifying criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentCriteria {
    positive: Vec<Criterion>,
    disqualifying: Vec<Criterion>,
}

impl AlignmentCriteria {
    /// Builds the criteria set.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidCriterion`] when identifiers repeat, or
    /// when no positive criterion is configured (nothing could ever be
    /// approved).
    pub fn new(criteria: impl IntoIterator<Item = Criterion>) -> PolicyResult<Self> {
        let mut seen = BTreeSet::new();
        let mut positive = Vec::new();
        let mut disqualifying = Vec::new();

        for criterion in criteria {
            if !seen.insert(criterion.id.clone()) {
                return Err(PolicyError::invalid_criterion(
                    criterion.id,
                    "criterion ids must be unique",
                ));
            }
            match criterion.kind {
                CriterionKind::Positive => positive.push(criterion),
                CriterionKind::Disqualifying => disqualifying.push(criterion),
            }
        }

        if positive.is_empty() {
            return Err(PolicyError::invalid_criterion(
                String::new(),
                "at least one positive criterion is required",
            ));
        }

        Ok(Self {
            positive,
            disqualifying,
        })
    }

    /// Returns the positive criteria.
    #[must_use]
    pub fn positive(&self) -> &[Criterion] {
        &self.positive
    }

    /// Returns the disqualifying criteria.
    #[must_use]
    pub fn disqualifying(&self) -> &[Criterion] {
        &self.disqualifying
    }

    /// Checks a free-text purpose against every criterion.
    #[must_use]
    pub fn assess(&self, purpose: &str) -> AlignmentAssessment {
        let tokens = tokenize(purpose);
        let collect = |criteria: &[Criterion]| -> Vec<CriterionMatch> {
            criteria
                .iter()
                .filter_map(|criterion| {
                    criterion.first_match(&tokens).map(|keyword| CriterionMatch {
                        id: criterion.id.clone(),
                        label: criterion.label.clone(),
                        keyword: keyword.to_owned(),
                    })
                })
                .collect()
        };

        AlignmentAssessment {
            disqualifying: collect(&self.disqualifying),
            positive: collect(&self.positive),
        }
    }
}

/// Lower-cases text and splits it into alphanumeric words.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn word_matches(token: &str, word: &str) -> bool {
    token == word || token.strip_suffix('s') == Some(word)
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return false;
    }
    tokens.windows(phrase.len()).any(|window| {
        window
            .iter()
            .zip(phrase)
            .all(|(token, word)| word_matches(token, word))
    })
}
