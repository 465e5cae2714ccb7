//! `{{variable}}` substitution for prompt text.

use std::collections::BTreeMap;

use thiserror::Error;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A referenced variable was not provided.
    #[error("missing template variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },
    /// A `{{` was never closed.
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening braces.
        offset: usize,
    },
}

/// Prompt text containing `{{name}}` placeholders.
///
/// Every placeholder must be supplied at render time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wraps template text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Lists placeholder names in order of appearance.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unterminated`] for an unclosed placeholder.
    pub fn variables(&self) -> TemplateResult<Vec<&str>> {
        let mut names = Vec::new();
        self.walk(|segment| {
            if let Segment::Variable(name) = segment {
                names.push(name);
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Substitutes every placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] when a placeholder has no
    /// value and [`TemplateError::Unterminated`] for an unclosed placeholder.
    pub fn render(&self, values: &BTreeMap<&str, String>) -> TemplateResult<String> {
        let mut out = String::with_capacity(self.text.len());
        self.walk(|segment| {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => {
                    let value = values.get(name).ok_or_else(|| TemplateError::MissingVariable {
                        name: name.to_owned(),
                    })?;
                    out.push_str(value);
                }
            }
            Ok(())
        })?;
        Ok(out)
    }

    fn walk<'a>(
        &'a self,
        mut visit: impl FnMut(Segment<'a>) -> TemplateResult<()>,
    ) -> TemplateResult<()> {
        let mut rest = self.text.as_str();
        let mut offset = 0;
        while let Some(open) = rest.find("{{") {
            visit(Segment::Literal(&rest[..open]))?;
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or(TemplateError::Unterminated {
                offset: offset + open,
            })?;
            visit(Segment::Variable(after[..close].trim()))?;
            let consumed = open + 2 + close + 2;
            offset += consumed;
            rest = &rest[consumed..];
        }
        visit(Segment::Literal(rest))
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Variable(&'a str),
}
