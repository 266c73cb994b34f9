//! Diagnostics collected during compilation.
//!
//! The core uses two complementary error channels:
//!
//! - [`Diagnostic`]: recoverable findings (syntax, schema, type, and
//!   validation errors) accumulated per statement. Compilation never
//!   short-circuits on these; it keeps going and reports as many as
//!   possible per session.
//! - Internal invariant violations (such as the rewriter's
//!   removal/segmentation collision) abort the session outright; they
//!   are programming errors, not user input problems.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
    Error,
}

/// A machine-applicable fix hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase", tag = "kind", content = "text")]
pub enum Suggestion {
    #[default]
    None,
    /// Replace the diagnostic's span with the given text.
    Replace(String),
    /// Append the given text after the diagnostic's span.
    Append(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub message: String,
    pub level: Level,
    pub span: Span,
    #[serde(default, skip_serializing_if = "suggestion_is_none")]
    pub suggestion: Suggestion,
}

fn suggestion_is_none(suggestion: &Suggestion) -> bool {
    matches!(suggestion, Suggestion::None)
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            level: Level::Error,
            span,
            suggestion: Suggestion::None,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            level: Level::Warning,
            span,
            suggestion: Suggestion::None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            Level::Warning => "warning",
            Level::Error => "error",
        };
        write!(
            f,
            "{level} at {}..{}: {}",
            self.span.start, self.span.end, self.message
        )
    }
}

/// An accumulating diagnostic list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Orders diagnostics by source-range start, the contract consumers
    /// rely on. The sort is stable so same-offset diagnostics keep
    /// their emission order.
    pub fn sort_by_span(&mut self) {
        self.items.sort_by_key(|d| (d.span.start, d.span.end));
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_stable_by_start() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::error("b", Span::new(5, 9)));
        diags.push(Diagnostic::warning("a", Span::new(1, 3)));
        diags.push(Diagnostic::error("c", Span::new(5, 9)));
        diags.sort_by_span();
        let messages: Vec<_> = diags.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::warning("w", Span::new(0, 1)));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error("e", Span::new(0, 1)));
        assert!(diags.has_errors());
    }
}
