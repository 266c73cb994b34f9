//! The typed syntax tree produced by the parser.
//!
//! Statements, clauses, and expressions are closed enums with owned
//! children; recursion goes through `Box`. Expression and statement
//! nodes carry a stable [`NodeId`] so later passes can attach inferred
//! information in side tables, plus a byte-accurate [`Span`] into the
//! original source.

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::span::Span;

/// Stable identity of a syntax node, allocated during parsing.
///
/// Ids are unique within one parsed file and never reused, which makes
/// them safe keys for side tables (inferred types per node).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An identifier as written, with its quoting and source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub value: String,
    pub quoted: bool,
    pub span: Span,
}

impl Ident {
    pub fn new(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            quoted: false,
            span,
        }
    }

    pub fn quoted(value: impl Into<String>, span: Span) -> Self {
        Self {
            value: value.into(),
            quoted: true,
            span,
        }
    }

    /// SQLite identifiers compare case-insensitively.
    pub fn normalized(&self) -> String {
        self.value.to_lowercase()
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.value.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.value)
        } else {
            f.write_str(&self.value)
        }
    }
}

/// A possibly schema-qualified object name as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectName {
    pub schema: Option<Ident>,
    pub name: Ident,
    pub span: Span,
}

impl ObjectName {
    pub fn bare(name: Ident) -> Self {
        let span = name.span;
        Self {
            schema: None,
            name,
            span,
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.{}", schema, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A literal value. Numeric payloads keep their raw text; the type
/// system only needs the kind, and raw text round-trips exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(String),
    Float(String),
    String(String),
    Blob(String),
    Null,
    True,
    False,
    CurrentTime,
    CurrentDate,
    CurrentTimestamp,
}

/// A declared SQL type, e.g. `VARCHAR(10)` or the extension form
/// `TEXT AS UUID`.
///
/// The alias suffix stays in the tree; the rewriter strips
/// `alias_span` from emitted SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub name: Ident,
    /// Raw argument text, e.g. `["10"]` for `VARCHAR(10)`.
    pub args: Vec<String>,
    /// `AS <Alias>` suffix from the type-alias extension.
    pub alias: Option<Ident>,
    /// Range covering ` AS <Alias>`, for removal.
    pub alias_span: Option<Span>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}
