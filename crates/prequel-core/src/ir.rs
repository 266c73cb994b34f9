//! The language-neutral IR handed to code-generation backends.

use schemars::JsonSchema;
use serde::Serialize;

use crate::ast::NodeId;
use crate::schema::QualifiedName;
use crate::span::Span;
use crate::types::Type;

/// How many rows a statement can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    Many,
}

/// A typed bind parameter with its final (uniquified) name.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// 1-based, dense, stable by first occurrence.
    pub index: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// The `DEFINE QUERY` header, when present.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// A fragment of the sanitized SQL. Row-valued parameters split the
/// text so a host runtime can expand `(?, ?, …)` to the number of
/// elements actually bound.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SourceSegment {
    /// A literal slice of the sanitized SQL.
    Text { span: Span },
    /// A placeholder for the parameter with this index.
    RowParam { index: usize },
}

/// One compiled statement: everything a backend needs.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<Definition>,
    pub parameters: Vec<Parameter>,
    /// `Row(Named)` for queries, `Row(Empty)` for plain DML.
    pub result_columns: Type,
    pub cardinality: Cardinality,
    pub read_only: bool,
    /// The SQL with non-standard extensions removed; terminator
    /// preserved.
    pub sanitized_sql: String,
    /// Alternating text and row-parameter segments over
    /// `sanitized_sql`. A statement without row parameters has a
    /// single text segment covering the whole string.
    pub source_segments: Vec<SourceSegment>,
    pub used_tables: Vec<QualifiedName>,
    /// The syntax node this statement was compiled from.
    pub node: NodeId,
}

impl Statement {
    /// The text of a segment; row parameters render as their
    /// placeholder from the original source.
    pub fn segment_text(&self, segment: &SourceSegment) -> Option<&str> {
        match segment {
            SourceSegment::Text { span } => Some(span.slice(&self.sanitized_sql)),
            SourceSegment::RowParam { .. } => None,
        }
    }

    pub fn parameter(&self, index: usize) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.index == index)
    }

    pub fn is_query(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_text_slices_sanitized_sql() {
        let stmt = Statement {
            definition: None,
            parameters: vec![Parameter {
                index: 1,
                name: "ids".to_string(),
                ty: Type::unknown_row(Type::integer()),
            }],
            result_columns: Type::empty_row(),
            cardinality: Cardinality::Many,
            read_only: true,
            sanitized_sql: "SELECT 1 IN :ids;".to_string(),
            source_segments: vec![
                SourceSegment::Text {
                    span: Span::new(0, 12),
                },
                SourceSegment::RowParam { index: 1 },
                SourceSegment::Text {
                    span: Span::new(16, 17),
                },
            ],
            used_tables: Vec::new(),
            node: NodeId(0),
        };
        assert_eq!(
            stmt.segment_text(&stmt.source_segments[0]),
            Some("SELECT 1 IN ")
        );
        assert_eq!(stmt.segment_text(&stmt.source_segments[2]), Some(";"));
        assert!(stmt.segment_text(&stmt.source_segments[1]).is_none());
    }
}
