//! Source rewriting: sanitization and segmentation.
//!
//! Sanitizing strips the non-SQL extensions (the `DEFINE QUERY … AS`
//! header, `AS Alias` type suffixes, FTS5 column annotations) while
//! preserving the original spacing and the `;` terminator.
//! Segmentation splits the sanitized text around row-valued bind
//! parameters so a host runtime can expand `(?, ?, …)` at execution
//! time.
//!
//! By construction a single statement never needs both: migrations
//! carry removals but no row parameters, queries the reverse. Hitting
//! both at once is a programming error and aborts the session.

use std::collections::HashSet;

use crate::ast::{AlterTableAction, Stmt, StmtKind, VirtualTableArg};
use crate::infer::{SigParameter, Signature};
use crate::ir::{Parameter, SourceSegment};
use crate::span::Span;

/// The rewriter's output for one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten {
    pub sanitized_sql: String,
    pub segments: Vec<SourceSegment>,
    /// Parameters with final, uniquified names.
    pub parameters: Vec<Parameter>,
}

pub fn rewrite(source: &str, stmt: &Stmt, signature: &Signature) -> Rewritten {
    // The `DEFINE QUERY … AS` header falls away by rebasing onto the
    // wrapped statement's own range rather than by range removal, so
    // defined queries with list parameters stay segmentable.
    let target = unwrap_define(stmt);
    let mut removals = Vec::new();
    collect_removal_spans(target, &mut removals);

    let row_occurrences = row_param_occurrences(&signature.parameters);
    assert!(
        removals.is_empty() || row_occurrences.is_empty(),
        "rewriter invariant violated: statement at {}..{} has both removal ranges and \
         row-valued parameters",
        stmt.span.start,
        stmt.span.end,
    );

    let sanitized_sql = sanitize(source, target.span, &removals);
    let segments = segment(&row_occurrences, target.span, sanitized_sql.len());
    let parameters = uniquify_parameters(&signature.parameters);
    Rewritten {
        sanitized_sql,
        segments,
        parameters,
    }
}

fn unwrap_define(stmt: &Stmt) -> &Stmt {
    match &stmt.kind {
        StmtKind::Define(define) => unwrap_define(&define.stmt),
        _ => stmt,
    }
}

/// Ranges of extension syntax to drop from the emitted SQL.
fn collect_removal_spans(stmt: &Stmt, out: &mut Vec<Span>) {
    match &stmt.kind {
        StmtKind::CreateTable(create) => {
            for column in &create.columns {
                if let Some(span) = column.ty.as_ref().and_then(|ty| ty.alias_span) {
                    out.push(span);
                }
            }
        }
        StmtKind::AlterTable(alter) => {
            if let AlterTableAction::AddColumn(column) = &alter.action {
                if let Some(span) = column.ty.as_ref().and_then(|ty| ty.alias_span) {
                    out.push(span);
                }
            }
        }
        StmtKind::CreateVirtualTable(create) => {
            for arg in &create.args {
                if let VirtualTableArg::Fts5Column(column) = arg {
                    out.extend(column.annotation_spans.iter().copied());
                }
            }
        }
        _ => {}
    }
}

/// Cuts the removal ranges out of the statement's slice and restores
/// the terminator.
fn sanitize(source: &str, stmt_span: Span, removals: &[Span]) -> String {
    let mut sorted = removals.to_vec();
    sorted.sort_by_key(|span| (span.start, span.end));
    let mut out = String::with_capacity(stmt_span.len() + 1);
    let mut cursor = stmt_span.start;
    for span in sorted {
        if span.start > cursor {
            out.push_str(&source[cursor..span.start]);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < stmt_span.end {
        out.push_str(&source[cursor..stmt_span.end]);
    }
    out.push(';');
    out
}

/// Every occurrence of every row-valued parameter, by source order.
fn row_param_occurrences(parameters: &[SigParameter]) -> Vec<(Span, usize)> {
    let mut occurrences: Vec<(Span, usize)> = parameters
        .iter()
        .filter(|p| p.is_row_valued())
        .flat_map(|p| p.occurrences.iter().map(|span| (*span, p.index)))
        .collect();
    occurrences.sort_by_key(|(span, _)| span.start);
    occurrences
}

/// Splits the sanitized text into alternating text and row-parameter
/// segments. Without row parameters the whole statement is one text
/// segment.
fn segment(
    occurrences: &[(Span, usize)],
    stmt_span: Span,
    sanitized_len: usize,
) -> Vec<SourceSegment> {
    if occurrences.is_empty() {
        return vec![SourceSegment::Text {
            span: Span::new(0, sanitized_len),
        }];
    }
    let mut segments = Vec::new();
    let mut cursor = 0usize;
    for (span, index) in occurrences {
        let relative = span.rebase(stmt_span.start);
        if relative.start > cursor {
            segments.push(SourceSegment::Text {
                span: Span::new(cursor, relative.start),
            });
        }
        segments.push(SourceSegment::RowParam { index: *index });
        cursor = relative.end;
    }
    if cursor < sanitized_len {
        segments.push(SourceSegment::Text {
            span: Span::new(cursor, sanitized_len),
        });
    }
    segments
}

/// Assigns final parameter names: explicit names stay; inferred names
/// that collide with any other name get numeric suffixes from 2;
/// nameless parameters synthesize `value`, `value2`, … unique within
/// the statement.
pub fn uniquify_parameters(parameters: &[SigParameter]) -> Vec<Parameter> {
    let explicit: HashSet<&str> = parameters
        .iter()
        .filter(|p| !p.name_inferred)
        .filter_map(|p| p.name.as_deref())
        .collect();
    let mut used: HashSet<String> = HashSet::new();
    parameters
        .iter()
        .map(|p| {
            let name = if !p.name_inferred {
                p.name.clone().unwrap_or_else(|| "value".to_string())
            } else {
                let base = p.name.clone().unwrap_or_else(|| "value".to_string());
                let mut candidate = base.clone();
                let mut suffix = 2;
                while used.contains(&candidate) || explicit.contains(candidate.as_str()) {
                    candidate = format!("{base}{suffix}");
                    suffix += 1;
                }
                candidate
            };
            used.insert(name.clone());
            Parameter {
                index: p.index,
                name,
                ty: p.ty.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn sig_param(
        index: usize,
        name: Option<&str>,
        inferred: bool,
        ty: Type,
        occurrences: Vec<Span>,
    ) -> SigParameter {
        let span = occurrences.first().copied().unwrap_or(Span::new(0, 0));
        SigParameter {
            index,
            name: name.map(str::to_string),
            name_inferred: inferred,
            ty,
            span,
            occurrences,
        }
    }

    #[test]
    fn sanitize_without_removals_is_identity_plus_terminator() {
        let source = "SELECT 1";
        assert_eq!(sanitize(source, Span::new(0, 8), &[]), "SELECT 1;");
    }

    #[test]
    fn sanitize_cuts_alias_suffix() {
        let source = "CREATE TABLE t(u TEXT AS UUID NOT NULL)";
        // ` AS UUID` spans bytes 21..29.
        let out = sanitize(source, Span::new(0, source.len()), &[Span::new(21, 29)]);
        assert_eq!(out, "CREATE TABLE t(u TEXT NOT NULL);");
    }

    #[test]
    fn segments_wrap_row_params() {
        let source = "SELECT * FROM users WHERE id IN :ids";
        let occurrences = vec![(Span::new(32, 36), 1)];
        let segments = segment(&occurrences, Span::new(0, source.len()), source.len() + 1);
        assert_eq!(
            segments,
            vec![
                SourceSegment::Text {
                    span: Span::new(0, 32)
                },
                SourceSegment::RowParam { index: 1 },
                SourceSegment::Text {
                    span: Span::new(36, 37)
                },
            ]
        );
    }

    #[test]
    fn no_row_params_yields_single_text_segment() {
        let segments = segment(&[], Span::new(0, 8), 9);
        assert_eq!(
            segments,
            vec![SourceSegment::Text {
                span: Span::new(0, 9)
            }]
        );
    }

    #[test]
    fn inferred_names_defer_to_explicit_ones() {
        let params = vec![
            sig_param(1, Some("id"), true, Type::integer(), vec![Span::new(0, 1)]),
            sig_param(2, Some("id"), false, Type::integer(), vec![Span::new(2, 3)]),
            sig_param(3, Some("id"), true, Type::integer(), vec![Span::new(4, 5)]),
        ];
        let named: Vec<String> = uniquify_parameters(&params)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(named, vec!["id2", "id", "id3"]);
    }

    #[test]
    fn nameless_parameters_synthesize_values() {
        let params = vec![
            sig_param(1, None, true, Type::integer(), vec![Span::new(0, 1)]),
            sig_param(2, None, true, Type::text(), vec![Span::new(2, 3)]),
        ];
        let named: Vec<String> = uniquify_parameters(&params)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(named, vec!["value", "value2"]);
    }
}
