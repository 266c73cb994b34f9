//! Human-readable diagnostic rendering.

use std::collections::HashMap;
use std::io::Write;

use owo_colors::OwoColorize;
use prequel_core::compiler::CompileResult;
use prequel_core::diagnostics::{Diagnostic, Level, Suggestion};

/// 1-based line and column for a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let clamped = offset.min(source.len());
    let before = &source[..clamped];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|nl| clamped - nl)
        .unwrap_or(clamped + 1);
    (line, column)
}

/// Writes every diagnostic with its source excerpt and caret.
pub fn render_diagnostics(
    out: &mut impl Write,
    sources: &HashMap<String, String>,
    result: &CompileResult,
    color: bool,
) -> std::io::Result<()> {
    for file in &result.diagnostics {
        let source = sources.get(&file.file).map(String::as_str).unwrap_or("");
        for diagnostic in file.diagnostics.iter() {
            render_one(out, &file.file, source, diagnostic, color)?;
        }
    }
    Ok(())
}

fn render_one(
    out: &mut impl Write,
    file: &str,
    source: &str,
    diagnostic: &Diagnostic,
    color: bool,
) -> std::io::Result<()> {
    let (line, column) = line_col(source, diagnostic.span.start);
    let level = match (diagnostic.level, color) {
        (Level::Error, true) => format!("{}", "error".red().bold()),
        (Level::Error, false) => "error".to_string(),
        (Level::Warning, true) => format!("{}", "warning".yellow().bold()),
        (Level::Warning, false) => "warning".to_string(),
    };
    writeln!(
        out,
        "{file}:{line}:{column}: {level}: {}",
        diagnostic.message
    )?;

    if let Some(excerpt) = source.lines().nth(line - 1) {
        writeln!(out, "    {excerpt}")?;
        let width = diagnostic.span.len().max(1).min(excerpt.len());
        let caret = format!("{}{}", " ".repeat(column - 1), "^".repeat(width));
        if color {
            writeln!(out, "    {}", caret.cyan())?;
        } else {
            writeln!(out, "    {caret}")?;
        }
    }

    match &diagnostic.suggestion {
        Suggestion::None => {}
        Suggestion::Replace(text) => writeln!(out, "    help: replace with `{text}`")?,
        Suggestion::Append(text) => writeln!(out, "    help: append `{text}`")?,
    }
    Ok(())
}

/// A one-line summary: counts by severity.
pub fn summary(result: &CompileResult) -> String {
    let mut errors = 0usize;
    let mut warnings = 0usize;
    for file in &result.diagnostics {
        for diagnostic in file.diagnostics.iter() {
            match diagnostic.level {
                Level::Error => errors += 1,
                Level::Warning => warnings += 1,
            }
        }
    }
    let statements: usize = result
        .migrations
        .iter()
        .chain(&result.queries)
        .map(|f| f.statements.len())
        .sum();
    format!("{statements} statements compiled, {errors} errors, {warnings} warnings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_is_one_based() {
        let src = "SELECT 1;\nSELECT 2;";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 7), (1, 8));
        assert_eq!(line_col(src, 10), (2, 1));
        assert_eq!(line_col(src, 17), (2, 8));
    }

    #[test]
    fn render_includes_excerpt_and_caret() {
        use prequel_core::compiler::{compile, CompileRequest, QueryFile};

        let sql = "CREATE TABLE t(x INT);";
        let result = compile(&CompileRequest {
            migrations: Vec::new(),
            queries: vec![QueryFile {
                name: "q.sql".to_string(),
                sql: sql.to_string(),
            }],
            config: Default::default(),
        });
        let mut sources = HashMap::new();
        sources.insert("q.sql".to_string(), sql.to_string());
        let mut out = Vec::new();
        render_diagnostics(&mut out, &sources, &result, false).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("q.sql:1:1: error: Statement is not allowed in queries"));
        assert!(text.contains("^^^^^^"));
    }
}
