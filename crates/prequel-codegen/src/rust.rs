//! The Rust backend.

use std::collections::HashSet;

use prequel_core::compiler::{CompileResult, Config};
use prequel_core::ir::{Cardinality, SourceSegment, Statement};
use prequel_core::types::{RowShape, Type};

use crate::writer::{pascal_case, sanitize_ident, snake_case, SourceWriter};

/// Emits one Rust source file covering every named query in the
/// result.
pub fn generate_rust(result: &CompileResult, config: &Config) -> String {
    let mut w = SourceWriter::new();
    w.line("// Generated by prequel. Do not edit by hand.");
    w.line("#![allow(dead_code)]");
    w.blank();
    for import in &config.options.imports {
        w.line(format!("use {import};"));
    }
    if !config.options.imports.is_empty() {
        w.blank();
    }
    if !config.database_name.is_empty() {
        w.line(format!(
            "pub const DATABASE_NAME: &str = \"{}\";",
            config.database_name
        ));
        w.blank();
    }

    let decode_rows = config
        .options
        .imports
        .iter()
        .any(|import| import.starts_with("rusqlite"));
    let namespaced = config.options.namespace_generated_models;
    let mut used_names: HashSet<String> = HashSet::new();

    let queries: Vec<&Statement> = result
        .queries
        .iter()
        .flat_map(|file| file.statements.iter())
        .filter(|stmt| stmt.definition.is_some())
        .collect();

    if namespaced {
        w.block("pub mod models", |w| {
            if !config.options.imports.is_empty() {
                w.line("use super::*;");
                w.blank();
            }
            for stmt in &queries {
                emit_row_struct(w, stmt, decode_rows);
            }
        });
        w.blank();
    } else {
        for stmt in &queries {
            emit_row_struct(&mut w, stmt, decode_rows);
        }
    }

    for stmt in &queries {
        emit_query(&mut w, stmt, namespaced, &mut used_names);
    }

    w.finish()
}

fn definition_name(stmt: &Statement) -> &str {
    stmt.definition
        .as_ref()
        .map(|d| d.name.as_str())
        .unwrap_or("query")
}

fn struct_name(stmt: &Statement) -> String {
    sanitize_ident(&pascal_case(definition_name(stmt)))
}

fn row_struct_name(stmt: &Statement) -> String {
    match stmt.definition.as_ref().and_then(|d| d.output.clone()) {
        Some(output) => sanitize_ident(&output),
        None => format!("{}Row", struct_name(stmt)),
    }
}

fn params_struct_name(stmt: &Statement) -> String {
    match stmt.definition.as_ref().and_then(|d| d.input.clone()) {
        Some(input) => sanitize_ident(&input),
        None => format!("{}Params", struct_name(stmt)),
    }
}

fn row_columns(stmt: &Statement) -> Option<Vec<(String, String)>> {
    match &stmt.result_columns {
        Type::Row {
            shape: RowShape::Named { columns },
        } if !columns.is_empty() => Some(
            columns
                .iter()
                .map(|(name, ty)| (sanitize_ident(&snake_case(name)), rust_type(ty)))
                .collect(),
        ),
        _ => None,
    }
}

fn emit_row_struct(w: &mut SourceWriter, stmt: &Statement, decode_rows: bool) {
    let Some(columns) = row_columns(stmt) else {
        return;
    };
    let name = row_struct_name(stmt);
    w.doc(&format!("One result row of `{}`.", definition_name(stmt)));
    w.line("#[derive(Debug, Clone, PartialEq)]");
    w.block(&format!("pub struct {name}"), |w| {
        for (field, ty) in &columns {
            w.line(format!("pub {field}: {ty},"));
        }
    });
    w.blank();
    if decode_rows {
        w.block(&format!("impl {name}"), |w| {
            w.doc("Decodes a row in column order.");
            w.block(
                "pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>",
                |w| {
                    w.line("Ok(Self {");
                    for (position, (field, _)) in columns.iter().enumerate() {
                        w.line(format!("    {field}: row.get({position})?,"));
                    }
                    w.line("})");
                },
            );
        });
        w.blank();
    }
}

fn emit_query(
    w: &mut SourceWriter,
    stmt: &Statement,
    namespaced: bool,
    used_names: &mut HashSet<String>,
) {
    let mut name = struct_name(stmt);
    let mut suffix = 2;
    while !used_names.insert(name.clone()) {
        name = format!("{}{suffix}", struct_name(stmt));
        suffix += 1;
    }

    if !stmt.parameters.is_empty() {
        let params_name = params_struct_name(stmt);
        w.doc(&format!("Bind parameters of `{}`.", definition_name(stmt)));
        w.line("#[derive(Debug, Clone, PartialEq)]");
        w.block(&format!("pub struct {params_name}"), |w| {
            for parameter in &stmt.parameters {
                let field = sanitize_ident(&snake_case(&parameter.name));
                w.line(format!("pub {field}: {},", rust_type(&parameter.ty)));
            }
        });
        w.blank();
    }

    let row_reference = row_columns(stmt).map(|_| {
        let row = row_struct_name(stmt);
        if namespaced {
            format!("models::{row}")
        } else {
            row
        }
    });

    w.doc(&format!("`{}`", stmt.sanitized_sql.trim()));
    w.line(format!("pub struct {name};"));
    w.blank();
    if let Some(row) = &row_reference {
        w.doc(&format!("The row type `{name}` decodes into."));
        w.line(format!("pub type {name}Output = {row};"));
        w.blank();
    }
    w.block(&format!("impl {name}"), |w| {
        let has_row_params = stmt
            .source_segments
            .iter()
            .any(|segment| matches!(segment, SourceSegment::RowParam { .. }));
        if has_row_params {
            emit_segmented_sql(w, stmt);
        } else {
            w.line(format!(
                "pub const SQL: &'static str = \"{}\";",
                escape(&stmt.sanitized_sql)
            ));
        }
        w.line(format!("pub const READ_ONLY: bool = {};", stmt.read_only));
        w.line(format!(
            "pub const SINGLE_ROW: bool = {};",
            stmt.cardinality == Cardinality::Single
        ));
    });
    w.blank();
}

/// List parameters expand at execution time, so the SQL becomes a
/// function of the element counts.
fn emit_segmented_sql(w: &mut SourceWriter, stmt: &Statement) {
    let mut args = Vec::new();
    for segment in &stmt.source_segments {
        if let SourceSegment::RowParam { index } = segment {
            if let Some(parameter) = stmt.parameter(*index) {
                let arg = format!("{}_len", sanitize_ident(&snake_case(&parameter.name)));
                if !args.contains(&arg) {
                    args.push(arg);
                }
            }
        }
    }
    let signature = args
        .iter()
        .map(|arg| format!("{arg}: usize"))
        .collect::<Vec<_>>()
        .join(", ");
    w.doc("Builds the SQL with each list placeholder expanded to the");
    w.doc("given number of `?` markers.");
    w.block(&format!("pub fn sql({signature}) -> String"), |w| {
        w.line(format!(
            "let mut sql = String::with_capacity({});",
            stmt.sanitized_sql.len() + 16
        ));
        for segment in &stmt.source_segments {
            match segment {
                SourceSegment::Text { .. } => {
                    let text = stmt.segment_text(segment).unwrap_or_default();
                    w.line(format!("sql.push_str(\"{}\");", escape(text)));
                }
                SourceSegment::RowParam { index } => {
                    let arg = stmt
                        .parameter(*index)
                        .map(|p| format!("{}_len", sanitize_ident(&snake_case(&p.name))))
                        .unwrap_or_else(|| "0".to_string());
                    w.line("sql.push('(');");
                    w.block(&format!("for i in 0..{arg}"), |w| {
                        w.line("if i > 0 {");
                        w.line("    sql.push_str(\", \");");
                        w.line("}");
                        w.line("sql.push('?');");
                    });
                    w.line("sql.push(')');");
                }
            }
        }
        w.line("sql");
    });
}

/// Maps an inferred type onto the Rust type the generated code uses.
fn rust_type(ty: &Type) -> String {
    match ty {
        Type::Optional { inner } => format!("Option<{}>", rust_type(inner)),
        Type::Alias { alias, .. } => match alias.to_uppercase().as_str() {
            "BOOL" => "bool".to_string(),
            _ => sanitize_ident(&pascal_case(&alias.to_lowercase())),
        },
        Type::Nominal { name } => match name.to_uppercase().as_str() {
            "INTEGER" => "i64".to_string(),
            "REAL" | "NUMERIC" => "f64".to_string(),
            "TEXT" | "ANY" => "String".to_string(),
            "BLOB" => "Vec<u8>".to_string(),
            "BOOL" => "bool".to_string(),
            _ => "String".to_string(),
        },
        Type::Row { shape } => match shape {
            RowShape::Unknown { element } => format!("Vec<{}>", rust_type(element)),
            _ => "()".to_string(),
        },
        Type::Fn { .. } | Type::Var { .. } | Type::Error => "()".to_string(),
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mapping() {
        assert_eq!(rust_type(&Type::integer()), "i64");
        assert_eq!(rust_type(&Type::optional(Type::text())), "Option<String>");
        assert_eq!(rust_type(&Type::alias(Type::text(), "UUID")), "Uuid");
        assert_eq!(rust_type(&Type::alias(Type::integer(), "BOOL")), "bool");
        assert_eq!(
            rust_type(&Type::unknown_row(Type::integer())),
            "Vec<i64>"
        );
    }

    #[test]
    fn escape_handles_quotes_and_newlines() {
        assert_eq!(escape("a \"b\"\nc"), "a \\\"b\\\"\\nc");
    }
}
