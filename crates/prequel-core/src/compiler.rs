//! The compilation session.
//!
//! A session owns the schema and the registered pragmas. Migration
//! files mutate the schema strictly in numeric filename order; query
//! files observe the frozen result and never write back, so a driver
//! may compile independent query files in parallel. There is no
//! process-wide state: everything threads through [`Compiler`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::ast::{Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::infer::Inferrer;
use crate::ir;
use crate::parser;
use crate::pragma::PragmaState;
use crate::rewrite;
use crate::schema::{Column, IndexInfo, QualifiedName, Schema, Table, TableKind, TriggerInfo};
use crate::types::Type;
use crate::validate::{self, CompileContext};

/// Options recognized by the core; paths and CLI flags belong to the
/// driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub database_name: String,
    pub language: Language,
    pub options: Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Rust,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    pub namespace_generated_models: bool,
    pub create_output_directory: bool,
    pub imports: Vec<String>,
}

/// A migration file; the name must parse as `NUMBER.extension`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFile {
    pub name: String,
    pub number: u64,
    pub sql: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationNameError {
    #[error("migration file name must be `NUMBER.sql`, got `{0}`")]
    Invalid(String),
}

impl MigrationFile {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Result<Self, MigrationNameError> {
        let name = name.into();
        let stem = name.split('.').next().unwrap_or("");
        let number = stem
            .parse::<u64>()
            .map_err(|_| MigrationNameError::Invalid(name.clone()))?;
        Ok(Self {
            name,
            number,
            sql: sql.into(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueryFile {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileRequest {
    pub migrations: Vec<MigrationFile>,
    pub queries: Vec<QueryFile>,
    pub config: Config,
}

/// One compiled source file's statements.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFile {
    pub name: String,
    pub statements: Vec<ir::Statement>,
}

/// Diagnostics attributed to one source file, sorted by source-range
/// start.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDiagnostics {
    pub file: String,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub schema: Schema,
    pub migrations: Vec<CompiledFile>,
    pub queries: Vec<CompiledFile>,
    pub diagnostics: Vec<FileDiagnostics>,
}

impl CompileResult {
    /// True when any error-level diagnostic exists; the driver must
    /// not generate code in that case.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|f| f.diagnostics.has_errors())
    }
}

/// Compiles a whole request: migrations in numeric order, then every
/// query file against the frozen schema.
pub fn compile(request: &CompileRequest) -> CompileResult {
    let mut compiler = Compiler::new(request.config.clone());
    let mut migrations = request.migrations.clone();
    migrations.sort_by_key(|m| m.number);

    let mut compiled_migrations = Vec::new();
    let mut diagnostics = Vec::new();
    for file in &migrations {
        let (compiled, diags) = compiler.compile_migration_file(file);
        compiled_migrations.push(compiled);
        diagnostics.push(FileDiagnostics {
            file: file.name.clone(),
            diagnostics: diags,
        });
    }

    let mut compiled_queries = Vec::new();
    for file in &request.queries {
        let (compiled, diags) = compiler.compile_query_file(file);
        compiled_queries.push(compiled);
        diagnostics.push(FileDiagnostics {
            file: file.name.clone(),
            diagnostics: diags,
        });
    }

    CompileResult {
        schema: compiler.into_schema(),
        migrations: compiled_migrations,
        queries: compiled_queries,
        diagnostics,
    }
}

pub struct Compiler {
    #[allow(dead_code)]
    config: Config,
    schema: Schema,
    pragmas: PragmaState,
}

impl Compiler {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            schema: Schema::new(),
            pragmas: PragmaState::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Compiles one migration file, mutating the session schema.
    pub fn compile_migration_file(&mut self, file: &MigrationFile) -> (CompiledFile, Diagnostics) {
        #[cfg(feature = "tracing")]
        debug!(file = %file.name, "compiling migration");
        let (stmts, mut diagnostics) = parser::parse(&file.sql);
        let mut statements = Vec::new();
        for stmt in &stmts {
            let mut stmt_diags = Diagnostics::new();
            let legal = self.validate_and_prepare(
                stmt,
                CompileContext::Migration,
                &mut stmt_diags,
            );
            let mut inferrer = Inferrer::new(&self.schema, &self.pragmas, &mut stmt_diags);
            let signature = inferrer.infer_statement(stmt);
            let view_output = inferrer.view_output().cloned();
            if legal {
                apply_migration(
                    &mut self.schema,
                    &self.pragmas,
                    stmt,
                    view_output.as_ref(),
                    &mut stmt_diags,
                );
            }
            statements.push(build_statement(&file.sql, stmt, &signature));
            stmt_diags.sort_by_span();
            diagnostics.extend(stmt_diags);
        }
        diagnostics.sort_by_span();
        (
            CompiledFile {
                name: file.name.clone(),
                statements,
            },
            diagnostics,
        )
    }

    /// Compiles one query file against the frozen schema. Pragmas in a
    /// query file are scoped to that file.
    pub fn compile_query_file(&self, file: &QueryFile) -> (CompiledFile, Diagnostics) {
        #[cfg(feature = "tracing")]
        debug!(file = %file.name, "compiling queries");
        let (stmts, mut diagnostics) = parser::parse(&file.sql);
        let mut pragmas = self.pragmas.clone();
        let mut statements = Vec::new();
        for stmt in &stmts {
            let mut stmt_diags = Diagnostics::new();
            if let Some(diag) = validate::check(stmt, CompileContext::Query) {
                stmt_diags.push(diag);
            }
            if let StmtKind::Pragma(pragma) = &stmt.kind {
                pragmas.apply(pragma, stmt.span, &mut stmt_diags);
            }
            let mut inferrer = Inferrer::new(&self.schema, &pragmas, &mut stmt_diags);
            let signature = inferrer.infer_statement(stmt);
            #[cfg(feature = "tracing")]
            trace!(
                span = ?stmt.span,
                parameters = signature.parameters.len(),
                "inferred statement"
            );
            statements.push(build_statement(&file.sql, stmt, &signature));
            stmt_diags.sort_by_span();
            diagnostics.extend(stmt_diags);
        }
        diagnostics.sort_by_span();
        (
            CompiledFile {
                name: file.name.clone(),
                statements,
            },
            diagnostics,
        )
    }

    fn validate_and_prepare(
        &mut self,
        stmt: &Stmt,
        context: CompileContext,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        let legal = match validate::check(stmt, context) {
            Some(diag) => {
                diagnostics.push(diag);
                false
            }
            None => true,
        };
        if let StmtKind::Pragma(pragma) = &stmt.kind {
            self.pragmas.apply(pragma, stmt.span, diagnostics);
        }
        legal
    }
}

/// Assembles the IR record for one statement.
fn build_statement(source: &str, stmt: &Stmt, signature: &crate::infer::Signature) -> ir::Statement {
    let rewritten = rewrite::rewrite(source, stmt, signature);
    let definition = match &stmt.kind {
        StmtKind::Define(define) => Some(ir::Definition {
            name: define.name.value.clone(),
            input: define.input.as_ref().map(|i| i.value.clone()),
            output: define.output.as_ref().map(|o| o.value.clone()),
        }),
        _ => None,
    };
    ir::Statement {
        definition,
        parameters: rewritten.parameters,
        result_columns: signature.output.clone(),
        cardinality: signature.cardinality,
        read_only: signature.read_only,
        sanitized_sql: rewritten.sanitized_sql,
        source_segments: rewritten.segments,
        used_tables: signature.used_tables.clone(),
        node: stmt.id,
    }
}

// -- schema evolution --------------------------------------------------------

fn apply_migration(
    schema: &mut Schema,
    pragmas: &PragmaState,
    stmt: &Stmt,
    view_output: Option<&Type>,
    diagnostics: &mut Diagnostics,
) {
    use crate::ast::*;

    fn record(diagnostics: &mut Diagnostics, result: Result<(), Diagnostic>) {
        if let Err(diag) = result {
            diagnostics.push(diag);
        }
    }

    match &stmt.kind {
        StmtKind::CreateTable(create) => {
            let table = table_from_create(create, pragmas, diagnostics);
            record(diagnostics, schema.create_table(table, create.if_not_exists, create.name.span));
        }
        StmtKind::AlterTable(alter) => {
            let name = QualifiedName::from(&alter.table);
            match &alter.action {
                AlterTableAction::RenameTo(new) => {
                    record(diagnostics, schema.rename_table(
                        &name,
                        QualifiedName {
                            schema: name.schema.clone(),
                            name: new.value.clone(),
                        },
                        new.span,
                    ));
                }
                AlterTableAction::RenameColumn { old, new } => {
                    record(diagnostics, schema.rename_column(&name, &old.value, &new.value, new.span));
                }
                AlterTableAction::AddColumn(column_def) => {
                    let column = column_from_def(column_def, pragmas);
                    record(diagnostics, schema.add_column(&name, column, column_def.span));
                }
                AlterTableAction::DropColumn(column) => {
                    record(diagnostics, schema.drop_column(&name, &column.value, column.span));
                }
            }
        }
        StmtKind::CreateIndex(create) => {
            let table = QualifiedName::bare(create.table.value.clone());
            if schema.resolve(&table).is_none() {
                diagnostics.push(Diagnostic::error(
                    format!("Table `{}` does not exist", create.table.value),
                    create.table.span,
                ));
            }
            record(diagnostics, schema.create_index(
                IndexInfo {
                    name: create.name.name.value.clone(),
                    table,
                    unique: create.unique,
                },
                create.if_not_exists,
                create.name.span,
            ));
        }
        StmtKind::CreateView(create) => {
            let mut table = Table::new(QualifiedName::from(&create.name), TableKind::View);
            if let Some(Type::Row {
                shape: crate::types::RowShape::Named { columns },
            }) = view_output
            {
                let renames = &create.columns;
                for (position, (column_name, ty)) in columns.iter().enumerate() {
                    let name = renames
                        .get(position)
                        .map(|ident| ident.value.clone())
                        .unwrap_or_else(|| column_name.clone());
                    if let Err(message) = table.push_column(Column::new(name, ty.clone())) {
                        diagnostics.push(Diagnostic::error(message, create.name.span));
                    }
                }
            }
            record(diagnostics, schema.create_table(table, create.if_not_exists, create.name.span));
        }
        StmtKind::CreateTrigger(create) => {
            let table = QualifiedName::from(&create.table);
            if schema.resolve(&table).is_none() {
                diagnostics.push(Diagnostic::error(
                    format!("Table `{table}` does not exist"),
                    create.table.span,
                ));
            }
            record(diagnostics, schema.create_trigger(
                TriggerInfo {
                    name: create.name.name.value.clone(),
                    table,
                },
                create.if_not_exists,
                create.name.span,
            ));
        }
        StmtKind::CreateVirtualTable(create) => {
            let fts5 = create.module.eq_ignore_case("fts5");
            let kind = if fts5 {
                TableKind::Fts5
            } else {
                TableKind::Normal
            };
            let mut table = Table::new(QualifiedName::from(&create.name), kind);
            for arg in &create.args {
                if let VirtualTableArg::Fts5Column(column) = arg {
                    let base = column
                        .ty
                        .as_ref()
                        .map(|ty| pragmas.resolve_type(ty))
                        .unwrap_or_else(Type::text);
                    let ty = if column.not_null {
                        base
                    } else {
                        Type::optional(base)
                    };
                    if let Err(message) =
                        table.push_column(Column::new(column.name.value.clone(), ty))
                    {
                        diagnostics.push(Diagnostic::error(message, column.span));
                    }
                }
            }
            record(diagnostics, schema.create_table(table, create.if_not_exists, create.name.span));
        }
        StmtKind::Drop(drop) => {
            let name = QualifiedName::from(&drop.name);
            match drop.kind {
                ObjectKind::Table => record(diagnostics, schema.drop_table(&name, drop.if_exists, drop.name.span)),
                ObjectKind::View => record(diagnostics, schema.drop_view(&name, drop.if_exists, drop.name.span)),
                ObjectKind::Index => record(diagnostics, schema.drop_index(
                    &drop.name.name.value,
                    drop.if_exists,
                    drop.name.span,
                )),
                ObjectKind::Trigger => record(diagnostics, schema.drop_trigger(
                    &drop.name.name.value,
                    drop.if_exists,
                    drop.name.span,
                )),
            }
        }
        _ => {}
    }
}

fn table_from_create(
    create: &crate::ast::CreateTable,
    pragmas: &PragmaState,
    diagnostics: &mut Diagnostics,
) -> Table {
    use crate::ast::TableConstraintKind;

    let mut table = Table::new(QualifiedName::from(&create.name), TableKind::Normal);
    for column_def in &create.columns {
        let column = column_from_def(column_def, pragmas);
        if column_def.is_primary_key() {
            table.primary_key.push(column.name.to_lowercase());
        }
        if let Err(message) = table.push_column(column) {
            diagnostics.push(Diagnostic::error(message, column_def.span));
        }
    }
    for constraint in &create.constraints {
        match &constraint.kind {
            TableConstraintKind::PrimaryKey(columns) => {
                if !table.primary_key.is_empty() {
                    diagnostics.push(Diagnostic::error(
                        format!("Table `{}` already has a primary key", table.name),
                        constraint.span,
                    ));
                    continue;
                }
                for ident in columns {
                    if !table.has_column(&ident.value) {
                        diagnostics.push(Diagnostic::error(
                            format!(
                                "Column `{}` does not exist in table `{}`",
                                ident.value, table.name
                            ),
                            ident.span,
                        ));
                        continue;
                    }
                    let key = ident.value.to_lowercase();
                    table.primary_key.push(key.clone());
                    // Key membership makes the column non-nullable.
                    if let Some(column) = table.columns.get_mut(&key) {
                        let stripped = column.ty.unwrap_optional().clone();
                        column.ty = stripped;
                    }
                }
            }
            TableConstraintKind::Unique(_)
            | TableConstraintKind::Check(_)
            | TableConstraintKind::ForeignKey { .. } => {}
        }
    }
    table
}

fn column_from_def(def: &crate::ast::ColumnDef, pragmas: &PragmaState) -> Column {
    let base = def
        .ty
        .as_ref()
        .map(|ty| pragmas.resolve_type(ty))
        .unwrap_or_else(Type::any);
    let base = if pragmas.is_bool_hint(&def.name.value) && !matches!(base, Type::Alias { .. }) {
        Type::alias(base, "BOOL")
    } else {
        base
    };
    let non_null = def.is_primary_key() || def.is_not_null();
    let ty = if non_null {
        base
    } else {
        Type::optional(base)
    };
    Column::new(def.name.value.clone(), ty)
}
