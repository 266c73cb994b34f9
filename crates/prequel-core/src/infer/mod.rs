//! Hindley-Milner type inference over statements.
//!
//! One [`Inferrer`] is a single inference session: it mints its own
//! type variables, accumulates a substitution, records bind parameters
//! in first-occurrence order, and attaches a type to every expression
//! node. Sessions are per statement and never shared.

pub mod builtins;
pub mod unify;

use std::collections::{HashMap, HashSet};

use crate::ast::*;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::env::{Environment, Lookup, QualifiedLookup, TableBinding, TypeContainer};
use crate::ir::Cardinality;
use crate::pragma::PragmaState;
use crate::schema::{Column, QualifiedName, Schema, Table, TableKind};
use crate::span::Span;
use crate::types::{Type, TypeVar};

pub use unify::{Substitution, TypeVarGen, UnifyError};

/// The inferred signature of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Dense from index 1, ordered by first occurrence.
    pub parameters: Vec<SigParameter>,
    pub output: Type,
    pub cardinality: Cardinality,
    pub read_only: bool,
    pub used_tables: Vec<QualifiedName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SigParameter {
    pub index: usize,
    /// Explicit (`:name`) or context-inferred name; `None` falls back
    /// to a synthesized `value`/`value2`/… during rewriting.
    pub name: Option<String>,
    /// Whether the name was inferred rather than written in the SQL.
    pub name_inferred: bool,
    pub ty: Type,
    /// First occurrence, for diagnostics.
    pub span: Span,
    /// Every occurrence, for source segmentation.
    pub occurrences: Vec<Span>,
}

impl SigParameter {
    pub fn is_row_valued(&self) -> bool {
        self.ty.is_row_like()
    }
}

struct ParamRecord {
    explicit_name: Option<String>,
    inferred_name: Option<String>,
    var: TypeVar,
    first_span: Span,
    occurrences: Vec<Span>,
}

struct SelectOutput {
    row: Type,
    single: bool,
}

pub struct Inferrer<'a> {
    schema: &'a Schema,
    pragmas: &'a PragmaState,
    diagnostics: &'a mut Diagnostics,
    sub: Substitution,
    vars: TypeVarGen,
    env: Environment,
    /// CTE tables shadowing the schema, innermost frame last.
    cte_frames: Vec<Vec<Table>>,
    params: Vec<ParamRecord>,
    /// Bind-parameter node → index into `params`.
    node_params: HashMap<NodeId, usize>,
    /// Side table of inferred types per expression node.
    node_types: HashMap<NodeId, Type>,
    used_tables: Vec<QualifiedName>,
    /// Filled when the statement is CREATE VIEW, so the caller can
    /// register the view's columns.
    view_output: Option<Type>,
}

impl<'a> Inferrer<'a> {
    pub fn new(
        schema: &'a Schema,
        pragmas: &'a PragmaState,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            schema,
            pragmas,
            diagnostics,
            sub: Substitution::new(),
            vars: TypeVarGen::new(),
            env: Environment::new(),
            cte_frames: Vec::new(),
            params: Vec::new(),
            node_params: HashMap::new(),
            node_types: HashMap::new(),
            used_tables: Vec::new(),
            view_output: None,
        }
    }

    /// The view's inferred output row, present after inferring a
    /// CREATE VIEW statement.
    pub fn view_output(&self) -> Option<&Type> {
        self.view_output.as_ref()
    }

    /// The per-node inferred types, fully resolved.
    pub fn node_types(&self) -> HashMap<NodeId, Type> {
        self.node_types
            .iter()
            .map(|(id, ty)| (*id, generalize(self.sub.apply(ty))))
            .collect()
    }

    pub fn infer_statement(&mut self, stmt: &Stmt) -> Signature {
        let (output, cardinality, read_only) = match &stmt.kind {
            StmtKind::Select(select) => {
                let out = self.infer_select(select);
                let cardinality = if out.single {
                    Cardinality::Single
                } else {
                    Cardinality::Many
                };
                (out.row, cardinality, true)
            }
            StmtKind::Insert(insert) => self.infer_insert(insert),
            StmtKind::Update(update) => self.infer_update(update),
            StmtKind::Delete(delete) => self.infer_delete(delete),
            StmtKind::Define(define) => return self.infer_statement(&define.stmt),
            StmtKind::CreateView(view) => {
                let out = self.infer_select(&view.query);
                self.view_output = Some(generalize(self.sub.apply(&out.row)));
                (Type::empty_row(), Cardinality::Many, false)
            }
            StmtKind::CreateTable(_)
            | StmtKind::AlterTable(_)
            | StmtKind::CreateIndex(_)
            | StmtKind::CreateTrigger(_)
            | StmtKind::CreateVirtualTable(_)
            | StmtKind::Drop(_)
            | StmtKind::Reindex { .. }
            | StmtKind::Vacuum { .. }
            | StmtKind::Pragma(_)
            | StmtKind::Begin { .. }
            | StmtKind::Commit
            | StmtKind::Rollback { .. }
            | StmtKind::Savepoint(_)
            | StmtKind::Release(_) => (Type::empty_row(), Cardinality::Many, false),
            StmtKind::Empty | StmtKind::Error => (Type::empty_row(), Cardinality::Many, true),
        };
        self.finish(output, cardinality, read_only)
    }

    fn finish(&mut self, output: Type, cardinality: Cardinality, read_only: bool) -> Signature {
        let output = generalize(self.sub.apply(&output));
        let parameters = self
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| SigParameter {
                index: i + 1,
                name: p.explicit_name.clone().or_else(|| p.inferred_name.clone()),
                name_inferred: p.explicit_name.is_none(),
                ty: generalize(self.sub.apply(&Type::var(p.var))),
                span: p.first_span,
                occurrences: p.occurrences.clone(),
            })
            .collect();
        Signature {
            parameters,
            output,
            cardinality,
            read_only,
            used_tables: self.used_tables.clone(),
        }
    }

    // -- tables ------------------------------------------------------------

    fn record_used(&mut self, name: QualifiedName) {
        if !self.used_tables.contains(&name) {
            self.used_tables.push(name);
        }
    }

    /// Resolves a table reference through CTE frames (innermost
    /// first), then the schema. Failure diagnoses and yields the
    /// error placeholder so sibling analysis keeps going.
    fn resolve_table(&mut self, name: &QualifiedName, span: Span) -> Table {
        if name.schema.is_none() {
            for frame in self.cte_frames.iter().rev() {
                if let Some(table) = frame
                    .iter()
                    .find(|t| t.name.name.eq_ignore_ascii_case(&name.name))
                {
                    return table.clone();
                }
            }
        }
        if let Some(table) = self.schema.resolve(name) {
            let table = table.clone();
            self.record_used(table.name.clone());
            return table;
        }
        self.diagnostics.push(Diagnostic::error(
            format!("Table `{name}` does not exist"),
            span,
        ));
        Table::error(name.clone())
    }

    fn bind_table(&mut self, table: Table, label: String, optionalize: bool) {
        let mut bound = table;
        if optionalize {
            for column in bound.columns.values_mut() {
                column.ty = Type::optional(column.ty.clone());
            }
        }
        let mut binding = TableBinding::new(label, bound);
        if binding.table.kind == TableKind::Fts5 {
            // FTS5 pseudo-columns: `rank`, and the table-valued column
            // used by MATCH. Visible by name, hidden from `*`.
            binding
                .extra
                .push(("rank".to_string(), TypeContainer::explicit_only(Type::real())));
            binding.extra.push((
                binding.table.name.name.clone(),
                TypeContainer::explicit_only(Type::text()),
            ));
        }
        self.env.add_table(binding);
    }

    /// Binds one FROM item; returns the resolved table when the item
    /// is a plain table reference (for unique-key analysis).
    fn bind_table_or_subquery(&mut self, item: &TableOrSubquery, optionalize: bool) -> Option<Table> {
        match item {
            TableOrSubquery::Table { name, alias } => {
                let qname = QualifiedName::from(name);
                let table = self.resolve_table(&qname, name.span);
                // An alias rebinds and erases schema qualification.
                let label = alias
                    .as_ref()
                    .map(|a| a.value.clone())
                    .unwrap_or_else(|| name.name.value.clone());
                self.bind_table(table.clone(), label, optionalize);
                Some(table)
            }
            TableOrSubquery::Subquery { query, alias } => {
                let out = self.infer_select(query);
                let label = alias
                    .as_ref()
                    .map(|a| a.value.clone())
                    .unwrap_or_default();
                let table = table_from_row(
                    QualifiedName::bare(label.clone()),
                    &self.sub.apply(&out.row),
                    TableKind::Subquery,
                );
                self.bind_table(table, label, optionalize);
                None
            }
        }
    }

    /// Binds every FROM item into the current scope. Returns the sole
    /// table when the clause has exactly one plain table and no joins.
    fn bind_from(&mut self, from: Option<&FromClause>) -> Option<Table> {
        let from = from?;
        let first = self.bind_table_or_subquery(&from.first, false);
        for join in &from.joins {
            // Columns of the inner side of an outer join go nullable.
            let optionalize = matches!(join.op, JoinOp::Left | JoinOp::Full);
            self.bind_table_or_subquery(&join.table, optionalize);
            if let Some(JoinConstraint::On(on)) = &join.constraint {
                self.infer_expr(on);
            }
        }
        if from.joins.is_empty() {
            first
        } else {
            None
        }
    }

    // -- SELECT ------------------------------------------------------------

    fn infer_select(&mut self, select: &Select) -> SelectOutput {
        let pushed_ctes = if let Some(with) = &select.with {
            self.push_cte_frame(with);
            true
        } else {
            false
        };

        self.env.push_scope();
        let mut single = false;
        let mut output = match &select.body.first {
            SelectCore::Select(clause) => {
                let sole_table = self.bind_from(clause.from.as_ref());
                if let Some(where_clause) = &clause.where_clause {
                    self.infer_expr(where_clause);
                }
                for group in &clause.group_by {
                    self.infer_expr(group);
                }
                if let Some(having) = &clause.having {
                    self.infer_expr(having);
                }
                let row = self.infer_result_columns(&clause.columns);

                // Cardinality: a FROM-less select is one row; a bare
                // aggregate is one row; a WHERE that pins down the
                // whole primary key of the only table is one row.
                if clause.from.is_none() {
                    single = true;
                }
                if clause.group_by.is_empty() && columns_have_aggregate(&clause.columns) {
                    single = true;
                }
                if let Some(table) = sole_table {
                    if where_pins_primary_key(clause.where_clause.as_ref(), &table) {
                        single = true;
                    }
                }
                row
            }
            SelectCore::Values { rows, span } => self.infer_values(rows, *span),
        };

        for (_, core) in &select.body.compounds {
            // Compound arms never make a query single-row.
            single = false;
            let (rhs, span) = self.infer_core_isolated(core);
            output = self.unify_or_diagnose(&output, &rhs, span);
        }

        for term in &select.order_by {
            // Output aliases are orderable: `SELECT x AS a … ORDER BY a`.
            if let ExprKind::Column {
                table: None, name, ..
            } = &term.expr.kind
            {
                if let Some(ty) = named_row_column(&output, &name.value) {
                    self.node_types.insert(term.expr.id, ty);
                    continue;
                }
            }
            self.infer_expr(&term.expr);
        }
        if let Some(limit) = &select.limit {
            let limit_ty = self.infer_expr(&limit.limit);
            self.unify_or_diagnose(&limit_ty, &Type::integer(), limit.limit.span);
            if let Some(offset) = &limit.offset {
                let offset_ty = self.infer_expr(offset);
                self.unify_or_diagnose(&offset_ty, &Type::integer(), offset.span);
            }
            if is_literal_one(&limit.limit) {
                single = true;
            }
        }

        self.env.pop_scope();
        if pushed_ctes {
            self.cte_frames.pop();
        }
        SelectOutput {
            row: output,
            single,
        }
    }

    fn infer_core_isolated(&mut self, core: &SelectCore) -> (Type, Span) {
        self.env.push_scope();
        let (row, span) = match core {
            SelectCore::Select(clause) => {
                self.bind_from(clause.from.as_ref());
                if let Some(where_clause) = &clause.where_clause {
                    self.infer_expr(where_clause);
                }
                for group in &clause.group_by {
                    self.infer_expr(group);
                }
                if let Some(having) = &clause.having {
                    self.infer_expr(having);
                }
                (self.infer_result_columns(&clause.columns), clause.span)
            }
            SelectCore::Values { rows, span } => (self.infer_values(rows, *span), *span),
        };
        self.env.pop_scope();
        (row, span)
    }

    fn push_cte_frame(&mut self, with: &With) {
        self.cte_frames.push(Vec::new());
        for cte in &with.ctes {
            if with.recursive && !cte.columns.is_empty() {
                // Pre-register the recursive table with fresh
                // variables so self-references resolve, then tie the
                // variables to the inferred output.
                let mut table =
                    Table::new(QualifiedName::bare(cte.name.value.clone()), TableKind::Cte);
                let mut vars = Vec::new();
                for column in &cte.columns {
                    let var = self.vars.fresh();
                    vars.push(var);
                    let _ = table.push_column(Column::new(column.value.clone(), Type::var(var)));
                }
                self.cte_frames
                    .last_mut()
                    .expect("frame pushed above")
                    .push(table);
                let out = self.infer_select(&cte.query);
                if let Type::Row {
                    shape: crate::types::RowShape::Named { columns },
                } = self.sub.apply(&out.row)
                {
                    for (var, ty) in vars.iter().zip(columns.values()) {
                        self.unify_or_diagnose(&Type::var(*var), ty, cte.name.span);
                    }
                }
                // Refresh the registered table with resolved types.
                if let Some(frame) = self.cte_frames.last_mut() {
                    if let Some(table) = frame
                        .iter_mut()
                        .find(|t| t.name.name.eq_ignore_ascii_case(&cte.name.value))
                    {
                        for column in table.columns.values_mut() {
                            column.ty = self.sub.apply(&column.ty);
                        }
                    }
                }
            } else {
                let out = self.infer_select(&cte.query);
                let row = self.sub.apply(&out.row);
                let mut table = table_from_row(
                    QualifiedName::bare(cte.name.value.clone()),
                    &row,
                    TableKind::Cte,
                );
                if !cte.columns.is_empty() {
                    // Explicit column names rename positionally.
                    let types: Vec<Type> =
                        table.columns.values().map(|c| c.ty.clone()).collect();
                    table.columns.clear();
                    for (ident, ty) in cte.columns.iter().zip(types) {
                        let _ = table.push_column(Column::new(ident.value.clone(), ty));
                    }
                }
                self.cte_frames
                    .last_mut()
                    .expect("frame pushed above")
                    .push(table);
            }
        }
    }

    fn infer_result_columns(&mut self, columns: &[ResultColumn]) -> Type {
        let mut out: Vec<(Option<String>, Type)> = Vec::new();
        for column in columns {
            match column {
                ResultColumn::Star(_) => {
                    for (name, ty) in self.env.visible_columns() {
                        out.push((Some(name), ty));
                    }
                }
                ResultColumn::TableStar(table, span) => {
                    match self.env.table_columns(&table.value) {
                        Some(columns) => {
                            for (name, ty) in columns {
                                out.push((Some(name), ty));
                            }
                        }
                        None => self.diagnostics.push(Diagnostic::error(
                            format!("Table `{}` does not exist", table.value),
                            *span,
                        )),
                    }
                }
                ResultColumn::Expr { expr, alias } => {
                    let ty = self.infer_expr(expr);
                    let name = alias
                        .as_ref()
                        .map(|a| a.value.clone())
                        .or_else(|| implicit_column_name(expr));
                    out.push((name, ty));
                }
            }
        }
        let mut named = indexmap::IndexMap::new();
        for (position, (name, ty)) in out.into_iter().enumerate() {
            let base = name.unwrap_or_else(|| format!("column{}", position + 1));
            let mut key = base.clone();
            let mut n = 2;
            while named.contains_key(&key) {
                key = format!("{base}{n}");
                n += 1;
            }
            named.insert(key, ty);
        }
        Type::Row {
            shape: crate::types::RowShape::Named { columns: named },
        }
    }

    fn infer_values(&mut self, rows: &[Vec<Expr>], span: Span) -> Type {
        let arity = rows.first().map(Vec::len).unwrap_or(0);
        let mut types: Vec<Type> = (0..arity).map(|_| Type::var(self.vars.fresh())).collect();
        for row in rows {
            if row.len() != arity {
                self.diagnostics.push(Diagnostic::error(
                    format!("Expected {arity} values, found {}", row.len()),
                    row_span(row).unwrap_or(span),
                ));
                continue;
            }
            for (expr, slot) in row.iter().zip(types.iter_mut()) {
                let ty = self.infer_expr(expr);
                *slot = match unify::unify(slot, &ty, &mut self.sub) {
                    Ok(merged) => merged,
                    Err(err) => {
                        self.diagnostics.push(unify_diagnostic(&err, expr.span));
                        Type::Error
                    }
                };
            }
        }
        Type::named_row(
            types
                .into_iter()
                .enumerate()
                .map(|(i, ty)| (format!("column{}", i + 1), ty)),
        )
    }

    // -- DML ---------------------------------------------------------------

    fn insert_targets(&mut self, table: &Table, columns: &[Ident]) -> Vec<Column> {
        if columns.is_empty() {
            table.columns.values().cloned().collect()
        } else {
            columns
                .iter()
                .filter_map(|ident| match table.column(&ident.value) {
                    Some(column) => Some(column.clone()),
                    None => {
                        if !table.error {
                            self.diagnostics.push(Diagnostic::error(
                                format!(
                                    "Column `{}` does not exist in table `{}`",
                                    ident.value, table.name
                                ),
                                ident.span,
                            ));
                        }
                        None
                    }
                })
                .collect()
        }
    }

    fn infer_insert(&mut self, insert: &Insert) -> (Type, Cardinality, bool) {
        let qname = QualifiedName::from(&insert.table);
        let table = self.resolve_table(&qname, insert.table.span);
        let targets = self.insert_targets(&table, &insert.columns);

        match &insert.source {
            InsertSource::Values(rows) => {
                for row in rows {
                    if !table.error && row.len() != targets.len() {
                        self.diagnostics.push(Diagnostic::error(
                            format!("Expected {} values, found {}", targets.len(), row.len()),
                            row_span(row).unwrap_or(insert.table.span),
                        ));
                    }
                    for (expr, column) in row.iter().zip(&targets) {
                        let ty = self.infer_expr(expr);
                        self.suggest_param_name(expr, &column.name);
                        self.unify_or_diagnose(&ty, &column.ty, expr.span);
                    }
                    // Excess values (or a placeholder table) still get
                    // inferred so their parameters are collected.
                    for expr in row.iter().skip(targets.len()) {
                        self.infer_expr(expr);
                    }
                }
            }
            InsertSource::Select(query) => {
                let out = self.infer_select(query);
                let expected = Type::Row {
                    shape: crate::types::RowShape::Fixed {
                        items: targets.iter().map(|c| c.ty.clone()).collect(),
                    },
                };
                if !table.error {
                    self.unify_or_diagnose(&out.row, &expected, query.span);
                }
            }
            InsertSource::DefaultValues => {}
        }

        // Upserts and RETURNING see the target table's columns; DO
        // UPDATE additionally sees the conventional `excluded` row.
        self.env.push_scope();
        let label = insert
            .alias
            .as_ref()
            .map(|a| a.value.clone())
            .unwrap_or_else(|| insert.table.name.value.clone());
        self.bind_table(table.clone(), label, false);
        for upsert in &insert.upserts {
            if let Some(target) = &upsert.target {
                for column in &target.columns {
                    self.infer_expr(&column.expr);
                }
                if let Some(where_clause) = &target.where_clause {
                    self.infer_expr(where_clause);
                }
            }
            if let UpsertAction::Update { sets, where_clause } = &upsert.action {
                let mut excluded = table.clone();
                excluded.name = QualifiedName::bare("excluded");
                self.bind_table(excluded, "excluded".to_string(), false);
                self.infer_set_assignments(&table, sets);
                if let Some(where_clause) = where_clause {
                    self.infer_expr(where_clause);
                }
            }
        }
        let output = match &insert.returning {
            Some(returning) => self.infer_result_columns(returning),
            None => Type::empty_row(),
        };
        self.env.pop_scope();
        (output, Cardinality::Many, false)
    }

    fn infer_set_assignments(&mut self, table: &Table, sets: &[SetAssignment]) {
        for set in sets {
            let mut column_types = Vec::new();
            for ident in &set.columns {
                match table.column(&ident.value) {
                    Some(column) => column_types.push(column.ty.clone()),
                    None => {
                        if !table.error {
                            self.diagnostics.push(Diagnostic::error(
                                format!(
                                    "Column `{}` does not exist in table `{}`",
                                    ident.value, table.name
                                ),
                                ident.span,
                            ));
                        }
                        column_types.push(Type::Error);
                    }
                }
            }
            let value_ty = self.infer_expr(&set.value);
            if column_types.len() == 1 {
                self.suggest_param_name(&set.value, &set.columns[0].value);
                self.unify_or_diagnose(&value_ty, &column_types[0], set.value.span);
            } else {
                let expected = Type::Row {
                    shape: crate::types::RowShape::Fixed {
                        items: column_types,
                    },
                };
                self.unify_or_diagnose(&value_ty, &expected, set.value.span);
            }
        }
    }

    fn infer_update(&mut self, update: &Update) -> (Type, Cardinality, bool) {
        let qname = QualifiedName::from(&update.table);
        let table = self.resolve_table(&qname, update.table.span);
        self.env.push_scope();
        let label = update
            .alias
            .as_ref()
            .map(|a| a.value.clone())
            .unwrap_or_else(|| update.table.name.value.clone());
        self.bind_table(table.clone(), label, false);
        self.bind_from(update.from.as_ref());
        self.infer_set_assignments(&table, &update.sets);
        if let Some(where_clause) = &update.where_clause {
            self.infer_expr(where_clause);
        }
        let output = match &update.returning {
            Some(returning) => self.infer_result_columns(returning),
            None => Type::empty_row(),
        };
        self.env.pop_scope();
        (output, Cardinality::Many, false)
    }

    fn infer_delete(&mut self, delete: &Delete) -> (Type, Cardinality, bool) {
        let qname = QualifiedName::from(&delete.table);
        let table = self.resolve_table(&qname, delete.table.span);
        self.env.push_scope();
        let label = delete
            .alias
            .as_ref()
            .map(|a| a.value.clone())
            .unwrap_or_else(|| delete.table.name.value.clone());
        self.bind_table(table, label, false);
        if let Some(where_clause) = &delete.where_clause {
            self.infer_expr(where_clause);
        }
        let output = match &delete.returning {
            Some(returning) => self.infer_result_columns(returning),
            None => Type::empty_row(),
        };
        self.env.pop_scope();
        (output, Cardinality::Many, false)
    }

    // -- expressions -------------------------------------------------------

    fn infer_expr(&mut self, expr: &Expr) -> Type {
        let ty = self.infer_expr_kind(expr);
        self.node_types.insert(expr.id, ty.clone());
        ty
    }

    fn infer_expr_kind(&mut self, expr: &Expr) -> Type {
        match &expr.kind {
            ExprKind::Literal(literal) => self.literal_type(literal),
            ExprKind::Bind(param) => self.bind_param(expr.id, param, expr.span),
            ExprKind::Column {
                table,
                name,
                ..
            } => self.infer_column(table.as_ref(), name),
            ExprKind::Prefix { op, operand } => {
                let scheme = builtins::prefix_scheme(*op);
                self.apply_scheme(&scheme, &[operand.as_ref()])
            }
            ExprKind::Infix { left, op, right } => {
                let scheme = builtins::infix_scheme(*op);
                let result = self.apply_scheme(&scheme, &[left.as_ref(), right.as_ref()]);
                // `foo = ?` names the parameter after the column.
                if let Some(name) = column_name_of(left) {
                    self.suggest_param_name(right, &name);
                }
                if let Some(name) = column_name_of(right) {
                    self.suggest_param_name(left, &name);
                }
                result
            }
            ExprKind::Collate { operand, .. } => {
                let ty = self.infer_expr(operand);
                self.unify_or_diagnose(&ty, &Type::text(), operand.span);
                Type::text()
            }
            ExprKind::Between {
                operand,
                low,
                high,
                ..
            } => {
                let operand_ty = self.infer_expr(operand);
                let low_ty = self.infer_expr(low);
                let high_ty = self.infer_expr(high);
                let merged = self.unify_or_diagnose(&operand_ty, &low_ty, low.span);
                self.unify_or_diagnose(&merged, &high_ty, high.span);
                if let Some(name) = column_name_of(operand) {
                    self.suggest_param_name(low, &name);
                    self.suggest_param_name(high, &name);
                }
                Type::bool()
            }
            ExprKind::IsNull { operand, .. } => {
                self.infer_expr(operand);
                Type::bool()
            }
            ExprKind::TextMatch {
                operand,
                op,
                pattern,
                escape,
                ..
            } => {
                let scheme = builtins::text_match_scheme(*op);
                let result = self.apply_scheme(&scheme, &[operand.as_ref(), pattern.as_ref()]);
                if let Some(name) = column_name_of(operand) {
                    self.suggest_param_name(pattern, &name);
                }
                if let Some(escape) = escape {
                    let escape_ty = self.infer_expr(escape);
                    self.unify_or_diagnose(&escape_ty, &Type::text(), escape.span);
                }
                result
            }
            ExprKind::InList {
                operand, items, ..
            } => {
                let name = column_name_of(operand);
                let mut element = self.infer_expr(operand);
                for item in items {
                    let item_ty = self.infer_expr(item);
                    if let Some(name) = &name {
                        self.suggest_param_name(item, name);
                    }
                    element = self.unify_or_diagnose(&element, &item_ty, item.span);
                }
                Type::bool()
            }
            ExprKind::InSubquery { operand, query, .. } => {
                let operand_ty = self.infer_expr(operand);
                let out = self.infer_select(query);
                let element = single_column_type(&self.sub.apply(&out.row));
                match element {
                    Some(element) => {
                        self.unify_or_diagnose(
                            &Type::unknown_row(operand_ty),
                            &Type::unknown_row(element),
                            query.span,
                        );
                    }
                    None => self.diagnostics.push(Diagnostic::error(
                        "Subquery in IN must return exactly one column",
                        query.span,
                    )),
                }
                Type::bool()
            }
            ExprKind::InTable {
                operand, table, ..
            } => {
                let operand_ty = self.infer_expr(operand);
                let qname = QualifiedName::from(table);
                let resolved = self.resolve_table(&qname, table.span);
                if let Some(column) = resolved.columns.values().next() {
                    let ty = column.ty.clone();
                    self.unify_or_diagnose(&operand_ty, &ty, table.span);
                }
                Type::bool()
            }
            ExprKind::InBind {
                operand, param, ..
            } => {
                let operand_ty = self.infer_expr(operand);
                let param_ty = self.infer_expr(param);
                if let Some(name) = column_name_of(operand) {
                    self.suggest_param_name(param, &name);
                }
                self.unify_or_diagnose(
                    &param_ty,
                    &Type::unknown_row(operand_ty),
                    param.span,
                );
                Type::bool()
            }
            ExprKind::Call { name, args, .. } => self.infer_call(name, args),
            ExprKind::Cast { operand, ty } => {
                self.infer_expr(operand);
                self.pragmas.resolve_type(ty)
            }
            ExprKind::Case {
                operand,
                branches,
                otherwise,
            } => {
                let operand_ty = operand.as_ref().map(|o| self.infer_expr(o));
                let mut result: Type = Type::var(self.vars.fresh());
                for branch in branches {
                    let when_ty = self.infer_expr(&branch.when);
                    if let Some(operand_ty) = &operand_ty {
                        self.unify_or_diagnose(operand_ty, &when_ty, branch.when.span);
                    }
                    let then_ty = self.infer_expr(&branch.then);
                    result = self.unify_or_diagnose(&result, &then_ty, branch.then.span);
                }
                match otherwise {
                    Some(otherwise) => {
                        let else_ty = self.infer_expr(otherwise);
                        self.unify_or_diagnose(&result, &else_ty, otherwise.span)
                    }
                    // Without ELSE the fallthrough is NULL.
                    None => Type::optional(result),
                }
            }
            ExprKind::Grouped(inner) => self.infer_expr(inner),
            ExprKind::Subquery(query) => {
                let out = self.infer_select(query);
                let row = self.sub.apply(&out.row);
                match single_column_type(&row) {
                    // An empty result decodes as NULL, so a scalar
                    // subquery is optional unless proven otherwise.
                    Some(ty) => Type::optional(ty),
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            "Scalar subquery must return exactly one column",
                            query.span,
                        ));
                        Type::Error
                    }
                }
            }
            ExprKind::Exists { query, .. } => {
                self.infer_select(query);
                Type::bool()
            }
            ExprKind::Raise { .. } => Type::any(),
            ExprKind::Error => Type::Error,
        }
    }

    fn literal_type(&mut self, literal: &Literal) -> Type {
        match literal {
            Literal::Integer(_) => Type::integer(),
            Literal::Float(_) => Type::real(),
            Literal::String(_) => Type::text(),
            Literal::Blob(_) => Type::blob(),
            Literal::Null => Type::optional(Type::var(self.vars.fresh())),
            Literal::True | Literal::False => Type::bool(),
            Literal::CurrentTime | Literal::CurrentDate | Literal::CurrentTimestamp => {
                Type::text()
            }
        }
    }

    fn infer_column(&mut self, table: Option<&Ident>, name: &Ident) -> Type {
        match table {
            Some(table) => match self.env.lookup_qualified(&table.value, &name.value) {
                QualifiedLookup::Found(ty) => ty,
                QualifiedLookup::NoTable => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("Table `{}` does not exist", table.value),
                        table.span,
                    ));
                    Type::Error
                }
                QualifiedLookup::NoColumn => {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Column `{}` does not exist in table `{}`",
                            name.value, table.value
                        ),
                        name.span,
                    ));
                    Type::Error
                }
            },
            None => match self.env.lookup(&name.value) {
                Lookup::Found(ty) => ty,
                Lookup::Ambiguous => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("'{}' is ambiguous in the current context", name.value),
                        name.span,
                    ));
                    Type::Error
                }
                Lookup::Missing => {
                    self.diagnostics.push(Diagnostic::error(
                        format!("Column `{}` does not exist", name.value),
                        name.span,
                    ));
                    Type::Error
                }
            },
        }
    }

    fn infer_call(&mut self, name: &Ident, args: &CallArgs) -> Type {
        let list = match args {
            // `count(*)` and friends: no argument constraints.
            CallArgs::Star => return Type::integer(),
            CallArgs::List(list) => list,
        };
        match builtins::function_scheme(&name.value) {
            Some(scheme) => {
                let exprs: Vec<&Expr> = list.iter().collect();
                self.apply_scheme(&scheme, &exprs)
            }
            None => {
                for arg in list {
                    self.infer_expr(arg);
                }
                self.diagnostics.push(Diagnostic::warning(
                    format!("Unknown function `{}`", name.value),
                    name.span,
                ));
                Type::var(self.vars.fresh())
            }
        }
    }

    /// Instantiates a scheme and unifies each argument with its
    /// parameter; returns the resolved result type.
    fn apply_scheme(&mut self, scheme: &crate::types::TypeScheme, args: &[&Expr]) -> Type {
        let (params, ret) = builtins::instantiate(scheme, args.len(), &mut self.vars);
        for (arg, param) in args.iter().zip(&params) {
            let arg_ty = self.infer_expr(arg);
            if let Err(err) = unify::unify(&arg_ty, param, &mut self.sub) {
                self.diagnostics.push(unify_diagnostic(&err, arg.span));
            }
        }
        self.sub.apply(&ret)
    }

    // -- parameters --------------------------------------------------------

    fn bind_param(&mut self, node: NodeId, param: &BindParameter, span: Span) -> Type {
        match param {
            BindParameter::Named(name) => {
                if let Some(index) = self
                    .params
                    .iter()
                    .position(|p| p.explicit_name.as_deref() == Some(name.as_str()))
                {
                    self.params[index].occurrences.push(span);
                    self.node_params.insert(node, index);
                    Type::var(self.params[index].var)
                } else {
                    self.new_param(node, Some(name.clone()), span)
                }
            }
            BindParameter::Positional => self.new_param(node, None, span),
        }
    }

    fn new_param(&mut self, node: NodeId, explicit_name: Option<String>, span: Span) -> Type {
        let var = self.vars.fresh();
        self.params.push(ParamRecord {
            explicit_name,
            inferred_name: None,
            var,
            first_span: span,
            occurrences: vec![span],
        });
        self.node_params.insert(node, self.params.len() - 1);
        Type::var(var)
    }

    /// Attaches a context-derived name to an unnamed parameter, e.g.
    /// `WHERE foo = ?` names the parameter `foo`.
    fn suggest_param_name(&mut self, expr: &Expr, name: &str) {
        let target = strip_grouped(expr);
        if !matches!(target.kind, ExprKind::Bind(_)) {
            return;
        }
        if let Some(&index) = self.node_params.get(&target.id) {
            let record = &mut self.params[index];
            if record.explicit_name.is_none() && record.inferred_name.is_none() {
                record.inferred_name = Some(name.to_string());
            }
        }
    }

    fn unify_or_diagnose(&mut self, a: &Type, b: &Type, span: Span) -> Type {
        match unify::unify(a, b, &mut self.sub) {
            Ok(merged) => merged,
            Err(err) => {
                self.diagnostics.push(unify_diagnostic(&err, span));
                Type::Error
            }
        }
    }
}

// -- helpers ----------------------------------------------------------------

fn unify_diagnostic(err: &UnifyError, span: Span) -> Diagnostic {
    Diagnostic::error(
        format!("Unable to unify types `{}` and `{}`", err.left, err.right),
        span,
    )
}

/// Replaces unresolved inference variables with `ANY` for export.
fn generalize(ty: Type) -> Type {
    match ty {
        Type::Var { .. } => Type::any(),
        Type::Optional { inner } => Type::optional(generalize(*inner)),
        Type::Alias { storage, alias } => Type::alias(generalize(*storage), alias),
        Type::Fn { params, ret } => Type::Fn {
            params: params.into_iter().map(generalize).collect(),
            ret: Box::new(generalize(*ret)),
        },
        Type::Row { shape } => Type::Row {
            shape: match shape {
                crate::types::RowShape::Named { columns } => crate::types::RowShape::Named {
                    columns: columns
                        .into_iter()
                        .map(|(name, ty)| (name, generalize(ty)))
                        .collect(),
                },
                crate::types::RowShape::Fixed { items } => crate::types::RowShape::Fixed {
                    items: items.into_iter().map(generalize).collect(),
                },
                crate::types::RowShape::Unknown { element } => crate::types::RowShape::Unknown {
                    element: Box::new(generalize(*element)),
                },
                crate::types::RowShape::Empty => crate::types::RowShape::Empty,
            },
        },
        other => other,
    }
}

fn table_from_row(name: QualifiedName, row: &Type, kind: TableKind) -> Table {
    let mut table = Table::new(name, kind);
    if let Type::Row {
        shape: crate::types::RowShape::Named { columns },
    } = row
    {
        for (column_name, ty) in columns {
            let _ = table.push_column(Column::new(column_name.clone(), ty.clone()));
        }
    }
    table
}

/// A named-row column looked up case-insensitively.
fn named_row_column(row: &Type, name: &str) -> Option<Type> {
    match row {
        Type::Row {
            shape: crate::types::RowShape::Named { columns },
        } => columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, ty)| ty.clone()),
        _ => None,
    }
}

/// The single column of a one-column named row, if that is the shape.
fn single_column_type(row: &Type) -> Option<Type> {
    match row {
        Type::Row {
            shape: crate::types::RowShape::Named { columns },
        } if columns.len() == 1 => columns.values().next().cloned(),
        _ => None,
    }
}

fn strip_grouped(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Grouped(inner) => strip_grouped(inner),
        _ => expr,
    }
}

fn column_name_of(expr: &Expr) -> Option<String> {
    match &strip_grouped(expr).kind {
        ExprKind::Column { name, .. } => Some(name.value.clone()),
        _ => None,
    }
}

/// The output-column name an expression earns without an alias.
fn implicit_column_name(expr: &Expr) -> Option<String> {
    column_name_of(expr)
}

fn is_literal_one(expr: &Expr) -> bool {
    matches!(
        &strip_grouped(expr).kind,
        ExprKind::Literal(Literal::Integer(text)) if text == "1"
    )
}

fn row_span(row: &[Expr]) -> Option<Span> {
    let first = row.first()?;
    let last = row.last()?;
    Some(first.span.to(last.span))
}

fn columns_have_aggregate(columns: &[ResultColumn]) -> bool {
    columns.iter().any(|column| match column {
        ResultColumn::Expr { expr, .. } => expr_has_aggregate(expr),
        _ => false,
    })
}

fn expr_has_aggregate(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { name, .. } => builtins::is_aggregate(&name.value),
        ExprKind::Prefix { operand, .. } => expr_has_aggregate(operand),
        ExprKind::Infix { left, right, .. } => {
            expr_has_aggregate(left) || expr_has_aggregate(right)
        }
        ExprKind::Grouped(inner) | ExprKind::Collate { operand: inner, .. } => {
            expr_has_aggregate(inner)
        }
        ExprKind::Between {
            operand, low, high, ..
        } => expr_has_aggregate(operand) || expr_has_aggregate(low) || expr_has_aggregate(high),
        ExprKind::Case {
            operand,
            branches,
            otherwise,
        } => {
            operand.as_deref().is_some_and(expr_has_aggregate)
                || branches
                    .iter()
                    .any(|b| expr_has_aggregate(&b.when) || expr_has_aggregate(&b.then))
                || otherwise.as_deref().is_some_and(expr_has_aggregate)
        }
        ExprKind::Cast { operand, .. } => expr_has_aggregate(operand),
        _ => false,
    }
}

/// Whether the WHERE clause's conjunction of equalities covers the
/// table's entire primary key, making the result at most one row.
fn where_pins_primary_key(where_clause: Option<&Expr>, table: &Table) -> bool {
    if table.primary_key.is_empty() {
        return false;
    }
    let Some(where_clause) = where_clause else {
        return false;
    };
    let mut pinned = HashSet::new();
    collect_equality_columns(where_clause, &mut pinned);
    table
        .primary_key
        .iter()
        .all(|pk| pinned.contains(pk.as_str()))
}

fn collect_equality_columns(expr: &Expr, pinned: &mut HashSet<String>) {
    match &strip_grouped(expr).kind {
        ExprKind::Infix {
            left,
            op: InfixOp::And,
            right,
        } => {
            collect_equality_columns(left, pinned);
            collect_equality_columns(right, pinned);
        }
        ExprKind::Infix {
            left,
            op: InfixOp::Eq,
            right,
        } => {
            if let Some(name) = column_name_of(left) {
                pinned.insert(name.to_lowercase());
            } else if let Some(name) = column_name_of(right) {
                pinned.insert(name.to_lowercase());
            }
        }
        _ => {}
    }
}
