//! Per-statement lexical environment.
//!
//! Each SELECT body, subquery, and RETURNING clause gets its own scope
//! level; the top of the stack is the current scope. Scopes hold the
//! tables introduced by FROM/JOIN (for qualified lookups and star
//! expansion) and a flat identifier map (for unqualified lookups, with
//! ambiguity tracking).

use indexmap::IndexMap;

use crate::schema::Table;
use crate::types::Type;

/// A visible identifier's type plus its access rules.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeContainer {
    pub ty: Type,
    /// Set when two tables in scope both introduce the name; an
    /// unqualified read then diagnoses instead of resolving.
    pub ambiguous: bool,
    /// Visible to explicit references but skipped by `SELECT *`
    /// expansion (FTS pseudo-columns such as `rank`).
    pub explicit_only: bool,
}

impl TypeContainer {
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            ambiguous: false,
            explicit_only: false,
        }
    }

    pub fn explicit_only(ty: Type) -> Self {
        Self {
            ty,
            ambiguous: false,
            explicit_only: true,
        }
    }
}

/// A table (or table-like) brought into scope by FROM/JOIN.
#[derive(Debug, Clone)]
pub struct TableBinding {
    /// The label this binding answers to: the alias when present,
    /// else the unqualified table name. Lowercased.
    pub label: String,
    pub table: Table,
    /// Pseudo-columns reachable only by explicit reference.
    pub extra: Vec<(String, TypeContainer)>,
}

impl TableBinding {
    pub fn new(label: impl Into<String>, table: Table) -> Self {
        Self {
            label: label.into().to_lowercase(),
            table,
            extra: Vec::new(),
        }
    }

    fn column_type(&self, name: &str) -> Option<&TypeContainer> {
        self.extra
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, c)| c)
    }
}

#[derive(Debug, Clone, Default)]
struct Scope {
    tables: Vec<TableBinding>,
    columns: IndexMap<String, TypeContainer>,
}

/// Result of an unqualified identifier lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Type),
    Ambiguous,
    Missing,
}

/// Result of a `table.column` lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum QualifiedLookup {
    Found(Type),
    NoTable,
    NoColumn,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn current_mut(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        self.scopes.last_mut().expect("scope pushed above")
    }

    /// Introduces a table binding: qualified lookups and star expansion
    /// see the binding; every column also lands in the unqualified map,
    /// marked ambiguous on collision.
    pub fn add_table(&mut self, binding: TableBinding) {
        let scope = self.current_mut();
        for column in binding.table.columns.values() {
            insert_unqualified(
                &mut scope.columns,
                column.name.to_lowercase(),
                TypeContainer::new(column.ty.clone()),
            );
        }
        for (name, container) in &binding.extra {
            insert_unqualified(&mut scope.columns, name.to_lowercase(), container.clone());
        }
        scope.tables.push(binding);
    }

    /// Introduces a standalone identifier (e.g. RETURNING columns).
    pub fn add_column(&mut self, name: &str, container: TypeContainer) {
        let scope = self.current_mut();
        insert_unqualified(&mut scope.columns, name.to_lowercase(), container);
    }

    pub fn lookup(&self, name: &str) -> Lookup {
        let key = name.to_lowercase();
        for scope in self.scopes.iter().rev() {
            if let Some(container) = scope.columns.get(&key) {
                if container.ambiguous {
                    return Lookup::Ambiguous;
                }
                return Lookup::Found(container.ty.clone());
            }
        }
        Lookup::Missing
    }

    pub fn lookup_qualified(&self, table: &str, column: &str) -> QualifiedLookup {
        let label = table.to_lowercase();
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.tables.iter().find(|b| b.label == label) {
                if let Some(col) = binding.table.column(column) {
                    return QualifiedLookup::Found(col.ty.clone());
                }
                if let Some(container) = binding.column_type(column) {
                    return QualifiedLookup::Found(container.ty.clone());
                }
                // Placeholder tables absorb any column quietly.
                if binding.table.error {
                    return QualifiedLookup::Found(Type::Error);
                }
                return QualifiedLookup::NoColumn;
            }
        }
        QualifiedLookup::NoTable
    }

    /// The columns `SELECT *` expands to: every table of the current
    /// scope in FROM order, each table's columns in definition order,
    /// skipping explicit-access-only entries.
    pub fn visible_columns(&self) -> Vec<(String, Type)> {
        let Some(scope) = self.scopes.last() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for binding in &scope.tables {
            for column in binding.table.columns.values() {
                out.push((column.name.clone(), column.ty.clone()));
            }
        }
        out
    }

    /// The columns `t.*` expands to.
    pub fn table_columns(&self, table: &str) -> Option<Vec<(String, Type)>> {
        let label = table.to_lowercase();
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.tables.iter().find(|b| b.label == label) {
                return Some(
                    binding
                        .table
                        .columns
                        .values()
                        .map(|c| (c.name.clone(), c.ty.clone()))
                        .collect(),
                );
            }
        }
        None
    }

    /// Tables of the current scope, in FROM order.
    pub fn current_tables(&self) -> &[TableBinding] {
        self.scopes.last().map(|s| s.tables.as_slice()).unwrap_or(&[])
    }
}

fn insert_unqualified(
    columns: &mut IndexMap<String, TypeContainer>,
    key: String,
    container: TypeContainer,
) {
    match columns.get_mut(&key) {
        Some(existing) => existing.ambiguous = true,
        None => {
            columns.insert(key, container);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, QualifiedName, Table, TableKind};

    fn table(name: &str, columns: &[(&str, Type)]) -> Table {
        let mut t = Table::new(QualifiedName::bare(name), TableKind::Normal);
        for (col, ty) in columns {
            t.push_column(Column::new(*col, ty.clone())).unwrap();
        }
        t
    }

    #[test]
    fn duplicate_names_become_ambiguous() {
        let mut env = Environment::new();
        env.push_scope();
        env.add_table(TableBinding::new("a", table("a", &[("id", Type::integer())])));
        env.add_table(TableBinding::new("b", table("b", &[("id", Type::integer())])));
        assert_eq!(env.lookup("id"), Lookup::Ambiguous);
        assert!(matches!(
            env.lookup_qualified("a", "id"),
            QualifiedLookup::Found(_)
        ));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut env = Environment::new();
        env.push_scope();
        env.add_table(TableBinding::new("t", table("t", &[("x", Type::text())])));
        env.push_scope();
        env.add_table(TableBinding::new("t", table("t", &[("x", Type::integer())])));
        assert_eq!(env.lookup("x"), Lookup::Found(Type::integer()));
        env.pop_scope();
        assert_eq!(env.lookup("x"), Lookup::Found(Type::text()));
    }

    #[test]
    fn explicit_only_entries_skip_star_expansion() {
        let mut env = Environment::new();
        env.push_scope();
        let mut binding = TableBinding::new("docs", table("docs", &[("body", Type::text())]));
        binding
            .extra
            .push(("rank".to_string(), TypeContainer::explicit_only(Type::real())));
        env.add_table(binding);
        assert_eq!(env.visible_columns(), vec![("body".to_string(), Type::text())]);
        assert_eq!(env.lookup("rank"), Lookup::Found(Type::real()));
        assert!(matches!(
            env.lookup_qualified("docs", "rank"),
            QualifiedLookup::Found(_)
        ));
    }
}
