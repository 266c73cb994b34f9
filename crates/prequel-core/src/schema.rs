//! The evolving database schema.
//!
//! A [`Schema`] is the single source of truth during compilation. It is
//! created empty and mutated strictly by migration statements in
//! file-sorted order; query compilation observes a frozen snapshot and
//! never writes back.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ast::ObjectName;
use crate::diagnostics::Diagnostic;
use crate::span::Span;
use crate::types::Type;

/// A table name, optionally qualified with a schema name.
///
/// Comparison and hashing are case-insensitive, matching SQLite
/// identifier semantics. Two tables may share an unqualified name only
/// when their schema qualifiers differ.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl From<&ObjectName> for QualifiedName {
    fn from(name: &ObjectName) -> Self {
        Self {
            schema: name.schema.as_ref().map(|s| s.value.clone()),
            name: name.name.value.clone(),
        }
    }
}

impl PartialEq for QualifiedName {
    fn eq(&self, other: &Self) -> bool {
        let schema_eq = match (&self.schema, &other.schema) {
            (None, None) => true,
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        };
        schema_eq && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for QualifiedName {}

impl Hash for QualifiedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(schema) = &self.schema {
            for b in schema.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
        }
        // Separator keeps `a.b` distinct from a bare `ab`.
        state.write_u8(0xff);
        for b in self.name.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.{}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Normal,
    View,
    Fts5,
    Cte,
    Subquery,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: QualifiedName,
    /// Ordered columns, keyed by lowercased name.
    #[schemars(with = "Vec<Column>")]
    #[serde(serialize_with = "serialize_columns")]
    pub columns: IndexMap<String, Column>,
    /// Lowercased names of the primary-key columns, in key order.
    pub primary_key: Vec<String>,
    pub kind: TableKind,
    /// Placeholder flag: the table stands in for one that failed to
    /// resolve, so later passes stay quiet about its columns.
    #[serde(skip)]
    pub error: bool,
}

fn serialize_columns<S>(columns: &IndexMap<String, Column>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(columns.values())
}

impl Table {
    pub fn new(name: QualifiedName, kind: TableKind) -> Self {
        Self {
            name,
            columns: IndexMap::new(),
            primary_key: Vec::new(),
            kind,
            error: false,
        }
    }

    /// The placeholder table recorded when resolution fails.
    pub fn error(name: QualifiedName) -> Self {
        let mut table = Self::new(name, TableKind::Normal);
        table.error = true;
        table
    }

    /// Appends a column; rejects duplicates by case-insensitive name.
    pub fn push_column(&mut self, column: Column) -> Result<(), String> {
        let key = column.name.to_lowercase();
        if self.columns.contains_key(&key) {
            return Err(format!(
                "duplicate column name `{}` in table `{}`",
                column.name, self.name
            ));
        }
        self.columns.insert(key, column);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(&name.to_lowercase())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(&name.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexInfo {
    pub name: String,
    pub table: QualifiedName,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub name: String,
    pub table: QualifiedName,
}

/// The ordered table map plus side maps for indices, triggers, and
/// views. Tables retain insertion order; migrations are
/// order-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[schemars(with = "Vec<Table>")]
    #[serde(serialize_with = "serialize_tables")]
    tables: IndexMap<QualifiedName, Table>,
    /// Index name (lowercased) → info.
    indices: IndexMap<String, IndexInfo>,
    /// Trigger name (lowercased) → info.
    triggers: IndexMap<String, TriggerInfo>,
    /// Names of tables in `tables` that are views.
    views: Vec<QualifiedName>,
}

fn serialize_tables<S>(tables: &IndexMap<QualifiedName, Table>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(tables.values())
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexInfo> {
        self.indices.values()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &TriggerInfo> {
        self.triggers.values()
    }

    pub fn views(&self) -> &[QualifiedName] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table(&self, name: &QualifiedName) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Resolves a table reference. An exact (qualifier-aware) match
    /// wins; a bare reference also finds a uniquely-named qualified
    /// table, matching how SQLite searches attached databases.
    pub fn resolve(&self, name: &QualifiedName) -> Option<&Table> {
        if let Some(table) = self.tables.get(name) {
            return Some(table);
        }
        if name.schema.is_none() {
            let mut matches = self
                .tables
                .values()
                .filter(|t| t.name.name.eq_ignore_ascii_case(&name.name));
            let first = matches.next()?;
            if matches.next().is_none() {
                return Some(first);
            }
        }
        None
    }

    pub fn create_table(
        &mut self,
        table: Table,
        if_not_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.tables.contains_key(&table.name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(Diagnostic::error(
                format!("Table `{}` already exists", table.name),
                span,
            ));
        }
        if table.kind == TableKind::View {
            self.views.push(table.name.clone());
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    pub fn rename_table(
        &mut self,
        old: &QualifiedName,
        new: QualifiedName,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.tables.contains_key(&new) {
            return Err(Diagnostic::error(
                format!("Table `{new}` already exists"),
                span,
            ));
        }
        let Some(mut table) = self.tables.shift_remove(old) else {
            return Err(Diagnostic::error(
                format!("Table `{old}` does not exist"),
                span,
            ));
        };
        table.name = new.clone();
        self.tables.insert(new, table);
        Ok(())
    }

    pub fn rename_column(
        &mut self,
        table: &QualifiedName,
        old: &str,
        new: &str,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let Some(entry) = self.tables.get_mut(table) else {
            return Err(Diagnostic::error(
                format!("Table `{table}` does not exist"),
                span,
            ));
        };
        if !entry.has_column(old) {
            return Err(Diagnostic::error(
                format!("Column `{old}` does not exist in table `{table}`"),
                span,
            ));
        }
        let old_key = old.to_lowercase();
        let new_key = new.to_lowercase();
        if old_key != new_key && entry.columns.contains_key(&new_key) {
            return Err(Diagnostic::error(
                format!("Column `{new}` already exists in table `{table}`"),
                span,
            ));
        }
        // Rebuild the map so column order survives the rename.
        let columns = std::mem::take(&mut entry.columns);
        entry.columns = columns
            .into_iter()
            .map(|(key, mut column)| {
                if key == old_key {
                    column.name = new.to_string();
                    (new_key.clone(), column)
                } else {
                    (key, column)
                }
            })
            .collect();
        for pk in &mut entry.primary_key {
            if *pk == old_key {
                *pk = new_key.clone();
            }
        }
        Ok(())
    }

    pub fn add_column(
        &mut self,
        table: &QualifiedName,
        column: Column,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let Some(entry) = self.tables.get_mut(table) else {
            return Err(Diagnostic::error(
                format!("Table `{table}` does not exist"),
                span,
            ));
        };
        entry
            .push_column(column)
            .map_err(|message| Diagnostic::error(message, span))
    }

    pub fn drop_column(
        &mut self,
        table: &QualifiedName,
        column: &str,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let Some(entry) = self.tables.get_mut(table) else {
            return Err(Diagnostic::error(
                format!("Table `{table}` does not exist"),
                span,
            ));
        };
        let key = column.to_lowercase();
        if entry.columns.shift_remove(&key).is_none() {
            return Err(Diagnostic::error(
                format!("Column `{column}` does not exist in table `{table}`"),
                span,
            ));
        }
        entry.primary_key.retain(|pk| *pk != key);
        Ok(())
    }

    pub fn drop_table(
        &mut self,
        name: &QualifiedName,
        if_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.tables.shift_remove(name).is_none() && !if_exists {
            return Err(Diagnostic::error(
                format!("Table `{name}` does not exist"),
                span,
            ));
        }
        self.views.retain(|v| v != name);
        Ok(())
    }

    pub fn create_index(
        &mut self,
        index: IndexInfo,
        if_not_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let key = index.name.to_lowercase();
        if self.indices.contains_key(&key) {
            if if_not_exists {
                return Ok(());
            }
            return Err(Diagnostic::error(
                format!("Index `{}` already exists", index.name),
                span,
            ));
        }
        self.indices.insert(key, index);
        Ok(())
    }

    pub fn drop_index(
        &mut self,
        name: &str,
        if_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.indices.shift_remove(&name.to_lowercase()).is_none() && !if_exists {
            return Err(Diagnostic::error(
                format!("Index `{name}` does not exist"),
                span,
            ));
        }
        Ok(())
    }

    pub fn create_trigger(
        &mut self,
        trigger: TriggerInfo,
        if_not_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        let key = trigger.name.to_lowercase();
        if self.triggers.contains_key(&key) {
            if if_not_exists {
                return Ok(());
            }
            return Err(Diagnostic::error(
                format!("Trigger `{}` already exists", trigger.name),
                span,
            ));
        }
        self.triggers.insert(key, trigger);
        Ok(())
    }

    pub fn drop_trigger(
        &mut self,
        name: &str,
        if_exists: bool,
        span: Span,
    ) -> Result<(), Diagnostic> {
        if self.triggers.shift_remove(&name.to_lowercase()).is_none() && !if_exists {
            return Err(Diagnostic::error(
                format!("Trigger `{name}` does not exist"),
                span,
            ));
        }
        Ok(())
    }

    pub fn drop_view(&mut self, name: &QualifiedName, if_exists: bool, span: Span) -> Result<(), Diagnostic> {
        let is_view = self.tables.get(name).map(|t| t.kind) == Some(TableKind::View);
        if !is_view {
            if if_exists {
                return Ok(());
            }
            return Err(Diagnostic::error(
                format!("View `{name}` does not exist"),
                span,
            ));
        }
        self.tables.shift_remove(name);
        self.views.retain(|v| v != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        let mut table = Table::new(QualifiedName::bare("users"), TableKind::Normal);
        table
            .push_column(Column::new("id", Type::integer()))
            .unwrap();
        table
            .push_column(Column::new("name", Type::optional(Type::text())))
            .unwrap();
        table.primary_key.push("id".to_string());
        table
    }

    #[test]
    fn names_compare_case_insensitively() {
        assert_eq!(QualifiedName::bare("Users"), QualifiedName::bare("USERS"));
        assert_ne!(
            QualifiedName::bare("users"),
            QualifiedName::qualified("aux", "users")
        );
    }

    #[test]
    fn duplicate_create_is_diagnosed() {
        let mut schema = Schema::new();
        schema
            .create_table(users(), false, Span::new(0, 1))
            .unwrap();
        let err = schema
            .create_table(users(), false, Span::new(2, 3))
            .unwrap_err();
        assert!(err.message.contains("already exists"));
        assert!(schema
            .create_table(users(), true, Span::new(2, 3))
            .is_ok());
    }

    #[test]
    fn rename_preserves_column_order() {
        let mut schema = Schema::new();
        schema
            .create_table(users(), false, Span::new(0, 1))
            .unwrap();
        schema
            .rename_column(&QualifiedName::bare("users"), "id", "user_id", Span::new(0, 1))
            .unwrap();
        let table = schema.table(&QualifiedName::bare("users")).unwrap();
        let names: Vec<_> = table.columns.values().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["user_id", "name"]);
        assert_eq!(table.primary_key, vec!["user_id".to_string()]);
    }

    #[test]
    fn drop_missing_column_is_diagnosed() {
        let mut schema = Schema::new();
        schema
            .create_table(users(), false, Span::new(0, 1))
            .unwrap();
        let err = schema
            .drop_column(&QualifiedName::bare("users"), "nope", Span::new(0, 1))
            .unwrap_err();
        assert!(err.message.contains("does not exist"));
    }

    #[test]
    fn bare_resolution_finds_unique_qualified_table() {
        let mut schema = Schema::new();
        let mut table = users();
        table.name = QualifiedName::qualified("aux", "users");
        schema.create_table(table, false, Span::new(0, 1)).unwrap();
        assert!(schema.resolve(&QualifiedName::bare("users")).is_some());
    }
}
