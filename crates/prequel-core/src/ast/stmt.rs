//! Statement and clause nodes.

use crate::span::Span;

use super::{Direction, Expr, Ident, Literal, NodeId, ObjectName, OrderingTerm, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    /// The statement's full range, excluding the `;` terminator.
    pub span: Span,
    /// The range of the statement's leading token, where context
    /// validation anchors its diagnostics.
    pub head_span: Span,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    CreateIndex(CreateIndex),
    CreateView(CreateView),
    CreateTrigger(CreateTrigger),
    CreateVirtualTable(CreateVirtualTable),
    Drop(DropObject),
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Pragma(Pragma),
    /// `DEFINE QUERY name [INPUT Id] [OUTPUT Id] AS <stmt>`
    Define(Define),
    Begin {
        mode: Option<TransactionMode>,
    },
    Commit,
    Rollback {
        savepoint: Option<Ident>,
    },
    Savepoint(Ident),
    Release(Ident),
    Reindex {
        target: Option<ObjectName>,
    },
    Vacuum {
        schema: Option<Ident>,
    },
    /// A bare `;`.
    Empty,
    /// Placeholder produced by parser error recovery so downstream
    /// passes can still run.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    Deferred,
    Immediate,
    Exclusive,
}

// ---------------------------------------------------------------------------
// DDL

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: ObjectName,
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub without_rowid: bool,
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: Ident,
    pub ty: Option<TypeName>,
    pub constraints: Vec<ColumnConstraint>,
    pub span: Span,
}

impl ColumnDef {
    pub fn has_constraint(&self, pred: impl Fn(&ColumnConstraintKind) -> bool) -> bool {
        self.constraints.iter().any(|c| pred(&c.kind))
    }

    pub fn is_primary_key(&self) -> bool {
        self.has_constraint(|k| matches!(k, ColumnConstraintKind::PrimaryKey { .. }))
    }

    pub fn is_not_null(&self) -> bool {
        self.has_constraint(|k| matches!(k, ColumnConstraintKind::NotNull))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    pub name: Option<Ident>,
    pub kind: ColumnConstraintKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    PrimaryKey {
        direction: Option<Direction>,
        autoincrement: bool,
    },
    NotNull,
    Unique,
    Check(Expr),
    Default(Expr),
    Collate(Ident),
    References(ForeignKeyClause),
    Generated {
        expr: Expr,
        stored: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyClause {
    pub table: Ident,
    pub columns: Vec<Ident>,
    pub actions: Vec<ForeignKeyAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForeignKeyAction {
    OnDelete(ReferentialAction),
    OnUpdate(ReferentialAction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    SetNull,
    SetDefault,
    Cascade,
    Restrict,
    NoAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<Ident>,
    pub kind: TableConstraintKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey(Vec<Ident>),
    Unique(Vec<Ident>),
    Check(Expr),
    ForeignKey {
        columns: Vec<Ident>,
        clause: ForeignKeyClause,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: ObjectName,
    pub action: AlterTableAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableAction {
    RenameTo(Ident),
    RenameColumn { old: Ident, new: Ident },
    AddColumn(ColumnDef),
    DropColumn(Ident),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndex {
    pub unique: bool,
    pub if_not_exists: bool,
    pub name: ObjectName,
    pub table: Ident,
    pub columns: Vec<IndexedColumn>,
    pub where_clause: Option<Expr>,
}

/// An indexed column: SQLite allows arbitrary expressions here.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedColumn {
    pub expr: Expr,
    pub collation: Option<Ident>,
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateView {
    pub if_not_exists: bool,
    pub name: ObjectName,
    pub columns: Vec<Ident>,
    pub query: Select,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTrigger {
    pub if_not_exists: bool,
    pub name: ObjectName,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    pub table: ObjectName,
    pub for_each_row: bool,
    pub when: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    Delete,
    Insert,
    Update(Option<Vec<Ident>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateVirtualTable {
    pub if_not_exists: bool,
    pub name: ObjectName,
    pub module: Ident,
    pub args: Vec<VirtualTableArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VirtualTableArg {
    /// An FTS5 column definition with the extension annotations
    /// (type name, `NOT NULL`, `UNINDEXED`) that must be stripped
    /// before the DDL reaches SQLite.
    Fts5Column(Fts5Column),
    /// Any other module argument, kept as raw text.
    Raw { text: String, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fts5Column {
    pub name: Ident,
    pub ty: Option<TypeName>,
    pub not_null: bool,
    pub unindexed: bool,
    /// Ranges of the non-SQL annotations, for removal.
    pub annotation_spans: Vec<Span>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropObject {
    pub kind: ObjectKind,
    pub name: ObjectName,
    pub if_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
    View,
    Trigger,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
            ObjectKind::View => "view",
            ObjectKind::Trigger => "trigger",
        }
    }
}

// ---------------------------------------------------------------------------
// Queries

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub id: NodeId,
    pub span: Span,
    pub with: Option<With>,
    pub body: SelectBody,
    pub order_by: Vec<OrderingTerm>,
    pub limit: Option<Limit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: Ident,
    pub columns: Vec<Ident>,
    pub materialized: Option<bool>,
    pub query: Select,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectBody {
    pub first: SelectCore,
    pub compounds: Vec<(CompoundOp, SelectCore)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectCore {
    Select(SelectClause),
    Values { rows: Vec<Vec<Expr>>, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub span: Span,
    pub distinct: bool,
    pub columns: Vec<ResultColumn>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumn {
    /// `*`
    Star(Span),
    /// `table.*`
    TableStar(Ident, Span),
    Expr {
        expr: Expr,
        alias: Option<Ident>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub first: TableOrSubquery,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOrSubquery {
    Table {
        name: ObjectName,
        alias: Option<Ident>,
    },
    Subquery {
        query: Box<Select>,
        alias: Option<Ident>,
    },
}

impl TableOrSubquery {
    pub fn alias(&self) -> Option<&Ident> {
        match self {
            TableOrSubquery::Table { alias, .. } | TableOrSubquery::Subquery { alias, .. } => {
                alias.as_ref()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub op: JoinOp,
    pub natural: bool,
    pub table: TableOrSubquery,
    pub constraint: Option<JoinConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOp {
    /// `FROM a, b`
    Comma,
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<Ident>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub limit: Expr,
    pub offset: Option<Expr>,
}

// ---------------------------------------------------------------------------
// DML

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub or_action: Option<ConflictAction>,
    /// `REPLACE INTO` sugar for `INSERT OR REPLACE INTO`.
    pub replace: bool,
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub columns: Vec<Ident>,
    pub source: InsertSource,
    pub upserts: Vec<Upsert>,
    pub returning: Option<Vec<ResultColumn>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<Select>),
    DefaultValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Abort,
    Fail,
    Ignore,
    Replace,
    Rollback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    /// `ON CONFLICT (cols) [WHERE …]`; `None` is the catch-all form.
    pub target: Option<UpsertTarget>,
    pub action: UpsertAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertTarget {
    pub columns: Vec<IndexedColumn>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertAction {
    Nothing,
    Update {
        sets: Vec<SetAssignment>,
        where_clause: Option<Expr>,
    },
}

/// `col = expr` or `(col1, col2) = expr` in a SET list.
#[derive(Debug, Clone, PartialEq)]
pub struct SetAssignment {
    pub columns: Vec<Ident>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub or_action: Option<ConflictAction>,
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub sets: Vec<SetAssignment>,
    pub from: Option<FromClause>,
    pub where_clause: Option<Expr>,
    pub returning: Option<Vec<ResultColumn>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: ObjectName,
    pub alias: Option<Ident>,
    pub where_clause: Option<Expr>,
    pub returning: Option<Vec<ResultColumn>>,
}

// ---------------------------------------------------------------------------
// Directives and extensions

#[derive(Debug, Clone, PartialEq)]
pub struct Pragma {
    pub schema: Option<Ident>,
    pub name: Ident,
    pub arg: Option<PragmaArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PragmaArg {
    /// `PRAGMA name = operand`
    Assign(PragmaOperand),
    /// `PRAGMA name(operand [AS alias])`
    Call {
        operand: PragmaOperand,
        alias: Option<Ident>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PragmaOperand {
    Name(Ident),
    Literal(Literal),
}

impl PragmaOperand {
    /// The operand's text when it is name-like.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PragmaOperand::Name(ident) => Some(&ident.value),
            PragmaOperand::Literal(Literal::String(s)) => Some(s),
            PragmaOperand::Literal(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub name: Ident,
    pub input: Option<Ident>,
    pub output: Option<Ident>,
    pub stmt: Box<Stmt>,
    /// Range of `DEFINE QUERY … AS ` including trailing whitespace,
    /// removed by the rewriter.
    pub header_span: Span,
}
