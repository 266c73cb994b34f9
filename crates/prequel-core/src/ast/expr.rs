//! Expression nodes.

use crate::span::Span;

use super::{Direction, Ident, Literal, NodeId, ObjectName, TypeName};

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Bind(BindParameter),
    /// A column reference, optionally table- and schema-qualified.
    Column {
        schema: Option<Ident>,
        table: Option<Ident>,
        name: Ident,
    },
    Prefix {
        op: PrefixOp,
        operand: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        op: InfixOp,
        right: Box<Expr>,
    },
    /// `expr COLLATE name`
    Collate {
        operand: Box<Expr>,
        collation: Ident,
    },
    /// `expr [NOT] BETWEEN low AND high`
    Between {
        operand: Box<Expr>,
        negated: bool,
        low: Box<Expr>,
        high: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`, `expr ISNULL`, `expr NOTNULL`
    IsNull {
        operand: Box<Expr>,
        negated: bool,
    },
    /// `expr [NOT] LIKE|GLOB|MATCH|REGEXP pattern [ESCAPE e]`
    TextMatch {
        operand: Box<Expr>,
        op: TextMatchOp,
        negated: bool,
        pattern: Box<Expr>,
        escape: Option<Box<Expr>>,
    },
    /// `expr [NOT] IN (item, …)`
    InList {
        operand: Box<Expr>,
        negated: bool,
        items: Vec<Expr>,
    },
    /// `expr [NOT] IN (SELECT …)`
    InSubquery {
        operand: Box<Expr>,
        negated: bool,
        query: Box<super::Select>,
    },
    /// `expr [NOT] IN table`
    InTable {
        operand: Box<Expr>,
        negated: bool,
        table: ObjectName,
    },
    /// `expr [NOT] IN :param` — a list-valued bind parameter.
    InBind {
        operand: Box<Expr>,
        negated: bool,
        param: Box<Expr>,
    },
    Call {
        name: Ident,
        distinct: bool,
        args: CallArgs,
    },
    Cast {
        operand: Box<Expr>,
        ty: TypeName,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<CaseBranch>,
        otherwise: Option<Box<Expr>>,
    },
    /// A parenthesized expression.
    Grouped(Box<Expr>),
    /// A parenthesized scalar subquery.
    Subquery(Box<super::Select>),
    /// `[NOT] EXISTS (SELECT …)`
    Exists {
        negated: bool,
        query: Box<super::Select>,
    },
    /// `RAISE(IGNORE)` / `RAISE(ABORT, 'message')` inside trigger bodies.
    Raise {
        action: RaiseAction,
        message: Option<String>,
    },
    /// Placeholder produced by parser error recovery.
    Error,
}

/// A bind parameter after prefix normalization.
///
/// `?` stays positional; `:name` and `@name` become named; the
/// `$seg1::seg2(suffix)` form is flattened to its full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindParameter {
    Positional,
    Named(String),
}

impl BindParameter {
    pub fn name(&self) -> Option<&str> {
        match self {
            BindParameter::Positional => None,
            BindParameter::Named(name) => Some(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// `+`
    Plus,
    /// `-`
    Negate,
    /// `~`
    BitNot,
    /// `NOT`
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Concat,
    /// `->`
    JsonArrow,
    /// `->>`
    JsonExtract,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Eq,
    NotEq,
    Is,
    IsNot,
    IsDistinctFrom,
    IsNotDistinctFrom,
    And,
    Or,
}

impl InfixOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfixOp::Concat => "||",
            InfixOp::JsonArrow => "->",
            InfixOp::JsonExtract => "->>",
            InfixOp::Multiply => "*",
            InfixOp::Divide => "/",
            InfixOp::Modulo => "%",
            InfixOp::Add => "+",
            InfixOp::Subtract => "-",
            InfixOp::ShiftLeft => "<<",
            InfixOp::ShiftRight => ">>",
            InfixOp::BitAnd => "&",
            InfixOp::BitOr => "|",
            InfixOp::Less => "<",
            InfixOp::Greater => ">",
            InfixOp::LessEq => "<=",
            InfixOp::GreaterEq => ">=",
            InfixOp::Eq => "=",
            InfixOp::NotEq => "!=",
            InfixOp::Is => "IS",
            InfixOp::IsNot => "IS NOT",
            InfixOp::IsDistinctFrom => "IS DISTINCT FROM",
            InfixOp::IsNotDistinctFrom => "IS NOT DISTINCT FROM",
            InfixOp::And => "AND",
            InfixOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatchOp {
    Like,
    Glob,
    Match,
    Regexp,
}

impl TextMatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextMatchOp::Like => "LIKE",
            TextMatchOp::Glob => "GLOB",
            TextMatchOp::Match => "MATCH",
            TextMatchOp::Regexp => "REGEXP",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallArgs {
    /// `count(*)`
    Star,
    List(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBranch {
    pub when: Expr,
    pub then: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseAction {
    Ignore,
    Rollback,
    Abort,
    Fail,
}

/// A single `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingTerm {
    pub expr: Expr,
    pub direction: Option<Direction>,
    pub nulls: Option<super::NullsOrder>,
}
