//! Statement context validation.
//!
//! A pure classifier over statement kinds: schema-changing DDL belongs
//! in migrations, SELECT and DEFINE QUERY in queries, DML and PRAGMA
//! in both, and transaction control in neither (the generated runtime
//! owns its transactions).

use crate::ast::{Stmt, StmtKind};
use crate::diagnostics::Diagnostic;

/// The file kind a statement is being compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileContext {
    Migration,
    Query,
}

/// Where a statement kind is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementContexts {
    pub migration: bool,
    pub query: bool,
}

pub fn allowed_contexts(kind: &StmtKind) -> StatementContexts {
    let both = StatementContexts {
        migration: true,
        query: true,
    };
    let migration_only = StatementContexts {
        migration: true,
        query: false,
    };
    let query_only = StatementContexts {
        migration: false,
        query: true,
    };
    let neither = StatementContexts {
        migration: false,
        query: false,
    };
    match kind {
        StmtKind::CreateTable(_)
        | StmtKind::AlterTable(_)
        | StmtKind::CreateIndex(_)
        | StmtKind::CreateView(_)
        | StmtKind::CreateTrigger(_)
        | StmtKind::CreateVirtualTable(_)
        | StmtKind::Drop(_)
        | StmtKind::Reindex { .. } => migration_only,
        StmtKind::Select(_) | StmtKind::Define(_) => query_only,
        StmtKind::Insert(_)
        | StmtKind::Update(_)
        | StmtKind::Delete(_)
        | StmtKind::Pragma(_)
        | StmtKind::Empty
        | StmtKind::Error => both,
        StmtKind::Begin { .. }
        | StmtKind::Commit
        | StmtKind::Rollback { .. }
        | StmtKind::Savepoint(_)
        | StmtKind::Release(_)
        | StmtKind::Vacuum { .. } => neither,
    }
}

/// Checks a statement against its compilation context. The diagnostic
/// anchors at the statement's leading token.
pub fn check(stmt: &Stmt, context: CompileContext) -> Option<Diagnostic> {
    let allowed = allowed_contexts(&stmt.kind);
    let legal = match context {
        CompileContext::Migration => allowed.migration,
        CompileContext::Query => allowed.query,
    };
    if legal {
        None
    } else {
        let where_ = match context {
            CompileContext::Migration => "migrations",
            CompileContext::Query => "queries",
        };
        Some(Diagnostic::error(
            format!("Statement is not allowed in {where_}"),
            stmt.head_span,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;

    fn first_stmt(sql: &str) -> Stmt {
        let (stmts, diags) = parser::parse(sql);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        stmts.into_iter().next().unwrap()
    }

    #[test]
    fn ddl_is_migration_only() {
        let stmt = first_stmt("CREATE TABLE t(x INT);");
        assert!(check(&stmt, CompileContext::Migration).is_none());
        let diag = check(&stmt, CompileContext::Query).unwrap();
        assert_eq!(diag.message, "Statement is not allowed in queries");
        assert_eq!(diag.span.start, 0);
    }

    #[test]
    fn select_is_query_only() {
        let stmt = first_stmt("SELECT 1;");
        assert!(check(&stmt, CompileContext::Query).is_none());
        assert!(check(&stmt, CompileContext::Migration).is_some());
    }

    #[test]
    fn dml_and_pragma_are_legal_everywhere() {
        for sql in [
            "INSERT INTO t(x) VALUES (1);",
            "UPDATE t SET x = 1;",
            "DELETE FROM t;",
            "PRAGMA user_version = 3;",
        ] {
            let stmt = first_stmt(sql);
            assert!(check(&stmt, CompileContext::Migration).is_none(), "{sql}");
            assert!(check(&stmt, CompileContext::Query).is_none(), "{sql}");
        }
    }

    #[test]
    fn transaction_control_is_legal_nowhere() {
        for sql in ["BEGIN;", "COMMIT;", "ROLLBACK;", "SAVEPOINT s;", "VACUUM;"] {
            let stmt = first_stmt(sql);
            assert!(check(&stmt, CompileContext::Migration).is_some(), "{sql}");
            assert!(check(&stmt, CompileContext::Query).is_some(), "{sql}");
        }
    }
}
