//! Recursive-descent SQL parser.
//!
//! Statements are parsed top-down; expressions go through a Pratt
//! parser over SQLite's precedence table. The parser pulls tokens from
//! the lexer with a lookahead of exactly three (current, peek, peek2),
//! which is what multi-word operators like `IS NOT DISTINCT FROM`
//! require.
//!
//! Parse errors never abort the file: the offending statement is
//! recorded as a diagnostic, the parser resynchronizes at the next `;`,
//! and an error statement is produced so downstream passes still run.

mod expr;
mod stmt;

use crate::ast::{Ident, NodeId, ObjectName, Stmt, StmtKind};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Keyword, Token, TokenKind};

pub(crate) type ParseResult<T> = Result<T, Diagnostic>;

pub struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
    /// Up to three buffered tokens; index 0 is the current token.
    lookahead: Vec<Token>,
    /// Span of the most recently consumed token.
    last_span: Span,
    next_node_id: u32,
    diagnostics: Diagnostics,
}

/// Parses a whole source file into statements plus diagnostics.
pub fn parse(src: &str) -> (Vec<Stmt>, Diagnostics) {
    Parser::new(src).parse_statements()
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            lexer: Lexer::new(src),
            lookahead: Vec::with_capacity(3),
            last_span: Span::empty(0),
            next_node_id: 0,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn parse_statements(mut self) -> (Vec<Stmt>, Diagnostics) {
        let mut statements = Vec::new();
        loop {
            if self.current().is_eof() {
                break;
            }
            if self.at(&TokenKind::Semicolon) {
                let span = self.current().span;
                self.advance();
                statements.push(Stmt {
                    id: self.node_id(),
                    span: Span::empty(span.start),
                    head_span: span,
                    kind: StmtKind::Empty,
                });
                continue;
            }
            let start = self.current().span;
            match self.parse_statement() {
                Ok(stmt) => {
                    self.eat(&TokenKind::Semicolon);
                    statements.push(stmt);
                }
                Err(diagnostic) => {
                    self.diagnostics.push(diagnostic);
                    self.recover_to_terminator();
                    statements.push(Stmt {
                        id: self.node_id(),
                        span: start.to(self.last_span),
                        head_span: start,
                        kind: StmtKind::Error,
                    });
                }
            }
        }
        (statements, self.diagnostics)
    }

    /// Skips to just past the next statement terminator.
    fn recover_to_terminator(&mut self) {
        loop {
            if self.current().is_eof() {
                return;
            }
            let token = self.advance();
            if token.kind == TokenKind::Semicolon {
                return;
            }
        }
    }

    // -- token plumbing ----------------------------------------------------

    fn fill(&mut self, n: usize) {
        debug_assert!(n <= 3, "lookahead is capped at three tokens");
        while self.lookahead.len() <= n {
            let token = self.lexer.next_token();
            self.lookahead.push(token);
        }
    }

    pub(crate) fn current(&mut self) -> &Token {
        self.fill(0);
        &self.lookahead[0]
    }

    pub(crate) fn peek(&mut self) -> &Token {
        self.fill(1);
        &self.lookahead[1]
    }

    pub(crate) fn peek2(&mut self) -> &Token {
        self.fill(2);
        &self.lookahead[2]
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.fill(0);
        let token = self.lookahead.remove(0);
        if !token.is_eof() {
            self.last_span = token.span;
        }
        token
    }

    pub(crate) fn last_span(&self) -> Span {
        self.last_span
    }

    pub(crate) fn at(&mut self, kind: &TokenKind) -> bool {
        self.current().is(kind)
    }

    pub(crate) fn at_keyword(&mut self, keyword: Keyword) -> bool {
        self.current().is_keyword(keyword)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consumes a two-keyword sequence atomically.
    pub(crate) fn eat_keywords2(&mut self, first: Keyword, second: Keyword) -> bool {
        if self.at_keyword(first) && self.peek().is_keyword(second) {
            self.advance();
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Span> {
        if self.at(kind) {
            Ok(self.advance().span)
        } else {
            self.unexpected(&kind.to_string())
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> ParseResult<Span> {
        if self.at_keyword(keyword) {
            Ok(self.advance().span)
        } else {
            self.unexpected(keyword.as_str())
        }
    }

    /// Builds the "expected X, found Y" diagnostic at the current
    /// token. Lexer error tokens surface their own message instead.
    pub(crate) fn unexpected<T>(&mut self, expected: &str) -> ParseResult<T> {
        let token = self.current().clone();
        let message = match &token.kind {
            TokenKind::Error(message) => message.clone(),
            TokenKind::Eof => format!("Expected {expected}, found end of input"),
            other => format!("Expected {expected}, found `{other}`"),
        };
        Err(Diagnostic::error(message, token.span))
    }

    pub(crate) fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    /// Whether the current and previous tokens touch with no gap, used
    /// when gluing bind-parameter prefixes to their names.
    pub(crate) fn adjacent(&mut self) -> bool {
        let last_end = self.last_span.end;
        self.current().span.start == last_end
    }

    pub(crate) fn source(&self) -> &'a str {
        self.src
    }

    // -- identifiers -------------------------------------------------------

    /// An identifier: a bare or quoted symbol, or a soft keyword used
    /// in name position.
    pub(crate) fn parse_identifier(&mut self) -> ParseResult<Ident> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Symbol(value) => {
                self.advance();
                Ok(Ident::new(value, token.span))
            }
            TokenKind::QuotedSymbol(value) => {
                self.advance();
                Ok(Ident::quoted(value, token.span))
            }
            TokenKind::Keyword(keyword) if keyword.is_soft() => {
                self.advance();
                Ok(Ident::new(keyword.as_str().to_lowercase(), token.span))
            }
            _ => self.unexpected("an identifier"),
        }
    }

    /// `[schema .] name`
    pub(crate) fn parse_object_name(&mut self) -> ParseResult<ObjectName> {
        let first = self.parse_identifier()?;
        if self.eat(&TokenKind::Dot) {
            let name = self.parse_identifier()?;
            let span = first.span.to(name.span);
            Ok(ObjectName {
                schema: Some(first),
                name,
                span,
            })
        } else {
            Ok(ObjectName::bare(first))
        }
    }

    /// A parenthesized, comma-separated identifier list.
    pub(crate) fn parse_ident_list(&mut self) -> ParseResult<Vec<Ident>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut idents = vec![self.parse_identifier()?];
        while self.eat(&TokenKind::Comma) {
            idents.push(self.parse_identifier()?);
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(idents)
    }

    /// Parses a comma-separated list of one or more items.
    pub(crate) fn comma_separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = vec![item(self)?];
        while self.eat(&TokenKind::Comma) {
            items.push(item(self)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn parse_one(sql: &str) -> Stmt {
        let (stmts, diags) = parse(sql);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        assert_eq!(stmts.len(), 1, "expected one statement in {sql:?}");
        stmts.into_iter().next().unwrap()
    }

    fn parse_expr_of(sql: &str) -> Expr {
        match parse_one(sql).kind {
            StmtKind::Select(select) => match select.body.first {
                SelectCore::Select(clause) => match clause.columns.into_iter().next().unwrap() {
                    ResultColumn::Expr { expr, .. } => expr,
                    other => panic!("expected expression column, got {other:?}"),
                },
                other => panic!("expected select core, got {other:?}"),
            },
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn select_with_joins_and_clauses() {
        let stmt = parse_one(
            "SELECT u.id, count(*) AS total FROM users u \
             LEFT JOIN orders o ON o.user_id = u.id \
             WHERE u.name LIKE 'a%' GROUP BY u.id HAVING total > 1 \
             ORDER BY total DESC LIMIT 10 OFFSET 5;",
        );
        let StmtKind::Select(select) = stmt.kind else {
            panic!("expected select");
        };
        let SelectCore::Select(clause) = &select.body.first else {
            panic!("expected select core");
        };
        assert_eq!(clause.columns.len(), 2);
        let from = clause.from.as_ref().unwrap();
        assert_eq!(from.joins.len(), 1);
        assert_eq!(from.joins[0].op, JoinOp::Left);
        assert!(clause.where_clause.is_some());
        assert_eq!(clause.group_by.len(), 1);
        assert!(clause.having.is_some());
        assert_eq!(select.order_by.len(), 1);
        assert!(select.limit.as_ref().unwrap().offset.is_some());
    }

    #[test]
    fn between_binds_tighter_than_and() {
        let expr = parse_expr_of("SELECT a BETWEEN 1 AND 2 AND b;");
        let ExprKind::Infix { op, left, .. } = expr.kind else {
            panic!("expected top-level AND");
        };
        assert_eq!(op, InfixOp::And);
        assert!(matches!(left.kind, ExprKind::Between { .. }));
    }

    #[test]
    fn multi_word_operators() {
        assert!(matches!(
            parse_expr_of("SELECT a IS NOT NULL;").kind,
            ExprKind::IsNull { negated: true, .. }
        ));
        assert!(matches!(
            parse_expr_of("SELECT a NOT BETWEEN 1 AND 2;").kind,
            ExprKind::Between { negated: true, .. }
        ));
        assert!(matches!(
            parse_expr_of("SELECT a IS DISTINCT FROM b;").kind,
            ExprKind::Infix {
                op: InfixOp::IsDistinctFrom,
                ..
            }
        ));
        assert!(matches!(
            parse_expr_of("SELECT a NOT LIKE 'x' ESCAPE '!';").kind,
            ExprKind::TextMatch {
                negated: true,
                op: TextMatchOp::Like,
                escape: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn bind_parameter_prefixes_normalize() {
        assert!(matches!(
            parse_expr_of("SELECT ?;").kind,
            ExprKind::Bind(BindParameter::Positional)
        ));
        for (sql, expected) in [
            ("SELECT :name;", "name"),
            ("SELECT @name;", "name"),
            ("SELECT $ns::id(tag);", "ns_id_tag"),
        ] {
            let expr = parse_expr_of(sql);
            let ExprKind::Bind(BindParameter::Named(name)) = expr.kind else {
                panic!("expected named parameter in {sql:?}");
            };
            assert_eq!(name, expected, "{sql}");
        }
    }

    #[test]
    fn unqualified_call_versus_column() {
        assert!(matches!(
            parse_expr_of("SELECT length(name);").kind,
            ExprKind::Call { .. }
        ));
        assert!(matches!(
            parse_expr_of("SELECT users.name;").kind,
            ExprKind::Column {
                table: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn create_table_with_constraints() {
        let stmt = parse_one(
            "CREATE TABLE orders(\
               id INTEGER PRIMARY KEY AUTOINCREMENT, \
               user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE, \
               total REAL DEFAULT 0, \
               note TEXT AS Comment, \
               UNIQUE(user_id, total));",
        );
        let StmtKind::CreateTable(create) = stmt.kind else {
            panic!("expected create table");
        };
        assert_eq!(create.columns.len(), 4);
        assert!(create.columns[0].is_primary_key());
        assert!(create.columns[1].is_not_null());
        let note = &create.columns[3];
        let ty = note.ty.as_ref().unwrap();
        assert_eq!(ty.alias.as_ref().unwrap().value, "Comment");
        assert!(ty.alias_span.is_some());
        assert_eq!(create.constraints.len(), 1);
    }

    #[test]
    fn define_query_wraps_a_statement() {
        let sql = "DEFINE QUERY get INPUT GetParams OUTPUT User AS SELECT 1;";
        let stmt = parse_one(sql);
        let StmtKind::Define(define) = stmt.kind else {
            panic!("expected define");
        };
        assert_eq!(define.name.value, "get");
        assert_eq!(define.input.as_ref().unwrap().value, "GetParams");
        assert_eq!(define.output.as_ref().unwrap().value, "User");
        assert!(matches!(define.stmt.kind, StmtKind::Select(_)));
        assert_eq!(define.header_span.slice(sql), "DEFINE QUERY get INPUT GetParams OUTPUT User AS ");
    }

    #[test]
    fn parse_errors_recover_at_semicolon() {
        let (stmts, diags) = parse("SELECT 1 FROM FROM oops; SELECT 2;");
        assert_eq!(diags.len(), 1);
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0].kind, StmtKind::Error));
        assert!(matches!(stmts[1].kind, StmtKind::Select(_)));
    }

    #[test]
    fn node_ids_are_unique() {
        let (stmts, _) = parse("SELECT a + b, c FROM t; SELECT 1;");
        let mut seen = std::collections::HashSet::new();
        fn walk(expr: &Expr, seen: &mut std::collections::HashSet<NodeId>) {
            assert!(seen.insert(expr.id), "duplicate node id {:?}", expr.id);
            if let ExprKind::Infix { left, right, .. } = &expr.kind {
                walk(left, seen);
                walk(right, seen);
            }
        }
        for stmt in &stmts {
            assert!(seen.insert(stmt.id));
            if let StmtKind::Select(select) = &stmt.kind {
                if let SelectCore::Select(clause) = &select.body.first {
                    for column in &clause.columns {
                        if let ResultColumn::Expr { expr, .. } = column {
                            walk(expr, &mut seen);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn statement_spans_exclude_the_terminator() {
        let sql = "SELECT 1;\nSELECT 2;";
        let (stmts, _) = parse(sql);
        assert_eq!(stmts[0].span.slice(sql), "SELECT 1");
        assert_eq!(stmts[1].span.slice(sql), "SELECT 2");
    }
}
