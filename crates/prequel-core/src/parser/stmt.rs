//! Statement-level grammar.

use crate::ast::*;
use crate::span::Span;
use crate::token::{Keyword, TokenKind};

use super::{ParseResult, Parser};

impl<'a> Parser<'a> {
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.current().span;
        if let TokenKind::Error(message) = &self.current().kind {
            let diagnostic = crate::diagnostics::Diagnostic::error(message.clone(), start);
            return Err(diagnostic);
        }
        let kind = match self.current().keyword() {
            Some(Keyword::Create) => self.parse_create()?,
            Some(Keyword::Alter) => self.parse_alter()?,
            Some(Keyword::Drop) => self.parse_drop()?,
            Some(Keyword::Select | Keyword::With | Keyword::Values) => {
                StmtKind::Select(self.parse_select()?)
            }
            Some(Keyword::Insert | Keyword::Replace) => StmtKind::Insert(self.parse_insert()?),
            Some(Keyword::Update) => StmtKind::Update(self.parse_update()?),
            Some(Keyword::Delete) => StmtKind::Delete(self.parse_delete()?),
            Some(Keyword::Pragma) => self.parse_pragma()?,
            Some(Keyword::Define) => self.parse_define(start)?,
            Some(Keyword::Begin) => self.parse_begin()?,
            Some(Keyword::Commit | Keyword::End) => {
                self.advance();
                self.eat_keyword(Keyword::Transaction);
                StmtKind::Commit
            }
            Some(Keyword::Rollback) => self.parse_rollback()?,
            Some(Keyword::Savepoint) => {
                self.advance();
                StmtKind::Savepoint(self.parse_identifier()?)
            }
            Some(Keyword::Release) => {
                self.advance();
                self.eat_keyword(Keyword::Savepoint);
                StmtKind::Release(self.parse_identifier()?)
            }
            Some(Keyword::Reindex) => {
                self.advance();
                let target = if self.at(&TokenKind::Semicolon) || self.current().is_eof() {
                    None
                } else {
                    Some(self.parse_object_name()?)
                };
                StmtKind::Reindex { target }
            }
            Some(Keyword::Vacuum) => {
                self.advance();
                let schema = if self.at(&TokenKind::Semicolon) || self.current().is_eof() {
                    None
                } else {
                    Some(self.parse_identifier()?)
                };
                StmtKind::Vacuum { schema }
            }
            _ => return self.unexpected("a statement"),
        };
        Ok(Stmt {
            id: self.node_id(),
            span: start.to(self.last_span()),
            head_span: start,
            kind,
        })
    }

    // -- CREATE ------------------------------------------------------------

    fn parse_create(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Create)?;
        // TEMP objects behave like their plain forms for analysis.
        self.eat_keyword(Keyword::Temp);
        self.eat_keyword(Keyword::Temporary);
        let unique = self.eat_keyword(Keyword::Unique);
        if unique {
            // UNIQUE only modifies CREATE INDEX.
            self.parse_create_index(true)
        } else {
            match self.current().keyword() {
                Some(Keyword::Table) => self.parse_create_table(),
                Some(Keyword::Index) => self.parse_create_index(false),
                Some(Keyword::View) => self.parse_create_view(),
                Some(Keyword::Trigger) => self.parse_create_trigger(),
                Some(Keyword::Virtual) => self.parse_create_virtual_table(),
                _ => self.unexpected("TABLE, INDEX, VIEW, TRIGGER, or VIRTUAL"),
            }
        }
    }

    fn parse_if_not_exists(&mut self) -> ParseResult<bool> {
        if self.eat_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_create_table(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Table)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        self.expect(&TokenKind::LeftParen)?;

        let mut columns = Vec::new();
        let mut constraints = Vec::new();
        loop {
            if self.is_table_constraint_start() {
                constraints.push(self.parse_table_constraint()?);
            } else {
                columns.push(self.parse_column_def()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;

        let mut without_rowid = false;
        let mut strict = false;
        loop {
            if self.eat_keyword(Keyword::Without) {
                self.expect_keyword(Keyword::Rowid)?;
                without_rowid = true;
            } else if self.eat_keyword(Keyword::Strict) {
                strict = true;
            } else {
                break;
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }

        Ok(StmtKind::CreateTable(CreateTable {
            name,
            if_not_exists,
            columns,
            constraints,
            without_rowid,
            strict,
        }))
    }

    fn is_table_constraint_start(&mut self) -> bool {
        matches!(
            self.current().keyword(),
            Some(
                Keyword::Constraint
                    | Keyword::Primary
                    | Keyword::Unique
                    | Keyword::Check
                    | Keyword::Foreign
            )
        )
    }

    pub(crate) fn parse_column_def(&mut self) -> ParseResult<ColumnDef> {
        let name = self.parse_identifier()?;
        let start = name.span;
        let ty = if matches!(self.current().kind, TokenKind::Symbol(_)) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let constraints = self.parse_column_constraints()?;
        Ok(ColumnDef {
            name,
            ty,
            constraints,
            span: start.to(self.last_span()),
        })
    }

    /// A declared type: one or more bare words, optional numeric
    /// arguments, and the optional `AS Alias` extension suffix.
    pub(crate) fn parse_type_name(&mut self) -> ParseResult<TypeName> {
        let start = self.current().span;
        let mut words = Vec::new();
        loop {
            let word = match &self.current().kind {
                TokenKind::Symbol(word) => word.clone(),
                _ => break,
            };
            words.push(word);
            self.advance();
        }
        if words.is_empty() {
            return self.unexpected("a type name");
        }
        let name_span = start.to(self.last_span());
        let name = Ident::new(words.join(" "), name_span);

        let mut args = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            if !self.at(&TokenKind::RightParen) {
                loop {
                    let arg_start = self.current().span;
                    while !self.at(&TokenKind::Comma)
                        && !self.at(&TokenKind::RightParen)
                        && !self.current().is_eof()
                    {
                        self.advance();
                    }
                    args.push(
                        Span::new(arg_start.start, self.last_span().end)
                            .slice(self.source())
                            .trim()
                            .to_string(),
                    );
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }

        let mut alias = None;
        let mut alias_span = None;
        let before_alias = self.last_span().end;
        if self.eat_keyword(Keyword::As) {
            let ident = self.parse_identifier()?;
            alias_span = Some(Span::new(before_alias, ident.span.end));
            alias = Some(ident);
        }

        Ok(TypeName {
            name,
            args,
            alias,
            alias_span,
            span: start.to(self.last_span()),
        })
    }

    fn parse_column_constraints(&mut self) -> ParseResult<Vec<ColumnConstraint>> {
        let mut constraints = Vec::new();
        loop {
            let start = self.current().span;
            let name = if self.eat_keyword(Keyword::Constraint) {
                Some(self.parse_identifier()?)
            } else {
                None
            };
            let kind = match self.current().keyword() {
                Some(Keyword::Primary) => {
                    self.advance();
                    self.expect_keyword(Keyword::Key)?;
                    let direction = self.parse_direction();
                    self.parse_conflict_clause()?;
                    let autoincrement = self.eat_keyword(Keyword::Autoincrement);
                    ColumnConstraintKind::PrimaryKey {
                        direction,
                        autoincrement,
                    }
                }
                Some(Keyword::Not) => {
                    self.advance();
                    self.expect_keyword(Keyword::Null)?;
                    self.parse_conflict_clause()?;
                    ColumnConstraintKind::NotNull
                }
                Some(Keyword::Unique) => {
                    self.advance();
                    self.parse_conflict_clause()?;
                    ColumnConstraintKind::Unique
                }
                Some(Keyword::Check) => {
                    self.advance();
                    self.expect(&TokenKind::LeftParen)?;
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::RightParen)?;
                    ColumnConstraintKind::Check(expr)
                }
                Some(Keyword::Default) => {
                    self.advance();
                    let expr = if self.eat(&TokenKind::LeftParen) {
                        let expr = self.parse_expr()?;
                        self.expect(&TokenKind::RightParen)?;
                        expr
                    } else {
                        // A literal or signed number.
                        self.parse_subexpr(super::expr::prec::COLLATE)?
                    };
                    ColumnConstraintKind::Default(expr)
                }
                Some(Keyword::Collate) => {
                    self.advance();
                    ColumnConstraintKind::Collate(self.parse_identifier()?)
                }
                Some(Keyword::References) => {
                    self.advance();
                    ColumnConstraintKind::References(self.parse_foreign_key_clause()?)
                }
                Some(Keyword::Generated) => {
                    self.advance();
                    self.expect_keyword(Keyword::Always)?;
                    self.expect_keyword(Keyword::As)?;
                    self.expect(&TokenKind::LeftParen)?;
                    let expr = self.parse_expr()?;
                    self.expect(&TokenKind::RightParen)?;
                    let stored = if self.eat_keyword(Keyword::Stored) {
                        true
                    } else {
                        self.eat_keyword(Keyword::Virtual);
                        false
                    };
                    ColumnConstraintKind::Generated { expr, stored }
                }
                _ => {
                    if name.is_some() {
                        return self.unexpected("a column constraint after CONSTRAINT name");
                    }
                    break;
                }
            };
            constraints.push(ColumnConstraint {
                name,
                kind,
                span: start.to(self.last_span()),
            });
        }
        Ok(constraints)
    }

    fn parse_direction(&mut self) -> Option<Direction> {
        if self.eat_keyword(Keyword::Asc) {
            Some(Direction::Asc)
        } else if self.eat_keyword(Keyword::Desc) {
            Some(Direction::Desc)
        } else {
            None
        }
    }

    /// `ON CONFLICT <action>`; the action has no bearing on typing, so
    /// it is checked and dropped.
    fn parse_conflict_clause(&mut self) -> ParseResult<()> {
        if self.eat_keyword(Keyword::On) {
            self.expect_keyword(Keyword::Conflict)?;
            if self.parse_conflict_action().is_none() {
                return self.unexpected("ROLLBACK, ABORT, FAIL, IGNORE, or REPLACE");
            }
        }
        Ok(())
    }

    fn parse_conflict_action(&mut self) -> Option<ConflictAction> {
        let action = match self.current().keyword()? {
            Keyword::Rollback => ConflictAction::Rollback,
            Keyword::Abort => ConflictAction::Abort,
            Keyword::Fail => ConflictAction::Fail,
            Keyword::Ignore => ConflictAction::Ignore,
            Keyword::Replace => ConflictAction::Replace,
            _ => return None,
        };
        self.advance();
        Some(action)
    }

    fn parse_foreign_key_clause(&mut self) -> ParseResult<ForeignKeyClause> {
        let table = self.parse_identifier()?;
        let columns = if self.at(&TokenKind::LeftParen) {
            self.parse_ident_list()?
        } else {
            Vec::new()
        };
        let mut actions = Vec::new();
        loop {
            if self.eat_keyword(Keyword::On) {
                let on_delete = if self.eat_keyword(Keyword::Delete) {
                    true
                } else {
                    self.expect_keyword(Keyword::Update)?;
                    false
                };
                let action = self.parse_referential_action()?;
                actions.push(if on_delete {
                    ForeignKeyAction::OnDelete(action)
                } else {
                    ForeignKeyAction::OnUpdate(action)
                });
            } else if self.eat_keyword(Keyword::Match) {
                self.parse_identifier()?;
            } else if self.eat_keyword(Keyword::Deferrable) {
                if self.eat_keyword(Keyword::Initially) {
                    if !self.eat_keyword(Keyword::Deferred) {
                        self.expect_keyword(Keyword::Immediate)?;
                    }
                }
            } else if self.eat_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Deferrable)?;
                if self.eat_keyword(Keyword::Initially) {
                    if !self.eat_keyword(Keyword::Deferred) {
                        self.expect_keyword(Keyword::Immediate)?;
                    }
                }
            } else {
                break;
            }
        }
        Ok(ForeignKeyClause {
            table,
            columns,
            actions,
        })
    }

    fn parse_referential_action(&mut self) -> ParseResult<ReferentialAction> {
        if self.eat_keyword(Keyword::Set) {
            if self.eat_keyword(Keyword::Null) {
                Ok(ReferentialAction::SetNull)
            } else {
                self.expect_keyword(Keyword::Default)?;
                Ok(ReferentialAction::SetDefault)
            }
        } else if self.eat_keyword(Keyword::Cascade) {
            Ok(ReferentialAction::Cascade)
        } else if self.eat_keyword(Keyword::Restrict) {
            Ok(ReferentialAction::Restrict)
        } else if self.eat_keyword(Keyword::No) {
            // NO ACTION; ACTION is not a keyword of its own.
            self.parse_identifier()?;
            Ok(ReferentialAction::NoAction)
        } else {
            self.unexpected("SET NULL, SET DEFAULT, CASCADE, RESTRICT, or NO ACTION")
        }
    }

    fn parse_table_constraint(&mut self) -> ParseResult<TableConstraint> {
        let start = self.current().span;
        let name = if self.eat_keyword(Keyword::Constraint) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let kind = match self.current().keyword() {
            Some(Keyword::Primary) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                let columns = self.parse_key_column_list()?;
                self.parse_conflict_clause()?;
                TableConstraintKind::PrimaryKey(columns)
            }
            Some(Keyword::Unique) => {
                self.advance();
                let columns = self.parse_key_column_list()?;
                self.parse_conflict_clause()?;
                TableConstraintKind::Unique(columns)
            }
            Some(Keyword::Check) => {
                self.advance();
                self.expect(&TokenKind::LeftParen)?;
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                TableConstraintKind::Check(expr)
            }
            Some(Keyword::Foreign) => {
                self.advance();
                self.expect_keyword(Keyword::Key)?;
                let columns = self.parse_ident_list()?;
                self.expect_keyword(Keyword::References)?;
                let clause = self.parse_foreign_key_clause()?;
                TableConstraintKind::ForeignKey { columns, clause }
            }
            _ => return self.unexpected("PRIMARY KEY, UNIQUE, CHECK, or FOREIGN KEY"),
        };
        Ok(TableConstraint {
            name,
            kind,
            span: start.to(self.last_span()),
        })
    }

    /// `(col [ASC|DESC], …)` — the per-column direction is legal but
    /// irrelevant to typing.
    fn parse_key_column_list(&mut self) -> ParseResult<Vec<Ident>> {
        self.expect(&TokenKind::LeftParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_identifier()?);
            self.parse_direction();
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        Ok(columns)
    }

    fn parse_create_index(&mut self, unique: bool) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Index)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_identifier()?;
        self.expect(&TokenKind::LeftParen)?;
        let columns = self.comma_separated(Self::parse_indexed_column)?;
        self.expect(&TokenKind::RightParen)?;
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(StmtKind::CreateIndex(CreateIndex {
            unique,
            if_not_exists,
            name,
            table,
            columns,
            where_clause,
        }))
    }

    fn parse_indexed_column(&mut self) -> ParseResult<IndexedColumn> {
        let expr = self.parse_expr()?;
        let direction = self.parse_direction();
        Ok(IndexedColumn {
            expr,
            collation: None,
            direction,
        })
    }

    fn parse_create_view(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::View)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        let columns = if self.at(&TokenKind::LeftParen) {
            self.parse_ident_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::As)?;
        let query = self.parse_select()?;
        Ok(StmtKind::CreateView(CreateView {
            if_not_exists,
            name,
            columns,
            query,
        }))
    }

    fn parse_create_trigger(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Trigger)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        let timing = if self.eat_keyword(Keyword::Before) {
            TriggerTiming::Before
        } else if self.eat_keyword(Keyword::After) {
            TriggerTiming::After
        } else if self.eat_keyword(Keyword::Instead) {
            self.expect_keyword(Keyword::Of)?;
            TriggerTiming::InsteadOf
        } else {
            TriggerTiming::Unspecified
        };
        let event = match self.current().keyword() {
            Some(Keyword::Delete) => {
                self.advance();
                TriggerEvent::Delete
            }
            Some(Keyword::Insert) => {
                self.advance();
                TriggerEvent::Insert
            }
            Some(Keyword::Update) => {
                self.advance();
                let columns = if self.eat_keyword(Keyword::Of) {
                    Some(self.comma_separated(Self::parse_identifier)?)
                } else {
                    None
                };
                TriggerEvent::Update(columns)
            }
            _ => return self.unexpected("DELETE, INSERT, or UPDATE"),
        };
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;
        let for_each_row = if self.eat_keyword(Keyword::For) {
            self.expect_keyword(Keyword::Each)?;
            self.expect_keyword(Keyword::Row)?;
            true
        } else {
            false
        };
        let when = if self.eat_keyword(Keyword::When) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_keyword(Keyword::Begin)?;
        let mut body = Vec::new();
        while !self.at_keyword(Keyword::End) {
            let stmt = self.parse_statement()?;
            self.expect(&TokenKind::Semicolon)?;
            body.push(stmt);
        }
        self.expect_keyword(Keyword::End)?;
        Ok(StmtKind::CreateTrigger(CreateTrigger {
            if_not_exists,
            name,
            timing,
            event,
            table,
            for_each_row,
            when,
            body,
        }))
    }

    fn parse_create_virtual_table(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Virtual)?;
        self.expect_keyword(Keyword::Table)?;
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        self.expect_keyword(Keyword::Using)?;
        let module = self.parse_identifier()?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::LeftParen) {
            let fts5 = module.eq_ignore_case("fts5");
            if !self.at(&TokenKind::RightParen) {
                loop {
                    let arg = if fts5 {
                        self.parse_fts5_arg()?
                    } else {
                        self.parse_raw_module_arg()?
                    };
                    args.push(arg);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RightParen)?;
        }
        Ok(StmtKind::CreateVirtualTable(CreateVirtualTable {
            if_not_exists,
            name,
            module,
            args,
        }))
    }

    /// An FTS5 module argument: either an option assignment
    /// (`tokenize = 'porter'`), kept raw, or a column definition with
    /// the non-SQL annotations the rewriter strips.
    fn parse_fts5_arg(&mut self) -> ParseResult<VirtualTableArg> {
        let start = self.current().span;
        let is_option = matches!(
            self.current().kind,
            TokenKind::Symbol(_) | TokenKind::QuotedSymbol(_)
        ) && self.peek().is(&TokenKind::Eq);
        if is_option {
            self.advance();
            self.advance();
            // The option value is a single literal or word.
            self.advance();
            let span = Span::new(start.start, self.last_span().end);
            return Ok(VirtualTableArg::Raw {
                text: span.slice(self.source()).to_string(),
                span,
            });
        }

        let column_name = self.parse_identifier()?;
        let mut annotation_spans = Vec::new();
        let mut ty = None;
        let mut not_null = false;
        let mut unindexed = false;
        loop {
            let remove_from = self.last_span().end;
            if matches!(self.current().kind, TokenKind::Symbol(_)) {
                let type_name = self.parse_type_name()?;
                annotation_spans.push(Span::new(remove_from, self.last_span().end));
                ty = Some(type_name);
            } else if self.at_keyword(Keyword::Not) && self.peek().is_keyword(Keyword::Null) {
                self.advance();
                self.advance();
                annotation_spans.push(Span::new(remove_from, self.last_span().end));
                not_null = true;
            } else if self.at_keyword(Keyword::Unindexed) {
                self.advance();
                annotation_spans.push(Span::new(remove_from, self.last_span().end));
                unindexed = true;
            } else {
                break;
            }
        }
        let span = start.to(self.last_span());
        Ok(VirtualTableArg::Fts5Column(Fts5Column {
            name: column_name,
            ty,
            not_null,
            unindexed,
            annotation_spans,
            span,
        }))
    }

    fn parse_raw_module_arg(&mut self) -> ParseResult<VirtualTableArg> {
        let start = self.current().span;
        let mut depth = 0usize;
        loop {
            let kind = self.current().kind.clone();
            match kind {
                TokenKind::Eof => break,
                TokenKind::Comma | TokenKind::RightParen if depth == 0 => break,
                TokenKind::LeftParen => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RightParen => {
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
        let span = Span::new(start.start, self.last_span().end);
        Ok(VirtualTableArg::Raw {
            text: span.slice(self.source()).to_string(),
            span,
        })
    }

    // -- ALTER / DROP ------------------------------------------------------

    fn parse_alter(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Alter)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.parse_object_name()?;
        let action = if self.eat_keyword(Keyword::Rename) {
            if self.eat_keyword(Keyword::To) {
                AlterTableAction::RenameTo(self.parse_identifier()?)
            } else {
                self.eat_keyword(Keyword::Column);
                let old = self.parse_identifier()?;
                self.expect_keyword(Keyword::To)?;
                let new = self.parse_identifier()?;
                AlterTableAction::RenameColumn { old, new }
            }
        } else if self.eat_keyword(Keyword::Add) {
            self.eat_keyword(Keyword::Column);
            AlterTableAction::AddColumn(self.parse_column_def()?)
        } else if self.eat_keyword(Keyword::Drop) {
            self.eat_keyword(Keyword::Column);
            AlterTableAction::DropColumn(self.parse_identifier()?)
        } else {
            return self.unexpected("RENAME, ADD, or DROP");
        };
        Ok(StmtKind::AlterTable(AlterTable { table, action }))
    }

    fn parse_drop(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Drop)?;
        let kind = match self.current().keyword() {
            Some(Keyword::Table) => ObjectKind::Table,
            Some(Keyword::Index) => ObjectKind::Index,
            Some(Keyword::View) => ObjectKind::View,
            Some(Keyword::Trigger) => ObjectKind::Trigger,
            _ => return self.unexpected("TABLE, INDEX, VIEW, or TRIGGER"),
        };
        self.advance();
        let if_exists = if self.eat_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };
        let name = self.parse_object_name()?;
        Ok(StmtKind::Drop(DropObject {
            kind,
            name,
            if_exists,
        }))
    }

    // -- SELECT ------------------------------------------------------------

    pub(crate) fn parse_select(&mut self) -> ParseResult<Select> {
        let start = self.current().span;
        let with = if self.at_keyword(Keyword::With) {
            Some(self.parse_with()?)
        } else {
            None
        };
        let first = self.parse_select_core()?;
        let mut compounds = Vec::new();
        loop {
            let op = if self.eat_keyword(Keyword::Union) {
                if self.eat_keyword(Keyword::All) {
                    CompoundOp::UnionAll
                } else {
                    CompoundOp::Union
                }
            } else if self.eat_keyword(Keyword::Intersect) {
                CompoundOp::Intersect
            } else if self.eat_keyword(Keyword::Except) {
                CompoundOp::Except
            } else {
                break;
            };
            compounds.push((op, self.parse_select_core()?));
        }
        let order_by = if self.eat_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.comma_separated(Self::parse_ordering_term)?
        } else {
            Vec::new()
        };
        let limit = if self.eat_keyword(Keyword::Limit) {
            let first_expr = self.parse_expr()?;
            if self.eat(&TokenKind::Comma) {
                // `LIMIT offset, limit`
                let limit_expr = self.parse_expr()?;
                Some(Limit {
                    limit: limit_expr,
                    offset: Some(first_expr),
                })
            } else if self.eat_keyword(Keyword::Offset) {
                let offset_expr = self.parse_expr()?;
                Some(Limit {
                    limit: first_expr,
                    offset: Some(offset_expr),
                })
            } else {
                Some(Limit {
                    limit: first_expr,
                    offset: None,
                })
            }
        } else {
            None
        };
        Ok(Select {
            id: self.node_id(),
            span: start.to(self.last_span()),
            with,
            body: SelectBody { first, compounds },
            order_by,
            limit,
        })
    }

    fn parse_with(&mut self) -> ParseResult<With> {
        let start = self.current().span;
        self.expect_keyword(Keyword::With)?;
        let recursive = self.eat_keyword(Keyword::Recursive);
        let ctes = self.comma_separated(Self::parse_cte)?;
        Ok(With {
            recursive,
            ctes,
            span: start.to(self.last_span()),
        })
    }

    fn parse_cte(&mut self) -> ParseResult<Cte> {
        let name = self.parse_identifier()?;
        let columns = if self.at(&TokenKind::LeftParen) {
            self.parse_ident_list()?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::As)?;
        let materialized = if self.eat_keyword(Keyword::Materialized) {
            Some(true)
        } else if self.at_keyword(Keyword::Not) && self.peek().is_keyword(Keyword::Materialized) {
            self.advance();
            self.advance();
            Some(false)
        } else {
            None
        };
        self.expect(&TokenKind::LeftParen)?;
        let query = self.parse_select()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(Cte {
            name,
            columns,
            materialized,
            query,
        })
    }

    fn parse_select_core(&mut self) -> ParseResult<SelectCore> {
        let start = self.current().span;
        if self.eat_keyword(Keyword::Values) {
            let rows = self.comma_separated(|p| {
                p.expect(&TokenKind::LeftParen)?;
                let row = p.comma_separated(Self::parse_expr)?;
                p.expect(&TokenKind::RightParen)?;
                Ok(row)
            })?;
            return Ok(SelectCore::Values {
                rows,
                span: start.to(self.last_span()),
            });
        }
        self.expect_keyword(Keyword::Select)?;
        let distinct = if self.eat_keyword(Keyword::Distinct) {
            true
        } else {
            self.eat_keyword(Keyword::All);
            false
        };
        let columns = self.comma_separated(Self::parse_result_column)?;
        let from = if self.eat_keyword(Keyword::From) {
            Some(self.parse_from_clause()?)
        } else {
            None
        };
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let (group_by, having) = if self.eat_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            let group_by = self.comma_separated(Self::parse_expr)?;
            let having = if self.eat_keyword(Keyword::Having) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            (group_by, having)
        } else {
            (Vec::new(), None)
        };
        Ok(SelectCore::Select(SelectClause {
            span: start.to(self.last_span()),
            distinct,
            columns,
            from,
            where_clause,
            group_by,
            having,
        }))
    }

    fn parse_result_column(&mut self) -> ParseResult<ResultColumn> {
        if self.at(&TokenKind::Star) {
            let span = self.advance().span;
            return Ok(ResultColumn::Star(span));
        }
        if matches!(
            self.current().kind,
            TokenKind::Symbol(_) | TokenKind::QuotedSymbol(_)
        ) && self.peek().is(&TokenKind::Dot)
            && self.peek2().is(&TokenKind::Star)
        {
            let table = self.parse_identifier()?;
            self.advance();
            let star = self.advance().span;
            let span = table.span.to(star);
            return Ok(ResultColumn::TableStar(table, span));
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_alias()?;
        Ok(ResultColumn::Expr { expr, alias })
    }

    /// `[AS] name` — the implicit form is a bare symbol directly after
    /// the expression.
    fn parse_alias(&mut self) -> ParseResult<Option<Ident>> {
        if self.eat_keyword(Keyword::As) {
            return Ok(Some(self.parse_identifier()?));
        }
        if matches!(
            self.current().kind,
            TokenKind::Symbol(_) | TokenKind::QuotedSymbol(_)
        ) {
            return Ok(Some(self.parse_identifier()?));
        }
        Ok(None)
    }

    fn parse_from_clause(&mut self) -> ParseResult<FromClause> {
        let first = self.parse_table_or_subquery()?;
        let mut joins = Vec::new();
        loop {
            if self.eat(&TokenKind::Comma) {
                let table = self.parse_table_or_subquery()?;
                joins.push(Join {
                    op: JoinOp::Comma,
                    natural: false,
                    table,
                    constraint: None,
                });
                continue;
            }
            let at_join = self.at_keyword(Keyword::Natural)
                || matches!(
                    self.current().keyword(),
                    Some(
                        Keyword::Left
                            | Keyword::Right
                            | Keyword::Full
                            | Keyword::Inner
                            | Keyword::Cross
                            | Keyword::Join
                    )
                );
            if !at_join {
                break;
            }
            let natural = self.eat_keyword(Keyword::Natural);
            let op = if self.eat_keyword(Keyword::Left) {
                self.eat_keyword(Keyword::Outer);
                JoinOp::Left
            } else if self.eat_keyword(Keyword::Right) {
                self.eat_keyword(Keyword::Outer);
                JoinOp::Right
            } else if self.eat_keyword(Keyword::Full) {
                self.eat_keyword(Keyword::Outer);
                JoinOp::Full
            } else if self.eat_keyword(Keyword::Cross) {
                JoinOp::Cross
            } else {
                self.eat_keyword(Keyword::Inner);
                JoinOp::Inner
            };
            self.expect_keyword(Keyword::Join)?;
            let table = self.parse_table_or_subquery()?;
            let constraint = if self.eat_keyword(Keyword::On) {
                Some(JoinConstraint::On(self.parse_expr()?))
            } else if self.eat_keyword(Keyword::Using) {
                Some(JoinConstraint::Using(self.parse_ident_list()?))
            } else {
                None
            };
            joins.push(Join {
                op,
                natural,
                table,
                constraint,
            });
        }
        Ok(FromClause { first, joins })
    }

    fn parse_table_or_subquery(&mut self) -> ParseResult<TableOrSubquery> {
        if self.eat(&TokenKind::LeftParen) {
            let query = self.parse_select()?;
            self.expect(&TokenKind::RightParen)?;
            let alias = self.parse_alias()?;
            return Ok(TableOrSubquery::Subquery {
                query: Box::new(query),
                alias,
            });
        }
        let name = self.parse_object_name()?;
        let alias = self.parse_alias()?;
        Ok(TableOrSubquery::Table { name, alias })
    }

    fn parse_ordering_term(&mut self) -> ParseResult<OrderingTerm> {
        let expr = self.parse_expr()?;
        let direction = self.parse_direction();
        let nulls = if self.eat_keyword(Keyword::Nulls) {
            if self.eat_keyword(Keyword::First) {
                Some(NullsOrder::First)
            } else {
                self.expect_keyword(Keyword::Last)?;
                Some(NullsOrder::Last)
            }
        } else {
            None
        };
        Ok(OrderingTerm {
            expr,
            direction,
            nulls,
        })
    }

    // -- DML ---------------------------------------------------------------

    fn parse_insert(&mut self) -> ParseResult<Insert> {
        let replace = self.eat_keyword(Keyword::Replace);
        let or_action = if replace {
            None
        } else {
            self.expect_keyword(Keyword::Insert)?;
            if self.eat_keyword(Keyword::Or) {
                let Some(action) = self.parse_conflict_action() else {
                    return self.unexpected("ROLLBACK, ABORT, FAIL, IGNORE, or REPLACE");
                };
                Some(action)
            } else {
                None
            }
        };
        self.expect_keyword(Keyword::Into)?;
        let table = self.parse_object_name()?;
        let alias = if self.eat_keyword(Keyword::As) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let columns = if self.at(&TokenKind::LeftParen) {
            self.parse_ident_list()?
        } else {
            Vec::new()
        };
        let source = if self.eat_keyword(Keyword::Default) {
            self.expect_keyword(Keyword::Values)?;
            InsertSource::DefaultValues
        } else if matches!(
            self.current().keyword(),
            Some(Keyword::Select | Keyword::With)
        ) {
            InsertSource::Select(Box::new(self.parse_select()?))
        } else if self.at_keyword(Keyword::Values) {
            self.advance();
            let rows = self.comma_separated(|p| {
                p.expect(&TokenKind::LeftParen)?;
                let row = p.comma_separated(Self::parse_expr)?;
                p.expect(&TokenKind::RightParen)?;
                Ok(row)
            })?;
            InsertSource::Values(rows)
        } else {
            return self.unexpected("VALUES, SELECT, or DEFAULT VALUES");
        };
        let mut upserts = Vec::new();
        while self.at_keyword(Keyword::On) {
            upserts.push(self.parse_upsert()?);
        }
        let returning = self.parse_returning()?;
        Ok(Insert {
            or_action,
            replace,
            table,
            alias,
            columns,
            source,
            upserts,
            returning,
        })
    }

    fn parse_upsert(&mut self) -> ParseResult<Upsert> {
        self.expect_keyword(Keyword::On)?;
        self.expect_keyword(Keyword::Conflict)?;
        let target = if self.at(&TokenKind::LeftParen) {
            self.advance();
            let columns = self.comma_separated(Self::parse_indexed_column)?;
            self.expect(&TokenKind::RightParen)?;
            let where_clause = if self.eat_keyword(Keyword::Where) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            Some(UpsertTarget {
                columns,
                where_clause,
            })
        } else {
            None
        };
        self.expect_keyword(Keyword::Do)?;
        let action = if self.eat_keyword(Keyword::Nothing) {
            UpsertAction::Nothing
        } else {
            self.expect_keyword(Keyword::Update)?;
            self.expect_keyword(Keyword::Set)?;
            let sets = self.comma_separated(Self::parse_set_assignment)?;
            let where_clause = if self.eat_keyword(Keyword::Where) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            UpsertAction::Update { sets, where_clause }
        };
        Ok(Upsert { target, action })
    }

    fn parse_set_assignment(&mut self) -> ParseResult<SetAssignment> {
        let columns = if self.at(&TokenKind::LeftParen) {
            self.parse_ident_list()?
        } else {
            vec![self.parse_identifier()?]
        };
        self.expect(&TokenKind::Eq)?;
        let value = self.parse_expr()?;
        Ok(SetAssignment { columns, value })
    }

    fn parse_returning(&mut self) -> ParseResult<Option<Vec<ResultColumn>>> {
        if self.eat_keyword(Keyword::Returning) {
            Ok(Some(self.comma_separated(Self::parse_result_column)?))
        } else {
            Ok(None)
        }
    }

    fn parse_update(&mut self) -> ParseResult<Update> {
        self.expect_keyword(Keyword::Update)?;
        let or_action = if self.eat_keyword(Keyword::Or) {
            let Some(action) = self.parse_conflict_action() else {
                return self.unexpected("ROLLBACK, ABORT, FAIL, IGNORE, or REPLACE");
            };
            Some(action)
        } else {
            None
        };
        let table = self.parse_object_name()?;
        let alias = self.parse_alias()?;
        self.expect_keyword(Keyword::Set)?;
        let sets = self.comma_separated(Self::parse_set_assignment)?;
        let from = if self.eat_keyword(Keyword::From) {
            Some(self.parse_from_clause()?)
        } else {
            None
        };
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let returning = self.parse_returning()?;
        Ok(Update {
            or_action,
            table,
            alias,
            sets,
            from,
            where_clause,
            returning,
        })
    }

    fn parse_delete(&mut self) -> ParseResult<Delete> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.parse_object_name()?;
        let alias = self.parse_alias()?;
        let where_clause = if self.eat_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let returning = self.parse_returning()?;
        Ok(Delete {
            table,
            alias,
            where_clause,
            returning,
        })
    }

    // -- directives --------------------------------------------------------

    fn parse_pragma(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Pragma)?;
        let object = self.parse_object_name()?;
        let arg = if self.eat(&TokenKind::Eq) {
            Some(PragmaArg::Assign(self.parse_pragma_operand()?))
        } else if self.eat(&TokenKind::LeftParen) {
            let operand = self.parse_pragma_operand()?;
            let alias = if self.eat_keyword(Keyword::As) {
                Some(self.parse_identifier()?)
            } else {
                None
            };
            self.expect(&TokenKind::RightParen)?;
            Some(PragmaArg::Call { operand, alias })
        } else {
            None
        };
        Ok(StmtKind::Pragma(Pragma {
            schema: object.schema,
            name: object.name,
            arg,
        }))
    }

    fn parse_pragma_operand(&mut self) -> ParseResult<PragmaOperand> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Symbol(value) => {
                self.advance();
                Ok(PragmaOperand::Name(Ident::new(value, token.span)))
            }
            TokenKind::QuotedSymbol(value) => {
                self.advance();
                Ok(PragmaOperand::Name(Ident::quoted(value, token.span)))
            }
            TokenKind::Integer(text) => {
                self.advance();
                Ok(PragmaOperand::Literal(Literal::Integer(text)))
            }
            TokenKind::Float(text) => {
                self.advance();
                Ok(PragmaOperand::Literal(Literal::Float(text)))
            }
            TokenKind::String(text) => {
                self.advance();
                Ok(PragmaOperand::Literal(Literal::String(text)))
            }
            TokenKind::Keyword(_) => {
                self.advance();
                let text = token.span.slice(self.source()).to_string();
                Ok(PragmaOperand::Name(Ident::new(text, token.span)))
            }
            _ => self.unexpected("a pragma value"),
        }
    }

    /// `DEFINE QUERY name [INPUT Id] [OUTPUT Id] AS <stmt>`
    fn parse_define(&mut self, start: Span) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Define)?;
        self.expect_keyword(Keyword::Query)?;
        let name = self.parse_identifier()?;
        let input = if self.eat_keyword(Keyword::Input) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let output = if self.eat_keyword(Keyword::Output) {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        self.expect_keyword(Keyword::As)?;
        let body_start = self.current().span.start;
        let stmt = self.parse_statement()?;
        Ok(StmtKind::Define(Define {
            name,
            input,
            output,
            stmt: Box::new(stmt),
            header_span: Span::new(start.start, body_start),
        }))
    }

    // -- transactions ------------------------------------------------------

    fn parse_begin(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Begin)?;
        let mode = if self.eat_keyword(Keyword::Deferred) {
            Some(TransactionMode::Deferred)
        } else if self.eat_keyword(Keyword::Immediate) {
            Some(TransactionMode::Immediate)
        } else if self.eat_keyword(Keyword::Exclusive) {
            Some(TransactionMode::Exclusive)
        } else {
            None
        };
        self.eat_keyword(Keyword::Transaction);
        Ok(StmtKind::Begin { mode })
    }

    fn parse_rollback(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword(Keyword::Rollback)?;
        self.eat_keyword(Keyword::Transaction);
        let savepoint = if self.eat_keyword(Keyword::To) {
            self.eat_keyword(Keyword::Savepoint);
            Some(self.parse_identifier()?)
        } else {
            None
        };
        Ok(StmtKind::Rollback { savepoint })
    }
}
