//! Pratt expression parsing over SQLite's precedence table.

use crate::ast::{
    BindParameter, CallArgs, CaseBranch, Expr, ExprKind, Ident, InfixOp, Literal, PrefixOp,
    RaiseAction, TextMatchOp,
};
use crate::span::Span;
use crate::token::{Keyword, TokenKind};

use super::{ParseResult, Parser};

/// SQLite's 13 binding-power levels. Higher binds tighter; primary
/// expressions sit above all of these.
pub(crate) mod prec {
    pub const NONE: u8 = 0;
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const NOT: u8 = 3;
    /// `= == != <> IS IS NOT IN LIKE GLOB MATCH REGEXP BETWEEN ISNULL NOTNULL`
    pub const EQUALITY: u8 = 4;
    pub const COMPARISON: u8 = 5;
    pub const ESCAPE: u8 = 6;
    pub const BITWISE: u8 = 7;
    pub const ADDITIVE: u8 = 8;
    pub const MULTIPLICATIVE: u8 = 9;
    /// `|| -> ->>`
    pub const CONCAT: u8 = 10;
    pub const COLLATE: u8 = 11;
    pub const PREFIX: u8 = 12;
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_subexpr(prec::NONE)
    }

    /// Parses infix operators until one binds no tighter than
    /// `min_prec`.
    pub(crate) fn parse_subexpr(&mut self, min_prec: u8) -> ParseResult<Expr> {
        let mut expr = self.parse_prefix()?;
        loop {
            let next = self.next_precedence();
            if min_prec >= next {
                break;
            }
            expr = self.parse_infix(expr, next)?;
        }
        Ok(expr)
    }

    pub(crate) fn mk_expr(&mut self, start: Span, kind: ExprKind) -> Expr {
        Expr {
            id: self.node_id(),
            span: start.to(self.last_span()),
            kind,
        }
    }

    /// Classifies the current token as an infix operator. Multi-word
    /// operators are recognized by inspecting the peek token; the
    /// precedence bucket is the same either way, so `IS [NOT] DISTINCT
    /// FROM` (which needs a third token) resolves at consume time.
    fn next_precedence(&mut self) -> u8 {
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Keyword(Keyword::Or) => prec::OR,
            TokenKind::Keyword(Keyword::And) => prec::AND,
            TokenKind::Keyword(Keyword::Not) => match self.peek().keyword() {
                Some(
                    Keyword::In
                    | Keyword::Between
                    | Keyword::Like
                    | Keyword::Glob
                    | Keyword::Match
                    | Keyword::Regexp
                    | Keyword::Null,
                ) => prec::EQUALITY,
                _ => prec::NONE,
            },
            TokenKind::Keyword(
                Keyword::Is
                | Keyword::In
                | Keyword::Between
                | Keyword::Like
                | Keyword::Glob
                | Keyword::Match
                | Keyword::Regexp
                | Keyword::Isnull
                | Keyword::Notnull,
            ) => prec::EQUALITY,
            TokenKind::Eq | TokenKind::EqEq | TokenKind::BangEq | TokenKind::LtGt => prec::EQUALITY,
            TokenKind::Lt | TokenKind::Gt | TokenKind::LtEq | TokenKind::GtEq => prec::COMPARISON,
            TokenKind::Ampersand
            | TokenKind::Pipe
            | TokenKind::ShiftLeft
            | TokenKind::ShiftRight => prec::BITWISE,
            TokenKind::Plus | TokenKind::Minus => prec::ADDITIVE,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => prec::MULTIPLICATIVE,
            TokenKind::Concat | TokenKind::Arrow | TokenKind::LongArrow => prec::CONCAT,
            TokenKind::Keyword(Keyword::Collate) => prec::COLLATE,
            _ => prec::NONE,
        }
    }

    fn parse_infix(&mut self, left: Expr, op_prec: u8) -> ParseResult<Expr> {
        let start = left.span;
        let token = self.advance();

        let simple = match &token.kind {
            TokenKind::Plus => Some(InfixOp::Add),
            TokenKind::Minus => Some(InfixOp::Subtract),
            TokenKind::Star => Some(InfixOp::Multiply),
            TokenKind::Slash => Some(InfixOp::Divide),
            TokenKind::Percent => Some(InfixOp::Modulo),
            TokenKind::Concat => Some(InfixOp::Concat),
            TokenKind::Arrow => Some(InfixOp::JsonArrow),
            TokenKind::LongArrow => Some(InfixOp::JsonExtract),
            TokenKind::Ampersand => Some(InfixOp::BitAnd),
            TokenKind::Pipe => Some(InfixOp::BitOr),
            TokenKind::ShiftLeft => Some(InfixOp::ShiftLeft),
            TokenKind::ShiftRight => Some(InfixOp::ShiftRight),
            TokenKind::Lt => Some(InfixOp::Less),
            TokenKind::Gt => Some(InfixOp::Greater),
            TokenKind::LtEq => Some(InfixOp::LessEq),
            TokenKind::GtEq => Some(InfixOp::GreaterEq),
            TokenKind::Eq | TokenKind::EqEq => Some(InfixOp::Eq),
            TokenKind::BangEq | TokenKind::LtGt => Some(InfixOp::NotEq),
            TokenKind::Keyword(Keyword::And) => Some(InfixOp::And),
            TokenKind::Keyword(Keyword::Or) => Some(InfixOp::Or),
            _ => None,
        };
        if let Some(op) = simple {
            let right = self.parse_subexpr(op_prec)?;
            return Ok(self.mk_expr(
                start,
                ExprKind::Infix {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            ));
        }

        match token.kind {
            TokenKind::Keyword(Keyword::Collate) => {
                let collation = self.parse_identifier()?;
                Ok(self.mk_expr(
                    start,
                    ExprKind::Collate {
                        operand: Box::new(left),
                        collation,
                    },
                ))
            }
            TokenKind::Keyword(Keyword::Isnull) => Ok(self.mk_expr(
                start,
                ExprKind::IsNull {
                    operand: Box::new(left),
                    negated: false,
                },
            )),
            TokenKind::Keyword(Keyword::Notnull) => Ok(self.mk_expr(
                start,
                ExprKind::IsNull {
                    operand: Box::new(left),
                    negated: true,
                },
            )),
            TokenKind::Keyword(Keyword::Is) => self.parse_is(left, op_prec),
            TokenKind::Keyword(Keyword::Not) => {
                // `NOT NULL`, `NOT IN`, `NOT BETWEEN`, `NOT LIKE`, …
                if self.eat_keyword(Keyword::Null) {
                    return Ok(self.mk_expr(
                        start,
                        ExprKind::IsNull {
                            operand: Box::new(left),
                            negated: true,
                        },
                    ));
                }
                if self.eat_keyword(Keyword::In) {
                    return self.parse_in(left, true);
                }
                if self.eat_keyword(Keyword::Between) {
                    return self.parse_between(left, true);
                }
                if let Some(op) = self.eat_text_match_op() {
                    return self.parse_text_match(left, op, true);
                }
                self.unexpected("IN, BETWEEN, LIKE, GLOB, MATCH, REGEXP, or NULL after NOT")
            }
            TokenKind::Keyword(Keyword::In) => self.parse_in(left, false),
            TokenKind::Keyword(Keyword::Between) => self.parse_between(left, false),
            TokenKind::Keyword(Keyword::Like) => self.parse_text_match(left, TextMatchOp::Like, false),
            TokenKind::Keyword(Keyword::Glob) => self.parse_text_match(left, TextMatchOp::Glob, false),
            TokenKind::Keyword(Keyword::Match) => {
                self.parse_text_match(left, TextMatchOp::Match, false)
            }
            TokenKind::Keyword(Keyword::Regexp) => {
                self.parse_text_match(left, TextMatchOp::Regexp, false)
            }
            // Reachable only if `next_precedence` disagrees with this
            // function about what counts as an operator.
            other => {
                let span = token.span;
                Err(crate::diagnostics::Diagnostic::error(
                    format!("`{other}` is not an infix operator"),
                    span,
                ))
            }
        }
    }

    fn eat_text_match_op(&mut self) -> Option<TextMatchOp> {
        let op = match self.current().keyword()? {
            Keyword::Like => TextMatchOp::Like,
            Keyword::Glob => TextMatchOp::Glob,
            Keyword::Match => TextMatchOp::Match,
            Keyword::Regexp => TextMatchOp::Regexp,
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    /// `IS [NOT] …`: plain, NULL, or `[NOT] DISTINCT FROM`. The third
    /// lookahead token decides between `IS NOT x` and
    /// `IS NOT DISTINCT FROM x`.
    fn parse_is(&mut self, left: Expr, op_prec: u8) -> ParseResult<Expr> {
        let start = left.span;
        let negated = self.eat_keyword(Keyword::Not);
        if self.eat_keyword(Keyword::Null) {
            return Ok(self.mk_expr(
                start,
                ExprKind::IsNull {
                    operand: Box::new(left),
                    negated,
                },
            ));
        }
        if self.eat_keywords2(Keyword::Distinct, Keyword::From) {
            let right = self.parse_subexpr(op_prec)?;
            let op = if negated {
                InfixOp::IsNotDistinctFrom
            } else {
                InfixOp::IsDistinctFrom
            };
            return Ok(self.mk_expr(
                start,
                ExprKind::Infix {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            ));
        }
        let right = self.parse_subexpr(op_prec)?;
        let op = if negated { InfixOp::IsNot } else { InfixOp::Is };
        Ok(self.mk_expr(
            start,
            ExprKind::Infix {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
        ))
    }

    /// `[NOT] IN`: a parenthesized list, a subquery, a bare table
    /// name, or a list-valued bind parameter.
    fn parse_in(&mut self, left: Expr, negated: bool) -> ParseResult<Expr> {
        let start = left.span;
        if self.eat(&TokenKind::LeftParen) {
            if matches!(
                self.current().keyword(),
                Some(Keyword::Select | Keyword::With | Keyword::Values)
            ) {
                let query = self.parse_select()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(self.mk_expr(
                    start,
                    ExprKind::InSubquery {
                        operand: Box::new(left),
                        negated,
                        query: Box::new(query),
                    },
                ));
            }
            let items = if self.at(&TokenKind::RightParen) {
                Vec::new()
            } else {
                self.comma_separated(Self::parse_expr)?
            };
            self.expect(&TokenKind::RightParen)?;
            return Ok(self.mk_expr(
                start,
                ExprKind::InList {
                    operand: Box::new(left),
                    negated,
                    items,
                },
            ));
        }
        if matches!(
            self.current().kind,
            TokenKind::Question | TokenKind::Colon | TokenKind::At | TokenKind::Dollar
        ) {
            let param = self.parse_bind_parameter()?;
            return Ok(self.mk_expr(
                start,
                ExprKind::InBind {
                    operand: Box::new(left),
                    negated,
                    param: Box::new(param),
                },
            ));
        }
        let table = self.parse_object_name()?;
        Ok(self.mk_expr(
            start,
            ExprKind::InTable {
                operand: Box::new(left),
                negated,
                table,
            },
        ))
    }

    /// `BETWEEN` parses as a ternary: both bounds are read at one
    /// level above `AND`, so the `AND` separating them is never taken
    /// as a boolean conjunction.
    fn parse_between(&mut self, left: Expr, negated: bool) -> ParseResult<Expr> {
        let start = left.span;
        let low = self.parse_subexpr(prec::NOT)?;
        self.expect_keyword(Keyword::And)?;
        let high = self.parse_subexpr(prec::NOT)?;
        Ok(self.mk_expr(
            start,
            ExprKind::Between {
                operand: Box::new(left),
                negated,
                low: Box::new(low),
                high: Box::new(high),
            },
        ))
    }

    fn parse_text_match(
        &mut self,
        left: Expr,
        op: TextMatchOp,
        negated: bool,
    ) -> ParseResult<Expr> {
        let start = left.span;
        let pattern = self.parse_subexpr(prec::EQUALITY)?;
        let escape = if self.eat_keyword(Keyword::Escape) {
            Some(Box::new(self.parse_subexpr(prec::ESCAPE)?))
        } else {
            None
        };
        Ok(self.mk_expr(
            start,
            ExprKind::TextMatch {
                operand: Box::new(left),
                op,
                negated,
                pattern: Box::new(pattern),
                escape,
            },
        ))
    }

    // -- primaries ---------------------------------------------------------

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let start = self.current().span;
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::String(_)
            | TokenKind::Blob(_) => {
                let token = self.advance();
                let literal = match token.kind {
                    TokenKind::Integer(text) => Literal::Integer(text),
                    TokenKind::Float(text) => Literal::Float(text),
                    TokenKind::String(text) => Literal::String(text),
                    TokenKind::Blob(text) => Literal::Blob(text),
                    _ => unreachable!("matched above"),
                };
                Ok(self.mk_expr(start, ExprKind::Literal(literal)))
            }
            TokenKind::Keyword(keyword) => match keyword {
                Keyword::Null => self.literal_keyword(start, Literal::Null),
                Keyword::True => self.literal_keyword(start, Literal::True),
                Keyword::False => self.literal_keyword(start, Literal::False),
                Keyword::CurrentTime => self.literal_keyword(start, Literal::CurrentTime),
                Keyword::CurrentDate => self.literal_keyword(start, Literal::CurrentDate),
                Keyword::CurrentTimestamp => {
                    self.literal_keyword(start, Literal::CurrentTimestamp)
                }
                Keyword::Case => self.parse_case(start),
                Keyword::Cast => self.parse_cast(start),
                Keyword::Exists => {
                    self.advance();
                    self.parse_exists(start, false)
                }
                Keyword::Raise => self.parse_raise(start),
                Keyword::Not => {
                    self.advance();
                    if self.at_keyword(Keyword::Exists) {
                        self.advance();
                        return self.parse_exists(start, true);
                    }
                    let operand = self.parse_subexpr(prec::NOT)?;
                    Ok(self.mk_expr(
                        start,
                        ExprKind::Prefix {
                            op: PrefixOp::Not,
                            operand: Box::new(operand),
                        },
                    ))
                }
                k if k.is_soft() => self.parse_column_or_call(),
                _ => self.unexpected("an expression"),
            },
            TokenKind::Plus => self.parse_unary(start, PrefixOp::Plus),
            TokenKind::Minus => self.parse_unary(start, PrefixOp::Negate),
            TokenKind::Tilde => self.parse_unary(start, PrefixOp::BitNot),
            TokenKind::LeftParen => {
                self.advance();
                if matches!(
                    self.current().keyword(),
                    Some(Keyword::Select | Keyword::With | Keyword::Values)
                ) {
                    let query = self.parse_select()?;
                    self.expect(&TokenKind::RightParen)?;
                    return Ok(self.mk_expr(start, ExprKind::Subquery(Box::new(query))));
                }
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(self.mk_expr(start, ExprKind::Grouped(Box::new(inner))))
            }
            TokenKind::Question | TokenKind::Colon | TokenKind::At | TokenKind::Dollar => {
                self.parse_bind_parameter()
            }
            TokenKind::Symbol(_) | TokenKind::QuotedSymbol(_) => self.parse_column_or_call(),
            _ => self.unexpected("an expression"),
        }
    }

    fn literal_keyword(&mut self, start: Span, literal: Literal) -> ParseResult<Expr> {
        self.advance();
        Ok(self.mk_expr(start, ExprKind::Literal(literal)))
    }

    fn parse_unary(&mut self, start: Span, op: PrefixOp) -> ParseResult<Expr> {
        self.advance();
        let operand = self.parse_subexpr(prec::PREFIX)?;
        Ok(self.mk_expr(
            start,
            ExprKind::Prefix {
                op,
                operand: Box::new(operand),
            },
        ))
    }

    fn parse_exists(&mut self, start: Span, negated: bool) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let query = self.parse_select()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(self.mk_expr(
            start,
            ExprKind::Exists {
                negated,
                query: Box::new(query),
            },
        ))
    }

    fn parse_case(&mut self, start: Span) -> ParseResult<Expr> {
        self.advance();
        let operand = if self.at_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut branches = Vec::new();
        while self.eat_keyword(Keyword::When) {
            let when = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expr()?;
            branches.push(CaseBranch { when, then });
        }
        if branches.is_empty() {
            return self.unexpected("WHEN");
        }
        let otherwise = if self.eat_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword(Keyword::End)?;
        Ok(self.mk_expr(
            start,
            ExprKind::Case {
                operand,
                branches,
                otherwise,
            },
        ))
    }

    fn parse_cast(&mut self, start: Span) -> ParseResult<Expr> {
        self.advance();
        self.expect(&TokenKind::LeftParen)?;
        let operand = self.parse_expr()?;
        self.expect_keyword(Keyword::As)?;
        let ty = self.parse_type_name()?;
        self.expect(&TokenKind::RightParen)?;
        Ok(self.mk_expr(
            start,
            ExprKind::Cast {
                operand: Box::new(operand),
                ty,
            },
        ))
    }

    fn parse_raise(&mut self, start: Span) -> ParseResult<Expr> {
        self.advance();
        self.expect(&TokenKind::LeftParen)?;
        let action = match self.current().keyword() {
            Some(Keyword::Ignore) => RaiseAction::Ignore,
            Some(Keyword::Rollback) => RaiseAction::Rollback,
            Some(Keyword::Abort) => RaiseAction::Abort,
            Some(Keyword::Fail) => RaiseAction::Fail,
            _ => return self.unexpected("IGNORE, ROLLBACK, ABORT, or FAIL"),
        };
        self.advance();
        let message = if self.eat(&TokenKind::Comma) {
            match self.advance().kind {
                TokenKind::String(text) => Some(text),
                _ => return self.unexpected("an error message string"),
            }
        } else {
            None
        };
        self.expect(&TokenKind::RightParen)?;
        Ok(self.mk_expr(start, ExprKind::Raise { action, message }))
    }

    /// A column reference (up to `schema.table.column`) or, when an
    /// unqualified name is immediately followed by `(`, a function
    /// call.
    fn parse_column_or_call(&mut self) -> ParseResult<Expr> {
        let start = self.current().span;
        let first = self.parse_identifier()?;

        if self.at(&TokenKind::LeftParen) {
            return self.parse_call(start, first);
        }

        if !self.eat(&TokenKind::Dot) {
            return Ok(self.mk_expr(
                start,
                ExprKind::Column {
                    schema: None,
                    table: None,
                    name: first,
                },
            ));
        }
        let second = self.parse_identifier()?;
        if !self.eat(&TokenKind::Dot) {
            return Ok(self.mk_expr(
                start,
                ExprKind::Column {
                    schema: None,
                    table: Some(first),
                    name: second,
                },
            ));
        }
        let third = self.parse_identifier()?;
        Ok(self.mk_expr(
            start,
            ExprKind::Column {
                schema: Some(first),
                table: Some(second),
                name: third,
            },
        ))
    }

    fn parse_call(&mut self, start: Span, name: Ident) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParen)?;
        let distinct = self.eat_keyword(Keyword::Distinct);
        let args = if self.eat(&TokenKind::Star) {
            self.expect(&TokenKind::RightParen)?;
            CallArgs::Star
        } else if self.eat(&TokenKind::RightParen) {
            CallArgs::List(Vec::new())
        } else {
            let args = self.comma_separated(Self::parse_expr)?;
            self.expect(&TokenKind::RightParen)?;
            CallArgs::List(args)
        };
        Ok(self.mk_expr(
            start,
            ExprKind::Call {
                name,
                distinct,
                args,
            },
        ))
    }

    // -- bind parameters ---------------------------------------------------

    /// Normalizes the four placeholder prefixes into one node:
    /// `?` positional, `:name` / `@name` named, and the flattened
    /// `$seg::seg(suffix)` form.
    pub(crate) fn parse_bind_parameter(&mut self) -> ParseResult<Expr> {
        let start = self.current().span;
        let kind = self.current().kind.clone();
        match kind {
            TokenKind::Question => {
                self.advance();
                Ok(self.mk_expr(start, ExprKind::Bind(BindParameter::Positional)))
            }
            TokenKind::Colon | TokenKind::At => {
                self.advance();
                let name = self.expect_adjacent_word()?;
                Ok(self.mk_expr(start, ExprKind::Bind(BindParameter::Named(name))))
            }
            TokenKind::Dollar => {
                self.advance();
                let mut name = self.expect_adjacent_word()?;
                while self.adjacent()
                    && self.at(&TokenKind::Colon)
                    && self.peek().is(&TokenKind::Colon)
                {
                    self.advance();
                    self.advance();
                    name.push('_');
                    name.push_str(&self.expect_adjacent_word()?);
                }
                if self.adjacent() && self.at(&TokenKind::LeftParen) {
                    self.advance();
                    let suffix = self.expect_adjacent_word()?;
                    self.expect(&TokenKind::RightParen)?;
                    name.push('_');
                    name.push_str(&suffix);
                }
                Ok(self.mk_expr(start, ExprKind::Bind(BindParameter::Named(name))))
            }
            _ => self.unexpected("a bind parameter"),
        }
    }

    /// The word glued to a parameter prefix. Keywords are allowed;
    /// their original spelling is taken from the source.
    fn expect_adjacent_word(&mut self) -> ParseResult<String> {
        if !self.adjacent() {
            return self.unexpected("a parameter name");
        }
        let token = self.current().clone();
        match token.kind {
            TokenKind::Symbol(name) => {
                self.advance();
                Ok(name)
            }
            TokenKind::Keyword(_) => {
                self.advance();
                Ok(token.span.slice(self.source()).to_string())
            }
            _ => self.unexpected("a parameter name"),
        }
    }
}
