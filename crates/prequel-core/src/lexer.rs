//! A total, pull-based SQL lexer.
//!
//! The lexer never fails: input it cannot scan becomes a
//! [`TokenKind::Error`] token and scanning resumes after the offending
//! bytes. Whitespace and comments are skipped; every produced token
//! carries a byte-accurate half-open [`Span`] into the original text.

use crate::span::Span;
use crate::token::{Keyword, Token, TokenKind};

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Current byte offset into the source.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Produces the next token. Once the input is exhausted this keeps
    /// returning [`TokenKind::Eof`] at the end offset.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let start = self.pos;
        let Some(ch) = self.peek_char() else {
            return Token::eof(self.pos);
        };

        let kind = match ch {
            'x' | 'X' if self.peek_char_at(1) == Some('\'') => {
                self.bump();
                self.bump();
                self.scan_blob()
            }
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_word(),
            '"' | '`' => self.scan_quoted_symbol(ch),
            '\'' => self.scan_string(),
            c if c.is_ascii_digit() => self.scan_number(false),
            '.' if self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.scan_number(true)
            }
            _ => self.scan_operator(),
        };
        Token::new(kind, Span::new(start, self.pos))
    }

    /// Tokenizes the whole input, including the trailing EOF token.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_char_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek_char() {
            if pred(ch) {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('-') if self.peek_char_at(1) == Some('-') => {
                    self.bump_while(|c| c != '\n');
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek_char() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            // An unterminated block comment swallows the
                            // rest of the input, matching SQLite.
                            None => break,
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn scan_word(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let word = &self.src[start..self.pos];
        match Keyword::from_word(word) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Symbol(word.to_string()),
        }
    }

    fn scan_quoted_symbol(&mut self, quote: char) -> TokenKind {
        self.bump();
        match self.scan_until_close(quote) {
            Some(text) => TokenKind::QuotedSymbol(text),
            None => TokenKind::Error(format!("unterminated quoted identifier, expected `{quote}`")),
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.bump();
        match self.scan_until_close('\'') {
            Some(text) => TokenKind::String(text),
            None => TokenKind::Error("unterminated string literal".to_string()),
        }
    }

    /// Consumes up to the closing quote, collapsing doubled quotes into
    /// one. Returns `None` when the input ends before the close quote.
    fn scan_until_close(&mut self, quote: char) -> Option<String> {
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    if self.bump_if(quote) {
                        text.push(quote);
                    } else {
                        return Some(text);
                    }
                }
                Some(c) => text.push(c),
                None => return None,
            }
        }
    }

    fn scan_blob(&mut self) -> TokenKind {
        let Some(digits) = self.scan_until_close('\'') else {
            return TokenKind::Error("unterminated blob literal".to_string());
        };
        if digits.len() % 2 == 0 && digits.chars().all(|c| c.is_ascii_hexdigit()) {
            TokenKind::Blob(digits)
        } else {
            TokenKind::Error("blob literal must hold an even number of hex digits".to_string())
        }
    }

    fn scan_number(&mut self, leading_dot: bool) -> TokenKind {
        let start = self.pos;
        let mut float = leading_dot;
        if leading_dot {
            self.bump();
        } else if self.peek_char() == Some('0')
            && matches!(self.peek_char_at(1), Some('x') | Some('X'))
        {
            self.bump();
            self.bump();
            let digits_start = self.pos;
            self.bump_while(|c| c.is_ascii_hexdigit());
            if self.pos == digits_start {
                return TokenKind::Error("hex literal without digits".to_string());
            }
            return TokenKind::Integer(self.src[start..self.pos].to_string());
        }
        self.bump_while(|c| c.is_ascii_digit());
        if !leading_dot && self.peek_char() == Some('.') {
            // `1.e5` and `1.` are valid SQLite reals.
            float = true;
            self.bump();
            self.bump_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let mark = self.pos;
            self.bump();
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.bump();
            }
            let digits_start = self.pos;
            self.bump_while(|c| c.is_ascii_digit());
            if self.pos == digits_start {
                // Not an exponent after all; `1e` lexes as number `1`
                // followed by symbol `e`.
                self.pos = mark;
            } else {
                float = true;
            }
        }
        let text = self.src[start..self.pos].to_string();
        if float {
            TokenKind::Float(text)
        } else {
            TokenKind::Integer(text)
        }
    }

    fn scan_operator(&mut self) -> TokenKind {
        let ch = self.bump().expect("caller checked non-empty");
        match ch {
            '+' => TokenKind::Plus,
            '-' => {
                if self.bump_if('>') {
                    if self.bump_if('>') {
                        TokenKind::LongArrow
                    } else {
                        TokenKind::Arrow
                    }
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '|' => {
                if self.bump_if('|') {
                    TokenKind::Concat
                } else {
                    TokenKind::Pipe
                }
            }
            '&' => TokenKind::Ampersand,
            '~' => TokenKind::Tilde,
            '=' => {
                if self.bump_if('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.bump_if('=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.bump_if('=') {
                    TokenKind::LtEq
                } else if self.bump_if('>') {
                    TokenKind::LtGt
                } else if self.bump_if('<') {
                    TokenKind::ShiftLeft
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.bump_if('=') {
                    TokenKind::GtEq
                } else if self.bump_if('>') {
                    TokenKind::ShiftRight
                } else {
                    TokenKind::Gt
                }
            }
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '$' => TokenKind::Dollar,
            '@' => TokenKind::At,
            other => TokenKind::Error(format!("unexpected character `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        Lexer::new(sql)
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_symbols() {
        assert_eq!(
            kinds("SELECT name FROM users"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Symbol("name".to_string()),
                TokenKind::Keyword(Keyword::From),
                TokenKind::Symbol("users".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_are_byte_accurate() {
        let tokens = Lexer::new("SELECT  1;").tokenize();
        assert_eq!(tokens[0].span, Span::new(0, 6));
        assert_eq!(tokens[1].span, Span::new(8, 9));
        assert_eq!(tokens[2].span, Span::new(9, 10));
    }

    #[test]
    fn string_escapes_collapse() {
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::String("it's".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn quoted_identifiers() {
        assert_eq!(
            kinds("\"order\" `group`"),
            vec![
                TokenKind::QuotedSymbol("order".to_string()),
                TokenKind::QuotedSymbol("group".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 2.5 .5 0x1F 1e3"),
            vec![
                TokenKind::Integer("1".to_string()),
                TokenKind::Float("2.5".to_string()),
                TokenKind::Float(".5".to_string()),
                TokenKind::Integer("0x1F".to_string()),
                TokenKind::Float("1e3".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn blob_literals() {
        assert_eq!(
            kinds("X'CAFE' x'0b'"),
            vec![
                TokenKind::Blob("CAFE".to_string()),
                TokenKind::Blob("0b".to_string()),
                TokenKind::Eof,
            ]
        );
        assert!(matches!(kinds("X'F'")[0], TokenKind::Error(_)));
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("|| -> ->> << >> <= >= <> != =="),
            vec![
                TokenKind::Concat,
                TokenKind::Arrow,
                TokenKind::LongArrow,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::LtGt,
                TokenKind::BangEq,
                TokenKind::EqEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("-- line\nSELECT /* block */ 1"),
            vec![
                TokenKind::Keyword(Keyword::Select),
                TokenKind::Integer("1".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn total_on_garbage() {
        let tokens = kinds("SELECT # 1");
        assert!(matches!(tokens[1], TokenKind::Error(_)));
        assert_eq!(tokens[2], TokenKind::Integer("1".to_string()));
    }

    #[test]
    fn unterminated_string_is_error_token() {
        assert!(matches!(kinds("'oops")[0], TokenKind::Error(_)));
    }
}
