// kestrel-parser - Lexer for Kestrel
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for Kestrel source code.
//!
//! Converts a source string into a stream of tokens. Lexical errors do not
//! abort scanning: they are returned as `TokenKind::Error` tokens carrying the
//! message, and the compiler reports them at the right line.

use std::iter::Peekable;
use std::str::Chars;

use crate::token::{Token, TokenKind};

/// The lexer converts source code into tokens.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
    /// Text of the token being scanned.
    lexeme: String,
    /// Position of the first character of the token being scanned.
    start_line: u32,
    start_column: u32,
    finished: bool,
}

/// Scan a whole source string. The result always ends with exactly one
/// `TokenKind::Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize()
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            lexeme: String::new(),
            start_line: 1,
            start_column: 1,
            finished: false,
        }
    }

    /// Get the next token from the source.
    ///
    /// Once the end of input is reached every further call returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.lexeme.clear();
        self.start_line = self.line;
        self.start_column = self.column;

        let c = match self.advance() {
            Some(c) => c,
            None => return self.make(TokenKind::Eof),
        };

        match c {
            // Delimiters
            '(' => self.make(TokenKind::LeftParen),
            ')' => self.make(TokenKind::RightParen),
            '{' => self.make(TokenKind::LeftBrace),
            '}' => self.make(TokenKind::RightBrace),
            '[' => self.make(TokenKind::LeftBracket),
            ']' => self.make(TokenKind::RightBracket),
            ',' => self.make(TokenKind::Comma),
            '.' => self.make(TokenKind::Dot),
            ':' => self.make(TokenKind::Colon),
            ';' => self.make(TokenKind::Semicolon),

            // Operators
            '-' => self.make(TokenKind::Minus),
            '+' => self.make(TokenKind::Plus),
            '/' => self.make(TokenKind::Slash),
            '*' => self.make(TokenKind::Star),
            '%' => self.make(TokenKind::Percent),
            '!' => self.make_if_equal(TokenKind::BangEqual, TokenKind::Bang),
            '=' => self.make_if_equal(TokenKind::EqualEqual, TokenKind::Equal),
            '<' => self.make_if_equal(TokenKind::LessEqual, TokenKind::Less),
            '>' => self.make_if_equal(TokenKind::GreaterEqual, TokenKind::Greater),

            '"' => self.read_string(),
            '0'..='9' => self.read_number(),
            _ if is_ident_start(c) => self.read_identifier(),

            _ => self.error(format!("Unexpected character '{}'.", c)),
        }
    }

    /// Collect all tokens into a vector, ending with a single `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_next(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.lexeme.push(ch);
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn make(&mut self, kind: TokenKind) -> Token {
        if kind == TokenKind::Eof {
            self.finished = true;
        }
        Token::new(
            kind,
            std::mem::take(&mut self.lexeme),
            self.start_line,
            self.start_column,
        )
    }

    fn make_if_equal(&mut self, matched: TokenKind, otherwise: TokenKind) -> Token {
        if self.peek() == Some('=') {
            self.advance();
            self.make(matched)
        } else {
            self.make(otherwise)
        }
    }

    fn error(&mut self, message: String) -> Token {
        self.lexeme.clear();
        Token::new(
            TokenKind::Error,
            message,
            self.start_line,
            self.start_column,
        )
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    // Skip to end of line
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_string(&mut self) -> Token {
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n' | 't' | 'r' | '0' | '\\' | '"') => {}
                    Some(c) => return self.error(format!("Unknown escape sequence '\\{}'.", c)),
                    None => return self.error("Unterminated string.".to_string()),
                },
                Some(_) => {}
                None => return self.error("Unterminated string.".to_string()),
            }
        }
        self.make(TokenKind::String)
    }

    fn read_number(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        // Fractional part: a '.' only counts when a digit follows, so `a.b`
        // style property access on a number literal still lexes as a Dot.
        if self.peek() == Some('.') && matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        self.make(TokenKind::Number)
    }

    fn read_identifier(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.advance();
        }
        let kind = TokenKind::keyword(&self.lexeme).unwrap_or(TokenKind::Identifier);
        self.make(kind)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to and including the first `Eof`.
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        Some(self.next_token())
    }
}

/// Check if a character can start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can appear in an identifier.
fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

// ============================================================================
// Tests
// ============================================================================
