// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Token cursor and the compiler's token-level helpers.

use kestrel_parser::{Token, TokenKind};

use super::codegen::Compiler;
use super::types::{CompileError, CompileErrorKind, ErrorLocation, Result};

/// A cursor over a token sequence. Reads past the end yield `Eof`.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let line = tokens.last().map_or(1, |t| t.line);
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", line, 0),
        }
    }

    pub fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub fn previous(&self) -> &Token {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .unwrap_or(&self.eof)
    }

    /// Kind of the token `n` places after the current one.
    pub fn peek(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Step past the current token. Never moves past `Eof`.
    pub fn bump(&mut self) {
        if self.current().kind != TokenKind::Eof {
            self.pos += 1;
        }
    }
}

impl Compiler {
    /// Consume the current token. A lexical error token arriving as the
    /// new current token is reported and skipped.
    pub(super) fn advance(&mut self) -> Result<()> {
        self.parser.bump();
        self.check_lexical()
    }

    /// Fail if the current token is a lexical error, stepping past it.
    pub(super) fn check_lexical(&mut self) -> Result<()> {
        if self.parser.check(TokenKind::Error) {
            let error = self.error_at_current(CompileErrorKind::Lexical(
                self.parser.current().lexeme.clone(),
            ));
            self.parser.bump();
            return Err(error);
        }
        Ok(())
    }

    pub(super) fn check(&self, kind: TokenKind) -> bool {
        self.parser.check(kind)
    }

    pub(super) fn match_token(&mut self, kind: TokenKind) -> Result<bool> {
        if !self.check(kind) {
            return Ok(false);
        }
        self.advance()?;
        Ok(true)
    }

    pub(super) fn consume(&mut self, kind: TokenKind, message: &str) -> Result<()> {
        if self.check(kind) {
            return self.advance();
        }
        Err(self.error_at_current(CompileErrorKind::Syntax(message.to_string())))
    }

    /// Lexeme of the token just consumed.
    pub(super) fn previous_lexeme(&self) -> String {
        self.parser.previous().lexeme.clone()
    }

    pub(super) fn error_at_current(&self, kind: CompileErrorKind) -> CompileError {
        error_at(self.parser.current(), kind)
    }

    pub(super) fn error_at_previous(&self, kind: CompileErrorKind) -> CompileError {
        error_at(self.parser.previous(), kind)
    }

    /// Skip tokens until a likely statement boundary.
    ///
    /// A statement that failed while its code was being emitted has already
    /// been parsed through its closing `}`, so there is nothing to skip.
    pub(super) fn synchronize(&mut self) {
        if self.parser.previous().kind == TokenKind::RightBrace {
            return;
        }
        while !self.check(TokenKind::Eof) {
            if self.parser.previous().kind == TokenKind::Semicolon {
                return;
            }
            if self.parser.current().kind.starts_statement() {
                return;
            }
            self.parser.bump();
        }
    }
}

fn error_at(token: &Token, kind: CompileErrorKind) -> CompileError {
    let location = match token.kind {
        TokenKind::Eof => ErrorLocation::End,
        TokenKind::Error => ErrorLocation::Lexical,
        _ => ErrorLocation::Token(token.lexeme.clone()),
    };
    CompileError {
        line: token.line,
        location,
        kind,
    }
}
