// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Pratt parse table.

use kestrel_parser::TokenKind;

use super::codegen::Compiler;
use super::types::Result;

/// Binding power, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * / %
    Unary,      // ! -
    Call,       // . () [] !()
    Primary,
}

impl Precedence {
    /// The next-tighter level, for left-associative binary operators.
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// A prefix or infix handler. The flag says whether an `=` may follow.
pub type ParseFn = fn(&mut Compiler, bool) -> Result<()>;

#[derive(Clone, Copy)]
pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

impl ParseRule {
    const fn new(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

pub fn rule(kind: TokenKind) -> ParseRule {
    use Precedence as P;
    use TokenKind as T;

    match kind {
        T::LeftParen => ParseRule::new(Some(Compiler::grouping), Some(Compiler::call), P::Call),
        T::LeftBracket => ParseRule::new(
            Some(Compiler::array_literal),
            Some(Compiler::index),
            P::Call,
        ),
        T::LeftBrace => ParseRule::new(Some(Compiler::map_literal), None, P::None),
        T::Dot => ParseRule::new(None, Some(Compiler::dot), P::Call),
        T::Bang => ParseRule::new(Some(Compiler::unary), Some(Compiler::force_call), P::Call),
        T::Minus => ParseRule::new(Some(Compiler::unary), Some(Compiler::binary), P::Term),
        T::Plus => ParseRule::new(None, Some(Compiler::binary), P::Term),
        T::Slash | T::Star | T::Percent => ParseRule::new(None, Some(Compiler::binary), P::Factor),
        T::BangEqual | T::EqualEqual => ParseRule::new(None, Some(Compiler::binary), P::Equality),
        T::Greater | T::GreaterEqual | T::Less | T::LessEqual => {
            ParseRule::new(None, Some(Compiler::binary), P::Comparison)
        }
        T::Identifier => ParseRule::new(Some(Compiler::variable), None, P::None),
        T::String => ParseRule::new(Some(Compiler::string), None, P::None),
        T::Number => ParseRule::new(Some(Compiler::number), None, P::None),
        T::And => ParseRule::new(None, Some(Compiler::and), P::And),
        T::Or => ParseRule::new(None, Some(Compiler::or), P::Or),
        T::False | T::True | T::Null => ParseRule::new(Some(Compiler::literal), None, P::None),
        T::Fun => ParseRule::new(Some(Compiler::function_literal), None, P::None),
        _ => ParseRule::new(None, None, P::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_levels_are_ordered() {
        assert!(rule(TokenKind::Star).precedence > rule(TokenKind::Plus).precedence);
        assert!(rule(TokenKind::Plus).precedence > rule(TokenKind::Less).precedence);
        assert!(rule(TokenKind::Less).precedence > rule(TokenKind::EqualEqual).precedence);
        assert!(rule(TokenKind::EqualEqual).precedence > rule(TokenKind::And).precedence);
        assert!(rule(TokenKind::And).precedence > rule(TokenKind::Or).precedence);
    }

    #[test]
    fn next_saturates_at_primary() {
        assert_eq!(Precedence::Term.next(), Precedence::Factor);
        assert_eq!(Precedence::Primary.next(), Precedence::Primary);
    }
}
