// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Expression parsing.

use kestrel_parser::TokenKind;

use crate::opcode::OpCode;
use crate::value::Value;

use super::codegen::Compiler;
use super::rules::{Precedence, rule};
use super::types::{CompileErrorKind, FunctionKind, Result};

/// Most elements in one array literal, pairs in one map literal, or
/// arguments in one call.
const MAX_ELEMENTS: usize = 255;

impl Compiler {
    pub(super) fn expression(&mut self) -> Result<()> {
        self.parse_precedence(Precedence::Assignment)
    }

    /// Parse anything binding at least as tightly as `precedence`.
    pub(super) fn parse_precedence(&mut self, precedence: Precedence) -> Result<()> {
        self.advance()?;
        let Some(prefix) = rule(self.parser.previous().kind).prefix else {
            return Err(self.error_at_previous(CompileErrorKind::ExpectExpression));
        };

        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign)?;

        while precedence <= rule(self.parser.current().kind).precedence {
            self.advance()?;
            if let Some(infix) = rule(self.parser.previous().kind).infix {
                infix(self, can_assign)?;
            }
        }

        if can_assign && self.match_token(TokenKind::Equal)? {
            return Err(self.error_at_previous(CompileErrorKind::InvalidAssignmentTarget));
        }
        Ok(())
    }

    // =========================================================================
    // Literals
    // =========================================================================

    pub(super) fn number(&mut self, _can_assign: bool) -> Result<()> {
        let value = self.number_value()?;
        self.emit_constant(Value::Number(value))
    }

    /// Value of the number literal just consumed.
    pub(super) fn number_value(&self) -> Result<f64> {
        self.parser.previous().lexeme.parse::<f64>().map_err(|_| {
            self.error_at_previous(CompileErrorKind::Syntax("Invalid number literal.".into()))
        })
    }

    pub(super) fn string(&mut self, _can_assign: bool) -> Result<()> {
        let value = self.string_value()?;
        self.emit_constant(value)
    }

    /// Interned contents of the string literal just consumed.
    pub(super) fn string_value(&self) -> Result<Value> {
        match self.parser.previous().string_value() {
            Some(s) => Ok(Value::string(&s)),
            None => Err(self.error_at_previous(CompileErrorKind::Syntax(
                "Invalid string literal.".into(),
            ))),
        }
    }

    pub(super) fn literal(&mut self, _can_assign: bool) -> Result<()> {
        match self.parser.previous().kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => self.emit_op(OpCode::Null),
        }
        Ok(())
    }

    pub(super) fn grouping(&mut self, _can_assign: bool) -> Result<()> {
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after expression.")
    }

    /// `[a, b, c]`
    pub(super) fn array_literal(&mut self, _can_assign: bool) -> Result<()> {
        let mut count = 0usize;
        while !self.check(TokenKind::RightBracket) {
            self.expression()?;
            count += 1;
            if count > MAX_ELEMENTS {
                return Err(self.error_at_previous(CompileErrorKind::TooManyElements));
            }
            if !self.match_token(TokenKind::Comma)? {
                break;
            }
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after array elements.")?;
        self.emit_op_arg(OpCode::Array, count as u8);
        Ok(())
    }

    /// `{"k": v, ...}`
    pub(super) fn map_literal(&mut self, _can_assign: bool) -> Result<()> {
        let mut count = 0usize;
        while !self.check(TokenKind::RightBrace) {
            self.expression()?;
            self.consume(TokenKind::Colon, "Expect ':' after map key.")?;
            self.expression()?;
            count += 1;
            if count > MAX_ELEMENTS {
                return Err(self.error_at_previous(CompileErrorKind::TooManyElements));
            }
            if !self.match_token(TokenKind::Comma)? {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after map entries.")?;
        self.emit_op_arg(OpCode::Map, count as u8);
        Ok(())
    }

    /// Anonymous `fun (params) { body }`.
    pub(super) fn function_literal(&mut self, _can_assign: bool) -> Result<()> {
        self.function(FunctionKind::Function, "anonymous")
    }

    // =========================================================================
    // Operators
    // =========================================================================

    pub(super) fn unary(&mut self, _can_assign: bool) -> Result<()> {
        let operator = self.parser.previous().kind;
        self.parse_precedence(Precedence::Unary)?;
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            _ => self.emit_op(OpCode::Not),
        }
        Ok(())
    }

    pub(super) fn binary(&mut self, _can_assign: bool) -> Result<()> {
        let operator = self.parser.previous().kind;
        self.parse_precedence(rule(operator).precedence.next())?;

        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::Percent => self.emit_op(OpCode::Modulo),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => self.emit_ops(OpCode::Equal, OpCode::Not),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => self.emit_ops(OpCode::Less, OpCode::Not),
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => self.emit_ops(OpCode::Greater, OpCode::Not),
            _ => {}
        }
        Ok(())
    }

    /// Short-circuit `and`: leaves the left operand if it is falsey.
    pub(super) fn and(&mut self, _can_assign: bool) -> Result<()> {
        let end = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And)?;
        self.patch_jump(end)
    }

    /// Short-circuit `or`: leaves the left operand if it is truthy.
    pub(super) fn or(&mut self, _can_assign: bool) -> Result<()> {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump)?;
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or)?;
        self.patch_jump(end)
    }

    // =========================================================================
    // Variables and access
    // =========================================================================

    pub(super) fn variable(&mut self, can_assign: bool) -> Result<()> {
        let name = self.previous_lexeme();
        self.named_variable(&name, can_assign)
    }

    /// Load or store `name`: local, then upvalue, then global.
    fn named_variable(&mut self, name: &str, can_assign: bool) -> Result<()> {
        let level = self.enclosing.len();
        let (get, set, arg) = if let Some(slot) = self.resolve_local(name)? {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(index) = self.resolve_upvalue(level, name)? {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, index)
        } else {
            let constant = self.identifier_constant(name)?;
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal)? {
            self.expression()?;
            self.emit_op_arg(set, arg);
        } else {
            self.emit_op_arg(get, arg);
        }
        Ok(())
    }

    /// `obj.field` and `obj.field = value`
    pub(super) fn dot(&mut self, can_assign: bool) -> Result<()> {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
        let name = self.previous_lexeme();
        let constant = self.identifier_constant(&name)?;

        if can_assign && self.match_token(TokenKind::Equal)? {
            self.expression()?;
            self.emit_op_arg(OpCode::SetProperty, constant);
        } else {
            self.emit_op_arg(OpCode::GetProperty, constant);
        }
        Ok(())
    }

    /// `x[i]`, `x[i] = v` and `x[a:b]` with either bound optional.
    pub(super) fn index(&mut self, can_assign: bool) -> Result<()> {
        if self.match_token(TokenKind::Colon)? {
            self.emit_op(OpCode::Null);
            return self.slice_end();
        }

        self.expression()?;
        if self.match_token(TokenKind::Colon)? {
            return self.slice_end();
        }

        self.consume(TokenKind::RightBracket, "Expect ']' after index.")?;
        if can_assign && self.match_token(TokenKind::Equal)? {
            self.expression()?;
            self.emit_op(OpCode::ArraySet);
        } else {
            self.emit_op(OpCode::ArrayGet);
        }
        Ok(())
    }

    /// The part of a slice after its `:`.
    fn slice_end(&mut self) -> Result<()> {
        if self.check(TokenKind::RightBracket) {
            self.emit_op(OpCode::Null);
        } else {
            self.expression()?;
        }
        self.consume(TokenKind::RightBracket, "Expect ']' after slice.")?;
        self.emit_op(OpCode::ArraySlice);
        Ok(())
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// `f(args)`, or `S(name: value, ...)` for named struct construction.
    pub(super) fn call(&mut self, _can_assign: bool) -> Result<()> {
        let (count, named) = self.argument_list()?;
        if named {
            self.emit_op_arg(OpCode::Construct, count);
            self.emit_byte(0);
        } else {
            self.emit_op_arg(OpCode::Call, count);
        }
        Ok(())
    }

    /// `S!(name: value, ...)`: construction that accepts undeclared fields.
    pub(super) fn force_call(&mut self, _can_assign: bool) -> Result<()> {
        self.consume(TokenKind::LeftParen, "Expect '(' after '!'.")?;
        let (count, named) = self.argument_list()?;
        if count > 0 && !named {
            return Err(self.error_at_previous(CompileErrorKind::ForcePositional));
        }
        self.emit_op_arg(OpCode::Construct, count);
        self.emit_byte(1);
        Ok(())
    }

    /// Compile arguments up to the closing `)`. Named arguments push their
    /// name before their value. Returns the count and whether they were named.
    fn argument_list(&mut self) -> Result<(u8, bool)> {
        let mut count = 0usize;
        let mut named: Option<bool> = None;

        if !self.check(TokenKind::RightParen) {
            loop {
                let is_named = self.check(TokenKind::Identifier)
                    && self.parser.peek(1) == TokenKind::Colon;
                match named {
                    None => named = Some(is_named),
                    Some(previous) if previous != is_named => {
                        return Err(self.error_at_current(CompileErrorKind::MixedArguments));
                    }
                    Some(_) => {}
                }

                if is_named {
                    self.advance()?;
                    let name = self.previous_lexeme();
                    self.advance()?;
                    let constant = self.identifier_constant(&name)?;
                    self.emit_op_arg(OpCode::Constant, constant);
                }
                self.expression()?;

                if count == MAX_ELEMENTS {
                    return Err(self.error_at_previous(CompileErrorKind::TooManyArguments));
                }
                count += 1;

                if !self.match_token(TokenKind::Comma)? {
                    break;
                }
            }
        }

        self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok((count as u8, named.unwrap_or(false)))
    }
}
