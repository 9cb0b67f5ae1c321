// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Single-pass code generator: declarations and statements.
//!
//! Expressions are handled by the Pratt parser in `expr`. Errors unwind with
//! `?` to the nearest declaration, which records them, rewinds any compile
//! state the failed declaration left half-built, and skips to the next
//! statement boundary.

use std::rc::Rc;

use kestrel_parser::{Token, TokenKind};
use tracing::debug;

use crate::opcode::OpCode;
use crate::value::{Obj, ObjFunction, Value, intern};

use super::parser::Parser;
use super::types::{
    CompileError, CompileErrorKind, CompileFailed, FunctionKind, FunctionState, Result, Upvalue,
};

/// Most fields one struct may declare.
const MAX_FIELDS: usize = 255;

/// Most parameters one function may declare.
const MAX_PARAMETERS: u8 = 255;

/// The bytecode compiler.
///
/// `state` is the function currently being compiled; `enclosing` holds its
/// lexically enclosing functions, outermost (the script) first.
#[derive(Debug)]
pub struct Compiler {
    pub(super) parser: Parser,
    pub(super) state: FunctionState,
    pub(super) enclosing: Vec<FunctionState>,
    errors: Vec<CompileError>,
}

/// Compile state to restore after a failed declaration.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    frames: usize,
    locals: usize,
    scope_depth: usize,
    loops: usize,
}

impl Compiler {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            parser: Parser::new(tokens),
            state: FunctionState::new(FunctionKind::Script, None),
            enclosing: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Compile the whole token sequence into the top-level script function.
    pub fn compile(mut self) -> std::result::Result<Rc<ObjFunction>, CompileFailed> {
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
        let (function, _) = self.end_function();

        if self.errors.is_empty() {
            Ok(Rc::new(function))
        } else {
            Err(CompileFailed {
                errors: self.errors,
            })
        }
    }

    /// Finish the current function and return to its enclosing one.
    fn end_function(&mut self) -> (ObjFunction, Vec<Upvalue>) {
        self.emit_return();
        let parent = self
            .enclosing
            .pop()
            .unwrap_or_else(|| FunctionState::new(FunctionKind::Script, None));
        let finished = std::mem::replace(&mut self.state, parent);
        let (function, upvalues) = finished.finish();

        debug!(
            function = function.name_str(),
            arity = function.arity,
            upvalues = function.upvalue_count,
            code_bytes = function.chunk.len(),
            constants = function.chunk.constants.len(),
            "compiled function"
        );
        (function, upvalues)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            frames: self.enclosing.len(),
            locals: self.state.locals.len(),
            scope_depth: self.state.scope_depth,
            loops: self.state.loops.len(),
        }
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        while self.enclosing.len() > checkpoint.frames {
            if let Some(parent) = self.enclosing.pop() {
                self.state = parent;
            }
        }
        self.state.locals.truncate(checkpoint.locals);
        self.state.scope_depth = checkpoint.scope_depth;
        self.state.loops.truncate(checkpoint.loops);
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    pub(super) fn declaration(&mut self) {
        let checkpoint = self.checkpoint();
        let start = self.parser.position();

        if let Err(error) = self.try_declaration() {
            self.rewind(checkpoint);
            self.errors.push(error);
            self.synchronize();
            if self.parser.position() == start {
                self.parser.bump();
            }
        }
    }

    fn try_declaration(&mut self) -> Result<()> {
        self.check_lexical()?;

        if self.match_token(TokenKind::Struct)? {
            self.struct_declaration()
        } else if self.check(TokenKind::Fun) && self.parser.peek(1) == TokenKind::Identifier {
            self.advance()?;
            self.fun_declaration()
        } else if self.match_token(TokenKind::Var)? {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> Result<()> {
        let global = self.parse_variable("Expect variable name.")?;

        if self.match_token(TokenKind::Equal)? {
            self.expression()?;
        } else {
            self.emit_op(OpCode::Null);
        }
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;

        self.define_variable(global);
        Ok(())
    }

    fn fun_declaration(&mut self) -> Result<()> {
        let global = self.parse_variable("Expect function name.")?;
        let name = self.previous_lexeme();
        // Initialized before the body so the function can call itself.
        self.mark_initialized();
        self.function(FunctionKind::Function, &name)?;
        self.define_variable(global);
        Ok(())
    }

    /// Compile a parameter list and body into a new function, then emit the
    /// `Closure` that builds it at runtime.
    pub(super) fn function(&mut self, kind: FunctionKind, name: &str) -> Result<()> {
        let state = FunctionState::new(kind, Some(intern(name)));
        let parent = std::mem::replace(&mut self.state, state);
        self.enclosing.push(parent);
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.")?;
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.state.arity == MAX_PARAMETERS {
                    return Err(self.error_at_current(CompileErrorKind::TooManyParameters));
                }
                self.state.arity += 1;
                self.consume(TokenKind::Identifier, "Expect parameter name.")?;
                self.declare_parameter()?;
                if !self.match_token(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.")?;
        self.block()?;

        let (function, upvalues) = self.end_function();
        let constant = self.make_constant(Value::Obj(Obj::Function(Rc::new(function))))?;
        self.emit_op_arg(OpCode::Closure, constant);
        for upvalue in upvalues {
            self.emit_byte(u8::from(upvalue.is_local));
            self.emit_byte(upvalue.index);
        }
        Ok(())
    }

    /// `struct Name { field = default, ... }`
    fn struct_declaration(&mut self) -> Result<()> {
        self.consume(TokenKind::Identifier, "Expect struct name.")?;
        let name = self.previous_lexeme();
        self.declare_variable()?;
        let name_constant = self.identifier_constant(&name)?;

        self.consume(TokenKind::LeftBrace, "Expect '{' before struct body.")?;
        let mut fields: Vec<(String, u8, u8)> = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.consume(TokenKind::Identifier, "Expect field name.")?;
            let field = self.previous_lexeme();
            if fields.iter().any(|(existing, _, _)| *existing == field) {
                return Err(self.error_at_previous(CompileErrorKind::Duplicate {
                    what: "field",
                    name: field,
                }));
            }
            if fields.len() == MAX_FIELDS {
                return Err(self.error_at_previous(CompileErrorKind::TooManyFields));
            }

            let field_constant = self.identifier_constant(&field)?;
            let default = if self.match_token(TokenKind::Equal)? {
                self.field_default()?
            } else {
                Value::Null
            };
            let default_constant = self.make_constant(default)?;
            fields.push((field, field_constant, default_constant));

            if !self.match_token(TokenKind::Comma)? {
                break;
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after struct fields.")?;

        self.emit_op_arg(OpCode::Struct, name_constant);
        self.emit_byte(fields.len() as u8);
        for (_, field_constant, default_constant) in fields {
            self.emit_byte(field_constant);
            self.emit_byte(default_constant);
        }
        self.define_variable(name_constant);
        Ok(())
    }

    /// A field default: a number (optionally negated), string, boolean or
    /// `null` literal.
    fn field_default(&mut self) -> Result<Value> {
        self.advance()?;
        match self.parser.previous().kind {
            TokenKind::Number => Ok(Value::Number(self.number_value()?)),
            TokenKind::Minus if self.check(TokenKind::Number) => {
                self.advance()?;
                Ok(Value::Number(-self.number_value()?))
            }
            TokenKind::String => self.string_value(),
            TokenKind::True => Ok(Value::Bool(true)),
            TokenKind::False => Ok(Value::Bool(false)),
            TokenKind::Null => Ok(Value::Null),
            _ => Err(self.error_at_previous(CompileErrorKind::NonLiteralDefault)),
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self) -> Result<()> {
        if self.match_token(TokenKind::Print)? {
            self.print_statement()
        } else if self.match_token(TokenKind::If)? {
            self.if_statement()
        } else if self.match_token(TokenKind::Return)? {
            self.return_statement()
        } else if self.match_token(TokenKind::While)? {
            self.while_statement()
        } else if self.match_token(TokenKind::For)? {
            self.for_statement()
        } else if self.match_token(TokenKind::Break)? {
            self.loop_jump(OpCode::Break)
        } else if self.match_token(TokenKind::Continue)? {
            self.loop_jump(OpCode::Continue)
        } else if self.match_token(TokenKind::LeftBrace)? {
            self.begin_scope();
            self.block()?;
            self.end_scope();
            Ok(())
        } else {
            self.expression_statement()
        }
    }

    /// Declarations up to the closing `}`. The caller manages the scope.
    fn block(&mut self) -> Result<()> {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")
    }

    fn print_statement(&mut self) -> Result<()> {
        self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        self.emit_op(OpCode::Print);
        Ok(())
    }

    fn expression_statement(&mut self) -> Result<()> {
        self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        self.emit_op(OpCode::Pop);
        Ok(())
    }

    fn return_statement(&mut self) -> Result<()> {
        if self.state.kind == FunctionKind::Script {
            return Err(self.error_at_previous(CompileErrorKind::ReturnOutsideFunction));
        }

        if self.match_token(TokenKind::Semicolon)? {
            self.emit_return();
        } else {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
            self.emit_op(OpCode::Return);
        }
        Ok(())
    }

    fn if_statement(&mut self) -> Result<()> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement()?;

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump)?;
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else)? {
            self.statement()?;
        }
        self.patch_jump(else_jump)
    }

    fn while_statement(&mut self) -> Result<()> {
        let loop_start = self.chunk().current_offset();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);

        self.begin_loop(loop_start);
        self.statement()?;
        self.emit_loop(loop_start)?;

        self.patch_jump(exit_jump)?;
        self.emit_op(OpCode::Pop);
        self.end_loop()
    }

    fn for_statement(&mut self) -> Result<()> {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        if self.match_token(TokenKind::Semicolon)? {
            // No initializer.
        } else if self.match_token(TokenKind::Var)? {
            self.var_declaration()?;
        } else {
            self.expression_statement()?;
        }

        let mut loop_start = self.chunk().current_offset();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon)? {
            self.expression()?;
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenKind::RightParen)? {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk().current_offset();
            self.expression()?;
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

            self.emit_loop(loop_start)?;
            loop_start = increment_start;
            self.patch_jump(body_jump)?;
        }

        self.begin_loop(loop_start);
        self.statement()?;
        self.emit_loop(loop_start)?;

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump)?;
            self.emit_op(OpCode::Pop);
        }
        self.end_loop()?;
        self.end_scope();
        Ok(())
    }
}
