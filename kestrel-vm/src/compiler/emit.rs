// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode emission helpers.
//!
//! Every byte is tagged with the line of the token most recently consumed.

use crate::chunk::Chunk;
use crate::opcode::OpCode;
use crate::value::Value;

use super::codegen::Compiler;
use super::types::{CompileErrorKind, Result};

impl Compiler {
    pub(super) fn chunk(&mut self) -> &mut Chunk {
        &mut self.state.chunk
    }

    fn line(&self) -> u32 {
        self.parser.previous().line
    }

    pub(super) fn emit_byte(&mut self, byte: u8) {
        let line = self.line();
        self.chunk().write(byte, line);
    }

    pub(super) fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op.into());
    }

    pub(super) fn emit_ops(&mut self, a: OpCode, b: OpCode) {
        self.emit_op(a);
        self.emit_op(b);
    }

    pub(super) fn emit_op_arg(&mut self, op: OpCode, arg: u8) {
        self.emit_op(op);
        self.emit_byte(arg);
    }

    /// Add a value to the constant pool.
    pub(super) fn make_constant(&mut self, value: Value) -> Result<u8> {
        match self.chunk().add_constant(value) {
            Some(index) => Ok(index),
            None => Err(self.error_at_previous(CompileErrorKind::TooManyConstants)),
        }
    }

    pub(super) fn emit_constant(&mut self, value: Value) -> Result<()> {
        let index = self.make_constant(value)?;
        self.emit_op_arg(OpCode::Constant, index);
        Ok(())
    }

    /// Pool an identifier's name as an interned string.
    pub(super) fn identifier_constant(&mut self, name: &str) -> Result<u8> {
        self.make_constant(Value::string(name))
    }

    /// Emit a forward jump and return its operand offset for patching.
    pub(super) fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.line();
        self.chunk().emit_jump(op, line)
    }

    pub(super) fn patch_jump(&mut self, operand: usize) -> Result<()> {
        self.chunk()
            .patch_jump(operand)
            .map_err(|_| self.error_at_previous(CompileErrorKind::JumpTooLarge))
    }

    /// Emit a `Loop` back to `target`.
    pub(super) fn emit_loop(&mut self, target: usize) -> Result<()> {
        let line = self.line();
        self.chunk()
            .emit_loop(OpCode::Loop, target, line)
            .map_err(|_| self.error_at_previous(CompileErrorKind::LoopTooLarge))
    }

    /// Implicit `return null`.
    pub(super) fn emit_return(&mut self) {
        self.emit_ops(OpCode::Null, OpCode::Return);
    }
}
