// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode chunks.

use std::rc::Rc;

use thiserror::Error;

use crate::OpCode;
use crate::value::{Obj, Value};

/// Most constants a chunk can hold; indices are one byte.
pub const MAX_CONSTANTS: usize = 256;

/// Longest distance a 16-bit jump operand can encode.
pub const MAX_JUMP: usize = u16::MAX as usize;

/// A jump whose distance does not fit in its 16-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("jump of {0} bytes exceeds the 65535 byte limit")]
pub struct JumpTooLarge(pub usize);

/// A chunk of bytecode with its constant pool and line table.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// Opcodes and their operands.
    pub code: Vec<u8>,

    /// Source line for each byte in `code`. Same length as `code`.
    pub lines: Vec<u32>,

    /// Constant pool: literals, names, and nested functions.
    pub constants: Vec<Value>,
}

impl Chunk {
    /// Create a new empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte with its source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append an opcode with its source line.
    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Add a constant to the pool and return its index.
    ///
    /// Returns `None` if the pool already holds `MAX_CONSTANTS` entries.
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        // Check for existing constant to deduplicate
        if let Some(i) = self
            .constants
            .iter()
            .position(|existing| Self::constants_equal(existing, &value))
        {
            return Some(i as u8);
        }

        let idx = self.constants.len();
        if idx >= MAX_CONSTANTS {
            return None;
        }
        self.constants.push(value);
        Some(idx as u8)
    }

    /// Check if two constants are equal for deduplication purposes.
    /// Functions are never deduplicated.
    fn constants_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Obj(Obj::String(a)), Value::Obj(Obj::String(b))) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Get the current instruction offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a forward jump with a placeholder operand. Returns the offset of
    /// the operand for `patch_jump`.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        self.write(0xff, line);
        self.write(0xff, line);
        self.code.len() - 2
    }

    /// Patch the forward jump whose operand is at `operand` so that it lands
    /// on the current end of the chunk.
    pub fn patch_jump(&mut self, operand: usize) -> Result<(), JumpTooLarge> {
        let distance = self.code.len() - operand - 2;
        self.write_u16_at(operand, distance)
    }

    /// Emit a backward jump to `target`.
    pub fn emit_loop(&mut self, op: OpCode, target: usize, line: u32) -> Result<(), JumpTooLarge> {
        self.write_op(op, line);
        let distance = self.code.len() + 2 - target;
        let operand = self.code.len();
        self.write(0xff, line);
        self.write(0xff, line);
        self.write_u16_at(operand, distance)
    }

    /// Patch the backward jump whose operand is at `operand` so that it lands
    /// on `target`.
    pub fn patch_backward(&mut self, operand: usize, target: usize) -> Result<(), JumpTooLarge> {
        let distance = operand + 2 - target;
        self.write_u16_at(operand, distance)
    }

    fn write_u16_at(&mut self, operand: usize, distance: usize) -> Result<(), JumpTooLarge> {
        if distance > MAX_JUMP {
            return Err(JumpTooLarge(distance));
        }
        let [hi, lo] = (distance as u16).to_be_bytes();
        self.code[operand] = hi;
        self.code[operand + 1] = lo;
        Ok(())
    }

    /// Read a big-endian u16 operand.
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    /// Get the source line for the byte at the given offset.
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_lines_stay_parallel() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Null, 1);
        chunk.write_op(OpCode::Constant, 2);
        chunk.write(0, 2);
        let jump = chunk.emit_jump(OpCode::Jump, 3);
        chunk.patch_jump(jump).unwrap();
        assert_eq!(chunk.code.len(), chunk.lines.len());
        assert_eq!(chunk.line_at(3), Some(3));
    }

    #[test]
    fn constants_deduplicate_primitives_and_strings() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.5)).unwrap();
        let b = chunk.add_constant(Value::string("x")).unwrap();
        assert_eq!(chunk.add_constant(Value::Number(1.5)), Some(a));
        assert_eq!(chunk.add_constant(Value::string("x")), Some(b));
        assert_eq!(chunk.constants.len(), 2);
    }

    #[test]
    fn constant_pool_caps_at_256() {
        let mut chunk = Chunk::new();
        for i in 0..MAX_CONSTANTS {
            assert_eq!(chunk.add_constant(Value::Number(i as f64)), Some(i as u8));
        }
        assert_eq!(chunk.add_constant(Value::Number(-1.0)), None);
        // Existing constants are still reachable.
        assert_eq!(chunk.add_constant(Value::Number(7.0)), Some(7));
    }

    #[test]
    fn forward_jump_at_limit_patches() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..MAX_JUMP {
            chunk.write_op(OpCode::Pop, 1);
        }
        assert_eq!(chunk.patch_jump(jump), Ok(()));
        assert_eq!(chunk.read_u16(jump), Some(u16::MAX));
    }

    #[test]
    fn forward_jump_past_limit_fails() {
        let mut chunk = Chunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        for _ in 0..=MAX_JUMP {
            chunk.write_op(OpCode::Pop, 1);
        }
        assert_eq!(chunk.patch_jump(jump), Err(JumpTooLarge(MAX_JUMP + 1)));
    }

    #[test]
    fn backward_jump_distance() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Null, 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.emit_loop(OpCode::Loop, 0, 1).unwrap();
        // Operand ends at offset 5; jumping back 5 lands on offset 0.
        assert_eq!(chunk.read_u16(3), Some(5));
    }

    #[test]
    fn patched_backward_jump() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Null, 1);
        let operand = chunk.emit_jump(OpCode::Continue, 1);
        chunk.patch_backward(operand, 0).unwrap();
        // Operand ends at offset 4; jumping back 4 lands on offset 0.
        assert_eq!(chunk.read_u16(operand), Some(4));
    }
}
