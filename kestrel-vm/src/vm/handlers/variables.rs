// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Variable opcode handlers: GetLocal, SetLocal, GetGlobal, DefineGlobal, SetGlobal.

use crate::opcode::OpCode;
use crate::vm::{Result, RuntimeError, VM};

impl VM {
    /// Execute a variable opcode.
    pub(crate) fn execute_variables(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::GetLocal => {
                let slot = self.read_byte()? as usize;
                let base = self.frame()?.base;
                let value = self.stack.get(base + slot)?;
                self.stack.push(value)?;
            }
            OpCode::SetLocal => {
                let slot = self.read_byte()? as usize;
                let base = self.frame()?.base;
                // Assignment is an expression; the value stays on the stack.
                let value = self.stack.peek(0)?.clone();
                self.stack.set(base + slot, value)?;
            }
            OpCode::GetGlobal => {
                let name = self.read_string()?;
                let value = self
                    .globals
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?;
                self.stack.push(value)?;
            }
            OpCode::DefineGlobal => {
                let name = self.read_string()?;
                let value = self.stack.pop()?;
                self.globals.insert(name, value);
            }
            OpCode::SetGlobal => {
                let name = self.read_string()?;
                let value = self.stack.peek(0)?.clone();
                match self.globals.get_mut(&name) {
                    Some(slot) => *slot = value,
                    None => return Err(RuntimeError::UndefinedVariable(name.to_string())),
                }
            }
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_variables: unexpected opcode {:?}",
                    op
                )));
            }
        }
        Ok(())
    }
}
