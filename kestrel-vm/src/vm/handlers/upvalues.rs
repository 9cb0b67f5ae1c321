// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Upvalue opcode handlers and the open-upvalue list.
//!
//! An open upvalue names an absolute stack slot. `open_upvalues` is kept
//! sorted by slot so closing everything at or above a slot only touches the
//! tail of the list.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{ObjUpvalue, UpvalueRef, Value};
use crate::vm::{Result, RuntimeError, VM};

impl VM {
    /// Execute an upvalue opcode.
    pub(crate) fn execute_upvalues(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::GetUpvalue => {
                let upvalue = self.current_upvalue()?;
                let value = match &*upvalue.borrow() {
                    ObjUpvalue::Open(slot) => self.stack.get(*slot)?,
                    ObjUpvalue::Closed(value) => value.clone(),
                };
                self.stack.push(value)
            }
            OpCode::SetUpvalue => {
                let upvalue = self.current_upvalue()?;
                let value = self.stack.peek(0)?.clone();
                let mut cell = upvalue.borrow_mut();
                match &mut *cell {
                    ObjUpvalue::Open(slot) => self.stack.set(*slot, value),
                    ObjUpvalue::Closed(closed) => {
                        *closed = value;
                        Ok(())
                    }
                }
            }
            OpCode::CloseUpvalue => {
                let top = self.stack.len().checked_sub(1).ok_or(RuntimeError::StackUnderflow)?;
                self.close_upvalues(top)?;
                self.stack.pop()?;
                Ok(())
            }
            _ => Err(RuntimeError::Internal(format!(
                "execute_upvalues: unexpected opcode {:?}",
                op
            ))),
        }
    }

    fn current_upvalue(&mut self) -> Result<UpvalueRef> {
        let index = self.read_byte()? as usize;
        self.frame()?
            .closure
            .upvalues
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal("upvalue index out of bounds".into()))
    }

    /// Find or create the open upvalue for `slot`. Closures capturing the
    /// same slot share one upvalue.
    pub(crate) fn capture_upvalue(&mut self, slot: usize) -> UpvalueRef {
        let position = self
            .open_upvalues
            .partition_point(|upvalue| upvalue.borrow().open_slot().is_some_and(|s| s < slot));
        if let Some(existing) = self.open_upvalues.get(position)
            && existing.borrow().open_slot() == Some(slot)
        {
            return Rc::clone(existing);
        }
        let created = ObjUpvalue::new_ref(slot);
        self.open_upvalues.insert(position, Rc::clone(&created));
        created
    }

    /// Close every open upvalue aliasing `from` or any slot above it.
    pub(crate) fn close_upvalues(&mut self, from: usize) -> Result<()> {
        while let Some(upvalue) = self.open_upvalues.last() {
            let slot = upvalue.borrow().open_slot();
            match slot {
                Some(slot) if slot >= from => {
                    let value: Value = self.stack.get(slot)?;
                    *upvalue.borrow_mut() = ObjUpvalue::Closed(value);
                }
                Some(_) => break,
                None => {}
            }
            self.open_upvalues.pop();
        }
        Ok(())
    }
}
