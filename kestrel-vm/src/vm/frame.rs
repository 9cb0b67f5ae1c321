// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames for the VM.

use std::rc::Rc;

use crate::chunk::Chunk;
use crate::value::ObjClosure;

/// A call frame on the VM's call stack.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// The closure being executed.
    pub closure: Rc<ObjClosure>,

    /// Instruction pointer (index into the closure's chunk code).
    pub ip: usize,

    /// Stack base: slot 0 of this call, which holds the callee.
    pub base: usize,
}

impl CallFrame {
    pub fn new(closure: Rc<ObjClosure>, base: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base,
        }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.closure.function.chunk
    }

    /// Source line of the instruction most recently read.
    pub fn line(&self) -> u32 {
        self.chunk()
            .line_at(self.ip.saturating_sub(1))
            .unwrap_or_default()
    }
}
