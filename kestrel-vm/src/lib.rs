// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and stack-based virtual machine for Kestrel.
//!
//! Source text is scanned by `kestrel-parser`, compiled in a single pass to
//! bytecode `Chunk`s, and executed by the `VM`. Embedders can install
//! natives and read or write globals between runs.
//!
//! ```no_run
//! use kestrel_vm::{InterpretResult, VM};
//!
//! let mut vm = VM::new();
//! assert_eq!(vm.interpret_source("print 1 + 2;"), InterpretResult::Ok);
//! ```

pub mod chunk;
pub mod compiler;
pub mod config;
pub mod natives;
pub mod opcode;
pub mod value;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::{CompileError, CompileErrorKind, CompileFailed, compile, compile_source};
pub use config::VmConfig;
pub use opcode::OpCode;
pub use value::{NativeFn, Obj, Value};
pub use vm::{InterpretResult, RuntimeError, RuntimeFailure, TraceFrame, VM};
