// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: transforms Kestrel tokens to bytecode.
//!
//! A single pass drives a Pratt expression parser and emits code directly
//! into the chunk of the function being compiled. Each nested function
//! literal gets its own compile frame; variables resolve to locals, then to
//! upvalues captured from enclosing frames, then to late-bound globals.

pub mod codegen;
pub mod emit;
pub mod expr;
pub mod parser;
pub mod rules;
pub mod scope;
pub mod types;

use std::rc::Rc;

use kestrel_parser::Token;

use crate::value::ObjFunction;

pub use codegen::Compiler;
pub use types::{
    CompileError, CompileErrorKind, CompileFailed, ErrorLocation, FunctionKind, Local,
    LoopContext, Upvalue,
};

/// Compile a token sequence into the top-level script function.
///
/// Every diagnostic found is collected; compilation only fails once the
/// whole input has been seen.
pub fn compile(tokens: &[Token]) -> Result<Rc<ObjFunction>, CompileFailed> {
    Compiler::new(tokens.to_vec()).compile()
}

/// Scan and compile source text.
pub fn compile_source(source: &str) -> Result<Rc<ObjFunction>, CompileFailed> {
    Compiler::new(kestrel_parser::tokenize(source)).compile()
}
