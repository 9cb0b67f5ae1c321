// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Shared types for the bytecode compiler.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::chunk::Chunk;
use crate::value::{ObjFunction, ObjString};

/// What went wrong at one point in the source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    /// A lexical error reported by the scanner.
    #[error("{0}")]
    Lexical(String),
    /// A missing or unexpected token. Holds the full message.
    #[error("{0}")]
    Syntax(String),
    #[error("Expect expression.")]
    ExpectExpression,
    #[error("Too many constants in one chunk.")]
    TooManyConstants,
    #[error("Too many local variables in function.")]
    TooManyLocals,
    #[error("Too many closure variables in function.")]
    TooManyUpvalues,
    #[error("Can't have more than 255 parameters.")]
    TooManyParameters,
    #[error("Can't have more than 255 arguments.")]
    TooManyArguments,
    #[error("Can't have more than 255 elements in a literal.")]
    TooManyElements,
    #[error("Can't have more than 255 fields in a struct.")]
    TooManyFields,
    #[error("Too much code to jump over.")]
    JumpTooLarge,
    #[error("Loop body too large.")]
    LoopTooLarge,
    #[error("Duplicate {what} '{name}'.")]
    Duplicate { what: &'static str, name: String },
    #[error("Can't read local variable in its own initializer.")]
    OwnInitializer,
    #[error("Invalid assignment target.")]
    InvalidAssignmentTarget,
    #[error("Can't use '{0}' outside of a loop.")]
    OutsideLoop(&'static str),
    #[error("Can't return from top-level code.")]
    ReturnOutsideFunction,
    #[error("Can't mix positional and named arguments.")]
    MixedArguments,
    #[error("Force construction requires named fields.")]
    ForcePositional,
    #[error("Struct field default must be a number, string, boolean or null literal.")]
    NonLiteralDefault,
}

/// Where on its line an error was reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// At a token with this lexeme.
    Token(String),
    /// At the end of input.
    End,
    /// At a lexical error; the message already says where.
    Lexical,
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorLocation::Token(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::End => write!(f, " at end"),
            ErrorLocation::Lexical => Ok(()),
        }
    }
}

/// One compile diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error{location}: {kind}")]
pub struct CompileError {
    pub line: u32,
    pub location: ErrorLocation,
    pub kind: CompileErrorKind,
}

/// Compilation finished with at least one error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("compilation failed with {} error(s)", .errors.len())]
pub struct CompileFailed {
    pub errors: Vec<CompileError>,
}

impl CompileFailed {
    /// Every diagnostic, one per line.
    pub fn report(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any diagnostic is of the given kind.
    pub fn has(&self, kind: &CompileErrorKind) -> bool {
        self.errors.iter().any(|e| &e.kind == kind)
    }
}

/// Result type for compiling one construct. Errors unwind to the enclosing
/// declaration, which records them and resynchronises.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Local variable during compilation.
#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    /// Scope depth, or `None` while the initializer is being compiled.
    pub depth: Option<usize>,
    pub is_captured: bool,
}

/// Information about an upvalue (captured variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upvalue {
    /// Index in parent's locals (is_local=true) or parent's upvalues (is_local=false)
    pub index: u8,
    /// True if capturing from parent's locals, false if from parent's upvalues
    pub is_local: bool,
}

/// Loop context for compiling break/continue.
#[derive(Debug, Clone)]
pub struct LoopContext {
    /// Where `continue` lands: the condition, or the increment clause of a
    /// `for` loop once it has been compiled.
    pub continue_target: usize,
    /// Scope depth outside the loop body. Locals deeper than this are
    /// discarded before jumping out.
    pub scope_depth: usize,
    /// Operand offsets of `break` jumps, patched to the loop exit.
    pub break_patches: Vec<usize>,
    /// Operand offsets of `continue` jumps, patched to `continue_target`.
    pub continue_patches: Vec<usize>,
}

/// What kind of function a compile frame produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Script,
    Function,
}

/// Per-function compile state. One exists for each function literal being
/// compiled; enclosing frames are kept by the compiler in a stack.
#[derive(Debug)]
pub struct FunctionState {
    pub kind: FunctionKind,
    pub name: Option<Rc<ObjString>>,
    pub arity: u8,
    pub chunk: Chunk,
    pub locals: Vec<Local>,
    pub upvalues: Vec<Upvalue>,
    pub scope_depth: usize,
    pub loops: Vec<LoopContext>,
}

impl FunctionState {
    pub fn new(kind: FunctionKind, name: Option<Rc<ObjString>>) -> Self {
        // Slot 0 holds the callee itself and is not nameable.
        let callee = Local {
            name: String::new(),
            depth: Some(0),
            is_captured: false,
        };
        Self {
            kind,
            name,
            arity: 0,
            chunk: Chunk::new(),
            locals: vec![callee],
            upvalues: Vec::new(),
            scope_depth: 0,
            loops: Vec::new(),
        }
    }

    /// Consume the state into a finished function and its capture list.
    pub fn finish(self) -> (ObjFunction, Vec<Upvalue>) {
        let function = ObjFunction {
            name: self.name,
            arity: self.arity,
            upvalue_count: self.upvalues.len(),
            chunk: self.chunk,
        };
        (function, self.upvalues)
    }
}
