// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime errors for the VM.

use std::fmt;

use thiserror::Error;

/// Runtime error during VM execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Stack overflow.")]
    StackOverflow,

    #[error("Stack underflow.")]
    StackUnderflow,

    #[error("Expected {expected} arguments but got {got}.")]
    Arity { expected: usize, got: usize },

    #[error("Struct {name} has {fields} fields but got {got} arguments.")]
    StructArity {
        name: String,
        fields: usize,
        got: usize,
    },

    #[error("Can only call functions and structs.")]
    NotCallable,

    #[error("Named arguments require a struct, got {0}.")]
    ConstructNonStruct(&'static str),

    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Undefined field '{field}' on {name}.")]
    UnknownField { name: String, field: String },

    #[error("Only instances have fields, got {0}.")]
    NotAnInstance(&'static str),

    #[error("Operand must be a number.")]
    NegateOperand,

    #[error("Operands must be two numbers or two strings.")]
    ComparisonOperands,

    #[error("Unsupported operand types for '{op}': {left} and {right}.")]
    OperandTypes {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Division by zero.")]
    DivisionByZero,

    #[error("Modulo by zero.")]
    ModuloByZero,

    #[error("Can't combine instances of {left} and {right}.")]
    TemplateMismatch { left: String, right: String },

    #[error("Field '{field}' has mismatched types: {left} and {right}.")]
    FieldTypeMismatch {
        field: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("Operator '{op}' requires numeric elements, got {left} and {right}.")]
    NonNumericElements {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("Operands for '{0}' are nested too deeply.")]
    NestingTooDeep(&'static str),

    #[error("Index must be an integer, got {0}.")]
    IndexType(String),

    #[error("Index {index} out of bounds for length {len}.")]
    IndexOutOfBounds { index: f64, len: usize },

    #[error("Map keys must be strings, got {0}.")]
    MapKey(&'static str),

    #[error("Can't index {0}.")]
    NotIndexable(&'static str),

    #[error("Can't assign by index into {0}.")]
    NotIndexAssignable(&'static str),

    #[error("Can't slice {0}.")]
    NotSliceable(&'static str),

    #[error("Slice bounds must be numbers, got {0}.")]
    SliceBound(&'static str),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// One line of a runtime backtrace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub line: u32,
    /// `None` for top-level script code.
    pub function: Option<String>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(name) => write!(f, "[line {}] in {}()", self.line, name),
            None => write!(f, "[line {}] in script", self.line),
        }
    }
}

/// A runtime error together with the call stack at the point it was raised,
/// innermost frame first.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct RuntimeFailure {
    #[source]
    pub error: RuntimeError,
    pub backtrace: Vec<TraceFrame>,
}

impl RuntimeFailure {
    /// The message followed by one backtrace line per frame.
    pub fn report(&self) -> String {
        let mut out = self.error.to_string();
        for frame in &self.backtrace {
            out.push('\n');
            out.push_str(&frame.to_string());
        }
        out
    }
}
