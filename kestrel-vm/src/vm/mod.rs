// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Stack-based virtual machine for executing Kestrel bytecode.

pub mod error;
pub mod frame;
pub mod handlers;
pub mod stack;

use std::io::{self, Write};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::compiler;
use crate::config::VmConfig;
use crate::natives;
use crate::opcode::OpCode;
use crate::value::{
    NativeFn, Obj, ObjClosure, ObjFunction, ObjNative, ObjString, UpvalueRef, Value, intern, lookup,
};

pub use error::{Result, RuntimeError, RuntimeFailure, TraceFrame};
pub use frame::CallFrame;
pub use handlers::control::ControlFlow;
pub use stack::ValueStack;

/// Outcome of running a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// The Kestrel virtual machine.
pub struct VM {
    config: VmConfig,

    /// Value stack.
    stack: ValueStack,

    /// Call frame stack.
    frames: Vec<CallFrame>,

    /// Global variables, keyed by interned name.
    globals: FxHashMap<Rc<ObjString>, Value>,

    /// Upvalues still aliasing live stack slots, ordered by slot.
    open_upvalues: Vec<UpvalueRef>,

    /// The most recent runtime failure, kept for embedders.
    last_failure: Option<RuntimeFailure>,

    out: Box<dyn Write>,
    err: Box<dyn Write>,
}

impl VM {
    /// Create a VM with default limits and the standard natives.
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// Create a VM with the given limits and the standard natives.
    pub fn with_config(config: VmConfig) -> Self {
        let mut vm = Self {
            stack: ValueStack::new(config.stack_max),
            frames: Vec::with_capacity(config.frames_max),
            config,
            globals: FxHashMap::default(),
            open_upvalues: Vec::new(),
            last_failure: None,
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
        };
        natives::install(&mut vm);
        vm
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Redirect `print` output.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Redirect diagnostics: compile errors and runtime backtraces.
    pub fn set_error_output(&mut self, err: Box<dyn Write>) {
        self.err = err;
    }

    /// Look up a global by name.
    pub fn global(&self, name: &str) -> Option<Value> {
        let name = lookup(name)?;
        self.globals.get(&name).cloned()
    }

    /// Define or overwrite a global.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(intern(name), value);
    }

    /// Install a host function as a global. `arity: None` accepts any
    /// number of arguments.
    pub fn define_native(&mut self, name: &str, arity: Option<u8>, function: NativeFn) {
        let name = intern(name);
        let native = ObjNative {
            name: Rc::clone(&name),
            arity,
            function,
        };
        self.globals
            .insert(name, Value::Obj(Obj::Native(Rc::new(native))));
    }

    /// The runtime failure from the most recent `interpret`, if it failed.
    pub fn last_failure(&self) -> Option<&RuntimeFailure> {
        self.last_failure.as_ref()
    }

    /// Number of values currently on the stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Compile and run source text. Compile diagnostics go to the error
    /// output.
    pub fn interpret_source(&mut self, source: &str) -> InterpretResult {
        match compiler::compile_source(source) {
            Ok(function) => self.interpret(function),
            Err(failed) => {
                for error in &failed.errors {
                    let _ = writeln!(self.err, "{}", error);
                }
                InterpretResult::CompileError
            }
        }
    }

    /// Run a compiled script.
    ///
    /// The function is wrapped in a closure and called with no arguments as
    /// the outermost frame. Globals persist across calls.
    pub fn interpret(&mut self, function: Rc<ObjFunction>) -> InterpretResult {
        debug!(function = function.name_str(), "interpret start");
        self.reset_stack();
        self.last_failure = None;

        match self.start(function) {
            Ok(()) => {
                debug!("interpret finished");
                InterpretResult::Ok
            }
            Err(error) => {
                debug!(%error, depth = self.frames.len(), "runtime error");
                let failure = RuntimeFailure {
                    error,
                    backtrace: self.backtrace(),
                };
                let _ = writeln!(self.err, "{}", failure.report());
                let _ = self.err.flush();
                self.last_failure = Some(failure);
                self.reset_stack();
                InterpretResult::RuntimeError
            }
        }
    }

    fn start(&mut self, function: Rc<ObjFunction>) -> Result<()> {
        let closure = Rc::new(ObjClosure::new(function, Vec::new()));
        self.stack
            .push(Value::Obj(Obj::Closure(Rc::clone(&closure))))?;
        self.call_closure(closure, 0)?;
        self.run()
    }

    /// Drop every frame and value. Upvalues still open are closed first so
    /// closures that escaped into globals keep the values they captured.
    fn reset_stack(&mut self) {
        if let Err(error) = self.close_upvalues(0) {
            debug!(%error, "closing upvalues during reset");
            self.open_upvalues.clear();
        }
        self.stack.truncate(0);
        self.frames.clear();
    }

    fn backtrace(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .rev()
            .map(|frame| TraceFrame {
                line: frame.line(),
                function: frame
                    .closure
                    .function
                    .name
                    .as_ref()
                    .map(|name| name.to_string()),
            })
            .collect()
    }

    fn run(&mut self) -> Result<()> {
        loop {
            let op = self.read_op()?;

            match op {
                // Constants & Stack - handled inline (simple operations)
                OpCode::Constant => {
                    let value = self.read_constant()?;
                    self.stack.push(value)?;
                }
                OpCode::Null => self.stack.push(Value::Null)?,
                OpCode::True => self.stack.push(Value::Bool(true))?,
                OpCode::False => self.stack.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.stack.pop()?;
                }
                OpCode::Equal => {
                    let b = self.stack.pop()?;
                    let a = self.stack.pop()?;
                    self.stack.push(Value::Bool(a.equals(&b)))?;
                }
                OpCode::Print => {
                    let value = self.stack.pop()?;
                    writeln!(self.out, "{}", value)
                        .map_err(|e| RuntimeError::Output(e.to_string()))?;
                }

                // Variables - delegated to handler
                OpCode::GetLocal
                | OpCode::SetLocal
                | OpCode::GetGlobal
                | OpCode::DefineGlobal
                | OpCode::SetGlobal => self.execute_variables(op)?,

                // Upvalues - delegated to handler
                OpCode::GetUpvalue | OpCode::SetUpvalue | OpCode::CloseUpvalue => {
                    self.execute_upvalues(op)?
                }

                // Structs and instances - delegated to handler
                OpCode::Struct
                | OpCode::Construct
                | OpCode::GetProperty
                | OpCode::SetProperty => self.execute_structs(op)?,

                // Arithmetic and comparison - delegated to handler
                OpCode::Greater
                | OpCode::Less
                | OpCode::Add
                | OpCode::Subtract
                | OpCode::Multiply
                | OpCode::Divide
                | OpCode::Modulo
                | OpCode::Not
                | OpCode::Negate => self.execute_arithmetic(op)?,

                // Control flow - delegated to handler
                OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::Loop
                | OpCode::Break
                | OpCode::Continue
                | OpCode::Call
                | OpCode::Closure
                | OpCode::Return => match self.execute_control(op)? {
                    ControlFlow::Continue => {}
                    ControlFlow::Halt => {
                        let _ = self.out.flush();
                        return Ok(());
                    }
                },

                // Collection operations - delegated to handler
                OpCode::Array
                | OpCode::Map
                | OpCode::ArrayGet
                | OpCode::ArraySet
                | OpCode::ArraySlice => self.execute_collections(op)?,
            }
        }
    }

    pub(crate) fn frame(&self) -> Result<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::Internal("no active frame".into()))
    }

    pub(crate) fn frame_mut(&mut self) -> Result<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| RuntimeError::Internal("no active frame".into()))
    }

    pub(crate) fn read_byte(&mut self) -> Result<u8> {
        let frame = self.frame_mut()?;
        let byte = frame
            .chunk()
            .code
            .get(frame.ip)
            .copied()
            .ok_or_else(|| RuntimeError::Internal("instruction pointer out of bounds".into()))?;
        frame.ip += 1;
        Ok(byte)
    }

    fn read_op(&mut self) -> Result<OpCode> {
        if self.config.trace_execution
            && let Ok(frame) = self.frame()
        {
            let ip = frame.ip;
            let code = &frame.chunk().code;
            let op = code.get(ip).copied().and_then(OpCode::from_byte);
            let width = op.map_or(0, OpCode::operand_bytes);
            let operands = code.get(ip + 1..ip + 1 + width).unwrap_or_default();
            trace!(ip, ?op, ?operands, depth = self.stack.len(), "execute");
        }
        let byte = self.read_byte()?;
        OpCode::from_byte(byte)
            .ok_or_else(|| RuntimeError::Internal(format!("unknown opcode {}", byte)))
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let hi = self.read_byte()?;
        let lo = self.read_byte()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    pub(crate) fn read_constant(&mut self) -> Result<Value> {
        let index = self.read_byte()? as usize;
        self.frame()?
            .chunk()
            .constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal("constant index out of bounds".into()))
    }

    pub(crate) fn read_string(&mut self) -> Result<Rc<ObjString>> {
        match self.read_constant()? {
            Value::Obj(Obj::String(s)) => Ok(s),
            other => Err(RuntimeError::Internal(format!(
                "expected a name constant, found {}",
                other.type_name()
            ))),
        }
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_round_trip_through_the_embedding_api() {
        let mut vm = VM::new();
        vm.set_output(Box::new(io::sink()));
        vm.set_global("answer", Value::Number(41.0));
        assert_eq!(
            vm.interpret_source("answer = answer + 1;"),
            InterpretResult::Ok
        );
        assert_eq!(vm.global("answer"), Some(Value::Number(42.0)));
        assert_eq!(vm.global("missing"), None);
    }

    #[test]
    fn runtime_failure_is_kept_and_stack_reset() {
        let mut vm = VM::new();
        vm.set_error_output(Box::new(io::sink()));
        assert_eq!(
            vm.interpret_source("fun f() { return 1 / 0; }\nf();"),
            InterpretResult::RuntimeError
        );
        let failure = vm.last_failure().unwrap();
        assert_eq!(failure.error, RuntimeError::DivisionByZero);
        assert_eq!(failure.backtrace.len(), 2);
        assert_eq!(failure.backtrace[0].function.as_deref(), Some("f"));
        assert_eq!(failure.backtrace[1].line, 2);
        assert_eq!(vm.stack_depth(), 0);
    }

    #[test]
    fn frame_limit_is_configurable() {
        let mut vm = VM::with_config(VmConfig::default().with_frames_max(8));
        vm.set_error_output(Box::new(io::sink()));
        let result = vm.interpret_source("fun r(n) { return r(n + 1); } r(0);");
        assert_eq!(result, InterpretResult::RuntimeError);
        let failure = vm.last_failure().unwrap();
        assert_eq!(failure.error, RuntimeError::StackOverflow);
        assert_eq!(failure.backtrace.len(), 8);
    }

    #[test]
    fn tracing_does_not_change_results() {
        let mut vm = VM::with_config(VmConfig::default().with_trace_execution(true));
        vm.set_output(Box::new(io::sink()));
        assert_eq!(
            vm.interpret_source("var t = 0; for (var i = 0; i < 4; i = i + 1) t = t + i;"),
            InterpretResult::Ok
        );
        assert_eq!(vm.global("t"), Some(Value::Number(6.0)));
    }
}
