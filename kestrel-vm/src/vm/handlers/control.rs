// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow opcode handlers: jumps, Call, Closure, Return.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{Obj, ObjClosure, ObjInstance, ObjStruct, Value};
use crate::vm::frame::CallFrame;
use crate::vm::{Result, RuntimeError, VM};

/// What the dispatch loop should do after a control flow instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Keep executing.
    Continue,
    /// The outermost frame returned.
    Halt,
}

impl VM {
    /// Execute a control flow opcode.
    pub(crate) fn execute_control(&mut self, op: OpCode) -> Result<ControlFlow> {
        match op {
            OpCode::Jump | OpCode::Break => {
                let offset = self.read_u16()?;
                self.jump_forward(offset)?;
            }
            OpCode::JumpIfFalse => {
                let offset = self.read_u16()?;
                if self.stack.peek(0)?.is_falsey() {
                    self.jump_forward(offset)?;
                }
            }
            OpCode::Loop | OpCode::Continue => {
                let offset = self.read_u16()?;
                self.jump_backward(offset)?;
            }
            OpCode::Call => {
                let argc = self.read_byte()? as usize;
                let callee = self.stack.peek(argc)?.clone();
                self.call_value(callee, argc)?;
            }
            OpCode::Closure => self.make_closure()?,
            OpCode::Return => return self.return_from_frame(),
            _ => {
                return Err(RuntimeError::Internal(format!(
                    "execute_control: unexpected opcode {:?}",
                    op
                )));
            }
        }
        Ok(ControlFlow::Continue)
    }

    fn jump_forward(&mut self, offset: u16) -> Result<()> {
        self.frame_mut()?.ip += offset as usize;
        Ok(())
    }

    fn jump_backward(&mut self, offset: u16) -> Result<()> {
        let frame = self.frame_mut()?;
        frame.ip = frame.ip.checked_sub(offset as usize).ok_or_else(|| {
            RuntimeError::Internal("backward jump before start of chunk".into())
        })?;
        Ok(())
    }

    /// Call `callee`, which sits below `argc` arguments on the stack.
    pub(crate) fn call_value(&mut self, callee: Value, argc: usize) -> Result<()> {
        match callee {
            Value::Obj(Obj::Closure(closure)) => self.call_closure(closure, argc),
            Value::Obj(Obj::Native(native)) => {
                if let Some(arity) = native.arity
                    && arity as usize != argc
                {
                    return Err(RuntimeError::Arity {
                        expected: arity as usize,
                        got: argc,
                    });
                }
                let args = self.stack.top(argc)?;
                let result = (native.function)(argc, args);
                self.stack.truncate(self.stack.len() - argc - 1);
                self.stack.push(result)
            }
            Value::Obj(Obj::Struct(template)) => self.construct_positional(template, argc),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    /// Push a frame for `closure`. The callee and its arguments are already
    /// on the stack.
    pub(crate) fn call_closure(&mut self, closure: Rc<ObjClosure>, argc: usize) -> Result<()> {
        let arity = closure.function.arity as usize;
        if argc != arity {
            return Err(RuntimeError::Arity {
                expected: arity,
                got: argc,
            });
        }
        if self.frames.len() >= self.config.frames_max {
            return Err(RuntimeError::StackOverflow);
        }
        let base = self.stack.len() - argc - 1;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    /// `S(a, b, ...)`: defaults overridden positionally in declaration order.
    fn construct_positional(&mut self, template: Rc<ObjStruct>, argc: usize) -> Result<()> {
        if argc > template.fields.len() {
            return Err(RuntimeError::StructArity {
                name: template.name.to_string(),
                fields: template.fields.len(),
                got: argc,
            });
        }
        let args = self.stack.pop_n(argc)?;
        self.stack.pop()?;

        let mut instance = ObjInstance::from_defaults(Rc::clone(&template), false);
        for ((name, _), value) in template.fields.iter().zip(args) {
            instance.fields.insert(Rc::clone(name), value);
        }
        self.stack.push(Value::instance(instance))
    }

    /// `Closure`: bind each capture descriptor to an upvalue.
    fn make_closure(&mut self) -> Result<()> {
        let function = match self.read_constant()? {
            Value::Obj(Obj::Function(function)) => function,
            other => {
                return Err(RuntimeError::Internal(format!(
                    "Closure operand is a {}, not a function",
                    other.type_name()
                )));
            }
        };

        let mut upvalues = Vec::with_capacity(function.upvalue_count);
        for _ in 0..function.upvalue_count {
            let is_local = self.read_byte()? != 0;
            let index = self.read_byte()? as usize;
            let upvalue = if is_local {
                let slot = self.frame()?.base + index;
                self.capture_upvalue(slot)
            } else {
                self.frame()?
                    .closure
                    .upvalues
                    .get(index)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Internal("upvalue index out of bounds".into()))?
            };
            upvalues.push(upvalue);
        }

        let closure = ObjClosure::new(function, upvalues);
        self.stack.push(Value::Obj(Obj::Closure(Rc::new(closure))))
    }

    fn return_from_frame(&mut self) -> Result<ControlFlow> {
        let result = self.stack.pop()?;
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| RuntimeError::Internal("return with no active frame".into()))?;
        self.close_upvalues(frame.base)?;
        self.stack.truncate(frame.base);

        if self.frames.is_empty() {
            return Ok(ControlFlow::Halt);
        }
        self.stack.push(result)?;
        Ok(ControlFlow::Continue)
    }
}
