// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Struct opcode handlers: Struct, Construct, GetProperty, SetProperty.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{Obj, ObjInstance, ObjStruct, Value};
use crate::vm::{Result, RuntimeError, VM};

impl VM {
    /// Execute a struct or property opcode.
    pub(crate) fn execute_structs(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::Struct => self.declare_struct(),
            OpCode::Construct => self.construct_named(),
            OpCode::GetProperty => self.get_property(),
            OpCode::SetProperty => self.set_property(),
            _ => Err(RuntimeError::Internal(format!(
                "execute_structs: unexpected opcode {:?}",
                op
            ))),
        }
    }

    fn declare_struct(&mut self) -> Result<()> {
        let name = self.read_string()?;
        let count = self.read_byte()? as usize;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let field = self.read_string()?;
            let default = self.read_constant()?;
            fields.push((field, default));
        }
        let template = ObjStruct { name, fields };
        self.stack.push(Value::Obj(Obj::Struct(Rc::new(template))))
    }

    /// `S(name: value, ...)` and `S!(name: value, ...)`. The stack holds the
    /// callee followed by `count` name/value pairs.
    fn construct_named(&mut self) -> Result<()> {
        let count = self.read_byte()? as usize;
        let forced = self.read_byte()? != 0;

        let pairs = self.stack.pop_n(count * 2)?;
        let template = match self.stack.pop()? {
            Value::Obj(Obj::Struct(template)) => template,
            other => return Err(RuntimeError::ConstructNonStruct(other.type_name())),
        };

        let mut instance = ObjInstance::from_defaults(Rc::clone(&template), forced);
        for pair in pairs.chunks_exact(2) {
            let [name, value] = pair else {
                continue;
            };
            let name = name.as_string().ok_or_else(|| {
                RuntimeError::Internal("construct field name is not a string".into())
            })?;
            if !forced && !template.has_field(name) {
                return Err(RuntimeError::UnknownField {
                    name: template.name.to_string(),
                    field: name.to_string(),
                });
            }
            instance.fields.insert(Rc::clone(name), value.clone());
        }
        self.stack.push(Value::instance(instance))
    }

    fn get_property(&mut self) -> Result<()> {
        let name = self.read_string()?;
        let target = self.stack.pop()?;
        let Value::Obj(Obj::Instance(instance)) = &target else {
            return Err(RuntimeError::NotAnInstance(target.type_name()));
        };
        let instance = instance.borrow();
        let value = instance
            .get(&name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownField {
                name: instance.template.name.to_string(),
                field: name.to_string(),
            })?;
        self.stack.push(value)
    }

    /// `instance.field = value`. Undeclared fields may only be added to
    /// forced instances.
    fn set_property(&mut self) -> Result<()> {
        let name = self.read_string()?;
        let value = self.stack.pop()?;
        let target = self.stack.pop()?;
        let Value::Obj(Obj::Instance(instance)) = &target else {
            return Err(RuntimeError::NotAnInstance(target.type_name()));
        };
        {
            let mut instance = instance.borrow_mut();
            if !instance.forced && !instance.template.has_field(&name) {
                return Err(RuntimeError::UnknownField {
                    name: instance.template.name.to_string(),
                    field: name.to_string(),
                });
            }
            instance.fields.insert(name, value.clone());
        }
        self.stack.push(value)
    }
}
