// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime values.
//!
//! `Value` is the tagged union the VM's stack holds. Heap objects sit behind
//! `Obj`, a closed enum over every object kind, so every use site matches
//! exhaustively instead of downcasting.

pub mod interner;
pub mod object;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub use interner::{Interner, intern, interned_count, lookup};
pub use object::{
    FieldMap, NativeFn, ObjClosure, ObjFunction, ObjInstance, ObjMap, ObjNative, ObjString,
    ObjStruct, ObjUpvalue, UpvalueRef,
};

/// A Kestrel value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Obj(Obj),
}

/// A reference to a heap object.
#[derive(Debug, Clone)]
pub enum Obj {
    String(Rc<ObjString>),
    Function(Rc<ObjFunction>),
    Closure(Rc<ObjClosure>),
    Upvalue(UpvalueRef),
    Native(Rc<ObjNative>),
    Struct(Rc<ObjStruct>),
    Instance(Rc<RefCell<ObjInstance>>),
    Array(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<ObjMap>>),
}

impl Value {
    /// An interned string value.
    pub fn string(s: &str) -> Self {
        Value::Obj(Obj::String(intern(s)))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Obj(Obj::Array(Rc::new(RefCell::new(items))))
    }

    pub fn map(entries: ObjMap) -> Self {
        Value::Obj(Obj::Map(Rc::new(RefCell::new(entries))))
    }

    pub fn instance(instance: ObjInstance) -> Self {
        Value::Obj(Obj::Instance(Rc::new(RefCell::new(instance))))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `null` and `false` are falsey; everything else is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&Rc<ObjString>> {
        match self {
            Value::Obj(Obj::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Obj(obj) => obj.type_name(),
        }
    }

    /// Primitive equality: `null == null`, bools and numbers by value,
    /// strings by contents. Any other pair of objects is unequal.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(Obj::String(a)), Value::Obj(Obj::String(b))) => {
                Rc::ptr_eq(a, b) || a == b
            }
            _ => false,
        }
    }

    /// Whether two values have the same runtime type.
    pub fn same_type(&self, other: &Value) -> bool {
        self.type_name() == other.type_name()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Rc<ObjString>> for Value {
    fn from(s: Rc<ObjString>) -> Self {
        Value::Obj(Obj::String(s))
    }
}

impl Obj {
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::String(_) => "string",
            Obj::Function(_) => "function",
            Obj::Closure(_) => "function",
            Obj::Upvalue(_) => "upvalue",
            Obj::Native(_) => "native",
            Obj::Struct(_) => "struct",
            Obj::Instance(_) => "instance",
            Obj::Array(_) => "array",
            Obj::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Obj(obj) => write!(f, "{}", obj),
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_obj(f, self, &mut Vec::new())
    }
}

/// Containers already being written, by address. A container reached again
/// while it is still open prints as `[...]`, `{...}` or `Name{...}`.
type Open = Vec<*const ()>;

fn write_obj(f: &mut fmt::Formatter<'_>, obj: &Obj, open: &mut Open) -> fmt::Result {
    match obj {
        Obj::String(s) => write!(f, "{}", s),
        Obj::Function(func) => write!(f, "{}", func),
        Obj::Closure(closure) => write!(f, "{}", closure.function),
        Obj::Upvalue(_) => write!(f, "upvalue"),
        Obj::Native(_) => write!(f, "<native fn>"),
        Obj::Struct(s) => write!(f, "<struct {}>", s.name),
        Obj::Instance(instance) => {
            let key = Rc::as_ptr(instance) as *const ();
            let instance = instance.borrow();
            if open.contains(&key) {
                return write!(f, "{}{{...}}", instance.template.name);
            }
            open.push(key);
            write!(f, "{}{{", instance.template.name)?;
            for (i, name) in instance.field_order().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let value = instance.get(name).cloned().unwrap_or_default();
                write!(f, "{}: ", name)?;
                write_nested(f, &value, open)?;
            }
            open.pop();
            write!(f, "}}")
        }
        Obj::Array(items) => {
            let key = Rc::as_ptr(items) as *const ();
            if open.contains(&key) {
                return write!(f, "[...]");
            }
            open.push(key);
            write!(f, "[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_nested(f, item, open)?;
            }
            open.pop();
            write!(f, "]")
        }
        Obj::Map(map) => {
            let key = Rc::as_ptr(map) as *const ();
            if open.contains(&key) {
                return write!(f, "{{...}}");
            }
            open.push(key);
            let map = map.borrow();
            let mut keys: Vec<&Rc<ObjString>> = map.keys().collect();
            keys.sort();
            write!(f, "{{")?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}: ", key.as_str())?;
                write_nested(f, &map[key], open)?;
            }
            open.pop();
            write!(f, "}}")
        }
    }
}

/// Strings inside containers print quoted so `["a"]` and `[a]` differ.
fn write_nested(f: &mut fmt::Formatter<'_>, value: &Value, open: &mut Open) -> fmt::Result {
    match value {
        Value::Obj(Obj::String(s)) => write!(f, "{:?}", s.as_str()),
        Value::Obj(obj) => write_obj(f, obj, open),
        other => write!(f, "{}", other),
    }
}
