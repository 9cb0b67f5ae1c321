// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Heap object variants.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::Value;
use crate::chunk::Chunk;

/// An immutable string. Build these with `interner::intern`; constructing
/// one directly bypasses interning.
#[derive(Debug, Clone)]
pub struct ObjString {
    hash: u32,
    chars: Box<str>,
}

impl ObjString {
    pub(crate) fn with_hash(s: &str, hash: u32) -> Self {
        Self {
            hash,
            chars: s.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.chars
    }

    pub fn hash_code(&self) -> u32 {
        self.hash
    }
}

impl Deref for ObjString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.chars
    }
}

impl PartialEq for ObjString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.chars == other.chars
    }
}

impl Eq for ObjString {}

impl Hash for ObjString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl PartialOrd for ObjString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chars.cmp(&other.chars)
    }
}

impl fmt::Display for ObjString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chars)
    }
}

/// A compiled function: the immutable output of compiling one function
/// literal or a whole script.
#[derive(Debug)]
pub struct ObjFunction {
    /// `None` for the top-level script.
    pub name: Option<Rc<ObjString>>,
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
}

impl ObjFunction {
    pub fn name_str(&self) -> &str {
        self.name.as_ref().map_or("script", |n| n.as_str())
    }
}

impl fmt::Display for ObjFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<script>"),
        }
    }
}

/// Shared handle to an upvalue. Several closures may hold the same one.
pub type UpvalueRef = Rc<RefCell<ObjUpvalue>>;

/// A captured variable.
///
/// While open it names an absolute slot in the VM's value stack and owns
/// nothing. Closing copies the slot's value in; after that the upvalue is
/// independent of the stack.
#[derive(Debug, Clone)]
pub enum ObjUpvalue {
    Open(usize),
    Closed(Value),
}

impl ObjUpvalue {
    pub fn new_ref(slot: usize) -> UpvalueRef {
        Rc::new(RefCell::new(ObjUpvalue::Open(slot)))
    }

    /// The stack slot this upvalue aliases, if still open.
    pub fn open_slot(&self) -> Option<usize> {
        match self {
            ObjUpvalue::Open(slot) => Some(*slot),
            ObjUpvalue::Closed(_) => None,
        }
    }
}

/// A function paired with its captured variables.
#[derive(Debug)]
pub struct ObjClosure {
    pub function: Rc<ObjFunction>,
    pub upvalues: Vec<UpvalueRef>,
}

impl ObjClosure {
    pub fn new(function: Rc<ObjFunction>, upvalues: Vec<UpvalueRef>) -> Self {
        Self { function, upvalues }
    }
}

/// Signature of host functions: argument count and the argument slice.
pub type NativeFn = fn(usize, &[Value]) -> Value;

/// A host function callable from scripts.
pub struct ObjNative {
    pub name: Rc<ObjString>,
    /// `None` accepts any number of arguments.
    pub arity: Option<u8>,
    pub function: NativeFn,
}

impl fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjNative")
            .field("name", &self.name.as_str())
            .field("arity", &self.arity)
            .finish()
    }
}

/// A struct declaration: ordered field names with literal defaults.
#[derive(Debug)]
pub struct ObjStruct {
    pub name: Rc<ObjString>,
    pub fields: Vec<(Rc<ObjString>, Value)>,
}

impl ObjStruct {
    pub fn field_index(&self, name: &ObjString) -> Option<usize> {
        self.fields.iter().position(|(field, _)| **field == *name)
    }

    pub fn has_field(&self, name: &ObjString) -> bool {
        self.field_index(name).is_some()
    }
}

/// Field storage shared by instances and maps.
pub type FieldMap = FxHashMap<Rc<ObjString>, Value>;

/// A live value built from a struct template.
#[derive(Debug)]
pub struct ObjInstance {
    pub template: Rc<ObjStruct>,
    pub fields: FieldMap,
    /// Built with the force marker: any field name may be added.
    pub forced: bool,
}

impl ObjInstance {
    /// A new instance holding the template's defaults.
    pub fn from_defaults(template: Rc<ObjStruct>, forced: bool) -> Self {
        let fields = template
            .fields
            .iter()
            .map(|(name, default)| (Rc::clone(name), default.clone()))
            .collect();
        Self {
            template,
            fields,
            forced,
        }
    }

    pub fn get(&self, name: &ObjString) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field names in display order: declared fields first, then any extra
    /// fields a forced construction added, sorted.
    pub fn field_order(&self) -> Vec<Rc<ObjString>> {
        let mut order: Vec<Rc<ObjString>> = self
            .template
            .fields
            .iter()
            .map(|(name, _)| Rc::clone(name))
            .filter(|name| self.fields.contains_key(name))
            .collect();
        let mut extra: Vec<Rc<ObjString>> = self
            .fields
            .keys()
            .filter(|name| !self.template.has_field(name))
            .cloned()
            .collect();
        extra.sort();
        order.extend(extra);
        order
    }
}

/// A string-keyed map value.
pub type ObjMap = FieldMap;
