// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! String interning.
//!
//! Every string object is created through the interner, so two strings with
//! the same contents are the same `Rc<ObjString>`. The table is bucketed by
//! FNV-1a hash, and a hash match is always confirmed by comparing the full
//! contents: two different strings that collide in the hash get separate
//! objects in the same bucket.
//!
//! The table is per thread. `Rc` values cannot cross threads, so a per-thread
//! table is the widest sharing that can exist. Interned strings live as long
//! as the thread.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::object::ObjString;

/// FNV-1a over the UTF-8 bytes of a string.
pub fn hash_str(s: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in s.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16_777_619);
    }
    hash
}

/// Canonical table of string objects, keyed by content hash.
#[derive(Debug, Default)]
pub struct Interner {
    buckets: FxHashMap<u32, SmallVec<[Rc<ObjString>; 1]>>,
    count: usize,
}

impl Interner {
    /// Create an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical string object for `s`, creating it on first use.
    pub fn intern(&mut self, s: &str) -> Rc<ObjString> {
        let hash = hash_str(s);
        self.intern_hashed(s, hash)
    }

    /// Like `intern`, with the hash supplied by the caller. Exposed so tests
    /// can force two different strings into one bucket.
    pub fn intern_hashed(&mut self, s: &str, hash: u32) -> Rc<ObjString> {
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|obj| obj.as_str() == s) {
            return Rc::clone(existing);
        }
        let obj = Rc::new(ObjString::with_hash(s, hash));
        bucket.push(Rc::clone(&obj));
        self.count += 1;
        obj
    }

    /// Look up a string without creating it.
    pub fn get(&self, s: &str) -> Option<Rc<ObjString>> {
        self.buckets
            .get(&hash_str(s))?
            .iter()
            .find(|obj| obj.as_str() == s)
            .cloned()
    }

    /// Number of distinct strings held.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the interner holds no strings.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

thread_local! {
    static INTERNER: RefCell<Interner> = RefCell::new(Interner::new());
}

/// Intern a string in the current thread's table.
pub fn intern(s: &str) -> Rc<ObjString> {
    INTERNER.with(|table| table.borrow_mut().intern(s))
}

/// The interned string for `s`, if one exists. Never creates one.
pub fn lookup(s: &str) -> Option<Rc<ObjString>> {
    INTERNER.with(|table| table.borrow().get(s))
}

/// Number of distinct strings interned on the current thread.
pub fn interned_count() -> usize {
    INTERNER.with(|table| table.borrow().len())
}
