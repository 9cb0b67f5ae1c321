// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The standard native functions: clock, len, push, pop, keys, str.
//!
//! A native that gets arguments it cannot use returns `null` rather than
//! raising an error.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::{Obj, Value};
use crate::vm::VM;

/// Install the standard catalogue into a VM's globals.
pub fn install(vm: &mut VM) {
    vm.define_native("clock", Some(0), native_clock);
    vm.define_native("len", Some(1), native_len);
    vm.define_native("push", Some(2), native_push);
    vm.define_native("pop", Some(1), native_pop);
    vm.define_native("keys", Some(1), native_keys);
    vm.define_native("str", Some(1), native_str);
}

/// clock() - seconds since the Unix epoch
fn native_clock(_argc: usize, _args: &[Value]) -> Value {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| Value::Number(elapsed.as_secs_f64()))
        .unwrap_or_default()
}

/// len(x) - characters in a string, elements in an array, entries in a map
fn native_len(_argc: usize, args: &[Value]) -> Value {
    let len = match args.first() {
        Some(Value::Obj(Obj::String(s))) => s.chars().count(),
        Some(Value::Obj(Obj::Array(items))) => items.borrow().len(),
        Some(Value::Obj(Obj::Map(map))) => map.borrow().len(),
        _ => return Value::Null,
    };
    Value::Number(len as f64)
}

/// push(array, v) - append in place, returns the new length
fn native_push(_argc: usize, args: &[Value]) -> Value {
    match args {
        [Value::Obj(Obj::Array(items)), value] => {
            let mut items = items.borrow_mut();
            items.push(value.clone());
            Value::Number(items.len() as f64)
        }
        _ => Value::Null,
    }
}

/// pop(array) - remove and return the last element
fn native_pop(_argc: usize, args: &[Value]) -> Value {
    match args {
        [Value::Obj(Obj::Array(items))] => items.borrow_mut().pop().unwrap_or_default(),
        _ => Value::Null,
    }
}

/// keys(map) - sorted array of a map's keys
fn native_keys(_argc: usize, args: &[Value]) -> Value {
    let [Value::Obj(Obj::Map(map))] = args else {
        return Value::Null;
    };
    let mut keys: Vec<_> = map.borrow().keys().cloned().collect();
    keys.sort();
    Value::array(keys.into_iter().map(Value::from).collect())
}

/// str(v) - display form as a string
fn native_str(_argc: usize, args: &[Value]) -> Value {
    match args.first() {
        Some(value @ Value::Obj(Obj::String(_))) => value.clone(),
        Some(value) => Value::string(&value.to_string()),
        None => Value::Null,
    }
}
