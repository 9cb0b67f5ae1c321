// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Collection opcode handlers: Array, Map, ArrayGet, ArraySet, ArraySlice.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{Obj, ObjMap, ObjString, Value};
use crate::vm::{Result, RuntimeError, VM};

impl VM {
    /// Execute a collection opcode.
    pub(crate) fn execute_collections(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::Array => {
                let count = self.read_byte()? as usize;
                let items = self.stack.pop_n(count)?;
                self.stack.push(Value::array(items))
            }
            OpCode::Map => {
                let count = self.read_byte()? as usize;
                let flat = self.stack.pop_n(count * 2)?;
                let mut map = ObjMap::default();
                for pair in flat.chunks_exact(2) {
                    if let [key, value] = pair {
                        map.insert(map_key(key)?, value.clone());
                    }
                }
                self.stack.push(Value::map(map))
            }
            OpCode::ArrayGet => {
                let index = self.stack.pop()?;
                let target = self.stack.pop()?;
                self.stack.push(index_get(&target, &index)?)
            }
            OpCode::ArraySet => {
                let value = self.stack.pop()?;
                let index = self.stack.pop()?;
                let target = self.stack.pop()?;
                index_set(&target, &index, value.clone())?;
                self.stack.push(value)
            }
            OpCode::ArraySlice => {
                let end = self.stack.pop()?;
                let start = self.stack.pop()?;
                let target = self.stack.pop()?;
                self.stack.push(slice(&target, &start, &end)?)
            }
            _ => Err(RuntimeError::Internal(format!(
                "execute_collections: unexpected opcode {:?}",
                op
            ))),
        }
    }
}

fn map_key(key: &Value) -> Result<Rc<ObjString>> {
    key.as_string()
        .cloned()
        .ok_or_else(|| RuntimeError::MapKey(key.type_name()))
}

/// Check that `index` is an integral number in `0..len`.
fn checked_index(index: &Value, len: usize) -> Result<usize> {
    let Value::Number(n) = index else {
        return Err(RuntimeError::IndexType(index.type_name().to_string()));
    };
    if n.fract() != 0.0 || !n.is_finite() {
        return Err(RuntimeError::IndexType(n.to_string()));
    }
    if *n < 0.0 || *n >= len as f64 {
        return Err(RuntimeError::IndexOutOfBounds { index: *n, len });
    }
    Ok(*n as usize)
}

/// `target[index]`
pub fn index_get(target: &Value, index: &Value) -> Result<Value> {
    match target {
        Value::Obj(Obj::Array(items)) => {
            let items = items.borrow();
            let i = checked_index(index, items.len())?;
            Ok(items[i].clone())
        }
        Value::Obj(Obj::String(s)) => {
            let len = s.chars().count();
            let i = checked_index(index, len)?;
            let ch: String = s.chars().skip(i).take(1).collect();
            Ok(Value::string(&ch))
        }
        Value::Obj(Obj::Map(map)) => {
            let key = map_key(index)?;
            Ok(map.borrow().get(&key).cloned().unwrap_or_default())
        }
        other => Err(RuntimeError::NotIndexable(other.type_name())),
    }
}

/// `target[index] = value`
pub fn index_set(target: &Value, index: &Value, value: Value) -> Result<()> {
    match target {
        Value::Obj(Obj::Array(items)) => {
            let mut items = items.borrow_mut();
            let i = checked_index(index, items.len())?;
            items[i] = value;
            Ok(())
        }
        Value::Obj(Obj::Map(map)) => {
            let key = map_key(index)?;
            map.borrow_mut().insert(key, value);
            Ok(())
        }
        other => Err(RuntimeError::NotIndexAssignable(other.type_name())),
    }
}

/// Resolve a slice bound: `null` takes the default, numbers are floored
/// and clamped into `0..=len`.
fn bound(value: &Value, default: usize, len: usize) -> Result<usize> {
    match value {
        Value::Null => Ok(default),
        Value::Number(n) if n.is_nan() => Err(RuntimeError::SliceBound("NaN")),
        Value::Number(n) => Ok(n.floor().clamp(0.0, len as f64) as usize),
        other => Err(RuntimeError::SliceBound(other.type_name())),
    }
}

/// `target[start:end]` on arrays and strings. A start past the end yields
/// an empty result.
pub fn slice(target: &Value, start: &Value, end: &Value) -> Result<Value> {
    match target {
        Value::Obj(Obj::Array(items)) => {
            let items = items.borrow();
            let len = items.len();
            let (from, to) = (bound(start, 0, len)?, bound(end, len, len)?);
            let part = if from < to {
                items[from..to].to_vec()
            } else {
                Vec::new()
            };
            Ok(Value::array(part))
        }
        Value::Obj(Obj::String(s)) => {
            let len = s.chars().count();
            let (from, to) = (bound(start, 0, len)?, bound(end, len, len)?);
            let part: String = if from < to {
                s.chars().skip(from).take(to - from).collect()
            } else {
                String::new()
            };
            Ok(Value::string(&part))
        }
        other => Err(RuntimeError::NotSliceable(other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Value {
        Value::array(values.iter().map(|n| Value::Number(*n)).collect())
    }

    #[test]
    fn array_indexing() {
        let arr = nums(&[10.0, 20.0, 30.0]);
        assert_eq!(index_get(&arr, &Value::Number(1.0)), Ok(Value::Number(20.0)));
        assert_eq!(
            index_get(&arr, &Value::Number(3.0)),
            Err(RuntimeError::IndexOutOfBounds { index: 3.0, len: 3 })
        );
        assert!(matches!(
            index_get(&arr, &Value::Number(0.5)),
            Err(RuntimeError::IndexType(_))
        ));
        assert!(index_get(&arr, &Value::Number(-1.0)).is_err());
    }

    #[test]
    fn string_indexing_is_by_character() {
        let s = Value::string("héllo");
        assert_eq!(index_get(&s, &Value::Number(1.0)), Ok(Value::string("é")));
    }

    #[test]
    fn map_indexing_and_assignment() {
        let map = Value::map(ObjMap::default());
        index_set(&map, &Value::string("k"), Value::Number(1.0)).unwrap();
        assert_eq!(index_get(&map, &Value::string("k")), Ok(Value::Number(1.0)));
        assert_eq!(index_get(&map, &Value::string("missing")), Ok(Value::Null));
        assert_eq!(
            index_get(&map, &Value::Number(1.0)),
            Err(RuntimeError::MapKey("number"))
        );
    }

    #[test]
    fn slices_clamp() {
        let arr = nums(&[1.0, 2.0, 3.0, 4.0]);
        let s = |a: Value, b: Value| slice(&arr, &a, &b).unwrap().to_string();
        assert_eq!(s(Value::Number(1.0), Value::Number(3.0)), "[2, 3]");
        assert_eq!(s(Value::Null, Value::Number(2.0)), "[1, 2]");
        assert_eq!(s(Value::Number(2.0), Value::Null), "[3, 4]");
        assert_eq!(s(Value::Number(-5.0), Value::Number(99.0)), "[1, 2, 3, 4]");
        assert_eq!(s(Value::Number(3.0), Value::Number(1.0)), "[]");

        let text = Value::string("kestrel");
        assert_eq!(
            slice(&text, &Value::Null, &Value::Number(4.0)),
            Ok(Value::string("kest"))
        );
    }
}
