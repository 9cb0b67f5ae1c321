// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Value stack for the VM.

use crate::value::Value;

use super::{Result, RuntimeError};

/// The VM's value stack, bounded at a fixed number of slots.
#[derive(Debug)]
pub struct ValueStack {
    values: Vec<Value>,
    max: usize,
}

impl ValueStack {
    /// Create an empty stack holding at most `max` values.
    pub fn new(max: usize) -> Self {
        Self {
            values: Vec::with_capacity(max.min(1024)),
            max,
        }
    }

    /// Push a value onto the stack.
    #[inline]
    pub fn push(&mut self, value: Value) -> Result<()> {
        if self.values.len() >= self.max {
            return Err(RuntimeError::StackOverflow);
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop a value from the stack.
    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Peek at a value on the stack without removing it.
    /// `distance` is the offset from the top (0 = top).
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<&Value> {
        if distance >= self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(&self.values[self.values.len() - 1 - distance])
    }

    /// Get a value at an absolute index.
    #[inline]
    pub fn get(&self, index: usize) -> Result<Value> {
        self.values
            .get(index)
            .cloned()
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Set a value at an absolute index.
    #[inline]
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(RuntimeError::StackUnderflow)?;
        *slot = value;
        Ok(())
    }

    /// The top `n` values, oldest first.
    pub fn top(&self, n: usize) -> Result<&[Value]> {
        if n > self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(&self.values[self.values.len() - n..])
    }

    /// Get the current stack size.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Truncate the stack to the given size.
    #[inline]
    pub fn truncate(&mut self, size: usize) {
        self.values.truncate(size);
    }

    /// Pop n values and return them oldest first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        if n > self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        let start = self.values.len() - n;
        Ok(self.values.drain(start..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_past_capacity_overflows() {
        let mut stack = ValueStack::new(2);
        stack.push(Value::Null).unwrap();
        stack.push(Value::Null).unwrap();
        assert_eq!(stack.push(Value::Null), Err(RuntimeError::StackOverflow));
    }

    #[test]
    fn pop_n_keeps_order() {
        let mut stack = ValueStack::new(8);
        for i in 0..4 {
            stack.push(Value::Number(i as f64)).unwrap();
        }
        let top = stack.pop_n(2).unwrap();
        assert_eq!(top, vec![Value::Number(2.0), Value::Number(3.0)]);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop_n(3), Err(RuntimeError::StackUnderflow));
    }
}
