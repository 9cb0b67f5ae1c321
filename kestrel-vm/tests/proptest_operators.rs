// kestrel-vm - Property-based tests for operators and interning
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Property-based tests for the polymorphic operators.
//!
//! Tests the following properties:
//! - Number arithmetic in scripts agrees with f64 arithmetic
//! - Array and instance arithmetic never mutate their operands
//! - Array arithmetic keeps the longer operand's length
//! - Map union and difference follow set semantics on keys
//! - Interning yields one object per distinct string

mod common;

use std::rc::Rc;

use common::output;
use kestrel_vm::value::{ObjMap, intern, interned_count};
use kestrel_vm::vm::handlers::arithmetic::{BinaryOp, apply};
use kestrel_vm::{Obj, Value};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_small_int() -> impl Strategy<Value = i32> {
    -10_000i32..10_000i32
}

fn arb_numbers() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-1000i32..1000i32).prop_map(f64::from), 0..8)
}

fn arb_op() -> impl Strategy<Value = BinaryOp> {
    prop_oneof![
        Just(BinaryOp::Add),
        Just(BinaryOp::Subtract),
        Just(BinaryOp::Multiply),
    ]
}

fn arb_keys() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-e]{1,2}", 0..6)
}

fn array(values: &[f64]) -> Value {
    Value::array(values.iter().copied().map(Value::Number).collect())
}

fn map(keys: &[String]) -> Value {
    let mut entries = ObjMap::default();
    for (i, key) in keys.iter().enumerate() {
        entries.insert(intern(key), Value::Number(i as f64));
    }
    Value::map(entries)
}

fn map_keys(value: &Value) -> Vec<String> {
    let Value::Obj(Obj::Map(entries)) = value else {
        panic!("expected a map, got {}", value.type_name());
    };
    let mut keys: Vec<String> = entries.borrow().keys().map(|k| k.to_string()).collect();
    keys.sort();
    keys
}

fn array_len(value: &Value) -> usize {
    match value {
        Value::Obj(Obj::Array(items)) => items.borrow().len(),
        other => panic!("expected an array, got {}", other.type_name()),
    }
}

// =============================================================================
// Numbers
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn script_arithmetic_matches_f64(a in arb_small_int(), b in arb_small_int()) {
        let src = format!(
            "print ({a}) + ({b}); print ({a}) - ({b}); print ({a}) * ({b});"
        );
        let (a, b) = (f64::from(a), f64::from(b));
        let expected: Vec<String> = [a + b, a - b, a * b]
            .iter()
            .map(|n| Value::Number(*n).to_string())
            .collect();
        prop_assert_eq!(output(&src), expected);
    }

    #[test]
    fn comparisons_are_consistent(a in arb_small_int(), b in arb_small_int()) {
        let src = format!(
            "print {a} < {b}; print {a} <= {b}; print {a} > {b}; print {a} >= {b}; print {a} == {b};"
        );
        let expected: Vec<String> = [a < b, a <= b, a > b, a >= b, a == b]
            .iter()
            .map(|b| b.to_string())
            .collect();
        prop_assert_eq!(output(&src), expected);
    }

    #[test]
    fn division_by_nonzero_matches_f64(a in arb_small_int(), b in arb_small_int()) {
        prop_assume!(b != 0);
        let (x, y) = (f64::from(a), f64::from(b));
        prop_assert_eq!(
            apply(BinaryOp::Divide, &Value::Number(x), &Value::Number(y)).unwrap(),
            Value::Number(x / y)
        );
        prop_assert_eq!(
            apply(BinaryOp::Modulo, &Value::Number(x), &Value::Number(y)).unwrap(),
            Value::Number(x % y)
        );
    }
}

// =============================================================================
// Arrays
// =============================================================================

proptest! {
    #[test]
    fn array_arithmetic_keeps_longer_length(
        left in arb_numbers(),
        right in arb_numbers(),
        op in arb_op(),
    ) {
        let result = apply(op, &array(&left), &array(&right)).unwrap();
        prop_assert_eq!(array_len(&result), left.len().max(right.len()));
    }

    #[test]
    fn array_arithmetic_does_not_mutate(
        left in arb_numbers(),
        right in arb_numbers(),
        op in arb_op(),
    ) {
        let (a, b) = (array(&left), array(&right));
        let (before_a, before_b) = (a.to_string(), b.to_string());
        apply(op, &a, &b).unwrap();
        prop_assert_eq!(a.to_string(), before_a);
        prop_assert_eq!(b.to_string(), before_b);
    }

    #[test]
    fn array_addition_is_commutative(left in arb_numbers(), right in arb_numbers()) {
        let ab = apply(BinaryOp::Add, &array(&left), &array(&right)).unwrap();
        let ba = apply(BinaryOp::Add, &array(&right), &array(&left)).unwrap();
        prop_assert_eq!(ab.to_string(), ba.to_string());
    }
}

// =============================================================================
// Maps
// =============================================================================

proptest! {
    #[test]
    fn map_union_has_all_keys(left in arb_keys(), right in arb_keys()) {
        let result = apply(BinaryOp::Add, &map(&left), &map(&right)).unwrap();
        let mut expected: Vec<String> = left.iter().chain(&right).cloned().collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(map_keys(&result), expected);
    }

    #[test]
    fn map_difference_drops_right_keys(left in arb_keys(), right in arb_keys()) {
        let result = apply(BinaryOp::Subtract, &map(&left), &map(&right)).unwrap();
        let mut expected: Vec<String> = left
            .iter()
            .filter(|k| !right.contains(k))
            .cloned()
            .collect();
        expected.sort();
        expected.dedup();
        prop_assert_eq!(map_keys(&result), expected);
    }
}

// =============================================================================
// Strings and interning
// =============================================================================

proptest! {
    #[test]
    fn interning_is_idempotent(s in ".{0,16}") {
        let first = intern(&s);
        let count = interned_count();
        let second = intern(&s);
        prop_assert!(Rc::ptr_eq(&first, &second));
        prop_assert_eq!(interned_count(), count);
    }

    #[test]
    fn string_equality_is_by_content(a in "[a-c]{0,3}", b in "[a-c]{0,3}") {
        prop_assert_eq!(Value::string(&a) == Value::string(&b), a == b);
        prop_assert_eq!(Rc::ptr_eq(&intern(&a), &intern(&b)), a == b);
    }

    #[test]
    fn concatenation_then_removal(a in "[a-z]{0,8}", b in "[A-Z]{1,4}") {
        let joined = apply(BinaryOp::Add, &Value::string(&a), &Value::string(&b)).unwrap();
        prop_assert_eq!(joined.clone(), Value::string(&format!("{a}{b}")));
        let removed = apply(BinaryOp::Subtract, &joined, &Value::string(&b)).unwrap();
        prop_assert_eq!(removed, Value::string(&a));
    }
}
