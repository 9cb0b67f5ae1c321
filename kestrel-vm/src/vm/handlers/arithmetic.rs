// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic and comparison opcode handlers.
//!
//! The binary operators are polymorphic over the operand types:
//!
//! | left / right      | `+`                 | `-`                      | `* / %`              |
//! |-------------------|---------------------|--------------------------|----------------------|
//! | number / number   | sum                 | difference               | product, quotient, remainder |
//! | string / string   | concatenation       | remove first occurrence  | error                |
//! | array / array     | element-wise        | element-wise             | element-wise, numbers only |
//! | map / map         | right-biased union  | key removal              | error                |
//! | instance/instance | field-wise          | field-wise               | field-wise           |
//!
//! Element-wise and field-wise application recurses through the same table.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{Obj, ObjInstance, ObjMap, Value, intern};
use crate::vm::{Result, RuntimeError, VM};

/// A polymorphic binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
        }
    }

    fn from_opcode(op: OpCode) -> Option<BinaryOp> {
        match op {
            OpCode::Add => Some(BinaryOp::Add),
            OpCode::Subtract => Some(BinaryOp::Subtract),
            OpCode::Multiply => Some(BinaryOp::Multiply),
            OpCode::Divide => Some(BinaryOp::Divide),
            OpCode::Modulo => Some(BinaryOp::Modulo),
            _ => None,
        }
    }

    /// `*`, `/` and `%` are numeric only.
    fn is_multiplicative(self) -> bool {
        matches!(self, BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo)
    }
}

impl VM {
    /// Execute an arithmetic, comparison or unary opcode.
    pub(crate) fn execute_arithmetic(&mut self, op: OpCode) -> Result<()> {
        if let Some(binary) = BinaryOp::from_opcode(op) {
            let b = self.stack.pop()?;
            let a = self.stack.pop()?;
            return self.stack.push(apply(binary, &a, &b)?);
        }

        match op {
            OpCode::Greater => self.comparison_op(|o| o.is_gt()),
            OpCode::Less => self.comparison_op(|o| o.is_lt()),
            OpCode::Not => {
                let value = self.stack.pop()?;
                self.stack.push(Value::Bool(value.is_falsey()))
            }
            OpCode::Negate => match self.stack.pop()? {
                Value::Number(n) => self.stack.push(Value::Number(-n)),
                _ => Err(RuntimeError::NegateOperand),
            },
            _ => Err(RuntimeError::Internal(format!(
                "execute_arithmetic: unexpected opcode {:?}",
                op
            ))),
        }
    }

    /// Compare two numbers or two strings.
    fn comparison_op(&mut self, test: fn(std::cmp::Ordering) -> bool) -> Result<()> {
        let b = self.stack.pop()?;
        let a = self.stack.pop()?;
        let ordering = match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
            (Value::Obj(Obj::String(x)), Value::Obj(Obj::String(y))) => Some(x.cmp(y)),
            _ => return Err(RuntimeError::ComparisonOperands),
        };
        // NaN compares false both ways.
        self.stack.push(Value::Bool(ordering.is_some_and(test)))
    }
}

/// How far element-wise and field-wise application may recurse. Containers
/// that hold themselves hit this instead of exhausting the host stack.
const MAX_NESTING: usize = 128;

/// Apply `op` to two values. Never mutates either operand.
pub fn apply(op: BinaryOp, a: &Value, b: &Value) -> Result<Value> {
    apply_nested(op, a, b, 0)
}

fn apply_nested(op: BinaryOp, a: &Value, b: &Value, depth: usize) -> Result<Value> {
    if depth > MAX_NESTING {
        return Err(RuntimeError::NestingTooDeep(op.symbol()));
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numeric(op, *x, *y).map(Value::Number),
        (Value::Obj(Obj::String(x)), Value::Obj(Obj::String(y))) => match op {
            BinaryOp::Add => {
                let mut joined = String::with_capacity(x.len() + y.len());
                joined.push_str(x);
                joined.push_str(y);
                Ok(Value::Obj(Obj::String(intern(&joined))))
            }
            BinaryOp::Subtract => {
                let removed = x.replacen(y.as_str(), "", 1);
                Ok(Value::Obj(Obj::String(intern(&removed))))
            }
            _ => Err(operand_types(op, a, b)),
        },
        (Value::Obj(Obj::Array(x)), Value::Obj(Obj::Array(y))) => {
            let result = elementwise(op, &x.borrow(), &y.borrow(), depth)?;
            Ok(Value::array(result))
        }
        (Value::Obj(Obj::Map(x)), Value::Obj(Obj::Map(y))) => {
            let result = map_op(op, &x.borrow(), &y.borrow())
                .ok_or_else(|| operand_types(op, a, b))?;
            Ok(Value::map(result))
        }
        (Value::Obj(Obj::Instance(x)), Value::Obj(Obj::Instance(y))) => {
            let result = fieldwise(op, &x.borrow(), &y.borrow(), depth)?;
            Ok(Value::instance(result))
        }
        _ => Err(operand_types(op, a, b)),
    }
}

fn numeric(op: BinaryOp, x: f64, y: f64) -> Result<f64> {
    match op {
        BinaryOp::Add => Ok(x + y),
        BinaryOp::Subtract => Ok(x - y),
        BinaryOp::Multiply => Ok(x * y),
        BinaryOp::Divide if y == 0.0 => Err(RuntimeError::DivisionByZero),
        BinaryOp::Divide => Ok(x / y),
        BinaryOp::Modulo if y == 0.0 => Err(RuntimeError::ModuloByZero),
        BinaryOp::Modulo => Ok(x % y),
    }
}

/// Pair elements up to the shorter length; the longer array's tail passes
/// through unchanged.
fn elementwise(
    op: BinaryOp,
    left: &[Value],
    right: &[Value],
    depth: usize,
) -> Result<Vec<Value>> {
    let paired = left.len().min(right.len());
    let mut out = Vec::with_capacity(left.len().max(right.len()));
    for (a, b) in left.iter().zip(right) {
        if op.is_multiplicative() && !(a.as_number().is_some() && b.as_number().is_some()) {
            return Err(RuntimeError::NonNumericElements {
                op: op.symbol(),
                left: a.type_name(),
                right: b.type_name(),
            });
        }
        out.push(apply_nested(op, a, b, depth + 1)?);
    }
    let tail = if left.len() > paired { left } else { right };
    out.extend(tail[paired..].iter().cloned());
    Ok(out)
}

/// `+` is a union where the right operand wins; `-` drops the right
/// operand's keys. Other operators are unsupported.
fn map_op(op: BinaryOp, left: &ObjMap, right: &ObjMap) -> Option<ObjMap> {
    match op {
        BinaryOp::Add => {
            let mut out = left.clone();
            out.extend(right.iter().map(|(k, v)| (Rc::clone(k), v.clone())));
            Some(out)
        }
        BinaryOp::Subtract => Some(
            left.iter()
                .filter(|(k, _)| !right.contains_key(*k))
                .map(|(k, v)| (Rc::clone(k), v.clone()))
                .collect(),
        ),
        _ => None,
    }
}

/// Walk the left instance's fields, combining each with the same-named
/// field on the right.
fn fieldwise(
    op: BinaryOp,
    left: &ObjInstance,
    right: &ObjInstance,
    depth: usize,
) -> Result<ObjInstance> {
    if !Rc::ptr_eq(&left.template, &right.template) {
        return Err(RuntimeError::TemplateMismatch {
            left: left.template.name.to_string(),
            right: right.template.name.to_string(),
        });
    }

    let mut fields = left.fields.clone();
    for (name, a) in &left.fields {
        let Some(b) = right.fields.get(name) else {
            continue;
        };
        if a.is_null() && b.is_null() {
            continue;
        }
        if !a.same_type(b) {
            return Err(RuntimeError::FieldTypeMismatch {
                field: name.to_string(),
                left: a.type_name(),
                right: b.type_name(),
            });
        }
        fields.insert(Rc::clone(name), apply_nested(op, a, b, depth + 1)?);
    }

    Ok(ObjInstance {
        template: Rc::clone(&left.template),
        fields,
        forced: left.forced,
    })
}

fn operand_types(op: BinaryOp, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::OperandTypes {
        op: op.symbol(),
        left: a.type_name(),
        right: b.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjStruct;

    fn nums(values: &[f64]) -> Value {
        Value::array(values.iter().map(|n| Value::Number(*n)).collect())
    }

    fn map(pairs: &[(&str, f64)]) -> Value {
        Value::map(
            pairs
                .iter()
                .map(|(k, v)| (intern(k), Value::Number(*v)))
                .collect(),
        )
    }

    fn point(template: &Rc<ObjStruct>, x: Value, y: Value) -> Value {
        let mut instance = ObjInstance::from_defaults(Rc::clone(template), false);
        instance.fields.insert(intern("x"), x);
        instance.fields.insert(intern("y"), y);
        Value::instance(instance)
    }

    fn template(name: &str) -> Rc<ObjStruct> {
        Rc::new(ObjStruct {
            name: intern(name),
            fields: vec![(intern("x"), Value::Null), (intern("y"), Value::Null)],
        })
    }

    #[test]
    fn number_arithmetic() {
        let r = apply(BinaryOp::Modulo, &Value::Number(7.0), &Value::Number(3.0)).unwrap();
        assert_eq!(r, Value::Number(1.0));
        let r = apply(BinaryOp::Divide, &Value::Number(1.0), &Value::Number(4.0)).unwrap();
        assert_eq!(r, Value::Number(0.25));
    }

    #[test]
    fn division_and_modulo_by_zero() {
        assert_eq!(
            apply(BinaryOp::Divide, &Value::Number(1.0), &Value::Number(0.0)),
            Err(RuntimeError::DivisionByZero)
        );
        assert_eq!(
            apply(BinaryOp::Modulo, &Value::Number(1.0), &Value::Number(0.0)),
            Err(RuntimeError::ModuloByZero)
        );
    }

    #[test]
    fn string_concat_and_removal() {
        let r = apply(BinaryOp::Add, &"ab".into(), &"cd".into()).unwrap();
        assert_eq!(r, Value::string("abcd"));
        let r = apply(BinaryOp::Subtract, &"Hello, world!".into(), &"world".into()).unwrap();
        assert_eq!(r, Value::string("Hello, !"));
        // Only the first occurrence goes.
        let r = apply(BinaryOp::Subtract, &"abab".into(), &"ab".into()).unwrap();
        assert_eq!(r, Value::string("ab"));
        let r = apply(BinaryOp::Subtract, &"abc".into(), &"zz".into()).unwrap();
        assert_eq!(r, Value::string("abc"));
        assert!(apply(BinaryOp::Multiply, &"a".into(), &"b".into()).is_err());
    }

    #[test]
    fn array_elementwise_with_tail() {
        let r = apply(BinaryOp::Add, &nums(&[1.0, 2.0]), &nums(&[3.0, 4.0])).unwrap();
        assert_eq!(r.to_string(), "[4, 6]");
        let r = apply(BinaryOp::Subtract, &nums(&[5.0]), &nums(&[1.0, 9.0, 8.0])).unwrap();
        assert_eq!(r.to_string(), "[4, 9, 8]");
    }

    #[test]
    fn array_multiplication_needs_numbers() {
        let mixed = Value::array(vec![Value::string("a")]);
        assert!(matches!(
            apply(BinaryOp::Multiply, &mixed, &nums(&[2.0])),
            Err(RuntimeError::NonNumericElements { .. })
        ));
        // Strings concatenate element-wise under `+`.
        let words = Value::array(vec![Value::string("a")]);
        let r = apply(BinaryOp::Add, &words, &Value::array(vec![Value::string("b")])).unwrap();
        assert_eq!(r.to_string(), r#"["ab"]"#);
    }

    #[test]
    fn operands_are_not_mutated() {
        let left = nums(&[1.0]);
        let right = nums(&[2.0]);
        apply(BinaryOp::Add, &left, &right).unwrap();
        assert_eq!(left.to_string(), "[1]");
    }

    #[test]
    fn map_union_and_difference() {
        let a = map(&[("x", 1.0), ("y", 2.0)]);
        let b = map(&[("y", 3.0), ("z", 4.0)]);
        let r = apply(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(r.to_string(), r#"{"x": 1, "y": 3, "z": 4}"#);
        let r = apply(BinaryOp::Subtract, &a, &b).unwrap();
        assert_eq!(r.to_string(), r#"{"x": 1}"#);
        assert!(apply(BinaryOp::Multiply, &a, &b).is_err());
    }

    #[test]
    fn instance_fieldwise() {
        let p = template("Point");
        let a = point(&p, Value::Number(1.0), Value::Number(2.0));
        let b = point(&p, Value::Number(10.0), Value::Number(20.0));
        let r = apply(BinaryOp::Add, &a, &b).unwrap();
        assert_eq!(r.to_string(), "Point{x: 11, y: 22}");
    }

    #[test]
    fn instance_template_and_field_mismatches() {
        let p = template("Point");
        let q = template("Point");
        let a = point(&p, Value::Number(1.0), Value::Null);
        let b = point(&q, Value::Number(1.0), Value::Null);
        assert!(matches!(
            apply(BinaryOp::Add, &a, &b),
            Err(RuntimeError::TemplateMismatch { .. })
        ));

        let c = point(&p, Value::string("s"), Value::Null);
        assert!(matches!(
            apply(BinaryOp::Add, &a, &c),
            Err(RuntimeError::FieldTypeMismatch { .. })
        ));

        // null on both sides stays null
        let d = point(&p, Value::Number(2.0), Value::Null);
        assert_eq!(
            apply(BinaryOp::Add, &a, &d).unwrap().to_string(),
            "Point{x: 3, y: null}"
        );
    }

    #[test]
    fn instance_division_by_zero_aborts() {
        let p = template("Point");
        let a = point(&p, Value::Number(1.0), Value::Null);
        let b = point(&p, Value::Number(0.0), Value::Null);
        assert_eq!(
            apply(BinaryOp::Divide, &a, &b),
            Err(RuntimeError::DivisionByZero)
        );
    }

    #[test]
    fn mismatched_types() {
        assert_eq!(
            apply(BinaryOp::Add, &Value::Number(1.0), &Value::string("a")),
            Err(RuntimeError::OperandTypes {
                op: "+",
                left: "number",
                right: "string",
            })
        );
    }

    #[test]
    fn self_containing_operands_stop_at_the_nesting_limit() {
        let arr = nums(&[1.0]);
        if let Value::Obj(Obj::Array(items)) = &arr {
            items.borrow_mut().push(arr.clone());
        }
        assert_eq!(
            apply(BinaryOp::Add, &arr, &arr),
            Err(RuntimeError::NestingTooDeep("+"))
        );

        let p = template("Node");
        let node = point(&p, Value::Number(1.0), Value::Null);
        if let Value::Obj(Obj::Instance(instance)) = &node {
            instance.borrow_mut().fields.insert(intern("y"), node.clone());
        }
        assert_eq!(
            apply(BinaryOp::Subtract, &node, &node),
            Err(RuntimeError::NestingTooDeep("-"))
        );
    }

    #[test]
    fn deep_but_finite_nesting_is_fine() {
        let mut value = nums(&[1.0]);
        for _ in 0..MAX_NESTING - 1 {
            value = Value::array(vec![value]);
        }
        assert!(apply(BinaryOp::Add, &value, &value).is_ok());
    }
}
