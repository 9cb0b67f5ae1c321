// kestrel-vm - VM error path tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tests for error paths:
//! - Runtime errors and their backtraces
//! - Arity and call errors
//! - Type errors
//! - Undefined variables
//! - Compile diagnostics through `interpret_source`

mod common;

use common::{Harness, InterpretResult, RuntimeError, VmConfig, run, runtime_error};

// =============================================================================
// Reporting
// =============================================================================

#[test]
fn runtime_error_reports_backtrace() {
    let src = "fun inner() {\n  return 1 / 0;\n}\nfun outer() { return inner(); }\nouter();";
    let (result, _, err) = run(src);
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(
        err,
        "Division by zero.\n[line 2] in inner()\n[line 4] in outer()\n[line 5] in script\n"
    );
}

#[test]
fn output_before_error_is_kept() {
    let (result, out, _) = run("print \"before\"; print -\"x\"; print \"after\";");
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(out, "before\n");
}

#[test]
fn vm_is_reusable_after_runtime_error() {
    let mut harness = Harness::new();
    assert_eq!(harness.run("var a = 1; a();"), InterpretResult::RuntimeError);
    assert_eq!(harness.vm.stack_depth(), 0);
    assert_eq!(harness.run("print a + 1;"), InterpretResult::Ok);
    assert_eq!(harness.stdout(), "2\n");
    assert!(harness.vm.last_failure().is_none());
}

#[test]
fn escaped_closure_keeps_its_capture_after_runtime_error() {
    let mut harness = Harness::new();
    let setup = "var g;\n\
        fun make() { var x = 10; fun get() { return x; } g = get; return 1 / 0; }\n\
        make();";
    assert_eq!(harness.run(setup), InterpretResult::RuntimeError);
    assert_eq!(
        harness.run("{ var y = 1; var z = \"wrong\"; print g(); }"),
        InterpretResult::Ok
    );
    assert_eq!(harness.stdout(), "10\n");
}

#[test]
fn cyclic_operands_are_a_runtime_error() {
    assert_eq!(
        runtime_error("var a = [1]; push(a, a); print a + a;"),
        RuntimeError::NestingTooDeep("+")
    );
}

#[test]
fn compile_errors_are_reported_not_run() {
    let (result, out, err) = run("print \"never\";\nprint ;\nvar 1 = 2;");
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(out, "");
    assert_eq!(
        err,
        "[line 2] Error at ';': Expect expression.\n[line 3] Error at '1': Expect variable name.\n"
    );
}

#[test]
fn compile_error_at_end() {
    let (result, _, err) = run("print 1");
    assert_eq!(result, InterpretResult::CompileError);
    assert_eq!(err, "[line 1] Error at end: Expect ';' after value.\n");
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn division_by_zero() {
    assert_eq!(runtime_error("print 10 / 0;"), RuntimeError::DivisionByZero);
}

#[test]
fn modulo_by_zero() {
    assert_eq!(runtime_error("print 10 % 0;"), RuntimeError::ModuloByZero);
}

#[test]
fn mixed_operand_types() {
    assert_eq!(
        runtime_error("print 1 + \"a\";"),
        RuntimeError::OperandTypes {
            op: "+",
            left: "number",
            right: "string"
        }
    );
    assert!(matches!(
        runtime_error("print \"a\" * \"b\";"),
        RuntimeError::OperandTypes { op: "*", .. }
    ));
    assert!(matches!(
        runtime_error("print null + null;"),
        RuntimeError::OperandTypes { .. }
    ));
}

#[test]
fn comparison_operands() {
    assert_eq!(
        runtime_error("print 1 < \"2\";"),
        RuntimeError::ComparisonOperands
    );
    assert_eq!(
        runtime_error("print [] >= [];"),
        RuntimeError::ComparisonOperands
    );
}

#[test]
fn negate_operand() {
    assert_eq!(runtime_error("print -true;"), RuntimeError::NegateOperand);
}

// =============================================================================
// Calls
// =============================================================================

#[test]
fn wrong_argument_count() {
    assert_eq!(
        runtime_error("fun f(a, b) {} f(1);"),
        RuntimeError::Arity {
            expected: 2,
            got: 1
        }
    );
    assert_eq!(
        runtime_error("len(1, 2);"),
        RuntimeError::Arity {
            expected: 1,
            got: 2
        }
    );
}

#[test]
fn calling_non_callable() {
    assert_eq!(runtime_error("\"str\"();"), RuntimeError::NotCallable);
    assert_eq!(runtime_error("var n = null; n();"), RuntimeError::NotCallable);
}

#[test]
fn unbounded_recursion_overflows() {
    let mut harness = Harness::new();
    let result = harness.run("fun r() { return r(); } r();");
    assert_eq!(result, InterpretResult::RuntimeError);
    let failure = harness.vm.last_failure().unwrap();
    assert_eq!(failure.error, RuntimeError::StackOverflow);
    assert_eq!(failure.backtrace.len(), 64);
    assert!(harness.stderr().starts_with("Stack overflow.\n"));
}

#[test]
fn value_stack_limit_is_enforced() {
    let mut harness = Harness::with_config(VmConfig::default().with_stack_max(8));
    let result = harness.run("print [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];");
    assert_eq!(result, InterpretResult::RuntimeError);
    assert_eq!(
        harness.vm.last_failure().unwrap().error,
        RuntimeError::StackOverflow
    );
}

// =============================================================================
// Variables
// =============================================================================

#[test]
fn undefined_global_read() {
    assert_eq!(
        runtime_error("print missing;"),
        RuntimeError::UndefinedVariable("missing".into())
    );
}

#[test]
fn undefined_global_assignment() {
    let mut harness = Harness::new();
    assert_eq!(harness.run("missing = 1;"), InterpretResult::RuntimeError);
    assert_eq!(harness.stderr(), "Undefined variable 'missing'.\n[line 1] in script\n");
    assert_eq!(harness.vm.global("missing"), None);
}
