// kestrel-vm - Struct and instance tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

mod common;

use common::{RuntimeError, output, runtime_error};

const POINT: &str = "struct Point { x = 0, y = 0 }\n";

fn with_point(src: &str) -> Vec<String> {
    output(&format!("{}{}", POINT, src))
}

fn point_error(src: &str) -> RuntimeError {
    runtime_error(&format!("{}{}", POINT, src))
}

#[test]
fn test_defaults_and_display() {
    assert_eq!(
        with_point("print Point(); print Point;"),
        ["Point{x: 0, y: 0}", "<struct Point>"]
    );
}

#[test]
fn test_positional_construction() {
    assert_eq!(with_point("print Point(1, 2);"), ["Point{x: 1, y: 2}"]);
    assert_eq!(with_point("print Point(5);"), ["Point{x: 5, y: 0}"]);
}

#[test]
fn test_named_construction() {
    assert_eq!(with_point("print Point(y: 3);"), ["Point{x: 0, y: 3}"]);
}

#[test]
fn test_force_construction_adds_fields() {
    let src = "
        var p = Point!(z: 9);
        print p.z;
        p.w = 4;
        print p.w;
        print p;
    ";
    assert_eq!(with_point(src), ["9", "4", "Point{x: 0, y: 0, w: 4, z: 9}"]);
}

#[test]
fn test_empty_force_construction() {
    assert_eq!(with_point("var p = Point!(); p.q = 1; print p.q;"), ["1"]);
}

#[test]
fn test_property_get_and_set() {
    let src = "
        var p = Point(1, 2);
        p.x = p.x + 10;
        print p.x;
        print p.y = 7;
    ";
    assert_eq!(with_point(src), ["11", "7"]);
}

#[test]
fn test_instances_are_shared_references() {
    let src = "
        var a = Point();
        var b = a;
        b.x = 5;
        print a.x;
        print a == b;
    ";
    assert_eq!(with_point(src), ["5", "false"]);
}

#[test]
fn test_instance_arithmetic() {
    let src = "
        var a = Point(1, 2);
        var b = Point(10, 20);
        print a + b;
        print b - a;
        print a * b;
        print b / a;
        print a;
    ";
    assert_eq!(
        with_point(src),
        [
            "Point{x: 11, y: 22}",
            "Point{x: 9, y: 18}",
            "Point{x: 10, y: 40}",
            "Point{x: 10, y: 10}",
            "Point{x: 1, y: 2}",
        ]
    );
}

#[test]
fn test_instance_arithmetic_with_string_fields() {
    let src = "
        struct Tag { name = \"\" }
        print Tag(\"a\") + Tag(\"b\");
    ";
    assert_eq!(output(src), ["Tag{name: \"ab\"}"]);
}

#[test]
fn test_different_templates_do_not_combine() {
    let src = "
        struct Other { x = 0, y = 0 }
        print Point() + Other();
    ";
    assert!(matches!(
        point_error(src),
        RuntimeError::TemplateMismatch { .. }
    ));
}

#[test]
fn test_same_shape_redeclared_is_a_different_template() {
    let src = "
        var a = Point();
        struct Point { x = 0, y = 0 }
        print a + Point();
    ";
    assert!(matches!(
        point_error(src),
        RuntimeError::TemplateMismatch { .. }
    ));
}

#[test]
fn test_field_type_mismatch() {
    assert!(matches!(
        point_error("print Point(1, 2) + Point(\"s\", 2);"),
        RuntimeError::FieldTypeMismatch { .. }
    ));
}

#[test]
fn test_instance_division_by_zero() {
    assert_eq!(
        point_error("print Point(1, 1) / Point(1, 0);"),
        RuntimeError::DivisionByZero
    );
}

#[test]
fn test_unknown_field_errors() {
    assert!(matches!(
        point_error("print Point().z;"),
        RuntimeError::UnknownField { .. }
    ));
    assert!(matches!(
        point_error("var p = Point(); p.z = 1;"),
        RuntimeError::UnknownField { .. }
    ));
    assert!(matches!(
        point_error("Point(z: 1);"),
        RuntimeError::UnknownField { .. }
    ));
}

#[test]
fn test_construction_errors() {
    assert!(matches!(
        point_error("Point(1, 2, 3);"),
        RuntimeError::StructArity { got: 3, .. }
    ));
    assert_eq!(
        point_error("var f = 1; f(x: 1);"),
        RuntimeError::ConstructNonStruct("number")
    );
    assert_eq!(
        point_error("fun f() {} f!(x: 1);"),
        RuntimeError::ConstructNonStruct("function")
    );
}

#[test]
fn test_property_access_on_non_instance() {
    assert_eq!(
        point_error("var n = 1; print n.x;"),
        RuntimeError::NotAnInstance("number")
    );
    assert_eq!(
        point_error("var s = \"str\"; s.x = 1;"),
        RuntimeError::NotAnInstance("string")
    );
}

#[test]
fn test_self_referencing_instance_display() {
    assert_eq!(
        with_point("var p = Point(1, 2); p.y = p; print p;"),
        ["Point{x: 1, y: Point{...}}"]
    );
}
