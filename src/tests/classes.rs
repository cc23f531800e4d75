use pretty_assertions::assert_eq;

use crate::compiler::CompErrKind;
use crate::result::ExeErrKind;
use crate::vm::RuntimeErrKind;

use super::{eval_err, eval_formatted, eval_number};

#[test]
fn basic_class_with_constructor_and_method() {
    assert_eq!(
        eval_number(
            "(class Point null
                 (def constructor (self px py)
                     (begin
                         (set (prop self px) px)
                         (set (prop self py) py)
                         self))
                 (def calc (self)
                     (+ (prop self px) (prop self py))))
             (var p (new Point 10 20))
             ((prop p calc) p)"
        ),
        30.0
    );
}

#[test]
fn instance_properties_are_readable_and_writable() {
    assert_eq!(
        eval_number(
            "(class Box null
                 (def constructor (self v)
                     (begin
                         (set (prop self v) v)
                         self)))
             (var b (new Box 5))
             (set (prop b v) 9)
             (prop b v)"
        ),
        9.0
    );
}

#[test]
fn property_set_is_an_expression() {
    assert_eq!(
        eval_number(
            "(class Box null
                 (def constructor (self v)
                     (begin
                         (set (prop self v) v)
                         self)))
             (var b (new Box 1))
             (+ (set (prop b v) 20) (prop b v))"
        ),
        40.0
    );
}

#[test]
fn inheritance_with_super_dispatch() {
    assert_eq!(
        eval_number(
            "(class Point null
                 (def constructor (self px py)
                     (begin
                         (set (prop self px) px)
                         (set (prop self py) py)
                         self))
                 (def calc (self)
                     (+ (prop self px) (prop self py))))
             (class Point3D Point
                 (def constructor (self px py pz)
                     (begin
                         ((prop (super Point3D) constructor) self px py)
                         (set (prop self pz) pz)
                         self))
                 (def calc (self)
                     (+ ((prop (super Point3D) calc) self) (prop self pz))))
             (var p (new Point3D 10 20 30))
             ((prop p calc) p)"
        ),
        60.0
    );
}

#[test]
fn inherited_methods_resolve_through_the_chain() {
    assert_eq!(
        eval_number(
            "(class Base null
                 (def constructor (self) self)
                 (def ten (self) 10))
             (class Derived Base
                 (def constructor (self) self))
             (var d (new Derived))
             ((prop d ten) d)"
        ),
        10.0
    );
}

#[test]
fn class_expression_evaluates_to_the_class() {
    assert_eq!(
        eval_formatted("(class Empty null (def constructor (self) self))"),
        "<class Empty>"
    );
}

#[test]
fn unresolved_property_is_a_property_error() {
    let err = eval_err(
        "(class Box null (def constructor (self) self))
         (var b (new Box))
         (prop b nope)",
    );
    assert!(matches!(
        err.kind,
        ExeErrKind::RuntimeErr(RuntimeErrKind::PropertyErr(_))
    ));
}

#[test]
fn property_read_on_a_number_is_a_type_error() {
    let err = eval_err("(var n 5) (prop n v)");
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}

#[test]
fn property_assignment_on_a_class_is_a_type_error() {
    let err = eval_err(
        "(class Box null (def constructor (self) self))
         (set (prop Box v) 1)",
    );
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}

#[test]
fn extending_an_unknown_class_fails_at_compile_time() {
    let err = eval_err("(class Orphan Ghost (def constructor (self) self))");
    assert!(matches!(err.kind, ExeErrKind::CompErr(CompErrKind::UnknownClass(_))));
}

#[test]
fn super_on_a_base_class_fails_at_compile_time() {
    let err = eval_err(
        "(class Base null
             (def constructor (self) (begin (super Base) self)))",
    );
    assert!(matches!(err.kind, ExeErrKind::CompErr(CompErrKind::NoSuperclass(_))));
}

#[test]
fn methods_cannot_capture_enclosing_variables() {
    let err = eval_err(
        "(def outer ()
             (begin
                 (var v 1)
                 (class Leaky null
                     (def constructor (self) (begin v self)))
                 0))
         (outer)",
    );
    assert!(matches!(err.kind, ExeErrKind::CompErr(CompErrKind::MethodCaptures(_))));
}
