use pretty_assertions::assert_eq;

use crate::result::ExeErrKind;
use crate::vm::RuntimeErrKind;

use super::{eval_err, eval_formatted, eval_number};

#[test]
fn add_two() {
    assert_eq!(eval_number("(+ 2 3)"), 5.0);
}

#[test]
fn add_nested() {
    assert_eq!(eval_number("(+ 2 (+ 3 1))"), 6.0);
}

#[test]
fn sub_two() {
    assert_eq!(eval_number("(- 2 1)"), 1.0);
}

#[test]
fn mul_two() {
    assert_eq!(eval_number("(* 2 8)"), 16.0);
}

#[test]
fn div_two() {
    assert_eq!(eval_number("(/ 9 2)"), 4.5);
}

#[test]
fn operands_evaluate_left_to_right() {
    assert_eq!(eval_number("(- (* 3 4) (/ 10 5))"), 10.0);
}

#[test]
fn negative_literals() {
    assert_eq!(eval_number("(+ -2 5)"), 3.0);
}

#[test]
fn add_concatenates_strings() {
    assert_eq!(eval_formatted(r#"(+ "hello" ", world")"#), "\"hello, world\"");
}

#[test]
fn add_mismatched_kinds_is_a_type_error() {
    let err = eval_err(r#"(+ 2 "a")"#);
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}

#[test]
fn sub_requires_numbers() {
    let err = eval_err(r#"(- "a" "b")"#);
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}
