use crate::result::ExeErrKind;
use crate::vm::RuntimeErrKind;

use super::{eval_boolean, eval_err};

#[test]
fn number_comparisons() {
    assert!(eval_boolean("(< 2 3)"));
    assert!(eval_boolean("(> 3 2)"));
    assert!(eval_boolean("(== 2 2)"));
    assert!(eval_boolean("(<= 2 2)"));
    assert!(eval_boolean("(>= 3 3)"));
    assert!(eval_boolean("(!= 2 3)"));
    assert!(!eval_boolean("(< 3 2)"));
}

#[test]
fn string_comparisons() {
    assert!(eval_boolean(r#"(== "abc" "abc")"#));
    assert!(eval_boolean(r#"(< "abc" "abd")"#));
    assert!(eval_boolean(r#"(!= "a" "b")"#));
}

#[test]
fn mixed_kinds_are_a_type_error() {
    let err = eval_err(r#"(< 1 "a")"#);
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}

#[test]
fn booleans_do_not_compare() {
    let err = eval_err("(< true false)");
    assert!(matches!(err.kind, ExeErrKind::RuntimeErr(RuntimeErrKind::TypeErr(_))));
}
