use pretty_assertions::assert_eq;

use crate::compiler::CompErrKind;
use crate::result::ExeErrKind;
use crate::vm::{Value, VM};

use super::{eval, eval_err, eval_number};

#[test]
fn var_then_read() {
    assert_eq!(eval_number("(var q 42) q"), 42.0);
}

#[test]
fn set_updates_a_global() {
    assert_eq!(eval_number("(var v 5) (set v (+ v 10)) v"), 15.0);
}

#[test]
fn set_is_an_expression() {
    assert_eq!(eval_number("(var a 1) (var b (set a 5)) (+ a b)"), 10.0);
}

#[test]
fn add_zero_is_idempotent() {
    assert_eq!(eval_number("(var n 3) (set n (+ n 0)) n"), 3.0);
}

#[test]
fn intermediate_results_are_discarded() {
    assert_eq!(eval_number("1 2 3"), 3.0);
}

#[test]
fn exec_is_deterministic_across_fresh_vms() {
    let source = "(var total 0)
                  (for (var i 0) (< i 7) (set i (+ i 1)) (set total (+ total i)))
                  (+ total (square 3))";
    assert_eq!(eval(source), eval(source));
}

#[test]
fn exec_returns_the_final_expression() {
    let mut vm = VM::new();
    let result = vm.exec("(var u 1) (set u 2) (+ u 40)").unwrap();
    assert_eq!(result, Value::Number(42.0));
}

#[test]
fn reading_an_undeclared_name_is_a_reference_error() {
    let err = eval_err("missing");
    assert!(matches!(
        err.kind,
        ExeErrKind::CompErr(CompErrKind::ReferenceErr(_))
    ));
}

#[test]
fn setting_an_undeclared_name_is_a_reference_error() {
    let err = eval_err("(set missing 1)");
    assert!(matches!(
        err.kind,
        ExeErrKind::CompErr(CompErrKind::ReferenceErr(_))
    ));
}

#[test]
fn calling_an_undeclared_name_is_a_reference_error() {
    let err = eval_err("(missing 1 2)");
    assert!(matches!(
        err.kind,
        ExeErrKind::CompErr(CompErrKind::ReferenceErr(_))
    ));
}
