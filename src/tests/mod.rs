//! End-to-end suites: each test compiles and runs real source on a
//! fresh VM and checks the value of the final top-level expression.

use crate::result::ExeErr;
use crate::vm::{Value, VM};

mod branching;
mod classes;
mod comparison;
mod gc;
mod host;
mod math;
mod variables;

pub(crate) fn eval(source: &str) -> Value {
    let mut vm = VM::new();
    match vm.exec(source) {
        Ok(value) => value,
        Err(err) => panic!("exec failed: {err}"),
    }
}

pub(crate) fn eval_number(source: &str) -> f64 {
    match eval(source) {
        Value::Number(number) => number,
        other => panic!("expected a number, got {other:?}"),
    }
}

pub(crate) fn eval_boolean(source: &str) -> bool {
    match eval(source) {
        Value::Boolean(boolean) => boolean,
        other => panic!("expected a boolean, got {other:?}"),
    }
}

/// Run source and format the result with the VM that produced it, so
/// heap values (strings, instances) can be checked too.
pub(crate) fn eval_formatted(source: &str) -> String {
    let mut vm = VM::new();
    match vm.exec(source) {
        Ok(value) => vm.format_value(&value),
        Err(err) => panic!("exec failed: {err}"),
    }
}

pub(crate) fn eval_err(source: &str) -> ExeErr {
    match VM::new().exec(source) {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(err) => err,
    }
}
