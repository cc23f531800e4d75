//! Host API: registering constants and native functions, and the
//! operand stack contract natives rely on.

use pretty_assertions::assert_eq;

use crate::vm::{RuntimeErrKind, Value, STACK_LIMIT, VM};

#[test]
fn host_registered_natives_and_constants() {
    let mut vm = VM::new();
    vm.add_const("z", 7.0);
    vm.add_native_function(
        "cube",
        |vm| {
            let n = vm.peek(0)?.as_number()?;
            vm.push(Value::Number(n * n * n))
        },
        1,
    );
    let result = vm.exec("(cube z)").unwrap();
    assert_eq!(result, Value::Number(343.0));
}

#[test]
fn natives_read_arguments_in_reverse_peek_order() {
    let mut vm = VM::new();
    vm.add_native_function(
        "minus",
        |vm| {
            let b = vm.peek(0)?.as_number()?;
            let a = vm.peek(1)?.as_number()?;
            vm.push(Value::Number(a - b))
        },
        2,
    );
    let result = vm.exec("(minus 10 4)").unwrap();
    assert_eq!(result, Value::Number(6.0));
}

#[test]
fn native_results_can_feed_user_code() {
    let mut vm = VM::new();
    vm.add_native_function(
        "seven",
        |vm| vm.push(Value::Number(7.0)),
        0,
    );
    let result = vm.exec("(def double (n) (* n 2)) (double (seven))").unwrap();
    assert_eq!(result, Value::Number(14.0));
}

#[test]
fn pushing_a_full_stack_overflows() {
    let mut vm = VM::new();
    for _ in 0..STACK_LIMIT {
        vm.push(Value::Number(0.0)).unwrap();
    }
    let err = vm.push(Value::Number(0.0)).unwrap_err();
    assert_eq!(err.kind, RuntimeErrKind::StackOverflow);
}

#[test]
fn emptying_and_refilling_the_stack_succeeds() {
    let mut vm = VM::new();
    for _ in 0..STACK_LIMIT {
        vm.push(Value::Number(1.0)).unwrap();
    }
    for _ in 0..STACK_LIMIT {
        vm.pop().unwrap();
    }
    let err = vm.pop().unwrap_err();
    assert_eq!(err.kind, RuntimeErrKind::StackUnderflow);
    vm.push(Value::Number(2.0)).unwrap();
    assert_eq!(vm.peek(0).unwrap(), Value::Number(2.0));
}
