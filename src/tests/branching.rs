use pretty_assertions::assert_eq;

use super::{eval_boolean, eval_number};

#[test]
fn if_takes_the_consequent_when_true() {
    assert_eq!(eval_number("(if (< 2 3) 1 2)"), 1.0);
}

#[test]
fn if_takes_the_alternate_when_false() {
    assert_eq!(eval_number("(if (> 2 3) 1 2)"), 2.0);
}

#[test]
fn if_without_alternate_evaluates_to_false() {
    assert!(!eval_boolean("(if (> 2 3) 1)"));
    assert_eq!(eval_number("(if (< 2 3) 1)"), 1.0);
}

#[test]
fn if_branches_nest() {
    assert_eq!(eval_number("(if (< 2 3) (if (> 5 4) 10 20) 30)"), 10.0);
}

#[test]
fn while_counts_down() {
    assert_eq!(
        eval_number("(var i 10) (while (> i 0) (set i (- i 1))) i"),
        0.0
    );
}

#[test]
fn while_expression_evaluates_to_false() {
    assert!(!eval_boolean("(while false 1)"));
}

#[test]
fn while_body_never_runs_when_test_is_false() {
    assert_eq!(eval_number("(var n 5) (while (> 0 1) (set n 99)) n"), 5.0);
}

#[test]
fn for_loop_runs_the_body_ten_times() {
    assert_eq!(
        eval_number(
            "(var count 0)
             (for (var i 0) (< i 10) (set i (+ i 1)) (begin (set count (+ count 1))))
             count"
        ),
        10.0
    );
}

#[test]
fn for_step_runs_after_the_body() {
    // The body sees i before each step: 0 + 1 + 2 + 3 + 4.
    assert_eq!(
        eval_number(
            "(var total 0)
             (for (var i 0) (< i 5) (set i (+ i 1)) (set total (+ total i)))
             total"
        ),
        10.0
    );
}

#[test]
fn loops_nest() {
    assert_eq!(
        eval_number(
            "(var total 0)
             (for (var a 0) (< a 3) (set a (+ a 1))
               (for (var b 0) (< b 3) (set b (+ b 1))
                 (set total (+ total 1))))
             total"
        ),
        9.0
    );
}
