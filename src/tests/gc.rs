//! Collection behavior observed through whole programs: orphaned heap
//! objects must not accumulate while everything reachable survives.

use crate::vm::{Value, VM};

#[test]
fn orphaned_strings_are_reclaimed() {
    let mut vm = VM::new();
    let result = vm
        .exec(
            r#"(var i 0)
               (while (< i 200)
                   (begin
                       (+ "hello" ", world")
                       (set i (+ i 1))))
               i"#,
        )
        .unwrap();
    assert_eq!(result, Value::Number(200.0));
    // 200 orphan concatenations would dwarf this bound; the live set
    // after execution is a handful of compile-time objects and natives.
    assert!(
        vm.bytes_allocated() < 16 * 1024,
        "live bytes not bounded: {}",
        vm.bytes_allocated()
    );
    assert!(vm.object_count() < 64, "live objects not bounded: {}", vm.object_count());
}

#[test]
fn orphaned_instances_are_reclaimed() {
    let mut vm = VM::new();
    vm.exec(
        "(class Pair null
             (def constructor (self) self))
         (var i 0)
         (while (< i 100)
             (begin
                 (new Pair)
                 (set i (+ i 1))))
         i",
    )
    .unwrap();
    assert!(vm.object_count() < 64, "live objects not bounded: {}", vm.object_count());
}

#[test]
fn reachable_values_survive_collection_pressure() {
    let mut vm = VM::new();
    // The kept string is threaded through the whole loop while garbage
    // is produced around it; it must survive every cycle intact.
    let result = vm
        .exec(
            r#"(var kept (+ "keep" "-me"))
               (var i 0)
               (while (< i 200)
                   (begin
                       (+ "junk" "-junk")
                       (set i (+ i 1))))
               kept"#,
        )
        .unwrap();
    assert_eq!(vm.format_value(&result), "\"keep-me\"");
}

#[test]
fn closure_cells_survive_collection_pressure() {
    let mut vm = VM::new();
    let result = vm
        .exec(
            r#"(def createCounter ()
                   (begin
                       (var value 0)
                       (def inc () (set value (+ value 1)))
                       inc))
               (var counter (createCounter))
               (var i 0)
               (while (< i 200)
                   (begin
                       (+ "junk" "-junk")
                       (counter)
                       (set i (+ i 1))))
               (counter)"#,
        )
        .unwrap();
    assert_eq!(result, Value::Number(201.0));
}
