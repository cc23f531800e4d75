//! Mark-sweep garbage collector. The VM hands it a root set (operand
//! stack objects, compile-time constants, globals); everything reachable
//! from the roots survives and has its mark bit reset, everything else
//! is released back to the heap.

use super::heap::{Heap, HeapData};
use super::value::{ObjectId, Value};

#[derive(Debug, Default)]
pub struct Collector;

#[derive(Debug)]
pub struct GcStats {
    pub live: usize,
    pub freed: usize,
}

impl Collector {
    pub fn new() -> Self {
        Self
    }

    pub fn collect(&self, heap: &mut Heap, roots: Vec<ObjectId>) -> GcStats {
        self.mark(heap, roots);
        self.sweep(heap)
    }

    fn mark(&self, heap: &mut Heap, roots: Vec<ObjectId>) {
        let mut worklist = roots;
        while let Some(id) = worklist.pop() {
            if heap.is_marked(id) {
                continue;
            }
            heap.set_marked(id, true);
            trace(heap, id, &mut worklist);
        }
    }

    fn sweep(&self, heap: &mut Heap) -> GcStats {
        let mut stats = GcStats { live: 0, freed: 0 };
        for id in 0..heap.slot_count() {
            if !heap.is_live(id) {
                continue;
            }
            if heap.is_marked(id) {
                heap.set_marked(id, false);
                stats.live += 1;
            } else {
                heap.free(id);
                stats.freed += 1;
            }
        }
        stats
    }
}

/// Push the ids an object points at. Strings, code objects, and natives
/// have no outgoing edges; code constants are kept alive through the
/// compiler's constant root set instead.
fn trace(heap: &Heap, id: ObjectId, worklist: &mut Vec<ObjectId>) {
    match heap.data(id) {
        HeapData::Function(function) => {
            worklist.push(function.code);
            worklist.extend(function.cells.iter().copied());
        }
        HeapData::Cell(value) => {
            if let Value::Object(inner) = value {
                worklist.push(*inner);
            }
        }
        HeapData::Instance(instance) => {
            worklist.push(instance.class);
            for value in instance.properties.values() {
                if let Value::Object(inner) = value {
                    worklist.push(*inner);
                }
            }
        }
        HeapData::Class(class) => {
            if let Some(super_id) = class.super_class {
                worklist.push(super_id);
            }
            for value in class.properties.values() {
                if let Value::Object(inner) = value {
                    worklist.push(*inner);
                }
            }
        }
        HeapData::Str(_) | HeapData::Code(_) | HeapData::Native(_) => {}
    }
}
