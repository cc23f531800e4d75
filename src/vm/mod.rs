pub use code::{Code, LocalVar};
pub use gc::{Collector, GcStats};
pub use globals::{GlobalTable, GlobalVar};
pub use heap::{Heap, HeapData};
pub use objects::{Class, Function, Instance, Native, NativeFn};
pub use opcode::{compare_op_name, Opcode};
pub use result::{RuntimeErr, RuntimeErrKind, RuntimeResult};
pub use value::{ObjectId, Value};
pub use vm::{GC_THRESHOLD, STACK_LIMIT, VM};

mod code;
mod gc;
mod globals;
mod heap;
mod objects;
mod opcode;
mod result;
mod value;
mod vm;
