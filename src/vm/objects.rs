//! Heap object payloads other than strings and code objects.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::result::RuntimeResult;
use super::value::{ObjectId, Value};
use super::vm::VM;

/// A host callable. By convention it reads its arguments with
/// `vm.peek(i)` (argument order is reversed, so `peek(0)` is the last
/// argument) and leaves exactly one result on top of the stack.
pub type NativeFn = Rc<dyn Fn(&mut VM) -> RuntimeResult>;

#[derive(Clone)]
pub struct Native {
    pub name: String,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Native {{ name: {:?}, arity: {} }}", self.name, self.arity)
    }
}

/// A user function: a code object plus the cells it closes over. The
/// first `free_count` cells (per the code object) are bound when the
/// closure is created; the rest are created by SET_CELL as the function
/// body runs.
#[derive(Clone, Debug)]
pub struct Function {
    pub code: ObjectId,
    pub cells: Vec<ObjectId>,
}

#[derive(Clone, Debug)]
pub struct Class {
    pub name: String,
    pub super_class: Option<ObjectId>,
    pub properties: IndexMap<String, Value>,
}

#[derive(Clone, Debug)]
pub struct Instance {
    pub class: ObjectId,
    pub properties: IndexMap<String, Value>,
}
