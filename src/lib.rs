//! Lilt is a small dynamically typed Lisp-like language compiled ahead of
//! time to bytecode and executed by a stack-based virtual machine with a
//! mark-sweep garbage collector.
//!
//! The pipeline: the parser turns source text into an expression tree, the
//! scope analyzer classifies every name as global, stack-local, or
//! heap-promoted cell, the compiler lowers the tree into per-function code
//! objects, and the VM executes the main function until it halts.

pub use result::{ExeErr, ExeErrKind, ExeResult};
pub use vm::{Value, VM};

pub mod cli;
pub mod compiler;
pub mod dis;
pub mod parser;
pub mod result;
pub mod util;
pub mod vm;

#[cfg(test)]
mod tests;
