pub use compiler::{CompiledProgram, Compiler};
pub use result::{CompErr, CompErrKind, CompResult};
pub use scope::{Allocation, Analyzer, Scope, ScopeId, ScopeKind, ScopeTree};

mod compiler;
mod result;
mod scope;
