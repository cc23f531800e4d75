pub use ast::{Expr, ExprKind, NodeId};
pub use parser::Parser;
pub use result::{ParseErr, ParseErrKind, ParseResult};
pub use scanner::{Scanner, Token};

mod ast;
mod parser;
mod result;
mod scanner;
