//! Top-level result types for running source on a VM. Any stage can
//! fail; every failure unwinds the whole run.

use std::fmt;

use crate::compiler::{CompErr, CompErrKind};
use crate::parser::{ParseErr, ParseErrKind};
use crate::vm::{RuntimeErr, RuntimeErrKind, Value};

pub type ExeResult = Result<Value, ExeErr>;

#[derive(Debug)]
pub struct ExeErr {
    pub kind: ExeErrKind,
}

impl ExeErr {
    pub fn new(kind: ExeErrKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug)]
pub enum ExeErrKind {
    ParseErr(ParseErrKind),
    CompErr(CompErrKind),
    RuntimeErr(RuntimeErrKind),
}

impl From<ParseErr> for ExeErr {
    fn from(err: ParseErr) -> Self {
        Self::new(ExeErrKind::ParseErr(err.kind))
    }
}

impl From<CompErr> for ExeErr {
    fn from(err: CompErr) -> Self {
        Self::new(ExeErrKind::CompErr(err.kind))
    }
}

impl From<RuntimeErr> for ExeErr {
    fn from(err: RuntimeErr) -> Self {
        Self::new(ExeErrKind::RuntimeErr(err.kind))
    }
}

impl fmt::Display for ExeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExeErrKind::ParseErr(kind) => write!(f, "{kind}"),
            ExeErrKind::CompErr(kind) => write!(f, "{kind}"),
            ExeErrKind::RuntimeErr(kind) => write!(f, "{kind}"),
        }
    }
}
