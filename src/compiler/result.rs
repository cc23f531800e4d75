use std::fmt;

pub type CompResult<T> = Result<T, CompErr>;

#[derive(Debug)]
pub struct CompErr {
    pub kind: CompErrKind,
}

impl CompErr {
    pub fn new(kind: CompErrKind) -> Self {
        Self { kind }
    }

    pub fn reference<S: Into<String>>(name: S) -> Self {
        Self::new(CompErrKind::ReferenceErr(name.into()))
    }

    pub fn syntax<S: Into<String>>(message: S) -> Self {
        Self::new(CompErrKind::SyntaxErr(message.into()))
    }
}

#[derive(Debug, PartialEq)]
pub enum CompErrKind {
    /// An undeclared name was read or assigned.
    ReferenceErr(String),
    SyntaxErr(String),
    UnknownClass(String),
    NoSuperclass(String),
    /// Class methods are compiled to constants and cannot close over
    /// enclosing variables.
    MethodCaptures(String),
    TooManyConstants(String),
    TooManyLocals(String),
    TooManyCells(String),
    TooManyGlobals,
    TooManyArgs(usize),
    CodeTooLarge(String),
}

impl fmt::Display for CompErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for CompErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CompErrKind::*;
        match self {
            ReferenceErr(name) => write!(f, "Reference error: {name} is not defined"),
            SyntaxErr(message) => write!(f, "Syntax error: {message}"),
            UnknownClass(name) => write!(f, "Unknown class: {name}"),
            NoSuperclass(name) => write!(f, "Class {name} has no superclass"),
            MethodCaptures(name) => {
                write!(f, "Method {name} cannot capture enclosing variables")
            }
            TooManyConstants(code) => write!(f, "Too many constants in {code}"),
            TooManyLocals(code) => write!(f, "Too many locals in {code}"),
            TooManyCells(code) => write!(f, "Too many cells in {code}"),
            TooManyGlobals => write!(f, "Too many globals"),
            TooManyArgs(count) => write!(f, "Too many call arguments: {count}"),
            CodeTooLarge(code) => write!(f, "Code unit too large: {code}"),
        }
    }
}
