use std::fmt;

pub type ParseResult<T> = Result<T, ParseErr>;

#[derive(Debug)]
pub struct ParseErr {
    pub kind: ParseErrKind,
}

impl ParseErr {
    pub fn new(kind: ParseErrKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, PartialEq)]
pub enum ParseErrKind {
    UnexpectedEof,
    UnexpectedToken(String),
    InvalidNumber(String),
    UnterminatedStr,
}

impl fmt::Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for ParseErrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ParseErrKind::*;
        match self {
            UnexpectedEof => write!(f, "Unexpected end of input"),
            UnexpectedToken(token) => write!(f, "Unexpected token: {token}"),
            InvalidNumber(text) => write!(f, "Invalid number literal: {text}"),
            UnterminatedStr => write!(f, "Unterminated string literal"),
        }
    }
}
