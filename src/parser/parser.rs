//! Recursive-descent parser producing the expression tree consumed by the
//! scope analyzer and the compiler. Each node gets a unique id so scope
//! records can be keyed by expression identity.

use super::ast::{Expr, ExprKind, NodeId};
use super::result::{ParseErr, ParseErrKind, ParseResult};
use super::scanner::{Scanner, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    next_id: NodeId,
}

impl Parser {
    /// Parse a single expression from source text. Callers that want a
    /// whole program wrap the source in an implicit `(begin ...)`.
    pub fn parse(source: &str) -> ParseResult<Expr> {
        let tokens = Scanner::new(source).scan()?;
        let mut parser = Parser { tokens, pos: 0, next_id: 0 };
        let expr = parser.expression()?;
        match parser.next() {
            None => Ok(expr),
            Some(token) => {
                Err(ParseErr::new(ParseErrKind::UnexpectedToken(format!("{token:?}"))))
            }
        }
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Number(number)) => Ok(self.node(ExprKind::Number(number))),
            Some(Token::Str(text)) => Ok(self.node(ExprKind::Str(text))),
            Some(Token::Symbol(name)) => Ok(self.node(ExprKind::Symbol(name))),
            Some(Token::LeftParen) => self.list(),
            Some(Token::RightParen) => {
                Err(ParseErr::new(ParseErrKind::UnexpectedToken(")".to_owned())))
            }
            None => Err(ParseErr::new(ParseErrKind::UnexpectedEof)),
        }
    }

    fn list(&mut self) -> ParseResult<Expr> {
        let mut children = vec![];
        loop {
            match self.peek() {
                Some(Token::RightParen) => {
                    self.next();
                    return Ok(self.node(ExprKind::List(children)));
                }
                Some(_) => children.push(self.expression()?),
                None => return Err(ParseErr::new(ParseErrKind::UnexpectedEof)),
            }
        }
    }

    fn node(&mut self, kind: ExprKind) -> Expr {
        let id = self.next_id;
        self.next_id += 1;
        Expr { id, kind }
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_atom() {
        let expr = Parser::parse("42").unwrap();
        assert_eq!(expr.kind, ExprKind::Number(42.0));
    }

    #[test]
    fn parse_nested_list() {
        let expr = Parser::parse("(+ 2 (* 3 4))").unwrap();
        let children = expr.as_list().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].as_symbol(), Some("+"));
        assert!(children[2].is_tagged("*"));
    }

    #[test]
    fn parse_assigns_unique_ids() {
        let expr = Parser::parse("(begin (var x 1) x)").unwrap();
        let mut ids = vec![];
        fn collect(expr: &Expr, ids: &mut Vec<usize>) {
            ids.push(expr.id);
            if let Some(children) = expr.as_list() {
                for child in children {
                    collect(child, ids);
                }
            }
        }
        collect(&expr, &mut ids);
        let count = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    #[test]
    fn parse_unbalanced() {
        let err = Parser::parse("(begin (var x 1)").unwrap_err();
        assert_eq!(err.kind, ParseErrKind::UnexpectedEof);
        let err = Parser::parse(")").unwrap_err();
        assert!(matches!(err.kind, ParseErrKind::UnexpectedToken(_)));
    }

    #[test]
    fn parse_trailing_tokens() {
        let err = Parser::parse("1 2").unwrap_err();
        assert!(matches!(err.kind, ParseErrKind::UnexpectedToken(_)));
    }
}
