//! Tokenizer for the s-expression surface syntax. Balanced parentheses
//! delimit lists, double quotes delimit strings, `//` starts a line
//! comment, and any other run of non-delimiter characters is an atom
//! (a number if it parses as one, a symbol otherwise).

use std::iter::Peekable;
use std::str::Chars;

use super::result::{ParseErr, ParseErrKind, ParseResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    Number(f64),
    Str(String),
    Symbol(String),
}

pub struct Scanner<'a> {
    stream: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Scanner<'a> {
        Scanner { stream: source.chars().peekable() }
    }

    pub fn scan(mut self) -> ParseResult<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            self.skip_whitespace_and_comments();
            let token = match self.stream.next() {
                Some('(') => Token::LeftParen,
                Some(')') => Token::RightParen,
                Some('"') => Token::Str(self.read_string()?),
                Some(c) => self.read_atom(c)?,
                None => break,
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.stream.next_if(|&c| c.is_whitespace()).is_some() {}
            // A comment runs from `//` to the end of the line.
            let mut lookahead = self.stream.clone();
            if lookahead.next() == Some('/') && lookahead.next() == Some('/') {
                while self.stream.next_if(|&c| c != '\n').is_some() {}
            } else {
                break;
            }
        }
    }

    /// Read characters inside quotes into a new string. The returned
    /// string does not include the quotes. Quotes and backslashes can be
    /// embedded by backslash-escaping them.
    fn read_string(&mut self) -> ParseResult<String> {
        let mut string = String::new();
        loop {
            match self.stream.next() {
                Some('\\') => match self.stream.next() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(c) => string.push(c),
                    None => return Err(ParseErr::new(ParseErrKind::UnterminatedStr)),
                },
                Some('"') => break,
                Some(c) => string.push(c),
                None => return Err(ParseErr::new(ParseErrKind::UnterminatedStr)),
            }
        }
        Ok(string)
    }

    /// Read a contiguous run of atom characters. Numbers start with a
    /// digit or with a minus sign directly followed by a digit; `-` on
    /// its own is the subtraction symbol.
    fn read_atom(&mut self, first_char: char) -> ParseResult<Token> {
        let mut text = String::new();
        text.push(first_char);
        while let Some(c) = self
            .stream
            .next_if(|&c| !c.is_whitespace() && c != '(' && c != ')' && c != '"')
        {
            text.push(c);
        }

        let starts_number = first_char.is_ascii_digit()
            || (first_char == '-' && text[1..].starts_with(|c: char| c.is_ascii_digit()));
        if starts_number {
            match text.parse::<f64>() {
                Ok(number) => Ok(Token::Number(number)),
                Err(_) => Err(ParseErr::new(ParseErrKind::InvalidNumber(text))),
            }
        } else {
            Ok(Token::Symbol(text))
        }
    }
}
