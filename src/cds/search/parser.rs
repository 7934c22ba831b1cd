//! Recursive-descent parser for the token stream produced by [`super::lexer`].
//! Grammar, `and`/`or` at equal precedence, strictly left-to-right
//! (spec §4.C: "operator stack to enforce left-to-right precedence of
//! AND/OR, no precedence between them beyond order"):
//!
//! ```text
//! searchExp := relOrParen ( ("and"|"or") relOrParen )*
//! relOrParen := "(" searchExp ")" | property ("exists" bool | op value)
//! ```
//!
//! `a or b and c` parses as `(a or b) and c`, not `a or (b and c)`.

use super::ast::{CompareOp, Property, SearchExpr};
use super::lexer::{tokenize, LexError, Token};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("unexpected end of search criteria")]
    UnexpectedEnd,
    #[error("expected {expected}, found {found:?}")]
    Expected { expected: &'static str, found: Token },
    #[error("unknown operator {0}")]
    UnknownOp(String),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    /// Folds a left-to-right chain of `and`/`or` terms, combining each new
    /// operator with whatever has been built so far rather than grouping
    /// all `and`s (or all `or`s) together first.
    fn search_expr(&mut self) -> Result<SearchExpr, ParseError> {
        let mut expr = self.term()?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.bump();
                    let rhs = self.term()?;
                    expr = SearchExpr::And(vec![expr, rhs]);
                }
                Some(Token::Or) => {
                    self.bump();
                    let rhs = self.term()?;
                    expr = SearchExpr::Or(vec![expr, rhs]);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<SearchExpr, ParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.bump();
            let inner = self.search_expr()?;
            return match self.bump() {
                Some(Token::RParen) => Ok(inner),
                Some(other) => Err(ParseError::Expected { expected: ")", found: other }),
                None => Err(ParseError::UnexpectedEnd),
            };
        }

        let property = match self.bump() {
            Some(Token::Property(p)) => Property::parse(&p),
            Some(other) => return Err(ParseError::Expected { expected: "property", found: other }),
            None => return Err(ParseError::UnexpectedEnd),
        };

        match self.bump() {
            Some(Token::Exists) => {
                let truth = match self.bump() {
                    Some(Token::True) => true,
                    Some(Token::False) => false,
                    Some(other) => return Err(ParseError::Expected { expected: "true|false", found: other }),
                    None => return Err(ParseError::UnexpectedEnd),
                };
                Ok(SearchExpr::Rel { property, op: CompareOp::Exists(truth), value: String::new() })
            }
            Some(Token::Op(op)) => {
                let value = match self.bump() {
                    Some(Token::QuotedString(s)) => s,
                    Some(Token::Property(s)) => s,
                    Some(other) => return Err(ParseError::Expected { expected: "value", found: other }),
                    None => return Err(ParseError::UnexpectedEnd),
                };
                let op = match op.as_str() {
                    "=" => CompareOp::Eq,
                    "!=" => CompareOp::Ne,
                    "<" => CompareOp::Lt,
                    "<=" => CompareOp::Le,
                    ">" => CompareOp::Gt,
                    ">=" => CompareOp::Ge,
                    "contains" => CompareOp::Contains,
                    "doesnotcontain" => CompareOp::DoesNotContain,
                    "startswith" => CompareOp::StartsWith,
                    "derivedfrom" => CompareOp::DerivedFrom,
                    other => return Err(ParseError::UnknownOp(other.to_string())),
                };
                Ok(SearchExpr::Rel { property, op, value })
            }
            Some(other) => Err(ParseError::Expected { expected: "operator", found: other }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// Parses a full `SearchCriteria` string. A bare `*` means "match
/// everything" and is represented as `@id exists true`.
pub fn parse(input: &str) -> Result<SearchExpr, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(SearchExpr::Rel { property: Property::Id, op: CompareOp::Exists(true), value: String::new() });
    }
    let tokens = tokenize(trimmed)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.search_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ParseError::Expected {
            expected: "end of input",
            found: parser.tokens[parser.pos].clone(),
        });
    }
    Ok(expr)
}
