// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Content filter expressions over `ShapeType` fields.
//!
//! ```text
//! expression ::= term (OR term)*
//! term       ::= factor (AND factor)*
//! factor     ::= NOT factor | '(' expression ')' | operand op operand
//! operand    ::= field | integer | 'string' | %n
//! op         ::= = | == | <> | != | < | <= | > | >= | LIKE | MATCH
//! field      ::= color | x | y | shapesize
//! ```
//!
//! `LIKE` uses SQL wildcards (`%`, `_`); `MATCH` uses glob wildcards (`*`, `?`).
//! Parameters may be given bare (`BLUE`) or quoted (`'BLUE'`).

use crate::qos::wildcard_match;
use crate::shape::ShapeType;
use std::fmt;

/// Errors raised while building or evaluating a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    ParseError(String),
    UnknownField(String),
    ParameterOutOfRange(usize),
    TypeMismatch(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::ParseError(msg) => write!(f, "parse error: {}", msg),
            FilterError::UnknownField(name) => write!(f, "unknown field: {}", name),
            FilterError::ParameterOutOfRange(idx) => write!(f, "parameter %{} not supplied", idx),
            FilterError::TypeMismatch(msg) => write!(f, "type mismatch: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Match,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Color,
    X,
    Y,
    Shapesize,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "color" => Some(Field::Color),
            "x" => Some(Field::X),
            "y" => Some(Field::Y),
            "shapesize" => Some(Field::Shapesize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(Field),
    Integer(i64),
    String(String),
    Parameter(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Expression {
    Comparison {
        left: Operand,
        op: Operator,
        right: Operand,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    Integer(i64),
    String(String),
    Parameter(usize),
    Operator(Operator),
    And,
    Or,
    Not,
    LParen,
    RParen,
    Eof,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.input[start..self.pos]
    }

    fn next_token(&mut self) -> Result<Token, FilterError> {
        self.take_while(char::is_whitespace);

        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };

        let token = match ch {
            '(' => {
                self.bump();
                Token::LParen
            }
            ')' => {
                self.bump();
                Token::RParen
            }
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                }
                Token::Operator(Operator::Eq)
            }
            '!' => {
                self.bump();
                if self.bump() != Some('=') {
                    return Err(FilterError::ParseError("expected '=' after '!'".into()));
                }
                Token::Operator(Operator::Ne)
            }
            '<' => {
                self.bump();
                match self.peek() {
                    Some('=') => {
                        self.bump();
                        Token::Operator(Operator::Le)
                    }
                    Some('>') => {
                        self.bump();
                        Token::Operator(Operator::Ne)
                    }
                    _ => Token::Operator(Operator::Lt),
                }
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Token::Operator(Operator::Ge)
                } else {
                    Token::Operator(Operator::Gt)
                }
            }
            '%' => {
                self.bump();
                let digits = self.take_while(|c| c.is_ascii_digit());
                let idx = digits
                    .parse()
                    .map_err(|_| FilterError::ParseError("expected digit after '%'".into()))?;
                Token::Parameter(idx)
            }
            '\'' | '"' => {
                self.bump();
                let text = self.take_while(|c| c != ch);
                if self.bump() != Some(ch) {
                    return Err(FilterError::ParseError("unterminated string".into()));
                }
                Token::String(text.to_string())
            }
            c if c.is_ascii_digit() || c == '-' => {
                self.bump();
                let digits = self.take_while(|c| c.is_ascii_digit());
                let text = format!("{}{}", c, digits);
                let value = text
                    .parse()
                    .map_err(|_| FilterError::ParseError(format!("bad number '{}'", text)))?;
                Token::Integer(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let ident = self.take_while(|c| c.is_alphanumeric() || c == '_');
                match ident.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "LIKE" => Token::Operator(Operator::Like),
                    "MATCH" => Token::Operator(Operator::Match),
                    _ => Token::Identifier(ident.to_string()),
                }
            }
            other => {
                return Err(FilterError::ParseError(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        };
        Ok(token)
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, FilterError> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self { lexer, current })
    }

    fn advance(&mut self) -> Result<Token, FilterError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn parse(mut self) -> Result<Expression, FilterError> {
        let expr = self.parse_or()?;
        if self.current != Token::Eof {
            return Err(FilterError::ParseError(format!(
                "unexpected trailing {:?}",
                self.current
            )));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_and()?;
        while self.current == Token::Or {
            self.advance()?;
            left = Expression::Or(Box::new(left), Box::new(self.parse_and()?));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, FilterError> {
        let mut left = self.parse_factor()?;
        while self.current == Token::And {
            self.advance()?;
            left = Expression::And(Box::new(left), Box::new(self.parse_factor()?));
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expression, FilterError> {
        match self.current {
            Token::Not => {
                self.advance()?;
                Ok(Expression::Not(Box::new(self.parse_factor()?)))
            }
            Token::LParen => {
                self.advance()?;
                let expr = self.parse_or()?;
                if self.advance()? != Token::RParen {
                    return Err(FilterError::ParseError("expected ')'".into()));
                }
                Ok(expr)
            }
            _ => {
                let left = self.parse_operand()?;
                let op = match self.advance()? {
                    Token::Operator(op) => op,
                    other => {
                        return Err(FilterError::ParseError(format!(
                            "expected operator, got {:?}",
                            other
                        )))
                    }
                };
                let right = self.parse_operand()?;
                Ok(Expression::Comparison { left, op, right })
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        match self.advance()? {
            Token::Identifier(name) => Field::from_name(&name)
                .map(Operand::Field)
                .ok_or(FilterError::UnknownField(name)),
            Token::Integer(n) => Ok(Operand::Integer(n)),
            Token::String(s) => Ok(Operand::String(s)),
            Token::Parameter(idx) => Ok(Operand::Parameter(idx)),
            other => Err(FilterError::ParseError(format!(
                "expected value, got {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value<'a> {
    Integer(i64),
    String(&'a str),
}

/// A parsed filter with its parameters bound.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    expression: String,
    parsed: Expression,
    parameters: Vec<String>,
}

impl ContentFilter {
    /// Parse `expression` and bind `parameters`.
    ///
    /// Fails if the syntax is invalid, a field is unknown, or a `%n` has no parameter.
    pub fn new(expression: &str, parameters: Vec<String>) -> Result<Self, FilterError> {
        let parsed = Parser::new(expression)?.parse()?;
        let parameters: Vec<String> = parameters.into_iter().map(unquote).collect();
        check_parameters(&parsed, parameters.len())?;
        Ok(Self {
            expression: expression.to_string(),
            parsed,
            parameters,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn matches(&self, shape: &ShapeType) -> Result<bool, FilterError> {
        self.evaluate(&self.parsed, shape)
    }

    fn evaluate(&self, expr: &Expression, shape: &ShapeType) -> Result<bool, FilterError> {
        match expr {
            Expression::And(l, r) => Ok(self.evaluate(l, shape)? && self.evaluate(r, shape)?),
            Expression::Or(l, r) => Ok(self.evaluate(l, shape)? || self.evaluate(r, shape)?),
            Expression::Not(inner) => Ok(!self.evaluate(inner, shape)?),
            Expression::Comparison { left, op, right } => {
                let left = self.resolve(left, shape);
                let right = self.resolve(right, shape);
                compare(&left, *op, &right)
            }
        }
    }

    fn resolve<'s>(&'s self, operand: &'s Operand, shape: &'s ShapeType) -> Value<'s> {
        match operand {
            Operand::Field(Field::Color) => Value::String(&shape.color),
            Operand::Field(Field::X) => Value::Integer(shape.x as i64),
            Operand::Field(Field::Y) => Value::Integer(shape.y as i64),
            Operand::Field(Field::Shapesize) => Value::Integer(shape.shapesize as i64),
            Operand::Integer(n) => Value::Integer(*n),
            Operand::String(s) => Value::String(s),
            Operand::Parameter(idx) => {
                // bound in `new`
                let param = self.parameters[*idx].as_str();
                match param.parse::<i64>() {
                    Ok(n) => Value::Integer(n),
                    Err(_) => Value::String(param),
                }
            }
        }
    }
}

fn compare(left: &Value<'_>, op: Operator, right: &Value<'_>) -> Result<bool, FilterError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => match op {
            Operator::Like | Operator::Match => Err(FilterError::TypeMismatch(
                "pattern operators need string operands".into(),
            )),
            _ => Ok(ordering(op, a.cmp(b))),
        },
        (Value::String(a), Value::String(b)) => Ok(match op {
            Operator::Like => like_match(a, b),
            Operator::Match => wildcard_match(b, a),
            _ => ordering(op, a.cmp(b)),
        }),
        _ => Err(FilterError::TypeMismatch(format!(
            "cannot compare {:?} with {:?}",
            left, right
        ))),
    }
}

fn ordering(op: Operator, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        Operator::Eq => ord == Equal,
        Operator::Ne => ord != Equal,
        Operator::Lt => ord == Less,
        Operator::Le => ord != Greater,
        Operator::Gt => ord == Greater,
        Operator::Ge => ord != Less,
        Operator::Like | Operator::Match => false,
    }
}

/// SQL LIKE: `%` any run, `_` one character.
fn like_match(text: &str, pattern: &str) -> bool {
    let glob: String = pattern
        .chars()
        .map(|c| match c {
            '%' => '*',
            '_' => '?',
            other => other,
        })
        .collect();
    wildcard_match(&glob, text)
}

fn unquote(param: String) -> String {
    let trimmed = param.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        param
    }
}

fn check_parameters(expr: &Expression, count: usize) -> Result<(), FilterError> {
    let check = |operand: &Operand| match operand {
        Operand::Parameter(idx) if *idx >= count => Err(FilterError::ParameterOutOfRange(*idx)),
        _ => Ok(()),
    };
    match expr {
        Expression::Comparison { left, right, .. } => {
            check(left)?;
            check(right)
        }
        Expression::And(l, r) | Expression::Or(l, r) => {
            check_parameters(l, count)?;
            check_parameters(r, count)
        }
        Expression::Not(inner) => check_parameters(inner, count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(color: &str, x: i32, y: i32, size: i32) -> ShapeType {
        ShapeType::new(color, x, y, size)
    }

    #[test]
    fn test_color_parameter() {
        let filter = ContentFilter::new("color = %0", vec!["BLUE".into()]).unwrap();
        assert!(filter.matches(&shape("BLUE", 1, 1, 20)).unwrap());
        assert!(!filter.matches(&shape("RED", 1, 1, 20)).unwrap());
    }

    #[test]
    fn test_quoted_parameter_and_match() {
        let filter = ContentFilter::new("color MATCH %0", vec!["'BLUE'".into()]).unwrap();
        assert!(filter.matches(&shape("BLUE", 0, 0, 1)).unwrap());
        let glob = ContentFilter::new("color MATCH 'GR*'", vec![]).unwrap();
        assert!(glob.matches(&shape("GREEN2", 0, 0, 1)).unwrap());
        assert!(!glob.matches(&shape("RED", 0, 0, 1)).unwrap());
    }

    #[test]
    fn test_numeric_and_logic() {
        let filter =
            ContentFilter::new("shapesize <= 20 AND (x > 100 OR NOT y < 50)", vec![]).unwrap();
        assert!(filter.matches(&shape("A", 150, 0, 20)).unwrap());
        assert!(filter.matches(&shape("A", 0, 60, 10)).unwrap());
        assert!(!filter.matches(&shape("A", 0, 10, 10)).unwrap());
        assert!(!filter.matches(&shape("A", 150, 0, 21)).unwrap());
    }

    #[test]
    fn test_like() {
        let filter = ContentFilter::new("color LIKE 'B_U%'", vec![]).unwrap();
        assert!(filter.matches(&shape("BLUE", 0, 0, 1)).unwrap());
        assert!(!filter.matches(&shape("BLACK", 0, 0, 1)).unwrap());
    }

    #[test]
    fn test_rejects_bad_expressions() {
        assert_eq!(
            ContentFilter::new("colour = 'RED'", vec![]).unwrap_err(),
            FilterError::UnknownField("colour".into())
        );
        assert_eq!(
            ContentFilter::new("color = %1", vec!["RED".into()]).unwrap_err(),
            FilterError::ParameterOutOfRange(1)
        );
        assert!(matches!(
            ContentFilter::new("color = ", vec![]),
            Err(FilterError::ParseError(_))
        ));
        assert!(matches!(
            ContentFilter::new("x > 1 y", vec![]),
            Err(FilterError::ParseError(_))
        ));
    }

    #[test]
    fn test_type_mismatch() {
        let filter = ContentFilter::new("color > 3", vec![]).unwrap();
        assert!(matches!(
            filter.matches(&shape("RED", 0, 0, 1)),
            Err(FilterError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_negative_literal() {
        let filter = ContentFilter::new("x >= -5", vec![]).unwrap();
        assert!(filter.matches(&shape("RED", -5, 0, 1)).unwrap());
        assert!(!filter.matches(&shape("RED", -6, 0, 1)).unwrap());
    }
}
