//! Expression compiler: source text to an immutable evaluation tree.

use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::token::{Token, tokenize};
use crate::value::Value;

/// Builtin functions the language provides. Calls to anything else are
/// rejected at compile time so a typo surfaces as a configuration error.
pub(crate) const BUILTIN_FUNCTIONS: &[&str] = &["contains", "length", "lower"];

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// A node of the compiled expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Literal value.
    Literal(Value),
    /// Context binding reference.
    Ident(String),
    /// Member access: `object.field`.
    Member {
        /// Expression producing the container.
        object: Box<Expr>,
        /// Member name.
        field: String,
    },
    /// Bracket indexing: `object['key']` or `object[0]`.
    Index {
        /// Expression producing the container.
        object: Box<Expr>,
        /// Expression producing the key or position.
        index: Box<Expr>,
    },
    /// Logical negation: `!operand`.
    Not(Box<Expr>),
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Builtin function call.
    Call {
        /// Function name (validated against [`BUILTIN_FUNCTIONS`]).
        function: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },
}

/// A compiled, immutable expression.
///
/// Produced once by [`compile`] when an action or rule condition is
/// constructed; holds the original source (the only form that is ever
/// persisted) and the evaluation tree. Safe to evaluate concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompiledExpr {
    source: String,
    pub(crate) root: Expr,
}

impl CompiledExpr {
    /// Returns the original source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The literal `true` condition, used where a rule must always match.
    #[must_use]
    pub fn always_true() -> Self {
        Self {
            source: "true".to_string(),
            root: Expr::Literal(Value::Bool(true)),
        }
    }
}

impl TryFrom<String> for CompiledExpr {
    type Error = CompileError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        compile(&source)
    }
}

impl From<CompiledExpr> for String {
    fn from(expr: CompiledExpr) -> Self {
        expr.source
    }
}

/// Compiles an expression source string.
///
/// ## Errors
///
/// Returns a [`CompileError`] for lexical errors, malformed syntax, or
/// calls to unknown functions.
pub fn compile(source: &str) -> Result<CompiledExpr, CompileError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let root = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(CompileError::UnexpectedToken(extra.describe()));
    }

    Ok(CompiledExpr {
        source: source.to_string(),
        root,
    })
}

/// Recursive-descent parser over the token stream.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(CompileError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), CompileError> {
        let token = self.advance()?;
        if &token == expected {
            Ok(())
        } else {
            Err(CompileError::UnexpectedToken(token.describe()))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_unary()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.peek() == Some(&Token::Bang) {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_postfix()
    }

    /// Parses a primary expression followed by any chain of `.field` and
    /// `[index]` accessors.
    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance()? {
                        Token::Ident(field) => {
                            expr = Expr::Member {
                                object: Box::new(expr),
                                field,
                            };
                        }
                        other => return Err(CompileError::UnexpectedToken(other.describe())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance()? {
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Ident(name))
                }
            }
            other => Err(CompileError::UnexpectedToken(other.describe())),
        }
    }

    fn parse_call(&mut self, function: String) -> Result<Expr, CompileError> {
        if !BUILTIN_FUNCTIONS.contains(&function.as_str()) {
            return Err(CompileError::UnknownFunction(function));
        }
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_or()?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        Ok(Expr::Call { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_literal_true() {
        let expr = compile("true").unwrap();
        assert_eq!(expr.root, Expr::Literal(Value::Bool(true)));
        assert_eq!(expr.source(), "true");
    }

    #[test]
    fn compiles_attribute_lookup_chain() {
        let expr = compile("input.attributes['uid']").unwrap();
        match &expr.root {
            Expr::Index { object, index } => {
                assert!(matches!(**object, Expr::Member { .. }));
                assert_eq!(**index, Expr::Literal(Value::Str("uid".to_string())));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let expr = compile("a || b && c").unwrap();
        match &expr.root {
            Expr::Binary { op, right, .. } => {
                assert_eq!(*op, BinaryOp::Or);
                assert!(matches!(
                    **right,
                    Expr::Binary {
                        op: BinaryOp::And,
                        ..
                    }
                ));
            }
            other => panic!("unexpected tree: {other:?}"),
        }
    }

    #[test]
    fn unknown_function_fails_at_compile_time() {
        assert_eq!(
            compile("frobnicate(a)"),
            Err(CompileError::UnknownFunction("frobnicate".to_string()))
        );
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(matches!(
            compile("a == b c"),
            Err(CompileError::UnexpectedToken(_))
        ));
    }

    #[test]
    fn empty_source_is_rejected() {
        assert_eq!(compile("   "), Err(CompileError::Empty));
    }

    #[test]
    fn serde_round_trips_through_source_text() {
        let expr = compile("input.idp == 'corp'").unwrap();
        let json = serde_json::to_string(&expr).unwrap();
        assert_eq!(json, "\"input.idp == 'corp'\"");
        let back: CompiledExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, expr);
    }
}
