//! Recursive descent parser for the arithmetic formula language.
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | primary
//! primary := NUMBER | IDENT | '(' expr ')'
//! ```

use crate::ast::Expression;
use crate::error::FormulaError;

pub mod lexer;

use lexer::{Spanned, Token};

/// Upper bounds applied while parsing, so a hostile formula cannot exhaust
/// the stack or spend unbounded time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseLimits {
    /// Maximum formula length in characters.
    pub max_length: usize,
    /// Maximum nesting of parentheses and unary operators.
    pub max_depth: usize,
    /// Maximum number of operators and operands in the tree. Long operator
    /// chains fold into a tree as deep as the chain is long, and evaluating
    /// or dropping it recurses once per level.
    pub max_nodes: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            max_length: 4096,
            max_depth: 64,
            max_nodes: 512,
        }
    }
}

/// Parses a formula into an AST using the default limits.
pub fn parse(input: &str) -> Result<Expression, FormulaError> {
    parse_with_limits(input, ParseLimits::default())
}

/// Parses a formula into an AST.
///
/// The character allow-list is checked first; any other failure is a
/// `FormulaError::Syntax` pointing at the offending character offset.
pub fn parse_with_limits(input: &str, limits: ParseLimits) -> Result<Expression, FormulaError> {
    let length = input.chars().count();
    if length > limits.max_length {
        return Err(FormulaError::TooComplex(format!(
            "formula has {} characters, the limit is {}",
            length, limits.max_length
        )));
    }

    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        nodes: 0,
        end_position: length,
        limits,
    };

    let expr = parser.parse_expression()?;
    if let Some(extra) = parser.peek() {
        return Err(FormulaError::Syntax {
            message: format!("unexpected {} after expression", extra.token.describe()),
            position: extra.position,
        });
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    nodes: usize,
    end_position: usize,
    limits: ParseLimits,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn enter(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > self.limits.max_depth {
            return Err(FormulaError::TooComplex(format!(
                "nesting deeper than {} levels",
                self.limits.max_depth
            )));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn count_node(&mut self) -> Result<(), FormulaError> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            return Err(FormulaError::TooComplex(format!(
                "more than {} operators and operands",
                self.limits.max_nodes
            )));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> Result<Expression, FormulaError> {
        let mut left = self.parse_term()?;
        while let Some(spanned) = self.peek() {
            let build: fn(Box<Expression>, Box<Expression>) -> Expression = match spanned.token {
                Token::Plus => Expression::Sum,
                Token::Minus => Expression::Subtract,
                _ => break,
            };
            self.count_node()?;
            self.pos += 1;
            let right = self.parse_term()?;
            left = build(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, FormulaError> {
        let mut left = self.parse_unary()?;
        while let Some(spanned) = self.peek() {
            let build: fn(Box<Expression>, Box<Expression>) -> Expression = match spanned.token {
                Token::Star => Expression::Multiply,
                Token::Slash => Expression::Divide,
                _ => break,
            };
            self.count_node()?;
            self.pos += 1;
            let right = self.parse_unary()?;
            left = build(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, FormulaError> {
        match self.peek() {
            Some(Spanned {
                token: Token::Minus,
                ..
            }) => {
                self.pos += 1;
                self.count_node()?;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(Expression::Negate(Box::new(operand)))
            }
            Some(Spanned {
                token: Token::Plus,
                ..
            }) => {
                // Unary plus is numeric identity on already-numeric operands.
                self.pos += 1;
                self.enter()?;
                let operand = self.parse_unary()?;
                self.leave();
                Ok(operand)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, FormulaError> {
        let Some(spanned) = self.next() else {
            return Err(FormulaError::Syntax {
                message: "unexpected end of formula".to_string(),
                position: self.end_position,
            });
        };

        match &spanned.token {
            Token::Number(n) => {
                self.count_node()?;
                Ok(Expression::Literal(*n))
            }
            Token::Identifier(name) => {
                self.count_node()?;
                Ok(Expression::Variable(name.clone()))
            }
            Token::LeftParen => {
                self.enter()?;
                let inner = self.parse_expression()?;
                self.leave();
                match self.next() {
                    Some(Spanned {
                        token: Token::RightParen,
                        ..
                    }) => Ok(inner),
                    Some(other) => Err(FormulaError::Syntax {
                        message: format!("expected ')' but found {}", other.token.describe()),
                        position: other.position,
                    }),
                    None => Err(FormulaError::Syntax {
                        message: "missing ')'".to_string(),
                        position: self.end_position,
                    }),
                }
            }
            other => Err(FormulaError::Syntax {
                message: format!("unexpected {}", other.describe()),
                position: spanned.position,
            }),
        }
    }
}
