//! Recursive-descent parser.
//!
//! Precedence, loosest first:
//!
//! ```text
//! comparison := additive [ (< | <= | > | >= | == | !=) additive ]
//! additive   := term { (+ | -) term }
//! term       := unary { (* | /) unary }
//! unary      := (+ | -) unary | power
//! power      := primary [ ** unary ]
//! primary    := number | ident [ ( args ) ] | ( comparison )
//! ```
//!
//! Comparisons do not chain. `**` is right-associative and binds tighter than
//! a unary minus on its left, so `-2 ** 2` is `-(2 ** 2)`.

use super::ast::{BinOp, Expr, UnaryOp};
use super::error::EvaluationError;
use super::lexer::{Lexer, Token, TokenKind};

/// Longest formula accepted, in characters.
pub const MAX_FORMULA_LEN: usize = 4096;
/// Deepest nesting accepted. Parentheses, calls, unary signs, powers and
/// each link of a `+ - * /` chain all count as one level.
pub const MAX_DEPTH: usize = 64;

pub fn parse(formula: &str) -> Result<Expr, EvaluationError> {
    let len = formula.chars().count();
    if len > MAX_FORMULA_LEN {
        return Err(EvaluationError::TooLong {
            len,
            max: MAX_FORMULA_LEN,
        });
    }
    if formula.trim().is_empty() {
        return Err(EvaluationError::EmptyExpression);
    }
    let tokens = Lexer::new(formula).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.comparison()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self) -> EvaluationError {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        EvaluationError::UnexpectedToken {
            found: token.kind.describe(),
            position: token.position,
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EvaluationError> {
        if *self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_eof(&self) -> Result<(), EvaluationError> {
        if *self.peek() == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn enter(&mut self) -> Result<(), EvaluationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            Err(EvaluationError::TooDeep { max: MAX_DEPTH })
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn comparison(&mut self) -> Result<Expr, EvaluationError> {
        self.enter()?;
        let lhs = self.additive()?;
        let op = match self.peek() {
            TokenKind::Lt => Some(BinOp::Lt),
            TokenKind::Le => Some(BinOp::Le),
            TokenKind::Gt => Some(BinOp::Gt),
            TokenKind::Ge => Some(BinOp::Ge),
            TokenKind::EqEq => Some(BinOp::Eq),
            TokenKind::NotEq => Some(BinOp::Ne),
            _ => None,
        };
        let expr = match op {
            Some(op) => {
                self.advance();
                let rhs = self.additive()?;
                Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            None => lhs,
        };
        self.leave();
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.term()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            // Each link of a left-leaning chain is one more tree level.
            self.enter()?;
            chained += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, EvaluationError> {
        let mut lhs = self.unary()?;
        let mut chained = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            self.enter()?;
            chained += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, EvaluationError> {
        let op = match self.peek() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> Result<Expr, EvaluationError> {
        let base = self.primary()?;
        if *self.peek() != TokenKind::StarStar {
            return Ok(base);
        }
        self.advance();
        self.enter()?;
        let exponent = self.unary()?;
        self.leave();
        Ok(Expr::Binary {
            op: BinOp::Pow,
            lhs: Box::new(base),
            rhs: Box::new(exponent),
        })
    }

    fn primary(&mut self) -> Result<Expr, EvaluationError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Ident(name) => {
                if *self.peek() != TokenKind::LParen {
                    return Ok(Expr::Ident {
                        name,
                        position: token.position,
                    });
                }
                self.advance();
                let args = self.arguments()?;
                Ok(Expr::Call {
                    name,
                    args,
                    position: token.position,
                })
            }
            TokenKind::LParen => {
                let inner = self.comparison()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(EvaluationError::UnexpectedToken {
                found: other.describe(),
                position: token.position,
            }),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Expr>, EvaluationError> {
        let mut args = Vec::new();
        if *self.peek() == TokenKind::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.comparison()?);
            match self.peek() {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.unexpected()),
            }
        }
    }
}
