// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Precedence-climbing parser from tokens to an evaluation tree.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary ('^' unary)?
//! primary := number | ident | ident '(' expr (',' expr)* ')' | '(' expr ')'
//! ```

use super::lexer::{Token, TokenKind};
use super::{BinaryOp, ExprError, Function, Node};

pub(super) struct Parser<'a> {
    tokens: Vec<Token>,
    index: usize,
    variables: &'a [String],
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, variables: &'a [String]) -> Self {
        Self { tokens, index: 0, variables }
    }

    /// Parse the full token stream into a single tree.
    pub fn parse(mut self) -> Result<Node, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let node = self.parse_expr()?;
        match self.peek() {
            None => Ok(node),
            Some(token) => Err(self.unexpected(token)),
        }
    }

    fn parse_expr(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Node, ExprError> {
        let base = self.parse_primary()?;
        if self.peek_kind() != Some(&TokenKind::Caret) {
            return Ok(base);
        }
        self.advance();
        // right associative: a^b^c = a^(b^c)
        let exponent = self.parse_unary()?;
        Ok(Node::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let Some(token) = self.advance().cloned() else {
            return Err(ExprError::UnexpectedEnd);
        };
        match token.kind {
            TokenKind::Number(n) => Ok(Node::Const(n)),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            TokenKind::Ident(name) if self.peek_kind() == Some(&TokenKind::LParen) => {
                self.advance();
                self.parse_call(name, token.pos)
            }
            TokenKind::Ident(name) => self.resolve_variable(name, token.pos),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn parse_call(&mut self, name: String, pos: usize) -> Result<Node, ExprError> {
        let Some(function) = Function::lookup(&name) else {
            return Err(ExprError::UnknownFunction { name, pos });
        };
        let mut args = vec![self.parse_expr()?];
        while self.peek_kind() == Some(&TokenKind::Comma) {
            self.advance();
            args.push(self.parse_expr()?);
        }
        self.expect_rparen()?;
        if args.len() != function.arity() {
            return Err(ExprError::Arity { name, expected: function.arity(), got: args.len() });
        }
        Ok(Node::Call(function, args))
    }

    fn resolve_variable(&self, name: String, pos: usize) -> Result<Node, ExprError> {
        if let Some(index) = self.variables.iter().position(|v| *v == name) {
            return Ok(Node::Var(index));
        }
        match name.as_str() {
            "pi" => Ok(Node::Const(std::f64::consts::PI)),
            "e" => Ok(Node::Const(std::f64::consts::E)),
            _ => Err(ExprError::UnknownVariable { name, pos }),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ExprError> {
        match self.advance().cloned() {
            Some(Token { kind: TokenKind::RParen, .. }) => Ok(()),
            Some(token) => Err(self.unexpected(&token)),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.index);
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn unexpected(&self, token: &Token) -> ExprError {
        ExprError::UnexpectedToken { found: token.kind.to_string(), pos: token.pos }
    }
}
