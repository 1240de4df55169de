// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokenizer for arithmetic expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum TokenKind {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Ident(name) => f.write_str(name),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::Caret => f.write_str("^"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::Comma => f.write_str(","),
        }
    }
}

pub(super) struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, chars: input.char_indices().peekable() }
    }

    /// Tokenize the whole input.
    pub fn tokenize(input: &'a str) -> Result<Vec<Token>, ExprError> {
        let mut lexer = Self::new(input);
        let mut tokens = Vec::new();
        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[inline]
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn next_token(&mut self) -> Result<Option<Token>, ExprError> {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
        let Some((pos, ch)) = self.chars.next() else {
            return Ok(None);
        };
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            c if c.is_ascii_digit() || c == '.' => self.read_number(pos)?,
            c if c.is_alphabetic() || c == '_' => self.read_ident(pos),
            c => return Err(ExprError::UnexpectedChar { ch: c, pos }),
        };
        Ok(Some(Token { kind, pos }))
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, ExprError> {
        let mut end = start + 1;
        let mut seen_exponent = false;
        while let Some(c) = self.peek_char() {
            let accept = match c {
                '0'..='9' | '.' => true,
                'e' | 'E' if !seen_exponent => {
                    seen_exponent = true;
                    true
                }
                '+' | '-' => matches!(self.input[..end].chars().last(), Some('e' | 'E')),
                _ => false,
            };
            if !accept {
                break;
            }
            end += c.len_utf8();
            self.chars.next();
        }
        let text = &self.input[start..end];
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ExprError::BadNumber { text: text.to_string(), pos: start })
    }

    fn read_ident(&mut self, start: usize) -> TokenKind {
        let mut end = start + self.input[start..].chars().next().map_or(1, char::len_utf8);
        while let Some(c) = self.peek_char() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            end += c.len_utf8();
            self.chars.next();
        }
        TokenKind::Ident(self.input[start..end].to_string())
    }
}
