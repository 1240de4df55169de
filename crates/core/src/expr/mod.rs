// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Arithmetic expressions for simple calculated fields.
//!
//! An expression compiles once into an immutable tree whose variables are
//! indices into the field's argument list. Evaluation takes the bound values
//! as a slice, so a single compiled expression is shared by every caller.

mod lexer;
mod parser;

use thiserror::Error;

/// Errors from compiling or evaluating an arithmetic expression
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("invalid number '{text}' at position {pos}")]
    BadNumber { text: String, pos: usize },
    #[error("unexpected '{found}' at position {pos}")]
    UnexpectedToken { found: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown variable '{name}' at position {pos}")]
    UnknownVariable { name: String, pos: usize },
    #[error("unknown function '{name}' at position {pos}")]
    UnknownFunction { name: String, pos: usize },
    #[error("function '{name}' takes {expected} argument(s), got {got}")]
    Arity { name: String, expected: usize, got: usize },
    #[error("expected {expected} bound values, got {got}")]
    Bindings { expected: usize, got: usize },
    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Abs,
    Acos,
    Asin,
    Atan,
    Cbrt,
    Ceil,
    Cos,
    Cosh,
    Exp,
    Floor,
    Log,
    Log10,
    Log2,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    Signum,
    Pow,
    Min,
    Max,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "abs" => Function::Abs,
            "acos" => Function::Acos,
            "asin" => Function::Asin,
            "atan" => Function::Atan,
            "cbrt" => Function::Cbrt,
            "ceil" => Function::Ceil,
            "cos" => Function::Cos,
            "cosh" => Function::Cosh,
            "exp" => Function::Exp,
            "floor" => Function::Floor,
            "log" => Function::Log,
            "log10" => Function::Log10,
            "log2" => Function::Log2,
            "sin" => Function::Sin,
            "sinh" => Function::Sinh,
            "sqrt" => Function::Sqrt,
            "tan" => Function::Tan,
            "tanh" => Function::Tanh,
            "signum" => Function::Signum,
            "pow" => Function::Pow,
            "min" => Function::Min,
            "max" => Function::Max,
            _ => return None,
        })
    }

    fn arity(&self) -> usize {
        match self {
            Function::Pow | Function::Min | Function::Max => 2,
            _ => 1,
        }
    }

    fn apply(&self, args: &[f64]) -> f64 {
        let x = args.first().copied().unwrap_or(f64::NAN);
        let y = args.get(1).copied().unwrap_or(f64::NAN);
        match self {
            Function::Abs => x.abs(),
            Function::Acos => x.acos(),
            Function::Asin => x.asin(),
            Function::Atan => x.atan(),
            Function::Cbrt => x.cbrt(),
            Function::Ceil => x.ceil(),
            Function::Cos => x.cos(),
            Function::Cosh => x.cosh(),
            Function::Exp => x.exp(),
            Function::Floor => x.floor(),
            Function::Log => x.ln(),
            Function::Log10 => x.log10(),
            Function::Log2 => x.log2(),
            Function::Sin => x.sin(),
            Function::Sinh => x.sinh(),
            Function::Sqrt => x.sqrt(),
            Function::Tan => x.tan(),
            Function::Tanh => x.tanh(),
            // 0 stays 0, unlike f64::signum
            Function::Signum => {
                if x == 0.0 || x.is_nan() {
                    x
                } else {
                    x.signum()
                }
            }
            Function::Pow => x.powf(y),
            Function::Min => x.min(y),
            Function::Max => x.max(y),
        }
    }
}

/// Evaluation tree. Variables index the argument list given at compile time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Const(f64),
    Var(usize),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    fn eval(&self, bindings: &[f64]) -> Result<f64, ExprError> {
        Ok(match self {
            Node::Const(v) => *v,
            Node::Var(i) => bindings.get(*i).copied().unwrap_or(f64::NAN),
            Node::Neg(inner) => -inner.eval(bindings)?,
            Node::Binary(op, l, r) => {
                let (a, b) = (l.eval(bindings)?, r.eval(bindings)?);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Node::Call(function, args) => {
                let values = args.iter().map(|a| a.eval(bindings)).collect::<Result<Vec<_>, _>>()?;
                function.apply(&values)
            }
        })
    }
}

/// A compiled arithmetic expression over a fixed, ordered set of variables.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    variables: Vec<String>,
    root: Node,
}

impl CompiledExpression {
    /// Compile `source` with `variables` as the only free names.
    ///
    /// `pi` and `e` resolve to constants unless shadowed by a variable.
    pub fn compile(source: &str, variables: &[String]) -> Result<Self, ExprError> {
        let tokens = lexer::Lexer::tokenize(source)?;
        let root = parser::Parser::new(tokens, variables).parse()?;
        Ok(Self { source: source.to_string(), variables: variables.to_vec(), root })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Evaluate with `bindings[i]` as the value of `variables()[i]`.
    pub fn evaluate(&self, bindings: &[f64]) -> Result<f64, ExprError> {
        if bindings.len() != self.variables.len() {
            return Err(ExprError::Bindings { expected: self.variables.len(), got: bindings.len() });
        }
        self.root.eval(bindings)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
