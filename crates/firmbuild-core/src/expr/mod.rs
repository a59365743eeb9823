//! Boolean expression language used by manifest `if` clauses

mod ast;
pub mod attrs;
mod eval;
mod lexer;
mod parser;
mod value;

pub use ast::{BoolOp, CmpOp, Expr};
pub use lexer::{tokenize, Token, TokenKind};
pub use parser::parse;
pub use value::{parse_lenient_version, Value};

use crate::env::RuleEnv;

/// The `(target, config name)` pair an expression is evaluated for
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub env: &'a RuleEnv,
    pub target: &'a str,
    pub config_name: &'a str,
}

impl<'a> EvalContext<'a> {
    pub fn new(env: &'a RuleEnv, target: &'a str, config_name: &'a str) -> Self {
        Self {
            env,
            target,
            config_name,
        }
    }
}
