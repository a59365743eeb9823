//! Expression evaluation

use crate::error::EvalError;

use super::ast::{BoolOp, Expr};
use super::{attrs, EvalContext, Value};

impl Expr {
    /// Evaluate against a chip attribute context
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self {
            Expr::ChipAttr(name) => Ok(attrs::resolve(name, ctx)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::List(items) => Ok(Value::List(
                items
                    .iter()
                    .map(|item| item.evaluate(ctx))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Comparison { left, op, right } => {
                let left = left.evaluate(ctx)?;
                let right = right.evaluate(ctx)?;
                Ok(Value::Bool(left.compare(*op, right)?))
            }
            Expr::BoolCombine { left, op, right } => {
                let left = left.evaluate(ctx)?.is_truthy();
                let right = right.evaluate(ctx)?.is_truthy();
                Ok(Value::Bool(match op {
                    BoolOp::And => left && right,
                    BoolOp::Or => left || right,
                }))
            }
        }
    }

    /// Evaluate and take the truthiness of the result
    pub fn matches(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        Ok(self.evaluate(ctx)?.is_truthy())
    }
}
