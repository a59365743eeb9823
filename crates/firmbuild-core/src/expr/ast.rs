//! Expression tree

use serde::{Deserialize, Serialize};

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    /// `in` and `not in`
    pub fn is_membership(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean combinators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl std::fmt::Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
        }
    }
}

/// A parsed `if` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Chip attribute, resolved at evaluation time
    ChipAttr(String),
    Int(i64),
    Str(String),
    List(Vec<Expr>),
    Comparison {
        left: Box<Expr>,
        op: CmpOp,
        right: Box<Expr>,
    },
    BoolCombine {
        left: Box<Expr>,
        op: BoolOp,
        right: Box<Expr>,
    },
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChipAttr(name) => f.write_str(name),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Comparison { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Self::BoolCombine { left, op, right } => {
                write_grouped(f, left)?;
                write!(f, " {} ", op)?;
                write_grouped(f, right)
            }
        }
    }
}

fn write_grouped(f: &mut std::fmt::Formatter<'_>, expr: &Expr) -> std::fmt::Result {
    if matches!(expr, Expr::BoolCombine { .. }) {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}
