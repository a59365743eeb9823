//! Runtime values produced by expression evaluation

use std::cmp::Ordering;

use semver::Version;

use crate::error::EvalError;

use super::ast::CmpOp;

/// A runtime value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    /// Produced by the `IDF_VERSION` attribute
    Version(Version),
    List(Vec<Value>),
    Bool(bool),
}

impl Value {
    /// Python-like truthiness: zero, empty string and empty list are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(i) => *i != 0,
            Self::Str(s) => !s.is_empty(),
            Self::Version(_) => true,
            Self::List(items) => !items.is_empty(),
            Self::Bool(b) => *b,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Str(_) => "str",
            Self::Version(_) => "version",
            Self::List(_) => "list",
            Self::Bool(_) => "bool",
        }
    }

    /// Coerce to a version, accepting partial forms like `5` or `"5.1"`
    pub fn to_version(&self) -> Option<Version> {
        match self {
            Self::Version(v) => Some(v.clone()),
            Self::Int(i) if *i >= 0 => Some(Version::new(*i as u64, 0, 0)),
            Self::Str(s) => parse_lenient_version(s),
            _ => None,
        }
    }

    fn stringify_version(self) -> Self {
        match self {
            Self::Version(v) => Self::Str(v.to_string()),
            Self::List(items) => Self::List(items.into_iter().map(Self::stringify_version).collect()),
            other => other,
        }
    }

    /// Apply a comparison operator
    pub fn compare(self, op: CmpOp, other: Self) -> Result<bool, EvalError> {
        let has_version = matches!(self, Self::Version(_)) || matches!(other, Self::Version(_));

        if op.is_membership() {
            let (left, right) = if has_version {
                (self.stringify_version(), other.stringify_version())
            } else {
                (self, other)
            };
            let contained = left.is_in(&right)?;
            return Ok(if op == CmpOp::In { contained } else { !contained });
        }

        let (left, right) = if has_version {
            match (self.to_version(), other.to_version()) {
                (Some(l), Some(r)) => (Self::Version(l), Self::Version(r)),
                _ => {
                    return Err(EvalError::Incomparable {
                        left: self.to_string(),
                        op: op.to_string(),
                        right: other.to_string(),
                    })
                }
            }
        } else {
            (self, other)
        };

        match op {
            CmpOp::Eq => Ok(left == right),
            CmpOp::Ne => Ok(left != right),
            CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                let ordering = left.partial_order(&right).ok_or_else(|| EvalError::Incomparable {
                    left: left.to_string(),
                    op: op.to_string(),
                    right: right.to_string(),
                })?;
                Ok(match op {
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })
            }
            CmpOp::In | CmpOp::NotIn => Err(EvalError::InvalidInput(format!(
                "Unsupported comparison operator: \"{}\"",
                op
            ))),
        }
    }

    /// Ordering between values of the same kind. Different kinds have none.
    fn partial_order(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Version(a), Self::Version(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.partial_order(y)? {
                        Ordering::Equal => continue,
                        non_eq => return Some(non_eq),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    fn is_in(&self, container: &Self) -> Result<bool, EvalError> {
        match (self, container) {
            (_, Self::List(items)) => Ok(items.contains(self)),
            (Self::Str(needle), Self::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
            _ => Err(EvalError::InvalidInput(format!(
                "'in' requires a list or a string on the right, got {} in {}",
                self.kind(),
                container.kind()
            ))),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "{:?}", s),
            Self::Version(v) => write!(f, "{}", v),
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
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Parse `5`, `5.1`, `5.1.2` or `v5.1` into a version, padding missing parts
pub fn parse_lenient_version(s: &str) -> Option<Version> {
    let trimmed = s.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(trimmed) {
        return Some(v);
    }

    let mut parts = trimmed.split('.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next().map(str::parse::<u64>).transpose().ok()?.unwrap_or(0);
    let patch: u64 = parts.next().map(str::parse::<u64>).transpose().ok()?.unwrap_or(0);
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}
