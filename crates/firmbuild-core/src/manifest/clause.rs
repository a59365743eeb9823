//! Guarded clauses and switch-style dependency declarations

use serde_json::json;
use serde_yaml::Value as YamlValue;

use crate::error::{EvalError, ManifestError};
use crate::expr::{parse, EvalContext, Expr};

/// A parsed `if` statement with its annotations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfClause {
    stmt: String,
    expr: Expr,
    pub temporary: bool,
    pub reason: Option<String>,
}

impl IfClause {
    pub fn new(
        stmt: impl Into<String>,
        temporary: bool,
        reason: Option<String>,
    ) -> Result<Self, ManifestError> {
        let stmt = stmt.into();
        let expr = parse(&stmt).map_err(|e| ManifestError::InvalidIfClause(e.to_string()))?;

        if temporary && reason.as_deref().map_or(true, str::is_empty) {
            return Err(ManifestError::InvalidIfClause(
                "\"reason\" must be set when \"temporary: true\"".to_string(),
            ));
        }

        Ok(Self {
            stmt,
            expr,
            temporary,
            reason,
        })
    }

    /// Shorthand for a clause without annotations
    pub fn parse(stmt: impl Into<String>) -> Result<Self, ManifestError> {
        Self::new(stmt, false, None)
    }

    pub fn stmt(&self) -> &str {
        &self.stmt
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn matches(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        self.expr.matches(ctx)
    }

    pub(crate) fn canonical(&self) -> serde_json::Value {
        json!({
            "if": self.stmt,
            "temporary": self.temporary,
            "reason": self.reason,
        })
    }
}

impl std::fmt::Display for IfClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stmt)?;
        if self.temporary {
            f.write_str(" (temporary)")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, " (reason: {})", reason)?;
        }
        Ok(())
    }
}

/// Ordered `(clause, content)` cases with a default
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwitchClause {
    cases: Vec<(IfClause, Vec<String>)>,
    default: Vec<String>,
}

impl SwitchClause {
    pub fn new(cases: Vec<(IfClause, Vec<String>)>, default: Vec<String>) -> Self {
        Self { cases, default }
    }

    /// Content of the first matching case, or the default
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> Result<Vec<String>, EvalError> {
        for (clause, content) in &self.cases {
            if clause.matches(ctx)? {
                return Ok(content.clone());
            }
        }
        Ok(self.default.clone())
    }

    fn canonical(&self) -> serde_json::Value {
        let mut entries: Vec<serde_json::Value> = self
            .cases
            .iter()
            .map(|(clause, content)| json!({ "if": clause.canonical(), "content": content }))
            .collect();
        entries.push(json!({ "default": self.default }));
        serde_json::Value::Array(entries)
    }
}

/// A dependency list, either fixed or selected per target and config
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencySpec {
    Flat(Vec<String>),
    Switch(SwitchClause),
}

impl Default for DependencySpec {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl DependencySpec {
    pub fn resolve(&self, ctx: &EvalContext<'_>) -> Result<Vec<String>, EvalError> {
        match self {
            Self::Flat(items) => Ok(items.clone()),
            Self::Switch(switch) => switch.resolve(ctx),
        }
    }

    /// True for an empty flat list. A switch may still resolve to nothing.
    pub fn is_declared(&self) -> bool {
        match self {
            Self::Flat(items) => !items.is_empty(),
            Self::Switch(_) => true,
        }
    }

    pub(crate) fn canonical(&self) -> serde_json::Value {
        match self {
            Self::Flat(items) => json!(items),
            Self::Switch(switch) => switch.canonical(),
        }
    }

    /// Build from a manifest list: all strings, or all `if`/`content` and `default` mappings
    pub fn from_yaml(key: &str, items: &[YamlValue]) -> Result<Self, String> {
        let has_mapping = items.iter().any(YamlValue::is_mapping);
        let has_scalar = items.iter().any(|v| !v.is_mapping());
        if has_mapping && has_scalar {
            return Err(format!(
                "\"{}\" mixes strings and switch clauses, use either a list of strings or a list of if/content mappings",
                key
            ));
        }

        if !has_mapping {
            return items
                .iter()
                .map(|item| match item {
                    YamlValue::String(s) => Ok(s.clone()),
                    YamlValue::Number(n) => Ok(n.to_string()),
                    other => Err(format!("\"{}\" entries must be strings, got {:?}", key, other)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Flat);
        }

        let mut cases = Vec::new();
        let mut default = Vec::new();
        for item in items {
            let Some(mapping) = item.as_mapping() else {
                continue;
            };

            let keys: Vec<&str> = mapping.keys().filter_map(YamlValue::as_str).collect();
            if mapping.len() != keys.len() {
                return Err(format!("\"{}\" switch clause keys must be strings", key));
            }

            match keys.as_slice() {
                ["default"] => default = string_list(key, &mapping["default"])?,
                ks if ks.contains(&"if") && ks.iter().all(|k| *k == "if" || *k == "content") => {
                    let stmt = mapping["if"]
                        .as_str()
                        .ok_or_else(|| format!("\"{}\" switch \"if\" must be a string", key))?;
                    let clause = IfClause::parse(stmt).map_err(|e| e.to_string())?;
                    let content = match mapping.get("content") {
                        Some(v) => string_list(key, v)?,
                        None => Vec::new(),
                    };
                    cases.push((clause, content));
                }
                ks => {
                    return Err(format!(
                        "\"{}\" switch clause has unknown keys {:?}, only \"if\"/\"content\" or \"default\" are allowed",
                        key, ks
                    ))
                }
            }
        }

        Ok(Self::Switch(SwitchClause::new(cases, default)))
    }
}

fn string_list(key: &str, value: &YamlValue) -> Result<Vec<String>, String> {
    match value {
        YamlValue::Null => Ok(Vec::new()),
        YamlValue::String(s) => Ok(vec![s.clone()]),
        YamlValue::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("\"{}\" content must be strings, got {:?}", key, item))
            })
            .collect(),
        other => Err(format!("\"{}\" content must be a list, got {:?}", key, other)),
    }
}
