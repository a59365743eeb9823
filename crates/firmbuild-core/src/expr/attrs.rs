//! Chip attribute lookup
//!
//! Attributes are resolved by trying each [`AttributeSource`] in order. The
//! first source that knows the name wins; unknown names evaluate to `0`.

use semver::Version;

use super::{EvalContext, Value};

/// One place chip attributes can come from
pub trait AttributeSource: Send + Sync {
    fn lookup(&self, name: &str, ctx: &EvalContext<'_>) -> Option<Value>;
}

/// `IDF_TARGET`, `INCLUDE_DEFAULT`, `IDF_VERSION*` and `CONFIG_NAME`
pub struct ReservedAttributes;

impl AttributeSource for ReservedAttributes {
    fn lookup(&self, name: &str, ctx: &EvalContext<'_>) -> Option<Value> {
        let version = ctx.env.version();
        match name {
            "IDF_TARGET" => Some(Value::Str(ctx.target.to_string())),
            "CONFIG_NAME" => Some(Value::Str(ctx.config_name.to_string())),
            "INCLUDE_DEFAULT" => Some(Value::Int(
                ctx.env.default_build_targets().contains(ctx.target) as i64,
            )),
            // without an SDK version these read as 0.0.0
            "IDF_VERSION" => Some(Value::Version(
                version.cloned().unwrap_or_else(|| Version::new(0, 0, 0)),
            )),
            "IDF_VERSION_MAJOR" => Some(Value::Int(version.map_or(0, |v| v.major as i64))),
            "IDF_VERSION_MINOR" => Some(Value::Int(version.map_or(0, |v| v.minor as i64))),
            "IDF_VERSION_PATCH" => Some(Value::Int(version.map_or(0, |v| v.patch as i64))),
            _ => None,
        }
    }
}

/// Per-target capability constants
pub struct CapabilityAttributes;

impl AttributeSource for CapabilityAttributes {
    fn lookup(&self, name: &str, ctx: &EvalContext<'_>) -> Option<Value> {
        ctx.env.caps().get(ctx.target, name).cloned()
    }
}

/// Process environment, read as strings
pub struct EnvironmentAttributes;

impl AttributeSource for EnvironmentAttributes {
    fn lookup(&self, name: &str, _ctx: &EvalContext<'_>) -> Option<Value> {
        std::env::var(name).ok().map(Value::Str)
    }
}

static SOURCES: [&dyn AttributeSource; 3] =
    [&ReservedAttributes, &CapabilityAttributes, &EnvironmentAttributes];

/// Resolve an attribute through the source chain
pub fn resolve(name: &str, ctx: &EvalContext<'_>) -> Value {
    SOURCES
        .iter()
        .find_map(|source| source.lookup(name, ctx))
        .unwrap_or(Value::Int(0))
}
