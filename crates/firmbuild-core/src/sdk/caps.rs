//! Capability constants parsed from `soc/*_caps.h` headers
//!
//! The headers are treated as a loose superset of `#define NAME value` lines.
//! Anything that does not look like a plain integer, hex or string define is
//! skipped.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::expr::Value;

fn define_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^#define\s+(?P<name>[A-Za-z][A-Za-z0-9_]*)\s+\(?\s*(?:(?P<hex>0[xX][0-9A-Fa-f]+)[UuLl]*|(?P<int>-?[0-9]+)[UuLl]*|"(?P<str>[^"]*)")\s*\)?\s*(?://.*|/\*.*)?$"#,
        )
        .expect("define regex is valid")
    })
}

/// Parse one `#define` line into a name and value
pub fn parse_define(line: &str) -> Option<(String, Value)> {
    let caps = define_regex().captures(line.trim())?;
    let name = caps.name("name")?.as_str().to_string();

    let value = if let Some(hex) = caps.name("hex") {
        Value::Int(i64::from_str_radix(&hex.as_str()[2..], 16).ok()?)
    } else if let Some(int) = caps.name("int") {
        Value::Int(int.as_str().parse().ok()?)
    } else {
        Value::Str(caps.name("str")?.as_str().to_string())
    };

    Some((name, value))
}

/// Immutable `target -> {name: value}` table
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    by_target: BTreeMap<String, BTreeMap<String, Value>>,
}

impl CapabilityTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load headers for each target from `<sdk>/components/soc/<target>/include/soc/*_caps.h`
    pub fn load(sdk_root: &Path, targets: &[String]) -> Self {
        let mut table = Self::new();
        for target in targets {
            if target == "linux" {
                continue;
            }
            let dir = sdk_root
                .join("components")
                .join("soc")
                .join(target)
                .join("include")
                .join("soc");
            table.by_target.insert(target.clone(), Self::load_dir(&dir));
        }
        table
    }

    fn load_dir(dir: &Path) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "no capability header folder");
            return values;
        }

        let pattern = dir.join("*_caps.h").to_string_lossy().to_string();
        let Ok(paths) = glob::glob(&pattern) else {
            return values;
        };

        for header in paths.flatten() {
            debug!(header = %header.display(), "reading capability macros");
            let Ok(content) = std::fs::read_to_string(&header) else {
                debug!(header = %header.display(), "failed to read header");
                continue;
            };
            for line in content.lines().map(str::trim).filter(|l| l.starts_with("#define")) {
                match parse_define(line) {
                    Some((name, value)) => {
                        values.insert(name, value);
                    }
                    None => debug!(line, "failed to parse define"),
                }
            }
        }
        values
    }

    /// Add or replace a single constant
    pub fn insert(&mut self, target: impl Into<String>, name: impl Into<String>, value: Value) {
        self.by_target
            .entry(target.into())
            .or_default()
            .insert(name.into(), value);
    }

    /// Look up a constant for a target
    pub fn get(&self, target: &str, name: &str) -> Option<&Value> {
        self.by_target.get(target)?.get(name)
    }

    /// Number of constants known for a target
    pub fn len_for(&self, target: &str) -> usize {
        self.by_target.get(target).map(BTreeMap::len).unwrap_or(0)
    }
}
