//! `sdkconfig` file reading

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^#=]+)=(.+)$").expect("sdkconfig regex is valid"))
}

/// Parse `KEY=value` lines, stripping surrounding double quotes from values.
/// Returns an empty map when the file cannot be read.
pub fn dict_from_sdkconfig(path: &Path) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    let Ok(content) = std::fs::read_to_string(path) else {
        return values;
    };

    for line in content.lines() {
        if let Some(caps) = line_regex().captures(line.trim()) {
            let value = caps[2].trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            values.insert(caps[1].trim().to_string(), value.to_string());
        }
    }
    values
}

/// `CONFIG_IDF_TARGET` pinned by one of the given sdkconfig files, last one wins
pub fn pinned_target<'a, I>(files: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut target = None;
    for file in files {
        if let Some(value) = dict_from_sdkconfig(file).remove("CONFIG_IDF_TARGET") {
            target = Some(value);
        }
    }
    target
}
