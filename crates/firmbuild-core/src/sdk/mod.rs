//! SDK introspection: targets, version and capabilities

mod caps;
mod sdkconfig;

pub use caps::{parse_define, CapabilityTable};
pub use sdkconfig::{dict_from_sdkconfig, pinned_target};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use tracing::{debug, warn};

use crate::error::SdkError;

/// Targets supported when the SDK does not tell otherwise
pub const DEFAULT_SUPPORTED_TARGETS: &[&str] = &[
    "esp32", "esp32s2", "esp32c3", "esp32s3", "esp32c2", "esp32c6", "esp32h2", "esp32p4",
];

/// Preview targets when the SDK does not tell otherwise
pub const DEFAULT_PREVIEW_TARGETS: &[&str] = &["linux", "esp32c5", "esp32c61"];

/// Known hardware targets, split into supported and preview ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub supported: Vec<String>,
    pub preview: Vec<String>,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            supported: DEFAULT_SUPPORTED_TARGETS.iter().map(|s| s.to_string()).collect(),
            preview: DEFAULT_PREVIEW_TARGETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Targets {
    pub fn new(supported: Vec<String>, preview: Vec<String>) -> Self {
        Self { supported, preview }
    }

    /// Supported targets followed by preview targets
    pub fn all(&self) -> Vec<String> {
        self.supported.iter().chain(self.preview.iter()).cloned().collect()
    }

    /// Read `SUPPORTED_TARGETS` and `PREVIEW_TARGETS` from
    /// `tools/idf_py_actions/constants.py`, falling back to the built-in lists
    pub fn from_sdk(sdk_root: &Path) -> Self {
        let path = sdk_root.join("tools").join("idf_py_actions").join("constants.py");
        let Ok(content) = std::fs::read_to_string(&path) else {
            debug!(path = %path.display(), "no target constants, using built-in targets");
            return Self::default();
        };

        let defaults = Self::default();
        Self {
            supported: parse_python_list(&content, "SUPPORTED_TARGETS").unwrap_or(defaults.supported),
            preview: parse_python_list(&content, "PREVIEW_TARGETS").unwrap_or(defaults.preview),
        }
    }
}

/// Extract a `NAME = ['a', 'b']` assignment of string literals
fn parse_python_list(content: &str, name: &str) -> Option<Vec<String>> {
    let pattern = format!(r"(?m)^{}\s*=\s*\[(?P<items>[^\]]*)\]", regex::escape(name));
    let re = Regex::new(&pattern).ok()?;
    let items = re.captures(content)?.name("items")?.as_str();

    Some(
        items
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"'))
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*set\s*\(\s*IDF_VERSION_([A-Z]{5})\s+(\d+)").expect("version regex is valid")
    })
}

/// Read the SDK version from `tools/cmake/version.cmake`
pub fn version_from_cmake(sdk_root: &Path) -> Result<Version, SdkError> {
    let path = sdk_root.join("tools").join("cmake").join("version.cmake");
    if !path.is_file() {
        return Err(SdkError::VersionNotFound(path));
    }

    let content = std::fs::read_to_string(&path)?;
    let mut parts: BTreeMap<String, u64> = BTreeMap::new();
    for line in content.lines() {
        if let Some(caps) = version_regex().captures(line) {
            if let Ok(number) = caps[2].parse() {
                parts.insert(caps[1].to_string(), number);
            }
        }
    }

    match (parts.get("MAJOR"), parts.get("MINOR"), parts.get("PATCH")) {
        (Some(&major), Some(&minor), Some(&patch)) => Ok(Version::new(major, minor, patch)),
        _ => Err(SdkError::VersionNotFound(path)),
    }
}

/// Everything read from one SDK checkout
#[derive(Debug, Clone)]
pub struct SdkInfo {
    pub root: PathBuf,
    pub version: Option<Version>,
    pub targets: Targets,
    pub caps: CapabilityTable,
}

impl SdkInfo {
    /// Load targets, version and capability headers from an SDK root
    pub fn load(root: &Path) -> Result<Self, SdkError> {
        if !root.is_dir() {
            return Err(SdkError::InvalidPath(root.to_path_buf()));
        }

        let targets = Targets::from_sdk(root);
        let version = match version_from_cmake(root) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("{}", e);
                None
            }
        };
        let caps = CapabilityTable::load(root, &targets.all());

        debug!(root = %root.display(), version = ?version, "loaded SDK information");

        Ok(Self {
            root: root.to_path_buf(),
            version,
            targets,
            caps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_version_from_cmake() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tools/cmake");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("version.cmake"),
            "set(IDF_VERSION_MAJOR 5)\nset(IDF_VERSION_MINOR 1)\n  set ( IDF_VERSION_PATCH 2 )\n",
        )
        .unwrap();

        assert_eq!(version_from_cmake(temp.path()).unwrap(), Version::new(5, 1, 2));
    }

    #[test]
    fn test_version_from_cmake_incomplete() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            version_from_cmake(temp.path()),
            Err(SdkError::VersionNotFound(_))
        ));

        let dir = temp.path().join("tools/cmake");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("version.cmake"), "set(IDF_VERSION_MAJOR 5)\n").unwrap();
        assert!(version_from_cmake(temp.path()).is_err());
    }

    #[test]
    fn test_targets_from_constants() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("tools/idf_py_actions");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("constants.py"),
            "SUPPORTED_TARGETS = ['esp32', 'esp32s2']\nPREVIEW_TARGETS = [\"linux\"]\n",
        )
        .unwrap();

        let targets = Targets::from_sdk(temp.path());
        assert_eq!(targets.supported, vec!["esp32", "esp32s2"]);
        assert_eq!(targets.preview, vec!["linux"]);
        assert_eq!(targets.all(), vec!["esp32", "esp32s2", "linux"]);
    }

    #[test]
    fn test_targets_fallback() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Targets::from_sdk(temp.path()), Targets::default());
    }

    #[test]
    fn test_sdk_info_invalid_root() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing");
        assert!(matches!(SdkInfo::load(&missing), Err(SdkError::InvalidPath(_))));
    }
}
