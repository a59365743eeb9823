//! App model

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use firmbuild_core::paths;

/// Replaced with the target
pub const TARGET_PLACEHOLDER: &str = "@t";
/// Replaced with the config name
pub const WILDCARD_PLACEHOLDER: &str = "@w";
/// Replaced with the app name
pub const NAME_PLACEHOLDER: &str = "@n";
/// Replaced with the app path, `/` turned into `_`
pub const FULL_NAME_PLACEHOLDER: &str = "@f";
/// Replaced with the 1-based build index
pub const INDEX_PLACEHOLDER: &str = "@i";
/// Replaced with the parallel index, collect file paths only
pub const PARALLEL_INDEX_PLACEHOLDER: &str = "@p";

/// Where an app stands in a find or build run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Unknown,
    Disabled,
    Skipped,
    ShouldBeBuilt,
    Failed,
    Success,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Disabled => "disabled",
            Self::Skipped => "skipped",
            Self::ShouldBeBuilt => "should be built",
            Self::Failed => "build failed",
            Self::Success => "build success",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (app folder, target, config) combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub app_dir: PathBuf,
    pub target: String,
    /// Config-specific sdkconfig file, relative to the app folder
    pub sdkconfig_path: Option<PathBuf>,
    pub config_name: String,
    /// Work dir template, defaults to the app folder
    pub work_dir: Option<String>,
    /// Build dir template, relative to the work dir unless absolute
    pub build_dir: String,
    /// Build log file template, inside the build dir
    pub build_log_filename: Option<String>,
    pub build_status: BuildStatus,
    pub build_comment: Option<String>,
    pub test_comment: Option<String>,
    /// 1-based index in the build run
    pub index: Option<usize>,
}

impl App {
    pub fn new(app_dir: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            app_dir: app_dir.into(),
            target: target.into(),
            sdkconfig_path: None,
            config_name: String::new(),
            work_dir: None,
            build_dir: "build".to_string(),
            build_log_filename: None,
            build_status: BuildStatus::Unknown,
            build_comment: None,
            test_comment: None,
            index: None,
        }
    }

    pub fn with_config(mut self, sdkconfig_path: Option<PathBuf>, config_name: impl Into<String>) -> Self {
        self.sdkconfig_path = sdkconfig_path;
        self.config_name = config_name.into();
        self
    }

    pub fn with_dirs(mut self, work_dir: Option<String>, build_dir: impl Into<String>) -> Self {
        self.work_dir = work_dir;
        self.build_dir = build_dir.into();
        self
    }

    pub fn with_build_log(mut self, filename: Option<String>) -> Self {
        self.build_log_filename = filename;
        self
    }

    /// Folder name of the app
    pub fn name(&self) -> String {
        self.app_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Replace placeholders in a path template
    pub fn expand(&self, template: &str) -> String {
        let mut path = template.to_string();
        if let Some(index) = self.index {
            path = path.replace(INDEX_PLACEHOLDER, &index.to_string());
        }
        path = path.replace(TARGET_PLACEHOLDER, &self.target);
        path = path.replace(NAME_PLACEHOLDER, &self.name());
        if path.contains(FULL_NAME_PLACEHOLDER) {
            let escaped = self.app_dir.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "_");
            path = path.replace(FULL_NAME_PLACEHOLDER, &escaped);
        }

        if let Some(pos) = path.find(WILDCARD_PLACEHOLDER) {
            if self.config_name.is_empty() {
                // drop the delimiter left of the placeholder as well
                let left = path[..pos]
                    .char_indices()
                    .last()
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                path = format!("{}{}", &path[..left], &path[pos + WILDCARD_PLACEHOLDER.len()..]);
            } else {
                path = path.replace(WILDCARD_PLACEHOLDER, &self.config_name);
            }
        }
        path
    }

    pub fn work_path(&self) -> PathBuf {
        match &self.work_dir {
            Some(template) => PathBuf::from(self.expand(template)),
            None => self.app_dir.clone(),
        }
    }

    pub fn build_path(&self) -> PathBuf {
        let build_dir = PathBuf::from(self.expand(&self.build_dir));
        if build_dir.is_absolute() {
            build_dir
        } else {
            paths::normalize(&self.work_path().join(build_dir))
        }
    }

    pub fn build_log_path(&self) -> Option<PathBuf> {
        self.build_log_filename
            .as_ref()
            .map(|f| self.build_path().join(self.expand(f)))
    }

    /// Existing sdkconfig defaults files in the order they are applied
    pub fn sdkconfig_defaults(&self) -> Vec<PathBuf> {
        let work = self.work_path();
        let mut candidates = vec![
            work.join("sdkconfig.defaults"),
            work.join(format!("sdkconfig.defaults.{}", self.target)),
        ];
        if let Some(path) = &self.sdkconfig_path {
            candidates.push(work.join(path));
        }
        candidates.into_iter().filter(|p| p.is_file()).collect()
    }

    /// Expand a collect file path, `@p` being the parallel index
    pub fn expand_collect_path(template: &Path, parallel_index: usize) -> PathBuf {
        PathBuf::from(
            template
                .to_string_lossy()
                .replace(PARALLEL_INDEX_PLACEHOLDER, &parallel_index.to_string()),
        )
    }

    /// JSON record with resolved paths
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&AppInfo::from(self))
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "App {}, target {}, sdkconfig {}, build in {}",
            self.app_dir.display(),
            self.target,
            self.sdkconfig_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(default)".to_string()),
            self.build_path().display()
        )
    }
}

impl PartialOrd for App {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for App {
    fn cmp(&self, other: &Self) -> Ordering {
        self.app_dir
            .cmp(&other.app_dir)
            .then_with(|| self.target.cmp(&other.target))
            .then_with(|| self.config_name.cmp(&other.config_name))
            .then_with(|| self.sdkconfig_path.cmp(&other.sdkconfig_path))
    }
}

/// Serialized app record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub app_dir: PathBuf,
    pub target: String,
    pub config_name: String,
    pub sdkconfig_path: Option<PathBuf>,
    pub work_dir: PathBuf,
    pub build_path: PathBuf,
    pub build_log_path: Option<PathBuf>,
    pub build_status: BuildStatus,
    pub build_comment: Option<String>,
    pub test_comment: Option<String>,
}

impl From<&App> for AppInfo {
    fn from(app: &App) -> Self {
        Self {
            name: app.name(),
            app_dir: app.app_dir.clone(),
            target: app.target.clone(),
            config_name: app.config_name.clone(),
            sdkconfig_path: app.sdkconfig_path.clone(),
            work_dir: app.work_path(),
            build_path: app.build_path(),
            build_log_path: app.build_log_path(),
            build_status: app.build_status,
            build_comment: app.build_comment.clone(),
            test_comment: app.test_comment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app() -> App {
        App::new("/repo/examples/hello", "esp32c3")
    }

    #[test]
    fn test_expand_placeholders() {
        let mut app = app().with_config(None, "release");
        app.index = Some(3);
        assert_eq!(app.expand("build_@t_@w_@i"), "build_esp32c3_release_3");
        assert_eq!(app.expand("@n"), "hello");
        assert_eq!(app.expand("@f"), "_repo_examples_hello");
    }

    #[test]
    fn test_wildcard_without_config_name() {
        let app = app();
        assert_eq!(app.expand("build_@t_@w"), "build_esp32c3");
        assert_eq!(app.expand("@wbuild"), "build");
        // index placeholder is kept before a build index is assigned
        assert_eq!(app.expand("log_@i"), "log_@i");
    }

    #[test]
    fn test_build_paths() {
        let app = app()
            .with_dirs(Some("/tmp/work/@n".to_string()), "build_@t")
            .with_build_log(Some("build_log.txt".to_string()));
        assert_eq!(app.work_path(), PathBuf::from("/tmp/work/hello"));
        assert_eq!(app.build_path(), PathBuf::from("/tmp/work/hello/build_esp32c3"));
        assert_eq!(
            app.build_log_path(),
            Some(PathBuf::from("/tmp/work/hello/build_esp32c3/build_log.txt"))
        );

        let absolute = App::new("/repo/a", "esp32").with_dirs(None, "/out/@t");
        assert_eq!(absolute.build_path(), PathBuf::from("/out/esp32"));
    }

    #[test]
    fn test_sdkconfig_defaults_order() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("sdkconfig.defaults"), "").unwrap();
        std::fs::write(temp.path().join("sdkconfig.defaults.esp32"), "").unwrap();
        std::fs::write(temp.path().join("sdkconfig.ci.psram"), "").unwrap();

        let app = App::new(temp.path(), "esp32")
            .with_config(Some(PathBuf::from("sdkconfig.ci.psram")), "psram");
        assert_eq!(
            app.sdkconfig_defaults(),
            vec![
                temp.path().join("sdkconfig.defaults"),
                temp.path().join("sdkconfig.defaults.esp32"),
                temp.path().join("sdkconfig.ci.psram"),
            ]
        );
        assert_eq!(App::new(temp.path(), "esp32c3").sdkconfig_defaults().len(), 1);
    }

    #[test]
    fn test_ordering_and_json() {
        let mut apps = vec![
            App::new("/repo/b", "esp32"),
            App::new("/repo/a", "esp32s2"),
            App::new("/repo/a", "esp32"),
        ];
        apps.sort();
        assert_eq!(apps[0].app_dir, PathBuf::from("/repo/a"));
        assert_eq!(apps[0].target, "esp32");

        let json = apps[0].to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["target"], "esp32");
        assert_eq!(value["build_status"], "unknown");
        assert_eq!(value["build_path"], "/repo/a/build");
    }

    #[test]
    fn test_collect_path_parallel_index() {
        assert_eq!(
            App::expand_collect_path(Path::new("app_info_@p.txt"), 2),
            PathBuf::from("app_info_2.txt")
        );
    }
}
