//! Settings types

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fully resolved settings for a find or build run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folders to look for apps in
    pub paths: Vec<PathBuf>,

    /// Target to find or build apps for, `all` means every known target
    pub target: String,

    /// Look for apps below `paths` recursively
    pub recursive: bool,

    /// Folders skipped by a recursive search
    pub exclude: Vec<PathBuf>,

    /// Copy the app here before building. May contain placeholders.
    pub work_dir: Option<PathBuf>,

    /// Build directory, relative to the work dir. May contain placeholders.
    pub build_dir: String,

    /// Build log file name inside the build directory
    pub build_log_filename: Option<String>,

    /// `FILE[=NAME]` rules mapping sdkconfig files to config names
    pub config_rules: Vec<String>,

    /// Manifest files with folder rules
    pub manifest_files: Vec<PathBuf>,

    /// Relative folders in manifest files are resolved against this path
    pub manifest_rootpath: PathBuf,

    /// Fail when a manifest folder is missing or declared twice
    pub check_manifest_rules: bool,

    /// Targets built for folders without `enable` clauses
    pub default_build_targets: Option<Vec<String>>,

    /// Build preview targets by default as well
    pub enable_preview_targets: bool,

    /// Components modified in this revision
    pub modified_components: Option<Vec<String>>,

    /// Files modified in this revision
    pub modified_files: Option<Vec<PathBuf>>,

    /// Build everything when one of these components is modified
    pub deactivate_dependency_driven_build_by_components: Option<Vec<String>>,

    /// Build everything when a modified file matches one of these patterns
    pub deactivate_dependency_driven_build_by_filepatterns: Option<Vec<String>>,

    /// Recorded manifest sha file to compare against
    pub compare_manifest_sha_filepath: Option<PathBuf>,

    /// SDK checkout, falls back to the `IDF_PATH` environment variable
    pub idf_path: Option<PathBuf>,

    /// Number of parallel jobs the app list is split into
    pub parallel_count: usize,

    /// 1-based index of this job
    pub parallel_index: usize,

    /// Continue building after a failed build
    pub keep_going: bool,

    /// Do not invoke the build backend
    pub dry_run: bool,

    /// Treat warnings in the build log as errors
    pub check_warnings: bool,

    /// Regexes of warnings that are ignored
    pub ignore_warning_strs: Vec<String>,

    /// Append one JSON line per built app to this file
    pub collect_app_info: Option<PathBuf>,

    /// Keep apps skipped by the dependency gate in the output
    pub include_skipped_apps: bool,

    /// Keep apps disabled by manifest rules in the output
    pub include_disabled_apps: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            target: "all".to_string(),
            recursive: false,
            exclude: Vec::new(),
            work_dir: None,
            build_dir: "build".to_string(),
            build_log_filename: None,
            config_rules: Vec::new(),
            manifest_files: Vec::new(),
            manifest_rootpath: PathBuf::from("."),
            check_manifest_rules: false,
            default_build_targets: None,
            enable_preview_targets: false,
            modified_components: None,
            modified_files: None,
            deactivate_dependency_driven_build_by_components: None,
            deactivate_dependency_driven_build_by_filepatterns: None,
            compare_manifest_sha_filepath: None,
            idf_path: None,
            parallel_count: 1,
            parallel_index: 1,
            keep_going: false,
            dry_run: false,
            check_warnings: false,
            ignore_warning_strs: Vec::new(),
            collect_app_info: None,
            include_skipped_apps: false,
            include_disabled_apps: false,
        }
    }
}

impl Settings {
    /// SDK root from the settings or the `IDF_PATH` environment variable
    pub fn resolve_idf_path(&self) -> Option<PathBuf> {
        self.idf_path
            .clone()
            .or_else(|| std::env::var_os("IDF_PATH").map(PathBuf::from))
    }

    /// Resolve relative paths of the settings file against its folder
    pub fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        self.paths.iter_mut().for_each(join);
        self.exclude.iter_mut().for_each(join);
        self.manifest_files.iter_mut().for_each(join);
        join(&mut self.manifest_rootpath);
        if let Some(p) = self.compare_manifest_sha_filepath.as_mut() {
            join(p);
        }
        if let Some(p) = self.idf_path.as_mut() {
            join(p);
        }
    }
}
