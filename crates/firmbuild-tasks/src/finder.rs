//! App discovery

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use firmbuild_core::gate::check_should_build;
use firmbuild_core::sdk::pinned_target;
use firmbuild_core::{
    paths, BuildDecision, DependencyDrivenSettings, EvalContext, FirmbuildError, Manifest, Result, RuleEnv,
    Settings,
};

use crate::app::{App, BuildStatus};

const MANAGED_COMPONENTS_DIR: &str = "managed_components";

fn project_include_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*include\s*\(\s*\S*project\.cmake\s*\)").expect("project include regex is valid")
    })
}

/// Whether `path` holds a CMake app
pub fn is_app(path: &Path) -> bool {
    let cmakelists = path.join("CMakeLists.txt");
    match std::fs::read_to_string(&cmakelists) {
        Ok(content) => project_include_re().is_match(&content),
        Err(_) => false,
    }
}

/// `FILE[=NAME]` mapping sdkconfig files to config names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRule {
    /// Glob relative to the app folder, empty for the default config
    pub file_name: String,
    pub config_name: String,
}

impl ConfigRule {
    pub fn parse(rule: &str) -> Self {
        match rule.split_once('=') {
            Some((file, name)) => Self {
                file_name: file.trim().to_string(),
                config_name: name.trim().to_string(),
            },
            None => Self {
                file_name: rule.trim().to_string(),
                config_name: String::new(),
            },
        }
    }

    /// Config name for a matched file, taken from the `*` part when the rule names none
    fn config_name_for(&self, relative: &str) -> String {
        if !self.config_name.is_empty() {
            return self.config_name.clone();
        }
        match self.file_name.split_once('*') {
            Some((prefix, suffix)) => {
                let trimmed = relative.strip_prefix(prefix).unwrap_or(relative);
                trimmed.strip_suffix(suffix).unwrap_or(trimmed).to_string()
            }
            None => String::new(),
        }
    }
}

/// Options for one discovery run
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub paths: Vec<PathBuf>,
    pub target: String,
    pub recursive: bool,
    pub exclude: Vec<PathBuf>,
    pub work_dir: Option<String>,
    pub build_dir: String,
    pub build_log_filename: Option<String>,
    pub config_rules: Vec<ConfigRule>,
    pub default_build_targets: Option<Vec<String>>,
    pub enable_preview_targets: bool,
    pub modified_components: Option<Vec<String>>,
    pub modified_files: Option<Vec<PathBuf>>,
    pub deactivate_by_components: Option<Vec<String>>,
    pub deactivate_by_filepatterns: Option<Vec<String>>,
    pub compare_manifest_sha_filepath: Option<PathBuf>,
    pub include_skipped_apps: bool,
    pub include_disabled_apps: bool,
}

impl FindOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            paths: settings.paths.clone(),
            target: settings.target.clone(),
            recursive: settings.recursive,
            exclude: settings.exclude.clone(),
            work_dir: settings.work_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
            build_dir: settings.build_dir.clone(),
            build_log_filename: settings.build_log_filename.clone(),
            config_rules: settings.config_rules.iter().map(|r| ConfigRule::parse(r)).collect(),
            default_build_targets: settings.default_build_targets.clone(),
            enable_preview_targets: settings.enable_preview_targets,
            modified_components: settings.modified_components.clone(),
            modified_files: settings.modified_files.clone(),
            deactivate_by_components: settings.deactivate_dependency_driven_build_by_components.clone(),
            deactivate_by_filepatterns: settings.deactivate_dependency_driven_build_by_filepatterns.clone(),
            compare_manifest_sha_filepath: settings.compare_manifest_sha_filepath.clone(),
            include_skipped_apps: settings.include_skipped_apps,
            include_disabled_apps: settings.include_disabled_apps,
        }
    }

    fn targets(&self, env: &RuleEnv) -> Vec<String> {
        if self.target == "all" {
            env.all_targets()
        } else {
            vec![self.target.clone()]
        }
    }

    /// Default build targets for folders without `enable` clauses
    fn default_targets(&self, env: &RuleEnv) -> Vec<String> {
        if let Some(targets) = &self.default_build_targets {
            let (known, unknown): (Vec<String>, Vec<String>) =
                targets.iter().cloned().partition(|t| env.is_known_target(t));
            if !unknown.is_empty() {
                warn!(targets = %unknown.join(", "), "ignoring unknown default build targets");
            }
            return known;
        }
        let mut targets = env.targets().supported.clone();
        if self.enable_preview_targets {
            targets.extend(env.targets().preview.iter().cloned());
        }
        targets
    }
}

/// Find apps under the configured paths, sorted.
///
/// Apps disabled by manifest rules or skipped by the dependency gate are
/// dropped unless the matching `include_*` option is set.
pub fn find_apps(options: &FindOptions, manifest: &Manifest, env: &mut RuleEnv) -> Result<Vec<App>> {
    let root = paths::absolute(manifest.root_path())?;
    let mut dd_settings = DependencyDrivenSettings::new(
        &root,
        options.modified_components.clone(),
        options.modified_files.clone(),
        options.deactivate_by_components.clone(),
        options.deactivate_by_filepatterns.clone(),
    )?;
    if let Some(recorded) = &options.compare_manifest_sha_filepath {
        let folders = manifest.diff_sha_with_filepath(recorded, true)?;
        debug!(count = folders.len(), "manifest folders modified since the recorded sha file");
        dd_settings = dd_settings.with_modified_manifest_folders(folders);
    }

    let defaults = options.default_targets(env);
    let mut apps = env.with_override(defaults, |env| -> Result<Vec<App>> {
        let finder = Finder {
            options,
            manifest,
            env,
            dd_settings: &dd_settings,
        };
        let mut apps = Vec::new();
        for path in &options.paths {
            for app_dir in finder.app_dirs(path)? {
                for target in options.targets(env) {
                    apps.extend(finder.apps_for(&app_dir, &target)?);
                }
            }
        }
        Ok(apps)
    })?;

    apps.sort();
    apps.dedup();
    info!(count = apps.len(), "found apps");
    Ok(apps)
}

struct Finder<'a> {
    options: &'a FindOptions,
    manifest: &'a Manifest,
    env: &'a RuleEnv,
    dd_settings: &'a DependencyDrivenSettings,
}

impl Finder<'_> {
    fn is_excluded(&self, dir: &Path) -> Result<bool> {
        let dir = paths::absolute(dir)?;
        for exclude in &self.options.exclude {
            if paths::absolute(exclude)? == dir {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// App folders at or below `path`
    fn app_dirs(&self, path: &Path) -> Result<Vec<PathBuf>> {
        debug!(
            path = %path.display(),
            recursive = self.options.recursive,
            "looking for apps"
        );
        if !self.options.recursive {
            if !self.options.exclude.is_empty() {
                warn!("exclude option is ignored when used without recursive");
            }
            return Ok(if is_app(path) {
                vec![path.to_path_buf()]
            } else {
                debug!(path = %path.display(), "not an app, skipping");
                Vec::new()
            });
        }

        let mut dirs = Vec::new();
        let mut walker = WalkDir::new(path).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir = entry.path();
            if self.is_excluded(dir)? {
                debug!(dir = %dir.display(), "skipping excluded folder");
                walker.skip_current_dir();
                continue;
            }
            if dir.file_name().is_some_and(|n| n == MANAGED_COMPONENTS_DIR) {
                debug!(dir = %dir.display(), "skipping managed components");
                walker.skip_current_dir();
                continue;
            }
            if is_app(dir) {
                debug!(dir = %dir.display(), "found app, not descending further");
                dirs.push(dir.to_path_buf());
                walker.skip_current_dir();
            }
        }
        Ok(dirs)
    }

    /// sdkconfig files and config names for one target
    fn configs(&self, app_dir: &Path, target: &str) -> Result<Vec<(Option<PathBuf>, String)>> {
        let mut default_config_name = String::new();
        let mut configs = Vec::new();

        for rule in &self.options.config_rules {
            if rule.file_name.is_empty() {
                default_config_name = rule.config_name.clone();
                continue;
            }

            let pattern = app_dir.join(&rule.file_name);
            let matches = glob::glob(&pattern.to_string_lossy())
                .map_err(|e| FirmbuildError::other(format!("Invalid config rule {}: {}", rule.file_name, e)))?;
            let mut files: Vec<PathBuf> = matches.filter_map(|m| m.ok()).filter(|p| p.is_file()).collect();
            files.sort();

            for file in files {
                if let Some(pinned) = pinned_target([file.as_path()]) {
                    if pinned != target {
                        debug!(
                            sdkconfig = %file.display(),
                            required = %pinned,
                            "skipping sdkconfig which requires another target"
                        );
                        continue;
                    }
                }
                let relative = paths::relative_to(&file, app_dir);
                let config_name = rule.config_name_for(&relative.to_string_lossy());
                debug!(
                    app_dir = %app_dir.display(),
                    sdkconfig = %relative.display(),
                    config_name = %config_name,
                    "found app config"
                );
                configs.push((Some(relative), config_name));
            }
        }

        if configs.is_empty() {
            configs.push((None, default_config_name));
        }
        Ok(configs)
    }

    fn apps_for(&self, app_dir: &Path, target: &str) -> Result<Vec<App>> {
        let abs_dir = paths::absolute(app_dir)?;
        let rule = self.manifest.most_suitable_rule(&abs_dir);
        let mut apps = Vec::new();

        for (sdkconfig_path, config_name) in self.configs(app_dir, target)? {
            let mut pin_files = vec![app_dir.join("sdkconfig.defaults")];
            if let Some(path) = &sdkconfig_path {
                pin_files.push(app_dir.join(path));
            }
            let pinned = pinned_target(pin_files.iter().filter(|p| p.is_file()).map(PathBuf::as_path));

            if let Some(pinned) = &pinned {
                if pinned != target {
                    debug!(app_dir = %app_dir.display(), pinned = %pinned, target, "app is pinned to another target");
                    continue;
                }
            }

            let build_targets = rule.enable_build_targets(self.env, pinned.as_deref(), &config_name)?;
            if pinned.is_some() && build_targets.is_empty() {
                continue;
            }

            let ctx = EvalContext::new(self.env, target, &config_name);
            let mut app = App::new(app_dir, target)
                .with_config(sdkconfig_path, config_name.clone())
                .with_dirs(self.options.work_dir.clone(), self.options.build_dir.clone())
                .with_build_log(self.options.build_log_filename.clone());

            if build_targets.iter().any(|t| t == target) {
                app.test_comment = rule.test_disable_reason(&ctx)?;
                match check_should_build(&rule, &abs_dir, &ctx, self.dd_settings)? {
                    BuildDecision::Skip(reason) => {
                        app.build_status = BuildStatus::Skipped;
                        app.build_comment = Some(reason);
                    }
                    BuildDecision::ShouldBuild(reason) => {
                        app.build_status = BuildStatus::ShouldBeBuilt;
                        app.build_comment = Some(reason);
                    }
                    BuildDecision::Defer => app.build_status = BuildStatus::ShouldBeBuilt,
                }
            } else {
                app.build_status = BuildStatus::Disabled;
                app.build_comment = rule.build_disable_reason(&ctx)?;
            }

            let keep = match app.build_status {
                BuildStatus::Disabled => self.options.include_disabled_apps,
                BuildStatus::Skipped => self.options.include_skipped_apps,
                _ => true,
            };
            if keep {
                apps.push(app);
            } else {
                debug!(
                    app_dir = %app_dir.display(),
                    target,
                    status = %app.build_status,
                    comment = app.build_comment.as_deref().unwrap_or(""),
                    "dropping app"
                );
            }
        }
        Ok(apps)
    }
}
