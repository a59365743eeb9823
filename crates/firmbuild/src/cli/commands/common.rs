//! Arguments and setup shared by `find` and `build`

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::{debug, info, warn};

use firmbuild_core::config::{load_settings, load_settings_or_default, validate_settings};
use firmbuild_core::{Manifest, ManifestOptions, RuleEnv, SdkInfo, Settings};
use firmbuild_tasks::{find_apps, App, FindOptions};

/// App discovery options
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Settings file, searched upwards from the working directory by default
    #[arg(long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Folders to look for apps in
    #[arg(short, long, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Target to find apps for, `all` for every known target
    #[arg(short, long)]
    pub target: Option<String>,

    /// Look for apps recursively
    #[arg(long)]
    pub recursive: bool,

    /// Folders skipped by a recursive search
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<PathBuf>,

    /// Copy apps here before building, placeholders allowed
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Build directory relative to the work dir, placeholders allowed
    #[arg(long)]
    pub build_dir: Option<String>,

    /// Build log file name inside the build directory
    #[arg(long)]
    pub build_log: Option<String>,

    /// `FILE[=NAME]` rules mapping sdkconfig files to config names
    #[arg(long, num_args = 1..)]
    pub config_rules: Vec<String>,

    /// Manifest files with folder rules
    #[arg(long, num_args = 1..)]
    pub manifest_files: Vec<PathBuf>,

    /// Resolve relative manifest folders against this path
    #[arg(long)]
    pub manifest_rootpath: Option<PathBuf>,

    /// Fail on missing or duplicated manifest folders
    #[arg(long)]
    pub check_manifest_rules: bool,

    /// Targets built for folders without enable clauses
    #[arg(long, num_args = 1.., value_delimiter = ';')]
    pub default_build_targets: Option<Vec<String>>,

    /// Build preview targets by default as well
    #[arg(long)]
    pub enable_preview_targets: bool,

    /// Components modified in this revision, `;` separated
    #[arg(long, num_args = 0.., value_delimiter = ';')]
    pub modified_components: Option<Vec<String>>,

    /// Files modified in this revision, `;` separated
    #[arg(long, num_args = 0.., value_delimiter = ';')]
    pub modified_files: Option<Vec<PathBuf>>,

    /// Build everything when one of these components is modified
    #[arg(long, num_args = 1.., value_delimiter = ';')]
    pub deactivate_dependency_driven_build_by_components: Option<Vec<String>>,

    /// Build everything when a modified file matches one of these patterns
    #[arg(long, num_args = 1.., value_delimiter = ';')]
    pub deactivate_dependency_driven_build_by_filepatterns: Option<Vec<String>>,

    /// Treat folders whose rules differ from this sha file as modified
    #[arg(long)]
    pub compare_manifest_sha_filepath: Option<PathBuf>,

    /// Keep apps skipped by the dependency gate
    #[arg(long)]
    pub include_skipped_apps: bool,

    /// Keep apps disabled by manifest rules
    #[arg(long)]
    pub include_disabled_apps: bool,

    /// Include both skipped and disabled apps
    #[arg(long)]
    pub include_all_apps: bool,

    /// SDK checkout
    #[arg(long, env = "IDF_PATH")]
    pub idf_path: Option<PathBuf>,
}

impl CommonArgs {
    /// Settings from file, overridden by the given flags
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let (mut settings, path) = match &self.config_file {
            Some(path) => (load_settings(path)?, Some(path.clone())),
            None => load_settings_or_default(&std::env::current_dir()?)?,
        };
        match &path {
            Some(path) => debug!(path = %path.display(), "using settings file"),
            None => debug!("using default settings"),
        }

        if !self.paths.is_empty() {
            settings.paths = self.paths.clone();
        }
        if let Some(target) = &self.target {
            settings.target = target.clone();
        }
        settings.recursive |= self.recursive;
        if !self.exclude.is_empty() {
            settings.exclude = self.exclude.clone();
        }
        if self.work_dir.is_some() {
            settings.work_dir = self.work_dir.clone();
        }
        if let Some(build_dir) = &self.build_dir {
            settings.build_dir = build_dir.clone();
        }
        if self.build_log.is_some() {
            settings.build_log_filename = self.build_log.clone();
        }
        if !self.config_rules.is_empty() {
            settings.config_rules = self.config_rules.clone();
        }
        if !self.manifest_files.is_empty() {
            settings.manifest_files = self.manifest_files.clone();
        }
        if let Some(root) = &self.manifest_rootpath {
            settings.manifest_rootpath = root.clone();
        }
        settings.check_manifest_rules |= self.check_manifest_rules;
        if self.default_build_targets.is_some() {
            settings.default_build_targets = self.default_build_targets.clone();
        }
        settings.enable_preview_targets |= self.enable_preview_targets;
        if self.modified_components.is_some() {
            settings.modified_components = self.modified_components.clone();
        }
        if self.modified_files.is_some() {
            settings.modified_files = self.modified_files.clone();
        }
        if self.deactivate_dependency_driven_build_by_components.is_some() {
            settings.deactivate_dependency_driven_build_by_components =
                self.deactivate_dependency_driven_build_by_components.clone();
        }
        if self.deactivate_dependency_driven_build_by_filepatterns.is_some() {
            settings.deactivate_dependency_driven_build_by_filepatterns =
                self.deactivate_dependency_driven_build_by_filepatterns.clone();
        }
        if self.compare_manifest_sha_filepath.is_some() {
            settings.compare_manifest_sha_filepath = self.compare_manifest_sha_filepath.clone();
        }
        settings.include_skipped_apps |= self.include_skipped_apps || self.include_all_apps;
        settings.include_disabled_apps |= self.include_disabled_apps || self.include_all_apps;
        if self.idf_path.is_some() {
            settings.idf_path = self.idf_path.clone();
        }

        if settings.paths.is_empty() {
            settings.paths = vec![PathBuf::from(".")];
        }
        Ok(settings)
    }
}

/// Rule environment from the SDK, or built-in target lists without one
pub fn load_env(settings: &Settings) -> RuleEnv {
    match settings.resolve_idf_path() {
        Some(root) => match SdkInfo::load(&root) {
            Ok(sdk) => {
                info!(idf_path = %root.display(), "loaded SDK information");
                RuleEnv::from_sdk(sdk)
            }
            Err(err) => {
                warn!(error = %err, "cannot load SDK information, using built-in targets");
                RuleEnv::default()
            }
        },
        None => {
            debug!("IDF_PATH not set, using built-in targets");
            RuleEnv::default()
        }
    }
}

/// Load every manifest file named by the settings
pub fn load_manifest(settings: &Settings) -> anyhow::Result<Manifest> {
    let options = ManifestOptions::new(&settings.manifest_rootpath).strict(settings.check_manifest_rules);
    Ok(Manifest::from_files(&settings.manifest_files, &options)?)
}

/// Validated settings and the apps they select
pub fn discover(args: &CommonArgs) -> anyhow::Result<(Settings, Vec<App>)> {
    let settings = args.settings()?;
    validate_settings(&settings)?;

    let manifest = load_manifest(&settings)?;
    let mut env = load_env(&settings);
    let apps = find_apps(&FindOptions::from_settings(&settings), &manifest, &mut env)?;
    Ok((settings, apps))
}

/// Display form of an app path relative to the working directory
pub fn display_path(path: &Path) -> String {
    match std::env::current_dir() {
        Ok(cwd) => firmbuild_core::paths::relative_to(path, &cwd).display().to_string(),
        Err(_) => path.display().to_string(),
    }
}
