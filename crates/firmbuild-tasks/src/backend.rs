//! Build backends

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use firmbuild_core::FirmbuildError;

use crate::app::App;

/// Build backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IDF_PATH is not set, cannot locate idf.py")]
    MissingIdfPath,

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare {path}: {source}")]
    Prepare {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<BackendError> for FirmbuildError {
    fn from(err: BackendError) -> Self {
        FirmbuildError::Build(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Per-run build options shared by every app
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub idf_path: Option<PathBuf>,
    pub dry_run: bool,
}

/// Result of one backend invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    pub success: bool,
    pub log_lines: Vec<String>,
}

/// Something that turns an app into build artifacts
pub trait BuildBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    fn build(&self, app: &App, request: &BuildRequest) -> Result<BuildOutcome>;
}

/// Copy the app folder into its work dir, leaving out build folders
pub fn prepare_work_dir(app: &App) -> Result<()> {
    let work = app.work_path();
    if work == app.app_dir {
        return Ok(());
    }
    debug!(from = %app.app_dir.display(), to = %work.display(), "copying app to work dir");

    let prepare_err = |path: &Path, source: std::io::Error| BackendError::Prepare {
        path: path.to_path_buf(),
        source,
    };
    let build_path = app.build_path();
    let mut walker = WalkDir::new(&app.app_dir).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| prepare_err(&app.app_dir, e.into()))?;
        let src = entry.path();
        if src == build_path || (entry.file_type().is_dir() && src.join("CMakeCache.txt").is_file()) {
            walker.skip_current_dir();
            continue;
        }
        let relative = src.strip_prefix(&app.app_dir).unwrap_or(src);
        let dest = work.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| prepare_err(&dest, e))?;
        } else {
            std::fs::copy(src, &dest).map_err(|e| prepare_err(&dest, e))?;
        }
    }
    Ok(())
}

/// Empty the build dir, creating it when missing
pub fn prepare_build_dir(app: &App) -> Result<()> {
    let build_path = app.build_path();
    if build_path.exists() {
        debug!(path = %build_path.display(), "removing existing build dir");
        std::fs::remove_dir_all(&build_path).map_err(|source| BackendError::Prepare {
            path: build_path.clone(),
            source,
        })?;
    }
    std::fs::create_dir_all(&build_path).map_err(|source| BackendError::Prepare {
        path: build_path.clone(),
        source,
    })
}

/// Builds through `idf.py` of an SDK checkout
#[derive(Debug, Default)]
pub struct IdfPyBackend {
    python: Option<String>,
}

impl IdfPyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific python interpreter instead of `python`
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = Some(python.into());
        self
    }

    /// Arguments passed to the interpreter
    pub fn args(&self, app: &App, idf_path: &Path) -> Vec<String> {
        let mut args = vec![
            idf_path.join("tools").join("idf.py").to_string_lossy().to_string(),
            "-B".to_string(),
            app.build_path().to_string_lossy().to_string(),
            "-C".to_string(),
            app.work_path().to_string_lossy().to_string(),
            format!("-DIDF_TARGET={}", app.target),
        ];
        let defaults = app.sdkconfig_defaults();
        if !defaults.is_empty() {
            let joined: Vec<String> = defaults.iter().map(|p| p.to_string_lossy().to_string()).collect();
            args.push(format!("-DSDKCONFIG_DEFAULTS={}", joined.join(";")));
        }
        args.push("build".to_string());
        args
    }
}

impl BuildBackend for IdfPyBackend {
    fn name(&self) -> &str {
        "idf.py"
    }

    fn build(&self, app: &App, request: &BuildRequest) -> Result<BuildOutcome> {
        let python = self.python.as_deref().unwrap_or("python");
        if request.dry_run {
            let idf_path = request.idf_path.clone().unwrap_or_else(|| PathBuf::from("$IDF_PATH"));
            let command = format!("{} {}", python, self.args(app, &idf_path).join(" "));
            info!(command = %command, "dry run, not building");
            return Ok(BuildOutcome {
                success: true,
                log_lines: Vec::new(),
            });
        }

        let idf_path = request.idf_path.as_ref().ok_or(BackendError::MissingIdfPath)?;
        let args = self.args(app, idf_path);
        let command = format!("{} {}", python, args.join(" "));

        prepare_work_dir(app)?;
        prepare_build_dir(app)?;
        debug!(command = %command, "running build");

        let output = Command::new(python)
            .args(&args)
            .env("IDF_PATH", idf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| BackendError::Spawn {
                command: command.clone(),
                source,
            })?;

        let mut log = String::from_utf8_lossy(&output.stdout).to_string();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if let Some(log_path) = app.build_log_path() {
            std::fs::write(&log_path, &log).map_err(|source| BackendError::Prepare {
                path: log_path.clone(),
                source,
            })?;
            debug!(path = %log_path.display(), "build log written");
        }

        Ok(BuildOutcome {
            success: output.status.success(),
            log_lines: log.lines().map(str::to_string).collect(),
        })
    }
}
