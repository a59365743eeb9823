//! Build runner: partitioning, gating, building and reporting

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, info, warn};

use firmbuild_core::{FirmbuildError, Result, Settings};

use crate::app::{App, BuildStatus};
use crate::backend::{BuildBackend, BuildRequest};
use crate::reporter::{BuildEvent, BuildReporterRegistry};

fn warning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:error|warning):").expect("warning regex is valid"))
}

/// 1-based inclusive slice of `total` items handled by job `index` of `count`
pub fn parallel_start_stop(total: usize, count: usize, index: usize) -> (usize, usize) {
    let count = count.max(1);
    let per_job = total.div_ceil(count);
    let start = per_job * (index.max(1) - 1) + 1;
    let stop = (per_job * index.max(1)).min(total);
    (start, stop)
}

/// Options for one build run
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub parallel_count: usize,
    pub parallel_index: usize,
    pub keep_going: bool,
    pub dry_run: bool,
    pub check_warnings: bool,
    pub ignore_warning_strs: Vec<String>,
    pub collect_app_info: Option<PathBuf>,
    pub idf_path: Option<PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            parallel_count: 1,
            parallel_index: 1,
            keep_going: false,
            dry_run: false,
            check_warnings: false,
            ignore_warning_strs: Vec::new(),
            collect_app_info: None,
            idf_path: None,
        }
    }
}

impl RunnerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            parallel_count: settings.parallel_count,
            parallel_index: settings.parallel_index,
            keep_going: settings.keep_going,
            dry_run: settings.dry_run,
            check_warnings: settings.check_warnings,
            ignore_warning_strs: settings.ignore_warning_strs.clone(),
            collect_app_info: settings.collect_app_info.clone(),
            idf_path: settings.resolve_idf_path(),
        }
    }
}

/// What happened to the apps of one job
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub apps: Vec<App>,
}

impl BuildSummary {
    /// Apps grouped by final status
    pub fn by_status(&self) -> BTreeMap<String, Vec<&App>> {
        let mut groups: BTreeMap<String, Vec<&App>> = BTreeMap::new();
        for app in &self.apps {
            groups.entry(app.build_status.to_string()).or_default().push(app);
        }
        groups
    }

    pub fn count(&self, status: BuildStatus) -> usize {
        self.apps.iter().filter(|a| a.build_status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(BuildStatus::Failed) > 0
    }

    /// Process exit code for the run
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else {
            0
        }
    }
}

/// Builds the apps of one parallel job
pub struct BuildRunner<'a> {
    backend: &'a dyn BuildBackend,
    options: RunnerOptions,
    reporters: BuildReporterRegistry,
    ignore_warnings: Vec<Regex>,
}

impl<'a> BuildRunner<'a> {
    pub fn new(backend: &'a dyn BuildBackend, options: RunnerOptions) -> Result<Self> {
        let ignore_warnings = options
            .ignore_warning_strs
            .iter()
            .map(|s| {
                Regex::new(s).map_err(|e| FirmbuildError::invalid_command(format!("Invalid ignore warning regex {}: {}", s, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            backend,
            options,
            reporters: BuildReporterRegistry::new(),
            ignore_warnings,
        })
    }

    pub fn with_reporters(mut self, reporters: BuildReporterRegistry) -> Self {
        self.reporters = reporters;
        self
    }

    /// Log lines that look like warnings and are not ignored
    pub fn find_warnings<'l>(&self, lines: &'l [String]) -> Vec<&'l str> {
        lines
            .iter()
            .map(String::as_str)
            .filter(|line| warning_re().is_match(line))
            .filter(|line| !self.ignore_warnings.iter().any(|re| re.is_match(line)))
            .collect()
    }

    /// Build this job's slice of `apps`.
    ///
    /// Stops at the first failure unless `keep_going` is set. Apps without a
    /// final status are left out of the summary.
    pub fn run(&self, mut apps: Vec<App>) -> Result<BuildSummary> {
        apps.sort();
        let (start, stop) = parallel_start_stop(
            apps.len(),
            self.options.parallel_count,
            self.options.parallel_index,
        );
        info!(
            total = apps.len(),
            start,
            stop,
            parallel_index = self.options.parallel_index,
            parallel_count = self.options.parallel_count,
            "building apps"
        );

        let request = BuildRequest {
            idf_path: self.options.idf_path.clone(),
            dry_run: self.options.dry_run,
        };
        let run_started = Instant::now();
        let mut done = Vec::new();

        let job_apps: Vec<App> = if start > stop {
            Vec::new()
        } else {
            apps.into_iter().skip(start - 1).take(stop + 1 - start).collect()
        };

        for (offset, mut app) in job_apps.into_iter().enumerate() {
            let index = start + offset;
            app.index = Some(index);
            let label = app.to_string();

            match app.build_status {
                BuildStatus::Skipped | BuildStatus::Disabled => {
                    self.reporters.broadcast(&BuildEvent::Skipped {
                        index,
                        app: label,
                        reason: app.build_comment.clone().unwrap_or_default(),
                    });
                    self.collect(&app)?;
                    done.push(app);
                    continue;
                }
                _ => {}
            }

            self.reporters.broadcast(&BuildEvent::Started {
                index,
                app: label.clone(),
                at: Utc::now(),
            });
            let started = Instant::now();
            self.build_one(&mut app, &request)?;
            self.reporters.broadcast(&BuildEvent::Finished {
                index,
                app: label,
                status: app.build_status,
                duration: started.elapsed(),
                comment: app.build_comment.clone(),
            });
            self.collect(&app)?;

            let failed = app.build_status == BuildStatus::Failed;
            done.push(app);
            if failed && !self.options.keep_going {
                warn!(index, "build failed, stopping");
                break;
            }
        }

        let summary = BuildSummary { apps: done };
        self.reporters.broadcast(&BuildEvent::AllCompleted {
            total: summary.apps.len(),
            succeeded: summary.count(BuildStatus::Success),
            failed: summary.count(BuildStatus::Failed),
            skipped: summary.count(BuildStatus::Skipped) + summary.count(BuildStatus::Disabled),
            duration: run_started.elapsed(),
        });
        Ok(summary)
    }

    fn build_one(&self, app: &mut App, request: &BuildRequest) -> Result<()> {
        let outcome = match self.backend.build(app, request) {
            Ok(outcome) => outcome,
            Err(err) => {
                app.build_status = BuildStatus::Failed;
                app.build_comment = Some(err.to_string());
                return Ok(());
            }
        };

        if request.dry_run {
            app.build_status = BuildStatus::Skipped;
            app.build_comment = Some("dry run".to_string());
            return Ok(());
        }

        if !outcome.success {
            app.build_status = BuildStatus::Failed;
            app.build_comment = Some(match app.build_log_path() {
                Some(path) => format!("build failed, see {}", path.display()),
                None => "build failed".to_string(),
            });
            return Ok(());
        }

        let warnings = self.find_warnings(&outcome.log_lines);
        for line in &warnings {
            self.reporters.broadcast(&BuildEvent::Warning {
                app: app.app_dir.display().to_string(),
                line: line.to_string(),
            });
        }
        if self.options.check_warnings && !warnings.is_empty() {
            app.build_status = BuildStatus::Failed;
            app.build_comment = Some(format!("build succeeded with {} warning(s)", warnings.len()));
        } else {
            app.build_status = BuildStatus::Success;
        }
        Ok(())
    }

    /// Append the app record to the collect file
    fn collect(&self, app: &App) -> Result<()> {
        let Some(template) = &self.options.collect_app_info else {
            return Ok(());
        };
        let path = App::expand_collect_path(template, self.options.parallel_index);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", app.to_json()?)?;
        debug!(path = %path.display(), "app info collected");
        Ok(())
    }
}
