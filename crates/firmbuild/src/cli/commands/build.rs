//! Build command

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::{debug, info};

use firmbuild_tasks::{BuildRunner, BuildSummary, IdfPyBackend, RunnerOptions};

use super::common::{discover, display_path, CommonArgs};
use crate::cli::{output, Cli, OutputFormat};

/// Find apps and build them
#[derive(Debug, Args)]
pub struct BuildCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Number of parallel jobs the app list is split into
    #[arg(long)]
    pub parallel_count: Option<usize>,

    /// 1-based index of this job
    #[arg(long)]
    pub parallel_index: Option<usize>,

    /// Continue building after a failed build
    #[arg(long)]
    pub keep_going: bool,

    /// Print the build commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Fail builds whose log contains warnings
    #[arg(long)]
    pub check_warnings: bool,

    /// Regexes of warnings to ignore
    #[arg(long, num_args = 1..)]
    pub ignore_warning_str: Vec<String>,

    /// Append one JSON line per app to this file, `@p` is the parallel index
    #[arg(long)]
    pub collect_app_info: Option<PathBuf>,

    /// Python interpreter running idf.py
    #[arg(long)]
    pub python: Option<String>,
}

impl BuildCommand {
    /// Execute the build command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        info!("executing build command");
        let (mut settings, apps) = discover(&self.common)?;

        if let Some(count) = self.parallel_count {
            settings.parallel_count = count;
        }
        if let Some(index) = self.parallel_index {
            settings.parallel_index = index;
        }
        settings.keep_going |= self.keep_going;
        settings.dry_run |= self.dry_run;
        settings.check_warnings |= self.check_warnings;
        if !self.ignore_warning_str.is_empty() {
            settings.ignore_warning_strs = self.ignore_warning_str.clone();
        }
        if self.collect_app_info.is_some() {
            settings.collect_app_info = self.collect_app_info.clone();
        }
        firmbuild_core::config::validate_settings(&settings)?;

        let python = self
            .python
            .clone()
            .or_else(|| {
                which::which("python3")
                    .or_else(|_| which::which("python"))
                    .ok()
                    .map(|p| p.to_string_lossy().to_string())
            });
        let mut backend = IdfPyBackend::new();
        if let Some(python) = python {
            debug!(python = %python, "using python interpreter");
            backend = backend.with_python(python);
        }

        let runner = BuildRunner::new(&backend, RunnerOptions::from_settings(&settings))?;
        let summary = runner.run(apps)?;

        match cli.format {
            OutputFormat::Json => {
                let results: Vec<serde_json::Value> = summary
                    .apps
                    .iter()
                    .map(|app| {
                        serde_json::json!({
                            "app_dir": app.app_dir.display().to_string(),
                            "target": app.target,
                            "config_name": app.config_name,
                            "status": app.build_status,
                            "comment": app.build_comment,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            OutputFormat::Text => {
                if !cli.quiet {
                    print_summary(&summary);
                }
            }
        }

        Ok(summary.exit_code())
    }
}

fn print_summary(summary: &BuildSummary) {
    println!();
    println!("{}", output::header("Build summary"));
    for (status, apps) in summary.by_status() {
        println!("{} ({})", style(&status).underlined(), apps.len());
        for app in apps {
            let mut line = format!(
                "  {} {}",
                output::path_style().apply_to(display_path(&app.app_dir)),
                output::status_style(app.build_status).apply_to(&app.target)
            );
            if !app.config_name.is_empty() {
                line.push_str(&format!(" config={}", app.config_name));
            }
            if let Some(comment) = &app.build_comment {
                line.push_str(&format!(": {}", comment));
            }
            println!("{}", line);
        }
    }

    if summary.has_failures() {
        output::error("Some apps failed to build");
    } else if summary.apps.is_empty() {
        output::warning("No apps were built");
    } else {
        output::success("All apps built");
    }
}
