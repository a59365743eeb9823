//! Find command

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use console::style;
use tracing::info;

use firmbuild_tasks::{App, AppInfo};

use super::common::{discover, display_path, CommonArgs};
use crate::cli::{output, Cli, OutputFormat};
use crate::exit_codes;

/// Find apps and print them
#[derive(Debug, Args)]
pub struct FindCommand {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Write the apps to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Format of the output file
    #[arg(long, value_enum, default_value = "raw")]
    pub output_format: FileFormat,
}

/// Format of the `--output` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FileFormat {
    /// One JSON object per line
    Raw,
    /// A single JSON array
    Json,
}

/// Serialize apps in the given file format
pub fn render(apps: &[App], format: FileFormat) -> anyhow::Result<String> {
    Ok(match format {
        FileFormat::Raw => {
            let mut out = String::new();
            for app in apps {
                out.push_str(&app.to_json()?);
                out.push('\n');
            }
            out
        }
        FileFormat::Json => {
            let infos: Vec<AppInfo> = apps.iter().map(AppInfo::from).collect();
            serde_json::to_string_pretty(&infos)?
        }
    })
}

impl FindCommand {
    /// Execute the find command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        info!("executing find command");
        let (_settings, apps) = discover(&self.common)?;

        if let Some(path) = &self.output {
            let mut file = std::fs::File::create(path)?;
            file.write_all(render(&apps, self.output_format)?.as_bytes())?;
            if !cli.quiet {
                output::success(&format!(
                    "Found {} apps, written to {}",
                    apps.len(),
                    output::path_style().apply_to(path.display())
                ));
            }
            return Ok(exit_codes::SUCCESS);
        }

        match cli.format {
            OutputFormat::Json => print!("{}", render(&apps, FileFormat::Json)?),
            OutputFormat::Text => {
                for app in &apps {
                    let mut line = format!(
                        "{} {} {}",
                        output::path_style().apply_to(display_path(&app.app_dir)),
                        style(&app.target).bold(),
                        output::status_style(app.build_status).apply_to(app.build_status)
                    );
                    if !app.config_name.is_empty() {
                        line.push_str(&format!(" config={}", app.config_name));
                    }
                    if let Some(comment) = &app.build_comment {
                        line.push_str(&format!(" ({})", style(comment).dim()));
                    }
                    println!("{}", line);
                }
                if !cli.quiet {
                    output::info(&format!("Found {} apps", apps.len()));
                }
            }
        }
        Ok(exit_codes::SUCCESS)
    }
}
