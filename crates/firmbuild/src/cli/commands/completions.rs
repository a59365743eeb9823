//! `completions`: shell completion scripts for firmbuild

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use tracing::debug;

use crate::cli::{output, Cli};
use crate::exit_codes;

/// Print or write a completion script for `find`, `build` and the
/// other firmbuild subcommands
#[derive(Debug, Args)]
pub struct CompletionsCommand {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Write the script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Completion script for `shell`, named after the firmbuild binary
fn render(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    let mut script = Vec::new();
    generate(shell, &mut cmd, bin_name, &mut script);
    script
}

impl CompletionsCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let script = render(self.shell);
        debug!(shell = %self.shell, bytes = script.len(), "rendered completion script");

        match &self.output {
            Some(path) => {
                std::fs::write(path, &script)
                    .with_context(|| format!("Failed to write completions to {}", path.display()))?;
                if !cli.quiet {
                    output::success(&format!(
                        "{} completions for firmbuild written to {}",
                        self.shell,
                        output::path_style().apply_to(path.display())
                    ));
                }
            }
            None => std::io::stdout().write_all(&script)?,
        }

        Ok(exit_codes::SUCCESS)
    }
}
