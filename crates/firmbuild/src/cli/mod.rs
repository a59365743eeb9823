//! CLI definition and command handling

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::{BuildCommand, CompletionsCommand, DumpManifestShaCommand, FindCommand};

/// firmbuild - find and build firmware apps driven by manifest rules
#[derive(Debug, Parser)]
#[command(name = "firmbuild")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    /// Also write debug-level JSON logs to this file
    #[arg(long, global = true, env = "FIRMBUILD_LOG_FILE")]
    pub log_file: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find apps and print them
    Find(FindCommand),

    /// Find apps and build them
    Build(BuildCommand),

    /// Write the SHA of every manifest folder rule to a file
    DumpManifestSha(DumpManifestShaCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub fn execute(self) -> anyhow::Result<i32> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::Find(ref cmd) => cmd.execute(&self),
            Commands::Build(ref cmd) => cmd.execute(&self),
            Commands::DumpManifestSha(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_find_args() {
        let cli = Cli::parse_from([
            "firmbuild",
            "-vv",
            "find",
            "-p",
            "examples",
            "-t",
            "esp32",
            "--recursive",
            "--modified-components",
            "--config-rules",
            "sdkconfig.ci.*=",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Find(cmd) = cli.command else {
            panic!("expected find command");
        };
        assert_eq!(cmd.common.target.as_deref(), Some("esp32"));
        assert!(cmd.common.recursive);
        assert_eq!(cmd.common.modified_components, Some(Vec::new()));
        assert_eq!(cmd.common.config_rules, vec!["sdkconfig.ci.*="]);
    }

    #[test]
    fn test_parse_build_args() {
        let cli = Cli::parse_from([
            "firmbuild",
            "build",
            "-p",
            "apps",
            "--parallel-count",
            "3",
            "--parallel-index",
            "2",
            "--keep-going",
            "--modified-components",
            "esp_wifi;bt",
        ]);
        let Commands::Build(cmd) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(cmd.parallel_count, Some(3));
        assert_eq!(cmd.parallel_index, Some(2));
        assert!(cmd.keep_going);
        assert_eq!(
            cmd.common.modified_components,
            Some(vec!["esp_wifi".to_string(), "bt".to_string()])
        );
    }
}
