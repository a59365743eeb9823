//! Manifest SHA dump command

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use firmbuild_core::{Manifest, ManifestOptions};

use crate::cli::{output, Cli};
use crate::exit_codes;

/// Write `<folder>:<sha>` lines for every manifest folder rule
#[derive(Debug, Args)]
pub struct DumpManifestShaCommand {
    /// Manifest files to read
    #[arg(long, num_args = 1.., required = true)]
    pub manifest_files: Vec<PathBuf>,

    /// Resolve relative manifest folders against this path
    #[arg(long, default_value = ".")]
    pub manifest_rootpath: PathBuf,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Fail on missing or duplicated manifest folders
    #[arg(long)]
    pub check_manifest_rules: bool,
}

impl DumpManifestShaCommand {
    /// Execute the dump-manifest-sha command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        info!(output = %self.output.display(), "executing dump-manifest-sha command");
        let options = ManifestOptions::new(&self.manifest_rootpath).strict(self.check_manifest_rules);
        let manifest = Manifest::from_files(&self.manifest_files, &options)?;
        manifest.dump_sha_values(&self.output)?;

        if !cli.quiet {
            output::success(&format!(
                "Wrote {} folder rules to {}",
                manifest.len(),
                output::path_style().apply_to(self.output.display())
            ));
        }
        Ok(exit_codes::SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_dump_manifest_sha() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("app")).unwrap();
        let manifest_file = temp.path().join(".build-test-rules.yml");
        std::fs::write(&manifest_file, "app:\n  enable:\n    - if: IDF_TARGET == \"esp32\"\n").unwrap();
        let out = temp.path().join("sha.txt");

        let cli = Cli::parse_from([
            "firmbuild".to_string(),
            "--quiet".to_string(),
            "dump-manifest-sha".to_string(),
            "--manifest-files".to_string(),
            manifest_file.display().to_string(),
            "--manifest-rootpath".to_string(),
            temp.path().display().to_string(),
            "--output".to_string(),
            out.display().to_string(),
        ]);
        assert_eq!(cli.execute().unwrap(), exit_codes::SUCCESS);

        let content = std::fs::read_to_string(&out).unwrap();
        let (folder, sha) = content.trim().split_once(':').unwrap();
        assert_eq!(folder, "app");
        assert_eq!(sha.len(), 128);
    }
}
