//! CLI commands

mod build;
mod common;
mod completions;
mod dump_sha;
mod find;

pub use build::BuildCommand;
pub use completions::CompletionsCommand;
pub use dump_sha::DumpManifestShaCommand;
pub use find::FindCommand;
