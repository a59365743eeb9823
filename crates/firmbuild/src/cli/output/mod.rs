//! Output formatting utilities

use console::{style, Style};

use firmbuild_tasks::BuildStatus;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().cyan()
}

/// Style for a build status label
pub fn status_style(status: BuildStatus) -> Style {
    match status {
        BuildStatus::Success => Style::new().green().bold(),
        BuildStatus::Failed => Style::new().red().bold(),
        BuildStatus::Skipped | BuildStatus::Disabled => Style::new().dim(),
        BuildStatus::ShouldBeBuilt | BuildStatus::Unknown => Style::new().yellow(),
    }
}
