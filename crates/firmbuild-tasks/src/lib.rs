//! firmbuild tasks: app discovery and build orchestration
//!
//! This crate turns a source tree into a list of apps using the manifest
//! rules from firmbuild-core, and builds a parallel job's share of them
//! through a build backend.

pub mod app;
pub mod backend;
pub mod finder;
pub mod reporter;
pub mod runner;

pub use app::{App, AppInfo, BuildStatus};
pub use backend::{BackendError, BuildBackend, BuildOutcome, BuildRequest, IdfPyBackend};
pub use finder::{find_apps, is_app, ConfigRule, FindOptions};
pub use reporter::{BuildEvent, BuildReporter, BuildReporterRegistry, CollectingReporter, TracingReporter};
pub use runner::{parallel_start_stop, BuildRunner, BuildSummary, RunnerOptions};
