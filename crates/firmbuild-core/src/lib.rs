//! firmbuild core: manifest rule engine
//!
//! This crate decides, for every app folder, target and config name, whether
//! the combination is built and tested:
//! - the `if` expression language and chip attribute lookup
//! - folder rules, switch clauses and manifest aggregation
//! - manifest SHA snapshots for change detection
//! - the dependency-driven build gate
//! - SDK introspection and settings

pub mod config;
pub mod env;
pub mod error;
pub mod expr;
pub mod gate;
pub mod manifest;
pub mod paths;
pub mod sdk;

pub use config::Settings;
pub use env::{DefaultBuildTargets, RuleEnv};
pub use error::{FirmbuildError, Result};
pub use expr::{parse, EvalContext, Expr, Value};
pub use gate::{check_should_build, BuildDecision, DependencyDrivenSettings};
pub use manifest::{DependencySpec, FolderRule, IfClause, Manifest, ManifestOptions, SwitchClause};
pub use sdk::{CapabilityTable, SdkInfo, Targets};
