//! Per-folder build and test policy

use std::path::{Path, PathBuf};

use serde_json::json;
use serde_yaml::{Mapping, Value as YamlValue};
use sha2::{Digest, Sha512};
use tracing::debug;

use crate::env::RuleEnv;
use crate::error::{EvalError, ManifestError};
use crate::expr::EvalContext;

use super::clause::{DependencySpec, IfClause};

const RULE_KEYS: &[&str] = &[
    "enable",
    "disable",
    "disable_test",
    "depends_components",
    "depends_filepatterns",
];

/// The build/test policy attached to one folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRule {
    folder: PathBuf,
    enable: Vec<IfClause>,
    disable: Vec<IfClause>,
    disable_test: Vec<IfClause>,
    depends_components: DependencySpec,
    depends_filepatterns: DependencySpec,
    by_manifest_file: Option<PathBuf>,
    sha: String,
}

impl FolderRule {
    pub fn new(
        folder: impl Into<PathBuf>,
        enable: Vec<IfClause>,
        disable: Vec<IfClause>,
        disable_test: Vec<IfClause>,
        depends_components: DependencySpec,
        depends_filepatterns: DependencySpec,
    ) -> Self {
        let mut rule = Self {
            folder: folder.into(),
            enable,
            disable,
            disable_test,
            depends_components,
            depends_filepatterns,
            by_manifest_file: None,
            sha: String::new(),
        };
        rule.sha = rule.compute_sha();
        rule
    }

    /// Zero-policy rule for a folder no manifest governs
    pub fn default_for(folder: impl Into<PathBuf>) -> Self {
        Self::new(
            folder,
            Vec::new(),
            Vec::new(),
            Vec::new(),
            DependencySpec::default(),
            DependencySpec::default(),
        )
    }

    pub fn with_manifest_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.by_manifest_file = Some(file.into());
        self
    }

    /// Build from one folder mapping of a resolved manifest document
    pub fn from_yaml(
        folder: impl Into<PathBuf>,
        rule: Option<&Mapping>,
        file: &Path,
    ) -> Result<Self, ManifestError> {
        let folder = folder.into();
        let empty = Mapping::new();
        let rule = rule.unwrap_or(&empty);

        for key in rule.keys() {
            match key.as_str() {
                Some(k) if RULE_KEYS.contains(&k) => {}
                _ => {
                    return Err(ManifestError::invalid(
                        file,
                        format!(
                            "unknown key {:?} in rule of folder \"{}\"",
                            key,
                            folder.display()
                        ),
                    ))
                }
            }
        }

        let clauses = |key: &str| -> Result<Vec<IfClause>, ManifestError> {
            sequence(rule, key, file)?
                .iter()
                .map(|entry| clause_from_yaml(key, entry, file))
                .collect()
        };
        let dependencies = |key: &str| -> Result<DependencySpec, ManifestError> {
            DependencySpec::from_yaml(key, sequence(rule, key, file)?)
                .map_err(|message| ManifestError::invalid(file, message))
        };

        Ok(Self::new(
            folder,
            clauses("enable")?,
            clauses("disable")?,
            clauses("disable_test")?,
            dependencies("depends_components")?,
            dependencies("depends_filepatterns")?,
        )
        .with_manifest_file(file))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn by_manifest_file(&self) -> Option<&Path> {
        self.by_manifest_file.as_deref()
    }

    /// Hex SHA-512 over the rule content, excluding folder and provenance
    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn enable(&self) -> &[IfClause] {
        &self.enable
    }

    pub fn disable(&self) -> &[IfClause] {
        &self.disable
    }

    pub fn disable_test(&self) -> &[IfClause] {
        &self.disable_test
    }

    /// True when the folder has no rule of its own
    pub fn is_default(&self) -> bool {
        self.by_manifest_file.is_none()
            && self.enable.is_empty()
            && self.disable.is_empty()
            && self.disable_test.is_empty()
            && !self.depends_components.is_declared()
            && !self.depends_filepatterns.is_declared()
    }

    fn compute_sha(&self) -> String {
        let clauses = |list: &[IfClause]| list.iter().map(IfClause::canonical).collect::<Vec<_>>();
        let canonical = json!({
            "enable": clauses(&self.enable),
            "disable": clauses(&self.disable),
            "disable_test": clauses(&self.disable_test),
            "depends_components": self.depends_components.canonical(),
            "depends_filepatterns": self.depends_filepatterns.canonical(),
        });
        format!("{:x}", Sha512::digest(canonical.to_string().as_bytes()))
    }

    pub fn depends_components(&self, ctx: &EvalContext<'_>) -> Result<Vec<String>, EvalError> {
        self.depends_components.resolve(ctx)
    }

    pub fn depends_filepatterns(&self, ctx: &EvalContext<'_>) -> Result<Vec<String>, EvalError> {
        self.depends_filepatterns.resolve(ctx)
    }

    fn first_match<'r>(
        clauses: impl IntoIterator<Item = &'r IfClause>,
        ctx: &EvalContext<'_>,
    ) -> Result<Option<&'r IfClause>, EvalError> {
        for clause in clauses {
            if clause.matches(ctx)? {
                return Ok(Some(clause));
            }
        }
        Ok(None)
    }

    fn enable_build(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        let enabled = if self.enable.is_empty() {
            ctx.env.default_build_targets().contains(ctx.target)
        } else {
            Self::first_match(&self.enable, ctx)?.is_some()
        };
        Ok(enabled && Self::first_match(&self.disable, ctx)?.is_none())
    }

    /// Sorted targets this folder builds for.
    ///
    /// A target pinned by `CONFIG_IDF_TARGET` narrows the result to that
    /// target, or to nothing when the rule does not enable it.
    pub fn enable_build_targets(
        &self,
        env: &RuleEnv,
        pinned_target: Option<&str>,
        config_name: &str,
    ) -> Result<Vec<String>, EvalError> {
        let mut targets = Vec::new();
        for target in env.all_targets() {
            if self.enable_build(&EvalContext::new(env, &target, config_name))? {
                targets.push(target);
            }
        }

        if let Some(pinned) = pinned_target {
            if !targets.iter().any(|t| t == pinned) {
                debug!(
                    folder = %self.folder.display(),
                    target = pinned,
                    "sdkconfig defined CONFIG_IDF_TARGET is not enabled for this folder, skipping"
                );
                return Ok(Vec::new());
            }
            debug!(
                folder = %self.folder.display(),
                target = pinned,
                "sdkconfig defined CONFIG_IDF_TARGET overrides the supported targets"
            );
            return Ok(vec![pinned.to_string()]);
        }

        targets.sort();
        Ok(targets)
    }

    /// Sorted targets this folder tests on, always a subset of the build targets
    pub fn enable_test_targets(
        &self,
        env: &RuleEnv,
        pinned_target: Option<&str>,
        config_name: &str,
    ) -> Result<Vec<String>, EvalError> {
        let build_targets = self.enable_build_targets(env, pinned_target, config_name)?;
        let mut targets = Vec::new();
        for target in build_targets {
            let ctx = EvalContext::new(env, &target, config_name);
            if Self::first_match(self.disable.iter().chain(&self.disable_test), &ctx)?.is_none() {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    /// Why the folder is not built for `ctx.target`, if it is not
    pub fn build_disable_reason(&self, ctx: &EvalContext<'_>) -> Result<Option<String>, EvalError> {
        if let Some(clause) = Self::first_match(&self.disable, ctx)? {
            return Ok(Some(format!("Disabled by manifest rule: {}", clause)));
        }

        if self.enable.is_empty() {
            let defaults = ctx.env.default_build_targets();
            if !defaults.contains(ctx.target) {
                return Ok(Some(format!(
                    "Target {} not in default build targets {}",
                    ctx.target,
                    defaults.as_slice().join(",")
                )));
            }
        } else if Self::first_match(&self.enable, ctx)?.is_none() {
            let listed: Vec<String> = self.enable.iter().map(|c| format!("- {}", c.stmt())).collect();
            return Ok(Some(format!(
                "Not enabled by manifest rules:\n{}",
                listed.join("\n")
            )));
        }

        Ok(None)
    }

    /// Why the folder is not tested on `ctx.target`, if it is not
    pub fn test_disable_reason(&self, ctx: &EvalContext<'_>) -> Result<Option<String>, EvalError> {
        if let Some(reason) = self.build_disable_reason(ctx)? {
            return Ok(Some(reason));
        }
        Ok(Self::first_match(&self.disable_test, ctx)?
            .map(|clause| format!("Disabled by manifest rule: {}", clause)))
    }
}

fn sequence<'m>(rule: &'m Mapping, key: &str, file: &Path) -> Result<&'m [YamlValue], ManifestError> {
    match rule.get(key) {
        None | Some(YamlValue::Null) => Ok(&[][..]),
        Some(YamlValue::Sequence(items)) => Ok(items.as_slice()),
        Some(other) => Err(ManifestError::invalid(
            file,
            format!("\"{}\" must be a list, got {:?}", key, other),
        )),
    }
}

fn clause_from_yaml(key: &str, entry: &YamlValue, file: &Path) -> Result<IfClause, ManifestError> {
    let Some(mapping) = entry.as_mapping() else {
        return Err(ManifestError::invalid(
            file,
            format!("\"{}\" entries must be mappings with an \"if\" key, got {:?}", key, entry),
        ));
    };

    let mut stmt = None;
    let mut temporary = false;
    let mut reason = None;
    for (k, v) in mapping {
        match (k.as_str(), v) {
            (Some("if"), YamlValue::String(s)) => stmt = Some(s.clone()),
            (Some("temporary"), YamlValue::Bool(b)) => temporary = *b,
            (Some("reason"), YamlValue::String(s)) => reason = Some(s.clone()),
            (Some("reason"), YamlValue::Null) => {}
            _ => {
                return Err(ManifestError::invalid(
                    file,
                    format!("invalid entry {:?}: {:?} in \"{}\"", k, v, key),
                ))
            }
        }
    }

    let Some(stmt) = stmt else {
        return Err(ManifestError::invalid(
            file,
            format!("\"{}\" entry is missing the \"if\" key", key),
        ));
    };

    IfClause::new(stmt, temporary, reason)
        .map_err(|e| ManifestError::invalid(file, e.to_string()))
}
