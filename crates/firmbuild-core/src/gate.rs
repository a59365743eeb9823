//! Dependency-driven build gate
//!
//! Decides whether an app needs to be built given what changed in the
//! current revision.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EvalError, FirmbuildError, Result};
use crate::expr::EvalContext;
use crate::manifest::FolderRule;
use crate::paths;

/// Outcome of the gate for one app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildDecision {
    /// Build it, with the reason
    ShouldBuild(String),
    /// Nothing the app depends on changed
    Skip(String),
    /// Dependencies unknown, let the native build tool decide
    Defer,
}

impl BuildDecision {
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::ShouldBuild(r) | Self::Skip(r) => Some(r),
            Self::Defer => None,
        }
    }
}

/// What changed, and when dependency-driven builds are switched off
#[derive(Debug, Clone, Default)]
pub struct DependencyDrivenSettings {
    modified_components: Option<BTreeSet<String>>,
    modified_files: Option<Vec<PathBuf>>,
    deactivate_by_components: Option<Vec<String>>,
    deactivate_by_filepatterns: Option<Vec<String>>,
    modified_manifest_folders: Option<BTreeSet<PathBuf>>,
    root: PathBuf,
    enabled: bool,
}

impl DependencyDrivenSettings {
    /// Validate and build the settings.
    ///
    /// A deactivation list requires the input it is matched against.
    pub fn new(
        root: impl Into<PathBuf>,
        modified_components: Option<Vec<String>>,
        modified_files: Option<Vec<PathBuf>>,
        deactivate_by_components: Option<Vec<String>>,
        deactivate_by_filepatterns: Option<Vec<String>>,
    ) -> Result<Self> {
        if deactivate_by_components.is_some() && modified_components.is_none() {
            return Err(FirmbuildError::invalid_command(
                "Must specify --deactivate-dependency-driven-build-by-components together with --modified-components",
            ));
        }
        if deactivate_by_filepatterns.is_some() && modified_files.is_none() {
            return Err(FirmbuildError::invalid_command(
                "Must specify --deactivate-dependency-driven-build-by-filepatterns together with --modified-files",
            ));
        }

        let root = root.into();
        let mut settings = Self {
            modified_components: modified_components.map(|c| c.into_iter().collect()),
            modified_files: modified_files
                .map(|files| files.iter().map(|f| paths::absolutize(f, &root)).collect()),
            deactivate_by_components,
            deactivate_by_filepatterns,
            modified_manifest_folders: None,
            root,
            enabled: false,
        };
        settings.enabled = settings.resolve_enabled();
        Ok(settings)
    }

    /// Folders whose manifest rules changed since the recorded snapshot
    pub fn with_modified_manifest_folders(mut self, folders: BTreeSet<PathBuf>) -> Self {
        self.modified_manifest_folders = Some(folders);
        self
    }

    pub fn modified_components(&self) -> Option<&BTreeSet<String>> {
        self.modified_components.as_ref()
    }

    pub fn modified_files(&self) -> Option<&[PathBuf]> {
        self.modified_files.as_deref()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether dependency-driven builds apply to this run at all
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn resolve_enabled(&self) -> bool {
        if self.modified_components.is_none() && self.modified_files.is_none() {
            return false;
        }

        if let (Some(deactivate), Some(modified)) = (&self.deactivate_by_components, &self.modified_components) {
            if deactivate.iter().any(|c| modified.contains(c)) {
                info!(
                    modified = %modified.iter().cloned().collect::<Vec<_>>().join(", "),
                    deactivate = %deactivate.join(", "),
                    "Build all apps since modified components match deactivation components"
                );
                return false;
            }
        }

        if let (Some(patterns), Some(files)) = (&self.deactivate_by_filepatterns, &self.modified_files) {
            if paths::files_match_patterns(files, patterns, &self.root) {
                info!(
                    patterns = %patterns.join(", "),
                    "Build all apps since modified files match deactivation file patterns"
                );
                return false;
            }
        }

        true
    }
}

/// Classify one (app, target, config) as build, skip or defer
pub fn check_should_build(
    rule: &FolderRule,
    app_dir: &Path,
    ctx: &EvalContext<'_>,
    settings: &DependencyDrivenSettings,
) -> std::result::Result<BuildDecision, EvalError> {
    if !settings.enabled {
        return Ok(BuildDecision::ShouldBuild(
            "dependency-driven build feature is disabled".to_string(),
        ));
    }

    let app_dir = paths::absolutize(app_dir, &settings.root);

    if let Some(files) = &settings.modified_files {
        if files.iter().any(|f| f.starts_with(&app_dir)) {
            return Ok(BuildDecision::ShouldBuild(
                "current build modifies the app itself".to_string(),
            ));
        }
    }

    if let Some(folders) = &settings.modified_manifest_folders {
        if folders.contains(rule.folder()) {
            return Ok(BuildDecision::ShouldBuild(
                "current build modifies the related manifest rules".to_string(),
            ));
        }
    }

    let components = rule.depends_components(ctx)?;
    let patterns = rule.depends_filepatterns(ctx)?;

    if matches!(&settings.modified_components, Some(modified) if modified.is_empty()) && patterns.is_empty() {
        return Ok(BuildDecision::Skip(
            "current build does not modify any components".to_string(),
        ));
    }

    let components_checkable = !components.is_empty() && settings.modified_components.is_some();
    let patterns_checkable = !patterns.is_empty() && settings.modified_files.is_some();
    if !components_checkable && !patterns_checkable {
        debug!(app_dir = %app_dir.display(), "no checkable dependencies declared, deferring");
        return Ok(BuildDecision::Defer);
    }

    if let Some(modified) = &settings.modified_components {
        let hit: Vec<&str> = components
            .iter()
            .filter(|c| modified.contains(*c))
            .map(String::as_str)
            .collect();
        if !hit.is_empty() {
            return Ok(BuildDecision::ShouldBuild(format!(
                "Requires components: {}",
                hit.join(", ")
            )));
        }
    }

    if let Some(files) = &settings.modified_files {
        if paths::files_match_patterns(files, &patterns, &settings.root) {
            return Ok(BuildDecision::ShouldBuild(format!(
                "Requires file patterns: {}",
                patterns.join(", ")
            )));
        }
    }

    Ok(BuildDecision::Skip(
        "current build does not modify any components or files required by this app".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RuleEnv;
    use crate::manifest::{DependencySpec, IfClause};

    fn rule(components: &[&str], patterns: &[&str]) -> FolderRule {
        FolderRule::new(
            "/repo/apps/foo",
            Vec::new(),
            Vec::new(),
            Vec::new(),
            DependencySpec::Flat(components.iter().map(|s| s.to_string()).collect()),
            DependencySpec::Flat(patterns.iter().map(|s| s.to_string()).collect()),
        )
    }

    fn settings(components: Option<&[&str]>, files: Option<&[&str]>) -> DependencyDrivenSettings {
        DependencyDrivenSettings::new(
            "/repo",
            components.map(|c| c.iter().map(|s| s.to_string()).collect()),
            files.map(|f| f.iter().map(PathBuf::from).collect()),
            None,
            None,
        )
        .unwrap()
    }

    fn decide(rule: &FolderRule, settings: &DependencyDrivenSettings) -> BuildDecision {
        let env = RuleEnv::default();
        let ctx = EvalContext::new(&env, "esp32", "");
        check_should_build(rule, Path::new("apps/foo"), &ctx, settings).unwrap()
    }

    #[test]
    fn test_four_way_component_branching() {
        let rule = rule(&["soc"], &[]);
        assert!(matches!(
            decide(&rule, &settings(Some(&["soc"]), Some(&[]))),
            BuildDecision::ShouldBuild(_)
        ));
        assert!(matches!(
            decide(&rule, &settings(Some(&["fake"]), Some(&[]))),
            BuildDecision::Skip(_)
        ));
        assert!(matches!(
            decide(&rule, &settings(Some(&[]), Some(&[]))),
            BuildDecision::Skip(_)
        ));
        assert_eq!(decide(&rule, &settings(None, Some(&[]))), BuildDecision::Defer);
    }

    #[test]
    fn test_not_requested_builds_everything() {
        let rule = rule(&["soc"], &[]);
        let decision = decide(&rule, &settings(None, None));
        assert_eq!(
            decision,
            BuildDecision::ShouldBuild("dependency-driven build feature is disabled".to_string())
        );
    }

    #[test]
    fn test_app_itself_modified() {
        let rule = rule(&["soc"], &[]);
        let decision = decide(&rule, &settings(Some(&[]), Some(&["apps/foo/main/main.c"])));
        assert_eq!(
            decision,
            BuildDecision::ShouldBuild("current build modifies the app itself".to_string())
        );

        // sibling with a shared string prefix is not the app
        let decision = decide(&rule, &settings(Some(&[]), Some(&["apps/foobar/main.c"])));
        assert!(matches!(decision, BuildDecision::Skip(_)));
    }

    #[test]
    fn test_manifest_rule_modified() {
        let rule = rule(&["soc"], &[]);
        let settings = settings(Some(&[]), Some(&[]))
            .with_modified_manifest_folders(BTreeSet::from([PathBuf::from("/repo/apps/foo")]));
        assert_eq!(
            decide(&rule, &settings),
            BuildDecision::ShouldBuild("current build modifies the related manifest rules".to_string())
        );
    }

    #[test]
    fn test_no_declarations_defers() {
        let rule = rule(&[], &[]);
        assert_eq!(decide(&rule, &settings(Some(&["soc"]), None)), BuildDecision::Defer);
    }

    #[test]
    fn test_empty_components_with_patterns() {
        let rule = rule(&[], &["components/soc/**"]);
        assert!(matches!(
            decide(&rule, &settings(Some(&[]), Some(&["components/soc/esp32/x.c"]))),
            BuildDecision::ShouldBuild(_)
        ));
        assert!(matches!(
            decide(&rule, &settings(Some(&[]), Some(&["docs/index.md"]))),
            BuildDecision::Skip(_)
        ));
    }

    #[test]
    fn test_switch_dependencies_follow_target() {
        let switch = DependencySpec::Switch(crate::manifest::SwitchClause::new(
            vec![(
                IfClause::parse("IDF_TARGET == \"esp32\"").unwrap(),
                vec!["esp_wifi".to_string()],
            )],
            vec!["bt".to_string()],
        ));
        let rule = FolderRule::new(
            "/repo/apps/foo",
            Vec::new(),
            Vec::new(),
            Vec::new(),
            switch,
            DependencySpec::default(),
        );
        let settings = settings(Some(&["esp_wifi"]), None);
        let env = RuleEnv::default();

        let esp32 = EvalContext::new(&env, "esp32", "");
        let esp32c3 = EvalContext::new(&env, "esp32c3", "");
        assert!(matches!(
            check_should_build(&rule, Path::new("apps/foo"), &esp32, &settings).unwrap(),
            BuildDecision::ShouldBuild(_)
        ));
        assert!(matches!(
            check_should_build(&rule, Path::new("apps/foo"), &esp32c3, &settings).unwrap(),
            BuildDecision::Skip(_)
        ));
    }

    #[test]
    fn test_deactivation_switch() {
        let by_component = DependencyDrivenSettings::new(
            "/repo",
            Some(vec!["freertos".to_string()]),
            None,
            Some(vec!["freertos".to_string()]),
            None,
        )
        .unwrap();
        assert!(!by_component.enabled());

        let by_pattern = DependencyDrivenSettings::new(
            "/repo",
            None,
            Some(vec![PathBuf::from("tools/ci/build.yml")]),
            None,
            Some(vec!["tools/ci/**".to_string()]),
        )
        .unwrap();
        assert!(!by_pattern.enabled());

        let unmatched = DependencyDrivenSettings::new(
            "/repo",
            Some(vec!["soc".to_string()]),
            None,
            Some(vec!["freertos".to_string()]),
            None,
        )
        .unwrap();
        assert!(unmatched.enabled());
    }

    #[test]
    fn test_deactivated_settings_reused_across_targets() {
        let settings = DependencyDrivenSettings::new(
            "/repo",
            None,
            Some(vec![PathBuf::from("tools/ci/build.yml")]),
            None,
            Some(vec!["tools/ci/**".to_string()]),
        )
        .unwrap();
        let rule = rule(&["soc"], &[]);
        let env = RuleEnv::default();
        for target in ["esp32", "esp32s2", "esp32c3"] {
            for config in ["", "release"] {
                let ctx = EvalContext::new(&env, target, config);
                assert_eq!(
                    check_should_build(&rule, Path::new("apps/foo"), &ctx, &settings).unwrap(),
                    BuildDecision::ShouldBuild("dependency-driven build feature is disabled".to_string())
                );
            }
        }
        assert!(!settings.enabled());
        assert!(!DependencyDrivenSettings::default().enabled());
    }

    #[test]
    fn test_deactivation_requires_input() {
        let err = DependencyDrivenSettings::new("/repo", None, None, Some(vec!["soc".to_string()]), None)
            .unwrap_err();
        assert!(matches!(err, FirmbuildError::InvalidCommand(_)));

        let err = DependencyDrivenSettings::new("/repo", None, None, None, Some(vec!["*".to_string()]))
            .unwrap_err();
        assert!(matches!(err, FirmbuildError::InvalidCommand(_)));
    }
}
