//! Per-invocation rule environment
//!
//! A [`RuleEnv`] is created once per top-level invocation and threaded through
//! every rule evaluation. It owns the known targets, the default build target
//! set, the capability table and the SDK version.

use semver::Version;

use crate::sdk::{CapabilityTable, SdkInfo, Targets};

/// Targets built when a folder rule declares no `enable` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultBuildTargets {
    initial: Vec<String>,
    current: Vec<String>,
}

impl DefaultBuildTargets {
    pub fn new(initial: Vec<String>) -> Self {
        Self {
            current: initial.clone(),
            initial,
        }
    }

    pub fn contains(&self, target: &str) -> bool {
        self.current.iter().any(|t| t == target)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.current
    }

    /// Replace the current set
    pub fn override_with(&mut self, targets: Vec<String>) {
        self.current = targets;
    }

    /// Restore the set the environment was created with
    pub fn reset(&mut self) {
        self.current = self.initial.clone();
    }
}

/// Everything a rule needs to be evaluated
#[derive(Debug, Clone)]
pub struct RuleEnv {
    targets: Targets,
    default_build_targets: DefaultBuildTargets,
    caps: CapabilityTable,
    version: Option<Version>,
}

impl Default for RuleEnv {
    fn default() -> Self {
        Self::new(Targets::default())
    }
}

impl RuleEnv {
    /// Create an environment with the default build targets set to all supported targets
    pub fn new(targets: Targets) -> Self {
        Self {
            default_build_targets: DefaultBuildTargets::new(targets.supported.clone()),
            targets,
            caps: CapabilityTable::new(),
            version: None,
        }
    }

    /// Build from loaded SDK information
    pub fn from_sdk(sdk: SdkInfo) -> Self {
        let mut env = Self::new(sdk.targets);
        env.caps = sdk.caps;
        env.version = sdk.version;
        env
    }

    pub fn with_caps(mut self, caps: CapabilityTable) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Supported and preview targets, in declaration order
    pub fn all_targets(&self) -> Vec<String> {
        self.targets.all()
    }

    pub fn is_known_target(&self, target: &str) -> bool {
        self.targets.supported.iter().chain(self.targets.preview.iter()).any(|t| t == target)
    }

    pub fn default_build_targets(&self) -> &DefaultBuildTargets {
        &self.default_build_targets
    }

    pub fn caps(&self) -> &CapabilityTable {
        &self.caps
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn override_default_build_targets(&mut self, targets: Vec<String>) {
        self.default_build_targets.override_with(targets);
    }

    pub fn reset_default_build_targets(&mut self) {
        self.default_build_targets.reset();
    }

    /// Run `f` with the default build targets temporarily replaced
    pub fn with_override<R>(&mut self, targets: Vec<String>, f: impl FnOnce(&RuleEnv) -> R) -> R {
        let previous = std::mem::replace(&mut self.default_build_targets.current, targets);
        let result = f(self);
        self.default_build_targets.current = previous;
        result
    }
}
