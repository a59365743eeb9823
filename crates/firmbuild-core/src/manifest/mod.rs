//! Manifest files: folder rules aggregated from YAML declarations

mod clause;
mod rule;
pub mod yaml;

pub use clause::{DependencySpec, IfClause, SwitchClause};
pub use rule::FolderRule;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::ManifestError;
use crate::paths;

/// How manifest files are read
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Relative folders in manifest files are resolved against this path
    pub root_path: PathBuf,
    /// Fail on missing or duplicated folders instead of warning
    pub strict: bool,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("."),
            strict: false,
        }
    }
}

impl ManifestOptions {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Immutable collection of folder rules, keyed and sorted by absolute folder
#[derive(Debug, Clone)]
pub struct Manifest {
    rules: BTreeMap<PathBuf, FolderRule>,
    root_path: PathBuf,
}

impl Manifest {
    /// Build from rules directly. Later duplicates are dropped.
    pub fn new(rules: impl IntoIterator<Item = FolderRule>, root_path: impl Into<PathBuf>) -> Self {
        let mut map = BTreeMap::new();
        for rule in rules {
            map.entry(rule.folder().to_path_buf()).or_insert(rule);
        }
        Self {
            rules: map,
            root_path: root_path.into(),
        }
    }

    /// A manifest without any rule
    pub fn empty(root_path: impl Into<PathBuf>) -> Self {
        Self::new(Vec::new(), root_path)
    }

    /// Load and merge rules from several manifest files
    pub fn from_files<P: AsRef<Path>>(files: &[P], options: &ManifestOptions) -> Result<Self, ManifestError> {
        let root = paths::absolute(&options.root_path)?;
        let mut rules: BTreeMap<PathBuf, FolderRule> = BTreeMap::new();

        for file in files {
            let file = file.as_ref();
            for rule in Self::rules_from_file(file, &root, options.strict)? {
                if let Some(existing) = rules.get(rule.folder()) {
                    let first = existing
                        .by_manifest_file()
                        .map(Path::to_path_buf)
                        .unwrap_or_default();
                    if options.strict {
                        return Err(ManifestError::DuplicateFolder {
                            folder: rule.folder().to_path_buf(),
                            first,
                            second: file.to_path_buf(),
                        });
                    }
                    warn!(
                        folder = %rule.folder().display(),
                        first = %first.display(),
                        second = %file.display(),
                        "folder is already defined, ignoring the later definition"
                    );
                    continue;
                }
                rules.insert(rule.folder().to_path_buf(), rule);
            }
        }

        info!(files = files.len(), rules = rules.len(), "loaded manifest rules");
        Ok(Self {
            rules,
            root_path: root,
        })
    }

    fn rules_from_file(file: &Path, root: &Path, strict: bool) -> Result<Vec<FolderRule>, ManifestError> {
        debug!(file = %file.display(), "reading manifest file");
        let content = std::fs::read_to_string(file)?;
        let document = yaml::load_document(file, &content)?;

        let mut rules: Vec<FolderRule> = Vec::new();
        for (key, value) in &document {
            let Some(name) = key.as_str() else {
                continue;
            };
            let folder = paths::absolutize(Path::new(name), root);

            if !folder.exists() {
                if strict {
                    return Err(ManifestError::MissingFolder {
                        folder,
                        file: file.to_path_buf(),
                    });
                }
                warn!(
                    "Folder \"{}\" does not exist. Please check your manifest file {}",
                    folder.display(),
                    file.display()
                );
            }

            if let Some(existing) = rules.iter().find(|r| r.folder() == folder) {
                if strict {
                    return Err(ManifestError::DuplicateFolder {
                        folder,
                        first: existing.by_manifest_file().map(Path::to_path_buf).unwrap_or_default(),
                        second: file.to_path_buf(),
                    });
                }
                warn!(folder = %folder.display(), file = %file.display(), "folder is defined twice, ignoring the later definition");
                continue;
            }

            rules.push(FolderRule::from_yaml(folder, value.as_mapping(), file)?);
        }
        Ok(rules)
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn rules(&self) -> impl Iterator<Item = &FolderRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule governing `path`: the nearest ancestor folder with a rule,
    /// up to and including the manifest root. Falls back to a default rule.
    pub fn most_suitable_rule(&self, path: &Path) -> FolderRule {
        let path = paths::absolutize(path, &self.root_path);
        for ancestor in path.ancestors() {
            if let Some(rule) = self.rules.get(ancestor) {
                return rule.clone();
            }
            if ancestor == self.root_path {
                break;
            }
        }
        FolderRule::default_for(path)
    }

    /// Write `<relative_folder>:<sha>` lines for every rule
    pub fn dump_sha_values(&self, output: &Path) -> Result<(), ManifestError> {
        let mut content = String::new();
        for (folder, rule) in &self.rules {
            content.push_str(&format!(
                "{}:{}\n",
                paths::relative_to(folder, &self.root_path).display(),
                rule.sha()
            ));
        }
        std::fs::write(output, content)?;
        info!(path = %output.display(), rules = self.rules.len(), "dumped manifest sha values");
        Ok(())
    }

    /// Folders whose rules were added, removed or modified since the
    /// snapshot at `recorded`
    pub fn diff_sha_with_filepath(&self, recorded: &Path, use_abspath: bool) -> Result<BTreeSet<PathBuf>, ManifestError> {
        let content = std::fs::read_to_string(recorded)?;
        let mut recorded_shas: BTreeMap<PathBuf, String> = BTreeMap::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((folder, sha)) = line.rsplit_once(':').filter(|(f, s)| !f.is_empty() && !s.is_empty()) else {
                return Err(ManifestError::MalformedShaLine {
                    file: recorded.to_path_buf(),
                    line_no: index + 1,
                    line: line.to_string(),
                });
            };
            recorded_shas.insert(paths::absolutize(Path::new(folder), &self.root_path), sha.to_string());
        }

        let mut diff = BTreeSet::new();
        for (folder, sha) in &recorded_shas {
            match self.rules.get(folder) {
                Some(rule) if rule.sha() == sha => {}
                _ => {
                    diff.insert(folder.clone());
                }
            }
        }
        for folder in self.rules.keys() {
            if !recorded_shas.contains_key(folder) {
                diff.insert(folder.clone());
            }
        }

        debug!(changed = diff.len(), "compared manifest sha values");

        Ok(if use_abspath {
            diff
        } else {
            diff.into_iter()
                .map(|folder| paths::relative_to(&folder, &self.root_path))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RuleEnv;
    use tempfile::TempDir;

    fn setup(manifest: &str, folders: &[&str]) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        for folder in folders {
            std::fs::create_dir_all(temp.path().join(folder)).unwrap();
        }
        let file = temp.path().join(".build-test-rules.yml");
        std::fs::write(&file, manifest).unwrap();
        (temp, file)
    }

    fn options(temp: &TempDir) -> ManifestOptions {
        ManifestOptions::new(temp.path())
    }

    #[test]
    fn test_from_files_relative_folders() {
        let (temp, file) = setup(
            "foo:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\n.anchor: {}\n",
            &["foo"],
        );
        let manifest = Manifest::from_files(&[&file], &options(&temp)).unwrap();
        assert_eq!(manifest.len(), 1);
        let rule = manifest.rules().next().unwrap();
        assert_eq!(rule.folder(), temp.path().join("foo"));
        assert_eq!(rule.by_manifest_file(), Some(file.as_path()));
    }

    #[test]
    fn test_missing_folder_warn_or_fail() {
        let (temp, file) = setup("missing:\n  enable:\n    - if: IDF_TARGET == \"esp32\"\n", &[]);
        assert_eq!(Manifest::from_files(&[&file], &options(&temp)).unwrap().len(), 1);
        assert!(matches!(
            Manifest::from_files(&[&file], &options(&temp).strict(true)),
            Err(ManifestError::MissingFolder { .. })
        ));
    }

    #[test]
    fn test_duplicate_folders_across_files() {
        let (temp, first) = setup("foo:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\n", &["foo"]);
        let second = temp.path().join("second.yml");
        std::fs::write(&second, "foo:\n  disable:\n    - if: IDF_TARGET == \"esp32c3\"\n").unwrap();

        let manifest = Manifest::from_files(&[&first, &second], &options(&temp)).unwrap();
        let rule = manifest.most_suitable_rule(&temp.path().join("foo"));
        assert_eq!(rule.disable()[0].stmt(), "IDF_TARGET == \"esp32\"");
        assert_eq!(rule.by_manifest_file(), Some(first.as_path()));

        match Manifest::from_files(&[&first, &second], &options(&temp).strict(true)) {
            Err(ManifestError::DuplicateFolder { first: f, second: s, .. }) => {
                assert_eq!(f, first);
                assert_eq!(s, second);
            }
            other => panic!("expected duplicate folder error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_folders_within_file() {
        let (temp, file) = setup(
            "foo:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\nfoo/:\n  disable:\n    - if: IDF_TARGET == \"esp32c3\"\n",
            &["foo"],
        );
        let manifest = Manifest::from_files(&[&file], &options(&temp)).unwrap();
        assert_eq!(manifest.len(), 1);
        let rule = manifest.most_suitable_rule(&temp.path().join("foo"));
        assert_eq!(rule.disable()[0].stmt(), "IDF_TARGET == \"esp32\"");

        match Manifest::from_files(&[&file], &options(&temp).strict(true)) {
            Err(ManifestError::DuplicateFolder { folder, first, second }) => {
                assert_eq!(folder, temp.path().join("foo"));
                assert_eq!(first, file);
                assert_eq!(second, file);
            }
            other => panic!("expected duplicate folder error, got {:?}", other),
        }
    }

    #[test]
    fn test_broken_file_aborts() {
        let (temp, file) = setup(
            "foo:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\nbar:\n  enable:\n    - if: A == 1 and B == 2 and C == 3\n",
            &["foo", "bar"],
        );
        assert!(matches!(
            Manifest::from_files(&[&file], &options(&temp)),
            Err(ManifestError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_most_suitable_rule_ancestors() {
        let (temp, file) = setup(
            "examples/foo:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\n",
            &["examples/foo/a/b", "examples/foobar"],
        );
        let manifest = Manifest::from_files(&[&file], &options(&temp)).unwrap();

        let nested = manifest.most_suitable_rule(&temp.path().join("examples/foo/a/b"));
        assert_eq!(nested.folder(), temp.path().join("examples/foo"));
        assert_eq!(nested.disable().len(), 1);

        let prefix_only = manifest.most_suitable_rule(&temp.path().join("examples/foobar"));
        assert_eq!(prefix_only.folder(), temp.path().join("examples/foobar"));
        assert!(prefix_only.is_default());

        let relative = manifest.most_suitable_rule(Path::new("examples/foo/a"));
        assert_eq!(relative.folder(), temp.path().join("examples/foo"));
    }

    #[test]
    fn test_most_suitable_rule_stops_at_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project");
        let parent_rule = FolderRule::new(
            temp.path(),
            Vec::new(),
            vec![IfClause::parse("IDF_TARGET == \"esp32\"").unwrap()],
            Vec::new(),
            DependencySpec::default(),
            DependencySpec::default(),
        );
        let manifest = Manifest::new(vec![parent_rule], &root);
        assert!(manifest.most_suitable_rule(&root.join("app")).is_default());
    }

    #[test]
    fn test_default_rule_builds_default_targets() {
        let manifest = Manifest::empty("/repo");
        let env = RuleEnv::default();
        let rule = manifest.most_suitable_rule(Path::new("/repo/app"));
        let mut expected = env.default_build_targets().as_slice().to_vec();
        expected.sort();
        assert_eq!(rule.enable_build_targets(&env, None, "").unwrap(), expected);
    }

    fn sha_manifest() -> (TempDir, Manifest) {
        let (temp, file) = setup(
            "a:\n  disable:\n    - if: IDF_TARGET == \"esp32\"\nb:\n  depends_components: [soc]\n",
            &["a", "b"],
        );
        let manifest = Manifest::from_files(&[&file], &options(&temp)).unwrap();
        (temp, manifest)
    }

    fn sha_of(manifest: &Manifest, folder: &str) -> String {
        manifest
            .most_suitable_rule(&manifest.root_path().join(folder))
            .sha()
            .to_string()
    }

    #[test]
    fn test_dump_sha_values() {
        let (temp, manifest) = sha_manifest();
        let out = temp.path().join("sha.txt");
        manifest.dump_sha_values(&out).unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("a:{}", sha_of(&manifest, "a")));
        assert_eq!(lines[1], format!("b:{}", sha_of(&manifest, "b")));

        assert!(manifest.diff_sha_with_filepath(&out, false).unwrap().is_empty());
    }

    #[test]
    fn test_diff_sha_new_modified_removed() {
        let (temp, manifest) = sha_manifest();
        let recorded = temp.path().join("recorded.txt");
        let sha_a = sha_of(&manifest, "a");
        let sha_b = sha_of(&manifest, "b");

        std::fs::write(&recorded, format!("a:{}\n", sha_a)).unwrap();
        assert_eq!(
            manifest.diff_sha_with_filepath(&recorded, false).unwrap(),
            BTreeSet::from([PathBuf::from("b")])
        );

        std::fs::write(&recorded, format!("a:{}\nb:{}\n", "0".repeat(128), sha_b)).unwrap();
        assert_eq!(
            manifest.diff_sha_with_filepath(&recorded, false).unwrap(),
            BTreeSet::from([PathBuf::from("a")])
        );

        std::fs::write(&recorded, format!("a:{}\n\nb:{}\nc:{}\n", sha_a, sha_b, sha_a)).unwrap();
        assert_eq!(
            manifest.diff_sha_with_filepath(&recorded, true).unwrap(),
            BTreeSet::from([temp.path().join("c")])
        );
    }

    #[test]
    fn test_diff_sha_malformed_line() {
        let (temp, manifest) = sha_manifest();
        let recorded = temp.path().join("recorded.txt");
        std::fs::write(&recorded, "a:abc\nno separator here\n").unwrap();
        match manifest.diff_sha_with_filepath(&recorded, false) {
            Err(ManifestError::MalformedShaLine { line_no, .. }) => assert_eq!(line_no, 2),
            other => panic!("expected malformed line error, got {:?}", other),
        }
    }
}
