//! Lexical path helpers and file pattern matching

use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobSetBuilder};
use tracing::warn;

/// Remove `.` and resolve `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Join a relative path onto `root` and normalize it
pub fn absolutize(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&root.join(path))
    }
}

/// Absolute form of `path` against the current working directory
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(absolutize(path, &std::env::current_dir()?))
    }
}

/// `path` relative to `root`, or `path` itself when it is outside `root`
pub fn relative_to(path: &Path, root: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

/// True when any file matches any glob pattern.
///
/// Relative files and patterns are resolved against `root`. `*` does not
/// cross directory separators, `**` does.
pub fn files_match_patterns<P: AsRef<Path>>(files: &[P], patterns: &[String], root: &Path) -> bool {
    if files.is_empty() || patterns.is_empty() {
        return false;
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let absolute = absolutize(Path::new(pattern), root);
        match GlobBuilder::new(&absolute.to_string_lossy())
            .literal_separator(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!(pattern = %pattern, "invalid file pattern: {}", e),
        }
    }

    let set = match builder.build() {
        Ok(set) => set,
        Err(e) => {
            warn!("failed to build file pattern set: {}", e);
            return false;
        }
    };

    files
        .iter()
        .any(|file| set.is_match(absolutize(file.as_ref(), root)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_absolutize_and_relative() {
        let root = Path::new("/repo");
        assert_eq!(absolutize(Path::new("apps/foo"), root), PathBuf::from("/repo/apps/foo"));
        assert_eq!(absolutize(Path::new("/other/x"), root), PathBuf::from("/other/x"));
        assert_eq!(relative_to(Path::new("/repo/apps/foo"), root), PathBuf::from("apps/foo"));
        assert_eq!(relative_to(Path::new("/repo"), root), PathBuf::from("."));
        assert_eq!(relative_to(Path::new("/other/x"), root), PathBuf::from("/other/x"));
    }

    #[test]
    fn test_files_match_patterns() {
        let root = Path::new("/repo");
        let patterns = vec!["components/soc/**".to_string(), "docs/*.md".to_string()];

        assert!(files_match_patterns(&["components/soc/esp32/x.c"], &patterns, root));
        assert!(files_match_patterns(&["/repo/docs/index.md"], &patterns, root));
        assert!(!files_match_patterns(&["docs/en/index.md"], &patterns, root));
        assert!(!files_match_patterns(&["components/bt/x.c"], &patterns, root));
        assert!(!files_match_patterns::<&str>(&[], &patterns, root));
    }
}
