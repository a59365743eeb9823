//! Settings loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::Settings;
use super::validation::validate_settings;

/// Load settings from a file. Relative paths inside are resolved against
/// the folder holding the file.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading settings");
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()).into());
    }

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let mut settings: Settings = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    if let Some(base) = path.parent() {
        settings.rebase(base);
    }

    validate_settings(&settings)?;
    debug!(path = %path.display(), "settings loaded and validated");
    Ok(settings)
}

/// Find a settings file in a directory or its parents
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for settings file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.is_file() {
                info!(path = %config_path.display(), "found settings file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no settings file found");
    None
}

/// Load settings found from a directory upwards, or the defaults when
/// there is no settings file. A broken settings file is still an error.
pub fn load_settings_or_default(dir: &Path) -> Result<(Settings, Option<PathBuf>)> {
    match find_config(dir) {
        Some(path) => Ok((load_settings(&path)?, Some(path))),
        None => {
            debug!(dir = %dir.display(), "no settings file found, using defaults");
            Ok((Settings::default(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FirmbuildError;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("firmbuild.toml");
        std::fs::write(&config_path, "target = \"esp32\"\n").unwrap();
        let nested = temp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(config_path));
    }

    #[test]
    fn test_find_config_prefers_toml_over_yaml() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("firmbuild.toml");
        std::fs::write(&toml_path, "target = \"esp32\"\n").unwrap();
        std::fs::write(temp.path().join("firmbuild.yaml"), "target: esp32s2\n").unwrap();

        assert_eq!(find_config(temp.path()).unwrap(), toml_path);
    }

    #[test]
    fn test_load_settings_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(".firmbuild.toml");
        std::fs::write(
            &config_path,
            "target = \"esp32c3\"\nrecursive = true\nmanifest_files = [\".build-test-rules.yml\"]\nmodified_components = []\n",
        )
        .unwrap();

        let settings = load_settings(&config_path).unwrap();
        assert_eq!(settings.target, "esp32c3");
        assert!(settings.recursive);
        assert_eq!(settings.manifest_files, vec![temp.path().join(".build-test-rules.yml")]);
        assert_eq!(settings.modified_components, Some(Vec::new()));
        assert_eq!(settings.modified_files, None);
        assert_eq!(settings.build_dir, "build");
    }

    #[test]
    fn test_load_settings_yaml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("firmbuild.yaml");
        std::fs::write(&config_path, "target: esp32s3\nparallel_count: 2\nparallel_index: 2\n").unwrap();

        let settings = load_settings(&config_path).unwrap();
        assert_eq!(settings.target, "esp32s3");
        assert_eq!(settings.parallel_index, 2);
    }

    #[test]
    fn test_load_settings_invalid() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("firmbuild.toml");
        std::fs::write(&config_path, "parallel_count = 2\nparallel_index = 3\n").unwrap();
        assert!(matches!(
            load_settings(&config_path),
            Err(FirmbuildError::Config(ConfigError::InvalidValue { .. }))
        ));

        std::fs::write(&config_path, "target = [").unwrap();
        assert!(matches!(
            load_settings(&config_path),
            Err(FirmbuildError::Config(ConfigError::TomlError(_)))
        ));
    }

    #[test]
    fn test_load_settings_missing_file() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("firmbuild.toml");
        match load_settings(&missing) {
            Err(FirmbuildError::Config(ConfigError::NotFound(path))) => assert_eq!(path, missing),
            other => panic!("expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_load_settings_or_default() {
        let temp = TempDir::new().unwrap();
        let (settings, path) = load_settings_or_default(temp.path()).unwrap();
        // a settings file further up the real filesystem would be picked up too
        if path.is_none() {
            assert_eq!(settings, Settings::default());
        }
    }
}
