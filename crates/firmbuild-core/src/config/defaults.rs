//! Default settings values

/// Settings file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "firmbuild.toml";

/// Settings file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "firmbuild.yaml";

/// Get list of settings file names to search for, in order of preference
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        ".firmbuild.toml",
        DEFAULT_CONFIG_YAML,
        ".firmbuild.yaml",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_names_order() {
        let names = config_file_names();
        assert_eq!(names.first(), Some(&DEFAULT_CONFIG_TOML));
        assert!(names.iter().position(|n| *n == DEFAULT_CONFIG_TOML) < names.iter().position(|n| *n == DEFAULT_CONFIG_YAML));
    }
}
