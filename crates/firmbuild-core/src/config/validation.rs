//! Settings validation

use tracing::debug;

use crate::error::{ConfigError, FirmbuildError, Result};

use super::types::Settings;

/// Validate settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    debug!("validating settings");
    validate_parallel(settings)?;
    validate_dependency_inputs(settings)?;
    validate_patterns(settings)?;
    debug!("settings validation passed");
    Ok(())
}

fn validate_parallel(settings: &Settings) -> Result<()> {
    if settings.parallel_count == 0 {
        return Err(ConfigError::InvalidValue {
            field: "parallel_count".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    if settings.parallel_index == 0 || settings.parallel_index > settings.parallel_count {
        return Err(ConfigError::InvalidValue {
            field: "parallel_index".to_string(),
            message: format!("must be between 1 and {}", settings.parallel_count),
        }
        .into());
    }

    Ok(())
}

fn validate_dependency_inputs(settings: &Settings) -> Result<()> {
    if settings.deactivate_dependency_driven_build_by_components.is_some()
        && settings.modified_components.is_none()
    {
        return Err(FirmbuildError::invalid_command(
            "Must specify --deactivate-dependency-driven-build-by-components together with --modified-components",
        ));
    }

    if settings.deactivate_dependency_driven_build_by_filepatterns.is_some()
        && settings.modified_files.is_none()
    {
        return Err(FirmbuildError::invalid_command(
            "Must specify --deactivate-dependency-driven-build-by-filepatterns together with --modified-files",
        ));
    }

    Ok(())
}

fn validate_patterns(settings: &Settings) -> Result<()> {
    for pattern in &settings.ignore_warning_strs {
        if let Err(e) = regex::Regex::new(pattern) {
            return Err(ConfigError::InvalidValue {
                field: "ignore_warning_strs".to_string(),
                message: format!("invalid regex {:?}: {}", pattern, e),
            }
            .into());
        }
    }

    for rule in &settings.config_rules {
        if rule.matches('=').count() > 1 {
            return Err(ConfigError::InvalidValue {
                field: "config_rules".to_string(),
                message: format!("rule {:?} must look like FILE[=NAME]", rule),
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_valid() {
        assert!(validate_settings(&Settings::default()).is_ok());
    }

    #[test]
    fn test_parallel_bounds() {
        let mut settings = Settings::default();
        settings.parallel_count = 3;
        settings.parallel_index = 4;
        assert!(validate_settings(&settings).is_err());

        settings.parallel_index = 3;
        assert!(validate_settings(&settings).is_ok());

        settings.parallel_count = 0;
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_deactivation_requires_modified_inputs() {
        let mut settings = Settings::default();
        settings.deactivate_dependency_driven_build_by_components = Some(vec!["soc".to_string()]);
        assert!(matches!(
            validate_settings(&settings),
            Err(FirmbuildError::InvalidCommand(_))
        ));

        settings.modified_components = Some(Vec::new());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_invalid_patterns() {
        let mut settings = Settings::default();
        settings.ignore_warning_strs = vec!["(unclosed".to_string()];
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.config_rules = vec!["a=b=c".to_string()];
        assert!(validate_settings(&settings).is_err());
    }
}
