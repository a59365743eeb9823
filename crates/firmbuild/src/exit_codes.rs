//! Exit codes for the CLI

use firmbuild_core::FirmbuildError;

/// Success
pub const SUCCESS: i32 = 0;

/// General error, or at least one app failed to build
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Manifest file or rule error
pub const MANIFEST_ERROR: i32 = 3;

/// Conflicting or incomplete command options
pub const INVALID_COMMAND: i32 = 4;

/// Exit code for an error reaching the binary boundary
pub fn for_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<FirmbuildError>() {
        Some(FirmbuildError::Config(_)) => CONFIG_ERROR,
        Some(FirmbuildError::Manifest(_)) | Some(FirmbuildError::Parse(_)) | Some(FirmbuildError::Eval(_)) => {
            MANIFEST_ERROR
        }
        Some(FirmbuildError::InvalidCommand(_)) => INVALID_COMMAND,
        _ => ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firmbuild_core::error::{ConfigError, ManifestError};

    #[test]
    fn test_for_error() {
        let err = anyhow::Error::new(FirmbuildError::from(ConfigError::InvalidValue {
            field: "target".to_string(),
            message: "bad".to_string(),
        }));
        assert_eq!(for_error(&err), CONFIG_ERROR);

        let err = anyhow::Error::new(FirmbuildError::from(ManifestError::InvalidIfClause("x".to_string())));
        assert_eq!(for_error(&err), MANIFEST_ERROR);

        let err = anyhow::Error::new(FirmbuildError::invalid_command("conflict"));
        assert_eq!(for_error(&err), INVALID_COMMAND);

        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
        assert_ne!(SUCCESS, ERROR);
    }
}
