//! Release lifecycle: naming, creation, removal and promotion.

pub mod generator;
pub mod manager;

use thiserror::Error;

use crate::fs::FsError;

pub use generator::{GeneratorError, NameFormat, NameGenerator, TimestampGenerator};
pub use manager::ReleaseManager;

/// Directory under the base path holding one directory per release.
pub const RELEASES_DIR: &str = "releases";
/// Symlink under the base path designating the live release.
pub const CURRENT_LINK: &str = "current";

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Release '{0}' does not exist")]
    ReleaseNotFound(String),

    #[error("Release '{0}' already exists")]
    ReleaseAlreadyExists(String),

    #[error("Current release pointer targets '{target}', which is not a known release")]
    DanglingCurrentPointer { target: String },

    #[error("Invalid release id '{0}': must be a single non-empty path segment")]
    InvalidReleaseId(String),

    #[error(transparent)]
    Generation(#[from] GeneratorError),

    #[error(transparent)]
    Filesystem(#[from] FsError),
}

/// Release ids are used verbatim as directory names.
pub fn validate_release_id(id: &str) -> Result<(), ReleaseError> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.chars().any(char::is_control)
    {
        return Err(ReleaseError::InvalidReleaseId(id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_release_ids() {
        for id in ["1700000000", "20240101120000", "v1.2.3", "hotfix-2"] {
            assert!(validate_release_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn test_invalid_release_ids() {
        for id in ["", ".", "..", "a/b", "a\\b", "/abs", "a\nb", "tab\t", "nul\0"] {
            let err = validate_release_id(id).unwrap_err();
            assert!(matches!(err, ReleaseError::InvalidReleaseId(_)), "{id}");
        }
    }

    #[test]
    fn test_filesystem_errors_pass_through_unchanged() {
        let err: ReleaseError = FsError::NotEmpty("/srv/app/releases/1".to_string()).into();
        assert_eq!(err.to_string(), "Directory not empty: /srv/app/releases/1");
    }
}
