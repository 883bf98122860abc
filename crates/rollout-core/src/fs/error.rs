//! Typed filesystem errors shared by every backend.

use thiserror::Error;

use crate::remote::ConnectionError;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Path already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Not a symlink: {0}")]
    NotASymlink(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unknown entry type at {0}")]
    UnknownEntryType(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote operation failed at {path}: {source}")]
    Remote {
        path: String,
        #[source]
        source: ConnectionError,
    },
}

impl FsError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub(crate) fn remote(path: &str, source: ConnectionError) -> Self {
        Self::Remote {
            path: path.to_string(),
            source,
        }
    }

    /// Path the failed operation was applied to.
    pub fn path(&self) -> &str {
        match self {
            FsError::NotFound(path)
            | FsError::AlreadyExists(path)
            | FsError::NotADirectory(path)
            | FsError::NotEmpty(path)
            | FsError::NotASymlink(path)
            | FsError::PermissionDenied(path)
            | FsError::UnknownEntryType(path) => path,
            FsError::Io { path, .. } | FsError::Remote { path, .. } => path,
        }
    }
}
