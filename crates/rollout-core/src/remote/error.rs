//! Connection-level errors. Backend process and I/O failures are wrapped so
//! callers never depend on how a transport reports problems.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Unsupported credential type for target '{target}': {reason}")]
    UnsupportedCredentialType { target: String, reason: String },

    #[error("Execution failed: {command}")]
    ExecutionFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transfer failed: {path}")]
    TransferFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to prepare session '{name}'")]
    Setup {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConnectionError {
    pub(crate) fn execution(command: &str, source: std::io::Error) -> Self {
        Self::ExecutionFailed {
            command: command.to_string(),
            source,
        }
    }

    pub(crate) fn transfer(path: &str, source: std::io::Error) -> Self {
        Self::TransferFailed {
            path: path.to_string(),
            source,
        }
    }
}
