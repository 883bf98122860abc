//! Per-target release status.

use serde::Serialize;

use crate::deploy::TargetSession;
use crate::fs::Filesystem;
use crate::release::{ReleaseError, ReleaseManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub target: String,
    pub address: String,
    pub base_path: String,
    /// Whether `releases/` exists yet.
    pub initialized: bool,
    pub releases: Vec<String>,
    pub current: Option<String>,
    /// Raw target of a `current` link that matches no release.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dangling_current: Option<String>,
}

impl TargetStatus {
    pub fn is_healthy(&self) -> bool {
        self.initialized && self.current.is_some() && self.dangling_current.is_none()
    }
}

/// Inspect a release tree. Read-only.
pub fn collect_status<F: Filesystem>(
    target: &str,
    address: &str,
    manager: &ReleaseManager<F>,
) -> Result<TargetStatus, ReleaseError> {
    let initialized = manager
        .filesystem()
        .is_dir(&manager.releases_path(), false)?;

    let mut status = TargetStatus {
        target: target.to_string(),
        address: address.to_string(),
        base_path: manager.base_path().to_string(),
        initialized,
        releases: Vec::new(),
        current: None,
        dangling_current: None,
    };

    if !initialized {
        return Ok(status);
    }

    status.releases = manager.list_releases()?;
    match manager.get_current_release() {
        Ok(current) => status.current = current,
        Err(ReleaseError::DanglingCurrentPointer { target }) => {
            status.dangling_current = Some(target)
        }
        Err(err) => return Err(err),
    }
    Ok(status)
}

/// Status of an open session's target.
pub fn session_status(session: &TargetSession) -> Result<TargetStatus, ReleaseError> {
    let target = session.target();
    collect_status(target.name(), &target.address(), session.manager())
}
