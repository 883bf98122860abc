//! Release directory layout and the `current` pointer.
//!
//! ```text
//! <base>/
//!   releases/<id>/...
//!   current -> <base>/releases/<id>
//! ```
//!
//! Promotion only ever goes through `Filesystem::create_symlink` with
//! `overwrite`, so `current` moves from one complete release to another
//! without passing through a missing state.

use super::generator::{NameGenerator, TimestampGenerator};
use super::{CURRENT_LINK, RELEASES_DIR, ReleaseError, validate_release_id};
use crate::fs::{Filesystem, FsError};

pub struct ReleaseManager<F> {
    base_path: String,
    fs: F,
    generator: Box<dyn NameGenerator>,
}

impl<F: Filesystem> ReleaseManager<F> {
    pub fn new(base_path: impl Into<String>, fs: F) -> Self {
        Self {
            base_path: base_path.into(),
            fs,
            generator: Box::new(TimestampGenerator::default()),
        }
    }

    pub fn with_generator(mut self, generator: impl NameGenerator + 'static) -> Self {
        self.generator = Box::new(generator);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn releases_path(&self) -> String {
        self.fs.join(&self.base_path, RELEASES_DIR)
    }

    pub fn current_path(&self) -> String {
        self.fs.join(&self.base_path, CURRENT_LINK)
    }

    pub fn release_path(&self, id: &str) -> String {
        self.fs.join(&self.releases_path(), id)
    }

    /// Make sure `releases/` exists. Safe to call on every deploy.
    pub fn setup(&self) -> Result<(), ReleaseError> {
        let releases = self.releases_path();
        if self.fs.is_dir(&releases, false)? {
            return Ok(());
        }
        tracing::info!("Creating release directory {}", releases);
        self.fs.make_dir(&releases, true)?;
        Ok(())
    }

    /// Release ids in provider order.
    pub fn list_releases(&self) -> Result<Vec<String>, ReleaseError> {
        Ok(self
            .fs
            .list(&self.releases_path())?
            .into_values()
            .collect())
    }

    pub fn release_exists(&self, id: &str) -> Result<bool, ReleaseError> {
        validate_release_id(id)?;
        Ok(self.fs.is_dir(&self.release_path(id), true)?)
    }

    /// Resolve the id `create_release` would use, without creating anything.
    pub fn plan_release_id(&self, id: Option<&str>) -> Result<String, ReleaseError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                // Before setup there is nothing to collide with.
                let existing = if self.fs.is_dir(&self.releases_path(), false)? {
                    self.list_releases()?
                } else {
                    Vec::new()
                };
                self.generator.generate(&existing)?
            }
        };
        validate_release_id(&id)?;
        if self.release_exists(&id)? {
            return Err(ReleaseError::ReleaseAlreadyExists(id));
        }
        Ok(id)
    }

    /// Create an empty release directory and return its id.
    pub fn create_release(&self, id: Option<&str>) -> Result<String, ReleaseError> {
        let id = self.plan_release_id(id)?;
        let path = self.release_path(&id);
        tracing::info!("Creating release {} at {}", id, path);
        self.fs.make_dir(&path, false).map_err(|err| match err {
            FsError::AlreadyExists(_) => ReleaseError::ReleaseAlreadyExists(id.clone()),
            other => other.into(),
        })?;
        Ok(id)
    }

    /// Remove a release tree. `current` is left alone even if it points here.
    pub fn remove_release(&self, id: &str) -> Result<(), ReleaseError> {
        if !self.release_exists(id)? {
            return Err(ReleaseError::ReleaseNotFound(id.to_string()));
        }
        let path = self.release_path(id);
        tracing::info!("Removing release {} at {}", id, path);
        self.fs.remove(&path, true)?;
        Ok(())
    }

    /// The release `current` points to, or `None` before the first promotion.
    pub fn get_current_release(&self) -> Result<Option<String>, ReleaseError> {
        let current = self.current_path();
        if !self.fs.is_symlink(&current)? {
            return Ok(None);
        }

        let target = self.fs.read_symlink(&current)?;
        for id in self.list_releases()? {
            if self.release_path(&id) == target {
                return Ok(Some(id));
            }
        }
        Err(ReleaseError::DanglingCurrentPointer { target })
    }

    /// Atomically repoint `current` at an existing release.
    pub fn set_current_release(&self, id: &str) -> Result<(), ReleaseError> {
        if !self.release_exists(id)? {
            return Err(ReleaseError::ReleaseNotFound(id.to_string()));
        }
        let path = self.release_path(id);
        tracing::info!("Promoting release {} ({})", id, path);
        self.fs.create_symlink(&path, &self.current_path(), true)?;
        Ok(())
    }
}

impl<F> std::fmt::Debug for ReleaseManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseManager")
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::LocalFilesystem;
    use crate::release::GeneratorError;

    fn manager(base: &std::path::Path) -> ReleaseManager<LocalFilesystem> {
        ReleaseManager::new(base.to_string_lossy(), LocalFilesystem::new())
    }

    #[test]
    fn test_paths_use_provider_separator() {
        let manager = ReleaseManager::new("/srv/app/", LocalFilesystem::new());
        assert_eq!(manager.releases_path(), "/srv/app/releases");
        assert_eq!(manager.current_path(), "/srv/app/current");
        assert_eq!(manager.release_path("42"), "/srv/app/releases/42");
    }

    #[test]
    fn test_setup_is_idempotent() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager(&tmp.path().join("app"));
        manager.setup().expect("setup should succeed");
        manager.setup().expect("second setup should succeed");
        assert!(tmp.path().join("app/releases").is_dir());
    }

    #[test]
    fn test_setup_fails_when_releases_is_a_file() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        std::fs::write(tmp.path().join("releases"), "x").expect("write should succeed");
        let err = manager(tmp.path()).setup().unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Filesystem(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_generated_id_is_used_when_none_given() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager(tmp.path())
            .with_generator(|existing: &[String]| {
                Ok::<_, GeneratorError>(format!("r{}", existing.len() + 1))
            });
        manager.setup().expect("setup should succeed");

        assert_eq!(manager.create_release(None).expect("create should succeed"), "r1");
        assert_eq!(manager.create_release(None).expect("create should succeed"), "r2");
        assert_eq!(
            manager.list_releases().expect("list should succeed"),
            vec!["r1", "r2"]
        );
    }

    #[test]
    fn test_generator_collision_surfaces() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager(tmp.path())
            .with_generator(|_: &[String]| Ok::<_, GeneratorError>("same".to_string()));
        manager.setup().expect("setup should succeed");
        manager.create_release(None).expect("create should succeed");

        let err = manager.create_release(None).unwrap_err();
        assert!(matches!(err, ReleaseError::ReleaseAlreadyExists(ref id) if id == "same"));
    }

    #[test]
    fn test_invalid_id_is_rejected_before_filesystem_access() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        // No setup: any filesystem access would fail with NotADirectory.
        let manager = manager(tmp.path());
        let err = manager.create_release(Some("../escape")).unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidReleaseId(_)));
        assert!(!tmp.path().join("escape").exists());
    }

    #[test]
    fn test_release_symlink_is_not_a_release() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let manager = manager(tmp.path());
        manager.setup().expect("setup should succeed");
        let outside = tmp.path().join("outside");
        std::fs::create_dir(&outside).expect("create_dir should succeed");
        std::os::unix::fs::symlink(&outside, tmp.path().join("releases/sneaky"))
            .expect("symlink should succeed");

        assert!(!manager.release_exists("sneaky").expect("exists should succeed"));
        let err = manager.remove_release("sneaky").unwrap_err();
        assert!(matches!(err, ReleaseError::ReleaseNotFound(_)));
        assert!(outside.exists());
    }
}
