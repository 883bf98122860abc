//! Ways of filling a freshly created release directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::fs::Filesystem;

/// Populates a release directory. Runs after the release is created and
/// before it is promoted.
pub trait ReleaseSource: Send + Sync {
    fn populate(&self, fs: &dyn Filesystem, release_path: &str) -> anyhow::Result<()>;
}

impl<F> ReleaseSource for F
where
    F: Fn(&dyn Filesystem, &str) -> anyhow::Result<()> + Send + Sync,
{
    fn populate(&self, fs: &dyn Filesystem, release_path: &str) -> anyhow::Result<()> {
        self(fs, release_path)
    }
}

/// Mirrors a local directory tree into the release, skipping `.git`.
///
/// Symlinks are recreated with their raw target. Special files are refused.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ReleaseSource for DirectorySource {
    fn populate(&self, fs: &dyn Filesystem, release_path: &str) -> anyhow::Result<()> {
        if !self.root.is_dir() {
            anyhow::bail!("Source directory not found: {}", self.root.display());
        }
        tracing::info!(
            "Copying {} into release {}",
            self.root.display(),
            release_path
        );
        copy_tree(fs, &self.root, release_path)
    }
}

fn copy_tree(fs: &dyn Filesystem, src: &Path, dst: &str) -> anyhow::Result<()> {
    let mut entries = fs::read_dir(src)
        .with_context(|| format!("Failed to read dir: {}", src.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read dir entry: {}", src.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let file_name = entry.file_name();
        if file_name == ".git" {
            continue;
        }
        let name = file_name
            .to_str()
            .with_context(|| format!("Non UTF-8 file name in {}", src.display()))?;
        let from = entry.path();
        let to = fs.join(dst, name);
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", from.display()))?;

        if ty.is_symlink() {
            let target = fs::read_link(&from)
                .with_context(|| format!("Failed to read symlink: {}", from.display()))?;
            fs.create_symlink(&target.to_string_lossy(), &to, false)
                .with_context(|| format!("Failed to create symlink: {to}"))?;
        } else if ty.is_dir() {
            fs.make_dir(&to, false)
                .with_context(|| format!("Failed to create directory: {to}"))?;
            copy_tree(fs, &from, &to)?;
        } else if ty.is_file() {
            let mut file = File::open(&from)
                .with_context(|| format!("Failed to open file: {}", from.display()))?;
            fs.write_file(&to, &mut file).with_context(|| {
                format!("Failed to copy file from {} to {}", from.display(), to)
            })?;
        } else {
            anyhow::bail!("Unsupported filesystem entry type at {}", from.display());
        }
    }
    Ok(())
}
