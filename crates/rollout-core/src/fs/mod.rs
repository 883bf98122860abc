//! Filesystem providers the release manager runs on.
//!
//! Every operation that could act on either a symlink or the thing it points
//! at is split into a strict/non-strict pair or a symlink-specific operation.
//! Removing or classifying through a symlink by accident could touch data
//! outside the release tree.

pub mod error;
pub mod local;
pub mod remote;

use std::collections::BTreeMap;
use std::io::Read;

pub use error::FsError;
pub use local::LocalFilesystem;
pub use remote::RemoteFilesystem;

/// What a path is, without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
    /// Fifo, socket, device node.
    Other,
}

/// Storage backend capabilities used by the release manager.
///
/// Paths are plain strings in the backend's own syntax, so the same contract
/// covers the local disk and a remote host.
pub trait Filesystem: Send {
    /// Path-joining character for this backend.
    fn separator(&self) -> char;

    fn is_absolute(&self, path: &str) -> bool {
        is_absolute_path(path)
    }

    /// In strict mode a symlink is never a directory, even if its target is one.
    fn is_dir(&self, path: &str, strict: bool) -> Result<bool, FsError>;

    /// In strict mode a symlink is never a file, even if its target is one.
    fn is_file(&self, path: &str, strict: bool) -> Result<bool, FsError>;

    fn is_symlink(&self, path: &str) -> Result<bool, FsError>;

    /// Map of full child path to child name, without `.` and `..`.
    fn list(&self, path: &str) -> Result<BTreeMap<String, String>, FsError>;

    fn make_dir(&self, path: &str, with_parents: bool) -> Result<(), FsError>;

    /// Remove a directory, file or symlink. Symlinks are never followed.
    fn remove(&self, path: &str, recursive: bool) -> Result<(), FsError>;

    /// Create a symlink at `target` pointing to `path`.
    ///
    /// With `overwrite`, an existing symlink at `target` is replaced by
    /// renaming a freshly staged link over it.
    fn create_symlink(&self, path: &str, target: &str, overwrite: bool) -> Result<(), FsError>;

    /// Remove a symlink (or a plain file); directories are refused.
    fn remove_symlink(&self, path: &str) -> Result<(), FsError>;

    /// Raw link target, not resolved.
    fn read_symlink(&self, path: &str) -> Result<String, FsError>;

    /// Stream `contents` into a regular file, creating or truncating it.
    fn write_file(&self, path: &str, contents: &mut dyn Read) -> Result<u64, FsError>;

    /// `base + separator + name`, without doubling a trailing separator.
    fn join(&self, base: &str, name: &str) -> String {
        join_path(base, name, self.separator())
    }
}

impl<F: Filesystem + ?Sized> Filesystem for Box<F> {
    fn separator(&self) -> char {
        (**self).separator()
    }

    fn is_absolute(&self, path: &str) -> bool {
        (**self).is_absolute(path)
    }

    fn is_dir(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        (**self).is_dir(path, strict)
    }

    fn is_file(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        (**self).is_file(path, strict)
    }

    fn is_symlink(&self, path: &str) -> Result<bool, FsError> {
        (**self).is_symlink(path)
    }

    fn list(&self, path: &str) -> Result<BTreeMap<String, String>, FsError> {
        (**self).list(path)
    }

    fn make_dir(&self, path: &str, with_parents: bool) -> Result<(), FsError> {
        (**self).make_dir(path, with_parents)
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        (**self).remove(path, recursive)
    }

    fn create_symlink(&self, path: &str, target: &str, overwrite: bool) -> Result<(), FsError> {
        (**self).create_symlink(path, target, overwrite)
    }

    fn remove_symlink(&self, path: &str) -> Result<(), FsError> {
        (**self).remove_symlink(path)
    }

    fn read_symlink(&self, path: &str) -> Result<String, FsError> {
        (**self).read_symlink(path)
    }

    fn write_file(&self, path: &str, contents: &mut dyn Read) -> Result<u64, FsError> {
        (**self).write_file(path, contents)
    }

    fn join(&self, base: &str, name: &str) -> String {
        (**self).join(base, name)
    }
}

/// Root-relative, drive-letter and URI-scheme paths are absolute.
pub fn is_absolute_path(path: &str) -> bool {
    if path.starts_with(['/', '\\']) {
        return true;
    }

    let bytes = path.as_bytes();
    if bytes.len() > 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
    {
        return true;
    }

    url::Url::parse(path).is_ok()
}

pub(crate) fn join_path(base: &str, name: &str, separator: char) -> String {
    let trimmed = base.trim_end_matches(separator);
    format!("{trimmed}{separator}{name}")
}

/// Parent of `path` in a `separator`-joined syntax, if it has one.
pub(crate) fn parent_path(path: &str, separator: char) -> Option<&str> {
    let trimmed = path.trim_end_matches(separator);
    let (parent, _) = trimmed.rsplit_once(separator)?;
    if parent.is_empty() {
        Some(&path[..separator.len_utf8()])
    } else {
        Some(parent)
    }
}

/// Final segment of `path`.
pub(crate) fn file_name(path: &str, separator: char) -> &str {
    let trimmed = path.trim_end_matches(separator);
    trimmed
        .rsplit_once(separator)
        .map_or(trimmed, |(_, name)| name)
}
