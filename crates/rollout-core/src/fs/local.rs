//! Local disk implementation of [`Filesystem`].

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;

use super::{EntryKind, Filesystem, FsError, file_name, parent_path};

/// Filesystem provider backed by `std::fs`.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    dir_mode: u32,
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self { dir_mode: 0o777 }
    }
}

impl LocalFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode for directories created by `make_dir` (before umask). Unix only.
    pub fn with_dir_mode(dir_mode: u32) -> Self {
        Self { dir_mode }
    }

    pub fn dir_mode(&self) -> u32 {
        self.dir_mode
    }

    fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, FsError> {
        match fs::symlink_metadata(path) {
            Ok(meta) => {
                let ty = meta.file_type();
                let kind = if ty.is_symlink() {
                    EntryKind::Symlink
                } else if ty.is_dir() {
                    EntryKind::Dir
                } else if ty.is_file() {
                    EntryKind::File
                } else {
                    EntryKind::Other
                };
                Ok(Some(kind))
            }
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(FsError::io(path, err)),
        }
    }

    /// Follows the final symlink, unlike `entry_kind`.
    fn resolved_kind(&self, path: &str) -> Result<Option<EntryKind>, FsError> {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Dir)),
            Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
            Ok(_) => Ok(Some(EntryKind::Other)),
            Err(err) if is_missing(&err) => Ok(None),
            Err(err) => Err(FsError::io(path, err)),
        }
    }

    fn classify(&self, path: &str, strict: bool, wanted: EntryKind) -> Result<bool, FsError> {
        match self.entry_kind(path)? {
            None => Ok(false),
            Some(EntryKind::Symlink) if strict => Ok(false),
            Some(EntryKind::Symlink) => Ok(self.resolved_kind(path)? == Some(wanted)),
            Some(kind) => Ok(kind == wanted),
        }
    }

    /// First entry below `path` that is neither a directory, a file nor a symlink.
    fn find_special(&self, path: &str) -> Result<Option<String>, FsError> {
        for child in self.list(path)?.into_keys() {
            match self.entry_kind(&child)? {
                Some(EntryKind::Dir) => {
                    if let Some(special) = self.find_special(&child)? {
                        return Ok(Some(special));
                    }
                }
                Some(EntryKind::Other) => return Ok(Some(child)),
                _ => {}
            }
        }
        Ok(None)
    }

    /// Depth-first removal of a tree already checked by `find_special`.
    fn remove_tree(&self, path: &str) -> Result<(), FsError> {
        for child in self.list(path)?.into_keys() {
            match self.entry_kind(&child)? {
                Some(EntryKind::Dir) => self.remove_tree(&child)?,
                Some(EntryKind::File) | Some(EntryKind::Symlink) => {
                    fs::remove_file(&child).map_err(|err| FsError::io(&child, err))?
                }
                Some(EntryKind::Other) | None => {
                    return Err(FsError::UnknownEntryType(child));
                }
            }
        }
        fs::remove_dir(path).map_err(|err| FsError::io(path, err))
    }

    fn replace_symlink(&self, path: &str, target: &str) -> Result<(), FsError> {
        let tmp = unique_temp_path(target, self.separator())?;
        if let Err(err) = create_symlink(path, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(FsError::io(target, err));
        }

        // rename(2) swaps the link itself; the old target is never followed.
        if let Err(err) = fs::rename(&tmp, target) {
            let _ = fs::remove_file(&tmp);
            return Err(FsError::io(target, err));
        }
        Ok(())
    }
}

impl Filesystem for LocalFilesystem {
    fn separator(&self) -> char {
        std::path::MAIN_SEPARATOR
    }

    fn is_dir(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        self.classify(path, strict, EntryKind::Dir)
    }

    fn is_file(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        self.classify(path, strict, EntryKind::File)
    }

    fn is_symlink(&self, path: &str) -> Result<bool, FsError> {
        Ok(self.entry_kind(path)? == Some(EntryKind::Symlink))
    }

    fn list(&self, path: &str) -> Result<BTreeMap<String, String>, FsError> {
        if !self.is_dir(path, false)? {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        let entries = fs::read_dir(path).map_err(|err| match err.kind() {
            ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_string()),
            _ => FsError::io(path, err),
        })?;

        let mut items = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|err| FsError::io(path, err))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            items.insert(self.join(path, &name), name);
        }
        Ok(items)
    }

    fn make_dir(&self, path: &str, with_parents: bool) -> Result<(), FsError> {
        if self.entry_kind(path)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        if !with_parents
            && let Some(parent) = parent_path(path, self.separator())
            && !self.is_dir(parent, false)?
        {
            return Err(FsError::NotFound(parent.to_string()));
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(with_parents);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode);
        }
        builder.create(path).map_err(|err| FsError::io(path, err))
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        match self.entry_kind(path)? {
            Some(EntryKind::Dir) if recursive => {
                if let Some(special) = self.find_special(path)? {
                    return Err(FsError::UnknownEntryType(special));
                }
                self.remove_tree(path)
            }
            Some(EntryKind::Dir) => {
                if !self.list(path)?.is_empty() {
                    return Err(FsError::NotEmpty(path.to_string()));
                }
                fs::remove_dir(path).map_err(|err| FsError::io(path, err))
            }
            Some(EntryKind::File) | Some(EntryKind::Symlink) => {
                fs::remove_file(path).map_err(|err| FsError::io(path, err))
            }
            Some(EntryKind::Other) | None => Err(FsError::UnknownEntryType(path.to_string())),
        }
    }

    fn create_symlink(&self, path: &str, target: &str, overwrite: bool) -> Result<(), FsError> {
        match self.entry_kind(target)? {
            None => create_symlink(path, target).map_err(|err| FsError::io(target, err)),
            Some(EntryKind::Symlink) if overwrite => self.replace_symlink(path, target),
            Some(_) => Err(FsError::AlreadyExists(target.to_string())),
        }
    }

    fn remove_symlink(&self, path: &str) -> Result<(), FsError> {
        match self.entry_kind(path)? {
            Some(EntryKind::Symlink) | Some(EntryKind::File) => {
                fs::remove_file(path).map_err(|err| FsError::io(path, err))
            }
            _ => Err(FsError::NotASymlink(path.to_string())),
        }
    }

    fn read_symlink(&self, path: &str) -> Result<String, FsError> {
        let target = fs::read_link(path).map_err(|err| FsError::io(path, err))?;
        Ok(target.to_string_lossy().into_owned())
    }

    fn write_file(&self, path: &str, contents: &mut dyn Read) -> Result<u64, FsError> {
        let mut file = fs::File::create(path).map_err(|err| FsError::io(path, err))?;
        std::io::copy(contents, &mut file).map_err(|err| FsError::io(path, err))
    }
}

fn is_missing(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

fn unique_temp_path(target: &str, separator: char) -> Result<String, FsError> {
    let parent = parent_path(target, separator).unwrap_or(".");
    let base = file_name(target, separator);

    for attempt in 0u32..1000 {
        let name = if attempt == 0 {
            format!(".{}.tmp.{}", base, std::process::id())
        } else {
            format!(".{}.tmp.{}.{}", base, std::process::id(), attempt)
        };
        let candidate = PathBuf::from(parent).join(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate.to_string_lossy().into_owned());
        }
    }

    Err(FsError::io(
        target,
        std::io::Error::other("failed to allocate a unique temp path"),
    ))
}

#[cfg(unix)]
fn create_symlink(path: &str, link: &str) -> std::io::Result<()> {
    std::os::unix::fs::symlink(path, link)
}

#[cfg(windows)]
fn create_symlink(path: &str, link: &str) -> std::io::Result<()> {
    if std::path::Path::new(path).is_dir() {
        std::os::windows::fs::symlink_dir(path, link)
    } else {
        std::os::windows::fs::symlink_file(path, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_path: &str, _link: &str) -> std::io::Result<()> {
    Err(std::io::Error::new(
        ErrorKind::Unsupported,
        "Symlinks are not supported on this platform",
    ))
}
