//! Filesystem provider that operates on a remote host through an executor.
//!
//! Every operation is a short POSIX shell snippet. Symlink replacement is a
//! staged `ln -s` followed by `mv -T -f`, i.e. two commands in one remote
//! shell: as atomic as the remote `rename(2)`, but not power-failure safe
//! across the pair.

use std::collections::BTreeMap;
use std::io::Read;

use super::{EntryKind, Filesystem, FsError, file_name, parent_path};
use crate::remote::{CapturedOutput, NullSink, RemoteExecutor, shell_escape};

const SEPARATOR: char = '/';

#[derive(Debug)]
pub struct RemoteFilesystem<E> {
    executor: E,
}

impl<E: RemoteExecutor> RemoteFilesystem<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Run a snippet and interpret exit status 0/1 as true/false.
    fn test(&self, path: &str, snippet: &str) -> Result<bool, FsError> {
        let code = self
            .executor
            .run(snippet, &[], None, &mut NullSink)
            .map_err(|err| FsError::remote(path, err))?;
        match code {
            0 => Ok(true),
            1 => Ok(false),
            code => Err(failure(path, code, "")),
        }
    }

    /// Run a snippet that must succeed, returning its output.
    fn exec(&self, path: &str, snippet: &str) -> Result<CapturedOutput, FsError> {
        let mut output = CapturedOutput::default();
        let code = self
            .executor
            .run(snippet, &[], None, &mut output)
            .map_err(|err| FsError::remote(path, err))?;
        if code != 0 {
            return Err(failure(path, code, &output.text()));
        }
        Ok(output)
    }

    fn entry_kind(&self, path: &str) -> Result<Option<EntryKind>, FsError> {
        let p = shell_escape(path);
        let snippet = format!(
            "if [ -L {p} ]; then echo symlink; \
             elif [ -d {p} ]; then echo dir; \
             elif [ -f {p} ]; then echo file; \
             elif [ -e {p} ]; then echo other; \
             else echo missing; fi"
        );
        let output = self.exec(path, &snippet)?;
        match output.lines.first().map(String::as_str) {
            Some("symlink") => Ok(Some(EntryKind::Symlink)),
            Some("dir") => Ok(Some(EntryKind::Dir)),
            Some("file") => Ok(Some(EntryKind::File)),
            Some("other") => Ok(Some(EntryKind::Other)),
            Some("missing") => Ok(None),
            _ => Err(failure(path, 0, &output.text())),
        }
    }

    fn classify(&self, path: &str, strict: bool, flag: &str) -> Result<bool, FsError> {
        let p = shell_escape(path);
        let snippet = if strict {
            format!("[ {flag} {p} ] && [ ! -L {p} ]")
        } else {
            format!("[ {flag} {p} ]")
        };
        self.test(path, &snippet)
    }

    fn is_empty_dir(&self, path: &str) -> Result<bool, FsError> {
        Ok(self.list(path)?.is_empty())
    }
}

impl<E: RemoteExecutor> Filesystem for RemoteFilesystem<E> {
    fn separator(&self) -> char {
        SEPARATOR
    }

    fn is_dir(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        self.classify(path, strict, "-d")
    }

    fn is_file(&self, path: &str, strict: bool) -> Result<bool, FsError> {
        self.classify(path, strict, "-f")
    }

    fn is_symlink(&self, path: &str) -> Result<bool, FsError> {
        self.test(path, &format!("[ -L {} ]", shell_escape(path)))
    }

    fn list(&self, path: &str) -> Result<BTreeMap<String, String>, FsError> {
        if !self.is_dir(path, false)? {
            return Err(FsError::NotADirectory(path.to_string()));
        }
        let p = shell_escape(path);
        if !self.test(path, &format!("[ -r {p} ] && [ -x {p} ]"))? {
            return Err(FsError::PermissionDenied(path.to_string()));
        }

        // Names may contain newlines, so they travel NUL-terminated and hex-encoded.
        let output = self.exec(
            path,
            &format!("find -H {p} -mindepth 1 -maxdepth 1 -printf '%f\\0' | od -An -tx1 -v"),
        )?;
        let text = output.text();
        let raw = decode_hex(&text).ok_or_else(|| failure(path, 0, &text))?;
        Ok(raw
            .split(|byte| *byte == 0)
            .filter(|name| !name.is_empty())
            .map(|name| {
                let name = String::from_utf8_lossy(name).into_owned();
                (self.join(path, &name), name)
            })
            .collect())
    }

    fn make_dir(&self, path: &str, with_parents: bool) -> Result<(), FsError> {
        if self.entry_kind(path)?.is_some() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }

        if !with_parents
            && let Some(parent) = parent_path(path, SEPARATOR)
            && !self.is_dir(parent, false)?
        {
            return Err(FsError::NotFound(parent.to_string()));
        }

        let flags = if with_parents { "-p " } else { "" };
        self.exec(path, &format!("mkdir {flags}-- {}", shell_escape(path)))?;
        Ok(())
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        let p = shell_escape(path);
        match self.entry_kind(path)? {
            Some(EntryKind::Dir) if recursive => {
                let special = self.exec(
                    path,
                    &format!("find {p} ! -type d ! -type f ! -type l -print -quit"),
                )?;
                if let Some(entry) = special.lines.first() {
                    return Err(FsError::UnknownEntryType(entry.clone()));
                }
                // rm -r removes depth-first and never follows symlinks.
                self.exec(path, &format!("rm -r -- {p}"))?;
            }
            Some(EntryKind::Dir) => {
                if !self.is_empty_dir(path)? {
                    return Err(FsError::NotEmpty(path.to_string()));
                }
                self.exec(path, &format!("rmdir -- {p}"))?;
            }
            Some(EntryKind::File) | Some(EntryKind::Symlink) => {
                self.exec(path, &format!("rm -f -- {p}"))?;
            }
            Some(EntryKind::Other) | None => {
                return Err(FsError::UnknownEntryType(path.to_string()));
            }
        }
        Ok(())
    }

    fn create_symlink(&self, path: &str, target: &str, overwrite: bool) -> Result<(), FsError> {
        let src = shell_escape(path);
        let dst = shell_escape(target);
        match self.entry_kind(target)? {
            None => {
                self.exec(target, &format!("ln -s -- {src} {dst}"))?;
            }
            Some(EntryKind::Symlink) if overwrite => {
                let parent = parent_path(target, SEPARATOR).unwrap_or(".");
                let staged = format!(
                    "{}{}.{}.tmp.{}",
                    parent.trim_end_matches(SEPARATOR),
                    SEPARATOR,
                    file_name(target, SEPARATOR),
                    std::process::id()
                );
                let tmp = shell_escape(&staged);
                self.exec(
                    target,
                    &format!(
                        "rm -f -- {tmp} && ln -s -- {src} {tmp} && \
                         {{ mv -T -f -- {tmp} {dst} || {{ rm -f -- {tmp}; exit 1; }}; }}"
                    ),
                )?;
            }
            Some(_) => return Err(FsError::AlreadyExists(target.to_string())),
        }
        Ok(())
    }

    fn remove_symlink(&self, path: &str) -> Result<(), FsError> {
        match self.entry_kind(path)? {
            Some(EntryKind::Symlink) | Some(EntryKind::File) => {
                self.exec(path, &format!("rm -f -- {}", shell_escape(path)))?;
                Ok(())
            }
            _ => Err(FsError::NotASymlink(path.to_string())),
        }
    }

    fn read_symlink(&self, path: &str) -> Result<String, FsError> {
        let output = self.exec(path, &format!("readlink -- {}", shell_escape(path)))?;
        output
            .lines
            .into_iter()
            .next()
            .ok_or_else(|| failure(path, 0, "readlink produced no output"))
    }

    fn write_file(&self, path: &str, contents: &mut dyn Read) -> Result<u64, FsError> {
        self.executor
            .upload(contents, path)
            .map_err(|err| FsError::remote(path, err))
    }
}

fn failure(path: &str, code: i32, output: &str) -> FsError {
    FsError::io(
        path,
        std::io::Error::other(format!("remote command exited with {code}: {output}")),
    )
}

/// Decode `od -An -tx1` output, ignoring whitespace.
fn decode_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::remote::{LocalShellExecutor, SessionNamer};

    fn remote_fs() -> RemoteFilesystem<LocalShellExecutor> {
        let namer = SessionNamer::new("test");
        RemoteFilesystem::new(LocalShellExecutor::new(&namer))
    }

    fn path_str(path: &std::path::Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_classification_matches_local_semantics() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let dir = tmp.path().join("dir");
        let file = tmp.path().join("file");
        let link = tmp.path().join("link");
        std::fs::create_dir(&dir).expect("create_dir should succeed");
        std::fs::write(&file, "x").expect("write should succeed");
        std::os::unix::fs::symlink(&dir, &link).expect("symlink should succeed");

        let fs = remote_fs();
        assert!(fs.is_dir(&path_str(&dir), true).expect("is_dir should succeed"));
        assert!(fs.is_file(&path_str(&file), true).expect("is_file should succeed"));
        assert!(!fs.is_dir(&path_str(&link), true).expect("is_dir should succeed"));
        assert!(fs.is_dir(&path_str(&link), false).expect("is_dir should succeed"));
        assert!(fs.is_symlink(&path_str(&link)).expect("is_symlink should succeed"));
        assert!(!fs.is_symlink(&path_str(&dir)).expect("is_symlink should succeed"));
    }

    #[test]
    fn test_list_returns_full_paths() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let base = path_str(tmp.path());
        for name in ["a", "b c", ".hidden"] {
            std::fs::write(tmp.path().join(name), "x").expect("write should succeed");
        }

        let items = remote_fs().list(&base).expect("list should succeed");
        assert_eq!(items.len(), 3);
        assert_eq!(items.get(&format!("{base}/b c")).map(String::as_str), Some("b c"));
        assert_eq!(
            items.get(&format!("{base}/.hidden")).map(String::as_str),
            Some(".hidden")
        );
    }

    #[test]
    fn test_list_keeps_names_with_newlines_intact() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let base = path_str(tmp.path());
        for name in ["a\nb", "tab\there", "trailing\r"] {
            std::fs::write(tmp.path().join(name), "x").expect("write should succeed");
        }

        let items = remote_fs().list(&base).expect("list should succeed");
        let names: Vec<&str> = items.values().map(String::as_str).collect();
        assert_eq!(names, vec!["a\nb", "tab\there", "trailing\r"]);
    }

    #[test]
    fn test_list_of_empty_directory() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let items = remote_fs()
            .list(&path_str(tmp.path()))
            .expect("list should succeed");
        assert!(items.is_empty());
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex(" 61 0a 62 00\n 63 00\n"), Some(b"a\nb\0c\0".to_vec()));
        assert_eq!(decode_hex(""), Some(Vec::new()));
        assert_eq!(decode_hex("6"), None);
        assert_eq!(decode_hex("zz"), None);
    }

    #[test]
    fn test_list_of_file_is_not_a_directory() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let file = tmp.path().join("file");
        std::fs::write(&file, "x").expect("write should succeed");
        let err = remote_fs().list(&path_str(&file)).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(_)));
    }

    #[test]
    fn test_symlink_overwrite_and_readlink() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir(&a).expect("create_dir should succeed");
        std::fs::create_dir(&b).expect("create_dir should succeed");
        let link = path_str(&tmp.path().join("current"));

        let fs = remote_fs();
        fs.create_symlink(&path_str(&a), &link, false)
            .expect("symlink should succeed");
        let err = fs.create_symlink(&path_str(&b), &link, false).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        fs.create_symlink(&path_str(&b), &link, true)
            .expect("overwrite should succeed");
        assert_eq!(fs.read_symlink(&link).expect("readlink should succeed"), path_str(&b));
        // The old target directory is untouched and nothing was moved into it.
        assert!(a.is_dir());
        assert_eq!(std::fs::read_dir(&b).expect("read_dir should succeed").count(), 0);
        assert_eq!(
            std::fs::read_dir(tmp.path()).expect("read_dir should succeed").count(),
            3
        );
    }

    #[test]
    fn test_remove_symlink_keeps_target() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let dir = tmp.path().join("dir");
        std::fs::create_dir(&dir).expect("create_dir should succeed");
        std::fs::write(dir.join("keep"), "x").expect("write should succeed");
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&dir, &link).expect("symlink should succeed");

        let fs = remote_fs();
        fs.remove(&path_str(&link), true).expect("remove should succeed");
        assert!(!link.exists());
        assert!(dir.join("keep").exists());

        let err = fs.remove_symlink(&path_str(&dir)).unwrap_err();
        assert!(matches!(err, FsError::NotASymlink(_)));
    }

    #[test]
    fn test_write_file_uploads_contents() {
        let tmp = tempfile::tempdir().expect("tempdir should succeed");
        let path = path_str(&tmp.path().join("index.html"));
        let written = remote_fs()
            .write_file(&path, &mut "<h1>hi</h1>".as_bytes())
            .expect("write_file should succeed");
        assert_eq!(written, 11);
        assert_eq!(
            std::fs::read_to_string(&path).expect("read should succeed"),
            "<h1>hi</h1>"
        );
    }
}
