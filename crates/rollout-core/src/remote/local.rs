//! Executor that runs commands through the local `sh`.
//!
//! Used for `transport = "local"` targets. It speaks exactly the same
//! contract as the SSH executor, so it also stands in for a remote host when
//! exercising the remote filesystem.

use std::fs::File;
use std::io::{Read, Write};
use std::process::Command;

use super::shell::{command_line, merged_output};
use super::{ConnectionError, LineSink, RemoteExecutor, SessionNamer, spawn_streaming};

#[derive(Debug)]
pub struct LocalShellExecutor {
    name: String,
    shell: String,
}

impl LocalShellExecutor {
    pub fn new(namer: &SessionNamer) -> Self {
        Self {
            name: namer.next_name(),
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell binary.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl RemoteExecutor for LocalShellExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&str>,
        sink: &mut dyn LineSink,
    ) -> Result<i32, ConnectionError> {
        let line = command_line(command, args, working_dir);
        tracing::info!(session = %self.name, "Running: {}", line);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(merged_output(&line));

        let (status, stderr) = spawn_streaming(cmd, &line, sink)?;
        status.code().ok_or_else(|| {
            ConnectionError::execution(
                &line,
                std::io::Error::other(format!("terminated by signal: {stderr}")),
            )
        })
    }

    fn upload(&self, local: &mut dyn Read, remote_path: &str) -> Result<u64, ConnectionError> {
        tracing::info!(session = %self.name, "Uploading to {}", remote_path);
        let mut file =
            File::create(remote_path).map_err(|err| ConnectionError::transfer(remote_path, err))?;
        std::io::copy(local, &mut file).map_err(|err| ConnectionError::transfer(remote_path, err))
    }

    fn download(&self, remote_path: &str, local: &mut dyn Write) -> Result<u64, ConnectionError> {
        tracing::info!(session = %self.name, "Downloading {}", remote_path);
        let mut file =
            File::open(remote_path).map_err(|err| ConnectionError::transfer(remote_path, err))?;
        std::io::copy(&mut file, local).map_err(|err| ConnectionError::transfer(remote_path, err))
    }
}
