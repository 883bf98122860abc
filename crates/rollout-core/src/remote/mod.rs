//! Remote command execution and file transfer.
//!
//! An executor is bound to one target for its whole lifetime. Output of a
//! command is streamed line by line into a [`LineSink`] while it runs.

pub mod error;
pub mod local;
pub mod session;
pub mod shell;
pub mod ssh;

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;

pub use error::ConnectionError;
pub use local::LocalShellExecutor;
pub use session::SessionNamer;
pub use shell::{command_line, shell_escape};
pub use ssh::{SshExecutor, SshOptions};

/// Receives command output one line at a time.
pub trait LineSink {
    fn line(&mut self, line: &str);
}

impl<F: FnMut(&str)> LineSink for F {
    fn line(&mut self, line: &str) {
        self(line)
    }
}

/// Discards output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LineSink for NullSink {
    fn line(&mut self, _line: &str) {}
}

/// Keeps every line in memory.
#[derive(Debug, Default, Clone)]
pub struct CapturedOutput {
    pub lines: Vec<String>,
}

impl LineSink for CapturedOutput {
    fn line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

impl CapturedOutput {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

pub trait RemoteExecutor: Send + Sync {
    /// Session name assigned when the executor was created.
    fn name(&self) -> &str;

    /// Run `command` with individually escaped `args`, optionally inside
    /// `working_dir`, and return its exit code. stderr is merged into the
    /// lines delivered to `sink`.
    fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&str>,
        sink: &mut dyn LineSink,
    ) -> Result<i32, ConnectionError>;

    /// Stream `local` into `remote_path`. A failed transfer leaves the
    /// destination in an undefined state.
    fn upload(&self, local: &mut dyn Read, remote_path: &str) -> Result<u64, ConnectionError>;

    /// Stream `remote_path` into `local`.
    fn download(&self, remote_path: &str, local: &mut dyn Write) -> Result<u64, ConnectionError>;
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&str>,
        sink: &mut dyn LineSink,
    ) -> Result<i32, ConnectionError> {
        (**self).run(command, args, working_dir, sink)
    }

    fn upload(&self, local: &mut dyn Read, remote_path: &str) -> Result<u64, ConnectionError> {
        (**self).upload(local, remote_path)
    }

    fn download(&self, remote_path: &str, local: &mut dyn Write) -> Result<u64, ConnectionError> {
        (**self).download(remote_path, local)
    }
}

impl<E: RemoteExecutor + ?Sized> RemoteExecutor for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(
        &self,
        command: &str,
        args: &[&str],
        working_dir: Option<&str>,
        sink: &mut dyn LineSink,
    ) -> Result<i32, ConnectionError> {
        (**self).run(command, args, working_dir, sink)
    }

    fn upload(&self, local: &mut dyn Read, remote_path: &str) -> Result<u64, ConnectionError> {
        (**self).upload(local, remote_path)
    }

    fn download(&self, remote_path: &str, local: &mut dyn Write) -> Result<u64, ConnectionError> {
        (**self).download(remote_path, local)
    }
}

/// Run a command and collect its output instead of streaming it.
pub fn run_captured(
    executor: &dyn RemoteExecutor,
    command: &str,
    args: &[&str],
) -> Result<(i32, CapturedOutput), ConnectionError> {
    let mut output = CapturedOutput::default();
    let code = executor.run(command, args, None, &mut output)?;
    Ok((code, output))
}

/// Spawn `cmd`, forward its stdout to `sink` line by line and return the exit
/// status together with whatever the process wrote to stderr.
pub(crate) fn spawn_streaming(
    mut cmd: Command,
    display: &str,
    sink: &mut dyn LineSink,
) -> Result<(ExitStatus, String), ConnectionError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ConnectionError::execution(display, err))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (forwarded, stderr_text) = std::thread::scope(|scope| {
        let errors = scope.spawn(move || read_lossy(stderr));
        let forwarded = match stdout {
            Some(out) => forward_lines(out, sink),
            None => Ok(()),
        };
        (forwarded, errors.join().unwrap_or_default())
    });

    if let Err(err) = forwarded {
        kill_quietly(&mut child);
        return Err(ConnectionError::execution(display, err));
    }

    let status = child
        .wait()
        .map_err(|err| ConnectionError::execution(display, err))?;
    Ok((status, stderr_text))
}

/// Spawn `cmd` and feed `input` to its stdin.
pub(crate) fn spawn_with_input(
    mut cmd: Command,
    display: &str,
    input: &mut dyn Read,
) -> Result<(ExitStatus, u64, String), ConnectionError> {
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ConnectionError::transfer(display, err))?;

    let stdin = child.stdin.take();
    let stderr = child.stderr.take();

    let (copied, stderr_text) = std::thread::scope(|scope| {
        let errors = scope.spawn(move || read_lossy(stderr));
        let copied = match stdin {
            // Dropping the handle at the end of the arm closes the pipe.
            Some(mut pipe) => std::io::copy(input, &mut pipe),
            None => Ok(0),
        };
        (copied, errors.join().unwrap_or_default())
    });

    let copied = match copied {
        Ok(n) => n,
        Err(err) => {
            kill_quietly(&mut child);
            return Err(ConnectionError::transfer(display, err));
        }
    };

    let status = child
        .wait()
        .map_err(|err| ConnectionError::transfer(display, err))?;
    Ok((status, copied, stderr_text))
}

/// Spawn `cmd` and copy its stdout into `output`.
pub(crate) fn spawn_with_output(
    mut cmd: Command,
    display: &str,
    output: &mut dyn Write,
) -> Result<(ExitStatus, u64, String), ConnectionError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| ConnectionError::transfer(display, err))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (copied, stderr_text) = std::thread::scope(|scope| {
        let errors = scope.spawn(move || read_lossy(stderr));
        let copied = match stdout {
            Some(mut pipe) => std::io::copy(&mut pipe, output),
            None => Ok(0),
        };
        (copied, errors.join().unwrap_or_default())
    });

    let copied = match copied {
        Ok(n) => n,
        Err(err) => {
            kill_quietly(&mut child);
            return Err(ConnectionError::transfer(display, err));
        }
    };

    let status = child
        .wait()
        .map_err(|err| ConnectionError::transfer(display, err))?;
    Ok((status, copied, stderr_text))
}

fn forward_lines(reader: impl Read, sink: &mut dyn LineSink) -> std::io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(['\n', '\r']);
        tracing::debug!(target: "rollout::remote", "{}", text);
        sink.line(text);
    }
}

fn read_lossy(reader: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        let _ = reader.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).trim().to_string()
}

fn kill_quietly(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
