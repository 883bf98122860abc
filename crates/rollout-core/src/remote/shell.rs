//! POSIX shell quoting for remote command lines.

/// Quote `s` so a POSIX shell reads it back as a single word.
pub fn shell_escape(s: &str) -> String {
    // Single quotes disable every expansion; embedded quotes are closed,
    // escaped and reopened.
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Build the line a remote shell will execute.
///
/// `command` is used verbatim so shell snippets and builtins work; every
/// argument is escaped on its own.
pub fn command_line(command: &str, args: &[&str], working_dir: Option<&str>) -> String {
    let mut line = String::new();
    if let Some(dir) = working_dir {
        line.push_str("cd ");
        line.push_str(&shell_escape(dir));
        line.push_str(" && ");
    }
    line.push_str(command);
    for arg in args {
        line.push(' ');
        line.push_str(&shell_escape(arg));
    }
    line
}

/// Wrap a command line so stderr is merged into stdout and the exit status
/// of the line is preserved.
pub(crate) fn merged_output(line: &str) -> String {
    format!("( {line} ) 2>&1")
}
