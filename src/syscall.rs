// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.
//!
//! Pushing branches and opening pull requests is left to the `git` and `gh`
//! binaries the user already has configured, so credentials, SSH agents,
//! and host aliases behave exactly like they do in the user's own shell.

use std::{
    ffi::{OsStr, OsString},
    io::ErrorKind,
    path::Path,
    process::Command,
};
use tracing::{debug, instrument};

/// Output of a successful external process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    /// Standard output with trailing newlines chomped.
    pub stdout: String,

    /// Standard error with trailing newlines chomped.
    pub stderr: String,
}

/// Run external process to completion and capture its output.
///
/// # Errors
///
/// - Return [`ToolError::NotFound`] if program is not installed.
/// - Return [`ToolError::Spawn`] if program cannot be started otherwise.
/// - Return [`ToolError::Failed`] if program exits unsuccessfully.
#[instrument(skip(args, cwd), level = "debug")]
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr> + std::fmt::Debug,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: Option<&Path>,
) -> Result<Output> {
    let program = cmd.as_ref().to_os_string();
    let mut command = Command::new(&program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    debug!("run {command:?}");
    let output = command.output().map_err(|err| match err.kind() {
        ErrorKind::NotFound => ToolError::NotFound {
            program: program.clone(),
        },
        _ => ToolError::Spawn {
            source: err,
            program: program.clone(),
        },
    })?;

    let stdout = chomp(String::from_utf8_lossy(output.stdout.as_slice()).into_owned());
    let stderr = chomp(String::from_utf8_lossy(output.stderr.as_slice()).into_owned());

    if !output.status.success() {
        let mut message = String::new();
        if !stdout.is_empty() {
            message.push_str(format!("\nstdout: {stdout}").as_str());
        }

        if !stderr.is_empty() {
            message.push_str(format!("\nstderr: {stderr}").as_str());
        }

        return Err(ToolError::Failed {
            program,
            status: output.status.code(),
            message,
        });
    }

    Ok(Output { stdout, stderr })
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// External process error types.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Program is not installed, or not on `PATH`.
    #[error("command {program:?} not found")]
    NotFound { program: OsString },

    /// Program could not be started.
    #[error("failed to run command {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Program ran but exited unsuccessfully.
    #[error("command {program:?} failed with {}{message}", describe_status(.status))]
    Failed {
        program: OsString,
        status: Option<i32>,
        message: String,
    },
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "no exit status".into(), |code| format!("exit status {code}"))
}

/// Friendly result alias :3
type Result<T, E = ToolError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_program_is_not_found() {
        let result = syscall_non_interactive("renovate-preset-no-such-binary", ["--version"], None);
        assert!(matches!(result, Err(ToolError::NotFound { .. })));
    }

    #[test]
    fn trailing_newlines_are_chomped() {
        assert_eq!(chomp("done\n".into()), "done");
        assert_eq!(chomp("done\r\n".into()), "done");
        assert_eq!(chomp("done".into()), "done");
    }

    #[cfg(unix)]
    #[test]
    fn failure_keeps_process_output() {
        let result = syscall_non_interactive("sh", ["-c", "echo oops >&2; exit 3"], None);
        match result {
            Err(ToolError::Failed {
                status, message, ..
            }) => {
                assert_eq!(status, Some(3));
                assert_eq!(message, "\nstderr: oops");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn success_captures_stdout_in_working_directory() -> anyhow::Result<()> {
        let cwd = std::env::temp_dir();
        let result = syscall_non_interactive("sh", ["-c", "echo hello"], Some(cwd.as_path()))?;
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.stderr, "");

        Ok(())
    }
}
