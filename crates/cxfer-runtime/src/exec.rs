//! Running backend commands with binary-safe stdin and stdout.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use cxfer_common::error::{CxferError, Result};

/// Output from a backend command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Raw standard output.
    pub stdout: Vec<u8>,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Exit code returned by the command (`-1` if killed by a signal).
    pub exit_code: i32,
}

impl ExecOutput {
    /// Returns whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns stdout decoded as UTF-8 with surrounding whitespace removed.
    #[must_use]
    pub fn stdout_trimmed(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// Runs `program` with `args`, streaming `stdin` to it in full.
///
/// Stdin is written from a separate thread while stdout and stderr are
/// drained, so payloads larger than a pipe buffer cannot deadlock. A child
/// that exits before consuming its input is not an error here; its exit
/// status and stderr describe the failure.
///
/// # Errors
///
/// Returns an error if the program cannot be spawned or waited on, or if
/// writing stdin fails for a reason other than the child closing the pipe.
pub fn run(program: &Path, args: &[String], stdin: Option<&[u8]>) -> Result<ExecOutput> {
    tracing::debug!(program = %program.display(), ?args, stdin_bytes = ?stdin.map(<[u8]>::len), "running command");

    let io_err = |source| CxferError::Io {
        path: program.to_path_buf(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(io_err)?;

    let pipe = child.stdin.take();
    let (output, written) = std::thread::scope(|scope| {
        let writer = pipe.map(|mut pipe| {
            let data = stdin.unwrap_or_default();
            scope.spawn(move || pipe.write_all(data))
        });
        let output = child.wait_with_output();
        let written = writer.map(std::thread::ScopedJoinHandle::join);
        (output, written)
    });
    let output = output.map_err(io_err)?;

    match written {
        Some(Err(_)) => {
            return Err(CxferError::Backend {
                command: program.display().to_string(),
                message: "stdin writer panicked".into(),
            });
        }
        Some(Ok(Err(e))) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(io_err(e)),
        _ => {}
    }

    Ok(ExecOutput {
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn stdin_is_streamed_in_full() {
        let payload = vec![b'0'; 1024 * 1024];
        let out = run(Path::new("/bin/sh"), &sh("cat"), Some(&payload)).expect("run");
        assert!(out.success());
        assert_eq!(out.stdout.len(), payload.len());
        assert_eq!(out.stdout, payload);
    }

    #[test]
    fn early_exit_is_reported_through_status() {
        let payload = vec![b'x'; 1024 * 1024];
        let out = run(
            Path::new("/bin/sh"),
            &sh("echo nope >&2; exit 3"),
            Some(&payload),
        )
        .expect("run");
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim_end(), "nope");
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let result = run(Path::new("/nonexistent/cxfer-test-binary"), &[], None);
        assert!(matches!(result, Err(CxferError::Io { .. })));
    }

    #[test]
    fn stdout_trimmed_strips_newline() {
        let out = run(Path::new("/bin/sh"), &sh("echo running"), None).expect("run");
        assert_eq!(out.stdout_trimmed(), "running");
    }
}
