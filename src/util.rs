//! Helpers shared by sources that read sysfs or shell out to diagnostic tools.
//!
//! sysfs is not fragile the way the switchd fuse is, so these readers go
//! straight to the filesystem without a [`ResourceGuard`](crate::ResourceGuard).

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::process::Command;

use crate::guard::{ReadError, parse_reading};

/// Failure running an external diagnostic command.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be started.
    #[error("could not execute '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully.
    #[error("executing '{command}' failed ({status}), stderr reads: {stderr}")]
    Exit {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Read a whole sysfs file as a number.
pub async fn read_f64(path: impl Into<PathBuf>) -> Result<f64, ReadError> {
    let path = path.into();
    match tokio::fs::read(&path).await {
        Ok(raw) => parse_reading(path, &raw),
        Err(source) => Err(ReadError::Read { path, source }),
    }
}

/// Read a whole sysfs file as text without its trailing newline.
pub async fn read_string(path: impl AsRef<Path>) -> std::io::Result<String> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(text.strip_suffix('\n').unwrap_or(&text).to_string())
}

/// Run `program args..` and return its stdout.
///
/// The child is killed if the returned future is dropped, so a poll deadline
/// never leaves a stuck diagnostic process behind.
pub async fn run_tool<I, S>(program: &Path, args: I) -> Result<Vec<u8>, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let command = describe_command(program, &args);
    tracing::debug!(command = %command, "Executing diagnostic command");

    let output = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(ToolError::Exit {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

fn describe_command<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(AsRef::as_ref))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_f64_sysfs_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp1_input");
        std::fs::write(&path, "45500\n").unwrap();

        assert_eq!(read_f64(&path).await.unwrap(), 45500.0);
    }

    #[tokio::test]
    async fn test_read_f64_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_f64(dir.path().join("absent")).await.unwrap_err();
        assert!(err.to_string().contains("absent"));
    }

    #[tokio::test]
    async fn test_read_string_strips_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp1_label");
        std::fs::write(&path, "Board Temp\n").unwrap();

        assert_eq!(read_string(&path).await.unwrap(), "Board Temp");
    }

    #[tokio::test]
    async fn test_run_tool_stdout() {
        let out = run_tool(Path::new("/bin/sh"), ["-c", "printf hello"]).await.unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit() {
        let err = run_tool(Path::new("/bin/sh"), ["-c", "echo broken >&2; exit 3"])
            .await
            .unwrap_err();
        match err {
            ToolError::Exit { command, stderr, .. } => {
                assert!(command.starts_with("/bin/sh -c"));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected exit error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let err = run_tool(Path::new("/nonexistent/mstpctl"), ["showportdetail"])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
