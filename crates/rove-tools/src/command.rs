//! run_command
//!
//! Commands run through the platform shell in the working directory with a
//! hard wall-clock limit. A command that outlives the limit is killed.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::instrument;

use crate::error::{ToolError, ToolErrorKind, ToolResult};
use crate::output::{truncate_output, MAX_OUTPUT_BYTES};

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[instrument(skip(working_dir, timeout), fields(timeout_ms = timeout.as_millis() as u64))]
pub async fn run_command(working_dir: &Path, command: &str, timeout: Duration) -> ToolResult {
    let child = shell_command(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            ToolError::new(
                ToolErrorKind::Io,
                format!("Error: Failed to start command: {}", e),
            )
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(ToolError::new(
                ToolErrorKind::Io,
                format!("Error: Failed to run command: {}", e),
            ))
        }
        Err(_) => {
            tracing::warn!("Command timed out after {}ms", timeout.as_millis());
            return Err(ToolError::new(
                ToolErrorKind::CommandTimedOut,
                format!(
                    "Command timed out after {}ms: {}",
                    timeout.as_millis(),
                    command
                ),
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        let mut text = stdout.to_string();
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str("STDERR:\n");
            text.push_str(&stderr);
        }
        if text.trim().is_empty() {
            text = "Command completed successfully with no output".to_string();
        }
        return Ok(truncate_output(&text, MAX_OUTPUT_BYTES));
    }

    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown (terminated by signal)".to_string());
    tracing::debug!("Command exited with code {}", code);

    Err(ToolError::new(
        ToolErrorKind::CommandFailed,
        truncate_output(
            &format!(
                "Command failed with exit code {}\nSTDOUT:\n{}\nSTDERR:\n{}",
                code, stdout, stderr
            ),
            MAX_OUTPUT_BYTES,
        ),
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_secs(120);

    #[tokio::test]
    async fn test_stdout_returned() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command(dir.path(), "echo hello", LIMIT).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found me").unwrap();
        let out = run_command(dir.path(), "cat marker.txt", LIMIT).await.unwrap();
        assert_eq!(out, "found me");
    }

    #[tokio::test]
    async fn test_stderr_is_labelled() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command(dir.path(), "echo out; echo oops 1>&2", LIMIT)
            .await
            .unwrap();
        assert_eq!(out, "out\nSTDERR:\noops\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_command(dir.path(), "exit 1", LIMIT).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::CommandFailed);
        assert!(err.message.contains("Command failed with exit code 1"));
        assert!(err.message.contains("STDOUT:\n\nSTDERR:"));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let started = std::time::Instant::now();
        let err = run_command(dir.path(), "sleep 5", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::CommandTimedOut);
        assert!(err.message.starts_with("Command timed out after 100ms"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command(dir.path(), "true", LIMIT).await.unwrap();
        assert_eq!(out, "Command completed successfully with no output");
    }
}
