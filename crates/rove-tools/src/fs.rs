//! read_file and write_file
//!
//! Relative paths resolve against the task's working directory; absolute
//! paths are used as given.

use std::io;
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{ToolError, ToolErrorKind, ToolResult};
use crate::output::{truncate_output, MAX_OUTPUT_BYTES};

// errno values shared by Linux and macOS
const EISDIR: i32 = 21;
const ENOSPC: i32 = 28;
const EROFS: i32 = 30;

pub fn resolve(working_dir: &Path, path: &str) -> PathBuf {
    working_dir.join(path)
}

#[instrument(skip(working_dir))]
pub async fn read_file(working_dir: &Path, path: &str) -> ToolResult {
    let full = resolve(working_dir, path);
    match tokio::fs::read(&full).await {
        Ok(bytes) => {
            tracing::debug!("Read {} bytes from {}", bytes.len(), full.display());
            Ok(truncate_output(&String::from_utf8_lossy(&bytes), MAX_OUTPUT_BYTES))
        }
        Err(e) => Err(read_error(path, &e)),
    }
}

#[instrument(skip(working_dir, content), fields(bytes = content.len()))]
pub async fn write_file(working_dir: &Path, path: &str, content: &str) -> ToolResult {
    let full = resolve(working_dir, path);
    match tokio::fs::write(&full, content.as_bytes()).await {
        Ok(()) => Ok(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            path
        )),
        Err(e) => Err(write_error(path, &e)),
    }
}

/// Describe a failed read
pub fn read_error(path: &str, err: &io::Error) -> ToolError {
    match (err.kind(), err.raw_os_error()) {
        (io::ErrorKind::NotFound, _) => {
            ToolError::new(ToolErrorKind::NotFound, format!("Error: File not found: {}", path))
        }
        (io::ErrorKind::PermissionDenied, _) => ToolError::new(
            ToolErrorKind::PermissionDenied,
            format!("Error: Permission denied reading {}", path),
        ),
        (_, Some(EISDIR)) => ToolError::new(
            ToolErrorKind::IsDirectory,
            format!("Error: {} is a directory, not a file", path),
        ),
        _ => ToolError::new(
            ToolErrorKind::Io,
            format!("Error: Failed to read {}: {}", path, err),
        ),
    }
}

/// Describe a failed write
pub fn write_error(path: &str, err: &io::Error) -> ToolError {
    match (err.kind(), err.raw_os_error()) {
        (io::ErrorKind::NotFound, _) => ToolError::new(
            ToolErrorKind::MissingParentDirectory,
            format!("Error: Directory does not exist for {}", path),
        ),
        (io::ErrorKind::PermissionDenied, _) => ToolError::new(
            ToolErrorKind::PermissionDenied,
            format!("Error: Permission denied writing {}", path),
        ),
        (_, Some(ENOSPC)) => ToolError::new(
            ToolErrorKind::OutOfSpace,
            format!("Error: No space left on device writing {}", path),
        ),
        (_, Some(EISDIR)) => ToolError::new(
            ToolErrorKind::IsDirectory,
            format!("Error: {} is a directory, not a file", path),
        ),
        (_, Some(EROFS)) => ToolError::new(
            ToolErrorKind::ReadOnlyFilesystem,
            format!("Error: Read-only file system, cannot write {}", path),
        ),
        _ => ToolError::new(
            ToolErrorKind::Io,
            format!("Error: Failed to write {}: {}", path, err),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_relative_to_working_dir() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_file(dir.path(), "notes.txt", "hello rove").await.unwrap();
        assert_eq!(written, "Successfully wrote 10 bytes to notes.txt");

        let read = read_file(dir.path(), "notes.txt").await.unwrap();
        assert_eq!(read, "hello rove");
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(dir.path(), "nope.txt").await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::NotFound);
        assert_eq!(err.message, "Error: File not found: nope.txt");
    }

    #[tokio::test]
    async fn test_write_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_file(dir.path(), "missing/dir/file.txt", "x").await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::MissingParentDirectory);
        assert!(err.message.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_write_onto_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err = write_file(dir.path(), "sub", "x").await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::IsDirectory);
    }

    #[tokio::test]
    async fn test_read_large_file_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(MAX_OUTPUT_BYTES + 10)).unwrap();
        let read = read_file(dir.path(), "big.txt").await.unwrap();
        assert!(read.contains("10 bytes omitted"));
    }

    #[test]
    fn test_permission_denied_message() {
        let err = write_error(
            "/root/forbidden.txt",
            &io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.kind, ToolErrorKind::PermissionDenied);
        assert!(err.message.starts_with("Error: Permission denied"));

        let err = read_error("secret", &io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(err.message.starts_with("Error: Permission denied"));
    }

    #[test]
    fn test_errno_classification() {
        let err = write_error("f", &io::Error::from_raw_os_error(ENOSPC));
        assert_eq!(err.kind, ToolErrorKind::OutOfSpace);

        let err = write_error("f", &io::Error::from_raw_os_error(EROFS));
        assert_eq!(err.kind, ToolErrorKind::ReadOnlyFilesystem);

        let err = write_error("f", &io::Error::new(io::ErrorKind::Other, "weird"));
        assert_eq!(err.kind, ToolErrorKind::Io);
        assert!(err.message.contains("weird"));
    }
}
