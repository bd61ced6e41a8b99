//! Tool results

use thiserror::Error;

/// What went wrong inside a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    NotFound,
    PermissionDenied,
    MissingParentDirectory,
    OutOfSpace,
    IsDirectory,
    ReadOnlyFilesystem,
    Io,
    CommandFailed,
    CommandTimedOut,
    Network,
    Model,
}

/// A failed tool call
///
/// `message` is exactly what goes into the transcript.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ToolErrorKind::UnknownTool, format!("Error: Unknown tool: {}", name))
    }

    pub fn invalid_arguments(tool: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            ToolErrorKind::InvalidArguments,
            format!("Error: Invalid arguments for {}: {}", tool, detail),
        )
    }
}

/// Output of one tool call: text for the model either way
pub type ToolResult = std::result::Result<String, ToolError>;
