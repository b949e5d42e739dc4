//! Error types for the EZTools worker
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failure, reported back to the task queue
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Unknown tool, missing executable or runtime, bad task configuration
    Configuration,
    /// The child process could not be launched, failed or timed out
    Execution,
    /// Input could not be read or output could not be written
    Io,
}

/// All error types that can occur in the worker
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Tool identifier not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool executable or runtime launcher is not installed
    #[error("Tool '{tool}' is unavailable: {} not found", .path.display())]
    ToolUnavailable { tool: String, path: PathBuf },

    /// Tool catalog or descriptor could not be parsed
    #[error("Invalid tool definition: {0}")]
    InvalidDefinition(String),

    /// Requested output format is not supported by the tool
    #[error("Unsupported output format '{format}' for tool '{tool}'")]
    UnsupportedFormat { tool: String, format: String },

    /// Input path does not exist
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input path exists but cannot be read
    #[error("Input file not readable: {}: {reason}", .path.display())]
    InputUnreadable { path: PathBuf, reason: String },

    /// Child process could not be spawned
    #[error("Failed to launch {tool}: {reason}")]
    Launch { tool: String, reason: String },

    /// Child process exited unsuccessfully
    #[error("{tool} exited with {status}: {diagnostic}")]
    ToolFailed {
        tool: String,
        status: String,
        diagnostic: String,
    },

    /// Child process exceeded the configured timeout
    #[error("{tool} timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// Tool ran but did not write the file it was asked to write
    #[error("{tool} did not produce the expected '{format}' file (pattern: '{pattern}')")]
    NoOutputProduced {
        tool: String,
        format: String,
        pattern: String,
    },

    /// Output name already taken and the policy forbids replacing it
    #[error("Output file already exists: {}", .0.display())]
    OutputCollision(PathBuf),

    /// Output could not be persisted
    #[error("Failed to write output {}: {reason}", .path.display())]
    OutputWrite { path: PathBuf, reason: String },

    /// Task had nothing to process
    #[error("No input files provided to {0}")]
    NoInputs(String),

    /// Task payload is malformed
    #[error("Invalid task payload: {0}")]
    Payload(String),

    /// Task produced nothing usable
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl WorkerError {
    /// Classify this error for reporting
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_)
            | Self::ToolUnavailable { .. }
            | Self::InvalidDefinition(_)
            | Self::UnsupportedFormat { .. }
            | Self::NoInputs(_)
            | Self::Payload(_)
            | Self::Json(_)
            | Self::Base64(_) => ErrorKind::Configuration,
            Self::Launch { .. }
            | Self::ToolFailed { .. }
            | Self::Timeout { .. }
            | Self::NoOutputProduced { .. }
            | Self::TaskFailed(_) => ErrorKind::Execution,
            Self::InputNotFound(_)
            | Self::InputUnreadable { .. }
            | Self::OutputCollision(_)
            | Self::OutputWrite { .. }
            | Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_error() {
        let err = WorkerError::UnknownTool("unknown_tool".to_string());
        assert_eq!(err.to_string(), "Unknown tool: unknown_tool");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_tool_unavailable_error() {
        let err = WorkerError::ToolUnavailable {
            tool: "lecmd".to_string(),
            path: PathBuf::from("/opt/LECmd.dll"),
        };
        assert_eq!(err.to_string(), "Tool 'lecmd' is unavailable: /opt/LECmd.dll not found");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_input_not_found_error() {
        let err = WorkerError::InputNotFound(PathBuf::from("missing.lnk"));
        assert_eq!(err.to_string(), "Input file not found: missing.lnk");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_tool_failed_error() {
        let err = WorkerError::ToolFailed {
            tool: "LECmd".to_string(),
            status: "exit code 2".to_string(),
            diagnostic: "bad header".to_string(),
        };
        assert_eq!(err.to_string(), "LECmd exited with exit code 2: bad header");
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_timeout_error() {
        let err = WorkerError::Timeout {
            tool: "RBCmd".to_string(),
            timeout_ms: 500,
        };
        assert_eq!(err.to_string(), "RBCmd timed out after 500ms");
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WorkerError = io_err.into();
        assert!(matches!(err, WorkerError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: WorkerError = json_err.into();
        assert!(matches!(err, WorkerError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_kind_serialization() {
        assert_eq!(serde_json::to_string(&ErrorKind::Configuration).unwrap(), "\"configuration\"");
        assert_eq!(serde_json::to_string(&ErrorKind::Io).unwrap(), "\"io\"");
    }
}
