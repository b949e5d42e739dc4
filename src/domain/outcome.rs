//! Invocation results
//!
//! InvocationResult records what happened to one dispatch: the command that
//! ran, how it exited, and either the output file or a diagnostic.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WorkerError};
use crate::id::generate_invocation_id;

/// Status of an invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    /// Created, not yet finished
    Pending,
    /// Tool exited 0 and the output file was written
    Success,
    /// Anything else
    Failed,
}

impl InvocationStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Output file written by a successful invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapturedOutput {
    pub path: PathBuf,
    pub extension: String,
    /// Data type label carried to the task output
    pub data_type: String,
    pub size_bytes: u64,
    pub sha256: String,
}

impl CapturedOutput {
    /// File name of the output
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of a single dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub id: String,
    pub tool: String,
    pub input: PathBuf,
    pub status: InvocationStatus,
    /// Full argument vector, program first; empty if nothing was launched
    #[serde(default)]
    pub command: Vec<String>,
    pub exit_code: Option<i32>,
    pub output: Option<CapturedOutput>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl InvocationResult {
    /// Create a pending result
    pub fn new(tool: &str, input: &Path) -> Self {
        Self {
            id: generate_invocation_id(tool),
            tool: tool.to_string(),
            input: input.to_path_buf(),
            status: InvocationStatus::Pending,
            command: Vec::new(),
            exit_code: None,
            output: None,
            error_kind: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// Mark as successfully completed
    pub fn mark_success(&mut self, output: CapturedOutput, duration_ms: u64) {
        self.status = InvocationStatus::Success;
        self.output = Some(output);
        self.error_kind = None;
        self.error = None;
        self.duration_ms = duration_ms;
        self.finished_at = Some(Utc::now());
    }

    /// Mark as failed
    pub fn mark_failed(&mut self, err: &WorkerError, duration_ms: u64) {
        self.status = InvocationStatus::Failed;
        self.output = None;
        self.error_kind = Some(err.kind());
        self.error = Some(err.to_string());
        self.duration_ms = duration_ms;
        self.finished_at = Some(Utc::now());
    }

    /// Check if the invocation succeeded
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    /// Whether a process was started
    pub fn launched(&self) -> bool {
        !self.command.is_empty()
    }

    /// Path of the output file, if any
    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_ref().map(|o| o.path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> CapturedOutput {
        CapturedOutput {
            path: PathBuf::from("/out/sample_lecmd.csv"),
            extension: "csv".to_string(),
            data_type: "eztools:lecmd:csv".to_string(),
            size_bytes: 5,
            sha256: "abc".to_string(),
        }
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!InvocationStatus::Pending.is_terminal());
        assert!(InvocationStatus::Success.is_terminal());
        assert!(InvocationStatus::Failed.is_terminal());
    }

    #[test]
    fn test_result_new() {
        let result = InvocationResult::new("lecmd", Path::new("sample.lnk"));
        assert!(result.id.starts_with("inv-lecmd-"));
        assert_eq!(result.status, InvocationStatus::Pending);
        assert!(!result.launched());
        assert!(result.output_path().is_none());
        assert!(result.finished_at.is_none());
    }

    #[test]
    fn test_mark_success() {
        let mut result = InvocationResult::new("lecmd", Path::new("sample.lnk"));
        result.mark_success(sample_output(), 42);

        assert!(result.is_success());
        assert_eq!(result.output_path(), Some(Path::new("/out/sample_lecmd.csv")));
        assert_eq!(result.output.as_ref().unwrap().file_name(), "sample_lecmd.csv");
        assert_eq!(result.duration_ms, 42);
        assert!(result.finished_at.is_some());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_mark_failed() {
        let mut result = InvocationResult::new("unknown_tool", Path::new("sample.lnk"));
        result.mark_failed(&WorkerError::UnknownTool("unknown_tool".into()), 1);

        assert!(!result.is_success());
        assert_eq!(result.status, InvocationStatus::Failed);
        assert_eq!(result.error_kind, Some(ErrorKind::Configuration));
        assert_eq!(result.error.as_deref(), Some("Unknown tool: unknown_tool"));
        assert!(result.output.is_none());
    }

    #[test]
    fn test_result_serialization() {
        let mut result = InvocationResult::new("rbcmd", Path::new("$I123.txt"));
        result.mark_success(sample_output(), 10);

        let json = serde_json::to_string(&result).expect("serialize");
        let restored: InvocationResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.id, result.id);
        assert_eq!(restored.status, InvocationStatus::Success);
        assert_eq!(restored.output, result.output);
    }
}
