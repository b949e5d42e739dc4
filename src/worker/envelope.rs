//! Line protocol between the queue bridge and the worker pool
//!
//! Each input line is one TaskEnvelope; each output line is one TaskOutcome.

use serde::{Deserialize, Serialize};

use crate::domain::TaskPayload;
use crate::error::{ErrorKind, WorkerError};

/// Task name reported when a line could not be parsed
pub const MALFORMED_TASK: &str = "<malformed>";

/// One queued task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: String,
    pub task_name: String,
    pub payload: TaskPayload,
}

impl TaskEnvelope {
    /// Create an envelope
    pub fn new(id: impl Into<String>, task_name: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            id: id.into(),
            task_name: task_name.into(),
            payload,
        }
    }
}

/// Terminal state of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failure,
}

/// Reply for one task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: String,
    pub task_name: String,
    pub status: TaskStatus,
    /// Base64-encoded TaskResult
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl TaskOutcome {
    /// Successful outcome carrying an encoded result
    pub fn success(id: impl Into<String>, task_name: impl Into<String>, result: String) -> Self {
        Self {
            id: id.into(),
            task_name: task_name.into(),
            status: TaskStatus::Success,
            result: Some(result),
            error: None,
            error_kind: None,
        }
    }

    /// Failed outcome
    pub fn failure(id: impl Into<String>, task_name: impl Into<String>, err: &WorkerError) -> Self {
        Self {
            id: id.into(),
            task_name: task_name.into(),
            status: TaskStatus::Failure,
            result: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    /// Outcome for an input line that is not a valid envelope
    pub fn malformed(line: &str, reason: impl std::fmt::Display) -> Self {
        // Salvage the id when the line is JSON but the envelope is incomplete
        let id = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(String::from))
            .unwrap_or_default();
        Self::failure(
            id,
            MALFORMED_TASK,
            &WorkerError::Payload(format!("Malformed task envelope: {}", reason)),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
