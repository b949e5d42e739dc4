//! Task-queue payloads and results
//!
//! A task arrives with either explicit `input_files` or a `pipe_result` from
//! the previous task in a workflow, whose output files become the inputs.
//! Results go back to the queue as base64-encoded JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WorkerError};
use crate::tools::STDOUT_FORMAT;

/// Task config key selecting the output format
pub const OUTPUT_FORMAT_KEY: &str = "output_format";
/// Task config key for the stdout capture extension
pub const EXTENSION_KEY: &str = "output_file_extension";
/// Task config key for the output data type label
pub const DATA_TYPE_KEY: &str = "output_data_type";
/// Extension used when none is configured
pub const DEFAULT_EXTENSION: &str = "txt";
/// Data type used when none is configured
pub const DEFAULT_DATA_TYPE: &str = "text_file";

/// A file handed to the task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    #[serde(default)]
    pub uuid: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl InputFile {
    /// Create an input from a path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            uuid: None,
            path: path.into(),
            display_name: None,
        }
    }

    /// Name to show in logs and reports
    pub fn display_name(&self) -> String {
        self.display_name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown_file".to_string())
        })
    }
}

/// A file produced by the task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub uuid: String,
    pub display_name: String,
    pub extension: String,
    pub data_type: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file_id: Option<String>,
}

impl From<OutputFile> for InputFile {
    fn from(output: OutputFile) -> Self {
        Self {
            uuid: Some(output.uuid),
            path: output.path,
            display_name: Some(output.display_name),
        }
    }
}

/// User arguments as either one whitespace-separated string or a list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Arguments {
    Line(String),
    List(Vec<String>),
}

/// User-supplied task configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig(BTreeMap<String, Value>);

impl TaskConfig {
    /// Create an empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a non-empty string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Selected output format, `stdout` by default
    pub fn output_format(&self) -> &str {
        self.get_str(OUTPUT_FORMAT_KEY).unwrap_or(STDOUT_FORMAT)
    }

    /// Configured stdout extension
    pub fn extension(&self) -> Option<&str> {
        self.get_str(EXTENSION_KEY)
    }

    /// Data type label for output files
    pub fn data_type(&self) -> &str {
        self.get_str(DATA_TYPE_KEY).unwrap_or(DEFAULT_DATA_TYPE)
    }

    /// User arguments stored under `key`
    pub fn arguments(&self, key: &str) -> Result<Vec<String>> {
        let Some(value) = self.0.get(key) else {
            return Ok(Vec::new());
        };
        if value.is_null() {
            return Ok(Vec::new());
        }
        let args: Arguments = serde_json::from_value(value.clone()).map_err(|_| {
            WorkerError::Payload(format!("'{}' must be a string or a list of strings", key))
        })?;
        Ok(match args {
            Arguments::Line(line) => line.split_whitespace().map(String::from).collect(),
            Arguments::List(list) => list,
        })
    }
}

/// Payload delivered by the task queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub pipe_result: Option<String>,
    #[serde(default)]
    pub input_files: Vec<InputFile>,
    pub output_path: PathBuf,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub task_config: TaskConfig,
}

impl TaskPayload {
    /// Create a payload for explicit inputs
    pub fn new(output_path: impl Into<PathBuf>, input_files: Vec<InputFile>) -> Self {
        Self {
            output_path: output_path.into(),
            input_files,
            ..Default::default()
        }
    }

    /// Set the task config
    pub fn with_config(mut self, task_config: TaskConfig) -> Self {
        self.task_config = task_config;
        self
    }

    /// Inputs to process: the previous task's outputs if piped, else `input_files`
    pub fn resolve_inputs(&self) -> Result<Vec<InputFile>> {
        match self.pipe_result.as_deref().filter(|p| !p.is_empty()) {
            Some(encoded) => {
                let previous = TaskResult::decode(encoded)?;
                Ok(previous.output_files.into_iter().map(InputFile::from).collect())
            }
            None => Ok(self.input_files.clone()),
        }
    }

    /// Output directory
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Result returned to the task queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub output_files: Vec<OutputFile>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub meta: serde_json::Map<String, Value>,
    #[serde(default)]
    pub file_reports: Vec<Value>,
    #[serde(default)]
    pub task_report: Option<Value>,
}

impl TaskResult {
    /// Encode as base64 JSON
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode from base64 JSON
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
