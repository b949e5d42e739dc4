//! Invocation requests
//!
//! One request describes one run of one tool against one input.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::task::{DEFAULT_DATA_TYPE, DEFAULT_EXTENSION};
use crate::tools::STDOUT_FORMAT;

/// Input to a single dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Path of the artifact to parse
    pub input: PathBuf,
    /// Original file name, when the stored input is named differently
    #[serde(default)]
    pub source_name: Option<String>,
    /// Tool id or task name
    pub tool: String,
    /// Opaque user arguments, passed through in order
    #[serde(default)]
    pub arguments: Vec<String>,
    /// `stdout` or one of the tool's own formats
    #[serde(default = "default_format")]
    pub output_format: String,
    /// Extension of the captured stdout file
    #[serde(default)]
    pub extension: Option<String>,
    /// Data type label attached to the output file
    #[serde(default)]
    pub data_type: Option<String>,
    /// Directory receiving the output file
    pub output_dir: PathBuf,
}

fn default_format() -> String {
    STDOUT_FORMAT.to_string()
}

impl InvocationRequest {
    /// Create a stdout-capturing request with no extra arguments
    pub fn new(tool: impl Into<String>, input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            source_name: None,
            tool: tool.into(),
            arguments: Vec::new(),
            output_format: default_format(),
            extension: None,
            data_type: None,
            output_dir: output_dir.into(),
        }
    }

    /// Set the original file name used for output naming
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Set user arguments
    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Select an output format
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    /// Set the output extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Set the output data type label
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Whether stdout is the output
    pub fn captures_stdout(&self) -> bool {
        self.output_format == STDOUT_FORMAT
    }

    /// Extension for stdout capture, without a leading dot
    pub fn stdout_extension(&self) -> &str {
        self.extension
            .as_deref()
            .map(|e| e.trim_start_matches('.'))
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// Data type label for the output file
    pub fn output_data_type(&self) -> &str {
        self.data_type.as_deref().unwrap_or(DEFAULT_DATA_TYPE)
    }

    /// The input path
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Name the output file is derived from
    pub fn naming_source(&self) -> &Path {
        self.source_name
            .as_deref()
            .map(Path::new)
            .unwrap_or(self.input.as_path())
    }
}
