//! Tool descriptors and output format definitions
//!
//! A descriptor carries everything needed to launch one wrapped EZTool.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerError};

/// Name of the output mode that captures the tool's standard output
pub const STDOUT_FORMAT: &str = "stdout";

/// Where a tool-managed output format writes its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    /// The flag takes a directory and the tool names the file itself
    Directory,
    /// The flag takes a full file path chosen by the worker
    #[default]
    #[serde(alias = "directory_with_filename")]
    File,
}

/// A format the tool can write on its own when given a flag (e.g. `--csv <dir>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    /// Flag that enables the format
    pub flag: String,
    /// Glob used to find the generated file
    #[serde(default)]
    pub pattern: Option<String>,
    /// What the flag's value points at
    #[serde(default)]
    pub target: OutputTarget,
    /// Extension of the final output file, defaults to the format name
    #[serde(default)]
    pub extension: Option<String>,
}

impl FormatSpec {
    /// Create a format whose flag takes a directory
    pub fn directory(flag: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            pattern: Some(pattern.into()),
            target: OutputTarget::Directory,
            extension: None,
        }
    }

    /// Create a format whose flag takes a file path
    pub fn file(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            pattern: None,
            target: OutputTarget::File,
            extension: None,
        }
    }

    /// Set the output extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Extension to use for the final output file
    pub fn extension_for<'a>(&'a self, format_name: &'a str) -> &'a str {
        self.extension.as_deref().unwrap_or(format_name)
    }
}

/// Static description of one wrapped executable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Short identifier, also used as the output file suffix (e.g. "lecmd")
    pub id: String,
    /// Human-readable name (e.g. "LECmd")
    pub display_name: String,
    /// Task name used to route queue messages to this tool
    pub task_name: String,
    /// Description shown at task registration
    #[serde(default)]
    pub description: String,
    /// Runtime launcher, for tools that need one (e.g. `/usr/bin/dotnet`)
    #[serde(default)]
    pub runtime: Option<PathBuf>,
    /// Path to the tool itself
    pub executable: PathBuf,
    /// Flags always passed before user arguments
    #[serde(default)]
    pub fixed_flags: Vec<String>,
    /// Flag that precedes the input path (e.g. "-f")
    #[serde(default)]
    pub input_flag: Option<String>,
    /// Task config key holding user arguments for this tool
    #[serde(default)]
    pub arguments_key: Option<String>,
    /// Tool-managed output formats by name
    #[serde(default)]
    pub formats: BTreeMap<String, FormatSpec>,
}

impl ToolDescriptor {
    /// Create a new descriptor with no runtime, flags, or formats
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        let id = id.into();
        Self {
            task_name: format!("{}.{}", crate::TASK_NAME_PREFIX, id),
            id,
            display_name: display_name.into(),
            description: String::new(),
            runtime: None,
            executable: executable.into(),
            fixed_flags: Vec::new(),
            input_flag: None,
            arguments_key: None,
            formats: BTreeMap::new(),
        }
    }

    /// Set the runtime launcher
    pub fn with_runtime(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.runtime = Some(runtime.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the task name
    pub fn with_task_name(mut self, task_name: impl Into<String>) -> Self {
        self.task_name = task_name.into();
        self
    }

    /// Append a fixed flag
    pub fn with_fixed_flag(mut self, flag: impl Into<String>) -> Self {
        self.fixed_flags.push(flag.into());
        self
    }

    /// Set the flag preceding the input path
    pub fn with_input_flag(mut self, flag: impl Into<String>) -> Self {
        self.input_flag = Some(flag.into());
        self
    }

    /// Set the task config key for user arguments
    pub fn with_arguments_key(mut self, key: impl Into<String>) -> Self {
        self.arguments_key = Some(key.into());
        self
    }

    /// Register a tool-managed output format
    pub fn with_format(mut self, name: impl Into<String>, spec: FormatSpec) -> Self {
        self.formats.insert(name.into(), spec);
        self
    }

    /// Suffix used in output file names
    pub fn output_suffix(&self) -> &str {
        &self.id
    }

    /// Look up a tool-managed format
    pub fn format(&self, name: &str) -> Option<&FormatSpec> {
        self.formats.get(name)
    }

    /// All selectable output formats, `stdout` first
    pub fn supported_formats(&self) -> Vec<&str> {
        std::iter::once(STDOUT_FORMAT)
            .chain(self.formats.keys().map(String::as_str))
            .collect()
    }

    /// Runtime (if any) followed by the executable
    ///
    /// Relative paths are resolved against the worker's working directory,
    /// since the child runs elsewhere. Bare names are left to the PATH lookup.
    pub fn base_command(&self) -> Vec<String> {
        self.runtime
            .iter()
            .chain(std::iter::once(&self.executable))
            .map(|p| launch_path(p).to_string_lossy().into_owned())
            .collect()
    }

    /// Check that the runtime and executable are installed
    pub fn ensure_available(&self) -> Result<()> {
        for path in self.runtime.iter().chain(std::iter::once(&self.executable)) {
            if locate(path).is_none() {
                return Err(WorkerError::ToolUnavailable {
                    tool: self.id.clone(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether `ensure_available` would succeed
    pub fn is_available(&self) -> bool {
        self.ensure_available().is_ok()
    }

    /// Validate the descriptor's own fields
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(WorkerError::InvalidDefinition("tool id must not be empty".into()));
        }
        if self.id.contains(['/', '\\']) {
            return Err(WorkerError::InvalidDefinition(format!(
                "tool id '{}' must not contain path separators",
                self.id
            )));
        }
        if self.executable.as_os_str().is_empty() {
            return Err(WorkerError::InvalidDefinition(format!(
                "tool '{}' has no executable",
                self.id
            )));
        }
        if self.formats.contains_key(STDOUT_FORMAT) {
            return Err(WorkerError::InvalidDefinition(format!(
                "tool '{}' redefines the reserved '{}' format",
                self.id, STDOUT_FORMAT
            )));
        }
        for (name, spec) in &self.formats {
            if spec.target == OutputTarget::Directory && spec.pattern.is_none() {
                return Err(WorkerError::InvalidDefinition(format!(
                    "format '{}' of tool '{}' writes to a directory but has no pattern",
                    name, self.id
                )));
            }
        }
        Ok(())
    }
}

/// Make a relative path with a directory component absolute
pub fn launch_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.components().count() < 2 {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolve a path to an existing file, searching PATH for bare names
pub fn locate(path: &Path) -> Option<PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        return path.exists().then(|| path.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(path))
        .find(|candidate| candidate.is_file())
}
