//! Tool registry
//!
//! Holds the immutable table of known EZTools. Built once at startup from the
//! built-in descriptors, optionally replaced by a TOML catalog and adjusted by
//! per-tool overrides from the worker config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerError};

use super::definition::{FormatSpec, ToolDescriptor};

/// Default .NET runtime used to launch the EZTools assemblies
pub const DEFAULT_DOTNET: &str = "/usr/bin/dotnet";

/// TOML file structure
#[derive(Debug, Deserialize)]
struct TomlCatalog {
    #[serde(rename = "tool")]
    tools: Vec<ToolDescriptor>,
}

/// Deployment-specific replacement of a descriptor's install locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolOverride {
    pub runtime: Option<PathBuf>,
    pub executable: Option<PathBuf>,
    pub fixed_flags: Option<Vec<String>>,
}

/// Registry of tool descriptors keyed by id
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with LECmd, RBCmd and AppCompatCacheParser at their standard install paths
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.add(
            ToolDescriptor::new("lecmd", "LECmd", "/opt/LECmd_built_from_source/LECmd.dll")
                .with_runtime(DEFAULT_DOTNET)
                .with_description(
                    "Runs LECmd from Eric Zimmerman's EZTools to parse LNK files.",
                )
                .with_input_flag("-f")
                .with_arguments_key("lecmd_arguments")
                .with_format("csv", FormatSpec::directory("--csv", "*_LECmd_Output.csv"))
                .with_format("json", FormatSpec::directory("--json", "*_LECmd_Output.json")),
        );

        registry.add(
            ToolDescriptor::new("rbcmd", "RBCmd", "/opt/RBCmd_built_from_source/RBCmd.dll")
                .with_runtime(DEFAULT_DOTNET)
                .with_description(
                    "Runs RBCmd from Eric Zimmerman's EZTools to parse Recycle Bin artifacts.",
                )
                .with_input_flag("-f")
                .with_format("csv", FormatSpec::directory("--csv", "*_RBCmd_Output.csv")),
        );

        registry.add(
            ToolDescriptor::new(
                "appcompatcacheparser",
                "AppCompatCacheParser",
                "/opt/AppCompatCacheParser_built_from_source/AppCompatCacheParser.dll",
            )
            .with_runtime(DEFAULT_DOTNET)
            .with_description(
                "Runs AppCompatCacheParser from Eric Zimmerman's EZTools to parse ShimCache data from SYSTEM hives.",
            )
            .with_input_flag("-f")
            .with_arguments_key("appcompatcacheparser_arguments")
            .with_format(
                "csv",
                FormatSpec::directory("--csv", "AppCompatCacheParser_Output_*.csv"),
            )
            .with_format("csvf", FormatSpec::file("--csvf").with_extension("csv")),
        );

        registry
    }

    /// Load a registry from a TOML catalog file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            WorkerError::InvalidDefinition(format!(
                "Failed to read catalog file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load a registry from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let catalog: TomlCatalog = toml::from_str(content)
            .map_err(|e| WorkerError::InvalidDefinition(format!("Failed to parse TOML: {}", e)))?;

        let mut registry = Self::new();
        for tool in catalog.tools {
            tool.validate()?;
            if registry.tools.contains_key(&tool.id) {
                return Err(WorkerError::InvalidDefinition(format!(
                    "Duplicate tool id '{}'",
                    tool.id
                )));
            }
            registry.add(tool);
        }
        Ok(registry)
    }

    /// Add or replace a descriptor
    pub fn add(&mut self, tool: ToolDescriptor) {
        self.tools.insert(tool.id.clone(), tool);
    }

    /// Replace install locations of a registered tool
    pub fn apply_override(&mut self, id: &str, tool_override: &ToolOverride) -> Result<()> {
        let tool = self
            .tools
            .get_mut(id)
            .ok_or_else(|| WorkerError::UnknownTool(id.to_string()))?;

        if let Some(runtime) = &tool_override.runtime {
            // An empty runtime means "run the executable directly"
            tool.runtime = (!runtime.as_os_str().is_empty()).then(|| runtime.clone());
        }
        if let Some(executable) = &tool_override.executable {
            tool.executable = executable.clone();
        }
        if let Some(flags) = &tool_override.fixed_flags {
            tool.fixed_flags = flags.clone();
        }
        tool.validate()
    }

    /// Get a tool by id (case-insensitive) or task name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools
            .get(name)
            .or_else(|| self.tools.get(&name.to_ascii_lowercase()))
            .or_else(|| self.tools.values().find(|t| t.task_name == name))
    }

    /// Get a tool or fail with a configuration error
    pub fn resolve(&self, name: &str) -> Result<&ToolDescriptor> {
        self.get(name)
            .ok_or_else(|| WorkerError::UnknownTool(name.to_string()))
    }

    /// List all tool ids in sorted order
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Get all tools
    pub fn all(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    /// Get number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
