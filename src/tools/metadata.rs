//! Task registration metadata
//!
//! Describes each tool task to the queue's front end: display name,
//! description, and the configuration fields a user may set.

use serde::{Deserialize, Serialize};

use crate::domain::task::{DEFAULT_EXTENSION, EXTENSION_KEY, OUTPUT_FORMAT_KEY};

use super::definition::{STDOUT_FORMAT, ToolDescriptor};

/// Kind of form control for a config field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Select,
    Text,
}

/// One user-settable task option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfigField {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
}

/// Metadata published when registering a tool task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub display_name: String,
    pub description: String,
    pub task_config: Vec<TaskConfigField>,
}

impl TaskMetadata {
    /// Build the metadata for a tool
    pub fn for_tool(tool: &ToolDescriptor) -> Self {
        let formats: Vec<String> = tool
            .supported_formats()
            .into_iter()
            .map(String::from)
            .collect();

        let mut task_config = vec![
            TaskConfigField {
                name: OUTPUT_FORMAT_KEY.to_string(),
                label: "Output Format".to_string(),
                description: format!(
                    "Select the output format. 'stdout' captures console output. Other options use {}'s own file output (e.g. {}).",
                    tool.display_name,
                    tool.formats
                        .values()
                        .next()
                        .map_or("--csv", |f| f.flag.as_str())
                ),
                field_type: FieldType::Select,
                items: formats,
                default: Some(STDOUT_FORMAT.to_string()),
                required: true,
            },
            TaskConfigField {
                name: EXTENSION_KEY.to_string(),
                label: "Output File Extension".to_string(),
                description: "Extension of the captured stdout file.".to_string(),
                field_type: FieldType::Text,
                items: Vec::new(),
                default: Some(DEFAULT_EXTENSION.to_string()),
                required: false,
            },
        ];

        if let Some(key) = &tool.arguments_key {
            task_config.push(TaskConfigField {
                name: key.clone(),
                label: format!("{} Arguments", tool.display_name),
                description: format!(
                    "Extra arguments passed to {} before the input file.",
                    tool.display_name
                ),
                field_type: FieldType::Text,
                items: Vec::new(),
                default: None,
                required: false,
            });
        }

        Self {
            display_name: format!("EZTool: {}", tool.display_name),
            description: tool.description.clone(),
            task_config,
        }
    }
}
