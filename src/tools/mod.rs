//! Tool System - descriptors, registry, and registration metadata

mod catalog;
mod definition;
mod metadata;

pub use catalog::{DEFAULT_DOTNET, ToolOverride, ToolRegistry};
pub use definition::{FormatSpec, OutputTarget, STDOUT_FORMAT, ToolDescriptor, locate};
pub use metadata::{FieldType, TaskConfigField, TaskMetadata};
