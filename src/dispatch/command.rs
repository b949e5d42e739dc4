//! Argument vector construction
//!
//! Arguments are always kept as a vector and handed to the OS as-is; nothing
//! here is ever joined into a shell string for execution.

use std::path::Path;

use log::warn;

use crate::tools::{FormatSpec, ToolDescriptor};

/// Placeholder for the input path in reporting strings
const INPUT_PLACEHOLDER: &str = "<input_file_path>";
/// Placeholder for the worker-managed output destination in reporting strings
const DESTINATION_PLACEHOLDER: &str = "<worker_temp_dir_or_file>";

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

/// Worker-managed output flag and the destination it points at
#[derive(Debug, Clone, Copy)]
pub struct ManagedOutput<'a> {
    pub spec: &'a FormatSpec,
    pub destination: &'a Path,
}

impl CommandLine {
    /// Build `[runtime] exe <fixed...> [<format flag> <dest>] <user...> [<input flag>] <input>`
    pub fn build(
        tool: &ToolDescriptor,
        managed: Option<ManagedOutput<'_>>,
        user_args: &[String],
        input: &Path,
    ) -> Self {
        let mut argv = tool.base_command();
        argv.extend(tool.fixed_flags.iter().cloned());

        if let Some(managed) = managed {
            if user_args.iter().any(|a| a == &managed.spec.flag) {
                warn!(
                    "User arguments for {} include '{}', which the worker also sets for this format",
                    tool.display_name, managed.spec.flag
                );
            }
            argv.push(managed.spec.flag.clone());
            argv.push(managed.destination.to_string_lossy().into_owned());
        }

        argv.extend(user_args.iter().cloned());

        if let Some(flag) = &tool.input_flag {
            argv.push(flag.clone());
        }
        argv.push(input.to_string_lossy().into_owned());

        let mut iter = argv.into_iter();
        let program = iter.next().unwrap_or_default();
        Self {
            program,
            args: iter.collect(),
        }
    }

    /// Program followed by its arguments
    pub fn to_vec(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Space-joined form, for logs only
    pub fn display(&self) -> String {
        self.to_vec().join(" ")
    }
}

/// Command string shown to users, with worker-local paths replaced by placeholders
pub fn reporting_command(tool: &ToolDescriptor, user_args: &[String], format: Option<&FormatSpec>) -> String {
    let mut parts = vec![tool.display_name.clone()];
    parts.extend(tool.fixed_flags.iter().cloned());
    if let Some(spec) = format {
        parts.push(spec.flag.clone());
        parts.push(DESTINATION_PLACEHOLDER.to_string());
    }
    parts.extend(user_args.iter().cloned());
    if let Some(flag) = &tool.input_flag {
        parts.push(flag.clone());
    }
    parts.push(INPUT_PLACEHOLDER.to_string());
    parts.join(" ")
}
