//! Scratch directories and tool-managed output discovery
//!
//! Every invocation runs inside its own scratch directory, removed when the
//! invocation ends. When the user picks one of the tool's own formats, the
//! tool writes into that directory and the worker picks the file up from there.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use log::{debug, warn};
use tempfile::TempDir;

use crate::error::{Result, WorkerError};
use crate::tools::{FormatSpec, OutputTarget, ToolDescriptor};

use super::naming::output_file_name;

/// Per-invocation working directory
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a scratch dir under `root`, or the system temp dir when `None`
    pub fn create(root: Option<&Path>, label: &str) -> Result<Self> {
        let prefix = format!("eztool_{}_", label);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    /// Path of the scratch dir
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// A tool-managed format resolved against a scratch dir
#[derive(Debug, Clone)]
pub struct ManagedCapture {
    pub format_name: String,
    pub spec: FormatSpec,
    pub destination: PathBuf,
    search_root: PathBuf,
}

impl ManagedCapture {
    /// Decide the destination argument for `spec` inside `scratch`
    pub fn prepare(tool: &ToolDescriptor, format_name: &str, spec: &FormatSpec, source_name: &Path, scratch: &Scratch) -> Self {
        let destination = match spec.target {
            OutputTarget::Directory => scratch.path().to_path_buf(),
            OutputTarget::File => scratch.path().join(output_file_name(
                source_name,
                tool.output_suffix(),
                spec.extension_for(format_name),
            )),
        };
        Self {
            format_name: format_name.to_string(),
            spec: spec.clone(),
            destination,
            search_root: scratch.path().to_path_buf(),
        }
    }

    /// Glob used to find the generated file
    fn search_pattern(&self) -> Option<String> {
        let pattern = self.spec.pattern.as_deref()?;
        let root = Pattern::escape(&self.search_root.to_string_lossy());
        Some(match self.spec.target {
            OutputTarget::Directory => format!("{}/**/{}", root, pattern),
            OutputTarget::File => format!("{}/{}", root, pattern),
        })
    }

    /// Find the file the tool wrote; the newest wins when several match
    pub fn locate(&self, tool: &ToolDescriptor) -> Result<PathBuf> {
        if self.spec.target == OutputTarget::File && self.destination.is_file() {
            return Ok(self.destination.clone());
        }

        let not_produced = || WorkerError::NoOutputProduced {
            tool: tool.display_name.clone(),
            format: self.format_name.clone(),
            pattern: self
                .spec
                .pattern
                .clone()
                .unwrap_or_else(|| self.destination.display().to_string()),
        };

        let Some(pattern) = self.search_pattern() else {
            return Err(not_produced());
        };
        let paths = glob::glob(&pattern)
            .map_err(|e| WorkerError::InvalidDefinition(format!("Bad output pattern '{}': {}", pattern, e)))?;

        let mut matches: Vec<(PathBuf, SystemTime)> = paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .map(|path| {
                let modified = path
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (path, modified)
            })
            .collect();

        if matches.len() > 1 {
            warn!(
                "{} files matched '{}' for {}, using the newest",
                matches.len(),
                pattern,
                tool.display_name
            );
        }
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        let (path, _) = matches.into_iter().next().ok_or_else(not_produced)?;
        debug!("Picked up {} output {}", tool.display_name, path.display());
        Ok(path)
    }

    /// Read the generated file
    pub async fn collect(&self, tool: &ToolDescriptor) -> Result<Vec<u8>> {
        let path = self.locate(tool)?;
        Ok(tokio::fs::read(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    #[test]
    fn test_scratch_create_and_cleanup() {
        let root = TempDir::new().unwrap();
        let path = {
            let scratch = Scratch::create(Some(root.path()), "stdout").unwrap();
            assert!(scratch.path().is_dir());
            assert!(scratch.path().starts_with(root.path()));
            assert!(scratch.path().file_name().unwrap().to_string_lossy().starts_with("eztool_stdout_"));
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_prepare_directory_target() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("lecmd").unwrap();
        let scratch = Scratch::create(None, "csv").unwrap();

        let capture = ManagedCapture::prepare(tool, "csv", tool.format("csv").unwrap(), Path::new("a.lnk"), &scratch);
        assert_eq!(capture.destination, scratch.path());
    }

    #[test]
    fn test_prepare_file_target() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("appcompatcacheparser").unwrap();
        let scratch = Scratch::create(None, "csvf").unwrap();

        let capture = ManagedCapture::prepare(tool, "csvf", tool.format("csvf").unwrap(), Path::new("SYSTEM"), &scratch);
        assert_eq!(capture.destination, scratch.path().join("SYSTEM_appcompatcacheparser.csv"));
    }

    #[test]
    fn test_locate_file_target() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("appcompatcacheparser").unwrap();
        let scratch = Scratch::create(None, "csvf").unwrap();
        let capture = ManagedCapture::prepare(tool, "csvf", tool.format("csvf").unwrap(), Path::new("SYSTEM"), &scratch);

        assert!(matches!(capture.locate(tool), Err(WorkerError::NoOutputProduced { .. })));

        std::fs::write(&capture.destination, b"a,b\n").unwrap();
        assert_eq!(capture.locate(tool).unwrap(), capture.destination);
    }

    #[test]
    fn test_locate_directory_recursive() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("lecmd").unwrap();
        let scratch = Scratch::create(None, "csv").unwrap();
        let capture = ManagedCapture::prepare(tool, "csv", tool.format("csv").unwrap(), Path::new("a.lnk"), &scratch);

        let nested = scratch.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("20250101000000_LECmd_Output.csv"), b"x").unwrap();
        std::fs::write(scratch.path().join("unrelated.txt"), b"y").unwrap();

        let found = capture.locate(tool).unwrap();
        assert_eq!(found.file_name().unwrap(), "20250101000000_LECmd_Output.csv");
    }

    #[test]
    fn test_locate_picks_newest() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("rbcmd").unwrap();
        let scratch = Scratch::create(None, "csv").unwrap();
        let capture = ManagedCapture::prepare(tool, "csv", tool.format("csv").unwrap(), Path::new("$I1"), &scratch);

        let old = scratch.path().join("1_RBCmd_Output.csv");
        let new = scratch.path().join("2_RBCmd_Output.csv");
        std::fs::write(&old, b"old").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        std::fs::write(&new, b"new").unwrap();

        let old_file = std::fs::File::options().write(true).open(&old).unwrap();
        old_file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1)).unwrap();

        assert_eq!(capture.locate(tool).unwrap(), new);
    }

    #[tokio::test]
    async fn test_collect_missing_output() {
        let registry = ToolRegistry::builtin();
        let tool = registry.get("lecmd").unwrap();
        let scratch = Scratch::create(None, "json").unwrap();
        let capture = ManagedCapture::prepare(tool, "json", tool.format("json").unwrap(), Path::new("a.lnk"), &scratch);

        let err = capture.collect(tool).await.unwrap_err();
        assert!(matches!(err, WorkerError::NoOutputProduced { ref format, .. } if format == "json"));
    }
}
