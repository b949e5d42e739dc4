//! Tool dispatcher
//!
//! Runs one wrapped tool against one input: resolve the descriptor, check the
//! input, launch the child in a scratch dir, wait, capture, persist. Every
//! failure is folded into the returned InvocationResult.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::process::{Child, Command};

use crate::domain::{CapturedOutput, InvocationRequest, InvocationResult};
use crate::error::{Result, WorkerError};
use crate::tools::{ToolDescriptor, ToolRegistry};

use super::capture::{ManagedCapture, Scratch};
use super::command::{CommandLine, ManagedOutput};
use super::naming::{CollisionPolicy, content_digest, output_file_name, persist_output};

/// Default number of bytes of stdout/stderr echoed to the log
pub const DEFAULT_PREVIEW_BYTES: usize = 1000;

/// Knobs the enclosing worker may set
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    /// Root for per-invocation scratch dirs; system temp when `None`
    pub scratch_dir: Option<PathBuf>,
    /// Handling of output name collisions
    pub collision: CollisionPolicy,
    /// Kill the child after this long; no limit when `None`
    pub timeout: Option<Duration>,
    /// Bytes of stdout/stderr echoed to the log
    pub preview_bytes: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            collision: CollisionPolicy::default(),
            timeout: None,
            preview_bytes: DEFAULT_PREVIEW_BYTES,
        }
    }
}

impl DispatcherOptions {
    /// Set the scratch root
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Set the collision policy
    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }

    /// Set the child timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs invocation requests against a shared, read-only registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    options: DispatcherOptions,
}

impl Dispatcher {
    /// Create a dispatcher with default options
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            options: DispatcherOptions::default(),
        }
    }

    /// Replace the options
    pub fn with_options(mut self, options: DispatcherOptions) -> Self {
        self.options = options;
        self
    }

    /// The registry this dispatcher resolves tools from
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Current options
    pub fn options(&self) -> &DispatcherOptions {
        &self.options
    }

    /// Run one request. Never fails; errors are reported in the result.
    pub async fn dispatch(&self, request: &InvocationRequest) -> InvocationResult {
        let mut result = InvocationResult::new(&request.tool, request.input());
        let start = Instant::now();

        match self.run(request, &mut result).await {
            Ok(output) => {
                info!(
                    "{} on {} wrote {} ({} bytes)",
                    result.tool,
                    request.input.display(),
                    output.path.display(),
                    output.size_bytes
                );
                result.mark_success(output, elapsed_ms(start));
            }
            Err(e) => {
                warn!("{} on {} failed: {}", request.tool, request.input.display(), e);
                result.mark_failed(&e, elapsed_ms(start));
            }
        }
        result
    }

    async fn run(&self, request: &InvocationRequest, result: &mut InvocationResult) -> Result<CapturedOutput> {
        let tool = self.registry.resolve(&request.tool)?;
        result.tool = tool.id.clone();
        tool.ensure_available()?;
        let input = validate_input(request.input()).await?;

        let managed_spec = if request.captures_stdout() {
            None
        } else {
            Some(tool.format(&request.output_format).ok_or_else(|| WorkerError::UnsupportedFormat {
                tool: tool.id.clone(),
                format: request.output_format.clone(),
            })?)
        };

        let scratch = Scratch::create(self.options.scratch_dir.as_deref(), &request.output_format)?;
        let capture = managed_spec.map(|spec| {
            ManagedCapture::prepare(tool, &request.output_format, spec, request.naming_source(), &scratch)
        });

        let managed = capture.as_ref().map(|c| ManagedOutput {
            spec: &c.spec,
            destination: &c.destination,
        });
        let command = CommandLine::build(tool, managed, &request.arguments, &input);

        info!("Executing {}: {}", tool.display_name, command.display());
        let child = spawn(tool, &command, scratch.path())?;
        result.command = command.to_vec();
        let output = self.wait(tool, child).await?;
        result.exit_code = output.status.code();
        self.log_streams(tool, request.input(), &output);

        if !output.status.success() {
            return Err(WorkerError::ToolFailed {
                tool: tool.display_name.clone(),
                status: describe_status(&output.status),
                diagnostic: diagnostic(&output, self.options.preview_bytes),
            });
        }

        let (contents, extension) = match &capture {
            None => (output.stdout, request.stdout_extension().to_string()),
            Some(capture) => (
                capture.collect(tool).await?,
                capture.spec.extension_for(&capture.format_name).to_string(),
            ),
        };

        let file_name = output_file_name(request.naming_source(), tool.output_suffix(), &extension);
        let size_bytes = contents.len() as u64;
        let sha256 = content_digest(&contents);
        let output_dir = request.output_dir.clone();
        let policy = self.options.collision;

        let path = tokio::task::spawn_blocking(move || persist_output(&output_dir, &file_name, &contents, policy))
            .await
            .map_err(|e| WorkerError::OutputWrite {
                path: request.output_dir.clone(),
                reason: e.to_string(),
            })??;

        Ok(CapturedOutput {
            path,
            extension,
            data_type: request.output_data_type().to_string(),
            size_bytes,
            sha256,
        })
    }

    /// Wait for the child, honoring the optional timeout
    async fn wait(&self, tool: &ToolDescriptor, child: Child) -> Result<Output> {
        let wait_error = |e: std::io::Error| WorkerError::Launch {
            tool: tool.display_name.clone(),
            reason: format!("failed while waiting for process: {}", e),
        };

        match self.options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                // Dropping the future drops the child, and kill_on_drop reaps it
                .map_err(|_| WorkerError::Timeout {
                    tool: tool.display_name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })?
                .map_err(wait_error),
            None => child.wait_with_output().await.map_err(wait_error),
        }
    }

    fn log_streams(&self, tool: &ToolDescriptor, input: &Path, output: &Output) {
        if !output.stdout.is_empty() {
            debug!(
                "{} stdout for {}:\n{}",
                tool.display_name,
                input.display(),
                preview(&output.stdout, self.options.preview_bytes)
            );
        }
        if !output.stderr.is_empty() {
            debug!(
                "{} stderr for {}:\n{}",
                tool.display_name,
                input.display(),
                preview(&output.stderr, self.options.preview_bytes)
            );
        }
    }
}

/// Check that the input exists and can be opened
/// Check the input and return it as an absolute path for the child
async fn validate_input(path: &Path) -> Result<PathBuf> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(WorkerError::InputNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(WorkerError::InputUnreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    // Recycle Bin parsing accepts whole directories
    let opened = if metadata.is_dir() {
        tokio::fs::read_dir(path).await.map(|_| ())
    } else {
        tokio::fs::File::open(path).await.map(|_| ())
    };
    opened.map_err(|e| WorkerError::InputUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    debug!("Input {} exists and is readable", path.display());
    std::path::absolute(path).map_err(|e| WorkerError::InputUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Launch the child in `cwd` with stdin closed and both streams captured
fn spawn(tool: &ToolDescriptor, command: &CommandLine, cwd: &Path) -> Result<Child> {
    Command::new(&command.program)
        .args(&command.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WorkerError::ToolUnavailable {
                tool: tool.id.clone(),
                path: PathBuf::from(&command.program),
            },
            _ => WorkerError::Launch {
                tool: tool.display_name.clone(),
                reason: e.to_string(),
            },
        })
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Failure text for a non-zero exit; never empty
fn diagnostic(output: &Output, limit: usize) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return format!("stdout: {}", tail(stdout, limit));
    }
    format!("no diagnostic output ({})", describe_status(&output.status))
}

/// First `limit` bytes of `bytes` as text, cut on a char boundary
fn preview(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Last `limit` bytes of `text`, cut on a char boundary
fn tail(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
