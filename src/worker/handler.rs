//! Task handlers
//!
//! A TaskHandler turns one TaskPayload into one TaskResult. EzToolTask does
//! this for a single wrapped tool by dispatching once per input file.
//! TaskRouter picks the handler for an incoming task name.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde_json::{Map, Value, json};

use crate::dispatch::{Dispatcher, reporting_command};
use crate::domain::{InputFile, InvocationRequest, OutputFile, TaskPayload, TaskResult};
use crate::error::{Result, WorkerError};
use crate::id::generate_output_uuid;
use crate::tools::{STDOUT_FORMAT, TaskMetadata, ToolDescriptor};

use super::envelope::{TaskEnvelope, TaskOutcome};

/// Something that can execute a queued task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Fully qualified task name this handler answers to
    fn task_name(&self) -> &str;

    /// Registration metadata
    fn metadata(&self) -> TaskMetadata;

    /// Process one payload
    async fn handle(&self, payload: TaskPayload) -> Result<TaskResult>;
}

/// Task that runs one EZTool over every input file
pub struct EzToolTask {
    tool: ToolDescriptor,
    dispatcher: Dispatcher,
}

impl EzToolTask {
    /// Create a task for `tool_id`, resolved from the dispatcher's registry
    pub fn new(dispatcher: Dispatcher, tool_id: &str) -> Result<Self> {
        let tool = dispatcher.registry().resolve(tool_id)?.clone();
        Ok(Self { tool, dispatcher })
    }

    /// The wrapped tool
    pub fn tool(&self) -> &ToolDescriptor {
        &self.tool
    }

    fn request_for(&self, payload: &TaskPayload, input: &InputFile, arguments: &[String]) -> InvocationRequest {
        let config = &payload.task_config;
        let mut request = InvocationRequest::new(&self.tool.id, &input.path, payload.output_path())
            .with_source_name(input.display_name())
            .with_arguments(arguments.iter().cloned())
            .with_format(config.output_format())
            .with_data_type(config.data_type());
        if let Some(extension) = config.extension() {
            request = request.with_extension(extension);
        }
        request
    }
}

#[async_trait]
impl TaskHandler for EzToolTask {
    fn task_name(&self) -> &str {
        &self.tool.task_name
    }

    fn metadata(&self) -> TaskMetadata {
        TaskMetadata::for_tool(&self.tool)
    }

    async fn handle(&self, payload: TaskPayload) -> Result<TaskResult> {
        let inputs = payload.resolve_inputs()?;
        if inputs.is_empty() {
            return Err(WorkerError::NoInputs(self.tool.display_name.clone()));
        }

        // Problems shared by every input fail the task before anything runs
        let config = &payload.task_config;
        let arguments = match &self.tool.arguments_key {
            Some(key) => config.arguments(key)?,
            None => Vec::new(),
        };
        let format_name = config.output_format();
        let managed = if format_name == STDOUT_FORMAT {
            None
        } else {
            Some(self.tool.format(format_name).ok_or_else(|| WorkerError::UnsupportedFormat {
                tool: self.tool.id.clone(),
                format: format_name.to_string(),
            })?)
        };
        self.tool.ensure_available()?;

        info!(
            "{} processing {} input(s) as {}",
            self.tool.display_name,
            inputs.len(),
            format_name
        );

        let mut output_files = Vec::new();
        let mut invocations = Vec::new();
        let mut failures = Vec::new();

        for input in &inputs {
            let request = self.request_for(&payload, input, &arguments);
            let result = self.dispatcher.dispatch(&request).await;

            match &result.output {
                Some(output) if result.is_success() => output_files.push(OutputFile {
                    uuid: generate_output_uuid(),
                    display_name: output.file_name(),
                    extension: output.extension.clone(),
                    data_type: output.data_type.clone(),
                    path: output.path.clone(),
                    source_file_id: input.uuid.clone(),
                }),
                _ => {
                    warn!(
                        "{} failed on {}: {}",
                        self.tool.display_name,
                        input.display_name(),
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    failures.push(json!({
                        "input": input.display_name(),
                        "error": result.error,
                        "error_kind": result.error_kind,
                    }));
                }
            }
            invocations.push(serde_json::to_value(&result)?);
        }

        if output_files.is_empty() {
            return Err(WorkerError::TaskFailed(format!(
                "{} produced no output for {} input(s)",
                self.tool.display_name,
                inputs.len()
            )));
        }

        let mut meta = Map::new();
        meta.insert("invocations".to_string(), Value::Array(invocations));
        if !failures.is_empty() {
            meta.insert("failures".to_string(), Value::Array(failures));
        }

        Ok(TaskResult {
            output_files,
            workflow_id: payload.workflow_id.clone(),
            command: Some(reporting_command(&self.tool, &arguments, managed)),
            meta,
            file_reports: Vec::new(),
            task_report: None,
        })
    }
}

/// Maps task names to handlers
#[derive(Default, Clone)]
pub struct TaskRouter {
    handlers: BTreeMap<String, Arc<dyn TaskHandler>>,
}

impl TaskRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// One EzToolTask per tool in the dispatcher's registry
    pub fn for_dispatcher(dispatcher: &Dispatcher) -> Result<Self> {
        let mut router = Self::new();
        for tool in dispatcher.registry().all() {
            router.register(Arc::new(EzToolTask::new(dispatcher.clone(), &tool.id)?));
        }
        Ok(router)
    }

    /// Add a handler, replacing any with the same task name
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.task_name().to_string(), handler);
    }

    /// Find a handler by full task name or by its last dotted segment
    pub fn get(&self, name: &str) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(name).or_else(|| {
            self.handlers
                .iter()
                .find(|(task_name, _)| task_name.rsplit('.').next() == Some(name))
                .map(|(_, handler)| handler)
        })
    }

    /// Registered task names
    pub fn task_names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Metadata for every registered task
    pub fn metadata(&self) -> Vec<(String, TaskMetadata)> {
        self.handlers
            .iter()
            .map(|(name, handler)| (name.clone(), handler.metadata()))
            .collect()
    }

    /// Run a payload against the named task
    pub async fn handle(&self, task_name: &str, payload: TaskPayload) -> Result<TaskResult> {
        let handler = self
            .get(task_name)
            .ok_or_else(|| WorkerError::UnknownTool(task_name.to_string()))?;
        handler.handle(payload).await
    }

    /// Run an envelope and produce its outcome line
    pub async fn run(&self, envelope: TaskEnvelope) -> TaskOutcome {
        let TaskEnvelope { id, task_name, payload } = envelope;
        info!("Task {} ({}) started", id, task_name);

        let encoded = self
            .handle(&task_name, payload)
            .await
            .and_then(|result| result.encode());
        match encoded {
            Ok(result) => {
                info!("Task {} ({}) succeeded", id, task_name);
                TaskOutcome::success(id, task_name, result)
            }
            Err(e) => {
                warn!("Task {} ({}) failed: {}", id, task_name, e);
                TaskOutcome::failure(id, task_name, &e)
            }
        }
    }
}
