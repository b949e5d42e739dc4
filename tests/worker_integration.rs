//! Task handler and worker pool integration tests
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use eztools_worker::dispatch::Dispatcher;
use eztools_worker::domain::{InputFile, TaskConfig, TaskPayload, TaskResult};
use eztools_worker::tools::{FormatSpec, ToolDescriptor, ToolRegistry};
use eztools_worker::worker::{EzToolTask, TaskEnvelope, TaskHandler, TaskOutcome, TaskRouter, TaskStatus, WorkerPool};
use eztools_worker::{ErrorKind, WorkerError};
use serde_json::json;
use tempfile::TempDir;

/// Fails on inputs whose content starts with "bad", echoes args otherwise
const PARSER: &str = r#"input=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-f" ]; then input="$a"; fi
  prev="$a"
done
if head -c 3 "$input" | grep -q bad; then
  echo "Invalid header in $input" >&2
  exit 2
fi
for a in "$@"; do printf '%s\n' "$a"; done
"#;

fn write_tool(dir: &Path) -> ToolDescriptor {
    let exe = dir.join("LECmd.sh");
    std::fs::write(&exe, PARSER).unwrap();
    ToolDescriptor::new("lecmd", "LECmd", exe)
        .with_runtime("/bin/sh")
        .with_input_flag("-f")
        .with_arguments_key("lecmd_arguments")
        .with_format("csv", FormatSpec::directory("--csv", "*_LECmd_Output.csv"))
}

fn dispatcher(dir: &Path) -> Dispatcher {
    let mut registry = ToolRegistry::new();
    registry.add(write_tool(dir));
    Dispatcher::new(Arc::new(registry))
}

fn stored_input(dir: &Path, stored: &str, display: &str, contents: &[u8]) -> InputFile {
    let path = dir.join(stored);
    std::fs::write(&path, contents).unwrap();
    InputFile {
        uuid: Some(format!("uuid-{}", stored)),
        path,
        display_name: Some(display.to_string()),
    }
}

#[tokio::test]
async fn test_task_collects_outputs_and_failures() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out");
    let task = EzToolTask::new(dispatcher(temp_dir.path()), "lecmd").unwrap();

    let payload = TaskPayload {
        workflow_id: Some("wf-42".to_string()),
        ..TaskPayload::new(
            &out,
            vec![
                stored_input(temp_dir.path(), "a1", "Desktop.lnk", b"L"),
                stored_input(temp_dir.path(), "b2", "Broken.lnk", b"bad"),
                InputFile::new(temp_dir.path().join("gone.lnk")),
            ],
        )
    }
    .with_config(TaskConfig::new().set("lecmd_arguments", "--all -q").set("output_file_extension", "csv"));

    let result = task.handle(payload).await.unwrap();

    assert_eq!(result.workflow_id.as_deref(), Some("wf-42"));
    assert_eq!(result.output_files.len(), 1);
    let output = &result.output_files[0];
    assert_eq!(output.display_name, "Desktop_lecmd.csv");
    assert_eq!(output.extension, "csv");
    assert_eq!(output.data_type, "text_file");
    assert_eq!(output.source_file_id.as_deref(), Some("uuid-a1"));
    assert_eq!(output.uuid.len(), 32);

    let written = std::fs::read_to_string(&output.path).unwrap();
    assert!(written.starts_with("--all\n-q\n-f\n"));

    assert_eq!(result.command.as_deref(), Some("LECmd --all -q -f <input_file_path>"));
    assert_eq!(result.meta["invocations"].as_array().unwrap().len(), 3);
    let failures = result.meta["failures"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["input"], "Broken.lnk");
    assert_eq!(failures[0]["error_kind"], "execution");
    assert_eq!(failures[1]["error_kind"], "io");
}

#[tokio::test]
async fn test_task_fails_when_nothing_produced() {
    let temp_dir = TempDir::new().unwrap();
    let task = EzToolTask::new(dispatcher(temp_dir.path()), "lecmd").unwrap();
    let payload = TaskPayload::new(
        temp_dir.path().join("out"),
        vec![stored_input(temp_dir.path(), "b2", "Broken.lnk", b"bad")],
    );

    let err = task.handle(payload).await.unwrap_err();
    assert!(matches!(err, WorkerError::TaskFailed(_)));
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[tokio::test]
async fn test_task_aborts_when_tool_missing() {
    let temp_dir = TempDir::new().unwrap();
    let mut registry = ToolRegistry::new();
    registry.add(ToolDescriptor::new("rbcmd", "RBCmd", "/nonexistent/RBCmd.dll").with_runtime("/bin/sh"));
    let task = EzToolTask::new(Dispatcher::new(Arc::new(registry)), "rbcmd").unwrap();

    let payload = TaskPayload::new(
        temp_dir.path().join("out"),
        vec![stored_input(temp_dir.path(), "i1", "$I1.txt", b"I")],
    );
    let err = task.handle(payload).await.unwrap_err();

    assert!(matches!(err, WorkerError::ToolUnavailable { .. }));
    assert!(!temp_dir.path().join("out").exists());
}

#[tokio::test]
async fn test_pipe_result_feeds_next_task() {
    let temp_dir = TempDir::new().unwrap();
    let task = EzToolTask::new(dispatcher(temp_dir.path()), "lecmd").unwrap();

    let first = task
        .handle(TaskPayload::new(
            temp_dir.path().join("stage1"),
            vec![stored_input(temp_dir.path(), "a1", "Desktop.lnk", b"L")],
        ))
        .await
        .unwrap();

    let second = task
        .handle(TaskPayload {
            pipe_result: Some(first.encode().unwrap()),
            input_files: vec![InputFile::new("/ignored/when/piped")],
            ..TaskPayload::new(temp_dir.path().join("stage2"), Vec::new())
        })
        .await
        .unwrap();

    assert_eq!(second.output_files.len(), 1);
    assert_eq!(second.output_files[0].display_name, "Desktop_lecmd_lecmd.txt");
    assert_eq!(
        second.output_files[0].source_file_id.as_deref(),
        Some(first.output_files[0].uuid.as_str())
    );
}

#[tokio::test]
async fn test_managed_format_reporting_command() {
    let temp_dir = TempDir::new().unwrap();
    let exe = temp_dir.path().join("LECmd.sh");
    std::fs::write(&exe, "echo 'x,y' > \"$2/9_LECmd_Output.csv\"\n").unwrap();
    let tool = ToolDescriptor::new("lecmd", "LECmd", exe)
        .with_runtime("/bin/sh")
        .with_input_flag("-f")
        .with_format("csv", FormatSpec::directory("--csv", "*_LECmd_Output.csv"));
    let mut registry = ToolRegistry::new();
    registry.add(tool);
    let task = EzToolTask::new(Dispatcher::new(Arc::new(registry)), "lecmd").unwrap();

    let payload = TaskPayload::new(
        temp_dir.path().join("out"),
        vec![stored_input(temp_dir.path(), "a1", "Desktop.lnk", b"L")],
    )
    .with_config(TaskConfig::new().set("output_format", "csv").set("output_data_type", "eztools:lecmd:csv"));
    let result = task.handle(payload).await.unwrap();

    assert_eq!(
        result.command.as_deref(),
        Some("LECmd --csv <worker_temp_dir_or_file> -f <input_file_path>")
    );
    assert_eq!(result.output_files[0].display_name, "Desktop_lecmd.csv");
    assert_eq!(result.output_files[0].data_type, "eztools:lecmd:csv");
    assert_eq!(std::fs::read_to_string(&result.output_files[0].path).unwrap(), "x,y\n");
}

#[tokio::test]
async fn test_pool_processes_envelopes() {
    let temp_dir = TempDir::new().unwrap();
    let router = TaskRouter::for_dispatcher(&dispatcher(temp_dir.path())).unwrap();
    let pool = WorkerPool::new(Arc::new(router), 2);

    let good = stored_input(temp_dir.path(), "a1", "Desktop.lnk", b"L");
    let bad = stored_input(temp_dir.path(), "b2", "Broken.lnk", b"bad");
    let out: PathBuf = temp_dir.path().join("out");

    let envelopes = [
        TaskEnvelope::new("t1", "openrelik-worker-eztools.tasks.lecmd", TaskPayload::new(&out, vec![good])),
        TaskEnvelope::new("t2", "lecmd", TaskPayload::new(&out, vec![bad])),
        TaskEnvelope::new("t3", "pecmd", TaskPayload::new(&out, Vec::new())),
    ];
    let mut input = String::new();
    for envelope in &envelopes {
        input.push_str(&serde_json::to_string(envelope).unwrap());
        input.push('\n');
    }
    input.push_str(&json!({"id": "t4", "task_name": "lecmd"}).to_string());
    input.push('\n');

    let mut output = Vec::new();
    let stats = pool.run(input.as_bytes(), &mut output).await.unwrap();
    assert_eq!(stats.received, 4);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 3);

    let outcomes: Vec<TaskOutcome> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let by_id = |id: &str| outcomes.iter().find(|o| o.id == id).unwrap();

    let t1 = by_id("t1");
    assert_eq!(t1.status, TaskStatus::Success);
    let result = TaskResult::decode(t1.result.as_deref().unwrap()).unwrap();
    assert_eq!(result.output_files[0].display_name, "Desktop_lecmd.txt");

    assert_eq!(by_id("t2").error_kind, Some(ErrorKind::Execution));
    assert_eq!(by_id("t3").error_kind, Some(ErrorKind::Configuration));
    assert_eq!(by_id("t4").status, TaskStatus::Failure);
}

#[test]
fn test_router_exposes_registration_metadata() {
    let temp_dir = TempDir::new().unwrap();
    let router = TaskRouter::for_dispatcher(&dispatcher(temp_dir.path())).unwrap();
    let handler = router.get("lecmd").unwrap();

    let metadata = handler.metadata();
    assert_eq!(metadata.display_name, "EZTool: LECmd");
    let names: Vec<&str> = metadata.task_config.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["output_format", "output_file_extension", "lecmd_arguments"]);
}
