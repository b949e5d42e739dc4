use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};

use eztools_worker::dispatch::Dispatcher;
use eztools_worker::domain::{InvocationRequest, TaskPayload};
use eztools_worker::tools::TaskMetadata;
use eztools_worker::worker::{TaskRouter, WorkerPool};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    // Stdout carries results and outcome lines, so logs go to a file
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let registry = config.registry().context("Failed to build tool registry")?;
    Ok(Dispatcher::new(Arc::new(registry)).with_options(config.dispatcher_options()))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    let dispatcher = build_dispatcher(config)?;

    match &cli.command {
        Commands::Tools { json } => handle_tools_command(&dispatcher, *json),
        Commands::Exec {
            tool,
            input,
            output_dir,
            format,
            extension,
            args,
        } => {
            let output_dir = output_dir.clone().unwrap_or_else(|| config.dispatch.output_dir.clone());
            let mut request = InvocationRequest::new(tool, input, output_dir)
                .with_arguments(args.iter().cloned())
                .with_format(format);
            if let Some(extension) = extension {
                request = request.with_extension(extension);
            }
            handle_exec_command(&dispatcher, &request, cli.is_verbose()).await
        }
        Commands::Run { task, payload } => handle_run_command(&dispatcher, task, payload.as_deref()).await,
        Commands::Worker { concurrency } => {
            let concurrency = concurrency.unwrap_or(config.worker.concurrency);
            handle_worker_command(&dispatcher, concurrency).await
        }
    }
}

fn handle_tools_command(dispatcher: &Dispatcher, json: bool) -> Result<()> {
    let registry = dispatcher.registry();
    info!("Listing {} tools", registry.len());

    if json {
        let entries: Vec<serde_json::Value> = registry
            .all()
            .map(|tool| {
                serde_json::json!({
                    "id": tool.id,
                    "task_name": tool.task_name,
                    "available": tool.is_available(),
                    "metadata": TaskMetadata::for_tool(tool),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for tool in registry.all() {
        let status = if tool.is_available() {
            "installed".green()
        } else {
            "missing".red()
        };
        println!("{} ({}) [{}]", tool.display_name.bold(), tool.id, status);
        println!("  task:    {}", tool.task_name);
        println!("  command: {}", tool.base_command().join(" "));
        println!("  formats: {}", tool.supported_formats().join(", "));
    }
    Ok(())
}

async fn handle_exec_command(dispatcher: &Dispatcher, request: &InvocationRequest, verbose: bool) -> Result<()> {
    info!("Executing {} on {}", request.tool, request.input.display());
    let result = dispatcher.dispatch(request).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    match (&result.output, &result.error) {
        (Some(output), _) => {
            if verbose {
                eprintln!(
                    "{} {} ({} bytes, {})",
                    "Wrote".green(),
                    output.path.display(),
                    output.size_bytes,
                    request.output_format
                );
            }
            Ok(())
        }
        (None, Some(error)) => bail!("{} failed: {}", result.tool, error),
        (None, None) => bail!("{} produced no result", result.tool),
    }
}

async fn handle_run_command(dispatcher: &Dispatcher, task: &str, payload_path: Option<&Path>) -> Result<()> {
    let raw = match payload_path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read payload {}", path.display()))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("Failed to read payload from stdin")?;
            raw
        }
    };
    let payload: TaskPayload = serde_json::from_str(&raw).context("Failed to parse task payload")?;

    let router = TaskRouter::for_dispatcher(dispatcher)?;
    info!("Running task {}", task);
    let result = router
        .handle(task, payload)
        .await
        .with_context(|| format!("Task {} failed", task))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!(
        "{} {} output file(s)",
        "Produced".green(),
        result.output_files.len()
    );
    Ok(())
}

async fn handle_worker_command(dispatcher: &Dispatcher, concurrency: usize) -> Result<()> {
    let router = TaskRouter::for_dispatcher(dispatcher)?;
    let pool = WorkerPool::new(Arc::new(router), concurrency);
    info!("Serving tasks from stdin with concurrency {}", pool.concurrency());

    let stats = pool
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("Worker pool failed")?;

    eprintln!(
        "{} {} received, {} succeeded, {} failed",
        "Done:".cyan(),
        stats.received,
        stats.succeeded.to_string().green(),
        stats.failed.to_string().red()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
