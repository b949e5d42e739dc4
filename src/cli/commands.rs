//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - tools: list the registered tools
//! - exec: run one tool against one input
//! - run: process one task payload
//! - worker: serve tasks from stdin

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// eztools-worker - runs EZTools parsers as worker tasks
#[derive(Parser, Debug)]
#[command(name = "eztools-worker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered tools and whether they are installed
    Tools {
        /// Print task registration metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one tool against one input file
    Exec {
        /// Tool id or task name (e.g. lecmd)
        tool: String,

        /// Input artifact
        input: PathBuf,

        /// Output directory (defaults to dispatch.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output format: stdout or one of the tool's own formats
        #[arg(short, long, default_value = "stdout")]
        format: String,

        /// Extension of the captured stdout file
        #[arg(short, long)]
        extension: Option<String>,

        /// Arguments passed through to the tool
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Process one task payload (JSON) from a file or stdin
    Run {
        /// Task name or tool id
        task: String,

        /// Payload file; stdin when omitted
        payload: Option<PathBuf>,
    },

    /// Serve newline-delimited task envelopes from stdin
    Worker {
        /// Tasks run at once (defaults to worker.concurrency)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },
}
