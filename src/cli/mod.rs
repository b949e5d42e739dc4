//! CLI module for eztools-worker - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for listing tools, running a
//! single tool, processing one task, and serving the task pool.

pub mod commands;

pub use commands::Cli;
