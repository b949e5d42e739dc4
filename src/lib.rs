//! eztools-worker - runs Eric Zimmerman's forensic command-line tools as queue tasks
//!
//! The worker launches a wrapped tool (LECmd, RBCmd, AppCompatCacheParser)
//! against each input artifact, captures either its standard output or the
//! file it writes on its own, and stores the result as an output file.

pub mod dispatch;
pub mod domain;
pub mod error;
pub mod id;
pub mod tools;
pub mod worker;

pub use error::{ErrorKind, Result, WorkerError};

/// Prefix of every task name this worker registers
pub const TASK_NAME_PREFIX: &str = "openrelik-worker-eztools.tasks";
