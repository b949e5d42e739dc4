//! Domain types for the worker
//!
//! - InvocationRequest: one tool run against one input
//! - InvocationResult: what that run produced
//! - TaskPayload / TaskResult: the task-queue contract wrapping many runs

pub mod outcome;
pub mod request;
pub mod task;

pub use outcome::{CapturedOutput, InvocationResult, InvocationStatus};
pub use request::InvocationRequest;
pub use task::{InputFile, OutputFile, TaskConfig, TaskPayload, TaskResult};
