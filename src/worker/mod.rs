//! Task-queue worker - handlers, routing, and the bounded pool

mod envelope;
mod handler;
mod pool;

pub use envelope::{MALFORMED_TASK, TaskEnvelope, TaskOutcome, TaskStatus};
pub use handler::{EzToolTask, TaskHandler, TaskRouter};
pub use pool::{DEFAULT_CONCURRENCY, PoolStats, WorkerPool};
