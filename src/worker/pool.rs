//! Worker pool
//!
//! Reads newline-delimited TaskEnvelopes, runs up to `concurrency` of them at
//! once through the TaskRouter, and writes one TaskOutcome line per task as
//! each finishes. No further line is read while every slot is busy.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::{Id, JoinSet};

use crate::error::{Result, WorkerError};

use super::envelope::{TaskEnvelope, TaskOutcome};
use super::handler::TaskRouter;

/// Default number of tasks run at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Counters for one pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub received: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl PoolStats {
    fn record(&mut self, outcome: &TaskOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Bounded-concurrency task runner
pub struct WorkerPool {
    router: Arc<TaskRouter>,
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool; a concurrency of zero is treated as one
    pub fn new(router: Arc<TaskRouter>, concurrency: usize) -> Self {
        Self {
            router,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Process every envelope from `reader` until EOF and all tasks finish
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<PoolStats>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        // Envelope id and task name of every task still in the set
        let mut in_flight: HashMap<Id, (String, String)> = HashMap::new();
        let mut stats = PoolStats::default();
        let mut reading = true;

        info!("Worker pool started with concurrency {}", self.concurrency);

        loop {
            tokio::select! {
                line = lines.next_line(), if reading && tasks.len() < self.concurrency => {
                    let Some(line) = line? else {
                        debug!("Input closed, waiting for {} running task(s)", tasks.len());
                        reading = false;
                        continue;
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    stats.received += 1;

                    match serde_json::from_str::<TaskEnvelope>(trimmed) {
                        Ok(envelope) => {
                            let router = Arc::clone(&self.router);
                            let label = (envelope.id.clone(), envelope.task_name.clone());
                            let handle = tasks.spawn(async move { router.run(envelope).await });
                            in_flight.insert(handle.id(), label);
                        }
                        Err(e) => {
                            let outcome = TaskOutcome::malformed(trimmed, e);
                            error!("Rejected input line: {}", outcome.error.as_deref().unwrap_or_default());
                            stats.record(&outcome);
                            write_outcome(&mut writer, &outcome).await?;
                        }
                    }
                }
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    let outcome = match joined {
                        Ok((task_id, outcome)) => {
                            in_flight.remove(&task_id);
                            outcome
                        }
                        Err(e) => {
                            error!("Task aborted: {}", e);
                            let (id, task_name) = in_flight.remove(&e.id()).unwrap_or_default();
                            TaskOutcome::failure(id, task_name, &WorkerError::TaskFailed(format!("task aborted: {}", e)))
                        }
                    };
                    stats.record(&outcome);
                    write_outcome(&mut writer, &outcome).await?;
                }
                else => break,
            }
        }

        writer.flush().await?;
        info!(
            "Worker pool finished: {} received, {} succeeded, {} failed",
            stats.received, stats.succeeded, stats.failed
        );
        Ok(stats)
    }
}

async fn write_outcome<W: AsyncWrite + Unpin>(writer: &mut W, outcome: &TaskOutcome) -> Result<()> {
    let mut line = serde_json::to_vec(outcome)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
