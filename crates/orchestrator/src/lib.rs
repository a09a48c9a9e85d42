//! Worker Pool Orchestrator
//!
//! Runs a batch of targets through a bounded pool of worker processes with
//! per-task timeouts, bounded retries, a durable checkpoint and periodic
//! progress reporting.

mod cores;
mod driver;
mod protocol;
mod runner;
mod state;

pub use cores::physical_cores;
pub use driver::BatchDriver;
pub use protocol::{FailureKind, WorkerReply};
pub use runner::{ProcessRunner, TaskRunner, WorkerError};
pub use state::{BatchState, BatchSummary, ProgressReporter};

use serde::{Deserialize, Serialize};
use storage::StorageError;
use thiserror::Error;

/// Whole-batch failures. Anything per-target is counted, not raised.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Checkpoint unwritable: {0}")]
    Checkpoint(#[source] StorageError),
    #[error("Record sink unreachable: {0}")]
    Sink(#[source] StorageError),
    #[error("No valid targets in batch")]
    NoTargets,
    #[error("Worker pool unusable: {0}")]
    Worker(#[source] WorkerError),
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Concurrent workers; 0 means one per physical core
    pub workers: usize,
    /// Outer per-task limit, independent of the search budget (seconds)
    pub task_timeout_secs: u64,
    /// Attempts per target for retryable failures
    pub max_attempts: u32,
    /// First retry delay (ms), doubled per further attempt
    pub backoff_initial_ms: u64,
    /// Retry delay ceiling (ms)
    pub backoff_max_ms: u64,
    /// Progress log interval (seconds)
    pub progress_interval_secs: u64,
    /// On resume, reprocess targets checkpointed as failed
    pub retry_failed: bool,
}

impl OrchestratorConfig {
    /// Worker count with 0 resolved to the physical core count
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            physical_cores()
        } else {
            self.workers
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            task_timeout_secs: 300,
            max_attempts: 3,
            backoff_initial_ms: 1000,
            backoff_max_ms: 60_000,
            progress_interval_secs: 30,
            retry_failed: false,
        }
    }
}
