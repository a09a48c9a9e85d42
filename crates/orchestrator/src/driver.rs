//! Batch driver
//!
//! Single-task cooperative loop: dispatches targets to the runner up to the
//! worker count, collects replies, persists records and checkpoint entries,
//! and retries transient failures with exponential backoff. A target waiting
//! out its backoff is parked in the loop and holds no worker slot.

use crate::protocol::{FailureKind, WorkerReply};
use crate::runner::{TaskRunner, WorkerError};
use crate::state::{BatchState, BatchSummary, ProgressReporter};
use crate::{BatchError, OrchestratorConfig};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use storage::{CanonicalId, CheckpointStore, RecordSink, TargetStatus};
use target_pipeline::{PipelineStage, TargetRecord};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// A target waiting for (re)dispatch
#[derive(Debug)]
struct Task {
    id: CanonicalId,
    attempt: u32,
}

/// Retries parked until their backoff elapses
#[derive(Debug, Default)]
struct RetryQueue {
    parked: Vec<(Instant, Task)>,
}

impl RetryQueue {
    fn park(&mut self, ready_at: Instant, task: Task) {
        self.parked.push((ready_at, task));
    }

    fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }

    /// Earliest ready time
    fn next_ready(&self) -> Option<Instant> {
        self.parked.iter().map(|(at, _)| *at).min()
    }

    /// Remove the tasks ready at `now`, earliest first
    fn take_ready(&mut self, now: Instant) -> Vec<Task> {
        let (mut ready, waiting): (Vec<_>, Vec<_>) =
            self.parked.drain(..).partition(|(at, _)| *at <= now);
        self.parked = waiting;
        ready.sort_by_key(|(at, _)| *at);
        ready.into_iter().map(|(_, task)| task).collect()
    }
}

/// What came back from one dispatched task
enum TaskOutcome {
    Reply(WorkerReply),
    Worker(WorkerError),
    TimedOut,
}

struct Finished {
    id: CanonicalId,
    attempt: u32,
    outcome: TaskOutcome,
}

enum Event {
    Joined(Result<Finished, tokio::task::JoinError>),
    RetryReady,
    Tick,
}

/// Drives one batch of targets to completion
pub struct BatchDriver<R: TaskRunner> {
    runner: Arc<R>,
    checkpoint: CheckpointStore,
    sink: Box<dyn RecordSink<TargetRecord>>,
    config: OrchestratorConfig,
}

impl<R: TaskRunner> BatchDriver<R> {
    pub fn new(
        runner: R,
        checkpoint: CheckpointStore,
        sink: Box<dyn RecordSink<TargetRecord>>,
        config: OrchestratorConfig,
    ) -> Self {
        info!(
            "Creating batch driver: task timeout {}s, {} attempts, checkpoint {:?}",
            config.task_timeout_secs,
            config.max_attempts,
            checkpoint.dir()
        );
        Self {
            runner: Arc::new(runner),
            checkpoint,
            sink,
            config,
        }
    }

    /// Checkpoint as seen by the driver
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Delay before dispatching `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        let millis = self
            .config
            .backoff_initial_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.backoff_max_ms);
        Duration::from_millis(millis)
    }

    /// Process `targets` with `workers` concurrent tasks.
    ///
    /// With `resume`, targets already settled in the checkpoint are skipped
    /// (failed ones are retried when `retry_failed` is set). Without it the
    /// checkpoint is cleared first. Only checkpoint and sink failures abort
    /// the run; per-target failures are counted and checkpointed.
    pub async fn start(
        &mut self,
        targets: &[String],
        workers: usize,
        resume: bool,
    ) -> Result<BatchSummary, BatchError> {
        let ids = canonical_targets(targets);
        if ids.is_empty() {
            return Err(BatchError::NoTargets);
        }
        if !resume {
            self.checkpoint.reset().map_err(BatchError::Checkpoint)?;
        }

        let mut state = BatchState::new(ids.len());
        let mut queue = VecDeque::new();
        for id in ids {
            let settled = match self.checkpoint.status(&id) {
                Some(TargetStatus::Done) => true,
                Some(TargetStatus::Failed) => !self.config.retry_failed,
                _ => false,
            };
            if settled {
                debug!("Skipping settled target {}", id);
                state.on_skipped();
            } else {
                queue.push_back(Task { id, attempt: 1 });
            }
        }

        let workers = workers.max(1);
        info!(
            "Starting batch: {} targets, {} to process, {} already settled, {} workers",
            state.total(),
            queue.len(),
            state.skipped(),
            workers
        );

        let progress = ProgressReporter::new();
        let period = Duration::from_secs(self.config.progress_interval_secs.max(1));
        let mut ticker = time::interval_at(Instant::now() + period, period);
        let mut set = JoinSet::new();
        let mut retries = RetryQueue::default();

        loop {
            queue.extend(retries.take_ready(Instant::now()));
            while set.len() < workers {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                if task.attempt == 1 {
                    self.checkpoint
                        .record(&task.id, TargetStatus::Pending)
                        .map_err(BatchError::Checkpoint)?;
                }
                state.on_dispatch();
                self.spawn(&mut set, task);
            }

            if set.is_empty() && queue.is_empty() && retries.is_empty() {
                break;
            }

            let next_retry = retries.next_ready();
            let retry_at = next_retry.unwrap_or_else(Instant::now);
            let event = tokio::select! {
                Some(joined) = set.join_next(), if !set.is_empty() => Event::Joined(joined),
                _ = time::sleep_until(retry_at), if next_retry.is_some() => Event::RetryReady,
                _ = ticker.tick() => Event::Tick,
            };
            match event {
                Event::Joined(Ok(finished)) => {
                    if let Some(retry) = self.collect(finished, &mut state)? {
                        let delay = self.backoff(retry.attempt);
                        retries.park(Instant::now() + delay, retry);
                    }
                }
                Event::Joined(Err(e)) => {
                    error!("Worker task lost: {}", e);
                    state.on_lost();
                }
                Event::RetryReady => {}
                Event::Tick => progress.report(&state),
            }
        }

        progress.report(&state);
        let summary = BatchSummary::from_state(&state, progress.elapsed());
        info!(
            "Batch finished: {} succeeded ({} degraded), {} failed, {} skipped, {:.1}% success in {:.1}s",
            summary.succeeded,
            summary.degraded,
            summary.failed,
            summary.skipped,
            100.0 * summary.success_fraction(),
            summary.elapsed_secs
        );
        Ok(summary)
    }

    fn spawn(&self, set: &mut JoinSet<Finished>, task: Task) {
        let runner = Arc::clone(&self.runner);
        let limit = Duration::from_secs(self.config.task_timeout_secs);
        debug!("Dispatching {} (attempt {})", task.id, task.attempt);
        set.spawn(async move {
            let outcome = match time::timeout(limit, runner.run(task.id.clone())).await {
                Ok(Ok(reply)) => TaskOutcome::Reply(reply),
                Ok(Err(e)) => TaskOutcome::Worker(e),
                Err(_) => TaskOutcome::TimedOut,
            };
            Finished {
                id: task.id,
                attempt: task.attempt,
                outcome,
            }
        });
    }

    /// Completion callback. Returns the retry task when one is due; the
    /// caller parks it for `backoff(attempt)`.
    fn collect(
        &mut self,
        finished: Finished,
        state: &mut BatchState,
    ) -> Result<Option<Task>, BatchError> {
        let Finished { id, attempt, outcome } = finished;
        let (retryable, reason) = match outcome {
            TaskOutcome::Reply(WorkerReply::Completed(record)) => {
                self.sink.put(&id, &record).map_err(BatchError::Sink)?;
                debug!("{} -> {}", id, PipelineStage::Persisted);
                self.checkpoint
                    .record(&id, TargetStatus::Done)
                    .map_err(BatchError::Checkpoint)?;
                state.on_success(record.status);
                return Ok(None);
            }
            TaskOutcome::Reply(WorkerReply::Failed { kind, message }) => {
                (kind.is_retryable(), format!("{}: {}", kind, message))
            }
            TaskOutcome::Worker(e @ WorkerError::Spawn { .. }) => {
                return Err(BatchError::Worker(e));
            }
            TaskOutcome::Worker(e) => (true, e.to_string()),
            TaskOutcome::TimedOut => (
                false,
                format!(
                    "{}: no reply within {}s",
                    FailureKind::Internal,
                    self.config.task_timeout_secs
                ),
            ),
        };

        if retryable && attempt < self.config.max_attempts {
            let next = attempt + 1;
            let delay = self.backoff(next);
            warn!(
                "{} failed on attempt {}/{} ({}); retrying in {:?}",
                id, attempt, self.config.max_attempts, reason, delay
            );
            state.on_retry();
            return Ok(Some(Task { id, attempt: next }));
        }

        warn!("{} failed after {} attempt(s): {}", id, attempt, reason);
        debug!("{} -> {}", id, PipelineStage::Failed);
        self.checkpoint
            .record(&id, TargetStatus::Failed)
            .map_err(BatchError::Checkpoint)?;
        state.on_failure();
        Ok(None)
    }
}

/// Canonicalize and deduplicate the target list, keeping first occurrences
fn canonical_targets(targets: &[String]) -> Vec<CanonicalId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(targets.len());
    for raw in targets {
        match CanonicalId::parse(raw) {
            Ok(id) => {
                if seen.insert(id.clone()) {
                    ids.push(id);
                } else {
                    debug!("Duplicate target {:?} ({})", raw, id);
                }
            }
            Err(e) => warn!("Skipping target {:?}: {}", raw, e),
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_queue_releases_in_ready_order() {
        let now = Instant::now();
        let task = |raw: &str| Task {
            id: CanonicalId::parse(raw).unwrap(),
            attempt: 2,
        };
        let mut retries = RetryQueue::default();
        retries.park(now + Duration::from_secs(5), task("KIC 1"));
        retries.park(now + Duration::from_secs(1), task("KIC 2"));
        retries.park(now + Duration::from_secs(9), task("KIC 3"));
        assert_eq!(retries.next_ready(), Some(now + Duration::from_secs(1)));

        let ready = retries.take_ready(now + Duration::from_secs(6));
        let ids: Vec<&str> = ready.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["KIC 000000002", "KIC 000000001"]);
        assert!(!retries.is_empty());
        assert_eq!(retries.next_ready(), Some(now + Duration::from_secs(9)));
    }

    #[test]
    fn test_canonical_targets_dedupes_spellings() {
        let targets = vec![
            "KIC 8462852".to_string(),
            "kplr008462852".to_string(),
            "8462852".to_string(),
            "TIC 1".to_string(),
            "   ".to_string(),
        ];
        let ids = canonical_targets(&targets);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].as_str(), "KIC 008462852");
    }
}
