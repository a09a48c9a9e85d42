//! Task runners
//!
//! The production runner spawns one worker process per target so that a hung
//! or crashed target takes nothing else down with it.

use crate::protocol::WorkerReply;
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use storage::CanonicalId;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Failures of the worker mechanism itself
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker process could not be started
    #[error("Failed to spawn worker {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The worker exited cleanly but its reply was unreadable
    #[error("Malformed worker reply: {0}")]
    Protocol(String),
    /// The worker died without replying
    #[error("Worker crashed: {0}")]
    Crashed(String),
}

/// Runs the pipeline for one target somewhere and returns the reply
pub trait TaskRunner: Send + Sync + 'static {
    fn run(&self, id: CanonicalId) -> impl Future<Output = Result<WorkerReply, WorkerError>> + Send;
}

/// Runs each target in a fresh `<program> worker --target <id>` process.
///
/// The child is killed if the returned future is dropped, which is how the
/// driver's per-task timeout reclaims a hung worker.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    config: Option<PathBuf>,
}

impl ProcessRunner {
    /// Runner invoking `program`, passing `config` through when given
    pub fn new(program: impl Into<PathBuf>, config: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    fn command(&self, id: &CanonicalId) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("worker").arg("--target").arg(id.as_str());
        if let Some(config) = &self.config {
            command.arg("--config").arg(config);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

impl TaskRunner for ProcessRunner {
    async fn run(&self, id: CanonicalId) -> Result<WorkerReply, WorkerError> {
        let child = self.command(&id).spawn().map_err(|source| WorkerError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        debug!("Spawned worker {:?} for {}", child.id(), id);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| WorkerError::Crashed(e.to_string()))?;
        if !output.status.success() {
            return Err(WorkerError::Crashed(format!("{} ({})", output.status, id)));
        }
        WorkerReply::decode(&output.stdout).map_err(|e| {
            WorkerError::Protocol(format!("{} bytes from {}: {}", output.stdout.len(), id, e))
        })
    }
}
