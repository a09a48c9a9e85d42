//! Storage Layer
//!
//! Durable completion checkpoint, canonical target identifiers and record
//! sinks.

mod checkpoint;
mod ids;
mod sink;

pub use checkpoint::{CheckpointCounts, CheckpointEntry, CheckpointStore, TargetStatus};
pub use ids::CanonicalId;
pub use sink::{DirectorySink, MemorySink, RecordSink};

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Checkpoint write to {path:?} failed: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid target id: {0:?}")]
    InvalidId(String),
    #[error("Lock error: {0}")]
    Lock(String),
}
