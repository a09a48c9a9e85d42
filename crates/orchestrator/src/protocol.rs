//! Worker reply wire format
//!
//! A worker process writes exactly one postcard-encoded [`WorkerReply`] to
//! stdout and exits. Logs go to stderr.

use serde::{Deserialize, Serialize};
use std::fmt;
use target_pipeline::{AcquisitionError, PipelineError, TargetRecord};

/// Failure class reported by a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Acquisition failed but may succeed later
    Transient,
    /// The source has no samples for the target
    NotFound,
    /// Too few points or too short a baseline after cleaning
    InsufficientData,
    /// The worker could not run the pipeline at all
    Internal,
    /// The source holds samples that cannot be decoded
    Corrupt,
}

impl FailureKind {
    /// Whether the driver should retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Transient => "transient",
            FailureKind::NotFound => "not_found",
            FailureKind::InsufficientData => "insufficient_data",
            FailureKind::Internal => "internal",
            FailureKind::Corrupt => "corrupt",
        };
        f.write_str(name)
    }
}

/// One worker's answer for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkerReply {
    Completed(TargetRecord),
    Failed { kind: FailureKind, message: String },
}

impl WorkerReply {
    /// Reply for a pipeline outcome
    pub fn from_result(result: Result<TargetRecord, PipelineError>) -> Self {
        match result {
            Ok(record) => WorkerReply::Completed(record),
            Err(e) => {
                let kind = match &e {
                    PipelineError::Acquisition(AcquisitionError::Transient { .. }) => {
                        FailureKind::Transient
                    }
                    PipelineError::Acquisition(AcquisitionError::NotFound(_)) => {
                        FailureKind::NotFound
                    }
                    PipelineError::Acquisition(AcquisitionError::Corrupt { .. }) => {
                        FailureKind::Corrupt
                    }
                    PipelineError::InsufficientData(_) => FailureKind::InsufficientData,
                };
                WorkerReply::Failed {
                    kind,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Reply for a failure outside the pipeline
    pub fn internal(message: impl Into<String>) -> Self {
        WorkerReply::Failed {
            kind: FailureKind::Internal,
            message: message.into(),
        }
    }

    /// Encode for stdout
    pub fn encode(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decode a worker's stdout
    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
