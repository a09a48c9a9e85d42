//! Target Pipeline
//!
//! Fetches one target's raw segments, conditions them, runs every feature
//! domain with per-domain fault isolation and assembles the persisted record.

mod pipeline;
mod source;
mod status;

pub use pipeline::{PipelineStage, Provenance, TargetPipeline, TargetRecord};
pub use source::{AcquisitionError, DirectorySource, MemorySource, RawSampleSource, RawTarget};
pub use status::{DomainFault, FaultReason, ProcessingStatus};

use serde::{Deserialize, Serialize};
use signal_conditioner::ConditionError;
use thiserror::Error;

/// Per-target failures. Domain faults are not errors; they are recorded on
/// the [`TargetRecord`].
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
    #[error("{0}")]
    InsufficientData(#[from] ConditionError),
}

impl PipelineError {
    /// Whether the orchestrator should retry the target
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::Acquisition(e) if e.is_transient())
    }
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Wall-clock limit for the residual complexity measure (ms)
    pub complexity_budget_ms: u64,
    /// Enforce the search budget with an OS alarm signal
    pub signal_budget: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            complexity_budget_ms: 5000,
            signal_budget: false,
        }
    }
}
