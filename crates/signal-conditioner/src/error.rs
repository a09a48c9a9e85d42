//! Conditioning Error Types

use thiserror::Error;

/// Errors during signal conditioning
#[derive(Debug, Clone, Error)]
pub enum ConditionError {
    /// Not enough usable data to build a series
    #[error("Insufficient data: {reason}")]
    InsufficientData { reason: String },

    /// Parallel arrays of a segment disagree in length
    #[error("Segment {index} is malformed: {detail}")]
    InvalidSegment { index: usize, detail: String },
}

impl ConditionError {
    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        ConditionError::InsufficientData {
            reason: reason.into(),
        }
    }
}
