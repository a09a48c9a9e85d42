//! Signal Conditioning
//!
//! Turns raw observation segments into one cleaned, normalized light curve:
//! quality filtering, per-segment median normalization, stitching, and
//! all-or-nothing outlier clipping.

mod conditioner;
mod error;
mod filter;
pub mod gaps;
mod normalizer;
mod quality;
pub mod robust;

pub use conditioner::{ClipOutcome, Conditioner, ConditionerConfig};
pub use error::ConditionError;
pub use filter::MedianFilter;
pub use normalizer::SegmentNormalizer;
pub use quality::QualityFlags;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One contiguous observation interval as delivered by the raw-sample source.
///
/// `time`, `flux` and `quality` are parallel arrays. Auxiliary per-epoch
/// columns (centroid positions and the like) are carried in `columns` and
/// must have the same length as `time` to be kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSegment {
    /// Epoch times (days)
    pub time: Vec<f64>,
    /// Flux values (arbitrary instrument units)
    pub flux: Vec<f64>,
    /// Quality bitmask per epoch
    pub quality: Vec<u32>,
    /// Auxiliary per-epoch columns keyed by their source field name
    #[serde(default)]
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl RawSegment {
    /// Build a segment with no quality flags and no auxiliary columns
    pub fn new(time: Vec<f64>, flux: Vec<f64>) -> Self {
        let quality = vec![0; time.len()];
        Self {
            time,
            flux,
            quality,
            columns: BTreeMap::new(),
        }
    }

    /// Attach an auxiliary column
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.columns.insert(name.to_string(), values);
        self
    }

    /// Number of epochs
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if the segment has no epochs
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time of the first epoch, if any
    pub fn start(&self) -> Option<f64> {
        self.time.first().copied()
    }
}

/// A stitched, normalized and outlier-suppressed light curve.
///
/// Time is strictly increasing. Flux is normalized so its mean is close to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedSeries {
    /// Epoch times (days), strictly increasing
    pub time: Vec<f64>,
    /// Normalized flux
    pub flux: Vec<f64>,
    /// Auxiliary columns aligned with `time` (NaN where a segment lacked the column)
    pub columns: BTreeMap<String, Vec<f64>>,
    /// What the outlier clip did
    pub clip: ClipOutcome,
    /// Points delivered by the source
    pub n_raw: usize,
    /// Points dropped for quality flags or non-finite values
    pub n_quality_dropped: usize,
    /// Segments that contributed points
    pub n_segments: usize,
}

impl CleanedSeries {
    /// Number of points
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Time span from first to last epoch
    pub fn span(&self) -> f64 {
        match (self.time.first(), self.time.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Whether the clip was refused because too many points were outliers
    pub fn is_high_variability(&self) -> bool {
        matches!(self.clip, ClipOutcome::Unclipped { .. })
    }

    /// Look up an auxiliary column by exact name
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|c| c.as_slice())
    }
}
