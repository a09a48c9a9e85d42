//! Per-segment Median Normalization

use crate::robust;
use tracing::warn;

/// Divides every segment by its own median flux so segments taken with
/// different baselines stitch together around 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentNormalizer;

impl SegmentNormalizer {
    /// Normalize `flux` in place and return the divisor that was used.
    ///
    /// Returns `None` (leaving `flux` untouched) when the segment is empty or
    /// its median is not a positive finite number.
    pub fn normalize(&self, segment_index: usize, flux: &mut [f64]) -> Option<f64> {
        let median = robust::median(flux)?;
        if !(median > 0.0) || !median.is_finite() {
            warn!(
                "Segment {} has unusable median flux {}, dropping it",
                segment_index, median
            );
            return None;
        }
        for value in flux.iter_mut() {
            *value /= median;
        }
        Some(median)
    }
}
