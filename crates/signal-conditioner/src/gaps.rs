//! Gap detection and gap-aware segmentation.
//!
//! Observing intervals are separated by gaps (spacecraft rolls, downlinks,
//! safe modes). Statistics that assume continuous sampling must be computed
//! per contiguous run instead of across gap edges.

use crate::robust;
use std::ops::Range;

/// Gap threshold in units of the median cadence
pub const DEFAULT_GAP_MULTIPLIER: f64 = 3.0;

/// Summary of the gaps in a time series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GapStatistics {
    /// Number of gaps
    pub n_gaps: usize,
    /// Largest gap (time units)
    pub largest_gap: f64,
    /// Fraction of the span not covered by regular sampling (0..=1)
    pub gap_fraction: f64,
}

/// Median spacing between consecutive epochs
pub fn median_cadence(time: &[f64]) -> Option<f64> {
    if time.len() < 2 {
        return None;
    }
    robust::median(&robust::diff(time))
}

/// Indices `i` where the step `time[i] -> time[i + 1]` is a gap
pub fn detect_gaps(time: &[f64], cadence: f64, multiplier: f64) -> Vec<usize> {
    let threshold = multiplier * cadence;
    time.windows(2)
        .enumerate()
        .filter(|(_, w)| w[1] - w[0] > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Split `time` into contiguous runs at gaps, keeping runs of at least
/// `min_points` points.
pub fn contiguous_runs(time: &[f64], multiplier: f64, min_points: usize) -> Vec<Range<usize>> {
    let Some(cadence) = median_cadence(time) else {
        return Vec::new();
    };
    let mut runs = Vec::new();
    let mut start = 0;
    for gap in detect_gaps(time, cadence, multiplier) {
        let end = gap + 1;
        if end - start >= min_points {
            runs.push(start..end);
        }
        start = end;
    }
    if time.len() - start >= min_points {
        runs.push(start..time.len());
    }
    runs
}

/// Gap count, largest gap and uncovered fraction of the span
pub fn gap_statistics(time: &[f64]) -> GapStatistics {
    let Some(cadence) = median_cadence(time) else {
        return GapStatistics::default();
    };
    let gaps = detect_gaps(time, cadence, DEFAULT_GAP_MULTIPLIER);
    if gaps.is_empty() {
        return GapStatistics::default();
    }

    let largest_gap = gaps
        .iter()
        .map(|&i| time[i + 1] - time[i])
        .fold(0.0, f64::max);
    let span = time[time.len() - 1] - time[0];
    let covered = time.len() as f64 * cadence;
    let gap_fraction = if span > 0.0 {
        ((span - covered) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };

    GapStatistics {
        n_gaps: gaps.len(),
        largest_gap,
        gap_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_gap() -> Vec<f64> {
        let mut time: Vec<f64> = (0..100).map(|i| i as f64 * 0.02).collect();
        time.extend((0..50).map(|i| 10.0 + i as f64 * 0.02));
        time
    }

    #[test]
    fn test_detect_single_gap() {
        let time = with_gap();
        let cadence = median_cadence(&time).unwrap();
        assert!((cadence - 0.02).abs() < 1e-9);
        assert_eq!(detect_gaps(&time, cadence, 3.0), vec![99]);
    }

    #[test]
    fn test_runs_drop_short_segments() {
        let time = with_gap();
        assert_eq!(contiguous_runs(&time, 3.0, 10), vec![0..100, 100..150]);
        assert_eq!(contiguous_runs(&time, 3.0, 60), vec![0..100]);
    }

    #[test]
    fn test_gap_statistics() {
        let stats = gap_statistics(&with_gap());
        assert_eq!(stats.n_gaps, 1);
        assert!((stats.largest_gap - (10.0 - 99.0 * 0.02)).abs() < 1e-9);
        assert!(stats.gap_fraction > 0.5);
    }

    #[test]
    fn test_no_gaps() {
        let time: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(gap_statistics(&time), GapStatistics::default());
    }
}
