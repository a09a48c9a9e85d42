//! Signal Conditioner
//!
//! Quality filter → per-segment normalization → stitch → robust clip.

use crate::error::ConditionError;
use crate::normalizer::SegmentNormalizer;
use crate::quality::QualityFlags;
use crate::robust;
use crate::{CleanedSeries, RawSegment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Conditioner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionerConfig {
    /// Quality bits that cause an epoch to be dropped
    pub quality_mask: QualityFlags,
    /// Minimum points after cleaning
    pub min_points: usize,
    /// Minimum time span after cleaning (days)
    pub min_span_days: f64,
    /// Outlier threshold in robust sigmas
    pub clip_sigma: f64,
    /// Outliers are only removed when they make up less than this fraction
    pub max_clip_fraction: f64,
}

impl Default for ConditionerConfig {
    fn default() -> Self {
        Self {
            quality_mask: QualityFlags::default(),
            min_points: 500,
            min_span_days: 90.0,
            clip_sigma: 5.0,
            max_clip_fraction: 0.05,
        }
    }
}

/// What the outlier clip did to a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipOutcome {
    /// No point was beyond the threshold
    NotNeeded,
    /// Outliers were removed
    Clipped { removed: usize },
    /// Too many outliers; the series was kept unmodified
    Unclipped { outlier_fraction: f64 },
}

/// A segment after quality filtering and normalization
struct Prepared {
    time: Vec<f64>,
    flux: Vec<f64>,
    columns: BTreeMap<String, Vec<f64>>,
}

/// Turns raw segments into a [`CleanedSeries`]
pub struct Conditioner {
    config: ConditionerConfig,
    normalizer: SegmentNormalizer,
}

impl Conditioner {
    /// Create a conditioner with the given configuration
    pub fn new(config: ConditionerConfig) -> Self {
        Self {
            config,
            normalizer: SegmentNormalizer,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ConditionerConfig {
        &self.config
    }

    /// Clean, normalize and stitch `segments` into one series
    pub fn condition(&self, segments: &[RawSegment]) -> Result<CleanedSeries, ConditionError> {
        let column_names: BTreeSet<&str> = segments
            .iter()
            .flat_map(|s| s.columns.keys().map(String::as_str))
            .collect();

        let mut n_raw = 0;
        let mut n_quality_dropped = 0;
        let mut prepared = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            validate(index, segment)?;
            n_raw += segment.len();

            let keep: Vec<bool> = (0..segment.len())
                .map(|i| {
                    self.config.quality_mask.accepts(
                        segment.time[i],
                        segment.flux[i],
                        segment.quality[i],
                    )
                })
                .collect();
            let kept = keep.iter().filter(|k| **k).count();
            n_quality_dropped += segment.len() - kept;
            if kept == 0 {
                debug!("Segment {} has no usable points", index);
                continue;
            }

            let time = select(&segment.time, &keep);
            let mut flux = select(&segment.flux, &keep);
            if self.normalizer.normalize(index, &mut flux).is_none() {
                n_quality_dropped += kept;
                continue;
            }

            let columns = column_names
                .iter()
                .map(|&name| {
                    let values = match segment.columns.get(name) {
                        Some(col) if col.len() == segment.len() => select(col, &keep),
                        Some(col) => {
                            warn!(
                                "Segment {} column {} has {} values for {} epochs, ignoring it",
                                index,
                                name,
                                col.len(),
                                segment.len()
                            );
                            vec![f64::NAN; kept]
                        }
                        None => vec![f64::NAN; kept],
                    };
                    (name.to_string(), values)
                })
                .collect();

            prepared.push(Prepared {
                time,
                flux,
                columns,
            });
        }

        let n_segments = prepared.len();
        if n_segments == 0 {
            return Err(ConditionError::insufficient(format!(
                "no usable points in {} segments",
                segments.len()
            )));
        }

        let (time, flux, columns) = stitch(prepared);
        self.check_extent(&time)?;

        let (time, flux, columns, clip) = self.clip(time, flux, columns);
        self.check_extent(&time)?;

        debug!(
            "Conditioned {} raw points into {} ({} quality-dropped, {:?})",
            n_raw,
            time.len(),
            n_quality_dropped,
            clip
        );

        Ok(CleanedSeries {
            time,
            flux,
            columns,
            clip,
            n_raw,
            n_quality_dropped,
            n_segments,
        })
    }

    fn check_extent(&self, time: &[f64]) -> Result<(), ConditionError> {
        if time.len() < self.config.min_points {
            return Err(ConditionError::insufficient(format!(
                "{} points, need {}",
                time.len(),
                self.config.min_points
            )));
        }
        let span = time[time.len() - 1] - time[0];
        if span < self.config.min_span_days {
            return Err(ConditionError::insufficient(format!(
                "span {:.1} days, need {:.1}",
                span, self.config.min_span_days
            )));
        }
        Ok(())
    }

    /// All-or-nothing robust clip
    #[allow(clippy::type_complexity)]
    fn clip(
        &self,
        time: Vec<f64>,
        flux: Vec<f64>,
        columns: BTreeMap<String, Vec<f64>>,
    ) -> (Vec<f64>, Vec<f64>, BTreeMap<String, Vec<f64>>, ClipOutcome) {
        let Some((center, spread)) = robust::center_and_spread(&flux) else {
            return (time, flux, columns, ClipOutcome::NotNeeded);
        };
        if !(spread > 0.0) {
            return (time, flux, columns, ClipOutcome::NotNeeded);
        }

        let limit = self.config.clip_sigma * spread;
        let keep: Vec<bool> = flux.iter().map(|f| (f - center).abs() <= limit).collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return (time, flux, columns, ClipOutcome::NotNeeded);
        }

        let outlier_fraction = removed as f64 / flux.len() as f64;
        if outlier_fraction >= self.config.max_clip_fraction {
            warn!(
                "Outlier fraction {:.3} exceeds {:.3}, keeping series unclipped",
                outlier_fraction, self.config.max_clip_fraction
            );
            return (
                time,
                flux,
                columns,
                ClipOutcome::Unclipped { outlier_fraction },
            );
        }

        let columns = columns
            .into_iter()
            .map(|(name, values)| (name, select(&values, &keep)))
            .collect();
        (
            select(&time, &keep),
            select(&flux, &keep),
            columns,
            ClipOutcome::Clipped { removed },
        )
    }
}

impl Default for Conditioner {
    fn default() -> Self {
        Self::new(ConditionerConfig::default())
    }
}

fn validate(index: usize, segment: &RawSegment) -> Result<(), ConditionError> {
    if segment.flux.len() != segment.time.len() {
        return Err(ConditionError::InvalidSegment {
            index,
            detail: format!(
                "{} flux values for {} epochs",
                segment.flux.len(),
                segment.time.len()
            ),
        });
    }
    if segment.quality.len() != segment.time.len() {
        return Err(ConditionError::InvalidSegment {
            index,
            detail: format!(
                "{} quality values for {} epochs",
                segment.quality.len(),
                segment.time.len()
            ),
        });
    }
    Ok(())
}

fn select(values: &[f64], keep: &[bool]) -> Vec<f64> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| *v)
        .collect()
}

/// Concatenate segments in start-time order. Overlapping segments are merged
/// by sorting, and repeated timestamps keep their first occurrence.
fn stitch(mut prepared: Vec<Prepared>) -> (Vec<f64>, Vec<f64>, BTreeMap<String, Vec<f64>>) {
    prepared.sort_by(|a, b| a.time[0].total_cmp(&b.time[0]));

    let mut time = Vec::new();
    let mut flux = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for segment in prepared {
        time.extend(segment.time);
        flux.extend(segment.flux);
        for (name, values) in segment.columns {
            columns.entry(name).or_default().extend(values);
        }
    }

    if time.windows(2).all(|w| w[1] > w[0]) {
        return (time, flux, columns);
    }

    warn!("Stitched series is not strictly increasing in time, re-sorting");
    let mut order: Vec<usize> = (0..time.len()).collect();
    order.sort_by(|&a, &b| time[a].total_cmp(&time[b]));
    let mut unique: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        match unique.last() {
            Some(&last) if time[last] == time[i] => {}
            _ => unique.push(i),
        }
    }

    let reorder = |values: &[f64]| unique.iter().map(|&i| values[i]).collect::<Vec<f64>>();
    let columns = columns
        .iter()
        .map(|(name, values)| (name.clone(), reorder(values)))
        .collect();
    (reorder(&time), reorder(&flux), columns)
}
