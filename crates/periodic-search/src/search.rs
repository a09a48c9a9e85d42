//! Segmented, bounded periodic search

use crate::bls::{self, BoxCandidate};
use crate::budget::Budget;
use crate::params::SearchParams;
use crate::prepare;
use crate::vetting::{self, Vetting};
use serde::{Deserialize, Serialize};
use signal_conditioner::robust;
use tracing::{debug, info, warn};

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Running-median flatten window (days)
    pub flatten_window_days: f64,
    /// Bin width applied before searching (hours)
    pub bin_hours: f64,
    /// Spans longer than 1.5× this are searched in segments of about this length (days)
    pub max_segment_days: f64,
    /// Segments with fewer binned points are skipped
    pub min_segment_points: usize,
    /// Floor on the shortest trial period (days)
    pub min_period_days: f64,
    /// Cap on the longest trial period (days)
    pub max_period_days: f64,
    /// Events required within a span at the longest trial period
    pub min_events: f64,
    /// Shortest trial duration (days)
    pub min_duration_days: f64,
    /// Cap on the longest trial duration (days)
    pub max_duration_days: f64,
    /// Longest trial duration as a fraction of the shortest trial period (< 1)
    pub duration_period_fraction: f64,
    /// Number of trial durations
    pub n_durations: usize,
    /// Period grid oversampling
    pub oversample: f64,
    /// Power at or above which a candidate is significant
    pub significance_threshold: f64,
    /// Wall-clock budget per target (seconds)
    pub budget_secs: u64,
    /// Primary radius used when the target has none (solar radii)
    pub reference_radius_rsun: f64,
    /// Largest plausible companion radius (Jupiter radii)
    pub max_plausible_radius_rjup: f64,
    /// Odd/even difference threshold in combined standard errors
    pub odd_even_sigma: f64,
    /// Odd/even difference threshold relative to the mean depth
    pub odd_even_rel_tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            flatten_window_days: 2.0,
            bin_hours: 2.0,
            max_segment_days: 350.0,
            min_segment_points: 100,
            min_period_days: 0.5,
            max_period_days: 100.0,
            min_events: 3.0,
            min_duration_days: 0.08,
            max_duration_days: 0.5,
            duration_period_fraction: 0.8,
            n_durations: 8,
            oversample: 3.0,
            significance_threshold: 7.1,
            budget_secs: 60,
            reference_radius_rsun: 1.0,
            max_plausible_radius_rjup: 2.0,
            odd_even_sigma: 3.0,
            odd_even_rel_tolerance: 0.1,
        }
    }
}

/// Outcome of a periodic search.
///
/// `best` is populated whenever at least one trial period was scored, with
/// or without significance. It is `None` only when the search never ran or
/// the budget expired before anything was scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Highest-power candidate over all segments
    pub best: Option<BoxCandidate>,
    /// `best.power >= threshold`; `None` when there is no candidate
    pub significant: Option<bool>,
    /// Segments actually searched
    pub segments_searched: usize,
    /// The budget expired before the search finished
    pub timed_out: bool,
    /// Deterministic cost measure (folded points plus scored boxes)
    pub work_units: u64,
    /// Plausibility checks, present only for significant candidates
    pub vetting: Option<Vetting>,
}

/// Bounded periodic search engine
pub struct PeriodicSearch {
    config: SearchConfig,
}

impl PeriodicSearch {
    /// Create an engine with the given configuration
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Active configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search a cleaned series, polling `budget` between trial periods.
    ///
    /// On budget exhaustion the best candidate found so far is returned with
    /// `timed_out` set.
    pub fn run(
        &self,
        time: &[f64],
        flux: &[f64],
        stellar_radius: Option<f64>,
        budget: &Budget,
    ) -> SearchResult {
        let config = &self.config;
        let mut result = SearchResult::default();
        if time.len() != flux.len() || time.len() < 2 {
            return result;
        }

        let prepared = prepare::prepare(
            time,
            flux,
            config.flatten_window_days,
            config.bin_hours / 24.0,
        );

        for (index, (lo, hi)) in segment_bounds(&prepared.time, config.max_segment_days)
            .into_iter()
            .enumerate()
        {
            if budget.expired() {
                result.timed_out = true;
                break;
            }
            let seg_time = &prepared.time[lo..hi];
            let seg_flux = &prepared.flux[lo..hi];
            if seg_time.len() < config.min_segment_points {
                debug!("Segment {} has {} points, skipping", index, seg_time.len());
                continue;
            }
            let Some(params) = SearchParams::from_series(seg_time, config) else {
                debug!("Segment {} too short for the minimum period, skipping", index);
                continue;
            };
            let Some((_, sigma)) = robust::center_and_spread(seg_flux) else {
                continue;
            };

            let outcome = bls::search_span(
                seg_time,
                seg_flux,
                sigma,
                &params,
                config.oversample,
                budget,
            );
            result.segments_searched += 1;
            result.work_units += outcome.work_units;
            debug!(
                "Segment {}: {} points, periods {:.2}-{:.2} d, power {:?}",
                index,
                seg_time.len(),
                params.min_period,
                params.max_period,
                outcome.best.map(|b| b.power)
            );

            if let Some(candidate) = outcome.best {
                if result.best.map_or(true, |b| candidate.power > b.power) {
                    result.best = Some(candidate);
                }
            }
            if outcome.timed_out {
                result.timed_out = true;
                break;
            }
        }

        if result.timed_out {
            warn!(
                "Periodic search budget exhausted after {} segments",
                result.segments_searched
            );
        }

        result.significant = result
            .best
            .map(|b| b.power >= config.significance_threshold);
        if let (Some(true), Some(best)) = (result.significant, result.best.as_ref()) {
            result.vetting = Some(vetting::vet(
                time,
                &prepared.flat_flux,
                best,
                stellar_radius,
                config,
            ));
        }

        if let Some(best) = result.best {
            info!(
                "Search complete: power={:.2}, period={:.3}d, significant={}",
                best.power,
                best.period,
                result.significant.unwrap_or(false)
            );
        }
        result
    }
}

impl Default for PeriodicSearch {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

/// Index ranges of equal-length time windows covering `time`.
///
/// A single window is used unless the span exceeds 1.5× `max_segment`.
fn segment_bounds(time: &[f64], max_segment: f64) -> Vec<(usize, usize)> {
    let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
        return Vec::new();
    };
    let baseline = last - first;
    if !(max_segment > 0.0) || baseline <= 1.5 * max_segment {
        return vec![(0, time.len())];
    }

    let n_segments = (baseline / max_segment).ceil() as usize;
    let width = baseline / n_segments as f64;
    let mut bounds = Vec::with_capacity(n_segments);
    let mut lo = 0;
    for i in 1..=n_segments {
        let hi = if i == n_segments {
            time.len()
        } else {
            let edge = first + width * i as f64;
            time.partition_point(|&t| t < edge)
        };
        bounds.push((lo, hi));
        lo = hi;
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy(baseline: f64, cadence: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = (baseline / cadence) as usize;
        let time: Vec<f64> = (0..n).map(|i| i as f64 * cadence).collect();
        let flux = (0..n)
            .map(|_| 1.0 + 1e-3 * (rng.random::<f64>() - 0.5))
            .collect();
        (time, flux)
    }

    fn small_config() -> SearchConfig {
        SearchConfig {
            max_segment_days: 40.0,
            max_period_days: 8.0,
            min_duration_days: 0.2,
            n_durations: 2,
            oversample: 1.0,
            bin_hours: 6.0,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_segment_bounds() {
        let time: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        assert_eq!(segment_bounds(&time, 350.0), vec![(0, 333), (333, 666), (666, 1000)]);
        assert_eq!(segment_bounds(&time[..500], 350.0), vec![(0, 500)]);
    }

    #[test]
    fn test_long_baseline_is_segmented() {
        let (time, flux) = noisy(200.0, 0.25, 1);
        let result = PeriodicSearch::new(small_config()).run(&time, &flux, None, &Budget::Unbounded);
        assert_eq!(result.segments_searched, 5);
        assert!(result.best.is_some());
        assert!(result.significant.is_some());
    }

    #[test]
    fn test_cost_grows_linearly_past_segment_ceiling() {
        let engine = PeriodicSearch::new(small_config());
        let work: Vec<f64> = [120.0, 240.0, 480.0]
            .iter()
            .map(|&baseline| {
                let (time, flux) = noisy(baseline, 0.25, 7);
                engine.run(&time, &flux, None, &Budget::Unbounded).work_units as f64
            })
            .collect();

        for pair in work.windows(2) {
            let ratio = pair[1] / pair[0];
            assert!((1.6..2.4).contains(&ratio), "ratio {ratio}");
        }
    }

    #[test]
    fn test_search_never_ran() {
        let (time, flux) = noisy(1.0, 0.02, 3);
        let result = PeriodicSearch::default().run(&time, &flux, None, &Budget::Unbounded);
        assert!(result.best.is_none());
        assert_eq!(result.significant, None);
        assert_eq!(result.segments_searched, 0);
        assert!(!result.timed_out);
    }

    #[test]
    fn test_expired_budget_flags_timeout() {
        let (time, flux) = noisy(100.0, 0.02, 4);
        let budget = Budget::clock(std::time::Duration::ZERO);
        let result = PeriodicSearch::default().run(&time, &flux, None, &budget);
        assert!(result.timed_out);
        assert!(result.best.is_none());
    }

    #[test]
    fn test_noise_is_not_significant() {
        let (time, flux) = noisy(100.0, 1.0 / 48.0, 5);
        let result = PeriodicSearch::default().run(&time, &flux, None, &Budget::Unbounded);
        assert_eq!(result.significant, Some(false));
        assert!(result.best.is_some());
        assert!(result.vetting.is_none());
    }
}
