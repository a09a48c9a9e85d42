//! Box-dip search over one contiguous span.
//!
//! For every trial period the series is folded into phase bins; prefix sums
//! over the (doubled, for wrap-around) bin array give the in-box mean for any
//! start bin and duration in constant time. The detection statistic is the
//! box signal-to-noise `depth / (σ · sqrt(1/n_in + 1/n_out))`.

use crate::budget::Budget;
use crate::params::SearchParams;
use serde::{Deserialize, Serialize};

/// Minimum points inside and outside a box for it to be scored
const MIN_POINTS_PER_SIDE: usize = 3;

/// Best-scoring box of a search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCandidate {
    /// Trial period (days)
    pub period: f64,
    /// Box signal-to-noise
    pub power: f64,
    /// Mean out-of-box minus mean in-box flux (positive for dips)
    pub depth: f64,
    /// Box duration (days)
    pub duration: f64,
    /// Mid-time of one event (days)
    pub epoch: f64,
}

/// Result of searching one span
#[derive(Debug, Clone, Default)]
pub struct SpanOutcome {
    /// Highest-power box, if any trial period was scored
    pub best: Option<BoxCandidate>,
    /// Budget expired before the period grid was exhausted
    pub timed_out: bool,
    /// Folded points plus scored boxes
    pub work_units: u64,
}

/// Search `time`/`flux` over the derived grid.
///
/// `budget` is polled before each trial period and again before each trial
/// duration, so an expired budget stops the search within one duration scan
/// (`n_bins` boxes) even at the longest periods.
///
/// `sigma` is the per-point noise used in the statistic.
pub fn search_span(
    time: &[f64],
    flux: &[f64],
    sigma: f64,
    params: &SearchParams,
    oversample: f64,
    budget: &Budget,
) -> SpanOutcome {
    let mut outcome = SpanOutcome::default();
    if time.len() < 2 * MIN_POINTS_PER_SIDE || !(sigma > 0.0) {
        return outcome;
    }

    let t0 = time[0];
    let total_n = flux.len();
    let total_sum: f64 = flux.iter().sum();
    // Phase resolution: half the shortest trial duration
    let bin_width = params.durations[0] / 2.0;

    let mut counts: Vec<usize> = Vec::new();
    let mut sums: Vec<f64> = Vec::new();
    let mut prefix_n: Vec<usize> = Vec::new();
    let mut prefix_s: Vec<f64> = Vec::new();

    for period in params.period_grid(oversample) {
        if budget.expired() {
            outcome.timed_out = true;
            break;
        }

        let n_bins = ((period / bin_width).ceil() as usize).max(1);
        counts.clear();
        counts.resize(n_bins, 0);
        sums.clear();
        sums.resize(n_bins, 0.0);
        for (&t, &f) in time.iter().zip(flux) {
            let phase = (t - t0).rem_euclid(period) / period;
            let idx = ((phase * n_bins as f64) as usize).min(n_bins - 1);
            counts[idx] += 1;
            sums[idx] += f;
        }

        prefix_n.clear();
        prefix_s.clear();
        prefix_n.push(0);
        prefix_s.push(0.0);
        for i in 0..2 * n_bins {
            let j = i % n_bins;
            prefix_n.push(prefix_n[i] + counts[j]);
            prefix_s.push(prefix_s[i] + sums[j]);
        }

        let mut scored = 0u64;
        for &duration in &params.durations {
            if budget.expired() {
                outcome.timed_out = true;
                break;
            }
            let width = ((duration / period * n_bins as f64).round() as usize)
                .clamp(1, n_bins.saturating_sub(1).max(1));
            for start in 0..n_bins {
                let n_in = prefix_n[start + width] - prefix_n[start];
                let n_out = total_n - n_in;
                if n_in < MIN_POINTS_PER_SIDE || n_out < MIN_POINTS_PER_SIDE {
                    continue;
                }
                scored += 1;
                let sum_in = prefix_s[start + width] - prefix_s[start];
                let depth = (total_sum - sum_in) / n_out as f64 - sum_in / n_in as f64;
                if depth <= 0.0 {
                    continue;
                }
                let power = depth / (sigma * (1.0 / n_in as f64 + 1.0 / n_out as f64).sqrt());
                if outcome.best.map_or(true, |b| power > b.power) {
                    let mid_phase = (start as f64 + width as f64 / 2.0) / n_bins as f64;
                    outcome.best = Some(BoxCandidate {
                        period,
                        power,
                        depth,
                        duration: width as f64 / n_bins as f64 * period,
                        epoch: t0 + mid_phase * period,
                    });
                }
            }
        }
        outcome.work_units += total_n as u64 + scored;
        if outcome.timed_out {
            break;
        }
    }

    outcome
}
