//! Trial period and duration derivation
//!
//! Parameters are derived from the data rather than fixed, so that the
//! longest trial duration is always strictly shorter than the shortest trial
//! period and never longer than what the flattening window preserves.

use crate::search::SearchConfig;
use signal_conditioner::gaps;

/// Derived search grid bounds for one searched span
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Shortest trial period (days)
    pub min_period: f64,
    /// Longest trial period (days)
    pub max_period: f64,
    /// Trial durations (days), ascending
    pub durations: Vec<f64>,
    /// Span of the searched data (days)
    pub baseline: f64,
}

impl SearchParams {
    /// Derive parameters for a time grid, or `None` when the span is too short
    /// to hold the minimum number of events at the shortest period.
    pub fn from_series(time: &[f64], config: &SearchConfig) -> Option<Self> {
        let (first, last) = (time.first()?, time.last()?);
        let cadence = gaps::median_cadence(time)?;
        Self::derive(last - first, cadence, config)
    }

    /// Derive parameters from a baseline and sampling cadence
    pub fn derive(baseline: f64, cadence: f64, config: &SearchConfig) -> Option<Self> {
        if !(baseline > 0.0) || !(cadence > 0.0) {
            return None;
        }

        let min_period = config.min_period_days.max(2.0 * cadence);
        let max_period = (baseline / config.min_events.max(1.0)).min(config.max_period_days);
        if !(max_period > min_period) {
            return None;
        }

        let fraction = config.duration_period_fraction.clamp(0.05, 0.95);
        let max_duration = config
            .max_duration_days
            .min(fraction * min_period)
            .min(config.flatten_window_days / 3.0);
        if !(max_duration > 0.0) {
            return None;
        }

        let min_duration = config.min_duration_days.min(max_duration);
        let durations = if config.n_durations <= 1 || min_duration <= 0.0 || min_duration >= max_duration {
            vec![max_duration]
        } else {
            let n = config.n_durations;
            let step = (max_duration - min_duration) / (n - 1) as f64;
            (0..n).map(|i| min_duration + step * i as f64).collect()
        };

        Some(Self {
            min_period,
            max_period,
            durations,
            baseline,
        })
    }

    /// Longest trial duration
    pub fn max_duration(&self) -> f64 {
        self.durations.last().copied().unwrap_or(0.0)
    }

    /// Trial periods, ascending and geometric in frequency.
    ///
    /// Adjacent frequencies differ by `min_duration / (oversample × baseline)`
    /// relative, which keeps the phase drift accumulated over the baseline
    /// below a fraction of the shortest trial duration.
    pub fn period_grid(&self, oversample: f64) -> Vec<f64> {
        let min_duration = self.durations.first().copied().unwrap_or(self.max_period);
        let step = (min_duration / (oversample.max(1.0) * self.baseline)).clamp(1e-7, 0.5);

        let mut periods = Vec::new();
        let mut period = self.min_period;
        while period <= self.max_period {
            periods.push(period);
            period /= 1.0 - step;
        }
        periods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_derivation() {
        let config = SearchConfig::default();
        let params = SearchParams::derive(120.0, 1.0 / 12.0, &config).unwrap();
        assert_eq!(params.min_period, 0.5);
        assert_eq!(params.max_period, 40.0);
        assert!((params.max_duration() - 0.4).abs() < 1e-12);
        assert_eq!(params.durations.len(), config.n_durations);
    }

    #[test]
    fn test_long_cadence_raises_min_period() {
        let params = SearchParams::derive(300.0, 1.0, &SearchConfig::default()).unwrap();
        assert_eq!(params.min_period, 2.0);
        assert_eq!(params.max_period, 100.0);
        assert!(params.max_duration() <= 0.5);
    }

    #[test]
    fn test_short_baseline_skipped() {
        assert!(SearchParams::derive(1.2, 0.02, &SearchConfig::default()).is_none());
    }

    #[test]
    fn test_period_grid_bounds() {
        let params = SearchParams::derive(60.0, 1.0 / 12.0, &SearchConfig::default()).unwrap();
        let grid = params.period_grid(3.0);
        assert_eq!(grid[0], params.min_period);
        assert!(*grid.last().unwrap() <= params.max_period);
        assert!(grid.windows(2).all(|w| w[1] > w[0]));
    }

    proptest! {
        #[test]
        fn prop_max_duration_below_min_period(
            baseline in 1.0f64..3000.0,
            cadence in 0.0005f64..3.0,
            min_period in 0.01f64..5.0,
            max_duration in 0.01f64..5.0,
            fraction in 0.1f64..1.5,
        ) {
            let config = SearchConfig {
                min_period_days: min_period,
                max_duration_days: max_duration,
                duration_period_fraction: fraction,
                ..SearchConfig::default()
            };
            if let Some(params) = SearchParams::derive(baseline, cadence, &config) {
                prop_assert!(params.max_duration() < params.min_period);
                prop_assert!(params.durations.iter().all(|d| *d > 0.0));
                prop_assert!(params.max_period > params.min_period);
            }
        }
    }
}
