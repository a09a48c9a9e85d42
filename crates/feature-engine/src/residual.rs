//! Residual and Complexity Features
//!
//! Computed on the residuals of a cubic fit against time.

use crate::features::{DomainContext, FeatureDomain};
use crate::numeric;
use crate::record::{Domain, DomainFeatures};
use periodic_search::Budget;
use signal_conditioner::{robust, CleanedSeries};
use std::time::Duration;
use tracing::warn;

const MIN_POINTS: usize = 100;
const MIN_SPAN_DAYS: f64 = 7.0;
const HISTOGRAM_BINS: usize = 20;
const COMPLEXITY_SYMBOLS: usize = 10;
/// Inner iterations between budget polls
const POLL_EVERY: u32 = 4096;

/// Lempel-Ziv complexity could not finish within its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexityTimeout;

/// Quantize values into `symbols` equal-width levels
fn symbolize(values: &[f64], symbols: usize) -> Option<Vec<u8>> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (hi - lo) / symbols as f64;
    if !(width > 0.0) {
        return None;
    }
    Some(
        values
            .iter()
            .map(|v| (((v - lo) / width) as usize).min(symbols - 1) as u8)
            .collect(),
    )
}

/// Normalized Lempel-Ziv (1976) complexity, `c · log2(n) / n`.
///
/// Uses the Kaspar-Schuster phrase parsing and polls `budget` while it runs.
pub fn lempel_ziv_complexity(values: &[f64], budget: &Budget) -> Result<f64, ComplexityTimeout> {
    let n = values.len();
    if n < 10 {
        return Ok(0.0);
    }
    let Some(s) = symbolize(values, COMPLEXITY_SYMBOLS) else {
        return Ok(0.0);
    };

    let (mut i, mut k, mut l) = (0usize, 1usize, 1usize);
    let (mut c, mut k_max) = (1usize, 1usize);
    let mut polls = 0u32;
    loop {
        polls += 1;
        if polls == POLL_EVERY {
            polls = 0;
            if budget.expired() {
                return Err(ComplexityTimeout);
            }
        }
        if s[i + k - 1] == s[l + k - 1] {
            k += 1;
            if l + k > n {
                c += 1;
                break;
            }
        } else {
            k_max = k_max.max(k);
            i += 1;
            if i == l {
                c += 1;
                l += k_max;
                if l + 1 > n {
                    break;
                }
                i = 0;
                k = 1;
                k_max = 1;
            } else {
                k = 1;
            }
        }
    }
    Ok(c as f64 * (n as f64).log2() / n as f64)
}

/// Two-sided Wald-Wolfowitz runs test p-value about the median
pub fn runs_test_pvalue(values: &[f64]) -> Option<f64> {
    let median = robust::median(values)?;
    let above: Vec<bool> = values.iter().map(|v| *v > median).collect();
    let runs = 1 + above.windows(2).filter(|w| w[0] != w[1]).count();
    let n_pos = above.iter().filter(|a| **a).count() as f64;
    let n_neg = above.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Some(0.5);
    }
    let total = n_pos + n_neg;
    let expected = 1.0 + 2.0 * n_pos * n_neg / total;
    let variance = 2.0 * n_pos * n_neg * (2.0 * n_pos * n_neg - total)
        / (total * total * (total - 1.0));
    if !(variance > 0.0) {
        return Some(0.5);
    }
    let z = (runs as f64 - expected) / variance.sqrt();
    Some((2.0 * numeric::normal_sf(z.abs())).clamp(0.0, 1.0))
}

/// Ljung-Box Q statistic over lags `1..=lags`
pub fn ljung_box(values: &[f64], lags: usize) -> Option<f64> {
    let n = values.len();
    if lags == 0 || n <= lags {
        return None;
    }
    let mean = numeric::mean(values)?;
    let c0: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if !(c0 > 0.0) {
        return Some(0.0);
    }
    let q: f64 = (1..=lags)
        .map(|k| {
            let ck: f64 = values[..n - k]
                .iter()
                .zip(&values[k..])
                .map(|(a, b)| (a - mean) * (b - mean))
                .sum();
            let r = ck / c0;
            r * r / (n - k) as f64
        })
        .sum();
    Some(n as f64 * (n as f64 + 2.0) * q)
}

/// Entropy of a density-normalized histogram
fn histogram_entropy(values: &[f64], bins: usize) -> f64 {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (hi - lo) / bins as f64;
    if !(width > 0.0) {
        return 0.0;
    }
    let mut counts = vec![0usize; bins];
    for v in values {
        counts[(((v - lo) / width) as usize).min(bins - 1)] += 1;
    }
    let norm = values.len() as f64 * width;
    -counts
        .iter()
        .filter(|c| **c > 0)
        .map(|&c| {
            let density = c as f64 / norm;
            density * density.ln()
        })
        .sum::<f64>()
}

/// Residual and complexity domain
#[derive(Debug)]
pub struct ResidualDomain {
    complexity_budget: Duration,
}

impl ResidualDomain {
    /// Create the domain with a wall-clock budget for the complexity measure
    pub fn new(complexity_budget: Duration) -> Self {
        Self { complexity_budget }
    }
}

impl Default for ResidualDomain {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl FeatureDomain for ResidualDomain {
    fn domain(&self) -> Domain {
        Domain::Residual
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Residual);
        let n = series.len();
        if n < MIN_POINTS || series.span() < MIN_SPAN_DAYS {
            return out;
        }
        let Some(coeffs) = numeric::polyfit(&series.time, &series.flux, 3) else {
            return out;
        };
        let residuals: Vec<f64> = series
            .time
            .iter()
            .zip(&series.flux)
            .map(|(t, f)| f - numeric::polyval(&coeffs, *t))
            .collect();

        if let Some(std) = numeric::std_dev(&residuals) {
            out.set_value("resid_std", std);
        }
        let autocorr = numeric::autocorr(&residuals, 1);
        out.set_value("resid_autocorr_lag1", autocorr);

        let power_ratio = match (
            numeric::variance(&series.flux, 1),
            numeric::variance(&residuals, 1),
        ) {
            (Some(original), Some(residual)) if original > 0.0 => residual / original,
            _ => 0.0,
        };
        out.set_value("resid_power_ratio", power_ratio);
        out.set_value(
            "resid_structure_score",
            ((autocorr.abs() + power_ratio) / 2.0).clamp(0.0, 1.0),
        );
        out.set_value("resid_entropy", histogram_entropy(&residuals, HISTOGRAM_BINS));

        if let Some(p) = runs_test_pvalue(&residuals) {
            out.set_value("resid_runs_test_pvalue", p);
        }
        if let Some(q) = ljung_box(&residuals, (n / 4).min(10)) {
            out.set_value("resid_ljung_box_stat", q);
        }

        let budget = Budget::clock(self.complexity_budget);
        match lempel_ziv_complexity(&residuals, &budget) {
            Ok(complexity) => out.set_value("resid_complexity", complexity),
            Err(ComplexityTimeout) => {
                warn!(
                    "Complexity measure exceeded {:?} on {} points",
                    self.complexity_budget, n
                );
                out.timed_out = true;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.random::<f64>() - 0.5).collect()
    }

    #[test]
    fn test_complexity_orders_regular_below_random() {
        let periodic: Vec<f64> = (0..2000).map(|i| (i % 10) as f64).collect();
        let regular = lempel_ziv_complexity(&periodic, &Budget::Unbounded).unwrap();
        let random = lempel_ziv_complexity(&noise(2000, 1), &Budget::Unbounded).unwrap();
        assert!(regular < random / 5.0, "regular {regular} random {random}");
    }

    #[test]
    fn test_complexity_times_out() {
        let budget = Budget::clock(Duration::ZERO);
        assert_eq!(
            lempel_ziv_complexity(&noise(50_000, 2), &budget),
            Err(ComplexityTimeout)
        );
    }

    #[test]
    fn test_runs_test_on_alternating_series() {
        let alternating: Vec<f64> = (0..200).map(|i| (i % 2) as f64).collect();
        assert!(runs_test_pvalue(&alternating).unwrap() < 1e-6);
        let p = runs_test_pvalue(&noise(500, 3)).unwrap();
        assert!(p > 0.001);
    }

    #[test]
    fn test_ljung_box_detects_correlation() {
        let white = ljung_box(&noise(1000, 4), 10).unwrap();
        let smooth: Vec<f64> = (0..1000).map(|i| (i as f64 / 50.0).sin()).collect();
        let correlated = ljung_box(&smooth, 10).unwrap();
        assert!(correlated > 10.0 * white);
    }

    #[test]
    fn test_histogram_entropy_of_constant_is_zero() {
        assert_eq!(histogram_entropy(&[1.0; 50], 20), 0.0);
    }
}
