//! Temporal Structure Features
//!
//! Autocorrelation is computed per contiguous run and averaged weighted by
//! run length, so gaps never pair samples across an interruption.

use crate::features::{DomainContext, FeatureDomain};
use crate::numeric;
use crate::record::{Domain, DomainFeatures};
use signal_conditioner::{gaps, robust, CleanedSeries};

const HOUR: f64 = 1.0 / 24.0;
const DAY: f64 = 1.0;
const WEEK: f64 = 7.0;

/// Weighted mean of per-run autocorrelation at `lag` points
pub fn gap_aware_autocorr(time: &[f64], flux: &[f64], lag: usize, min_run: usize) -> Option<f64> {
    let runs = gaps::contiguous_runs(time, gaps::DEFAULT_GAP_MULTIPLIER, min_run.max(lag + 10));
    if runs.is_empty() {
        return (lag + 10 <= flux.len()).then(|| numeric::autocorr(flux, lag));
    }
    let mut total = 0.0;
    let mut weight = 0.0;
    for run in runs {
        let w = run.len() as f64;
        total += numeric::autocorr(&flux[run], lag) * w;
        weight += w;
    }
    (weight > 0.0).then(|| total / weight)
}

/// Hurst exponent by rescaled-range analysis, clamped to 0..=1
pub fn hurst_exponent(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 100 {
        return None;
    }
    let max_k = (n as f64).log2() as u32;

    let mut log_n = Vec::new();
    let mut log_rs = Vec::new();
    for k in 2..max_k {
        let size = 1usize << k;
        let mut rs_values = Vec::new();
        let mut start = 0;
        while start + size < n {
            let chunk = &values[start..start + size];
            let mean = chunk.iter().sum::<f64>() / size as f64;
            let mut cum = 0.0;
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for v in chunk {
                cum += v - mean;
                lo = lo.min(cum);
                hi = hi.max(cum);
            }
            if let Some(s) = numeric::std_dev(chunk) {
                if s > 0.0 {
                    rs_values.push((hi - lo) / s);
                }
            }
            start += size;
        }
        if let Some(rs) = numeric::mean(&rs_values) {
            log_n.push((size as f64).ln());
            log_rs.push(rs.ln());
        }
    }

    if log_rs.len() <= 2 {
        return None;
    }
    numeric::linear_fit(&log_n, &log_rs).map(|(slope, _)| slope.clamp(0.0, 1.0))
}

/// Dickey-Fuller style t statistic with one lagged difference.
///
/// Regresses `Δy_t` on `y_{t-1}`, `Δy_{t-1}` and a constant; strongly
/// negative values indicate a stationary series.
pub fn stationarity_statistic(values: &[f64]) -> Option<f64> {
    if values.len() < 50 {
        return None;
    }
    let diff = robust::diff(values);
    // Rows t = 2..n: Δy_t = diff[t-1], y_{t-1} = values[t-1], Δy_{t-1} = diff[t-2]
    let y: Vec<f64> = diff[1..].to_vec();
    let level: Vec<f64> = values[1..values.len() - 1].to_vec();
    let lagged: Vec<f64> = diff[..diff.len() - 1].to_vec();
    let constant = vec![1.0; y.len()];

    let fit = numeric::ols(&[level, lagged, constant], &y)?;
    let se = fit.std_errors[0];
    (se > 0.0).then(|| fit.coefficients[0] / se)
}

/// Temporal structure domain
#[derive(Debug, Default)]
pub struct TemporalDomain;

impl FeatureDomain for TemporalDomain {
    fn domain(&self) -> Domain {
        Domain::Temporal
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Temporal);
        let (time, flux) = (&series.time, &series.flux);
        let n = time.len();
        if n == 0 {
            return out;
        }
        let duration = series.span();
        out.set_value("temp_duration_days", duration);
        out.set_value("temp_n_points", n as f64);

        let Some(cadence) = gaps::median_cadence(time) else {
            return out;
        };
        out.set_value("temp_cadence_median", cadence);
        if let Some(std) = numeric::std_dev(&robust::diff(time)) {
            out.set_value("temp_cadence_std", std);
        }

        let gap_stats = gaps::gap_statistics(time);
        out.set_value("temp_n_gaps", gap_stats.n_gaps as f64);
        out.set_value("temp_largest_gap_days", gap_stats.largest_gap);

        if cadence > 0.0 {
            let lag_points = |lag: f64| ((lag / cadence) as usize).max(1);
            if n >= 50 && duration >= 1.0 {
                if let Some(ac) = gap_aware_autocorr(time, flux, lag_points(HOUR), 50) {
                    out.set_value("temp_autocorr_1hr", ac);
                }
            }
            if n >= 100 && duration >= 7.0 {
                if let Some(ac) = gap_aware_autocorr(time, flux, lag_points(DAY), 100) {
                    out.set_value("temp_autocorr_1day", ac);
                }
            }
            if n >= 500 && duration >= 30.0 {
                if let Some(ac) = gap_aware_autocorr(time, flux, lag_points(WEEK), 500) {
                    out.set_value("temp_autocorr_1week", ac);
                }
            }
        }

        if n >= 1000 && duration >= 90.0 {
            if let Some(h) = hurst_exponent(flux) {
                out.set_value("temp_memory_coefficient", h);
            }
        }

        if n >= 10 {
            if let Some((slope, intercept)) = numeric::linear_fit(time, flux) {
                out.set_value("temp_trend_slope", slope);
                let mean = flux.iter().sum::<f64>() / n as f64;
                let ss_tot: f64 = flux.iter().map(|f| (f - mean).powi(2)).sum();
                let ss_res: f64 = time
                    .iter()
                    .zip(flux.iter())
                    .map(|(t, f)| (f - (slope * t + intercept)).powi(2))
                    .sum();
                let strength = if ss_tot > 0.0 {
                    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                out.set_value("temp_trend_strength", strength);
            }
        }

        if let Some(stat) = stationarity_statistic(flux) {
            out.set_value("temp_stationarity_stat", stat);
        }
        out
    }
}
