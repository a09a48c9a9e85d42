//! Flatten and bin a light curve ahead of the box search

use signal_conditioner::{gaps, MedianFilter};
use tracing::debug;

/// Series ready for searching
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    /// Flattened, unbinned flux aligned with the input time (used for vetting)
    pub flat_flux: Vec<f64>,
    /// Binned time (mean epoch per non-empty bin)
    pub time: Vec<f64>,
    /// Binned flux (mean flattened flux per non-empty bin)
    pub flux: Vec<f64>,
}

/// Remove slow variability with a running median spanning `window_days`
pub fn flatten(time: &[f64], flux: &[f64], window_days: f64) -> Vec<f64> {
    let Some(cadence) = gaps::median_cadence(time) else {
        return flux.to_vec();
    };
    MedianFilter::for_span(window_days, cadence).flatten(flux)
}

/// Average into fixed-width bins, dropping empty ones.
///
/// Binning is skipped when the span would give no more than `min_bins` bins.
pub fn bin(time: &[f64], flux: &[f64], width: f64, min_bins: usize) -> (Vec<f64>, Vec<f64>) {
    let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
        return (Vec::new(), Vec::new());
    };
    let n_bins = if width > 0.0 {
        ((last - first) / width) as usize
    } else {
        0
    };
    if n_bins <= min_bins {
        return (time.to_vec(), flux.to_vec());
    }

    let edge = (last - first) / n_bins as f64;
    let mut sum_t = vec![0.0; n_bins];
    let mut sum_f = vec![0.0; n_bins];
    let mut count = vec![0usize; n_bins];
    for (&t, &f) in time.iter().zip(flux) {
        let idx = (((t - first) / edge) as usize).min(n_bins - 1);
        sum_t[idx] += t;
        sum_f[idx] += f;
        count[idx] += 1;
    }

    let mut out_t = Vec::with_capacity(n_bins);
    let mut out_f = Vec::with_capacity(n_bins);
    for i in 0..n_bins {
        if count[i] > 0 {
            out_t.push(sum_t[i] / count[i] as f64);
            out_f.push(sum_f[i] / count[i] as f64);
        }
    }
    (out_t, out_f)
}

/// Flatten with a `window_days` running median, then bin at `bin_days`
pub fn prepare(time: &[f64], flux: &[f64], window_days: f64, bin_days: f64) -> PreparedSeries {
    let flat_flux = flatten(time, flux, window_days);
    let (binned_time, binned_flux) = bin(time, &flat_flux, bin_days, 100);
    debug!(
        "Search preprocessing: {} -> {} points",
        time.len(),
        binned_time.len()
    );
    PreparedSeries {
        flat_flux,
        time: binned_time,
        flux: binned_flux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_averages_points() {
        let time: Vec<f64> = (0..1000).map(|i| i as f64 * 0.02).collect();
        // Flux equal to time, so each bin mean equals its mean epoch
        let flux = time.clone();
        let (bt, bf) = bin(&time, &flux, 0.1, 100);
        assert_eq!(bt.len(), 199);
        assert!(bt.iter().zip(&bf).all(|(t, f)| (t - f).abs() < 1e-9));
    }

    #[test]
    fn test_short_series_not_binned() {
        let time: Vec<f64> = (0..50).map(|i| i as f64 * 0.02).collect();
        let flux = vec![1.0; 50];
        let (bt, _) = bin(&time, &flux, 0.1, 100);
        assert_eq!(bt.len(), 50);
    }

    #[test]
    fn test_empty_bins_dropped() {
        let mut time: Vec<f64> = (0..500).map(|i| i as f64 * 0.02).collect();
        time.extend((0..500).map(|i| 30.0 + i as f64 * 0.02));
        let flux = vec![1.0; 1000];
        let (bt, _) = bin(&time, &flux, 0.1, 100);
        assert!(bt.len() < 250);
        assert!(bt.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_prepare_removes_slow_trend() {
        let time: Vec<f64> = (0..4000).map(|i| i as f64 / 48.0).collect();
        let flux: Vec<f64> = time
            .iter()
            .map(|t| 1.0 + 0.01 * (t / 20.0).sin())
            .collect();
        let prepared = prepare(&time, &flux, 2.0, 1.0 / 12.0);
        assert_eq!(prepared.flat_flux.len(), 4000);
        assert!(prepared.flux.iter().all(|f| (f - 1.0).abs() < 1e-3));
    }
}
