//! Periodicity Features
//!
//! Peaks are searched within `[max(0.1, 2·cadence), min(span/2, 100)]` days.
//! Band powers are fractions of the total spectral power, split at 10% and
//! 50% of the Nyquist frequency.

use crate::features::{DomainContext, FeatureDomain};
use crate::fft::{FftAnalyzer, Spectrum};
use crate::record::{Domain, DomainFeatures, FeatureValue};
use signal_conditioner::{gaps, robust, CleanedSeries};

/// Known spacecraft periodicities (hours)
const INSTRUMENTAL_PERIODS_HOURS: [f64; 6] = [4.0, 6.0, 8.0, 12.0, 24.0, 48.0];
/// Relative tolerance for an instrumental match
const INSTRUMENTAL_TOLERANCE: f64 = 0.05;
/// Relative tolerance for harmonics of the dominant peak
const HARMONIC_TOLERANCE: f64 = 0.1;

const MIN_POINTS: usize = 200;
const MIN_SPAN_DAYS: f64 = 10.0;

/// Whether a period (days) matches an instrumental period or one of its
/// harmonics ×2..×4
pub fn is_instrumental_period(period_days: f64) -> bool {
    let hours = period_days * 24.0;
    INSTRUMENTAL_PERIODS_HOURS.iter().any(|&base| {
        (1..=4).any(|k| {
            let alias = base / k as f64;
            ((hours - alias) / alias).abs() <= INSTRUMENTAL_TOLERANCE
        })
    })
}

/// Indices of local maxima in `power`
fn local_maxima(power: &[f64]) -> Vec<usize> {
    (0..power.len())
        .filter(|&i| {
            let left = i == 0 || power[i] > power[i - 1];
            let right = i + 1 == power.len() || power[i] >= power[i + 1];
            left && right
        })
        .collect()
}

/// Shannon entropy of the power distribution (nats)
fn spectral_entropy(power: &[f64]) -> Option<f64> {
    let total: f64 = power.iter().sum();
    if !(total > 0.0) {
        return None;
    }
    Some(
        -power
            .iter()
            .map(|p| p / total)
            .filter(|p| *p > 0.0)
            .map(|p| p * p.ln())
            .sum::<f64>(),
    )
}

/// Score in (0, 1]; narrower peaks score closer to one
fn quasi_periodic_score(frequency: &[f64], power: &[f64], peak: usize) -> f64 {
    let half = power[peak] / 2.0;
    let mut left = peak;
    while left > 0 && power[left] > half {
        left -= 1;
    }
    let mut right = peak;
    while right + 1 < power.len() && power[right] > half {
        right += 1;
    }
    let width = frequency[right] - frequency[left];
    if width > 0.0 {
        (1.0 / (1.0 + width * 100.0)).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Periodicity domain
#[derive(Debug, Default)]
pub struct FrequencyDomain;

impl FrequencyDomain {
    fn fill(out: &mut DomainFeatures, spectrum: &Spectrum, min_period: f64, max_period: f64) {
        let total = spectrum.total_power();
        if !(total > 0.0) {
            return;
        }
        let nyquist = spectrum.nyquist();
        let low: f64 = spectrum
            .frequency
            .iter()
            .zip(&spectrum.power)
            .filter(|(f, _)| **f < 0.1 * nyquist)
            .map(|(_, p)| p)
            .sum();
        let high: f64 = spectrum
            .frequency
            .iter()
            .zip(&spectrum.power)
            .filter(|(f, _)| **f > 0.5 * nyquist)
            .map(|(_, p)| p)
            .sum();
        out.set_value("freq_low_freq_power", low / total);
        out.set_value("freq_high_freq_power", high / total);
        out.set_value("freq_power_ratio", if high > 0.0 { low / high } else { 0.0 });

        // Restrict the peak search to the trial period range
        let lo = spectrum
            .frequency
            .partition_point(|&f| f < 1.0 / max_period);
        let hi = spectrum
            .frequency
            .partition_point(|&f| f <= 1.0 / min_period);
        if hi <= lo {
            return;
        }
        let frequency = &spectrum.frequency[lo..hi];
        let power = &spectrum.power[lo..hi];
        let band_total: f64 = power.iter().sum();
        if !(band_total > 0.0) {
            return;
        }
        if let Some(entropy) = spectral_entropy(power) {
            out.set_value("freq_spectral_entropy", entropy);
        }

        let Some(peak) = (0..power.len()).max_by(|&a, &b| power[a].total_cmp(&power[b])) else {
            return;
        };
        let dominant_freq = frequency[peak];
        let dominant_period = 1.0 / dominant_freq;
        out.set_value("freq_dominant_period", dominant_period);
        out.set_value("freq_dominant_power", power[peak] / band_total);
        out.set(
            "freq_is_instrumental_alias",
            FeatureValue::flag(is_instrumental_period(dominant_period)),
        );

        if let Some(median) = robust::median(power) {
            out.set_value(
                "freq_period_snr",
                if median > 0.0 { power[peak] / median } else { 0.0 },
            );
        }

        let mut sorted = power.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let threshold = robust::percentile_of_sorted(&sorted, 99.0);
        let maxima = local_maxima(power);
        out.set_value(
            "freq_n_significant_peaks",
            maxima.iter().filter(|&&i| power[i] > threshold).count() as f64,
        );

        let secondary = maxima
            .iter()
            .copied()
            .filter(|&i| ((frequency[i] - dominant_freq) / dominant_freq).abs() > 0.1)
            .max_by(|&a, &b| power[a].total_cmp(&power[b]));
        if let Some(i) = secondary {
            out.set_value("freq_secondary_period", 1.0 / frequency[i]);
            out.set_value("freq_secondary_power", power[i] / band_total);
        }

        // Harmonics may lie above the peak-search band, so use the full spectrum
        let harmonics = (2..=4)
            .filter(|&k| {
                let target = k as f64 * dominant_freq;
                let idx = spectrum.frequency.partition_point(|&f| f < target);
                [idx.saturating_sub(1), idx]
                    .into_iter()
                    .filter(|&i| i < spectrum.len())
                    .any(|i| {
                        ((spectrum.frequency[i] - target) / target).abs() < HARMONIC_TOLERANCE
                            && spectrum.power[i] > threshold
                    })
            })
            .count();
        out.set_value("freq_harmonic_count", harmonics as f64);
        out.set_value(
            "freq_quasi_periodic_score",
            quasi_periodic_score(frequency, power, peak),
        );
    }
}

impl FeatureDomain for FrequencyDomain {
    fn domain(&self) -> Domain {
        Domain::Frequency
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Frequency);
        let span = series.span();
        if series.len() < MIN_POINTS || span < MIN_SPAN_DAYS {
            return out;
        }
        let Some(cadence) = gaps::median_cadence(&series.time) else {
            return out;
        };
        let min_period = (2.0 * cadence).max(0.1);
        let max_period = (span / 2.0).min(100.0);
        if max_period <= min_period {
            return out;
        }

        let Some(spectrum) = FftAnalyzer::new().power_spectrum(&series.time, &series.flux) else {
            return out;
        };
        Self::fill(&mut out, &spectrum, min_period, max_period);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_conditioner::ClipOutcome;
    use std::collections::BTreeMap;

    fn series(time: Vec<f64>, flux: Vec<f64>) -> CleanedSeries {
        let n = time.len();
        CleanedSeries {
            time,
            flux,
            columns: BTreeMap::new(),
            clip: ClipOutcome::NotNeeded,
            n_raw: n,
            n_quality_dropped: 0,
            n_segments: 1,
        }
    }

    fn sine(period: f64, days: f64) -> CleanedSeries {
        let time: Vec<f64> = (0..(days * 48.0) as usize).map(|i| i as f64 / 48.0).collect();
        let flux = time
            .iter()
            .map(|t| 1.0 + 0.01 * (2.0 * std::f64::consts::PI * t / period).sin())
            .collect();
        series(time, flux)
    }

    #[test]
    fn test_dominant_period_recovered() {
        let out = FrequencyDomain.compute(&sine(5.0, 100.0), &DomainContext::default());
        let period = out.get("freq_dominant_period").unwrap().value.unwrap();
        assert!((period - 5.0).abs() < 0.2, "period {period}");
        assert_eq!(out.get("freq_is_instrumental_alias").unwrap().value, Some(0.0));
        assert!(out.get("freq_quasi_periodic_score").unwrap().valid);
        assert!(out.get("freq_period_snr").unwrap().value.unwrap() > 100.0);
    }

    #[test]
    fn test_instrumental_alias_flagged() {
        assert!(is_instrumental_period(0.5));
        assert!(is_instrumental_period(2.0));
        assert!(is_instrumental_period(1.0 / 24.0 * 1.5));
        assert!(!is_instrumental_period(3.7));
    }

    #[test]
    fn test_short_series_invalid() {
        let out = FrequencyDomain.compute(&sine(1.0, 5.0), &DomainContext::default());
        assert!(out.iter().all(|(_, v)| !v.valid));
    }

    #[test]
    fn test_local_maxima() {
        assert_eq!(local_maxima(&[0.0, 2.0, 1.0, 3.0, 3.0, 0.0]), vec![1, 3]);
    }
}
