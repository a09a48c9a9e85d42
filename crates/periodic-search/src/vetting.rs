//! Plausibility checks for a significant box candidate
//!
//! Runs on the flattened, unbinned series so that individual events keep
//! their full time resolution.

use crate::bls::BoxCandidate;
use crate::search::SearchConfig;
use serde::{Deserialize, Serialize};
use signal_conditioner::robust;

/// Solar radius in Earth radii
const R_SUN_R_EARTH: f64 = 109.1;
/// Jupiter radius in Earth radii
const R_JUPITER_R_EARTH: f64 = 11.2;
const MINUTES_PER_DAY: f64 = 1440.0;

/// Derived statistics for a significant candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vetting {
    /// Events with enough in- and out-of-event coverage to measure
    pub n_events: usize,
    /// Standard deviation of per-event depths over their mean
    pub depth_consistency: Option<f64>,
    /// Scatter of per-event minimum times around the linear ephemeris (minutes)
    pub timing_jitter_min: Option<f64>,
    /// Companion radius implied by the depth (Jupiter radii)
    pub implied_radius_rjup: Option<f64>,
    /// Implied radius is at most the configured maximum
    pub plausible: Option<bool>,
    /// Odd- and even-numbered events have consistent depths
    pub odd_even_consistent: Option<bool>,
}

/// One measured event
struct Event {
    number: i64,
    depth: f64,
    offset: f64,
}

/// Vet `candidate` against the flattened series.
///
/// `stellar_radius` (solar radii) overrides the configured reference radius.
pub fn vet(
    time: &[f64],
    flux: &[f64],
    candidate: &BoxCandidate,
    stellar_radius: Option<f64>,
    config: &SearchConfig,
) -> Vetting {
    let events = measure_events(time, flux, candidate);
    let depths: Vec<f64> = events.iter().map(|e| e.depth).collect();

    let depth_consistency = match mean_and_std(&depths) {
        Some((mean, std)) if depths.len() >= 2 && mean.abs() > 0.0 => Some(std / mean.abs()),
        _ => None,
    };

    let timing_jitter_min = if events.len() >= 3 {
        let offsets: Vec<f64> = events.iter().map(|e| e.offset).collect();
        mean_and_std(&offsets).map(|(_, std)| std * MINUTES_PER_DAY)
    } else {
        None
    };

    let radius = stellar_radius
        .filter(|r| *r > 0.0 && r.is_finite())
        .unwrap_or(config.reference_radius_rsun);
    let implied_radius_rjup = (candidate.depth > 0.0 && radius > 0.0)
        .then(|| candidate.depth.sqrt() * radius * R_SUN_R_EARTH / R_JUPITER_R_EARTH);
    let plausible = implied_radius_rjup.map(|r| r <= config.max_plausible_radius_rjup);

    Vetting {
        n_events: events.len(),
        depth_consistency,
        timing_jitter_min,
        implied_radius_rjup,
        plausible,
        odd_even_consistent: odd_even_consistent(&events, config),
    }
}

fn measure_events(time: &[f64], flux: &[f64], candidate: &BoxCandidate) -> Vec<Event> {
    let (Some(&first), Some(&last)) = (time.first(), time.last()) else {
        return Vec::new();
    };
    let period = candidate.period;
    let half = candidate.duration / 2.0;
    let ring = 3.0 * candidate.duration;
    if !(period > 0.0) || !(half > 0.0) {
        return Vec::new();
    }

    let k_first = ((first - candidate.epoch) / period).ceil() as i64;
    let k_last = ((last - candidate.epoch) / period).floor() as i64;

    let mut events = Vec::new();
    let mut inside = Vec::new();
    let mut outside = Vec::new();
    for number in k_first..=k_last {
        let center = candidate.epoch + number as f64 * period;
        let lo = time.partition_point(|&t| t < center - ring);
        let hi = time.partition_point(|&t| t <= center + ring);

        inside.clear();
        outside.clear();
        let mut lowest: Option<(f64, f64)> = None;
        for i in lo..hi {
            let dt = time[i] - center;
            if dt.abs() < half {
                inside.push(flux[i]);
            } else if dt.abs() >= candidate.duration {
                outside.push(flux[i]);
            }
            if dt.abs() <= candidate.duration && lowest.map_or(true, |(_, f)| flux[i] < f) {
                lowest = Some((dt, flux[i]));
            }
        }
        if inside.len() < 3 || outside.len() < 3 {
            continue;
        }
        let (Some(baseline), Some((offset, _))) = (robust::median(&outside), lowest) else {
            continue;
        };
        let in_mean = inside.iter().sum::<f64>() / inside.len() as f64;
        events.push(Event {
            number,
            depth: baseline - in_mean,
            offset,
        });
    }
    events
}

/// Odd and even depths are inconsistent only when they differ by more than
/// `odd_even_sigma` combined standard errors and by more than
/// `odd_even_rel_tolerance` of the mean depth.
fn odd_even_consistent(events: &[Event], config: &SearchConfig) -> Option<bool> {
    let (odd, even): (Vec<&Event>, Vec<&Event>) =
        events.iter().partition(|e| e.number.rem_euclid(2) == 1);
    if odd.len() < 2 || even.len() < 2 {
        return None;
    }
    let odd: Vec<f64> = odd.iter().map(|e| e.depth).collect();
    let even: Vec<f64> = even.iter().map(|e| e.depth).collect();

    let (odd_mean, odd_err) = mean_and_stderr(&odd)?;
    let (even_mean, even_err) = mean_and_stderr(&even)?;
    let diff = (odd_mean - even_mean).abs();
    let combined = (odd_err * odd_err + even_err * even_err).sqrt();
    let mean_depth = 0.5 * (odd_mean + even_mean).abs();

    let beyond_noise = diff > config.odd_even_sigma * combined;
    let beyond_tolerance = mean_depth > 0.0 && diff / mean_depth > config.odd_even_rel_tolerance;
    Some(!(beyond_noise && beyond_tolerance))
}

fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Mean and standard error of the mean (sample variance)
fn mean_and_stderr(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, (var / n).sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(period: f64, depths: [f64; 2], duration: f64) -> (Vec<f64>, Vec<f64>) {
        let time: Vec<f64> = (0..4800).map(|i| i as f64 / 48.0).collect();
        let flux = time
            .iter()
            .enumerate()
            .map(|(i, &t)| {
                let n = ((t - 2.0) / period).round();
                let wobble = if i % 2 == 0 { 2e-4 } else { -2e-4 };
                if (t - 2.0 - n * period).abs() < duration / 2.0 {
                    1.0 - depths[(n as i64).rem_euclid(2) as usize] + wobble
                } else {
                    1.0 + wobble
                }
            })
            .collect();
        (time, flux)
    }

    fn candidate(period: f64, depth: f64) -> BoxCandidate {
        BoxCandidate {
            period,
            power: 50.0,
            depth,
            duration: 0.25,
            epoch: 2.0,
        }
    }

    #[test]
    fn test_equal_depths_consistent() {
        let (time, flux) = series(4.0, [0.005, 0.005], 0.25);
        let v = vet(&time, &flux, &candidate(4.0, 0.005), None, &SearchConfig::default());
        assert_eq!(v.n_events, 25);
        assert_eq!(v.odd_even_consistent, Some(true));
        assert!(v.depth_consistency.unwrap() < 0.1);
        assert_eq!(v.plausible, Some(true));
    }

    #[test]
    fn test_alternating_depths_inconsistent() {
        let (time, flux) = series(4.0, [0.008, 0.003], 0.25);
        let v = vet(&time, &flux, &candidate(4.0, 0.0055), None, &SearchConfig::default());
        assert_eq!(v.odd_even_consistent, Some(false));
    }

    #[test]
    fn test_deep_eclipse_implausible() {
        let (time, flux) = series(4.0, [0.09, 0.09], 0.25);
        let v = vet(&time, &flux, &candidate(4.0, 0.09), Some(2.0), &SearchConfig::default());
        // sqrt(0.09) * 2.0 * 109.1 / 11.2 ≈ 5.8 R_Jup
        assert!(v.implied_radius_rjup.unwrap() > 5.0);
        assert_eq!(v.plausible, Some(false));
    }

    #[test]
    fn test_too_few_events_for_odd_even() {
        let (time, flux) = series(4.0, [0.005, 0.005], 0.25);
        let v = vet(&time[..480], &flux[..480], &candidate(4.0, 0.005), None, &SearchConfig::default());
        assert!(v.n_events < 4);
        assert_eq!(v.odd_even_consistent, None);
    }
}
