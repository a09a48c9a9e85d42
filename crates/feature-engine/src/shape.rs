//! Excursion and Shape Features

use crate::features::{DomainContext, FeatureDomain};
use crate::record::{Domain, DomainFeatures};
use signal_conditioner::{robust, CleanedSeries};

const MIN_POINTS: usize = 30;
/// Excursion threshold in robust standard deviations
const EXCURSION_SIGMA: f64 = 3.0;

fn longest_run(flags: impl Iterator<Item = bool>) -> usize {
    let mut best = 0;
    let mut current = 0;
    for flag in flags {
        current = if flag { current + 1 } else { 0 };
        best = best.max(current);
    }
    best
}

/// Dip and peak shape domain
#[derive(Debug, Default)]
pub struct ShapeDomain;

impl FeatureDomain for ShapeDomain {
    fn domain(&self) -> Domain {
        Domain::Shape
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Shape);
        let flux = &series.flux;
        if flux.len() < MIN_POINTS {
            return out;
        }
        let Some((median, spread)) = robust::center_and_spread(flux) else {
            return out;
        };

        if spread == 0.0 {
            // Flat series: no excursions, every descriptor is zero
            for name in Domain::Shape.features() {
                out.set_value(name, 0.0);
            }
            return out;
        }

        let excursions: Vec<f64> = flux.iter().map(|f| (f - median) / spread).collect();
        let high = excursions.iter().filter(|e| **e > EXCURSION_SIGMA).count();
        let low = excursions.iter().filter(|e| **e < -EXCURSION_SIGMA).count();
        out.set_value("shape_n_high_excursions", high as f64);
        out.set_value("shape_n_low_excursions", low as f64);

        let max_up = excursions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min_down = excursions.iter().copied().fold(f64::INFINITY, f64::min);
        out.set_value("shape_max_excursion_up", max_up);
        out.set_value("shape_max_excursion_down", -min_down);

        // With no dips the ratio is undefined; count the peaks plus one instead
        let asymmetry = if low > 0 {
            high as f64 / low as f64
        } else {
            high as f64 + 1.0
        };
        out.set_value("shape_asymmetry", asymmetry);

        let above: Vec<bool> = flux.iter().map(|f| *f > median).collect();
        out.set_value(
            "shape_max_consecutive_up",
            longest_run(above.iter().copied()) as f64,
        );
        out.set_value(
            "shape_max_consecutive_down",
            longest_run(above.iter().map(|a| !a)) as f64,
        );
        let crossings = above.windows(2).filter(|w| w[0] != w[1]).count();
        out.set_value(
            "shape_crossing_rate",
            crossings as f64 / (above.len() - 1) as f64,
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_conditioner::ClipOutcome;
    use std::collections::BTreeMap;

    fn series(flux: Vec<f64>) -> CleanedSeries {
        let n = flux.len();
        CleanedSeries {
            time: (0..n).map(|i| i as f64 * 0.02).collect(),
            flux,
            columns: BTreeMap::new(),
            clip: ClipOutcome::NotNeeded,
            n_raw: n,
            n_quality_dropped: 0,
            n_segments: 1,
        }
    }

    #[test]
    fn test_flat_series_is_valid_zero() {
        let out = ShapeDomain.compute(&series(vec![1.0; 100]), &DomainContext::default());
        for (name, value) in out.iter() {
            assert_eq!(value.value, Some(0.0), "{name}");
        }
    }

    #[test]
    fn test_dips_counted() {
        let mut flux: Vec<f64> = (0..200).map(|i| 1.0 + 0.001 * ((i % 7) as f64 - 3.0)).collect();
        flux[50] = 0.9;
        flux[120] = 0.9;
        let out = ShapeDomain.compute(&series(flux), &DomainContext::default());
        assert_eq!(out.get("shape_n_low_excursions").unwrap().value, Some(2.0));
        assert_eq!(out.get("shape_n_high_excursions").unwrap().value, Some(0.0));
        assert_eq!(out.get("shape_asymmetry").unwrap().value, Some(0.0));
        assert!(out.get("shape_max_excursion_down").unwrap().value.unwrap() > 10.0);
    }

    #[test]
    fn test_too_short() {
        let out = ShapeDomain.compute(&series(vec![1.0; 10]), &DomainContext::default());
        assert!(out.iter().all(|(_, v)| !v.valid));
    }

    #[test]
    fn test_longest_run() {
        assert_eq!(longest_run([true, true, false, true].into_iter()), 2);
        assert_eq!(longest_run(std::iter::empty()), 0);
    }
}
