//! Position Jitter Features
//!
//! Centroid positions have been published under several column naming
//! conventions. All lookups go through [`centroid_columns`], which probes
//! the conventions in a fixed order and logs which one matched.

use crate::features::{DomainContext, FeatureDomain};
use crate::numeric;
use crate::record::{Domain, DomainFeatures};
use signal_conditioner::CleanedSeries;
use tracing::{debug, warn};

/// Column-name pairs `(x, y)` probed in order
pub const CENTROID_CONVENTIONS: [(&str, &str); 4] = [
    ("mom_centr1", "mom_centr2"),
    ("MOM_CENTR1", "MOM_CENTR2"),
    ("centroid_col", "centroid_row"),
    ("pos_corr1", "pos_corr2"),
];

/// A convention needs more than this many finite pairs to be used
const MIN_FINITE_PAIRS: usize = 10;

/// Centroid coordinates resolved from one naming convention
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidColumns {
    /// The `(x, y)` column names that matched
    pub convention: (&'static str, &'static str),
    /// Finite x positions
    pub x: Vec<f64>,
    /// Finite y positions, aligned with `x`
    pub y: Vec<f64>,
}

/// Resolve centroid columns from the first convention with usable data.
///
/// A convention whose columns exist but are mostly non-finite does not stop
/// the search; the next convention is tried.
pub fn centroid_columns(series: &CleanedSeries) -> Option<CentroidColumns> {
    for &(x_name, y_name) in &CENTROID_CONVENTIONS {
        let (Some(x), Some(y)) = (series.column(x_name), series.column(y_name)) else {
            continue;
        };
        let (x, y): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .unzip();
        if x.len() > MIN_FINITE_PAIRS {
            debug!("Centroid columns matched convention {}/{}", x_name, y_name);
            return Some(CentroidColumns {
                convention: (x_name, y_name),
                x,
                y,
            });
        }
        debug!(
            "Centroid columns {}/{} present but only {} finite pairs",
            x_name,
            y_name,
            x.len()
        );
    }
    warn!(
        "No centroid convention matched; available columns: {:?}",
        series.columns.keys().collect::<Vec<_>>()
    );
    None
}

/// Position jitter domain
#[derive(Debug, Default)]
pub struct JitterDomain;

impl FeatureDomain for JitterDomain {
    fn domain(&self) -> Domain {
        Domain::Jitter
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Jitter);
        let Some(centroid) = centroid_columns(series) else {
            return out;
        };
        let (Some(mx), Some(my)) = (numeric::mean(&centroid.x), numeric::mean(&centroid.y)) else {
            return out;
        };
        let distances: Vec<f64> = centroid
            .x
            .iter()
            .zip(&centroid.y)
            .map(|(x, y)| ((x - mx).powi(2) + (y - my).powi(2)).sqrt())
            .collect();

        if let Some(mean) = numeric::mean(&distances) {
            out.set_value("jitter_mean", mean);
        }
        if let Some(variance) = numeric::variance(&distances, 0) {
            out.set_value("jitter_std", variance.sqrt());
        }
        out.set_value(
            "jitter_max",
            distances.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );
        let mean_square = distances.iter().map(|d| d * d).sum::<f64>() / distances.len() as f64;
        out.set_value("jitter_rms", mean_square.sqrt());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_conditioner::ClipOutcome;
    use std::collections::BTreeMap;

    fn series(columns: &[(&str, Vec<f64>)]) -> CleanedSeries {
        let n = 40;
        CleanedSeries {
            time: (0..n).map(|i| i as f64).collect(),
            flux: vec![1.0; n],
            columns: columns
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            clip: ClipOutcome::NotNeeded,
            n_raw: n,
            n_quality_dropped: 0,
            n_segments: 1,
        }
    }

    fn square(n: usize) -> (Vec<f64>, Vec<f64>) {
        // Alternate between (1, 0) and (-1, 0): every distance is 1
        let x = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        (x, vec![0.0; n])
    }

    #[test]
    fn test_uppercase_convention() {
        let (x, y) = square(40);
        let s = series(&[("MOM_CENTR1", x), ("MOM_CENTR2", y)]);
        let centroid = centroid_columns(&s).unwrap();
        assert_eq!(centroid.convention, ("MOM_CENTR1", "MOM_CENTR2"));

        let out = JitterDomain.compute(&s, &DomainContext::default());
        assert!((out.get("jitter_mean").unwrap().value.unwrap() - 1.0).abs() < 1e-12);
        assert!((out.get("jitter_rms").unwrap().value.unwrap() - 1.0).abs() < 1e-12);
        assert!(out.get("jitter_std").unwrap().value.unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_falls_through_mostly_nan_convention() {
        let (x, y) = square(40);
        let s = series(&[
            ("mom_centr1", vec![f64::NAN; 40]),
            ("mom_centr2", vec![f64::NAN; 40]),
            ("pos_corr1", x),
            ("pos_corr2", y),
        ]);
        assert_eq!(
            centroid_columns(&s).unwrap().convention,
            ("pos_corr1", "pos_corr2")
        );
    }

    #[test]
    fn test_no_convention_is_invalid() {
        let out = JitterDomain.compute(&series(&[]), &DomainContext::default());
        assert!(out.iter().all(|(_, v)| !v.valid));
    }
}
