//! Statistical Features Computation

use crate::features::{DomainContext, FeatureDomain};
use crate::record::{Domain, DomainFeatures};
use signal_conditioner::{robust, CleanedSeries};

/// Minimum points for distribution statistics
const MIN_POINTS: usize = 10;

/// Distribution statistics of a flux series
#[derive(Debug, Clone, Default)]
pub struct StatisticalFeatures {
    /// Mean value
    pub mean: f64,
    /// Median value
    pub median: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    /// Median absolute deviation (unscaled)
    pub mad: f64,
    /// Max minus min
    pub range: f64,
    /// Interquartile range
    pub iqr: f64,
    /// Skewness (asymmetry)
    pub skewness: f64,
    /// Excess kurtosis (tailedness)
    pub kurtosis: f64,
    /// 5th percentile
    pub percentile_5: f64,
    /// 95th percentile
    pub percentile_95: f64,
    /// Fraction of points more than one standard deviation from the mean
    pub beyond_1sigma: f64,
}

impl StatisticalFeatures {
    /// Compute statistics, or `None` with fewer than ten values
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.len() < MIN_POINTS {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;

        // Central moments
        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for &v in values {
            let d = v - mean;
            m2 += d * d;
            m3 += d * d * d;
            m4 += d * d * d * d;
        }
        let pop_variance = m2 / n;
        let std_dev = (m2 / (n - 1.0)).sqrt();

        // Skewness: E[(X-μ)³] / σ³
        let skewness = if pop_variance > 0.0 {
            (m3 / n) / pop_variance.powf(1.5)
        } else {
            0.0
        };

        // Kurtosis: E[(X-μ)⁴] / σ⁴ - 3 (excess kurtosis)
        let kurtosis = if pop_variance > 0.0 {
            (m4 / n) / (pop_variance * pop_variance) - 3.0
        } else {
            0.0
        };

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = robust::median_of_sorted(&sorted);
        let mad = robust::mad(values, median)?;

        let beyond_1sigma = if std_dev > 0.0 {
            values.iter().filter(|v| (*v - mean).abs() > std_dev).count() as f64 / n
        } else {
            0.0
        };

        Some(Self {
            mean,
            median,
            std_dev,
            mad,
            range: sorted[sorted.len() - 1] - sorted[0],
            iqr: robust::percentile_of_sorted(&sorted, 75.0)
                - robust::percentile_of_sorted(&sorted, 25.0),
            skewness,
            kurtosis,
            percentile_5: robust::percentile_of_sorted(&sorted, 5.0),
            percentile_95: robust::percentile_of_sorted(&sorted, 95.0),
            beyond_1sigma,
        })
    }
}

/// Distributional statistics domain
#[derive(Debug, Default)]
pub struct StatisticalDomain;

impl FeatureDomain for StatisticalDomain {
    fn domain(&self) -> Domain {
        Domain::Statistical
    }

    fn compute(&self, series: &CleanedSeries, _ctx: &DomainContext) -> DomainFeatures {
        let mut out = DomainFeatures::new(Domain::Statistical);
        let Some(stats) = StatisticalFeatures::compute(&series.flux) else {
            return out;
        };

        out.set_value("stat_mean", stats.mean);
        out.set_value("stat_median", stats.median);
        out.set_value("stat_std", stats.std_dev);
        out.set_value("stat_variance", stats.std_dev * stats.std_dev);
        out.set_value("stat_mad", stats.mad);
        out.set_value("stat_range", stats.range);
        out.set_value("stat_iqr", stats.iqr);
        out.set_value("stat_skewness", stats.skewness);
        out.set_value("stat_kurtosis", stats.kurtosis);
        out.set_value("stat_percentile_5", stats.percentile_5);
        out.set_value("stat_percentile_95", stats.percentile_95);
        out.set_value("stat_beyond_1sigma", stats.beyond_1sigma);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_computation() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let stats = StatisticalFeatures::compute(&values).unwrap();
        assert!((stats.mean - 5.5).abs() < 0.001);
        assert!((stats.median - 5.5).abs() < 0.001);
        assert!((stats.range - 9.0).abs() < 0.001);
    }

    #[test]
    fn test_std_dev_computation() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0, 5.0, 5.0];
        let stats = StatisticalFeatures::compute(&values).unwrap();
        assert!((stats.std_dev - 1.9).abs() < 0.1);
    }

    #[test]
    fn test_symmetric_data_has_no_skew() {
        let values: Vec<f64> = (-50..=50).map(|v| v as f64).collect();
        let stats = StatisticalFeatures::compute(&values).unwrap();
        assert!(stats.skewness.abs() < 1e-9);
        // Uniform distribution excess kurtosis is -1.2
        assert!((stats.kurtosis + 1.2).abs() < 0.01);
    }

    #[test]
    fn test_too_few_values() {
        assert!(StatisticalFeatures::compute(&[1.0; 5]).is_none());
    }

    #[test]
    fn test_constant_values() {
        let stats = StatisticalFeatures::compute(&[1.0; 20]).unwrap();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.kurtosis, 0.0);
        assert_eq!(stats.beyond_1sigma, 0.0);
    }
}
