//! Robust location and spread estimators shared across the workspace

/// Scale factor turning a median absolute deviation into a Gaussian sigma
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of a slice (NaN-free input expected). Returns `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(median_of_sorted(&sorted))
}

/// Median of an already sorted slice
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        0.5 * (sorted[n / 2 - 1] + sorted[n / 2])
    }
}

/// Median absolute deviation around `center`
pub fn mad(values: &[f64], center: f64) -> Option<f64> {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Robust center (median) and spread (MAD × 1.4826)
pub fn center_and_spread(values: &[f64]) -> Option<(f64, f64)> {
    let center = median(values)?;
    let spread = mad(values, center)? * MAD_TO_SIGMA;
    Some((center, spread))
}

/// Linear-interpolated percentile (`q` in 0..=100) of a sorted slice
pub fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Consecutive differences of a slice
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_mad_ignores_single_outlier() {
        let values = [1.0, 1.0, 2.0, 2.0, 4.0, 6.0, 1000.0];
        let center = median(&values).unwrap();
        assert_eq!(center, 2.0);
        assert_eq!(mad(&values, center), Some(1.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert!((percentile_of_sorted(&sorted, 50.0) - 20.0).abs() < 1e-12);
        assert!((percentile_of_sorted(&sorted, 5.0) - 2.0).abs() < 1e-12);
        assert!((percentile_of_sorted(&sorted, 100.0) - 40.0).abs() < 1e-12);
    }
}
