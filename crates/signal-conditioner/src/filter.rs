//! Median Filter for Trend Removal

/// Centered sliding-window median filter.
///
/// Near the edges the window is truncated to the points that exist, so the
/// output always has the same length as the input.
#[derive(Debug, Clone, Copy)]
pub struct MedianFilter {
    size: usize,
}

impl MedianFilter {
    /// Create a new median filter with the given window size.
    ///
    /// Even sizes are rounded up to the next odd size; zero becomes one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let size = if size % 2 == 0 { size + 1 } else { size };
        Self { size }
    }

    /// Create a filter whose window covers `span` time units at `cadence`
    pub fn for_span(span: f64, cadence: f64) -> Self {
        if !(cadence > 0.0) || !span.is_finite() {
            return Self::new(1);
        }
        Self::new((span / cadence).round() as usize)
    }

    /// Window size in points
    pub fn size(&self) -> usize {
        self.size
    }

    /// Running median of `values`
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let half = self.size / 2;
        let mut window = Vec::with_capacity(self.size);
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            window.clear();
            window.extend_from_slice(&values[lo..hi]);
            let mid = window.len() / 2;
            let (_, m, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            let upper = *m;
            let median = if window.len() % 2 == 1 {
                upper
            } else {
                let lower = window[..mid]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max);
                0.5 * (lower + upper)
            };
            out.push(median);
        }
        out
    }

    /// Divide `values` by their running median, leaving points with a
    /// non-positive or non-finite trend untouched.
    pub fn flatten(&self, values: &[f64]) -> Vec<f64> {
        if self.size <= 1 || values.len() <= self.size {
            return values.to_vec();
        }
        let trend = self.apply(values);
        values
            .iter()
            .zip(trend)
            .map(|(&v, t)| if t > 0.0 && t.is_finite() { v / t } else { v })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_filter_basic() {
        let filter = MedianFilter::new(5);
        let out = filter.apply(&[10.0, 12.0, 11.0, 100.0, 13.0, 12.0, 11.0]);
        // Median of [12, 11, 100, 13, 12] around the spike
        assert!((out[3] - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_median_filter_removes_spike() {
        let filter = MedianFilter::new(5);
        let out = filter.apply(&[10.0, 11.0, 10.0, 100.0, 10.0, 11.0, 10.0]);
        assert!(out.iter().all(|v| *v < 20.0));
    }

    #[test]
    fn test_even_size_rounds_up() {
        assert_eq!(MedianFilter::new(4).size(), 5);
        assert_eq!(MedianFilter::new(0).size(), 1);
        assert_eq!(MedianFilter::for_span(2.0, 0.5).size(), 5);
    }

    #[test]
    fn test_flatten_removes_linear_trend() {
        let values: Vec<f64> = (0..200).map(|i| 1.0 + 0.001 * i as f64).collect();
        let flat = MedianFilter::new(21).flatten(&values);
        for v in &flat[10..190] {
            assert!((v - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_flatten_preserves_short_dip() {
        let mut values = vec![1.0; 200];
        for v in &mut values[100..103] {
            *v = 0.99;
        }
        let flat = MedianFilter::new(31).flatten(&values);
        assert!((flat[101] - 0.99).abs() < 1e-9);
    }
}
