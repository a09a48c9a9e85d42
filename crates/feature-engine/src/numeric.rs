//! Small numeric helpers shared by the domains

use nalgebra::{DMatrix, DVector, SVD};

/// Arithmetic mean, `None` when empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Variance with `ddof` delta degrees of freedom
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some(ss / (values.len() - ddof) as f64)
}

/// Sample standard deviation (ddof = 1)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values, 1).map(f64::sqrt)
}

/// Autocorrelation coefficient at a lag in points
pub fn autocorr(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 || lag >= n {
        return 0.0;
    }
    let Some(m) = mean(values) else {
        return 0.0;
    };
    let c0 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if c0 == 0.0 {
        return 0.0;
    }
    let c_lag = values[..n - lag]
        .iter()
        .zip(&values[lag..])
        .map(|(a, b)| (a - m) * (b - m))
        .sum::<f64>()
        / (n - lag) as f64;
    c_lag / c0
}

/// Least-squares fit of `y = slope * x + intercept`
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let coeffs = polyfit(x, y, 1)?;
    Some((coeffs[1], coeffs[0]))
}

/// Least-squares polynomial coefficients, lowest order first.
///
/// `x` is centered and scaled internally; the returned coefficients apply to
/// the original `x`.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    if x.len() != y.len() || x.len() <= degree {
        return None;
    }
    let center = mean(x)?;
    let scale = x
        .iter()
        .map(|v| (v - center).abs())
        .fold(0.0, f64::max);
    if !(scale > 0.0) {
        return None;
    }

    let design = DMatrix::from_fn(x.len(), degree + 1, |row, p| {
        ((x[row] - center) / scale).powi(p as i32)
    });
    let fit = least_squares(design, y)?;

    // Expand sum c_p ((x - center) / scale)^p into powers of x
    let mut coeffs = vec![0.0; degree + 1];
    for (p, c) in fit.coefficients.iter().enumerate() {
        let factor = c / scale.powi(p as i32);
        for k in 0..=p {
            coeffs[k] += factor * binomial(p, k) as f64 * (-center).powi((p - k) as i32);
        }
    }
    Some(coeffs)
}

/// Evaluate a polynomial with coefficients lowest order first
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

fn binomial(n: usize, k: usize) -> u64 {
    (0..k).fold(1u64, |acc, i| acc * (n - i) as u64 / (i + 1) as u64)
}

/// Singular values below this fraction of the largest mark a rank-deficient design
const RANK_TOLERANCE: f64 = 1e-10;

/// Ordinary least squares result
#[derive(Debug, Clone)]
pub struct OlsFit {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
}

/// Ordinary least squares of `y` on the given regressor columns
pub fn ols(columns: &[Vec<f64>], y: &[f64]) -> Option<OlsFit> {
    let n = y.len();
    if columns.is_empty() || columns.iter().any(|c| c.len() != n) {
        return None;
    }
    let design = DMatrix::from_fn(n, columns.len(), |row, col| columns[col][row]);
    least_squares(design, y)
}

/// Solve the design matrix through its SVD.
///
/// Returns `None` when the design is rank deficient. Standard errors use
/// `diag((XᵀX)⁻¹) = Σ_j (V_ij / s_j)²` so the normal equations are never formed.
fn least_squares(design: DMatrix<f64>, y: &[f64]) -> Option<OlsFit> {
    let (n, k) = design.shape();
    if k == 0 || n <= k || y.len() != n {
        return None;
    }
    let target = DVector::from_column_slice(y);

    let svd = SVD::new(design.clone(), true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0, f64::max);
    if !(largest > 0.0) {
        return None;
    }
    let cutoff = largest * RANK_TOLERANCE;
    if svd.singular_values.iter().any(|s| *s <= cutoff) {
        return None;
    }

    let beta = svd.solve(&target, cutoff).ok()?;
    let rss = (&target - &design * &beta).norm_squared();
    let sigma2 = rss / (n - k) as f64;

    let v_t = svd.v_t.as_ref()?;
    let std_errors = (0..k)
        .map(|i| {
            let var: f64 = (0..k)
                .map(|j| (v_t[(j, i)] / svd.singular_values[j]).powi(2))
                .sum();
            (sigma2 * var).max(0.0).sqrt()
        })
        .collect();

    Some(OlsFit {
        coefficients: beta.iter().copied().collect(),
        std_errors,
    })
}

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7)
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let r = t * (-z * z - 1.26551223
        + t * (1.00002368
            + t * (0.37409196
                + t * (0.09678418
                    + t * (-0.18628806
                        + t * (0.27886807
                            + t * (-1.13520398
                                + t * (1.48851587 + t * (-0.82215223 + t * 0.17087277)))))))))
        .exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

/// Upper tail probability of the standard normal distribution
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}
