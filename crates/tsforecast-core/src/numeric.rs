//! Shared numeric utilities: least squares, log-likelihood, normal quantiles
//! and Siegel's repeated-medians robust regression.

use crate::error::{ForecastError, Result};
use anofox_regression::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

/// Ordinary least squares fit of `y ~ X` (no implicit intercept column;
/// callers that want one include a constant column in `x`). Columns of `x`
/// are regressors, `x[i]` the regressor values for observation `i`.
///
/// Returns the fitted coefficient vector in the order the regressors are
/// given. Fails with `NumericalFailure` if the design matrix is singular.
pub fn least_squares(x: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>> {
    let n = y.len();
    if n == 0 || x.is_empty() {
        return Err(ForecastError::insufficient("least_squares", 1, n));
    }
    let k = x[0].len();
    if x.len() != n {
        return Err(ForecastError::invalid(
            "x",
            "design matrix row count must equal response length",
        ));
    }

    let x_mat = faer::Mat::from_fn(n, k, |i, j| x[i][j]);
    let y_col = faer::Col::from_fn(n, |i| y[i]);

    let fitted = OlsRegressor::builder()
        .with_intercept(false)
        .build()
        .fit(&x_mat, &y_col)
        .map_err(|e| ForecastError::numerical("least_squares", e.to_string(), 0))?;

    let coeffs_col = fitted.coefficients();
    let mut out = Vec::with_capacity(k);
    for i in 0..coeffs_col.nrows() {
        let v = coeffs_col[i];
        if !v.is_finite() {
            return Err(ForecastError::numerical(
                "least_squares",
                "singular design matrix",
                0,
            ));
        }
        out.push(v);
    }
    Ok(out)
}

/// Simple linear trend `y = intercept + slope * t` for `t = 0..n`, fit by
/// OLS. Returns `(intercept, slope, r_squared)`.
pub fn linear_trend(y: &[f64]) -> Result<(f64, f64, f64)> {
    let n = y.len();
    if n < 2 {
        return Err(ForecastError::insufficient("linear_trend", 2, n));
    }
    let x: Vec<Vec<f64>> = (0..n).map(|i| vec![1.0, i as f64]).collect();
    let beta = least_squares(&x, y)?;
    let (intercept, slope) = (beta[0], beta[1]);

    let mean = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (intercept + slope * i as f64)).powi(2))
        .sum();
    let r2 = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };
    Ok((intercept, slope, r2))
}

/// Siegel's repeated-medians regression: a robust alternative to OLS for
/// `y = intercept + slope * t`. For each point `i`, take the median over
/// `j != i` of the pairwise slope `(y[j]-y[i])/(j-i)`; the overall slope is
/// the median of those per-point medians, and the intercept follows from
/// the median residual.
pub fn siegel_repeated_medians(y: &[f64]) -> Result<(f64, f64, f64)> {
    let n = y.len();
    if n < 3 {
        return Err(ForecastError::insufficient("siegel_repeated_medians", 3, n));
    }

    let mut point_slopes = Vec::with_capacity(n);
    for i in 0..n {
        let mut slopes: Vec<f64> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (y[j] - y[i]) / (j as f64 - i as f64))
            .collect();
        point_slopes.push(median(&mut slopes));
    }
    let slope = median(&mut point_slopes);

    let mut intercepts: Vec<f64> = (0..n).map(|i| y[i] - slope * i as f64).collect();
    let intercept = median(&mut intercepts);

    let mean = y.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (intercept + slope * i as f64)).powi(2))
        .sum();
    let r2 = if ss_tot.abs() < f64::EPSILON {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };
    Ok((intercept, slope, r2))
}

/// Median of a slice, sorting it in place.
pub fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Two-sided normal quantile multiplier `z` such that `P(-z <= Z <= z) =
/// level` for a standard normal `Z`. Used to build symmetric confidence
/// bands: `point +/- z * sigma`.
pub fn normal_quantile(level: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&level) {
        return Err(ForecastError::invalid(
            "level",
            "confidence level must lie in (0, 1)",
        ));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::numerical("normal_quantile", e.to_string(), 0))?;
    let p = 0.5 + level / 2.0;
    Ok(normal.inverse_cdf(p))
}

/// Gaussian log-likelihood of `n` i.i.d. residuals with sample variance
/// `sse / n`.
pub fn gaussian_log_likelihood(sse: f64, n: usize) -> f64 {
    if n == 0 || sse <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let nf = n as f64;
    let sigma2 = sse / nf;
    -0.5 * nf * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0)
}

/// Akaike information criterion.
pub fn aic(log_likelihood: f64, k: usize) -> f64 {
    -2.0 * log_likelihood + 2.0 * k as f64
}

/// Corrected AIC (finite-sample correction), `NaN` when `n - k - 1 <= 0`.
pub fn aicc(log_likelihood: f64, k: usize, n: usize) -> f64 {
    let a = aic(log_likelihood, k);
    let denom = n as f64 - k as f64 - 1.0;
    if denom <= 0.0 {
        f64::NAN
    } else {
        a + 2.0 * k as f64 * (k as f64 + 1.0) / denom
    }
}

/// Bayesian information criterion.
pub fn bic(log_likelihood: f64, k: usize, n: usize) -> f64 {
    -2.0 * log_likelihood + k as f64 * (n as f64).ln()
}

/// `true` when every value is finite.
pub fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_trend_exact() {
        let y = vec![1.0, 3.0, 5.0, 7.0, 9.0];
        let (intercept, slope, r2) = linear_trend(&y).unwrap();
        assert_relative_eq!(intercept, 1.0, epsilon = 1e-8);
        assert_relative_eq!(slope, 2.0, epsilon = 1e-8);
        assert_relative_eq!(r2, 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_siegel_repeated_medians_exact_line() {
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let (intercept, slope, _) = siegel_repeated_medians(&y).unwrap();
        assert_relative_eq!(intercept, 2.0, epsilon = 1e-8);
        assert_relative_eq!(slope, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_siegel_repeated_medians_robust_to_outlier() {
        let mut y = vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0];
        y[3] = 1000.0; // single gross outlier
        let (_, slope, _) = siegel_repeated_medians(&y).unwrap();
        assert_relative_eq!(slope, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_normal_quantile_90() {
        let z = normal_quantile(0.90).unwrap();
        assert_relative_eq!(z, 1.6448536269514722, epsilon = 1e-6);
    }

    #[test]
    fn test_median_even_odd() {
        let mut odd = vec![3.0, 1.0, 2.0];
        assert_relative_eq!(median(&mut odd), 2.0, epsilon = 1e-12);
        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(median(&mut even), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_information_criteria() {
        let ll = gaussian_log_likelihood(10.0, 20);
        let a = aic(ll, 3);
        let b = bic(ll, 3, 20);
        assert!(a.is_finite());
        assert!(b.is_finite());
        assert!(b >= a); // ln(20) > 2 so BIC penalizes more here
    }
}
