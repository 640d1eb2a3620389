//! Autocorrelation-based seasonality detection used by Theta and MFLES
//! (spec §4.7, §4.8).

use crate::error::{ForecastError, Result};

/// Sample autocorrelation at `lag` (population variance in the
/// denominator, matching the rest of this crate's variance conventions).
pub fn acf_at_lag(values: &[f64], lag: usize) -> Result<f64> {
    if lag == 0 || lag >= values.len() {
        return Err(ForecastError::invalid(
            "lag",
            format!("acf lag must be in 1..{}, got {lag}", values.len()),
        ));
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if variance.abs() < f64::EPSILON {
        return Ok(0.0);
    }
    let cov: f64 = (0..values.len() - lag)
        .map(|i| (values[i] - mean) * (values[i + lag] - mean))
        .sum();
    Ok(cov / variance)
}

/// Whether the series shows significant seasonality at `period`: the ACF at
/// that lag exceeds `threshold` (spec §4.7: "autocorrelation at lag s above
/// a threshold"). Requires at least `2 * period` observations to be
/// meaningful.
pub fn is_seasonal(values: &[f64], period: usize, threshold: f64) -> bool {
    if period <= 1 || values.len() < 2 * period {
        return false;
    }
    acf_at_lag(values, period).map(|r| r > threshold).unwrap_or(false)
}

/// Coefficient of variation, used to choose additive vs. multiplicative
/// decomposition (spec §4.8: "auto-detected via coefficient of variation").
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean.abs() < f64::EPSILON {
        return f64::INFINITY;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean.abs()
}

/// Whether every value is strictly positive, the precondition for a
/// multiplicative decomposition.
pub fn all_positive(values: &[f64]) -> bool {
    values.iter().all(|&v| v > 0.0)
}

/// Classical seasonal decomposition by a centered moving average of width
/// `period`, returning `(trend, seasonal, residual)` with `seasonal`
/// normalized to average to 0 (additive) or 1 (multiplicative) across one
/// cycle.
pub fn classical_decompose(values: &[f64], period: usize, multiplicative: bool) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let n = values.len();
    if period < 2 || n < 2 * period {
        return Err(ForecastError::insufficient("classical_decompose", 2 * period, n));
    }

    let trend = centered_moving_average(values, period);

    let detrended: Vec<f64> = values
        .iter()
        .zip(&trend)
        .map(|(&v, t)| match t {
            Some(t) if multiplicative && t.abs() > f64::EPSILON => v / t,
            Some(t) => v - t,
            None => f64::NAN,
        })
        .collect();

    let mut seasonal_sum = vec![0.0; period];
    let mut seasonal_count = vec![0usize; period];
    for (i, &d) in detrended.iter().enumerate() {
        if d.is_finite() {
            seasonal_sum[i % period] += d;
            seasonal_count[i % period] += 1;
        }
    }
    let mut seasonal_pattern: Vec<f64> = seasonal_sum
        .iter()
        .zip(&seasonal_count)
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    if multiplicative {
        let mean = seasonal_pattern.iter().sum::<f64>() / period as f64;
        if mean.abs() > f64::EPSILON {
            for v in &mut seasonal_pattern {
                *v /= mean;
            }
        }
    } else {
        let mean = seasonal_pattern.iter().sum::<f64>() / period as f64;
        for v in &mut seasonal_pattern {
            *v -= mean;
        }
    }

    let seasonal: Vec<f64> = (0..n).map(|i| seasonal_pattern[i % period]).collect();
    let trend_filled = fill_trend_edges(&trend);
    let residual: Vec<f64> = values
        .iter()
        .zip(&trend_filled)
        .zip(&seasonal)
        .map(|((&v, &t), &s)| if multiplicative { v / (t * s).max(f64::EPSILON) } else { v - t - s })
        .collect();

    Ok((trend_filled, seasonal, residual))
}

fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    (0..n)
        .map(|i| {
            if period % 2 == 0 {
                if i < half || i + half >= n {
                    return None;
                }
                // Centered MA for an even period: average of two
                // offset length-`period` windows.
                let w1: f64 = values[i - half..i - half + period].iter().sum();
                let w2: f64 = values[i - half + 1..i - half + 1 + period].iter().sum();
                Some((w1 + w2) / (2.0 * period as f64))
            } else {
                if i < half || i + half >= n {
                    return None;
                }
                let sum: f64 = values[i - half..=i + half].iter().sum();
                Some(sum / period as f64)
            }
        })
        .collect()
}

fn fill_trend_edges(trend: &[Option<f64>]) -> Vec<f64> {
    let first = trend.iter().flatten().next().copied().unwrap_or(0.0);
    let last = trend.iter().rev().flatten().next().copied().unwrap_or(0.0);
    trend.iter().map(|t| t.unwrap_or(0.0)).enumerate().map(|(i, v)| {
        if trend[i].is_none() {
            if i < trend.len() / 2 { first } else { last }
        } else {
            v
        }
    }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acf_at_lag_detects_period() {
        let values: Vec<f64> = (0..60).map(|i| (i % 12) as f64).collect();
        let r = acf_at_lag(&values, 12).unwrap();
        assert!(r > 0.5);
    }

    #[test]
    fn test_is_seasonal_true_for_repeating_pattern() {
        let values: Vec<f64> = (0..48).map(|i| ((i % 4) as f64) * 10.0).collect();
        assert!(is_seasonal(&values, 4, 0.3));
    }

    #[test]
    fn test_is_seasonal_false_for_white_noise_like_ramp() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        // short series below the 2*period floor
        assert!(!is_seasonal(&values, 12, 0.3));
    }

    #[test]
    fn test_coefficient_of_variation_constant_series() {
        let values = vec![5.0; 10];
        assert_eq!(coefficient_of_variation(&values), 0.0);
    }

    #[test]
    fn test_classical_decompose_additive_recovers_seasonal_pattern() {
        let pattern = [1.0, -1.0, 2.0, -2.0];
        let values: Vec<f64> = (0..40)
            .map(|i| 100.0 + i as f64 * 0.5 + pattern[i % 4])
            .collect();
        let (_, seasonal, _) = classical_decompose(&values, 4, false).unwrap();
        for i in 0..4 {
            assert!((seasonal[i] - pattern[i]).abs() < 1.0);
        }
    }
}
