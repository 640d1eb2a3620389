//! Differencing/integration for ARIMA's `d`/`D` orders (spec §4.4).
//!
//! Mirrors the iterated-differencing shape used by the plain `diff` helper
//! in this crate's predecessor, generalized to seasonal lags and paired
//! with the inverse `integrate` operation ARIMA needs to reconstruct levels
//! from forecasted differences.

use crate::error::{ForecastError, Result};

/// `order`-fold first difference: `y[t] - y[t-1]`, iterated `order` times.
pub fn difference(values: &[f64], order: usize) -> Result<Vec<f64>> {
    if order == 0 {
        return Ok(values.to_vec());
    }
    let mut result = values.to_vec();
    for _ in 0..order {
        if result.len() < 2 {
            return Err(ForecastError::insufficient("difference", 2, result.len()));
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    Ok(result)
}

/// Inverse of `difference`: reconstructs the original series from a
/// differenced series plus the `order` seed values that preceded it
/// (`seed` is `original[0..order]`).
pub fn integrate(differenced: &[f64], seed: &[f64], order: usize) -> Result<Vec<f64>> {
    if seed.len() != order {
        return Err(ForecastError::invalid(
            "seed",
            format!("integrate needs exactly {order} seed values, got {}", seed.len()),
        ));
    }
    if order == 0 {
        return Ok(differenced.to_vec());
    }

    // Reconstruct one differencing order at a time, innermost first, using
    // the matching slice of `seed` as that order's starting level(s).
    let mut layers: Vec<Vec<f64>> = Vec::with_capacity(order + 1);
    layers.push(differenced.to_vec());
    for k in (0..order).rev() {
        let lower = layers.last().unwrap();
        let mut reconstructed = Vec::with_capacity(lower.len() + 1);
        reconstructed.push(seed[k]);
        let mut acc = seed[k];
        for &d in lower {
            acc += d;
            reconstructed.push(acc);
        }
        layers.push(reconstructed);
    }
    Ok(layers.pop().unwrap())
}

/// `D`-fold seasonal difference at lag `s`: `y[t] - y[t-s]`, iterated `D`
/// times.
pub fn seasonal_difference(values: &[f64], seasonal_order: usize, lag: usize) -> Result<Vec<f64>> {
    if seasonal_order == 0 {
        return Ok(values.to_vec());
    }
    if lag == 0 {
        return Err(ForecastError::invalid("lag", "seasonal lag must be >= 1"));
    }
    let mut result = values.to_vec();
    for _ in 0..seasonal_order {
        if result.len() <= lag {
            return Err(ForecastError::insufficient("seasonal_difference", lag + 1, result.len()));
        }
        result = (lag..result.len()).map(|t| result[t] - result[t - lag]).collect();
    }
    Ok(result)
}

/// Inverse of `seasonal_difference`. `seed` holds the `seasonal_order * lag`
/// values that preceded the differenced series, oldest first.
pub fn seasonal_integrate(differenced: &[f64], seed: &[f64], seasonal_order: usize, lag: usize) -> Result<Vec<f64>> {
    if seed.len() != seasonal_order * lag {
        return Err(ForecastError::invalid(
            "seed",
            format!(
                "seasonal_integrate needs {} seed values, got {}",
                seasonal_order * lag,
                seed.len()
            ),
        ));
    }
    if seasonal_order == 0 {
        return Ok(differenced.to_vec());
    }

    let mut layers: Vec<Vec<f64>> = Vec::with_capacity(seasonal_order + 1);
    layers.push(differenced.to_vec());
    for k in (0..seasonal_order).rev() {
        let lower = layers.last().unwrap();
        let this_seed = &seed[k * lag..(k + 1) * lag];
        let mut reconstructed = this_seed.to_vec();
        for (i, &d) in lower.iter().enumerate() {
            let prior = reconstructed[i];
            reconstructed.push(prior + d);
        }
        layers.push(reconstructed);
    }
    Ok(layers.pop().unwrap())
}

/// Applies a non-seasonal difference of order `d` followed by a seasonal
/// difference of order `D` at lag `s` (spec §4.4 `combinedDifference`).
pub fn combined_difference(values: &[f64], d: usize, seasonal_order: usize, lag: usize) -> Result<Vec<f64>> {
    let diffed = difference(values, d)?;
    seasonal_difference(&diffed, seasonal_order, lag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_difference_order_one() {
        let y = vec![1.0, 2.0, 4.0, 7.0];
        assert_eq!(difference(&y, 1).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_difference_then_integrate_is_identity() {
        let y = vec![5.0, 7.0, 6.0, 9.0, 11.0];
        let d = difference(&y, 1).unwrap();
        let reconstructed = integrate(&d, &y[0..1], 1).unwrap();
        for (a, b) in y.iter().zip(reconstructed.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_difference_order_two_then_integrate() {
        let y = vec![1.0, 4.0, 9.0, 16.0, 25.0];
        let d = difference(&y, 2).unwrap();
        let reconstructed = integrate(&d, &y[0..2], 2).unwrap();
        for (a, b) in y.iter().zip(reconstructed.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_seasonal_difference_then_integrate_is_identity() {
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let d = seasonal_difference(&y, 1, 4).unwrap();
        let reconstructed = seasonal_integrate(&d, &y[0..4], 1, 4).unwrap();
        for (a, b) in y.iter().zip(reconstructed.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_difference_too_short_is_error() {
        assert!(difference(&[1.0], 2).is_err());
    }

    #[test]
    fn test_combined_difference_matches_sequential_application() {
        let y: Vec<f64> = (0..20).map(|i| i as f64 + (i % 4) as f64 * 0.5).collect();
        let combined = combined_difference(&y, 1, 1, 4).unwrap();
        let manual = seasonal_difference(&difference(&y, 1).unwrap(), 1, 4).unwrap();
        assert_eq!(combined, manual);
    }
}
