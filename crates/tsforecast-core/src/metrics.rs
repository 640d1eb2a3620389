//! Forecast accuracy metrics (spec §3, §8).

use crate::error::{ForecastError, Result};

/// Accuracy metrics for a set of forecasts against realized actuals.
///
/// Metrics that cannot be computed for the given inputs (e.g. MAPE when
/// every actual is zero) are `None`, never `NaN` — see spec §9.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyMetrics {
    pub n: usize,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub mape: Option<f64>,
    pub smape: Option<f64>,
    pub mase: Option<f64>,
    pub r_squared: Option<f64>,
}

fn validate_inputs(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::invalid(
            "predicted",
            format!(
                "actual and predicted must have equal length: {} vs {}",
                actual.len(),
                predicted.len()
            ),
        ));
    }
    if actual.is_empty() {
        return Err(ForecastError::insufficient("score", 1, 0));
    }
    Ok(())
}

/// Mean Absolute Error.
pub fn mae(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate_inputs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Mean Squared Error.
pub fn mse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    validate_inputs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mse(actual, predicted)?.sqrt())
}

/// Mean Absolute Percentage Error; uses only indices where `actual != 0`.
/// `None` when no such index exists.
pub fn mape(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>> {
    validate_inputs(actual, predicted)?;
    let mut sum = 0.0;
    let mut count = 0usize;
    for (a, p) in actual.iter().zip(predicted) {
        if a.abs() > f64::EPSILON {
            sum += ((a - p) / a).abs();
            count += 1;
        }
    }
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(sum / count as f64))
}

/// Symmetric Mean Absolute Percentage Error; excludes indices where
/// `|actual| + |predicted| == 0`. `None` when no index survives.
pub fn smape(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>> {
    validate_inputs(actual, predicted)?;
    let mut sum = 0.0;
    let mut count = 0usize;
    for (a, p) in actual.iter().zip(predicted) {
        let denom = a.abs() + p.abs();
        if denom > f64::EPSILON {
            sum += 2.0 * (a - p).abs() / denom;
            count += 1;
        }
    }
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(sum / count as f64))
}

/// Mean Absolute Scaled Error: `MAE(actual, predicted) / MAE(actual,
/// baseline)`. `None` when the baseline MAE is zero.
pub fn mase(actual: &[f64], predicted: &[f64], baseline: &[f64]) -> Result<Option<f64>> {
    validate_inputs(actual, predicted)?;
    if actual.len() != baseline.len() {
        return Err(ForecastError::invalid(
            "baseline",
            "actual and baseline must have equal length",
        ));
    }
    let baseline_mae = mae(actual, baseline)?;
    if baseline_mae.abs() < f64::EPSILON {
        return Ok(None);
    }
    Ok(Some(mae(actual, predicted)? / baseline_mae))
}

/// Coefficient of determination. `None` when `actual` is constant.
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>> {
    validate_inputs(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot.abs() < f64::EPSILON {
        return Ok(None);
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(Some(1.0 - ss_res / ss_tot))
}

/// Compute the full `AccuracyMetrics` bundle in one pass over the inputs.
/// `baseline`, when given, backs MASE.
pub fn score(actual: &[f64], predicted: &[f64], baseline: Option<&[f64]>) -> Result<AccuracyMetrics> {
    validate_inputs(actual, predicted)?;
    Ok(AccuracyMetrics {
        n: actual.len(),
        mae: mae(actual, predicted)?,
        mse: mse(actual, predicted)?,
        rmse: rmse(actual, predicted)?,
        mape: mape(actual, predicted)?,
        smape: smape(actual, predicted)?,
        mase: match baseline {
            Some(b) => mase(actual, predicted, b)?,
            None => None,
        },
        r_squared: r_squared(actual, predicted)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mae_mse_rmse() {
        let actual = vec![10.0, 12.0, 11.0, 13.0];
        let predicted = vec![9.0, 12.0, 11.5, 12.0];
        assert_relative_eq!(mae(&actual, &predicted).unwrap(), (1.0 + 0.0 + 0.5 + 1.0) / 4.0);
        assert_relative_eq!(mse(&actual, &predicted).unwrap(), (1.0 + 0.0 + 0.25 + 1.0) / 4.0);
        assert_relative_eq!(rmse(&actual, &predicted).unwrap(), mse(&actual, &predicted).unwrap().sqrt());
    }

    #[test]
    fn test_naive_scenario_mae() {
        // spec §8 scenario 1: Naive on [10, 12, 11, 13]
        let actual = vec![12.0, 11.0, 13.0];
        let fitted = vec![10.0, 12.0, 11.0];
        assert_relative_eq!(mae(&actual, &fitted).unwrap(), 5.0 / 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_self_comparison_identities() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mae(&a, &a).unwrap(), 0.0);
        assert_relative_eq!(rmse(&a, &a).unwrap(), 0.0);
        assert_relative_eq!(mape(&a, &a).unwrap().unwrap(), 0.0);
        assert_relative_eq!(r_squared(&a, &a).unwrap().unwrap(), 1.0);
        let mean = a.iter().sum::<f64>() / a.len() as f64;
        let mean_pred = vec![mean; a.len()];
        assert_relative_eq!(r_squared(&a, &mean_pred).unwrap().unwrap(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_mape_all_zero_actual_is_none() {
        let actual = vec![0.0, 0.0];
        let predicted = vec![1.0, 2.0];
        assert_eq!(mape(&actual, &predicted).unwrap(), None);
    }

    #[test]
    fn test_mase_zero_baseline_is_none() {
        let actual = vec![1.0, 2.0, 3.0];
        let predicted = vec![1.1, 2.1, 2.9];
        let baseline = vec![1.0, 2.0, 3.0]; // perfect baseline -> MAE 0
        assert_eq!(mase(&actual, &predicted, &baseline).unwrap(), None);
    }

    #[test]
    fn test_length_mismatch_errors() {
        let actual = vec![1.0, 2.0];
        let predicted = vec![1.0];
        assert!(mae(&actual, &predicted).is_err());
    }
}
