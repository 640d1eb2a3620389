//! Rolling cross-validation (spec §4.11): generates train/test folds over
//! a single series and scores a fresh forecaster per fold via a factory
//! callback.

use crate::error::{ForecastError, Result};
use crate::forecaster::Forecaster;
use crate::metrics::{self, AccuracyMetrics};
use crate::timeseries::TimeSeries;

/// Whether the training window slides forward with fixed size (`Rolling`)
/// or grows cumulatively from the start (`Expanding`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvStrategy {
    Rolling,
    Expanding,
}

#[derive(Debug, Clone, Copy)]
pub struct CvConfig {
    pub horizon: usize,
    pub initial_window: usize,
    pub step: usize,
    pub strategy: CvStrategy,
    /// Caps the number of folds generated; `None` runs until the series is
    /// exhausted.
    pub n_windows: Option<usize>,
}

impl CvConfig {
    pub fn new(horizon: usize, initial_window: usize, step: usize, strategy: CvStrategy) -> Self {
        Self { horizon, initial_window, step, strategy, n_windows: None }
    }

    pub fn with_n_windows(mut self, n_windows: usize) -> Self {
        self.n_windows = Some(n_windows);
        self
    }

    /// `floor((n - initial_window - horizon) / step) + 1`, clamped to
    /// `n_windows` and to 0 when the series is too short for one fold
    /// (spec §8's rolling-CV invariant).
    pub fn fold_count(&self, n: usize) -> usize {
        if self.step == 0 || n < self.initial_window + self.horizon {
            return 0;
        }
        let max_by_data = (n - self.initial_window - self.horizon) / self.step + 1;
        match self.n_windows {
            Some(cap) => max_by_data.min(cap),
            None => max_by_data,
        }
    }
}

/// One fold's outcome: its test-window start index, point forecast,
/// matching actuals, and per-fold metrics.
#[derive(Debug, Clone)]
pub struct CvFold {
    pub test_start: usize,
    pub train_len: usize,
    pub predicted: Vec<f64>,
    pub actual: Vec<f64>,
    pub metrics: AccuracyMetrics,
}

/// Aggregated outcome of a full rolling-CV run.
#[derive(Debug, Clone)]
pub struct CvResult {
    pub folds: Vec<CvFold>,
    /// Metrics over every fold's predictions/actuals concatenated in fold
    /// order (spec §4.11: "computed by concatenating all fold predictions
    /// and actuals").
    pub aggregated: AccuracyMetrics,
}

/// Run rolling cross-validation over `ts`, constructing a fresh forecaster
/// per fold via `factory` and fitting it on that fold's training range.
pub fn rolling_cv<F>(ts: &TimeSeries, config: CvConfig, mut factory: F) -> Result<CvResult>
where
    F: FnMut() -> Box<dyn Forecaster>,
{
    let y = ts.univariate_values()?;
    let n = y.len();
    let fold_count = config.fold_count(n);
    if fold_count == 0 {
        return Err(ForecastError::insufficient("rolling_cv", config.initial_window + config.horizon, n));
    }

    let mut folds = Vec::with_capacity(fold_count);
    let mut all_predicted = Vec::new();
    let mut all_actual = Vec::new();

    for i in 0..fold_count {
        let s = config.initial_window + i * config.step;
        let train_start = match config.strategy {
            CvStrategy::Rolling => s.saturating_sub(config.initial_window),
            CvStrategy::Expanding => 0,
        };
        let train = ts.slice(train_start..s)?;
        let test_actual = y[s..s + config.horizon].to_vec();

        let mut model = factory();
        model.fit(&train)?;
        let forecast = model.predict(config.horizon)?;
        let predicted = forecast.point;

        let fold_metrics = metrics::score(&test_actual, &predicted, None)?;
        all_predicted.extend_from_slice(&predicted);
        all_actual.extend_from_slice(&test_actual);

        folds.push(CvFold {
            test_start: s,
            train_len: s - train_start,
            predicted,
            actual: test_actual,
            metrics: fold_metrics,
        });
    }

    let aggregated = metrics::score(&all_actual, &all_predicted, None)?;
    Ok(CvResult { folds, aggregated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baselines::Naive;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_fold_count_matches_formula() {
        let config = CvConfig::new(6, 50, 6, CvStrategy::Rolling);
        // floor((150 - 50 - 6) / 6) + 1 = floor(94/6) + 1 = 15 + 1 = 16
        assert_eq!(config.fold_count(150), 16);
    }

    #[test]
    fn test_fold_count_respects_n_windows_cap() {
        let config = CvConfig::new(6, 50, 6, CvStrategy::Rolling).with_n_windows(2);
        assert_eq!(config.fold_count(150), 2);
    }

    #[test]
    fn test_fold_count_zero_when_too_short() {
        let config = CvConfig::new(10, 50, 6, CvStrategy::Rolling);
        assert_eq!(config.fold_count(40), 0);
    }

    #[test]
    fn test_rolling_cv_runs_naive_and_aggregates() {
        let y: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let config = CvConfig::new(3, 20, 5, CvStrategy::Rolling);
        let result = rolling_cv(&ts(y), config, || Box::new(Naive::new())).unwrap();
        assert_eq!(result.folds.len(), config.fold_count(60));
        let total: usize = result.folds.iter().map(|f| f.predicted.len()).sum();
        assert_eq!(result.aggregated.n, total);
    }

    #[test]
    fn test_expanding_cv_grows_train_len() {
        let y: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let config = CvConfig::new(3, 20, 5, CvStrategy::Expanding);
        let result = rolling_cv(&ts(y), config, || Box::new(Naive::new())).unwrap();
        for pair in result.folds.windows(2) {
            assert!(pair[1].train_len > pair[0].train_len);
        }
    }

    #[test]
    fn test_too_short_series_is_error() {
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let config = CvConfig::new(10, 50, 6, CvStrategy::Rolling);
        assert!(rolling_cv(&ts(y), config, || Box::new(Naive::new())).is_err());
    }
}
