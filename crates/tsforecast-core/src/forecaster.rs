//! The polymorphic forecaster contract (spec §4.1).

use crate::error::{ForecastError, Result};
use crate::metrics::{self, AccuracyMetrics};
use crate::numeric::normal_quantile;

/// The default confidence level used by `predict_with_confidence` helpers
/// when a caller doesn't pass one explicitly.
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.90;

/// A model's output: a point forecast, optional symmetric quantile bands,
/// and optional in-sample fitted values.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub point: Vec<f64>,
    pub lower: Option<Vec<f64>>,
    pub upper: Option<Vec<f64>>,
    pub model_name: String,
    pub confidence_level: Option<f64>,
    pub insample_fitted: Option<Vec<f64>>,
}

impl Forecast {
    pub fn point_only(model_name: impl Into<String>, point: Vec<f64>) -> Self {
        Self {
            point,
            lower: None,
            upper: None,
            model_name: model_name.into(),
            confidence_level: None,
            insample_fitted: None,
        }
    }

    /// Attach symmetric Gaussian bands `point +/- z(level) * sigma_h` given
    /// a per-horizon-step standard deviation.
    pub fn with_gaussian_bands(mut self, level: f64, sigma: &[f64]) -> Result<Self> {
        if sigma.len() != self.point.len() {
            return Err(ForecastError::invalid(
                "sigma",
                "sigma must have one entry per horizon step",
            ));
        }
        let z = normal_quantile(level)?;
        let lower = self
            .point
            .iter()
            .zip(sigma)
            .map(|(p, s)| p - z * s)
            .collect();
        let upper = self
            .point
            .iter()
            .zip(sigma)
            .map(|(p, s)| p + z * s)
            .collect();
        self.lower = Some(lower);
        self.upper = Some(upper);
        self.confidence_level = Some(level);
        Ok(self)
    }
}

/// Capability set every model in this crate implements (spec §4.1, §6).
pub trait Forecaster {
    /// Validate and fit on `ts`'s univariate series. Stores history and
    /// marks the model `fitted`.
    fn fit(&mut self, ts: &crate::timeseries::TimeSeries) -> Result<()>;

    /// Point forecast for `h >= 1` future steps. Requires `fit` to have
    /// succeeded. Deterministic and idempotent across repeated calls given
    /// the same fitted state.
    fn predict(&self, h: usize) -> Result<Forecast>;

    /// The model's stable name, e.g. `"Naive"`, `"AutoETS"` (spec §6).
    fn name(&self) -> &str;

    /// Whether `fit` has completed successfully.
    fn is_fitted(&self) -> bool;

    /// `predict(h)` augmented with symmetric Gaussian confidence bands,
    /// unless the implementation produces its own interval logic. Default
    /// confidence level is `DEFAULT_CONFIDENCE_LEVEL`.
    fn predict_with_confidence(&self, h: usize, level: f64) -> Result<Forecast> {
        let forecast = self.predict(h)?;
        let sigma = self.residual_std_for_horizon(h)?;
        forecast.with_gaussian_bands(level, &sigma)
    }

    /// Per-horizon-step residual standard deviation used by the default
    /// `predict_with_confidence` (naive random-walk scaling: sigma *
    /// sqrt(step)). Models with a principled variance model override this.
    fn residual_std_for_horizon(&self, h: usize) -> Result<Vec<f64>> {
        let sigma = self.residual_std()?;
        Ok((1..=h).map(|i| sigma * (i as f64).sqrt()).collect())
    }

    /// One-step-ahead residual standard deviation from the fitted history.
    fn residual_std(&self) -> Result<f64>;

    /// Pure scoring function: compare realized `actual` to `predicted`
    /// (and optionally a `baseline` for MASE).
    fn score(&self, actual: &[f64], predicted: &[f64], baseline: Option<&[f64]>) -> Result<AccuracyMetrics> {
        metrics::score(actual, predicted, baseline)
    }

    fn require_fitted(&self) -> Result<()> {
        if self.is_fitted() {
            Ok(())
        } else {
            Err(ForecastError::not_fitted(self.name()))
        }
    }

    fn require_horizon(&self, h: usize) -> Result<()> {
        if h == 0 {
            Err(ForecastError::invalid("h", "horizon must be >= 1"))
        } else {
            Ok(())
        }
    }
}

/// Compute the standard deviation of a residual vector (population, i.e.
/// divisor `n`, matching the MSE-based variance used throughout this
/// crate's models).
pub fn residual_std_of(residuals: &[f64]) -> f64 {
    let n = residuals.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = residuals.iter().sum::<f64>() / n as f64;
    let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64;
    var.sqrt()
}
