//! Theta family (spec §4.7): classic, optimized, dynamic and
//! dynamic-optimized variants, with optional deseasonalization.
//!
//! The theta line itself is a thin transform of the series; the actual
//! extrapolation is delegated to the exponential-smoothing engine in
//! [`crate::ets`] (`SES` for the classic/optimized variants, `Holt` for the
//! dynamic ones) rather than a second hand-rolled recursion.

use crate::error::{ForecastError, Result};
use crate::ets::Ets;
use crate::forecaster::{Forecast, Forecaster};
use crate::numeric::linear_trend;
use crate::optimizer::grid_search;
use crate::seasonality::{all_positive, classical_decompose, is_seasonal};
use crate::timeseries::TimeSeries;

const SEASONALITY_THRESHOLD: f64 = 0.3;

/// `y_theta(t) = theta*y(t) - (theta-1)*trend(t)`, the "theta line" (spec
/// §4.7). `theta=1` reproduces `y` unchanged; `theta=2` doubles the local
/// curvature around the linear trend.
fn theta_line(y: &[f64], theta: f64, intercept: f64, slope: f64) -> Vec<f64> {
    y.iter()
        .enumerate()
        .map(|(t, &v)| theta * v + (1.0 - theta) * (intercept + slope * t as f64))
        .collect()
}

/// Combine a short-term extrapolation of the theta line with the long-term
/// linear trend, weighted `1/theta` and `1 - 1/theta` respectively — the
/// standard Theta-method recombination (Assimakopoulos & Nikolopoulos 2000).
fn combine(theta_forecast: &[f64], theta: f64, intercept: f64, slope: f64, start_t: usize) -> Vec<f64> {
    if theta.abs() < f64::EPSILON {
        return (0..theta_forecast.len()).map(|i| intercept + slope * (start_t + i) as f64).collect();
    }
    let w_theta = 1.0 / theta;
    let w_trend = 1.0 - w_theta;
    theta_forecast
        .iter()
        .enumerate()
        .map(|(i, &tf)| w_theta * tf + w_trend * (intercept + slope * (start_t + i) as f64))
        .collect()
}

fn synthetic_ts(ts: &TimeSeries, values: Vec<f64>) -> Result<TimeSeries> {
    TimeSeries::univariate(ts.timestamps().to_vec(), values)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Dynamics {
    Ses(Option<f64>),
    Holt(Option<f64>, Option<f64>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SeasonalShape {
    None,
    Additive,
    Multiplicative,
}

struct SeasonalContext {
    shape: SeasonalShape,
    period: usize,
    pattern: Vec<f64>,
}

fn detect_seasonal_context(y: &[f64], season_length: usize) -> Option<SeasonalContext> {
    if season_length <= 1 || !is_seasonal(y, season_length, SEASONALITY_THRESHOLD) {
        return None;
    }
    let multiplicative = all_positive(y);
    let (_, seasonal, _) = classical_decompose(y, season_length, multiplicative).ok()?;
    Some(SeasonalContext {
        shape: if multiplicative { SeasonalShape::Multiplicative } else { SeasonalShape::Additive },
        period: season_length,
        pattern: seasonal[..season_length].to_vec(),
    })
}

fn deseasonalize(y: &[f64], ctx: &SeasonalContext) -> Vec<f64> {
    y.iter()
        .enumerate()
        .map(|(t, &v)| match ctx.shape {
            SeasonalShape::Additive => v - ctx.pattern[t % ctx.period],
            SeasonalShape::Multiplicative => v / ctx.pattern[t % ctx.period],
            SeasonalShape::None => v,
        })
        .collect()
}

fn reseasonalize(forecast: &mut [f64], ctx: &SeasonalContext, n: usize) {
    for (i, v) in forecast.iter_mut().enumerate() {
        let t = n + i;
        match ctx.shape {
            SeasonalShape::Additive => *v += ctx.pattern[t % ctx.period],
            SeasonalShape::Multiplicative => *v *= ctx.pattern[t % ctx.period],
            SeasonalShape::None => {}
        }
    }
}

/// One engine backing `Theta`, `OptimizedTheta`, `DynamicTheta` and
/// `DynamicOptimizedTheta`: the two knobs are whether `theta` is optimized
/// and whether the line is extrapolated with SES or Holt.
pub struct ThetaModel {
    display_name: &'static str,
    optimize_theta: bool,
    dynamics: Dynamics,
    season_length: usize,

    theta: Option<f64>,
    trend: Option<(f64, f64)>,
    seasonal: Option<SeasonalContext>,
    inner: Option<Ets>,
    history_len: usize,
    fitted: Vec<f64>,
}

impl ThetaModel {
    fn new(display_name: &'static str, optimize_theta: bool, dynamics: Dynamics, season_length: usize) -> Self {
        Self {
            display_name,
            optimize_theta,
            dynamics,
            season_length,
            theta: None,
            trend: None,
            seasonal: None,
            inner: None,
            history_len: 0,
            fitted: Vec::new(),
        }
    }

    /// Classic Theta(theta=2) with a default SES alpha.
    pub fn classic(season_length: usize) -> Self {
        let mut model = Self::new("Theta", false, Dynamics::Ses(None), season_length);
        model.theta = Some(2.0);
        model
    }

    /// Grid-searches theta and alpha minimizing in-sample MSE.
    pub fn optimized(season_length: usize) -> Self {
        Self::new("OptimizedTheta", true, Dynamics::Ses(None), season_length)
    }

    /// Theta(2) with Holt's linear-trend smoothing in place of SES.
    pub fn dynamic(season_length: usize) -> Self {
        let mut model = Self::new("DynamicTheta", false, Dynamics::Holt(None, None), season_length);
        model.theta = Some(2.0);
        model
    }

    /// Jointly optimizes theta, alpha and beta.
    pub fn dynamic_optimized(season_length: usize) -> Self {
        Self::new("DynamicOptimizedTheta", true, Dynamics::Holt(None, None), season_length)
    }

    /// Fits the inner SES/Holt smoother on the theta line. The MSE used for
    /// the theta/alpha(/beta) search is the inner model's own one-step MSE
    /// on the theta line, a proxy for the combined forecast's MSE (the
    /// trend half of the combination is the OLS fit itself, already
    /// MSE-optimal by construction).
    fn fit_inner(y_theta: &[f64], ts_template: &TimeSeries, dynamics: Dynamics) -> Result<(Ets, f64)> {
        let ts = synthetic_ts(ts_template, y_theta.to_vec())?;
        let mut ets = match dynamics {
            Dynamics::Ses(alpha) => Ets::ses(alpha),
            Dynamics::Holt(alpha, beta) => Ets::holt(alpha, beta),
        };
        ets.fit(&ts)?;
        let diag = ets
            .diagnostics()
            .ok_or_else(|| ForecastError::numerical("Theta", "inner model produced no diagnostics", 0))?;
        Ok((ets, diag.mse))
    }
}

impl Forecaster for ThetaModel {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y_full = ts.univariate_values()?;
        if y_full.len() < 4 {
            return Err(ForecastError::insufficient("Theta", 4, y_full.len()));
        }

        let seasonal = detect_seasonal_context(y_full, self.season_length);
        let y: Vec<f64> = match &seasonal {
            Some(ctx) => deseasonalize(y_full, ctx),
            None => y_full.to_vec(),
        };
        self.seasonal = seasonal;

        let (intercept, slope, _) = linear_trend(&y)?;
        self.trend = Some((intercept, slope));
        self.history_len = y.len();

        let base_dynamics = self.dynamics;
        if self.optimize_theta {
            let bounds = match base_dynamics {
                Dynamics::Ses(_) => vec![(0.5, 3.0), (0.01, 0.99)],
                Dynamics::Holt(_, _) => vec![(0.5, 3.0), (0.01, 0.99), (0.01, 0.99)],
            };
            let objective = |params: &[f64]| -> f64 {
                let theta = params[0];
                let line = theta_line(&y, theta, intercept, slope);
                let dynamics = match base_dynamics {
                    Dynamics::Ses(_) => Dynamics::Ses(Some(params[1])),
                    Dynamics::Holt(_, _) => Dynamics::Holt(Some(params[1]), Some(params[2])),
                };
                match Self::fit_inner(&line, ts, dynamics) {
                    Ok((_, mse)) => mse,
                    Err(_) => f64::INFINITY,
                }
            };
            let result = grid_search(&objective, &bounds, 15);
            self.theta = Some(result.params[0]);
            self.dynamics = match base_dynamics {
                Dynamics::Ses(_) => Dynamics::Ses(Some(result.params[1])),
                Dynamics::Holt(_, _) => Dynamics::Holt(Some(result.params[1]), Some(result.params[2])),
            };
        }

        let theta = self.theta.unwrap_or(2.0);
        let line = theta_line(&y, theta, intercept, slope);
        let (ets, _mse) = Self::fit_inner(&line, ts, self.dynamics)?;

        // One-step-ahead reconstruction aligned to the original index: the
        // theta line itself already is the one-step "prediction" of y under
        // this transform, recombined with the trend at each t.
        let mut fitted: Vec<f64> = (0..y.len()).map(|t| combine(&[line[t]], theta, intercept, slope, t)[0]).collect();
        if let Some(ctx) = &self.seasonal {
            reseasonalize(&mut fitted, ctx, 0);
        }
        self.fitted = fitted;
        self.inner = Some(ets);
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let ets = self.inner.as_ref().unwrap();
        let (intercept, slope) = self.trend.unwrap();
        let theta = self.theta.unwrap_or(2.0);

        let line_forecast = ets.predict(h)?;
        let mut point = combine(&line_forecast.point, theta, intercept, slope, self.history_len);

        if let Some(ctx) = &self.seasonal {
            reseasonalize(&mut point, ctx, self.history_len);
        }

        let mut forecast = Forecast::point_only(self.display_name, point.clone());
        forecast.insample_fitted = Some(self.fitted.clone());
        Ok(forecast)
    }

    fn name(&self) -> &str {
        self.display_name
    }

    fn is_fitted(&self) -> bool {
        self.inner.is_some()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        self.inner.as_ref().unwrap().residual_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_theta_line_identity_at_theta_one() {
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let line = theta_line(&y, 1.0, 0.0, 1.0);
        for (a, b) in y.iter().zip(line.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_classic_theta_forecasts_linear_trend_closely() {
        let y: Vec<f64> = (0..30).map(|i| 10.0 + i as f64 * 2.0).collect();
        let mut model = ThetaModel::classic(1);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(3).unwrap();
        // a pure linear trend should be extrapolated close to 10 + 2*t
        assert_relative_eq!(forecast.point[0], 10.0 + 2.0 * 30.0, epsilon = 5.0);
    }

    #[test]
    fn test_optimized_theta_runs_and_produces_finite_forecast() {
        let y: Vec<f64> = (0..25).map(|i| 50.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.2).collect();
        let mut model = ThetaModel::optimized(1);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(4).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_dynamic_theta_uses_holt_inner_model() {
        let y: Vec<f64> = (0..25).map(|i| 10.0 + i as f64 * 1.5).collect();
        let mut model = ThetaModel::dynamic(1);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(2).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_seasonal_theta_reseasonalizes() {
        let pattern = [5.0, -5.0, 3.0, -3.0];
        let y: Vec<f64> = (0..48).map(|i| 100.0 + i as f64 * 0.5 + pattern[i % 4]).collect();
        let mut model = ThetaModel::classic(4);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(4).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_too_short_series_is_error() {
        let mut model = ThetaModel::classic(1);
        assert!(model.fit(&ts(vec![1.0, 2.0])).is_err());
    }
}
