//! MFLES: gradient-boosted decomposition (spec §4.8).
//!
//! Each boosting round peels a trend estimate, a per-period Fourier
//! seasonal estimate and a smoothed residual off the running residual,
//! scaled by per-component learning rates, until the SSE stops improving.
//! The trend/seasonal/residual-smoothing sub-steps reuse this crate's
//! existing regressors (`numeric::linear_trend`, `numeric::
//! siegel_repeated_medians`, `changepoint::detect_changepoints`,
//! `ets::Ets`) rather than duplicating them.

use std::f64::consts::PI;

use crate::changepoint::{detect_changepoints, CostFunction};
use crate::error::{ForecastError, Result};
use crate::ets::Ets;
use crate::forecaster::{Forecast, Forecaster};
use crate::numeric::{least_squares, linear_trend, median, siegel_repeated_medians};
use crate::seasonality::{all_positive, coefficient_of_variation};
use crate::timeseries::TimeSeries;

/// Coefficient-of-variation floor above which multiplicative decomposition
/// is preferred when `MflesConfig::multiplicative` is left `None` (spec
/// §4.8: "auto-detected via coefficient of variation >= threshold").
const MULTIPLICATIVE_COV_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MflesTrendMethod {
    Ols,
    Siegel,
    /// Changepoint-segmented piecewise-linear trend.
    Piecewise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResidualSmoother {
    EsEnsemble { min_alpha: f64, max_alpha: f64, size: usize },
    MovingAverage { window: usize },
}

#[derive(Debug, Clone)]
pub struct MflesConfig {
    pub seasonal_periods: Vec<usize>,
    pub max_rounds: usize,
    pub trend_method: MflesTrendMethod,
    pub lr_trend: f64,
    pub lr_season: f64,
    pub lr_rs: f64,
    pub fourier_order_override: Option<usize>,
    pub seasonality_weights: bool,
    pub residual_smoother: ResidualSmoother,
    pub outlier_cap_start_round: Option<usize>,
    pub outlier_sigma: f64,
    pub convergence_threshold: f64,
    /// `None` auto-detects additive vs. multiplicative via coefficient of
    /// variation.
    pub multiplicative: Option<bool>,
    pub changepoint_min_size: usize,
}

impl Default for MflesConfig {
    fn default() -> Self {
        Self {
            seasonal_periods: Vec::new(),
            max_rounds: 20,
            trend_method: MflesTrendMethod::Ols,
            lr_trend: 0.5,
            lr_season: 0.5,
            lr_rs: 0.5,
            fourier_order_override: None,
            seasonality_weights: false,
            residual_smoother: ResidualSmoother::EsEnsemble { min_alpha: 0.05, max_alpha: 0.3, size: 5 },
            outlier_cap_start_round: None,
            outlier_sigma: 3.0,
            convergence_threshold: 1e-4,
            multiplicative: None,
            changepoint_min_size: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrendFit {
    intercept: f64,
    slope: f64,
    r2: f64,
}

#[derive(Debug, Clone)]
struct FourierComponent {
    period: usize,
    coeffs: Vec<(f64, f64)>,
}

fn project_fourier(component: &FourierComponent, t: usize) -> f64 {
    component
        .coeffs
        .iter()
        .enumerate()
        .map(|(idx, &(a, b))| {
            let i = (idx + 1) as f64;
            let angle = 2.0 * PI * i * t as f64 / component.period as f64;
            a * angle.sin() + b * angle.cos()
        })
        .sum()
}

fn adaptive_fourier_order(period: usize, override_k: Option<usize>) -> usize {
    let k = override_k.unwrap_or(if period <= 12 {
        5
    } else if period <= 60 {
        10
    } else {
        15
    });
    k.clamp(1, (period.saturating_sub(1) / 2).max(1))
}

fn time_increasing_weights(n: usize) -> Vec<f64> {
    (0..n).map(|t| (t as f64 + 1.0) / n as f64).collect()
}

fn fit_fourier(residual: &[f64], period: usize, order: usize, weights: Option<&[f64]>) -> Result<(Vec<f64>, Vec<(f64, f64)>)> {
    let n = residual.len();
    let design: Vec<Vec<f64>> = (0..n)
        .map(|t| {
            (1..=order)
                .flat_map(|i| {
                    let angle = 2.0 * PI * i as f64 * t as f64 / period as f64;
                    [angle.sin(), angle.cos()]
                })
                .collect()
        })
        .collect();

    let (design, target) = match weights {
        Some(w) => {
            let weighted_design: Vec<Vec<f64>> = design
                .iter()
                .zip(w)
                .map(|(row, &wt)| row.iter().map(|v| v * wt.sqrt()).collect())
                .collect();
            let weighted_target: Vec<f64> = residual.iter().zip(w).map(|(&v, &wt)| v * wt.sqrt()).collect();
            (weighted_design, weighted_target)
        }
        None => (design, residual.to_vec()),
    };

    let flat = least_squares(&design, &target)?;
    let coeffs: Vec<(f64, f64)> = flat.chunks(2).map(|c| (c[0], c[1])).collect();
    let component = FourierComponent { period, coeffs };
    let pred: Vec<f64> = (0..n).map(|t| project_fourier(&component, t)).collect();
    Ok((pred, component.coeffs))
}

fn fit_trend(residual: &[f64], method: MflesTrendMethod, changepoint_min_size: usize) -> Result<(Vec<f64>, TrendFit)> {
    let n = residual.len();
    match method {
        MflesTrendMethod::Ols => {
            let (intercept, slope, r2) = linear_trend(residual)?;
            let pred = (0..n).map(|t| intercept + slope * t as f64).collect();
            Ok((pred, TrendFit { intercept, slope, r2 }))
        }
        MflesTrendMethod::Siegel => {
            let (intercept, slope, r2) = siegel_repeated_medians(residual)?;
            let pred = (0..n).map(|t| intercept + slope * t as f64).collect();
            Ok((pred, TrendFit { intercept, slope, r2 }))
        }
        MflesTrendMethod::Piecewise => {
            let cp = detect_changepoints(residual, changepoint_min_size, None, CostFunction::L2)?;
            let mut bounds = vec![0usize];
            bounds.extend(cp.changepoints);
            bounds.push(n);
            bounds.dedup();

            let mut pred = vec![0.0; n];
            let mut last_fit = TrendFit::default();
            for w in bounds.windows(2) {
                let (start, end) = (w[0], w[1]);
                if end <= start {
                    continue;
                }
                if end - start < 2 {
                    let mean = residual[start..end].iter().sum::<f64>() / (end - start) as f64;
                    for slot in pred.iter_mut().take(end).skip(start) {
                        *slot = mean;
                    }
                    last_fit = TrendFit { intercept: mean, slope: 0.0, r2: 0.0 };
                    continue;
                }
                let segment = &residual[start..end];
                let (intercept, slope, r2) = linear_trend(segment)?;
                for (i, t) in (start..end).enumerate() {
                    pred[t] = intercept + slope * i as f64;
                }
                // Re-express in global-`t` coordinates so extrapolation from
                // the last segment is a direct `intercept + slope*t`.
                last_fit = TrendFit { intercept: intercept - slope * start as f64, slope, r2 };
            }
            Ok((pred, last_fit))
        }
    }
}

fn smooth_residual(residual: &[f64], ts_template: &TimeSeries, smoother: ResidualSmoother) -> Result<(Vec<f64>, f64)> {
    match smoother {
        ResidualSmoother::EsEnsemble { min_alpha, max_alpha, size } => {
            let size = size.max(1);
            let n = residual.len();
            let mut sum_fitted = vec![0.0; n];
            let mut sum_terminal = 0.0;
            for j in 0..size {
                let alpha = if size == 1 {
                    min_alpha
                } else {
                    min_alpha + (max_alpha - min_alpha) * j as f64 / (size - 1) as f64
                };
                let synthetic = TimeSeries::univariate(ts_template.timestamps().to_vec(), residual.to_vec())?;
                let mut ets = Ets::ses(Some(alpha));
                ets.fit(&synthetic)?;
                let forecast = ets.predict(1)?;
                let fitted = forecast.insample_fitted.unwrap_or_else(|| vec![0.0; n]);
                for (s, f) in sum_fitted.iter_mut().zip(&fitted) {
                    *s += f;
                }
                sum_terminal += forecast.point[0];
            }
            let avg_fitted: Vec<f64> = sum_fitted.iter().map(|v| v / size as f64).collect();
            Ok((avg_fitted, sum_terminal / size as f64))
        }
        ResidualSmoother::MovingAverage { window } => {
            let window = window.max(1);
            let pred: Vec<f64> = (0..residual.len())
                .map(|t| {
                    let start = t.saturating_sub(window - 1);
                    let segment = &residual[start..=t];
                    segment.iter().sum::<f64>() / segment.len() as f64
                })
                .collect();
            let terminal = *pred.last().unwrap_or(&0.0);
            Ok((pred, terminal))
        }
    }
}

fn cap_outliers(residual: &mut [f64], sigma: f64) {
    let n = residual.len() as f64;
    if n == 0.0 {
        return;
    }
    let mean = residual.iter().sum::<f64>() / n;
    let std = (residual.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n).sqrt();
    if std < f64::EPSILON {
        return;
    }
    let (lo, hi) = (mean - sigma * std, mean + sigma * std);
    for r in residual.iter_mut() {
        *r = r.clamp(lo, hi);
    }
}

/// Aligned decomposition components, in the model's working space (natural
/// log of `y` for a multiplicative fit).
#[derive(Debug, Clone)]
pub struct MflesDecomposition {
    pub median: f64,
    pub trend: Vec<f64>,
    pub seasonal: Vec<Vec<f64>>,
    pub periods: Vec<usize>,
    pub residual_smooth: Vec<f64>,
    pub remainder: Vec<f64>,
    pub multiplicative: bool,
}

#[derive(Debug, Clone)]
pub struct MflesDiagnostics {
    pub rounds_run: usize,
    pub sse_history: Vec<f64>,
    pub converged: bool,
    pub multiplicative: bool,
}

pub struct Mfles {
    config: MflesConfig,
    n: usize,
    multiplicative: bool,
    median: f64,
    trend_fit: TrendFit,
    seasonal_components: Vec<FourierComponent>,
    residual_smoother_terminal: f64,
    decomposition: Option<MflesDecomposition>,
    diagnostics: Option<MflesDiagnostics>,
}

impl Mfles {
    pub fn new(config: MflesConfig) -> Self {
        Self {
            config,
            n: 0,
            multiplicative: false,
            median: 0.0,
            trend_fit: TrendFit::default(),
            seasonal_components: Vec::new(),
            residual_smoother_terminal: 0.0,
            decomposition: None,
            diagnostics: None,
        }
    }

    pub fn decomposition(&self) -> Option<&MflesDecomposition> {
        self.decomposition.as_ref()
    }

    pub fn diagnostics(&self) -> Option<&MflesDiagnostics> {
        self.diagnostics.as_ref()
    }
}

impl Forecaster for Mfles {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let n = y.len();
        if n < 4 {
            return Err(ForecastError::insufficient("MFLES", 4, n));
        }

        let multiplicative = match self.config.multiplicative {
            Some(flag) => flag,
            None => all_positive(y) && coefficient_of_variation(y) >= MULTIPLICATIVE_COV_THRESHOLD,
        };
        if multiplicative && !all_positive(y) {
            return Err(ForecastError::invalid("values", "multiplicative MFLES requires strictly positive values"));
        }
        let working: Vec<f64> = if multiplicative { y.iter().map(|v| v.ln()).collect() } else { y.to_vec() };

        let mut sorted_for_median = working.clone();
        let med = median(&mut sorted_for_median);
        let mut residual: Vec<f64> = working.iter().map(|v| v - med).collect();

        let mut cumulative_intercept = 0.0;
        let mut cumulative_slope = 0.0;
        let mut last_r2 = 0.0;
        let mut seasonal_series: Vec<Vec<f64>> = self.config.seasonal_periods.iter().map(|_| vec![0.0; n]).collect();
        let mut fourier_components: Vec<FourierComponent> =
            self.config.seasonal_periods.iter().map(|&p| FourierComponent { period: p, coeffs: Vec::new() }).collect();
        let mut rs_series = vec![0.0; n];
        let mut cumulative_rs_terminal = 0.0;

        let mut sse_history = Vec::new();
        let mut converged = false;
        let mut rounds_run = 0usize;

        for round in 0..self.config.max_rounds.max(1) {
            rounds_run = round + 1;

            let (trend_pred, fit) = fit_trend(&residual, self.config.trend_method, self.config.changepoint_min_size)?;
            for (t, &p) in trend_pred.iter().enumerate() {
                residual[t] -= self.config.lr_trend * p;
            }
            // Each round refits against the residual left by every prior
            // round, so its contribution accumulates just like the seasonal
            // and residual-smoothing terms below rather than replacing them.
            cumulative_intercept += self.config.lr_trend * fit.intercept;
            cumulative_slope += self.config.lr_trend * fit.slope;
            last_r2 = fit.r2;

            for (k, &period) in self.config.seasonal_periods.iter().enumerate() {
                if period < 2 || n < 2 * period {
                    continue;
                }
                let order = adaptive_fourier_order(period, self.config.fourier_order_override);
                let weights = self.config.seasonality_weights.then(|| time_increasing_weights(n));
                let (pred, coeffs) = fit_fourier(&residual, period, order, weights.as_deref())?;
                for (t, &p) in pred.iter().enumerate() {
                    seasonal_series[k][t] += self.config.lr_season * p;
                    residual[t] -= self.config.lr_season * p;
                }
                fourier_components[k] = FourierComponent { period, coeffs };
            }

            let (rs_pred, terminal) = smooth_residual(&residual, ts, self.config.residual_smoother)?;
            for (t, &p) in rs_pred.iter().enumerate() {
                rs_series[t] += self.config.lr_rs * p;
                residual[t] -= self.config.lr_rs * p;
            }
            // Same accumulation as the in-sample series: each round's
            // terminal value is this round's contribution, not a
            // replacement of earlier rounds'.
            cumulative_rs_terminal += self.config.lr_rs * terminal;

            if let Some(start) = self.config.outlier_cap_start_round {
                if round >= start {
                    cap_outliers(&mut residual, self.config.outlier_sigma);
                }
            }

            let sse: f64 = residual.iter().map(|r| r * r).sum();
            let relative_improvement = match sse_history.last() {
                Some(&prev) if prev > f64::EPSILON => (prev - sse) / prev,
                _ => f64::INFINITY,
            };
            sse_history.push(sse);
            if round > 0 && relative_improvement < self.config.convergence_threshold {
                converged = true;
                break;
            }
        }

        let trend_fit = TrendFit { intercept: cumulative_intercept, slope: cumulative_slope, r2: last_r2 };
        let trend_series: Vec<f64> = (0..n).map(|t| trend_fit.intercept + trend_fit.slope * t as f64).collect();

        self.n = n;
        self.multiplicative = multiplicative;
        self.median = med;
        self.trend_fit = trend_fit;
        self.seasonal_components = fourier_components;
        self.residual_smoother_terminal = cumulative_rs_terminal;
        self.decomposition = Some(MflesDecomposition {
            median: med,
            trend: trend_series,
            seasonal: seasonal_series,
            periods: self.config.seasonal_periods.clone(),
            residual_smooth: rs_series,
            remainder: residual,
            multiplicative,
        });
        self.diagnostics = Some(MflesDiagnostics { rounds_run, sse_history, converged, multiplicative });
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;

        let r2_penalty = self.trend_fit.r2.clamp(0.0, 1.0);
        let mut point = Vec::with_capacity(h);
        for i in 0..h {
            let t = self.n + i;
            let trend = (self.trend_fit.intercept + self.trend_fit.slope * t as f64) * r2_penalty;
            let seasonal: f64 = self.seasonal_components.iter().map(|c| project_fourier(c, t)).sum();
            let value = self.median + trend + seasonal + self.residual_smoother_terminal;
            point.push(if self.multiplicative { value.exp() } else { value });
        }
        Ok(Forecast::point_only("MFLES", point))
    }

    fn name(&self) -> &str {
        "MFLES"
    }

    fn is_fitted(&self) -> bool {
        self.decomposition.is_some()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        let decomp = self.decomposition.as_ref().unwrap();
        Ok(crate::forecaster::residual_std_of(&decomp.remainder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::f64::consts::PI as PI_TEST;

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_mfles_fits_linear_trend() {
        let y: Vec<f64> = (0..40).map(|i| 10.0 + 2.0 * i as f64).collect();
        let mut model = Mfles::new(MflesConfig::default());
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(3).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
        assert!(forecast.point[0] > 70.0);
    }

    #[test]
    fn test_mfles_with_seasonality() {
        let y: Vec<f64> = (0..72).map(|i| 50.0 + 0.3 * i as f64 + 8.0 * (2.0 * PI_TEST * i as f64 / 12.0).sin()).collect();
        let mut config = MflesConfig::default();
        config.seasonal_periods = vec![12];
        config.max_rounds = 10;
        let mut model = Mfles::new(config);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(6).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
        let decomp = model.decomposition().unwrap();
        assert_eq!(decomp.seasonal.len(), 1);
    }

    #[test]
    fn test_mfles_multiplicative_auto_detect_on_exponential_series() {
        let y: Vec<f64> = (0..30).map(|i| 10.0 * 1.1_f64.powi(i as i32)).collect();
        let mut model = Mfles::new(MflesConfig::default());
        model.fit(&ts(y)).unwrap();
        assert!(model.diagnostics().unwrap().multiplicative);
        let forecast = model.predict(2).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite() && *v > 0.0));
    }

    #[test]
    fn test_mfles_piecewise_trend_runs() {
        let mut y = vec![0.0; 30];
        y.extend((0..30).map(|i| 30.0 + 2.0 * i as f64));
        let mut config = MflesConfig::default();
        config.trend_method = MflesTrendMethod::Piecewise;
        config.max_rounds = 5;
        let mut model = Mfles::new(config);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(2).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mfles_moving_average_smoother() {
        let y: Vec<f64> = (0..40).map(|i| 20.0 + (i as f64 * 0.2).sin() * 3.0).collect();
        let mut config = MflesConfig::default();
        config.residual_smoother = ResidualSmoother::MovingAverage { window: 5 };
        let mut model = Mfles::new(config);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(4).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_too_short_series_is_error() {
        let mut model = Mfles::new(MflesConfig::default());
        assert!(model.fit(&ts(vec![1.0, 2.0])).is_err());
    }
}
