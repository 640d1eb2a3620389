//! AutoMFLES: automatic hyperparameter search over `Mfles` (spec §4.9).
//!
//! Two selection strategies, mirroring `auto_ets`'s IC-search shape:
//! - `InformationCriterion` grids boosting rounds and a shared learning
//!   rate, selecting by an AIC computed from the final-round SSE.
//! - `CrossValidation` grids the seasonal/weighting/smoother knobs and
//!   selects by mean fold MAE from `cv::rolling_cv`.

use crate::cv::{rolling_cv, CvConfig, CvStrategy};
use crate::error::{ForecastError, Result};
use crate::forecaster::{Forecast, Forecaster};
use crate::mfles::{Mfles, MflesConfig, MflesTrendMethod, ResidualSmoother};
use crate::timeseries::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoMflesStrategy {
    InformationCriterion,
    CrossValidation,
}

#[derive(Debug, Clone)]
pub struct AutoMflesConfig {
    pub seasonal_periods: Vec<usize>,
    pub strategy: AutoMflesStrategy,
    /// Shared learning-rate grid for the IC-search strategy.
    pub lr_grid: Vec<f64>,
    /// Boosting-round grid for the IC-search strategy.
    pub max_rounds_grid: Vec<usize>,
    /// Fold count for the CV-search strategy.
    pub cv_folds: usize,
}

impl Default for AutoMflesConfig {
    fn default() -> Self {
        Self {
            seasonal_periods: Vec::new(),
            strategy: AutoMflesStrategy::InformationCriterion,
            lr_grid: vec![0.1, 0.3, 0.5, 0.7, 0.9],
            max_rounds_grid: (1..7).collect(),
            cv_folds: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoMflesDiagnostics {
    pub models_evaluated: usize,
    pub models_failed: usize,
    pub selected_score: f64,
    pub strategy: AutoMflesStrategy,
}

fn candidate_configs_ic(base: &AutoMflesConfig) -> Vec<MflesConfig> {
    let mut out = Vec::new();
    for &rounds in &base.max_rounds_grid {
        for &lr in &base.lr_grid {
            let mut cfg = MflesConfig { seasonal_periods: base.seasonal_periods.clone(), max_rounds: rounds.max(1), ..MflesConfig::default() };
            cfg.lr_trend = lr;
            cfg.lr_season = lr;
            cfg.lr_rs = lr;
            out.push(cfg);
        }
    }
    out
}

/// Rough parameter count for an AIC penalty: 2 trend coefficients plus a
/// capped Fourier-pair allowance per seasonal period.
fn approximate_param_count(cfg: &MflesConfig) -> usize {
    2 + cfg.seasonal_periods.iter().map(|&p| (p.min(20) / 2).max(1) * 2).sum::<usize>()
}

fn smoother_options(periods: &[usize]) -> Vec<ResidualSmoother> {
    let mut opts = vec![ResidualSmoother::EsEnsemble { min_alpha: 0.05, max_alpha: 0.3, size: 5 }];
    let primary = periods.first().copied().unwrap_or(0);
    if primary > 1 {
        opts.push(ResidualSmoother::MovingAverage { window: primary });
        opts.push(ResidualSmoother::MovingAverage { window: (primary / 2).max(1) });
    } else {
        opts.push(ResidualSmoother::MovingAverage { window: 3 });
    }
    opts
}

fn candidate_configs_cv(base: &AutoMflesConfig) -> Vec<MflesConfig> {
    let seasonal_options: Vec<Vec<usize>> = vec![Vec::new(), base.seasonal_periods.clone()];
    let weight_options = [false, true];
    let smoothers = smoother_options(&base.seasonal_periods);

    let mut out = Vec::new();
    for seasonal in &seasonal_options {
        for &weights in &weight_options {
            for &smoother in &smoothers {
                out.push(MflesConfig {
                    seasonal_periods: seasonal.clone(),
                    seasonality_weights: weights,
                    residual_smoother: smoother,
                    trend_method: MflesTrendMethod::Ols,
                    ..MflesConfig::default()
                });
            }
        }
    }
    out.dedup_by_key(|c| (c.seasonal_periods.clone(), c.seasonality_weights, format!("{:?}", c.residual_smoother)));
    out
}

/// Grid-searches `Mfles` hyperparameters and keeps the best candidate.
/// Implements `Forecaster` by delegating to the selected model.
pub struct AutoMfles {
    config: AutoMflesConfig,
    selected: Option<Mfles>,
    diagnostics: Option<AutoMflesDiagnostics>,
}

impl AutoMfles {
    pub fn new(config: AutoMflesConfig) -> Self {
        Self { config, selected: None, diagnostics: None }
    }

    pub fn diagnostics(&self) -> Option<&AutoMflesDiagnostics> {
        self.diagnostics.as_ref()
    }

    fn fit_ic(&mut self, ts: &TimeSeries) -> Result<()> {
        let candidates = candidate_configs_ic(&self.config);
        let n = ts.len() as f64;
        let mut best: Option<(Mfles, f64)> = None;
        let mut models_evaluated = 0usize;
        let mut models_failed = 0usize;

        for cfg in candidates {
            models_evaluated += 1;
            let k = approximate_param_count(&cfg) as f64;
            let mut model = Mfles::new(cfg);
            match model.fit(ts) {
                Ok(()) => {
                    let sse = model.diagnostics().and_then(|d| d.sse_history.last().copied()).unwrap_or(f64::INFINITY);
                    if !sse.is_finite() || sse <= 0.0 || n <= 0.0 {
                        models_failed += 1;
                        continue;
                    }
                    let aic = n * (sse / n).ln() + 2.0 * k;
                    let better = match &best {
                        None => true,
                        Some((_, best_aic)) => aic < *best_aic,
                    };
                    if better {
                        best = Some((model, aic));
                    }
                }
                Err(_) => models_failed += 1,
            }
        }

        let (model, score) = best.ok_or_else(|| ForecastError::numerical("AutoMFLES", "every IC candidate failed to fit", models_evaluated))?;
        self.diagnostics = Some(AutoMflesDiagnostics { models_evaluated, models_failed, selected_score: score, strategy: AutoMflesStrategy::InformationCriterion });
        self.selected = Some(model);
        Ok(())
    }

    fn fit_cv(&mut self, ts: &TimeSeries) -> Result<()> {
        let primary_period = self.config.seasonal_periods.first().copied().unwrap_or(1).max(1);
        let horizon = primary_period;
        let cv_config = CvConfig::new(horizon, 10 * horizon, horizon, CvStrategy::Rolling).with_n_windows(self.config.cv_folds.max(1));

        let candidates = candidate_configs_cv(&self.config);
        let mut best: Option<(MflesConfig, f64)> = None;
        let mut models_evaluated = 0usize;
        let mut models_failed = 0usize;

        for cfg in candidates {
            models_evaluated += 1;
            let factory_cfg = cfg.clone();
            let outcome = rolling_cv(ts, cv_config, move || Box::new(Mfles::new(factory_cfg.clone())) as Box<dyn Forecaster>);
            match outcome {
                Ok(cv_result) if !cv_result.folds.is_empty() => {
                    let mean_mae = cv_result.folds.iter().map(|f| f.metrics.mae).sum::<f64>() / cv_result.folds.len() as f64;
                    let better = match &best {
                        None => true,
                        Some((_, best_mae)) => mean_mae < *best_mae,
                    };
                    if better {
                        best = Some((cfg, mean_mae));
                    }
                }
                _ => models_failed += 1,
            }
        }

        let (cfg, score) = best.ok_or_else(|| ForecastError::numerical("AutoMFLES", "every CV candidate failed", models_evaluated))?;
        let mut model = Mfles::new(cfg);
        model.fit(ts)?;
        self.diagnostics = Some(AutoMflesDiagnostics { models_evaluated, models_failed, selected_score: score, strategy: AutoMflesStrategy::CrossValidation });
        self.selected = Some(model);
        Ok(())
    }
}

impl Forecaster for AutoMfles {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        match self.config.strategy {
            AutoMflesStrategy::InformationCriterion => self.fit_ic(ts),
            AutoMflesStrategy::CrossValidation => self.fit_cv(ts),
        }
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        let model = self.selected.as_ref().ok_or_else(|| ForecastError::not_fitted(self.name()))?;
        let mut forecast = model.predict(h)?;
        forecast.model_name = self.name().to_string();
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "AutoMFLES"
    }

    fn is_fitted(&self) -> bool {
        self.selected.is_some()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        self.selected.as_ref().unwrap().residual_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::f64::consts::PI;

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_ic_search_selects_a_model() {
        let y: Vec<f64> = (0..30).map(|i| 5.0 + 0.8 * i as f64).collect();
        let mut model = AutoMfles::new(AutoMflesConfig { strategy: AutoMflesStrategy::InformationCriterion, ..Default::default() });
        model.fit(&ts(y)).unwrap();
        assert!(model.diagnostics().unwrap().models_evaluated > 0);
        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.point.len(), 3);
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cv_search_selects_a_model_on_seasonal_series() {
        let y: Vec<f64> = (0..96).map(|i| 40.0 + 0.1 * i as f64 + 6.0 * (2.0 * PI * i as f64 / 12.0).sin()).collect();
        let mut model = AutoMfles::new(AutoMflesConfig {
            seasonal_periods: vec![12],
            strategy: AutoMflesStrategy::CrossValidation,
            cv_folds: 2,
            ..Default::default()
        });
        model.fit(&ts(y)).unwrap();
        let diag = model.diagnostics().unwrap();
        assert_eq!(diag.strategy, AutoMflesStrategy::CrossValidation);
        let forecast = model.predict(6).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_ic_candidate_grid_size() {
        let config = AutoMflesConfig::default();
        let candidates = candidate_configs_ic(&config);
        assert_eq!(candidates.len(), config.max_rounds_grid.len() * config.lr_grid.len());
    }
}
