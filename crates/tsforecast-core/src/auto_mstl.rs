//! AutoMSTL: enumerate trend x seasonal projection methods over
//! `MstlForecaster` and select by AIC (spec §4.9/§4.10).

use crate::error::{ForecastError, Result};
use crate::forecaster::{Forecast, Forecaster};
use crate::mstl::{MstlForecaster, SeasonalMethod, TrendMethod};
use crate::numeric::{aic, gaussian_log_likelihood};
use crate::timeseries::TimeSeries;

#[derive(Debug, Clone)]
pub struct AutoMstlConfig {
    pub periods: Vec<usize>,
    pub iterations: usize,
    pub robust: bool,
}

impl AutoMstlConfig {
    pub fn new(periods: Vec<usize>) -> Self {
        Self { periods, iterations: 2, robust: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoMstlDiagnostics {
    pub models_evaluated: usize,
    pub models_failed: usize,
    pub selected_trend: Option<TrendMethod>,
    pub selected_seasonal: Option<SeasonalMethod>,
    pub selected_aic: f64,
}

const TREND_METHODS: [TrendMethod; 6] = [
    TrendMethod::Linear,
    TrendMethod::Ses,
    TrendMethod::Holt,
    TrendMethod::None,
    TrendMethod::EtsAan,
    TrendMethod::EtsManAn,
];

const SEASONAL_METHODS: [SeasonalMethod; 3] = [SeasonalMethod::Cyclic, SeasonalMethod::EtsAna, SeasonalMethod::EtsAnm];

fn n_params(trend: TrendMethod, periods: &[usize]) -> usize {
    let trend_params = match trend {
        TrendMethod::None => 0,
        TrendMethod::Linear | TrendMethod::Ses => 1,
        TrendMethod::Holt | TrendMethod::EtsAan | TrendMethod::EtsManAn => 2,
    };
    trend_params + periods.len()
}

/// Fits every `(TrendMethod, SeasonalMethod)` combination on the full
/// history and keeps the lowest-AIC model. Implements `Forecaster` by
/// delegating to the selected `MstlForecaster`.
pub struct AutoMstl {
    config: AutoMstlConfig,
    selected: Option<MstlForecaster>,
    diagnostics: Option<AutoMstlDiagnostics>,
}

impl AutoMstl {
    pub fn new(config: AutoMstlConfig) -> Self {
        Self { config, selected: None, diagnostics: None }
    }

    pub fn diagnostics(&self) -> Option<&AutoMstlDiagnostics> {
        self.diagnostics.as_ref()
    }
}

impl Forecaster for AutoMstl {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let n = ts.len();
        let mut best: Option<(MstlForecaster, f64, TrendMethod, SeasonalMethod)> = None;
        let mut models_evaluated = 0usize;
        let mut models_failed = 0usize;

        for &trend in &TREND_METHODS {
            for &seasonal in &SEASONAL_METHODS {
                models_evaluated += 1;
                let mut model = MstlForecaster::new(self.config.periods.clone(), trend, seasonal)
                    .with_iterations(self.config.iterations)
                    .with_robust(self.config.robust);
                match model.fit(ts) {
                    Ok(()) => {
                        let decomp = model.decomposition().unwrap();
                        let sse: f64 = decomp.remainder.iter().map(|r| r * r).sum();
                        if !sse.is_finite() || sse <= 0.0 {
                            models_failed += 1;
                            continue;
                        }
                        let ll = gaussian_log_likelihood(sse, n);
                        let score = aic(ll, n_params(trend, &self.config.periods));
                        let better = match &best {
                            None => true,
                            Some((_, best_aic, _, _)) => score < *best_aic,
                        };
                        if better {
                            best = Some((model, score, trend, seasonal));
                        }
                    }
                    Err(_) => models_failed += 1,
                }
            }
        }

        let (model, score, trend, seasonal) =
            best.ok_or_else(|| ForecastError::numerical("AutoMSTL", "every trend/seasonal combination failed to fit", models_evaluated))?;

        self.diagnostics = Some(AutoMstlDiagnostics {
            models_evaluated,
            models_failed,
            selected_trend: Some(trend),
            selected_seasonal: Some(seasonal),
            selected_aic: score,
        });
        self.selected = Some(model);
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        let model = self.selected.as_ref().ok_or_else(|| ForecastError::not_fitted(self.name()))?;
        let mut forecast = model.predict(h)?;
        forecast.model_name = self.name().to_string();
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "AutoMSTL"
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
    fn test_auto_mstl_selects_a_combination() {
        let values: Vec<f64> = (0..96).map(|i| 50.0 + 0.2 * i as f64 + 4.0 * (2.0 * PI * i as f64 / 12.0).sin()).collect();
        let mut model = AutoMstl::new(AutoMstlConfig::new(vec![12]));
        model.fit(&ts(values)).unwrap();
        let diag = model.diagnostics().unwrap();
        assert_eq!(diag.models_evaluated, 18);
        assert!(diag.selected_trend.is_some());
        let forecast = model.predict(6).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_auto_mstl_no_seasonality_still_fits() {
        let values: Vec<f64> = (0..40).map(|i| 5.0 + 0.3 * i as f64).collect();
        let mut model = AutoMstl::new(AutoMstlConfig::new(vec![]));
        model.fit(&ts(values)).unwrap();
        assert!(model.is_fitted());
    }
}
