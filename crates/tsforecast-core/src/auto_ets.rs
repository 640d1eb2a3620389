//! AutoETS: enumerate the Error x Trend x Season x damped product space
//! (spec §4.5) and select by information criterion.

use crate::error::{ForecastError, Result};
use crate::ets::{information_criteria, Ets, EtsConfig, EtsParams, ErrorType, SeasonType, TrendType};
use crate::forecaster::{Forecast, Forecaster};
use crate::timeseries::TimeSeries;

/// Gates whether damped-trend variants enter the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DampedPolicy {
    Auto,
    Always,
    Never,
}

/// Criterion used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationCriterion {
    Aic,
    Aicc,
    Bic,
}

/// Search configuration for `AutoEts`.
#[derive(Debug, Clone)]
pub struct AutoEtsConfig {
    pub season_length: usize,
    pub allow_multiplicative_error: bool,
    pub allow_multiplicative_trend: bool,
    pub allow_multiplicative_season: bool,
    pub damped_policy: DampedPolicy,
    pub criterion: InformationCriterion,
    pub pinned: Option<EtsParams>,
}

impl Default for AutoEtsConfig {
    fn default() -> Self {
        Self {
            season_length: 1,
            allow_multiplicative_error: true,
            allow_multiplicative_trend: false,
            allow_multiplicative_season: true,
            damped_policy: DampedPolicy::Auto,
            criterion: InformationCriterion::Aicc,
            pinned: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoEtsDiagnostics {
    pub models_evaluated: usize,
    pub models_failed: usize,
    pub selected_notation: String,
    pub selected_ic: f64,
}

fn candidate_configs(config: &AutoEtsConfig) -> Vec<EtsConfig> {
    let mut errors = vec![ErrorType::Additive];
    if config.allow_multiplicative_error {
        errors.push(ErrorType::Multiplicative);
    }

    let mut trends = vec![TrendType::None, TrendType::Additive];
    if config.allow_multiplicative_trend {
        trends.push(TrendType::Multiplicative);
    }

    let mut seasons = vec![SeasonType::None];
    if config.season_length > 1 {
        seasons.push(SeasonType::Additive);
        if config.allow_multiplicative_season {
            seasons.push(SeasonType::Multiplicative);
        }
    }

    let damped_options: Vec<bool> = match config.damped_policy {
        DampedPolicy::Always => vec![true],
        DampedPolicy::Never => vec![false],
        DampedPolicy::Auto => vec![false, true],
    };

    let mut out = Vec::new();
    for &error in &errors {
        for &trend in &trends {
            let damped_variants: &[bool] = if trend == TrendType::None { &[false] } else { &damped_options };
            for &damped in damped_variants {
                for &season in &seasons {
                    let cfg = EtsConfig::new(error, trend, damped, season, config.season_length);
                    if cfg.is_valid() {
                        out.push(cfg);
                    }
                }
            }
        }
    }
    out.sort_by_key(|c| c.n_smoothing_params() + c.n_initial_states());
    out.dedup_by_key(|c| c.short_name());
    out
}

/// Fits every candidate `EtsConfig` and retains the best by information
/// criterion. Implements `Forecaster` by delegating to the selected model.
#[derive(Debug, Clone)]
pub struct AutoEts {
    config: AutoEtsConfig,
    selected: Option<Ets>,
    diagnostics: Option<AutoEtsDiagnostics>,
}

impl AutoEts {
    pub fn new(config: AutoEtsConfig) -> Self {
        Self {
            config,
            selected: None,
            diagnostics: None,
        }
    }

    pub fn diagnostics(&self) -> Option<&AutoEtsDiagnostics> {
        self.diagnostics.as_ref()
    }

    pub fn selected_config(&self) -> Option<EtsConfig> {
        self.selected.as_ref().map(|m| m.config())
    }

    fn ic_value(model: &Ets, criterion: InformationCriterion) -> Option<f64> {
        let (aic, aicc, bic) = information_criteria(model)?;
        let v = match criterion {
            InformationCriterion::Aic => aic,
            InformationCriterion::Aicc => aicc,
            InformationCriterion::Bic => bic,
        };
        v.is_finite().then_some(v)
    }
}

impl Forecaster for AutoEts {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let candidates = candidate_configs(&self.config);
        let mut best: Option<(Ets, f64)> = None;
        let mut models_evaluated = 0usize;
        let mut models_failed = 0usize;

        for cfg in candidates {
            models_evaluated += 1;
            let mut model = Ets::general(cfg);
            if let Some(pinned) = &self.config.pinned {
                model = model.with_alpha(pinned.alpha);
                if let Some(b) = pinned.beta {
                    model = model.with_beta(b);
                }
                if let Some(g) = pinned.gamma {
                    model = model.with_gamma(g);
                }
                if let Some(p) = pinned.phi {
                    model = model.with_phi(p);
                }
            }

            match model.fit(ts) {
                Ok(()) => match Self::ic_value(&model, self.config.criterion) {
                    Some(ic) => {
                        let better = match &best {
                            None => true,
                            Some((_, best_ic)) => ic < *best_ic,
                        };
                        if better {
                            best = Some((model, ic));
                        }
                    }
                    None => models_failed += 1,
                },
                Err(_) => models_failed += 1,
            }
        }

        let (model, ic) = best.ok_or_else(|| {
            ForecastError::numerical("AutoETS", "every candidate failed to fit or diverged", models_evaluated)
        })?;

        self.diagnostics = Some(AutoEtsDiagnostics {
            models_evaluated,
            models_failed,
            selected_notation: model.config().short_name(),
            selected_ic: ic,
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
        "AutoETS"
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

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_candidate_configs_nonseasonal_excludes_season_variants() {
        let config = AutoEtsConfig {
            season_length: 1,
            ..Default::default()
        };
        let candidates = candidate_configs(&config);
        assert!(candidates.iter().all(|c| c.season == SeasonType::None));
    }

    #[test]
    fn test_candidate_configs_rejects_unstable_combo() {
        let config = AutoEtsConfig {
            season_length: 4,
            ..Default::default()
        };
        let candidates = candidate_configs(&config);
        assert!(candidates
            .iter()
            .all(|c| !(c.error == ErrorType::Multiplicative && c.trend == TrendType::Additive)));
    }

    #[test]
    fn test_auto_ets_selects_a_valid_model_on_trending_series() {
        let y: Vec<f64> = (0..20).map(|i| 10.0 + 0.5 * i as f64).collect();
        let mut model = AutoEts::new(AutoEtsConfig {
            season_length: 1,
            ..Default::default()
        });
        model.fit(&ts(y)).unwrap();
        let diag = model.diagnostics().unwrap();
        assert!(diag.models_evaluated > 0);
        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.point.len(), 3);
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_auto_ets_seasonal_series_selects_seasonal_model() {
        let y: Vec<f64> = (0..40)
            .map(|i| 20.0 + 0.2 * i as f64 + if i % 4 < 2 { 5.0 } else { -5.0 })
            .collect();
        let mut model = AutoEts::new(AutoEtsConfig {
            season_length: 4,
            ..Default::default()
        });
        model.fit(&ts(y)).unwrap();
        assert!(model.selected_config().unwrap().season != SeasonType::None);
    }
}
