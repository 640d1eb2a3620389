//! Exponential smoothing and the ETS state-space model (spec §4.3).
//!
//! A single engine (`Ets`) backs every named variant — `SES`, `Holt`,
//! `HoltWinters`, `SeasonalES` and the general `ETS` — the same "one
//! algorithm, different configuration" shape the teacher crate uses for
//! `CrostonClassic`/`CrostonSBA` (spec §9 design note).

use crate::error::{ForecastError, Result};
use crate::forecaster::{Forecast, Forecaster};
use crate::numeric::{aic, aicc, bic, gaussian_log_likelihood};
use crate::optimizer::{grid_search, nelder_mead};
use crate::timeseries::TimeSeries;

/// Error distribution assumed for the innovation `e_t = y_t - mu_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Additive,
    Multiplicative,
}

/// Trend component shape. Damping is tracked separately via
/// `EtsConfig::damped` so the same variant can be damped or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendType {
    None,
    Additive,
    Multiplicative,
}

/// Seasonal component shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    None,
    Additive,
    Multiplicative,
}

/// Full (Error, Trend, damped, Season, m) specification, parseable from
/// Pegels notation (`"AAA"`, `"MNM"`, `"AAdA"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EtsConfig {
    pub error: ErrorType,
    pub trend: TrendType,
    pub damped: bool,
    pub season: SeasonType,
    pub season_length: usize,
}

impl EtsConfig {
    pub fn new(error: ErrorType, trend: TrendType, damped: bool, season: SeasonType, season_length: usize) -> Self {
        Self {
            error,
            trend,
            damped,
            season,
            season_length: if season == SeasonType::None { 1 } else { season_length.max(1) },
        }
    }

    /// Parse Pegels notation: 3 characters `ETS` or 4 characters `ET dS`
    /// with a literal `d` marking a damped trend, e.g. `"AAA"`, `"AAdA"`,
    /// `"MNM"`. `N` means "none" for trend/season.
    pub fn from_notation(notation: &str, season_length: usize) -> Result<Self> {
        let chars: Vec<char> = notation.chars().collect();
        let (error_c, trend_c, damped, season_c) = match chars.len() {
            3 => (chars[0], chars[1], false, chars[2]),
            4 if chars[2] == 'd' => (chars[0], chars[1], true, chars[3]),
            _ => {
                return Err(ForecastError::invalid(
                    "notation",
                    format!("'{notation}' is not valid ETS notation (expected e.g. AAA, MNM, AAdA)"),
                ))
            }
        };
        let error = match error_c {
            'A' => ErrorType::Additive,
            'M' => ErrorType::Multiplicative,
            _ => return Err(ForecastError::invalid("notation", "error component must be A or M")),
        };
        let trend = match trend_c {
            'N' => TrendType::None,
            'A' => TrendType::Additive,
            'M' => TrendType::Multiplicative,
            _ => return Err(ForecastError::invalid("notation", "trend component must be N, A or M")),
        };
        let season = match season_c {
            'N' => SeasonType::None,
            'A' => SeasonType::Additive,
            'M' => SeasonType::Multiplicative,
            _ => return Err(ForecastError::invalid("notation", "season component must be N, A or M")),
        };
        Ok(Self::new(error, trend, damped, season, season_length))
    }

    /// Rejects combinations known to diverge: multiplicative error with
    /// additive trend (damped or not) is numerically unstable (FPP3
    /// taxonomy), matching the teacher's `forecast.rs::is_valid_ets_notation`
    /// rejection of `MAA`/`MAdA`.
    pub fn is_valid(&self) -> bool {
        !(self.error == ErrorType::Multiplicative && self.trend == TrendType::Additive)
    }

    pub fn short_name(&self) -> String {
        let e = match self.error {
            ErrorType::Additive => 'A',
            ErrorType::Multiplicative => 'M',
        };
        let t = match self.trend {
            TrendType::None => 'N',
            TrendType::Additive => 'A',
            TrendType::Multiplicative => 'M',
        };
        let s = match self.season {
            SeasonType::None => 'N',
            SeasonType::Additive => 'A',
            SeasonType::Multiplicative => 'M',
        };
        if self.damped {
            format!("{e}{t}d{s}")
        } else {
            format!("{e}{t}{s}")
        }
    }

    /// Number of free smoothing parameters (alpha always, beta/gamma/phi
    /// when applicable).
    pub fn n_smoothing_params(&self) -> usize {
        1 + (self.trend != TrendType::None) as usize
            + (self.season != SeasonType::None) as usize
            + self.damped as usize
    }

    /// Number of free initial-state parameters (level + trend + m
    /// seasonals where applicable).
    pub fn n_initial_states(&self) -> usize {
        1 + (self.trend != TrendType::None) as usize
            + if self.season != SeasonType::None { self.season_length } else { 0 }
    }
}

/// Smoothing parameters; `None` entries are not applicable to the
/// configuration (e.g. `gamma` for a non-seasonal model).
#[derive(Debug, Clone, Copy, Default)]
pub struct EtsParams {
    pub alpha: f64,
    pub beta: Option<f64>,
    pub gamma: Option<f64>,
    pub phi: Option<f64>,
}

/// Diagnostics recorded after a fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtsDiagnostics {
    pub sse: f64,
    pub innovation_sse: f64,
    pub mse: f64,
    pub log_likelihood: f64,
    pub n: usize,
    pub optimizer_converged: bool,
    pub optimizer_iterations: usize,
}

#[derive(Debug, Clone, Default)]
struct FitState {
    level: f64,
    trend: f64,
    season: Vec<f64>,
}

/// One engine backing every named exponential-smoothing model.
#[derive(Debug, Clone)]
pub struct Ets {
    config: EtsConfig,
    /// Pinned parameters; any `None` field is optimized during `fit`.
    pinned: EtsParams,
    pinned_mask: (bool, bool, bool, bool), // (alpha, beta, gamma, phi) pinned?
    display_name: String,

    history: Vec<f64>,
    params: Option<EtsParams>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    terminal: Option<FitState>,
    diagnostics: Option<EtsDiagnostics>,
}

impl Ets {
    pub fn new(config: EtsConfig, display_name: impl Into<String>) -> Self {
        Self {
            config,
            pinned: EtsParams::default(),
            pinned_mask: (false, false, false, false),
            display_name: display_name.into(),
            history: Vec::new(),
            params: None,
            fitted: Vec::new(),
            residuals: Vec::new(),
            terminal: None,
            diagnostics: None,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.pinned.alpha = alpha;
        self.pinned_mask.0 = true;
        self
    }
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.pinned.beta = Some(beta);
        self.pinned_mask.1 = true;
        self
    }
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.pinned.gamma = Some(gamma);
        self.pinned_mask.2 = true;
        self
    }
    pub fn with_phi(mut self, phi: f64) -> Self {
        self.pinned.phi = Some(phi);
        self.pinned_mask.3 = true;
        self
    }

    pub fn config(&self) -> EtsConfig {
        self.config
    }

    pub fn params(&self) -> Option<EtsParams> {
        self.params
    }

    pub fn diagnostics(&self) -> Option<EtsDiagnostics> {
        self.diagnostics
    }

    /// Named constructors matching spec §6's model-name surface. Simple
    /// Exponential Smoothing: no trend, no season.
    pub fn ses(alpha: Option<f64>) -> Self {
        let config = EtsConfig::new(ErrorType::Additive, TrendType::None, false, SeasonType::None, 1);
        let mut model = Self::new(config, "SimpleExponentialSmoothing");
        if let Some(a) = alpha {
            model = model.with_alpha(a);
        }
        model
    }

    pub fn ses_optimized() -> Self {
        let mut model = Self::ses(None);
        model.display_name = "SESOptimized".to_string();
        model
    }

    /// Holt's linear trend (no damping, no season).
    pub fn holt(alpha: Option<f64>, beta: Option<f64>) -> Self {
        let config = EtsConfig::new(ErrorType::Additive, TrendType::Additive, false, SeasonType::None, 1);
        let mut model = Self::new(config, "HoltLinearTrend");
        if let Some(a) = alpha {
            model = model.with_alpha(a);
        }
        if let Some(b) = beta {
            model = model.with_beta(b);
        }
        model
    }

    /// Holt-Winters: additive trend + seasonal component (additive or
    /// multiplicative), undamped.
    pub fn holt_winters(season_length: usize, season: SeasonType) -> Self {
        let config = EtsConfig::new(ErrorType::Additive, TrendType::Additive, false, season, season_length);
        Self::new(config, "HoltWinters")
    }

    /// Seasonal exponential smoothing: level + season, no trend.
    pub fn seasonal_es(season_length: usize, season: SeasonType) -> Self {
        let config = EtsConfig::new(ErrorType::Additive, TrendType::None, false, season, season_length);
        Self::new(config, "SeasonalExponentialSmoothing")
    }

    pub fn seasonal_es_optimized(season_length: usize, season: SeasonType) -> Self {
        let mut model = Self::seasonal_es(season_length, season);
        model.display_name = "SeasonalESOptimized".to_string();
        model
    }

    /// The fully general state-space model, named per its Pegels notation.
    pub fn general(config: EtsConfig) -> Self {
        Self::new(config, "ETS")
    }

    fn init_state(&self, y: &[f64]) -> FitState {
        let m = self.config.season_length;
        let level = if self.config.season != SeasonType::None && y.len() >= m {
            y[..m].iter().sum::<f64>() / m as f64
        } else {
            y[0]
        };

        let trend = if self.config.trend != TrendType::None && y.len() > m {
            (y[m] - y[0]) / m as f64
        } else {
            0.0
        };

        let season = if self.config.season != SeasonType::None {
            let cycles = y.len() / m;
            let mut phase_avg = vec![0.0; m];
            for p in 0..m {
                let mut sum = 0.0;
                let mut count = 0usize;
                for c in 0..cycles.max(1) {
                    let idx = c * m + p;
                    if idx < y.len() {
                        sum += y[idx];
                        count += 1;
                    }
                }
                phase_avg[p] = if count > 0 { sum / count as f64 } else { 0.0 };
            }
            match self.config.season {
                SeasonType::Additive => {
                    let mean = phase_avg.iter().sum::<f64>() / m as f64;
                    phase_avg.iter().map(|v| v - mean).collect()
                }
                SeasonType::Multiplicative => {
                    let mean = phase_avg.iter().sum::<f64>() / m as f64;
                    if mean.abs() < f64::EPSILON {
                        vec![1.0; m]
                    } else {
                        phase_avg.iter().map(|v| v / mean).collect()
                    }
                }
                SeasonType::None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        FitState { level, trend, season }
    }

    /// Run the filter once with fixed parameters, returning fitted values,
    /// raw residuals, relative (innovation) residuals and the terminal
    /// state.
    fn run_filter(&self, y: &[f64], params: &EtsParams, init: &FitState) -> (Vec<f64>, Vec<f64>, Vec<f64>, FitState) {
        let m = self.config.season_length;
        let alpha = params.alpha;
        let beta = params.beta.unwrap_or(0.0);
        let gamma = params.gamma.unwrap_or(0.0);
        let phi = params.phi.unwrap_or(1.0);

        let mut level = init.level;
        let mut trend = init.trend;
        let mut season = init.season.clone();
        if season.is_empty() && self.config.season != SeasonType::None {
            season = vec![0.0; m];
        }

        let mut fitted = Vec::with_capacity(y.len());
        let mut residuals = Vec::with_capacity(y.len());
        let mut innovations = Vec::with_capacity(y.len());

        for (t, &yt) in y.iter().enumerate() {
            let phase = t % m.max(1);
            let se = if self.config.season != SeasonType::None { season[phase] } else { 0.0 };

            let level_pre = match self.config.trend {
                TrendType::None => level,
                TrendType::Additive => level + phi * trend,
                TrendType::Multiplicative => level * trend.powf(phi),
            };

            let mu = match self.config.season {
                SeasonType::None => level_pre,
                SeasonType::Additive => level_pre + se,
                SeasonType::Multiplicative => level_pre * se,
            };

            let e = yt - mu;
            let innovation = if self.config.error == ErrorType::Multiplicative && mu.abs() > f64::EPSILON {
                e / mu
            } else {
                e
            };

            let level_increment = match self.config.season {
                SeasonType::Multiplicative if se.abs() > f64::EPSILON => e / se,
                _ => e,
            };

            let new_level = level_pre + alpha * level_increment;

            let new_trend = match self.config.trend {
                TrendType::None => 0.0,
                TrendType::Additive => phi * trend + beta * level_increment,
                TrendType::Multiplicative => {
                    if level_pre.abs() > f64::EPSILON {
                        trend.powf(phi) + beta * level_increment / level_pre
                    } else {
                        trend.powf(phi)
                    }
                }
            };

            if self.config.season != SeasonType::None {
                season[phase] = match self.config.season {
                    SeasonType::Additive => se + gamma * e,
                    SeasonType::Multiplicative => {
                        if new_level.abs() > f64::EPSILON {
                            se * (1.0 + gamma * e / new_level)
                        } else {
                            se
                        }
                    }
                    SeasonType::None => 0.0,
                };
            }

            level = new_level;
            trend = new_trend;

            fitted.push(mu);
            residuals.push(e);
            innovations.push(innovation);
        }

        (fitted, residuals, innovations, FitState { level, trend, season })
    }

    fn sse(&self, y: &[f64], params: &EtsParams, init: &FitState) -> f64 {
        let (_, _, innovations, _) = self.run_filter(y, params, init);
        if !innovations.iter().all(|v| v.is_finite()) {
            return f64::INFINITY;
        }
        innovations.iter().map(|e| e * e).sum()
    }
}

impl Forecaster for Ets {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let m = self.config.season_length;
        let min_n = if self.config.season != SeasonType::None { 2 * m } else { 2 };
        if y.len() < min_n {
            return Err(ForecastError::insufficient("ETS", min_n, y.len()));
        }
        if !self.config.is_valid() {
            return Err(ForecastError::invalid(
                "config",
                format!("ETS spec '{}' is an unstable combination", self.config.short_name()),
            ));
        }

        let init = self.init_state(y);

        // Free-dimension order: alpha, [beta], [gamma], [phi].
        let mut bounds: Vec<(f64, f64)> = vec![(0.0, 1.0)];
        if self.config.trend != TrendType::None && !self.pinned_mask.1 {
            bounds.push((0.0, 1.0));
        }
        if self.config.season != SeasonType::None && !self.pinned_mask.2 {
            bounds.push((0.0, 1.0));
        }
        if self.config.damped && !self.pinned_mask.3 {
            bounds.push((0.8, 1.0));
        }

        let assemble = |free: &[f64]| -> EtsParams {
            let mut idx = 0;
            let alpha = if self.pinned_mask.0 {
                self.pinned.alpha
            } else {
                let v = free[idx];
                idx += 1;
                v
            };
            let beta = if self.config.trend == TrendType::None {
                None
            } else if self.pinned_mask.1 {
                self.pinned.beta
            } else {
                let v = free[idx];
                idx += 1;
                Some(v)
            };
            let gamma = if self.config.season == SeasonType::None {
                None
            } else if self.pinned_mask.2 {
                self.pinned.gamma
            } else {
                let v = free[idx];
                idx += 1;
                Some(v)
            };
            let phi = if !self.config.damped {
                Some(1.0)
            } else if self.pinned_mask.3 {
                self.pinned.phi
            } else {
                let v = free[idx];
                idx += 1;
                Some(v)
            };
            EtsParams { alpha, beta, gamma, phi }
        };

        let (best_params, iterations, converged) = if bounds.is_empty() {
            (assemble(&[]), 0, true)
        } else {
            let objective = |free: &[f64]| self.sse(y, &assemble(free), &init);
            let initial: Vec<f64> = bounds.iter().map(|&(lo, hi)| (lo + hi) / 2.0).collect();
            let grid = grid_search(&objective, &bounds, 7);
            let refined = nelder_mead(&objective, &grid.params, &bounds, 200);
            let refined = if refined.objective.is_finite() { refined } else {
                nelder_mead(&objective, &initial, &bounds, 200)
            };
            (assemble(&refined.params), refined.iterations, refined.converged)
        };

        let (fitted, residuals, innovations, terminal) = self.run_filter(y, &best_params, &init);
        let sse: f64 = residuals.iter().map(|e| e * e).sum();
        let innovation_sse: f64 = innovations.iter().map(|e| e * e).sum();
        let n = y.len();
        let mse = sse / n as f64;
        let log_likelihood = gaussian_log_likelihood(innovation_sse, n);

        self.history = y.to_vec();
        self.params = Some(best_params);
        self.fitted = fitted;
        self.residuals = residuals;
        self.terminal = Some(terminal);
        self.diagnostics = Some(EtsDiagnostics {
            sse,
            innovation_sse,
            mse,
            log_likelihood,
            n,
            optimizer_converged: converged,
            optimizer_iterations: iterations,
        });
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let terminal = self.terminal.as_ref().unwrap();
        let params = self.params.unwrap();
        let phi = params.phi.unwrap_or(1.0);
        let m = self.config.season_length;
        let n = self.history.len();

        let mut point = Vec::with_capacity(h);
        let mut trend_accum_additive = 0.0;
        let mut trend_accum_log = 0.0; // sum of phi^j * ln(trend) for multiplicative
        for i in 1..=h {
            let level = match self.config.trend {
                TrendType::None => terminal.level,
                TrendType::Additive => {
                    trend_accum_additive += phi.powi(i as i32) * terminal.trend;
                    terminal.level + trend_accum_additive
                }
                TrendType::Multiplicative => {
                    trend_accum_log += phi.powi(i as i32) * terminal.trend.max(1e-12).ln();
                    terminal.level * trend_accum_log.exp()
                }
            };
            let value = if self.config.season != SeasonType::None {
                let phase = (n + i - 1) % m;
                let se = terminal.season[phase];
                match self.config.season {
                    SeasonType::Additive => level + se,
                    SeasonType::Multiplicative => level * se,
                    SeasonType::None => level,
                }
            } else {
                level
            };
            point.push(value);
        }

        let mut forecast = Forecast::point_only(self.display_name.clone(), point);
        forecast.insample_fitted = Some(self.fitted.clone());
        Ok(forecast)
    }

    fn name(&self) -> &str {
        &self.display_name
    }

    fn is_fitted(&self) -> bool {
        self.terminal.is_some()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        Ok(crate::forecaster::residual_std_of(&self.residuals))
    }
}

/// AIC/AICc/BIC for a fitted `Ets`, using the parameter count from spec
/// §4.5 (smoothing parameters + initial states).
pub fn information_criteria(model: &Ets) -> Option<(f64, f64, f64)> {
    let diag = model.diagnostics()?;
    let k = model.config().n_smoothing_params() + model.config().n_initial_states();
    Some((
        aic(diag.log_likelihood, k),
        aicc(diag.log_likelihood, k, diag.n),
        bic(diag.log_likelihood, k, diag.n),
    ))
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
    fn test_ses_scenario_alpha_half() {
        // spec §8 scenario 4
        let mut model = Ets::ses(Some(0.5));
        model.fit(&ts(vec![10.0, 20.0, 30.0])).unwrap();
        let forecast = model.predict(2).unwrap();
        assert_relative_eq!(forecast.point[0], 22.5, epsilon = 1e-9);
        assert_relative_eq!(forecast.point[1], 22.5, epsilon = 1e-9);
    }

    #[test]
    fn test_ets_notation_parse_and_rejects_unstable() {
        let config = EtsConfig::from_notation("AAdA", 12).unwrap();
        assert_eq!(config.trend, TrendType::Additive);
        assert!(config.damped);
        assert_eq!(config.season, SeasonType::Additive);

        let unstable = EtsConfig::from_notation("MAA", 12).unwrap();
        assert!(!unstable.is_valid());
    }

    #[test]
    fn test_holt_reduces_to_ses_when_beta_zero() {
        let y = vec![10.0, 12.0, 9.0, 15.0, 11.0, 14.0, 13.0];
        let mut holt = Ets::holt(Some(0.5), Some(0.0));
        holt.fit(&ts(y.clone())).unwrap();

        let mut ses = Ets::ses(Some(0.5));
        ses.fit(&ts(y)).unwrap();

        for (a, b) in holt.residuals.iter().zip(ses.residuals.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_predict_requires_fit() {
        let model = Ets::ses(Some(0.3));
        assert!(model.predict(1).is_err());
    }

    #[test]
    fn test_holt_winters_seasonal_forecast_is_finite_and_repeats_phase() {
        let y: Vec<f64> = (0..24)
            .map(|i| 10.0 + 0.1 * i as f64 + if i % 4 < 2 { 2.0 } else { -2.0 })
            .collect();
        let mut model = Ets::holt_winters(4, SeasonType::Additive);
        model.fit(&ts(y)).unwrap();
        let forecast = model.predict(8).unwrap();
        assert_eq!(forecast.point.len(), 8);
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_idempotent_predict() {
        let mut model = Ets::ses(Some(0.4));
        model.fit(&ts(vec![1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
        let a = model.predict(5).unwrap();
        let b = model.predict(5).unwrap();
        assert_eq!(a.point, b.point);
    }

    #[test]
    fn test_ses_optimized_converges_to_reasonable_alpha() {
        let y: Vec<f64> = (0..30).map(|i| 50.0 + (i as f64 * 0.37).sin() * 3.0).collect();
        let mut model = Ets::ses_optimized();
        model.fit(&ts(y)).unwrap();
        let alpha = model.params().unwrap().alpha;
        assert!((0.0..=1.0).contains(&alpha));
    }
}
