//! AutoARIMA: KPSS-style order-of-integration selection plus stepwise or
//! exhaustive order search (spec §4.4).

use crate::arima::{Arima, ArimaOrder};
use crate::differencing::{difference, seasonal_difference};
use crate::error::{ForecastError, Result};
use crate::forecaster::{Forecast, Forecaster};
use crate::timeseries::TimeSeries;

/// KPSS-style level-stationarity test statistic (regress on a constant,
/// accumulate residual partial sums, normalize by the long-run variance
/// estimated with a Bartlett-weighted kernel). Larger values reject
/// stationarity.
pub fn kpss_statistic(y: &[f64]) -> f64 {
    let n = y.len();
    if n < 4 {
        return 0.0;
    }
    let mean = y.iter().sum::<f64>() / n as f64;
    let residuals: Vec<f64> = y.iter().map(|v| v - mean).collect();

    let mut partial_sum = 0.0;
    let mut s_squared_sum = 0.0;
    for &r in &residuals {
        partial_sum += r;
        s_squared_sum += partial_sum * partial_sum;
    }

    let lag = ((12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize).max(1);
    let gamma0 = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
    let mut long_run_variance = gamma0;
    for l in 1..=lag.min(n - 1) {
        let gamma_l: f64 = (0..n - l).map(|t| residuals[t] * residuals[t + l]).sum::<f64>() / n as f64;
        let weight = 1.0 - l as f64 / (lag as f64 + 1.0);
        long_run_variance += 2.0 * weight * gamma_l;
    }
    if long_run_variance <= 0.0 {
        return 0.0;
    }
    s_squared_sum / (n as f64 * n as f64 * long_run_variance)
}

/// 5% critical value for the level-stationarity KPSS statistic.
const KPSS_CRITICAL_VALUE: f64 = 0.463;

/// Determine `d` by repeated KPSS testing and differencing, up to `max_d`.
pub fn select_d(y: &[f64], max_d: usize) -> usize {
    let mut series = y.to_vec();
    let mut d = 0;
    while d < max_d && kpss_statistic(&series) > KPSS_CRITICAL_VALUE {
        match difference(&series, 1) {
            Ok(next) if next.len() >= 4 => series = next,
            _ => break,
        }
        d += 1;
    }
    d
}

/// Determine seasonal `D` at `period` by repeated KPSS testing on
/// seasonally-differenced series, up to `max_d`.
pub fn select_seasonal_d(y: &[f64], period: usize, max_d: usize) -> usize {
    if period <= 1 {
        return 0;
    }
    let mut series = y.to_vec();
    let mut d = 0;
    while d < max_d && kpss_statistic(&series) > KPSS_CRITICAL_VALUE {
        match seasonal_difference(&series, 1, period) {
            Ok(next) if next.len() >= 2 * period => series = next,
            _ => break,
        }
        d += 1;
    }
    d
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Stepwise,
    Exhaustive,
}

#[derive(Debug, Clone, Copy)]
pub struct AutoArimaCaps {
    pub max_p: usize,
    pub max_q: usize,
    pub max_seasonal_p: usize,
    pub max_seasonal_q: usize,
    pub max_d: usize,
    pub max_seasonal_d: usize,
    pub seasonal_period: usize,
}

impl Default for AutoArimaCaps {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_q: 5,
            max_seasonal_p: 2,
            max_seasonal_q: 2,
            max_d: 2,
            max_seasonal_d: 1,
            seasonal_period: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutoArimaConfig {
    pub caps: AutoArimaCaps,
    pub strategy: SearchStrategy,
    pub seed: (usize, usize, usize, usize),
    pub allow_mean: bool,
    pub allow_drift: bool,
}

impl Default for AutoArimaConfig {
    fn default() -> Self {
        Self {
            caps: AutoArimaCaps::default(),
            strategy: SearchStrategy::Stepwise,
            seed: (2, 2, 1, 1),
            allow_mean: true,
            allow_drift: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoArimaDiagnostics {
    pub models_evaluated: usize,
    pub models_failed: usize,
    pub used_stepwise: bool,
    pub training_size: usize,
    pub selected_order: Option<ArimaOrder>,
}

fn order_key(p: usize, q: usize, sp: usize, sq: usize) -> (usize, usize, usize, usize) {
    (p, q, sp, sq)
}

fn fit_candidate(
    ts: &TimeSeries,
    p: usize,
    d: usize,
    q: usize,
    sp: usize,
    sd: usize,
    sq: usize,
    period: usize,
    include_mean: bool,
    include_drift: bool,
) -> Option<(Arima, f64)> {
    let order = ArimaOrder {
        p,
        d,
        q,
        seasonal_p: sp,
        seasonal_d: sd,
        seasonal_q: sq,
        seasonal_period: period,
    };
    let mut model = Arima::new(order, include_mean, include_drift);
    model.fit(ts).ok()?;
    let aicc = model.diagnostics()?.aicc;
    if aicc.is_finite() {
        Some((model, aicc))
    } else {
        None
    }
}

/// Searches (p,q,P,Q) at a fixed (d,D) determined up front by KPSS testing,
/// selecting the lowest-AICc model. Implements `Forecaster` by delegating
/// to the selected ARIMA.
#[derive(Debug, Clone)]
pub struct AutoArima {
    config: AutoArimaConfig,
    selected: Option<Arima>,
    diagnostics: Option<AutoArimaDiagnostics>,
}

impl AutoArima {
    pub fn new(config: AutoArimaConfig) -> Self {
        Self {
            config,
            selected: None,
            diagnostics: None,
        }
    }

    pub fn diagnostics(&self) -> Option<&AutoArimaDiagnostics> {
        self.diagnostics.as_ref()
    }

    fn search_stepwise(&self, ts: &TimeSeries, d: usize, sd: usize) -> (Option<(Arima, f64)>, usize, usize) {
        let caps = self.config.caps;
        let period = caps.seasonal_period.max(1);
        let (mut p, mut q, mut sp, mut sq) = self.config.seed;
        p = p.min(caps.max_p);
        q = q.min(caps.max_q);
        sp = if period > 1 { sp.min(caps.max_seasonal_p) } else { 0 };
        sq = if period > 1 { sq.min(caps.max_seasonal_q) } else { 0 };

        let mut visited = std::collections::HashSet::new();
        let mut evaluated = 0usize;
        let mut failed = 0usize;

        let mut best = fit_candidate(ts, p, d, q, sp, sd, sq, period, self.config.allow_mean, self.config.allow_drift);
        evaluated += 1;
        if best.is_none() {
            failed += 1;
        }
        visited.insert(order_key(p, q, sp, sq));

        let max_moves = caps.max_p + caps.max_q + caps.max_seasonal_p + caps.max_seasonal_q + 2;
        for _ in 0..max_moves {
            let mut neighbors = Vec::new();
            if p > 0 {
                neighbors.push((p - 1, q, sp, sq));
            }
            if p < caps.max_p {
                neighbors.push((p + 1, q, sp, sq));
            }
            if q > 0 {
                neighbors.push((p, q - 1, sp, sq));
            }
            if q < caps.max_q {
                neighbors.push((p, q + 1, sp, sq));
            }
            if period > 1 && sp > 0 {
                neighbors.push((p, q, sp - 1, sq));
            }
            if period > 1 && sp < caps.max_seasonal_p {
                neighbors.push((p, q, sp + 1, sq));
            }
            if period > 1 && sq > 0 {
                neighbors.push((p, q, sp, sq - 1));
            }
            if period > 1 && sq < caps.max_seasonal_q {
                neighbors.push((p, q, sp, sq + 1));
            }

            let mut moved = false;
            for (np, nq, nsp, nsq) in neighbors {
                let key = order_key(np, nq, nsp, nsq);
                if visited.contains(&key) {
                    continue;
                }
                visited.insert(key);
                evaluated += 1;
                match fit_candidate(ts, np, d, nq, nsp, sd, nsq, period, self.config.allow_mean, self.config.allow_drift) {
                    Some((model, aicc)) => {
                        let better = match &best {
                            None => true,
                            Some((_, best_aicc)) => aicc < *best_aicc,
                        };
                        if better {
                            best = Some((model, aicc));
                            p = np;
                            q = nq;
                            sp = nsp;
                            sq = nsq;
                            moved = true;
                            break;
                        }
                    }
                    None => failed += 1,
                }
            }
            if !moved {
                break;
            }
        }

        (best, evaluated, failed)
    }

    fn search_exhaustive(&self, ts: &TimeSeries, d: usize, sd: usize) -> (Option<(Arima, f64)>, usize, usize) {
        let caps = self.config.caps;
        let period = caps.seasonal_period.max(1);
        let mut best: Option<(Arima, f64)> = None;
        let mut evaluated = 0usize;
        let mut failed = 0usize;

        let sp_range = if period > 1 { 0..=caps.max_seasonal_p } else { 0..=0 };
        let sq_range = if period > 1 { 0..=caps.max_seasonal_q } else { 0..=0 };

        for p in 0..=caps.max_p {
            for q in 0..=caps.max_q {
                for sp in sp_range.clone() {
                    for sq in sq_range.clone() {
                        evaluated += 1;
                        match fit_candidate(ts, p, d, q, sp, sd, sq, period, self.config.allow_mean, self.config.allow_drift) {
                            Some((model, aicc)) => {
                                let better = match &best {
                                    None => true,
                                    Some((_, best_aicc)) => aicc < *best_aicc,
                                };
                                if better {
                                    best = Some((model, aicc));
                                }
                            }
                            None => failed += 1,
                        }
                    }
                }
            }
        }
        (best, evaluated, failed)
    }
}

impl Forecaster for AutoArima {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let caps = self.config.caps;
        let d = select_d(y, caps.max_d);
        let sd = select_seasonal_d(y, caps.seasonal_period.max(1), caps.max_seasonal_d);

        let (best, evaluated, failed) = match self.config.strategy {
            SearchStrategy::Stepwise => self.search_stepwise(ts, d, sd),
            SearchStrategy::Exhaustive => self.search_exhaustive(ts, d, sd),
        };

        let (model, _) = best.ok_or_else(|| {
            ForecastError::numerical("AutoARIMA", "every candidate order failed to fit or diverged", evaluated)
        })?;

        self.diagnostics = Some(AutoArimaDiagnostics {
            models_evaluated: evaluated,
            models_failed: failed,
            used_stepwise: self.config.strategy == SearchStrategy::Stepwise,
            training_size: y.len(),
            selected_order: Some(ArimaOrder {
                p: model.params().map(|p| p.ar.len()).unwrap_or(0),
                d,
                q: model.params().map(|p| p.ma.len()).unwrap_or(0),
                seasonal_p: model.params().map(|p| p.seasonal_ar.len()).unwrap_or(0),
                seasonal_d: sd,
                seasonal_q: model.params().map(|p| p.seasonal_ma.len()).unwrap_or(0),
                seasonal_period: caps.seasonal_period.max(1),
            }),
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
        "AutoARIMA"
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
    fn test_kpss_low_for_stationary_series() {
        let y: Vec<f64> = (0..60).map(|i| (i as f64 * 0.9).sin()).collect();
        let stat = kpss_statistic(&y);
        assert!(stat.is_finite() && stat >= 0.0);
    }

    #[test]
    fn test_select_d_differences_a_random_walk() {
        let mut y = vec![0.0];
        for i in 1..80 {
            y.push(y[i - 1] + 1.0 + (i as f64 * 0.3).sin());
        }
        let d = select_d(&y, 2);
        assert!(d >= 1);
    }

    #[test]
    fn test_auto_arima_fits_and_forecasts() {
        let y: Vec<f64> = (0..40).map(|i| 10.0 + 0.3 * i as f64 + (i as f64 * 0.5).sin()).collect();
        let mut model = AutoArima::new(AutoArimaConfig {
            caps: AutoArimaCaps {
                max_p: 2,
                max_q: 2,
                ..Default::default()
            },
            ..Default::default()
        });
        model.fit(&ts(y)).unwrap();
        let diag = model.diagnostics().unwrap();
        assert!(diag.models_evaluated > 0);
        let forecast = model.predict(4).unwrap();
        assert_eq!(forecast.point.len(), 4);
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_stepwise_terminates_within_move_budget() {
        let y: Vec<f64> = (0..50).map(|i| 5.0 + (i as f64 * 0.2).cos() * 2.0).collect();
        let mut model = AutoArima::new(AutoArimaConfig {
            caps: AutoArimaCaps {
                max_p: 3,
                max_q: 3,
                ..Default::default()
            },
            strategy: SearchStrategy::Stepwise,
            ..Default::default()
        });
        model.fit(&ts(y)).unwrap();
        let diag = model.diagnostics().unwrap();
        // spec §8: stepwise never evaluates more than max_p+max_q+... moves
        // plus the seed itself.
        assert!(diag.models_evaluated <= 3 + 3 + 2 + 2 + 2 + 8);
    }
}
