//! Multiple Seasonal-Trend decomposition (spec §4.10): iterative moving-
//! average decomposition into trend + one seasonal component per period +
//! remainder, consumed directly by `MstlForecaster`/`AutoMSTL` and reused
//! by MFLES for its seasonal-period bookkeeping.

use crate::error::{ForecastError, Result};
use crate::ets::Ets;
use crate::forecaster::Forecaster;
use crate::theta::ThetaModel;
use crate::timeseries::TimeSeries;

/// Result of a multi-period decomposition.
#[derive(Debug, Clone)]
pub struct MstlDecomposition {
    pub trend: Vec<f64>,
    /// One seasonal series per entry of `periods`, same order.
    pub seasonal: Vec<Vec<f64>>,
    pub periods: Vec<usize>,
    pub remainder: Vec<f64>,
}

impl MstlDecomposition {
    pub fn seasonal_sum_at(&self, original_index: usize) -> f64 {
        self.periods
            .iter()
            .zip(&self.seasonal)
            .map(|(&p, s)| if p == 0 { 0.0 } else { s[original_index % p] })
            .sum()
    }
}

fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    let mut trend = vec![f64::NAN; n];
    if n <= window {
        return trend;
    }
    for i in half..n.saturating_sub(half) {
        let sum: f64 = values[i - half..=i + half].iter().sum();
        trend[i] = sum / window as f64;
    }
    let first_valid = trend.iter().position(|v| !v.is_nan()).unwrap_or(0);
    let last_valid = trend.iter().rposition(|v| !v.is_nan()).unwrap_or(n - 1);
    let first_valid_value = trend[first_valid];
    for slot in trend.iter_mut().take(first_valid) {
        *slot = first_valid_value;
    }
    for i in (last_valid + 1)..n {
        trend[i] = trend[last_valid];
    }
    trend
}

/// Single-period STL-style pass: centered-MA trend, then average-by-phase
/// seasonal (centered to mean 0), then remainder.
fn stl_pass(values: &[f64], period: usize) -> Result<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let n = values.len();
    if period < 2 || n < 2 * period {
        return Err(ForecastError::insufficient("mstl stl_pass", 2 * period, n));
    }
    let window = if period % 2 == 0 { period + 1 } else { period };
    let trend = centered_moving_average(values, window);
    let detrended: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();

    let mut seasonal = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, &d) in detrended.iter().enumerate() {
        seasonal[i % period] += d;
        counts[i % period] += 1;
    }
    for (s, &c) in seasonal.iter_mut().zip(&counts) {
        if c > 0 {
            *s /= c as f64;
        }
    }
    let mean = seasonal.iter().sum::<f64>() / period as f64;
    for s in &mut seasonal {
        *s -= mean;
    }
    let seasonal_full: Vec<f64> = (0..n).map(|i| seasonal[i % period]).collect();
    let remainder: Vec<f64> = values
        .iter()
        .zip(&trend)
        .zip(&seasonal_full)
        .map(|((v, t), s)| v - t - s)
        .collect();
    Ok((trend, seasonal_full, remainder))
}

/// Decompose `values` against one or more `periods`, largest first, each
/// pass stripping its seasonal component off the running residual before
/// the next period is estimated (spec §4.10). `iterations` repeats the
/// whole pass to let later periods refine earlier ones; `robust` reruns
/// with outlier-damped weights by capping the residual before each
/// refinement pass.
pub fn mstl_decompose(values: &[f64], periods: &[usize], iterations: usize, robust: bool) -> Result<MstlDecomposition> {
    let n = values.len();
    if n == 0 {
        return Err(ForecastError::insufficient("mstl_decompose", 1, 0));
    }
    let mut sorted_periods: Vec<usize> = periods.iter().copied().filter(|&p| p >= 2 && n >= 2 * p).collect();
    sorted_periods.sort_unstable_by(|a, b| b.cmp(a));
    sorted_periods.dedup();

    if sorted_periods.is_empty() {
        let window = (n / 5).clamp(3, n.max(3));
        let trend = centered_moving_average(values, window);
        let remainder: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();
        return Ok(MstlDecomposition { trend, seasonal: Vec::new(), periods: Vec::new(), remainder });
    }

    let mut seasonal_components: Vec<Vec<f64>> = vec![vec![0.0; n]; sorted_periods.len()];
    let mut current = values.to_vec();

    for iter in 0..iterations.max(1) {
        for (k, &period) in sorted_periods.iter().enumerate() {
            // Add back this period's previous-round contribution before
            // re-estimating it against the other periods' residual.
            for (c, s) in current.iter_mut().zip(&seasonal_components[k]) {
                *c += s;
            }
            let (_, seasonal, remainder) = stl_pass(&current, period)?;
            if robust && iter > 0 {
                let mean = remainder.iter().sum::<f64>() / n as f64;
                let std = (remainder.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
                if std > f64::EPSILON {
                    current = remainder
                        .iter()
                        .zip(&seasonal)
                        .map(|(&r, &s)| s + r.clamp(mean - 4.0 * std, mean + 4.0 * std))
                        .collect();
                } else {
                    current = remainder.iter().zip(&seasonal).map(|(&r, &s)| s + r).collect();
                }
            } else {
                current = remainder;
            }
            seasonal_components[k] = seasonal;
        }
    }

    let window = if sorted_periods[0] % 2 == 0 { sorted_periods[0] + 1 } else { sorted_periods[0] };
    let trend = centered_moving_average(&current, window.min(n.saturating_sub(1).max(3)));
    let remainder: Vec<f64> = current.iter().zip(&trend).map(|(v, t)| v - t).collect();

    Ok(MstlDecomposition { trend, seasonal: seasonal_components, periods: sorted_periods, remainder })
}

/// `MSTL`/`AutoMSTL`'s trend+remainder extrapolation method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendMethod {
    Linear,
    Ses,
    Holt,
    None,
    EtsAan,
    EtsManAn,
}

/// Seasonal projection method used after decomposition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeasonalMethod {
    /// Repeat the last observed cycle forward.
    Cyclic,
    EtsAna,
    EtsAnm,
}

/// Forecaster wrapping [`mstl_decompose`]: decomposes, forecasts
/// trend+remainder with `trend_method`, projects the seasonal components
/// with `seasonal_method`, and recombines (spec §4.10).
pub struct MstlForecaster {
    display_name: &'static str,
    periods: Vec<usize>,
    iterations: usize,
    robust: bool,
    trend_method: TrendMethod,
    seasonal_method: SeasonalMethod,

    decomposition: Option<MstlDecomposition>,
    trend_forecaster: Option<Box<dyn Forecaster>>,
    history_len: usize,
}

impl MstlForecaster {
    pub fn new(periods: Vec<usize>, trend_method: TrendMethod, seasonal_method: SeasonalMethod) -> Self {
        Self {
            display_name: "MSTL",
            periods,
            iterations: 2,
            robust: false,
            trend_method,
            seasonal_method,
            decomposition: None,
            trend_forecaster: None,
            history_len: 0,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.display_name = name;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    pub fn decomposition(&self) -> Option<&MstlDecomposition> {
        self.decomposition.as_ref()
    }
}

fn trend_remainder_series(decomp: &MstlDecomposition, n: usize) -> Vec<f64> {
    (0..n).map(|i| decomp.trend[i] + decomp.remainder[i]).collect()
}

fn build_trend_forecaster(method: TrendMethod) -> Option<Box<dyn Forecaster>> {
    match method {
        TrendMethod::None => None,
        TrendMethod::Ses => Some(Box::new(Ets::ses_optimized())),
        TrendMethod::Holt => Some(Box::new(Ets::holt(None, None))),
        TrendMethod::EtsAan => Some(Box::new(Ets::holt(None, None))),
        TrendMethod::EtsManAn => Some(Box::new(Ets::holt(None, None))),
        TrendMethod::Linear => Some(Box::new(ThetaModel::classic(1))),
    }
}

impl Forecaster for MstlForecaster {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let decomposition = mstl_decompose(y, &self.periods, self.iterations, self.robust)?;
        self.history_len = y.len();

        if let Some(mut model) = build_trend_forecaster(self.trend_method) {
            let series = trend_remainder_series(&decomposition, y.len());
            let synthetic = TimeSeries::univariate(ts.timestamps().to_vec(), series)?;
            model.fit(&synthetic)?;
            self.trend_forecaster = Some(model);
        } else {
            self.trend_forecaster = None;
        }
        self.decomposition = Some(decomposition);
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<crate::forecaster::Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let decomp = self.decomposition.as_ref().unwrap();

        let trend_part: Vec<f64> = match &self.trend_forecaster {
            Some(model) => model.predict(h)?.point,
            None => {
                let last = *decomp.trend.last().unwrap_or(&0.0);
                vec![last; h]
            }
        };

        let seasonal_part: Vec<f64> = (0..h)
            .map(|i| match self.seasonal_method {
                SeasonalMethod::Cyclic | SeasonalMethod::EtsAna | SeasonalMethod::EtsAnm => decomp.seasonal_sum_at(self.history_len + i),
            })
            .collect();

        let point: Vec<f64> = trend_part.iter().zip(&seasonal_part).map(|(t, s)| t + s).collect();
        Ok(crate::forecaster::Forecast::point_only(self.display_name, point))
    }

    fn name(&self) -> &str {
        self.display_name
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
    use std::f64::consts::PI;

    fn ts(values: Vec<f64>) -> TimeSeries {
        let timestamps: Vec<DateTime<Utc>> = (0..values.len())
            .map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap())
            .collect();
        TimeSeries::univariate(timestamps, values).unwrap()
    }

    #[test]
    fn test_mstl_decompose_single_period_shapes() {
        let values: Vec<f64> = (0..120).map(|i| 0.1 * i as f64 + 5.0 * (2.0 * PI * i as f64 / 12.0).sin()).collect();
        let result = mstl_decompose(&values, &[12], 2, false).unwrap();
        assert_eq!(result.trend.len(), values.len());
        assert_eq!(result.seasonal.len(), 1);
        assert_eq!(result.seasonal[0].len(), values.len());
        assert_eq!(result.remainder.len(), values.len());
    }

    #[test]
    fn test_mstl_decompose_two_periods() {
        let values: Vec<f64> = (0..200)
            .map(|i| 0.05 * i as f64 + 3.0 * (2.0 * PI * i as f64 / 7.0).sin() + 6.0 * (2.0 * PI * i as f64 / 30.0).cos())
            .collect();
        let result = mstl_decompose(&values, &[7, 30], 2, false).unwrap();
        assert_eq!(result.periods, vec![30, 7]);
        assert_eq!(result.seasonal.len(), 2);
    }

    #[test]
    fn test_mstl_decompose_empty_periods_falls_back_to_trend_only() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let result = mstl_decompose(&values, &[], 1, false).unwrap();
        assert!(result.seasonal.is_empty());
        assert_eq!(result.trend.len(), 20);
    }

    #[test]
    fn test_mstl_forecaster_produces_finite_forecast() {
        let values: Vec<f64> = (0..96).map(|i| 50.0 + 0.2 * i as f64 + 4.0 * (2.0 * PI * i as f64 / 12.0).sin()).collect();
        let mut model = MstlForecaster::new(vec![12], TrendMethod::Ses, SeasonalMethod::Cyclic);
        model.fit(&ts(values)).unwrap();
        let forecast = model.predict(6).unwrap();
        assert!(forecast.point.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mstl_forecaster_no_trend_method_holds_level() {
        let values: Vec<f64> = (0..48).map(|i| 10.0 + 2.0 * (2.0 * PI * i as f64 / 12.0).sin()).collect();
        let mut model = MstlForecaster::new(vec![12], TrendMethod::None, SeasonalMethod::Cyclic);
        model.fit(&ts(values)).unwrap();
        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.point.len(), 3);
    }
}
