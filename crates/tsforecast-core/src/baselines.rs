//! Simple baseline forecasters (spec §4.2).

use crate::error::Result;
use crate::forecaster::{residual_std_of, Forecast, Forecaster};
use crate::timeseries::TimeSeries;

/// Last-observation-carried-forward.
#[derive(Debug, Clone, Default)]
pub struct Naive {
    history: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl Naive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Forecaster for Naive {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        if y.len() < 2 {
            return Err(crate::error::ForecastError::insufficient("Naive", 2, y.len()));
        }
        self.history = y.to_vec();
        self.fitted = y[..y.len() - 1].to_vec();
        self.residuals = y[1..].iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let last = *self.history.last().unwrap();
        let mut forecast = Forecast::point_only("Naive", vec![last; h]);
        forecast.insample_fitted = Some(self.fitted.clone());
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "Naive"
    }

    fn is_fitted(&self) -> bool {
        !self.history.is_empty()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        Ok(residual_std_of(&self.residuals))
    }
}

/// Repeats the value observed one full season ago.
#[derive(Debug, Clone)]
pub struct SeasonalNaive {
    season_length: usize,
    history: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl SeasonalNaive {
    pub fn new(season_length: usize) -> Self {
        Self {
            season_length: season_length.max(1),
            history: Vec::new(),
            fitted: Vec::new(),
            residuals: Vec::new(),
        }
    }
}

impl Forecaster for SeasonalNaive {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let s = self.season_length;
        if y.len() < s {
            return Err(crate::error::ForecastError::insufficient("SeasonalNaive", s, y.len()));
        }
        self.history = y.to_vec();
        self.fitted = y[..y.len() - s].to_vec();
        self.residuals = y[s..].iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let n = self.history.len();
        let s = self.season_length;
        let point: Vec<f64> = (0..h)
            .map(|i| self.history[n - s + (i % s)])
            .collect();
        let mut forecast = Forecast::point_only("SeasonalNaive", point);
        forecast.insample_fitted = Some(self.fitted.clone());
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "SeasonalNaive"
    }

    fn is_fitted(&self) -> bool {
        !self.history.is_empty()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        Ok(residual_std_of(&self.residuals))
    }
}

/// Average of the last `k` observations at the same seasonal phase.
#[derive(Debug, Clone)]
pub struct SeasonalWindowAverage {
    season_length: usize,
    window: usize,
    history: Vec<f64>,
}

impl SeasonalWindowAverage {
    pub fn new(season_length: usize, window: usize) -> Self {
        Self {
            season_length: season_length.max(1),
            window: window.max(1),
            history: Vec::new(),
        }
    }
}

impl Forecaster for SeasonalWindowAverage {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let needed = self.window * self.season_length;
        if y.len() < needed {
            return Err(crate::error::ForecastError::insufficient(
                "SeasonalWindowAverage",
                needed,
                y.len(),
            ));
        }
        self.history = y.to_vec();
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let n = self.history.len();
        let s = self.season_length;
        let point: Vec<f64> = (0..h)
            .map(|i| {
                let phase = i % s;
                let mut sum = 0.0;
                for k in 0..self.window {
                    let idx = n - s + phase - k * s;
                    sum += self.history[idx];
                }
                sum / self.window as f64
            })
            .collect();
        Ok(Forecast::point_only("SeasonalWindowAverage", point))
    }

    fn name(&self) -> &str {
        "SeasonalWindowAverage"
    }

    fn is_fitted(&self) -> bool {
        !self.history.is_empty()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        // No natural one-step residual definition; fall back to the
        // series' own dispersion around its mean.
        let mean = self.history.iter().sum::<f64>() / self.history.len() as f64;
        Ok(residual_std_of(&self.history.iter().map(|v| v - mean).collect::<Vec<_>>()))
    }
}

/// Forecast is the mean of the last `window` observations, constant in `h`.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    window: usize,
    history: Vec<f64>,
}

impl SimpleMovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            history: Vec::new(),
        }
    }
}

impl Forecaster for SimpleMovingAverage {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        if y.len() < self.window {
            return Err(crate::error::ForecastError::insufficient(
                "SimpleMovingAverage",
                self.window,
                y.len(),
            ));
        }
        self.history = y.to_vec();
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let n = self.history.len();
        let mean = self.history[n - self.window..].iter().sum::<f64>() / self.window as f64;
        Ok(Forecast::point_only("SimpleMovingAverage", vec![mean; h]))
    }

    fn name(&self) -> &str {
        "SimpleMovingAverage"
    }

    fn is_fitted(&self) -> bool {
        !self.history.is_empty()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        let n = self.history.len();
        let w = self.window;
        if n <= w {
            return Ok(0.0);
        }
        let residuals: Vec<f64> = (w..n)
            .map(|i| {
                let mean = self.history[i - w..i].iter().sum::<f64>() / w as f64;
                self.history[i] - mean
            })
            .collect();
        Ok(residual_std_of(&residuals))
    }
}

/// Extrapolates the average per-step drift `(y[n-1] - y[0]) / (n-1)`.
#[derive(Debug, Clone, Default)]
pub struct RandomWalkWithDrift {
    history: Vec<f64>,
    drift: f64,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl RandomWalkWithDrift {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Forecaster for RandomWalkWithDrift {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let n = y.len();
        if n < 2 {
            return Err(crate::error::ForecastError::insufficient("RandomWalkWithDrift", 2, n));
        }
        self.drift = (y[n - 1] - y[0]) / (n - 1) as f64;
        self.fitted = y[..n - 1].iter().map(|v| v + self.drift).collect();
        self.residuals = y[1..].iter().zip(&self.fitted).map(|(a, f)| a - f).collect();
        self.history = y.to_vec();
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let last = *self.history.last().unwrap();
        let point: Vec<f64> = (1..=h).map(|i| last + i as f64 * self.drift).collect();
        let mut forecast = Forecast::point_only("RandomWalkWithDrift", point);
        forecast.insample_fitted = Some(self.fitted.clone());
        Ok(forecast)
    }

    fn name(&self) -> &str {
        "RandomWalkWithDrift"
    }

    fn is_fitted(&self) -> bool {
        !self.history.is_empty()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        Ok(residual_std_of(&self.residuals))
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
    fn test_naive_scenario() {
        // spec §8 scenario 1
        let mut model = Naive::new();
        model.fit(&ts(vec![10.0, 12.0, 11.0, 13.0])).unwrap();
        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.point, vec![13.0, 13.0, 13.0]);
        assert_eq!(forecast.insample_fitted.unwrap(), vec![10.0, 12.0, 11.0]);
        assert_eq!(model.residuals, vec![2.0, -1.0, 2.0]);
    }

    #[test]
    fn test_naive_requires_fit() {
        let model = Naive::new();
        assert!(model.predict(1).is_err());
    }

    #[test]
    fn test_seasonal_naive_scenario() {
        // spec §8 scenario 2
        let mut model = SeasonalNaive::new(2);
        model.fit(&ts(vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0])).unwrap();
        let forecast = model.predict(4).unwrap();
        assert_eq!(forecast.point, vec![3.0, 7.0, 3.0, 7.0]);
    }

    #[test]
    fn test_seasonal_naive_purely_periodic_fitted_matches_tail() {
        let s = 3usize;
        let values = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let mut model = SeasonalNaive::new(s);
        model.fit(&ts(values.clone())).unwrap();
        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.insample_fitted.unwrap(), &values[..values.len() - s]);
    }

    #[test]
    fn test_seasonal_naive_requires_n_at_least_s() {
        let mut model = SeasonalNaive::new(5);
        assert!(model.fit(&ts(vec![1.0, 2.0, 3.0])).is_err());
    }

    #[test]
    fn test_random_walk_with_drift_scenario() {
        // spec §8 scenario 3
        let mut model = RandomWalkWithDrift::new();
        model.fit(&ts(vec![2.0, 4.0, 6.0, 8.0])).unwrap();
        assert_relative_eq!(model.drift, 2.0, epsilon = 1e-10);
        let forecast = model.predict(2).unwrap();
        assert_relative_eq!(forecast.point[0], 10.0, epsilon = 1e-10);
        assert_relative_eq!(forecast.point[1], 12.0, epsilon = 1e-10);
    }

    #[test]
    fn test_sma_requires_window() {
        let mut model = SimpleMovingAverage::new(4);
        model.fit(&ts(vec![1.0, 2.0, 3.0, 4.0])).unwrap();
        let forecast = model.predict(2).unwrap();
        assert_relative_eq!(forecast.point[0], 2.5, epsilon = 1e-10);
        assert_eq!(forecast.point[0], forecast.point[1]);
    }

    #[test]
    fn test_seasonal_window_average() {
        // period 2, window 2: phases [3,5] avg=4, [7,9] avg=8... use simple series
        let mut model = SeasonalWindowAverage::new(2, 2);
        model.fit(&ts(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])).unwrap();
        let forecast = model.predict(2).unwrap();
        // phase 0 uses indices 4 (5.0) and 2 (3.0) -> avg 4.0
        // phase 1 uses indices 5 (6.0) and 3 (4.0) -> avg 5.0
        assert_relative_eq!(forecast.point[0], 4.0, epsilon = 1e-10);
        assert_relative_eq!(forecast.point[1], 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_idempotent_repeated_predict() {
        let mut model = Naive::new();
        model.fit(&ts(vec![1.0, 2.0, 3.0])).unwrap();
        let a = model.predict(4).unwrap();
        let b = model.predict(4).unwrap();
        assert_eq!(a.point, b.point);
    }
}
