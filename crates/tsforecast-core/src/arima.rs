//! (Seasonal) ARIMA via conditional maximum likelihood (spec §4.4).
//!
//! Non-seasonal and seasonal AR/MA polynomials are combined by polynomial
//! multiplication, fit by the bounded optimizer in [`crate::optimizer`], and
//! rolled forward through [`crate::differencing`] to produce forecasts on
//! the original scale.

use crate::differencing::{combined_difference, integrate, seasonal_integrate};
use crate::error::{ForecastError, Result};
use crate::forecaster::{Forecast, Forecaster};
use crate::numeric::{aic, aicc, bic, gaussian_log_likelihood, normal_quantile};
use crate::optimizer::nelder_mead;
use crate::timeseries::TimeSeries;

/// Non-seasonal and seasonal orders for a SARIMA(p,d,q)(P,D,Q)_s model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub seasonal_period: usize,
}

impl ArimaOrder {
    pub fn non_seasonal(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            seasonal_period: 1,
        }
    }

    fn has_seasonal(&self) -> bool {
        self.seasonal_period > 1 && (self.seasonal_p > 0 || self.seasonal_d > 0 || self.seasonal_q > 0)
    }

    fn ar_total(&self) -> usize {
        self.p + self.seasonal_p * self.seasonal_period
    }

    fn ma_total(&self) -> usize {
        self.q + self.seasonal_q * self.seasonal_period
    }

    fn n_params(&self, include_mean: bool, include_drift: bool) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q + include_mean as usize + include_drift as usize + 1
        // + 1 for sigma^2
    }
}

fn poly_multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &av) in a.iter().enumerate() {
        for (j, &bv) in b.iter().enumerate() {
            out[i + j] += av * bv;
        }
    }
    out
}

/// Combined AR coefficients (phi form: `y_t = sum phi_i y_{t-i} + ...`)
/// from non-seasonal AR(p) and seasonal AR(P) at lag `s`.
fn combined_ar_coeffs(phi: &[f64], seasonal_phi: &[f64], s: usize) -> Vec<f64> {
    let mut non_seasonal = vec![1.0];
    non_seasonal.extend(phi.iter().map(|c| -c));

    let mut seasonal = vec![0.0; seasonal_phi.len() * s + 1];
    seasonal[0] = 1.0;
    for (i, &c) in seasonal_phi.iter().enumerate() {
        seasonal[(i + 1) * s] = -c;
    }

    let full = poly_multiply(&non_seasonal, &seasonal);
    full[1..].iter().map(|c| -c).collect()
}

/// Combined MA coefficients (theta form: `y_t = e_t + sum theta_j e_{t-j}`).
fn combined_ma_coeffs(theta: &[f64], seasonal_theta: &[f64], s: usize) -> Vec<f64> {
    let mut non_seasonal = vec![1.0];
    non_seasonal.extend(theta.iter().copied());

    let mut seasonal = vec![0.0; seasonal_theta.len() * s + 1];
    seasonal[0] = 1.0;
    for (i, &c) in seasonal_theta.iter().enumerate() {
        seasonal[(i + 1) * s] = c;
    }

    let full = poly_multiply(&non_seasonal, &seasonal);
    full[1..].to_vec()
}

/// Impulse-response decay test used as a practical stand-in for "roots of
/// the characteristic polynomial lie outside the unit circle": simulate the
/// AR(coeffs) recursion and require the response to shrink and stay bounded.
fn impulse_response_decays(coeffs: &[f64]) -> bool {
    if coeffs.is_empty() {
        return true;
    }
    let horizon = 120usize;
    let mut psi = vec![0.0; horizon];
    psi[0] = 1.0;
    for k in 1..horizon {
        let mut acc = 0.0;
        for (i, &c) in coeffs.iter().enumerate() {
            let lag = i + 1;
            if lag <= k {
                acc += c * psi[k - lag];
            }
        }
        psi[k] = acc;
        if !psi[k].is_finite() || psi[k].abs() > 1e8 {
            return false;
        }
    }
    let early = psi[horizon / 4].abs();
    let late = psi[horizon - 1].abs();
    late <= early * 0.5 + 1e-9
}

/// Fitted model parameters.
#[derive(Debug, Clone)]
pub struct ArimaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    pub intercept: Option<f64>,
    pub drift: Option<f64>,
    pub sigma2: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ArimaDiagnostics {
    pub log_likelihood: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
    pub n_used: usize,
    pub optimizer_converged: bool,
    pub optimizer_iterations: usize,
}

/// SARIMA(p,d,q)(P,D,Q)_s forecaster.
#[derive(Debug, Clone)]
pub struct Arima {
    order: ArimaOrder,
    include_mean: bool,
    include_drift: bool,

    history: Vec<f64>,
    w: Vec<f64>, // fully differenced estimation series
    params: Option<ArimaParams>,
    fitted_w: Vec<f64>,
    residuals_w: Vec<f64>,
    seasonal_seed: Vec<f64>,
    diagnostics: Option<ArimaDiagnostics>,
}

impl Arima {
    pub fn new(order: ArimaOrder, include_mean: bool, include_drift: bool) -> Self {
        Self {
            order,
            include_mean,
            include_drift,
            history: Vec::new(),
            w: Vec::new(),
            params: None,
            fitted_w: Vec::new(),
            residuals_w: Vec::new(),
            seasonal_seed: Vec::new(),
            diagnostics: None,
        }
    }

    /// Seed needed to invert `seasonal_difference`: for each order `k` in
    /// `0..D`, the first `lag` values of the `k`-times-seasonally-differenced
    /// prefix of `y_d` (see [`crate::differencing::seasonal_integrate`]).
    fn seasonal_seed_from(y_d: &[f64], seasonal_order: usize, lag: usize) -> Result<Vec<f64>> {
        let mut seed = Vec::with_capacity(seasonal_order * lag);
        for k in 0..seasonal_order {
            let prefix_len = (k + 1) * lag;
            if y_d.len() < prefix_len {
                return Err(ForecastError::insufficient("ARIMA seasonal seed", prefix_len, y_d.len()));
            }
            let layer = crate::differencing::seasonal_difference(&y_d[0..prefix_len], k, lag)?;
            seed.extend(layer);
        }
        Ok(seed)
    }

    pub fn params(&self) -> Option<&ArimaParams> {
        self.params.as_ref()
    }

    pub fn diagnostics(&self) -> Option<&ArimaDiagnostics> {
        self.diagnostics.as_ref()
    }

    fn min_observations(&self) -> usize {
        let o = &self.order;
        o.p + o.d + o.q + o.seasonal_period * (o.seasonal_p + o.seasonal_d + o.seasonal_q) + 1
    }

    /// Residuals of the conditional-MLE filter over `w`, given free
    /// coefficients packed as `[ar..., ma..., sar..., sma..., mean?, drift?]`.
    fn filter(&self, w: &[f64], free: &[f64]) -> (Vec<f64>, Vec<f64>, ArimaParams, usize) {
        let o = &self.order;
        let mut idx = 0;
        let ar: Vec<f64> = free[idx..idx + o.p].to_vec();
        idx += o.p;
        let ma: Vec<f64> = free[idx..idx + o.q].to_vec();
        idx += o.q;
        let sar: Vec<f64> = free[idx..idx + o.seasonal_p].to_vec();
        idx += o.seasonal_p;
        let sma: Vec<f64> = free[idx..idx + o.seasonal_q].to_vec();
        idx += o.seasonal_q;
        let intercept = if self.include_mean {
            let v = free[idx];
            idx += 1;
            Some(v)
        } else {
            None
        };
        let drift = if self.include_drift {
            let v = free[idx];
            Some(v)
        } else {
            None
        };

        let combined_ar = combined_ar_coeffs(&ar, &sar, o.seasonal_period.max(1));
        let combined_ma = combined_ma_coeffs(&ma, &sma, o.seasonal_period.max(1));
        let p_total = combined_ar.len();
        let q_total = combined_ma.len();
        let start = p_total;

        let n = w.len();
        let mut fitted = vec![0.0; n];
        let mut residuals = vec![0.0; n];

        for t in 0..n {
            if t < start {
                fitted[t] = w[t];
                residuals[t] = 0.0;
                continue;
            }
            let mut ar_part = 0.0;
            for (i, &c) in combined_ar.iter().enumerate() {
                ar_part += c * w[t - (i + 1)];
            }
            let mut ma_part = 0.0;
            for (j, &c) in combined_ma.iter().enumerate() {
                let lag = j + 1;
                if t >= start + lag {
                    ma_part += c * residuals[t - lag];
                }
            }
            let drift_term = drift.unwrap_or(0.0) * t as f64;
            let mu = intercept.unwrap_or(0.0) + drift_term + ar_part + ma_part;
            fitted[t] = mu;
            residuals[t] = w[t] - mu;
        }

        let params = ArimaParams {
            ar,
            ma,
            seasonal_ar: sar,
            seasonal_ma: sma,
            intercept,
            drift,
            sigma2: 0.0,
        };
        let _ = q_total;
        (fitted, residuals, params, start)
    }

    fn objective(&self, w: &[f64], free: &[f64]) -> f64 {
        let o = &self.order;
        let ar = &free[0..o.p];
        let ma_start = o.p + o.q;
        let sar = &free[ma_start..ma_start + o.seasonal_p];

        let combined_ar = combined_ar_coeffs(ar, sar, o.seasonal_period.max(1));
        if !impulse_response_decays(&combined_ar) {
            return f64::INFINITY;
        }
        let ma = &free[o.p..o.p + o.q];
        let sma_start = ma_start + o.seasonal_p;
        let sma = &free[sma_start..sma_start + o.seasonal_q];
        let combined_ma = combined_ma_coeffs(ma, sma, o.seasonal_period.max(1));
        let neg_ma: Vec<f64> = combined_ma.iter().map(|c| -c).collect();
        if !impulse_response_decays(&neg_ma) {
            return f64::INFINITY;
        }

        let (_, residuals, _, start) = self.filter(w, free);
        if start >= residuals.len() {
            return f64::INFINITY;
        }
        let used = &residuals[start..];
        if !used.iter().all(|v| v.is_finite()) {
            return f64::INFINITY;
        }
        used.iter().map(|r| r * r).sum()
    }
}

impl Forecaster for Arima {
    fn fit(&mut self, ts: &TimeSeries) -> Result<()> {
        let y = ts.univariate_values()?;
        let min_n = self.min_observations();
        if y.len() < min_n {
            return Err(ForecastError::insufficient("ARIMA", min_n, y.len()));
        }

        let o = self.order;
        let s = o.seasonal_period.max(1);
        let y_d = crate::differencing::difference(y, o.d)?;
        let seasonal_seed = Self::seasonal_seed_from(&y_d, o.seasonal_d, s)?;
        let w = combined_difference(y, o.d, o.seasonal_d, s)?;
        if w.len() < o.p.max(o.q) + 1 {
            return Err(ForecastError::insufficient("ARIMA (post-differencing)", o.p.max(o.q) + 1, w.len()));
        }

        let n_free = o.p + o.q + o.seasonal_p + o.seasonal_q + self.include_mean as usize + self.include_drift as usize;
        let (best_free, iterations, converged) = if n_free == 0 {
            (Vec::new(), 0, true)
        } else {
            let mut bounds = Vec::with_capacity(n_free);
            for _ in 0..(o.p + o.seasonal_p) {
                bounds.push((-0.95, 0.95));
            }
            for _ in 0..(o.q + o.seasonal_q) {
                bounds.push((-0.95, 0.95));
            }
            if self.include_mean {
                let mean = w.iter().sum::<f64>() / w.len() as f64;
                bounds.push((mean - mean.abs().max(1.0) * 2.0, mean + mean.abs().max(1.0) * 2.0));
            }
            if self.include_drift {
                bounds.push((-10.0, 10.0));
            }
            let initial: Vec<f64> = bounds.iter().map(|&(lo, hi)| (lo + hi) / 2.0).collect();
            let objective = |free: &[f64]| self.objective(&w, free);
            let result = nelder_mead(&objective, &initial, &bounds, 400);
            (result.params, result.iterations, result.converged)
        };

        let (fitted, residuals, params, start) = self.filter(&w, &best_free);
        let n_used = w.len() - start;
        if n_used == 0 {
            return Err(ForecastError::numerical("ARIMA", "no observations left after conditioning", iterations));
        }
        let sse: f64 = residuals[start..].iter().map(|r| r * r).sum();
        let k = o.p + o.q + o.seasonal_p + o.seasonal_q + self.include_mean as usize + self.include_drift as usize;
        let sigma2 = sse / (n_used as f64 - k as f64).max(1.0);
        let log_likelihood = gaussian_log_likelihood(sse, n_used);
        let n_ic_params = o.n_params(self.include_mean, self.include_drift);

        self.history = y.to_vec();
        self.w = w;
        self.fitted_w = fitted;
        self.residuals_w = residuals;
        self.seasonal_seed = seasonal_seed;
        self.params = Some(ArimaParams { sigma2, ..params });
        self.diagnostics = Some(ArimaDiagnostics {
            log_likelihood,
            aic: aic(log_likelihood, n_ic_params),
            aicc: aicc(log_likelihood, n_ic_params, n_used),
            bic: bic(log_likelihood, n_ic_params, n_used),
            n_used,
            optimizer_converged: converged,
            optimizer_iterations: iterations,
        });
        Ok(())
    }

    fn predict(&self, h: usize) -> Result<Forecast> {
        self.require_fitted()?;
        self.require_horizon(h)?;
        let params = self.params.as_ref().unwrap();
        let o = &self.order;
        let s = o.seasonal_period.max(1);
        let combined_ar = combined_ar_coeffs(&params.ar, &params.seasonal_ar, s);
        let combined_ma = combined_ma_coeffs(&params.ma, &params.seasonal_ma, s);

        let mut w_ext = self.w.clone();
        let mut e_ext = self.residuals_w.clone();
        let n = self.w.len();

        for step in 0..h {
            let t = n + step;
            let mut ar_part = 0.0;
            for (i, &c) in combined_ar.iter().enumerate() {
                let lag = i + 1;
                if t >= lag {
                    ar_part += c * w_ext[t - lag];
                }
            }
            let mut ma_part = 0.0;
            for (j, &c) in combined_ma.iter().enumerate() {
                let lag = j + 1;
                if t >= lag && t - lag < e_ext.len() {
                    ma_part += c * e_ext[t - lag];
                }
            }
            let drift_term = params.drift.unwrap_or(0.0) * t as f64;
            let value = params.intercept.unwrap_or(0.0) + drift_term + ar_part + ma_part;
            w_ext.push(value);
            e_ext.push(0.0);
        }

        // Undo seasonal differencing, then non-seasonal differencing, back
        // onto the original scale.
        let y = &self.history;
        let y_d_full = if o.seasonal_d > 0 {
            seasonal_integrate(&w_ext, &self.seasonal_seed, o.seasonal_d, s)?
        } else {
            w_ext.clone()
        };
        let y_full = integrate(&y_d_full, &y[0..o.d], o.d)?;
        let point = y_full[y_full.len() - h..].to_vec();

        if !point.iter().all(|v| v.is_finite()) {
            return Err(ForecastError::numerical("ARIMA", "non-finite forecast", h));
        }

        // Gaussian bands via MA(inf) psi weights on the differenced scale
        // (spec §4.4): point +/- z(level) * sqrt(sigma^2 * sum psi_i^2).
        let mut psi = vec![0.0; h];
        psi[0] = 1.0;
        for j in 1..h {
            let mut acc = if j <= combined_ma.len() { combined_ma[j - 1] } else { 0.0 };
            for (i, &c) in combined_ar.iter().enumerate() {
                let lag = i + 1;
                if lag <= j {
                    acc += c * psi[j - lag];
                }
            }
            psi[j] = acc;
        }
        let mut cum = 0.0;
        let mut sigma_h = Vec::with_capacity(h);
        for p in &psi {
            cum += p * p;
            sigma_h.push((params.sigma2 * cum).max(0.0).sqrt());
        }
        let z = normal_quantile(0.90)?;
        let lower: Vec<f64> = point.iter().zip(&sigma_h).map(|(p, s)| p - z * s).collect();
        let upper: Vec<f64> = point.iter().zip(&sigma_h).map(|(p, s)| p + z * s).collect();

        Ok(Forecast {
            point,
            lower: Some(lower),
            upper: Some(upper),
            model_name: self.name().to_string(),
            confidence_level: Some(0.90),
            insample_fitted: None,
        })
    }

    fn name(&self) -> &str {
        "ARIMA"
    }

    fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    fn residual_std(&self) -> Result<f64> {
        self.require_fitted()?;
        Ok(self.params.as_ref().unwrap().sigma2.sqrt())
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
    fn test_arima_010_no_intercept_scenario() {
        // spec §8 scenario 5: ARIMA(0,1,0), no drift/mean -> flat at last diff level (0 drift)
        let mut model = Arima::new(ArimaOrder::non_seasonal(0, 1, 0), false, false);
        model.fit(&ts(vec![5.0, 7.0, 6.0, 9.0, 11.0])).unwrap();
        let forecast = model.predict(3).unwrap();
        for v in &forecast.point {
            assert_relative_eq!(*v, 11.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_arima_010_with_mean_drift_scenario() {
        // spec §8 scenario 5 variant: include_mean on the differenced series
        // acts as the drift term; mean(diff) = 1.5 -> [12.5, 14, 15.5]
        let mut model = Arima::new(ArimaOrder::non_seasonal(0, 1, 0), true, false);
        model.fit(&ts(vec![5.0, 7.0, 6.0, 9.0, 11.0])).unwrap();
        let forecast = model.predict(3).unwrap();
        assert_relative_eq!(forecast.point[0], 12.5, epsilon = 1e-6);
        assert_relative_eq!(forecast.point[1], 14.0, epsilon = 1e-6);
        assert_relative_eq!(forecast.point[2], 15.5, epsilon = 1e-6);
    }

    #[test]
    fn test_combined_ar_coeffs_non_seasonal_only() {
        let coeffs = combined_ar_coeffs(&[0.5, -0.2], &[], 1);
        assert_relative_eq!(coeffs[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(coeffs[1], -0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_impulse_response_rejects_explosive_ar() {
        assert!(!impulse_response_decays(&[1.5]));
        assert!(impulse_response_decays(&[0.5]));
    }

    #[test]
    fn test_predict_requires_fit() {
        let model = Arima::new(ArimaOrder::non_seasonal(1, 0, 0), false, false);
        assert!(model.predict(1).is_err());
    }

    #[test]
    fn test_insufficient_data_error() {
        let mut model = Arima::new(ArimaOrder::non_seasonal(3, 1, 2), false, false);
        assert!(model.fit(&ts(vec![1.0, 2.0, 3.0])).is_err());
    }
}
