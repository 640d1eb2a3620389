//! PELT changepoint detection, used by MFLES's piecewise-linear trend
//! method to place trend breakpoints (spec §4.8 supplement).

use crate::error::Result;

/// Segmentation result: changepoint indices and the total segmentation
/// cost at the optimum.
#[derive(Debug, Clone)]
pub struct ChangepointResult {
    pub changepoints: Vec<usize>,
    pub cost: f64,
}

/// Per-segment cost function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CostFunction {
    /// Mean absolute deviation; robust to outliers.
    L1,
    /// Variance around the segment mean.
    #[default]
    L2,
    /// Normal log-likelihood (penalizes variance changes, not just mean).
    Normal,
}

/// Evaluates segment cost over a fixed series. Caches prefix sums so the
/// additive cost functions (L2, Normal) are O(1) per segment instead of
/// rescanning; L1 needs a fresh mean pass since it has no closed form in
/// terms of the running sums.
struct SegmentCost<'a> {
    values: &'a [f64],
    which: CostFunction,
    prefix_sum: Vec<f64>,
    prefix_sum_sq: Vec<f64>,
}

impl<'a> SegmentCost<'a> {
    fn new(values: &'a [f64], which: CostFunction) -> Self {
        let mut prefix_sum = Vec::with_capacity(values.len() + 1);
        let mut prefix_sum_sq = Vec::with_capacity(values.len() + 1);
        prefix_sum.push(0.0);
        prefix_sum_sq.push(0.0);
        for &v in values {
            prefix_sum.push(prefix_sum[prefix_sum.len() - 1] + v);
            prefix_sum_sq.push(prefix_sum_sq[prefix_sum_sq.len() - 1] + v * v);
        }
        Self { values, which, prefix_sum, prefix_sum_sq }
    }

    fn eval(&self, start: usize, end: usize) -> f64 {
        if end <= start {
            return 0.0;
        }
        match self.which {
            CostFunction::L1 => self.l1(start, end),
            CostFunction::L2 => self.l2(start, end),
            CostFunction::Normal => self.normal(start, end),
        }
    }

    fn running_stats(&self, start: usize, end: usize) -> (f64, f64, f64) {
        let n = (end - start) as f64;
        let sum = self.prefix_sum[end] - self.prefix_sum[start];
        let sum_sq = self.prefix_sum_sq[end] - self.prefix_sum_sq[start];
        (n, sum, sum_sq)
    }

    fn l2(&self, start: usize, end: usize) -> f64 {
        let (n, sum, sum_sq) = self.running_stats(start, end);
        // sum((v - mean)^2) = sum_sq - sum^2 / n
        (sum_sq - sum * sum / n).max(0.0)
    }

    fn l1(&self, start: usize, end: usize) -> f64 {
        let segment = &self.values[start..end];
        let mean = segment.iter().sum::<f64>() / segment.len() as f64;
        segment.iter().map(|v| (v - mean).abs()).sum()
    }

    fn normal(&self, start: usize, end: usize) -> f64 {
        let (n, sum, sum_sq) = self.running_stats(start, end);
        if n < 2.0 {
            return 0.0;
        }
        let mean = sum / n;
        let variance = sum_sq / n - mean * mean;
        if variance <= f64::EPSILON {
            return 0.0;
        }
        n * (1.0 + variance.ln())
    }
}

/// Dynamic-programming state carried across the PELT scan. `best_cost[t]`
/// is the optimal segmentation cost over `values[0..t]`, `origin[t]` the
/// changepoint the optimal path into `t` passes through, and `survivors[t]`
/// the candidate origins that pass the pruning test at `t` — each later
/// step searches only its predecessor's survivor list rather than every
/// earlier index, which is what keeps the scan linear in practice.
struct PeltState {
    best_cost: Vec<f64>,
    origin: Vec<usize>,
    survivors: Vec<Vec<usize>>,
}

impl PeltState {
    fn new(n: usize, penalty: f64) -> Self {
        let mut best_cost = vec![f64::NEG_INFINITY; n + 1];
        best_cost[0] = -penalty;
        Self { best_cost, origin: vec![0usize; n + 1], survivors: vec![vec![0usize]; n + 1] }
    }

    fn advance(&mut self, t: usize, min_size: usize, penalty: f64, cost: &SegmentCost) {
        let candidates = self.survivors[t - 1].clone();

        let mut chosen_cost = f64::INFINITY;
        let mut chosen_origin = 0usize;
        for &origin in &candidates {
            if origin + min_size > t {
                continue;
            }
            let total = self.best_cost[origin] + cost.eval(origin, t) + penalty;
            if total < chosen_cost {
                chosen_cost = total;
                chosen_origin = origin;
            }
        }
        self.best_cost[t] = chosen_cost;
        self.origin[t] = chosen_origin;

        let mut next: Vec<usize> = candidates
            .into_iter()
            .filter(|&origin| self.best_cost[origin] + cost.eval(origin, t) <= self.best_cost[t])
            .collect();
        next.push(t);
        self.survivors[t] = next;
    }

    fn backtrack(&self, n: usize) -> Vec<usize> {
        let mut changepoints = Vec::new();
        let mut t = n;
        while t > 0 {
            let origin = self.origin[t];
            if origin > 0 {
                changepoints.push(origin);
            }
            t = origin;
        }
        changepoints.reverse();
        changepoints
    }
}

/// PELT (Pruned Exact Linear Time) optimal segmentation. `penalty` defaults
/// to a BIC-like `2*ln(n)` per added changepoint when `None`. Returns no
/// changepoints (not an error) when the series is too short to support two
/// `min_size`-length segments.
pub fn detect_changepoints(values: &[f64], min_size: usize, penalty: Option<f64>, which: CostFunction) -> Result<ChangepointResult> {
    let n = values.len();
    let min_size = min_size.max(1);
    if n < 2 * min_size {
        return Ok(ChangepointResult { changepoints: Vec::new(), cost: 0.0 });
    }

    let penalty = penalty.unwrap_or_else(|| (n as f64).ln() * 2.0);
    let cost = SegmentCost::new(values, which);
    let mut state = PeltState::new(n, penalty);

    for t in min_size..=n {
        state.advance(t, min_size, penalty, &cost);
    }

    Ok(ChangepointResult { changepoints: state.backtrack(n), cost: state.best_cost[n] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_single_level_shift() {
        let mut values = vec![0.0; 50];
        values.extend(vec![10.0; 50]);
        let result = detect_changepoints(&values, 5, None, CostFunction::L2).unwrap();
        assert!(result.changepoints.iter().any(|&cp| (45..55).contains(&cp)));
    }

    #[test]
    fn test_detects_two_level_shifts() {
        let mut values = vec![0.0; 33];
        values.extend(vec![10.0; 34]);
        values.extend(vec![0.0; 33]);
        let result = detect_changepoints(&values, 5, None, CostFunction::L2).unwrap();
        assert!(result.changepoints.len() >= 1);
    }

    #[test]
    fn test_constant_series_has_no_changepoints() {
        let values = vec![5.0; 100];
        let result = detect_changepoints(&values, 5, None, CostFunction::L2).unwrap();
        assert!(result.changepoints.len() <= 1);
    }

    #[test]
    fn test_too_short_series_returns_empty_not_error() {
        let values = vec![1.0, 2.0, 3.0];
        let result = detect_changepoints(&values, 5, None, CostFunction::L2).unwrap();
        assert!(result.changepoints.is_empty());
    }

    #[test]
    fn test_l1_cost_robust_to_outlier() {
        let mut values = vec![1.0; 40];
        values[20] = 1000.0;
        values.extend(vec![20.0; 40]);
        let result = detect_changepoints(&values, 5, None, CostFunction::L1).unwrap();
        assert!(result.changepoints.iter().any(|&cp| (35..45).contains(&cp)));
    }
}
