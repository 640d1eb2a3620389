//! Small bounded optimizers shared by the parameter-search steps of ETS,
//! ARIMA and MFLES: a uniform grid scan, and a boxed Nelder-Mead simplex
//! search used to refine the grid's best point.
//!
//! Kept self-contained (no external optimization crate) so every model's
//! objective function is a plain closure `Fn(&[f64]) -> f64` with no
//! trait-object ceremony at the call site.

/// Outcome of a bounded optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeResult {
    pub params: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Evaluate `objective` over a uniform grid of `steps` points per
/// dimension within `bounds`, returning the best point found.
pub fn grid_search<F>(objective: F, bounds: &[(f64, f64)], steps: usize) -> OptimizeResult
where
    F: Fn(&[f64]) -> f64,
{
    let steps = steps.max(2);
    let dims = bounds.len();
    let mut best = vec![0.0; dims];
    let mut best_val = f64::INFINITY;
    let mut evaluated = 0usize;

    let mut idx = vec![0usize; dims];
    loop {
        let point: Vec<f64> = idx
            .iter()
            .zip(bounds)
            .map(|(&i, &(lo, hi))| {
                if steps == 1 {
                    lo
                } else {
                    lo + (hi - lo) * i as f64 / (steps - 1) as f64
                }
            })
            .collect();
        let val = objective(&point);
        evaluated += 1;
        if val.is_finite() && val < best_val {
            best_val = val;
            best = point;
        }

        // Odometer increment.
        let mut carry = 0;
        loop {
            idx[carry] += 1;
            if idx[carry] < steps {
                break;
            }
            idx[carry] = 0;
            carry += 1;
            if carry == dims {
                return OptimizeResult {
                    params: best,
                    objective: best_val,
                    iterations: evaluated,
                    converged: best_val.is_finite(),
                };
            }
        }
    }
}

/// Bounded Nelder-Mead simplex search, clamping every trial point into
/// `bounds` before evaluating `objective`. Starts from `initial`.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    max_iterations: usize,
) -> OptimizeResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return OptimizeResult {
            params: Vec::new(),
            objective: objective(&[]),
            iterations: 0,
            converged: true,
        };
    }

    let clamp = |p: &[f64]| -> Vec<f64> {
        p.iter()
            .zip(bounds)
            .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
            .collect()
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial));
    for i in 0..n {
        let mut p = initial.to_vec();
        let (lo, hi) = bounds[i];
        let span = (hi - lo).max(1e-6);
        let step = (span * 0.05).max(1e-3);
        p[i] = (p[i] + step).min(hi);
        if (p[i] - simplex[0][i]).abs() < 1e-12 {
            p[i] = (p[i] - 2.0 * step).max(lo);
        }
        simplex.push(clamp(&p));
    }

    let mut values: Vec<f64> = simplex.iter().map(|p| objective(p)).collect();
    let mut iterations = 0usize;
    let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);

    while iterations < max_iterations {
        iterations += 1;
        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));
        let best_val = values[order[0]];
        let worst_val = values[order[n]];

        if (worst_val - best_val).abs() < 1e-12 * (best_val.abs() + 1e-12) {
            break;
        }

        let worst = order[n];
        let centroid: Vec<f64> = (0..n)
            .map(|d| {
                order[..n].iter().map(|&i| simplex[i][d]).sum::<f64>() / n as f64
            })
            .collect();

        let reflect: Vec<f64> = clamp(
            &(0..n)
                .map(|d| centroid[d] + alpha * (centroid[d] - simplex[worst][d]))
                .collect::<Vec<_>>(),
        );
        let reflect_val = objective(&reflect);

        if reflect_val < values[order[0]] {
            let expand: Vec<f64> = clamp(
                &(0..n)
                    .map(|d| centroid[d] + gamma * (reflect[d] - centroid[d]))
                    .collect::<Vec<_>>(),
            );
            let expand_val = objective(&expand);
            if expand_val < reflect_val {
                simplex[worst] = expand;
                values[worst] = expand_val;
            } else {
                simplex[worst] = reflect;
                values[worst] = reflect_val;
            }
        } else if reflect_val < values[order[n - 1]] {
            simplex[worst] = reflect;
            values[worst] = reflect_val;
        } else {
            let contract: Vec<f64> = clamp(
                &(0..n)
                    .map(|d| centroid[d] + rho * (simplex[worst][d] - centroid[d]))
                    .collect::<Vec<_>>(),
            );
            let contract_val = objective(&contract);
            if contract_val < worst_val {
                simplex[worst] = contract;
                values[worst] = contract_val;
            } else {
                let best_point = simplex[order[0]].clone();
                for &i in &order[1..] {
                    let shrunk: Vec<f64> = clamp(
                        &(0..n)
                            .map(|d| best_point[d] + sigma * (simplex[i][d] - best_point[d]))
                            .collect::<Vec<_>>(),
                    );
                    values[i] = objective(&shrunk);
                    simplex[i] = shrunk;
                }
            }
        }
    }

    let best_idx = (0..=n)
        .min_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap();

    OptimizeResult {
        params: simplex[best_idx].clone(),
        objective: values[best_idx],
        iterations,
        converged: iterations < max_iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_search_finds_minimum() {
        let result = grid_search(|p| (p[0] - 0.42).powi(2), &[(0.0, 1.0)], 101);
        assert_relative_eq!(result.params[0], 0.42, epsilon = 0.01);
    }

    #[test]
    fn test_nelder_mead_quadratic_bowl() {
        let result = nelder_mead(
            |p| (p[0] - 3.0).powi(2) + (p[1] + 2.0).powi(2),
            &[0.0, 0.0],
            &[(-10.0, 10.0), (-10.0, 10.0)],
            500,
        );
        assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.params[1], -2.0, epsilon = 1e-3);
    }

    #[test]
    fn test_nelder_mead_respects_bounds() {
        let result = nelder_mead(|p| -p[0], &[0.5], &[(0.0, 1.0)], 200);
        assert!(result.params[0] <= 1.0 + 1e-9);
    }
}
