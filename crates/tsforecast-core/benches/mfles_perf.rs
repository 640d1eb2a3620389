//! Performance benchmark for MFLES fit/predict at scale.
//!
//! Run with: cargo bench --bench mfles_perf

use std::time::{Duration, Instant};

use chrono::{DateTime, TimeZone, Utc};
use tsforecast_core::{Forecaster, Mfles, MflesConfig, TimeSeries};

fn generate_seasonal_series(n: usize, periods: &[usize]) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let trend = 0.01 * i as f64;
            let seasonal: f64 = periods
                .iter()
                .enumerate()
                .map(|(j, &p)| {
                    let amplitude = 10.0 / (j + 1) as f64;
                    amplitude * (2.0 * std::f64::consts::PI * i as f64 / p as f64).sin()
                })
                .sum();
            trend + seasonal + (i % 7) as f64 * 0.1
        })
        .collect()
}

fn ts(values: Vec<f64>) -> TimeSeries {
    let timestamps: Vec<DateTime<Utc>> =
        (0..values.len()).map(|i| Utc.timestamp_opt(1_700_000_000 + i as i64 * 3600, 0).unwrap()).collect();
    TimeSeries::univariate(timestamps, values).unwrap()
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("{}: total={:?}, per_iter={:?}, iters={}", name, elapsed, per_iter, iterations);
    elapsed
}

fn main() {
    println!("=== MFLES Performance Benchmark ===\n");

    let series_lengths = [100, 500, 1000, 5000, 10000];
    let periods_single = [12];
    let periods_multi = [7, 12, 52];

    println!("--- 1. Single-period fit ---\n");
    for &n in &series_lengths {
        let values = generate_seasonal_series(n, &periods_single);
        let series = ts(values);
        let iters = if n <= 1000 { 20 } else { 3 };

        benchmark_fn(&format!("mfles_fit(n={}, single period)", n), iters, || {
            let mut config = MflesConfig::default();
            config.seasonal_periods = vec![12];
            let mut model = Mfles::new(config);
            model.fit(&series).unwrap();
        });
    }

    println!("\n--- 2. Multi-period fit ---\n");
    for &n in &series_lengths {
        let values = generate_seasonal_series(n, &periods_multi);
        let series = ts(values);
        let iters = if n <= 1000 { 10 } else { 2 };

        benchmark_fn(&format!("mfles_fit(n={}, 3 periods)", n), iters, || {
            let mut config = MflesConfig::default();
            config.seasonal_periods = periods_multi.to_vec();
            let mut model = Mfles::new(config);
            model.fit(&series).unwrap();
        });
    }

    println!("\n--- 3. Predict on a pre-fit model ---\n");
    let values = generate_seasonal_series(2000, &periods_single);
    let series = ts(values);
    let mut config = MflesConfig::default();
    config.seasonal_periods = vec![12];
    let mut model = Mfles::new(config);
    model.fit(&series).unwrap();

    benchmark_fn("  mfles_predict(h=12)", 1000, || model.predict(12).unwrap());

    println!("\n--- 4. Large-series fit (n=50000) ---\n");
    let large_n = 50000;
    let large_values = generate_seasonal_series(large_n, &[12, 52, 365]);
    let large_series = ts(large_values);

    benchmark_fn("  mfles_fit (3 periods, n=50000)", 2, || {
        let mut config = MflesConfig::default();
        config.seasonal_periods = vec![12, 52, 365];
        config.max_rounds = 10;
        let mut model = Mfles::new(config);
        model.fit(&large_series).unwrap();
    });

    println!("\n=== Benchmark Complete ===");
}
