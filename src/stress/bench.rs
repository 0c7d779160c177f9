//! Micro-benchmark measurer for RNG draws and selector calls.
//!
//! Each measurement runs a fixed warm-up, then times every call
//! individually. Failed calls count toward the error rate and are excluded
//! from the timing statistics. All times are reported in microseconds.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::fmt::Write as _;
use std::hint::black_box;
use std::time::Instant;

use serde::Serialize;

use crate::core::config::SelectorConfig;
use crate::core::errors::{Result, ScsError};
use crate::diversity::candidate::Candidate;
use crate::diversity::selector::DiversitySelector;
use crate::rng::lcg::DeterministicRandom;

/// Untimed calls made before measuring.
pub const WARMUP_CALLS: usize = 10;

const CSV_HEADER: &str = "name,iterations,valid,errors,min_us,max_us,mean_us,median_us,p95_us,p99_us,std_dev_us,ops_per_sec,error_rate_pct";

/// Timing statistics for one named operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Benchmark name.
    pub name: String,
    /// Calls timed.
    pub iterations: usize,
    /// Calls that returned `Ok`.
    pub valid: usize,
    /// Calls that returned an error.
    pub errors: usize,
    /// Fastest call.
    pub min_us: f64,
    /// Slowest call.
    pub max_us: f64,
    /// Mean call time.
    pub mean_us: f64,
    /// Median call time.
    pub median_us: f64,
    /// 95th percentile.
    pub p95_us: f64,
    /// 99th percentile.
    pub p99_us: f64,
    /// Population standard deviation.
    pub std_dev_us: f64,
    /// Successful calls per second.
    pub ops_per_sec: f64,
    /// `errors / iterations`.
    pub error_rate: f64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl Measurement {
    fn from_samples(name: &str, iterations: usize, mut samples: Vec<f64>, errors: usize) -> Self {
        samples.sort_by(f64::total_cmp);
        let valid = samples.len();
        let total: f64 = samples.iter().sum();
        let mean = if valid == 0 { 0.0 } else { total / valid as f64 };
        let variance = if valid == 0 {
            0.0
        } else {
            samples.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / valid as f64
        };
        Self {
            name: name.to_string(),
            iterations,
            valid,
            errors,
            min_us: samples.first().copied().unwrap_or(0.0),
            max_us: samples.last().copied().unwrap_or(0.0),
            mean_us: mean,
            median_us: median(&samples),
            p95_us: percentile(&samples, 0.95),
            p99_us: percentile(&samples, 0.99),
            std_dev_us: variance.sqrt(),
            ops_per_sec: if total > 0.0 {
                valid as f64 / (total / 1_000_000.0)
            } else {
                0.0
            },
            error_rate: if iterations == 0 {
                0.0
            } else {
                errors as f64 / iterations as f64
            },
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.1},{:.2}",
            csv_field(&self.name),
            self.iterations,
            self.valid,
            self.errors,
            self.min_us,
            self.max_us,
            self.mean_us,
            self.median_us,
            self.p95_us,
            self.p99_us,
            self.std_dev_us,
            self.ops_per_sec,
            self.error_rate * 100.0
        )
    }
}

/// Percentile of an ascending slice using index `ceil(n*p) - 1`.
#[must_use]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (sorted.len() as f64 * p).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// Median of an already sorted slice; 0 when empty.
#[must_use]
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 0 => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
        _ => sorted[n / 2],
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

/// Collects measurements in insertion order; re-measuring a name replaces it.
#[derive(Debug, Clone, Default)]
pub struct BenchmarkMeasurer {
    measurements: Vec<Measurement>,
}

impl BenchmarkMeasurer {
    /// Empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warm up, then time `iterations` calls of `op`.
    pub fn measure<T, F>(&mut self, name: &str, iterations: usize, mut op: F) -> &Measurement
    where
        F: FnMut() -> Result<T>,
    {
        for _ in 0..WARMUP_CALLS {
            let _ = black_box(op());
        }

        let mut samples = Vec::with_capacity(iterations);
        let mut errors = 0;
        for _ in 0..iterations {
            let started = Instant::now();
            match black_box(op()) {
                Ok(_) => samples.push(started.elapsed().as_secs_f64() * 1_000_000.0),
                Err(_) => errors += 1,
            }
        }

        let measurement = Measurement::from_samples(name, iterations, samples, errors);
        self.measurements.retain(|m| m.name != name);
        self.measurements.push(measurement);
        let last = self.measurements.len() - 1;
        &self.measurements[last]
    }

    /// Measurements so far.
    #[must_use]
    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Drop all measurements.
    pub fn clear(&mut self) {
        self.measurements.clear();
    }

    /// All measurements as CSV with a header row.
    #[must_use]
    pub fn export_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        for m in &self.measurements {
            let _ = write!(out, "\n{}", m.csv_row());
        }
        out
    }
}

/// Standard suite: RNG draws, derived distributions and a selector call.
pub fn run_standard_suite(
    seed: u32,
    iterations: usize,
    selector: &SelectorConfig,
) -> Result<BenchmarkMeasurer> {
    if iterations == 0 {
        return Err(ScsError::invalid_input(
            "bench",
            "iterations must be at least 1",
        ));
    }
    let mut measurer = BenchmarkMeasurer::new();
    let mut rng = DeterministicRandom::new(seed);

    measurer.measure("next_f64", iterations, || Ok(rng.next_f64()));
    measurer.measure("next_int", iterations, || rng.next_int(1, 64));
    measurer.measure("gaussian", iterations, || rng.gaussian(0.0, 1.0));

    let deck: Vec<u32> = (1..=64).collect();
    measurer.measure("shuffle_64", iterations, || Ok(rng.shuffle(&deck)));
    let weights = [0.25, 0.75];
    measurer.measure("weighted_choice", iterations, || {
        rng.weighted_choice(&["moving", "static"], &weights).copied()
    });

    let pool = Candidate::synthesize_pool(&mut rng, 100)?;
    let diversity = DiversitySelector::new(selector.clone());
    measurer.measure("select_diverse_100", iterations.div_ceil(10), || {
        diversity.select(&pool)
    });

    Ok(measurer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_uses_ceil_index() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert!((percentile(&sorted, 0.95) - 95.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.99) - 99.0).abs() < f64::EPSILON);
        assert!((percentile(&[7.0], 0.5) - 7.0).abs() < f64::EPSILON);
        assert!(percentile(&[], 0.5).abs() < f64::EPSILON);
        assert!((percentile(&[1.0, 2.0], 0.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn median_of_even_and_odd() {
        assert!((median(&[1.0, 2.0, 3.0]) - 2.0).abs() < f64::EPSILON);
        assert!((median(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn errors_count_toward_rate_only() {
        let mut measurer = BenchmarkMeasurer::new();
        let mut calls = 0_usize;
        let m = measurer
            .measure("flaky", 10, || {
                calls += 1;
                if calls % 2 == 0 {
                    Err(ScsError::invalid_input("flaky", "even call"))
                } else {
                    Ok(calls)
                }
            })
            .clone();
        assert_eq!(calls, WARMUP_CALLS + 10);
        assert_eq!(m.iterations, 10);
        assert_eq!(m.errors, 5);
        assert_eq!(m.valid, 5);
        assert!((m.error_rate - 0.5).abs() < f64::EPSILON);
        assert!(m.min_us <= m.median_us && m.median_us <= m.max_us);
    }

    #[test]
    fn remeasuring_replaces_entry() {
        let mut measurer = BenchmarkMeasurer::new();
        measurer.measure("a", 3, || Ok(()));
        measurer.measure("b", 3, || Ok(()));
        measurer.measure("a", 5, || Ok(()));
        let names: Vec<_> = measurer.measurements().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(measurer.measurements()[1].iterations, 5);
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut measurer = BenchmarkMeasurer::new();
        measurer.measure("x,y", 4, || Ok(1));
        let csv = measurer.export_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("name,iterations"));
        assert!(lines[1].starts_with("\"x,y\",4,4,0,"));
        assert_eq!(lines[1].split(',').count(), lines[0].split(',').count() + 1);
    }

    #[test]
    fn standard_suite_covers_operations() {
        let measurer = run_standard_suite(42, 20, &SelectorConfig::default()).unwrap();
        let names: Vec<_> = measurer.measurements().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "next_f64",
                "next_int",
                "gaussian",
                "shuffle_64",
                "weighted_choice",
                "select_diverse_100"
            ]
        );
        assert!(measurer.measurements().iter().all(|m| m.errors == 0));
        assert!(run_standard_suite(42, 0, &SelectorConfig::default()).is_err());
    }
}
