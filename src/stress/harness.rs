//! Stress harness: drives the selector over a ladder of synthetic pool sizes.
//!
//! Each pool size runs on its own [`DeterministicRandom`] stream seeded from
//! the stress seed and the size, so the synthesized workload does not depend
//! on how pool sizes are spread across worker threads. Workers pull pool
//! sizes from a crossbeam channel and share one [`DiversitySelector`].

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::thread;
use std::time::Instant;

use crossbeam_channel as channel;
use serde::Serialize;

use super::analysis::StressReport;
use crate::core::config::{SelectorConfig, StressConfig};
use crate::core::errors::{Result, ScsError};
use crate::diversity::candidate::Candidate;
use crate::diversity::selector::{DiversitySelector, SelectionResult, SelectionWarning};
use crate::diversity::similarity::diversity_score;
use crate::rng::lcg::DeterministicRandom;

/// Mixed into the stress seed per pool size.
const SIZE_SEED_MIX: u32 = 0x9E37_79B9;

/// One `select_diverse` call observed by the harness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    /// Wall time.
    pub time_ms: f64,
    /// Selector reported success.
    pub success: bool,
    /// Items returned.
    pub selected: usize,
    /// Ladder steps tried.
    pub iterations: usize,
    /// Threshold in effect at the end.
    pub final_threshold: f64,
    /// Mean pairwise distance of the selected set.
    pub diversity_score: f64,
    /// Warnings from the selector.
    pub warnings: Vec<SelectionWarning>,
}

impl SelectionOutcome {
    fn from_result(result: &SelectionResult) -> Self {
        Self {
            time_ms: result.metrics.selection_time_ms,
            success: result.metrics.success,
            selected: result.selected.len(),
            iterations: result.metrics.iterations,
            final_threshold: result.metrics.final_threshold,
            diversity_score: diversity_score(&result.selected),
            warnings: result.metrics.warnings.clone(),
        }
    }
}

/// All selections run against one pool size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSizeCase {
    /// Pool size.
    pub candidate_count: usize,
    /// Selections run.
    pub iterations: usize,
    /// Mean selection time.
    pub avg_time_ms: f64,
    /// Fastest selection.
    pub min_time_ms: f64,
    /// Slowest selection.
    pub max_time_ms: f64,
    /// Fraction that succeeded.
    pub success_rate: f64,
    /// Wall-clock time for the whole case, synthesis included.
    pub wall_time_ms: f64,
    /// Every run, in order.
    pub outcomes: Vec<SelectionOutcome>,
}

impl PoolSizeCase {
    fn from_outcomes(candidate_count: usize, outcomes: Vec<SelectionOutcome>, wall_time_ms: f64) -> Self {
        let n = outcomes.len().max(1) as f64;
        let total: f64 = outcomes.iter().map(|o| o.time_ms).sum();
        let successes = outcomes.iter().filter(|o| o.success).count();
        let min = outcomes.iter().map(|o| o.time_ms).fold(f64::INFINITY, f64::min);
        let max = outcomes.iter().map(|o| o.time_ms).fold(0.0, f64::max);
        Self {
            candidate_count,
            iterations: outcomes.len(),
            avg_time_ms: total / n,
            min_time_ms: if min.is_finite() { min } else { 0.0 },
            max_time_ms: max,
            success_rate: successes as f64 / n,
            wall_time_ms,
            outcomes,
        }
    }
}

/// Selections to run for `size`: `min(test_cases, ceil(iteration_budget / size))`.
#[must_use]
pub fn iterations_for(config: &StressConfig, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    config.test_cases.min(config.iteration_budget.div_ceil(size))
}

/// Seed of the RNG stream for one pool size.
#[must_use]
pub fn seed_for_size(seed: u32, size: usize) -> u32 {
    seed ^ (size as u32).wrapping_mul(SIZE_SEED_MIX)
}

/// Runs the selector across pool sizes on a worker pool.
pub struct StressTestHarness {
    config: StressConfig,
    selector: DiversitySelector,
}

impl StressTestHarness {
    /// Harness whose selector uses the stress target and timeout.
    pub fn new(config: StressConfig, selector: &SelectorConfig) -> Self {
        let selector = DiversitySelector::new(SelectorConfig {
            target_count: config.target_count,
            timeout_ms: config.timeout_ms,
            tie_epsilon: selector.tie_epsilon,
        });
        Self { config, selector }
    }

    /// Active sizing.
    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    /// Shared selector.
    pub fn selector(&self) -> &DiversitySelector {
        &self.selector
    }

    /// Run one pool size.
    pub fn run_pool_size(&self, size: usize) -> Result<PoolSizeCase> {
        if size == 0 {
            return Err(ScsError::invalid_input(
                "run_pool_size",
                "pool size must be at least 1",
            ));
        }
        let started = Instant::now();
        let mut rng = DeterministicRandom::new(seed_for_size(self.config.seed, size));
        let runs = iterations_for(&self.config, size);
        let mut outcomes = Vec::with_capacity(runs);
        for _ in 0..runs {
            let pool = Candidate::synthesize_pool(&mut rng, size)?;
            let result = self.selector.select_diverse(&pool, self.config.target_count)?;
            outcomes.push(SelectionOutcome::from_result(&result));
        }
        Ok(PoolSizeCase::from_outcomes(
            size,
            outcomes,
            started.elapsed().as_secs_f64() * 1000.0,
        ))
    }

    /// Run every configured pool size and analyze the results.
    pub fn run_full_stress_test(&self) -> Result<StressReport> {
        let started = Instant::now();
        let sizes = &self.config.pool_sizes;
        let workers = self.config.parallelism.clamp(1, sizes.len().max(1));

        let (job_tx, job_rx) = channel::unbounded::<(usize, usize)>();
        let (result_tx, result_rx) = channel::unbounded::<(usize, Result<PoolSizeCase>)>();
        for job in sizes.iter().copied().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for (slot, size) in job_rx {
                        if result_tx.send((slot, self.run_pool_size(size))).is_err() {
                            return;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<PoolSizeCase>> = vec![None; sizes.len()];
        for (slot, case) in result_rx {
            slots[slot] = Some(case?);
        }
        let cases: Vec<PoolSizeCase> = slots.into_iter().flatten().collect();
        if cases.len() != sizes.len() {
            return Err(ScsError::Runtime {
                details: format!(
                    "stress workers finished {} of {} pool sizes",
                    cases.len(),
                    sizes.len()
                ),
            });
        }

        Ok(StressReport::build(
            self.config.seed,
            self.config.target_count,
            cases,
            started.elapsed().as_secs_f64() * 1000.0,
            self.selector.metrics(),
        ))
    }
}
