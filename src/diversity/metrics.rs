//! Process-lifetime aggregate of selector calls.

#![allow(clippy::cast_precision_loss)]

use std::collections::BTreeMap;

use serde::Serialize;

use super::selector::SelectionMetrics;

/// Width of the candidate-pool-size histogram buckets.
pub const POOL_BUCKET_WIDTH: usize = 100;

/// Aggregate statistics across every `select_diverse` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunningMetrics {
    /// Completed `select_diverse` calls.
    pub total_selections: u64,
    /// Summed wall time.
    pub total_time_ms: f64,
    /// Mean wall time per call.
    pub average_time_ms: f64,
    /// Slowest call.
    pub max_time_ms: f64,
    /// `None` until the first selection.
    pub min_time_ms: Option<f64>,
    /// Running fraction of calls that met their target count.
    pub success_rate: f64,
    /// Final threshold (rendered to 4 decimals) -> call count.
    pub threshold_distribution: BTreeMap<String, u64>,
    /// Pool-size bucket floor -> call count.
    pub candidate_count_distribution: BTreeMap<usize, u64>,
}

/// [`RunningMetrics`] plus derived throughput and footprint figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Aggregates collected so far.
    #[serde(flatten)]
    pub running: RunningMetrics,
    /// Selections per second at the average latency.
    pub efficiency: f64,
    /// Rough byte estimate of the aggregate's footprint.
    pub memory_estimate: usize,
}

impl RunningMetrics {
    /// Fold one selection's metrics into the aggregate.
    pub fn record(&mut self, selection: &SelectionMetrics) {
        self.total_selections += 1;
        let n = self.total_selections as f64;
        let t = selection.selection_time_ms;

        self.total_time_ms += t;
        self.average_time_ms = self.total_time_ms / n;
        self.max_time_ms = self.max_time_ms.max(t);
        self.min_time_ms = Some(self.min_time_ms.map_or(t, |m| m.min(t)));

        let hit = if selection.success { 1.0 } else { 0.0 };
        self.success_rate = self.success_rate.mul_add(n - 1.0, hit) / n;

        *self
            .threshold_distribution
            .entry(format!("{:.4}", selection.final_threshold))
            .or_insert(0) += 1;
        let bucket = selection.candidate_count / POOL_BUCKET_WIDTH * POOL_BUCKET_WIDTH;
        *self.candidate_count_distribution.entry(bucket).or_insert(0) += 1;
    }

    /// Point-in-time copy with derived rates.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let efficiency = if self.average_time_ms > 0.0 {
            1000.0 / self.average_time_ms
        } else {
            0.0
        };
        let memory_estimate = 1024
            + self.threshold_distribution.len() * 64
            + self.candidate_count_distribution.len() * 64;
        MetricsSnapshot {
            running: self.clone(),
            efficiency,
            memory_estimate,
        }
    }
}
