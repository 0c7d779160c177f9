//! Diversity selector: greedy threshold-ladder selection with guaranteed fill.
//!
//! Candidates are first put into a deterministic order (score descending,
//! then identity). The ladder then walks similarity thresholds from strict to
//! permissive; at each step a fresh greedy scan accepts a candidate only when
//! its similarity to every already-accepted item is below the threshold. The
//! first threshold that yields `target_count` items wins. If none does (or the
//! wall-clock budget runs out), the remainder is filled from the sorted pool,
//! non-duplicates first, then anything left.
//!
//! Selection never fails after input validation: degraded outcomes come back
//! as [`SelectionWarning`]s inside the result.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::candidate::Candidate;
use super::metrics::{MetricsSnapshot, RunningMetrics};
use super::similarity::{render_path, rendered_distance};
use crate::core::config::SelectorConfig;
use crate::core::errors::{Result, ScsError};

/// Anchor thresholds of the relaxation ladder.
pub const LADDER_ANCHORS: [f64; 8] = [0.60, 0.65, 0.70, 0.75, 0.80, 0.85, 0.90, 0.95];
/// Permissive tail appended after the last anchor.
pub const LADDER_TAIL: [f64; 2] = [0.99, 1.00];
/// Sub-steps per anchor interval (the anchor itself plus two interpolations).
const SUB_STEPS: usize = 3;

/// Non-fatal condition observed during a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionWarning {
    /// Pool smaller than the target; the whole pool was returned.
    InsufficientCandidates {
        /// Candidates offered.
        available: usize,
        /// Candidates requested.
        requested: usize,
    },
    /// The wall-clock budget ran out before the ladder finished.
    Timeout {
        /// Time spent when the ladder stopped.
        elapsed_ms: f64,
        /// Ladder steps completed before the budget ran out.
        thresholds_tried: usize,
    },
    /// The ladder fell short and the fill step topped up the selection.
    FinalFill {
        /// Selection size after filling.
        filled: usize,
        /// Requested count.
        target: usize,
    },
    /// Fill had to include near-duplicates of already-selected items.
    ForcedFill {
        /// Items added despite duplicating a selected item.
        forced: usize,
    },
}

impl SelectionWarning {
    /// Whether this warning explains a shortfall in diversity.
    #[must_use]
    pub const fn is_diversity_shortfall(&self) -> bool {
        matches!(self, Self::FinalFill { .. } | Self::ForcedFill { .. })
    }
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCandidates {
                available,
                requested,
            } => write!(
                f,
                "insufficient candidates: returning all {available} of {requested} requested"
            ),
            Self::Timeout {
                elapsed_ms,
                thresholds_tried,
            } => write!(
                f,
                "selection timeout reached after {thresholds_tried} thresholds ({elapsed_ms:.1}ms)"
            ),
            Self::FinalFill { filled, target } => {
                write!(f, "final filling applied: {filled}/{target}")
            }
            Self::ForcedFill { forced } => write!(
                f,
                "forced fill: {forced} duplicate candidate(s) included to meet the target"
            ),
        }
    }
}

/// Per-call diagnostics attached to every [`SelectionResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionMetrics {
    /// Pool size offered.
    pub candidate_count: usize,
    /// Number of ladder thresholds evaluated.
    pub iterations: usize,
    /// Last threshold evaluated (0.0 when the ladder never ran).
    pub final_threshold: f64,
    /// Wall time for the call.
    pub selection_time_ms: f64,
    /// False when the ladder came back short of `target_count`.
    pub success: bool,
    /// Non-fatal problems hit along the way.
    pub warnings: Vec<SelectionWarning>,
}

/// Outcome of [`DiversitySelector::select_diverse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionResult {
    /// Chosen candidates in selection order.
    pub selected: Vec<Candidate>,
    /// How the run went.
    pub metrics: SelectionMetrics,
}

/// The full ascending threshold ladder (24 steps from 0.60 to 1.00).
#[must_use]
pub fn threshold_ladder() -> Vec<f64> {
    let mut ladder = Vec::with_capacity((LADDER_ANCHORS.len() - 1) * SUB_STEPS + 1 + LADDER_TAIL.len());
    for pair in LADDER_ANCHORS.windows(2) {
        let step = (pair[1] - pair[0]) / SUB_STEPS as f64;
        for k in 0..SUB_STEPS {
            ladder.push(step.mul_add(k as f64, pair[0]));
        }
    }
    ladder.push(LADDER_ANCHORS[LADDER_ANCHORS.len() - 1]);
    ladder.extend_from_slice(&LADDER_TAIL);
    ladder
}

/// Greedy diversity selector with process-lifetime metrics.
#[derive(Debug)]
pub struct DiversitySelector {
    config: SelectorConfig,
    ladder: Vec<f64>,
    metrics: Mutex<RunningMetrics>,
}

impl DiversitySelector {
    /// Selector with empty metrics.
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            ladder: threshold_ladder(),
            metrics: Mutex::new(RunningMetrics::default()),
        }
    }

    /// Active tuning.
    #[must_use]
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select `config.target_count` candidates.
    pub fn select(&self, candidates: &[Candidate]) -> Result<SelectionResult> {
        self.select_diverse(candidates, self.config.target_count)
    }

    /// Select up to `target_count` mutually dissimilar candidates.
    ///
    /// Fails only when `candidates` is empty.
    pub fn select_diverse(
        &self,
        candidates: &[Candidate],
        target_count: usize,
    ) -> Result<SelectionResult> {
        if candidates.is_empty() {
            return Err(ScsError::invalid_input(
                "select_diverse",
                "candidates must be a non-empty slice",
            ));
        }

        let started = Instant::now();
        let mut metrics = SelectionMetrics {
            candidate_count: candidates.len(),
            iterations: 0,
            final_threshold: 0.0,
            selection_time_ms: 0.0,
            success: false,
            warnings: Vec::new(),
        };

        let selected = if candidates.len() < target_count {
            metrics.success = true;
            metrics
                .warnings
                .push(SelectionWarning::InsufficientCandidates {
                    available: candidates.len(),
                    requested: target_count,
                });
            candidates.to_vec()
        } else {
            let picked = self.run_ladder(candidates, target_count, started, &mut metrics);
            metrics.success = picked.len() == target_count;
            picked.into_iter().map(|i| candidates[i].clone()).collect()
        };

        metrics.selection_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.lock().record(&metrics);
        Ok(SelectionResult { selected, metrics })
    }

    /// Current aggregate metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }

    /// Zero the running metrics.
    pub fn reset_metrics(&self) {
        *self.metrics.lock() = RunningMetrics::default();
    }

    /// Indices of `candidates` in deterministic selection order.
    ///
    /// Candidates are ranked by descending score. Runs of neighbours whose
    /// consecutive score gaps are at most `tie_epsilon` form one tie group,
    /// ordered by the identity key, then position.
    #[must_use]
    pub fn deterministic_order(&self, candidates: &[Candidate]) -> Vec<usize> {
        let eps = self.config.tie_epsilon.max(0.0);
        let scores: Vec<f64> = candidates.iter().map(|c| finite_score(c.total_score)).collect();
        let by_identity = |a: usize, b: usize| {
            candidates[a]
                .sort_key()
                .cmp(&candidates[b].sort_key())
                .then_with(|| a.cmp(&b))
        };

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| by_identity(a, b)));

        let mut group_start = 0;
        for end in 1..=order.len() {
            let closes_group =
                end == order.len() || scores[order[end - 1]] - scores[order[end]] > eps;
            if closes_group {
                order[group_start..end].sort_by(|&a, &b| by_identity(a, b));
                group_start = end;
            }
        }
        order
    }

    fn run_ladder(
        &self,
        candidates: &[Candidate],
        target: usize,
        started: Instant,
        metrics: &mut SelectionMetrics,
    ) -> Vec<usize> {
        let order = self.deterministic_order(candidates);
        let mut pairs = PairCache::new(candidates);
        let budget = Duration::from_millis(self.config.timeout_ms);
        let mut selected = Vec::new();

        for (step, &threshold) in self.ladder.iter().enumerate() {
            let elapsed = started.elapsed();
            if elapsed >= budget {
                metrics.warnings.push(SelectionWarning::Timeout {
                    elapsed_ms: elapsed.as_secs_f64() * 1000.0,
                    thresholds_tried: step,
                });
                break;
            }
            metrics.iterations = step + 1;
            metrics.final_threshold = threshold;

            selected = greedy_scan(&order, threshold, target, &mut pairs);
            if selected.len() >= target {
                break;
            }
        }

        if selected.len() < target {
            let forced = fill_remaining(&mut selected, &order, target, &mut pairs);
            metrics.warnings.push(SelectionWarning::FinalFill {
                filled: selected.len(),
                target,
            });
            if forced > 0 {
                metrics.warnings.push(SelectionWarning::ForcedFill { forced });
            }
        }

        selected.truncate(target);
        selected
    }
}

impl Default for DiversitySelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

fn finite_score(score: f64) -> f64 {
    if score.is_finite() { score } else { 0.0 }
}

/// Accept, in order, every candidate whose similarity to all accepted items
/// is strictly below `threshold`.
fn greedy_scan(order: &[usize], threshold: f64, target: usize, pairs: &mut PairCache<'_>) -> Vec<usize> {
    let mut selected: Vec<usize> = Vec::with_capacity(target);
    for &idx in order {
        if selected.len() >= target {
            break;
        }
        if selected
            .iter()
            .all(|&s| 1.0 - pairs.distance(s, idx) < threshold)
        {
            selected.push(idx);
        }
    }
    selected
}

/// Top up `selected` to `target`: first with candidates that duplicate no
/// selected item, then with whatever remains. Returns the forced count.
fn fill_remaining(
    selected: &mut Vec<usize>,
    order: &[usize],
    target: usize,
    pairs: &mut PairCache<'_>,
) -> usize {
    let mut taken = vec![false; pairs.len()];
    for &idx in selected.iter() {
        taken[idx] = true;
    }

    for &idx in order {
        if selected.len() >= target {
            return 0;
        }
        if taken[idx] {
            continue;
        }
        let duplicates_existing = selected.iter().any(|&s| pairs.distance(s, idx) <= 0.0);
        if !duplicates_existing {
            selected.push(idx);
            taken[idx] = true;
        }
    }

    let mut forced = 0;
    for &idx in order {
        if selected.len() >= target {
            break;
        }
        if !taken[idx] {
            selected.push(idx);
            taken[idx] = true;
            forced += 1;
        }
    }
    forced
}

/// Memoized pairwise distances over pre-rendered paths for one selection call.
struct PairCache<'a> {
    candidates: &'a [Candidate],
    rendered: Vec<Option<String>>,
    memo: HashMap<(usize, usize), f64>,
}

impl<'a> PairCache<'a> {
    fn new(candidates: &'a [Candidate]) -> Self {
        let rendered = candidates
            .iter()
            .map(|c| c.path.as_deref().map(render_path))
            .collect();
        Self {
            candidates,
            rendered,
            memo: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.candidates.len()
    }

    fn distance(&mut self, a: usize, b: usize) -> f64 {
        let key = if a <= b { (a, b) } else { (b, a) };
        if let Some(&d) = self.memo.get(&key) {
            return d;
        }
        let d = rendered_distance(
            self.rendered[a].as_deref(),
            self.candidates[a].total_score,
            self.rendered[b].as_deref(),
            self.candidates[b].total_score,
        );
        self.memo.insert(key, d);
        d
    }
}
