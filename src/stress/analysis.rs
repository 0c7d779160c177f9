//! Stress report analytics: scalability regression, selection quality,
//! failure attribution and recommendations.

#![allow(clippy::cast_precision_loss)]

use std::fmt::{self, Write as _};

use serde::Serialize;

use super::harness::{PoolSizeCase, SelectionOutcome};
use crate::diversity::metrics::MetricsSnapshot;
use crate::diversity::selector::SelectionWarning;

/// Pool sizes needed before the regression is attempted.
pub const MIN_CASES_FOR_REGRESSION: usize = 3;
/// Reliability is flagged below this overall success rate.
pub const SUCCESS_RATE_FLOOR: f64 = 0.95;
/// Performance is flagged above this average selection time.
pub const SLOW_SELECTION_MS: f64 = 100.0;
/// Floor applied to average times before taking logarithms.
const MIN_TIME_MS: f64 = 1e-6;

/// Empirical time-complexity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Complexity {
    /// Slope below 1.2.
    #[serde(rename = "O(n)")]
    Linear,
    /// Slope below 1.8.
    #[serde(rename = "O(n log n)")]
    Linearithmic,
    /// Slope below 2.2.
    #[serde(rename = "O(n^2)")]
    Quadratic,
    /// Slope 2.2 or more.
    #[serde(rename = "O(n^2+)")]
    SuperQuadratic,
    /// Too few usable pool sizes to fit a slope.
    #[serde(rename = "insufficient_data")]
    InsufficientData,
}

impl Complexity {
    /// Bucket a log-log slope.
    #[must_use]
    pub fn from_slope(slope: f64) -> Self {
        if slope < 1.2 {
            Self::Linear
        } else if slope < 1.8 {
            Self::Linearithmic
        } else if slope < 2.2 {
            Self::Quadratic
        } else {
            Self::SuperQuadratic
        }
    }

    /// Quadratic or worse.
    #[must_use]
    pub const fn is_at_least_quadratic(self) -> bool {
        matches!(self, Self::Quadratic | Self::SuperQuadratic)
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Linear => "O(n)",
            Self::Linearithmic => "O(n log n)",
            Self::Quadratic => "O(n^2)",
            Self::SuperQuadratic => "O(n^2+)",
            Self::InsufficientData => "insufficient data",
        };
        f.write_str(label)
    }
}

/// Min, mean and max of a series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Range {
    /// Smallest value.
    pub min: f64,
    /// Mean.
    pub avg: f64,
    /// Largest value.
    pub max: f64,
}

impl Range {
    fn of(values: impl IntoIterator<Item = f64>) -> Self {
        let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0_usize);
        for v in values {
            min = min.min(v);
            max = max.max(v);
            sum += v;
            n += 1;
        }
        if n == 0 {
            return Self::default();
        }
        Self {
            min,
            avg: sum / n as f64,
            max,
        }
    }
}

/// How time grows with pool size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalabilityAnalysis {
    /// Fitted bucket.
    pub complexity: Complexity,
    /// log-log slope of average time against pool size.
    pub slope: Option<f64>,
    /// Selections per second across pool sizes.
    pub throughput: Range,
}

/// Failed selections by cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureAnalysis {
    /// Ladder ran out of time.
    pub timeout: usize,
    /// Pool too uniform to fill.
    pub insufficient_diversity: usize,
    /// Anything else.
    pub other: usize,
}

/// Diversity and failure statistics across all runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    /// Diversity score spread.
    pub diversity: Range,
    /// Selections returning exactly the target count.
    pub perfect: usize,
    /// Selections returning some but fewer than the target.
    pub partial: usize,
    /// Failed selections.
    pub failures: usize,
    /// Failures by cause.
    pub failure_analysis: FailureAnalysis,
}

/// Area a recommendation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Success rate.
    Reliability,
    /// Selection time.
    Performance,
    /// Growth with pool size.
    Scalability,
}

/// Suggested follow-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Area.
    pub kind: RecommendationKind,
    /// Advice.
    pub message: String,
}

/// Totals across every pool size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressSummary {
    /// Selections run.
    pub total_selections: usize,
    /// Fraction that succeeded.
    pub overall_success_rate: f64,
    /// Mean selection time.
    pub average_selection_time_ms: f64,
    /// Fastest selection.
    pub min_selection_time_ms: f64,
    /// Slowest selection.
    pub max_selection_time_ms: f64,
    /// Wall time for the whole run.
    pub total_test_time_ms: f64,
}

/// Everything a stress run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StressReport {
    /// Base seed.
    pub seed: u32,
    /// Items requested per selection.
    pub target_count: usize,
    /// Per pool size results.
    pub cases: Vec<PoolSizeCase>,
    /// Totals.
    pub summary: StressSummary,
    /// Complexity fit.
    pub scalability: ScalabilityAnalysis,
    /// Diversity and failures.
    pub quality: QualityMetrics,
    /// Follow-ups.
    pub recommendations: Vec<Recommendation>,
    /// Selector metrics at the end of the run.
    pub selector_metrics: MetricsSnapshot,
}

impl StressReport {
    /// Assemble a report from finished cases.
    pub fn build(
        seed: u32,
        target_count: usize,
        cases: Vec<PoolSizeCase>,
        total_test_time_ms: f64,
        selector_metrics: MetricsSnapshot,
    ) -> Self {
        let outcomes: Vec<&SelectionOutcome> = cases.iter().flat_map(|c| &c.outcomes).collect();
        let times = Range::of(outcomes.iter().map(|o| o.time_ms));
        let total = outcomes.len();
        let successes = outcomes.iter().filter(|o| o.success).count();
        let summary = StressSummary {
            total_selections: total,
            overall_success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64
            },
            average_selection_time_ms: times.avg,
            min_selection_time_ms: times.min,
            max_selection_time_ms: times.max,
            total_test_time_ms,
        };
        let scalability = analyze_scalability(&cases);
        let quality = analyze_quality(&outcomes, target_count);
        let recommendations = recommendations(&summary, &scalability);

        Self {
            seed,
            target_count,
            cases,
            summary,
            scalability,
            quality,
            recommendations,
            selector_metrics,
        }
    }

    /// Markdown rendering for humans.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;
        let _ = writeln!(out, "# Diversity Selection Stress Report\n");
        let _ = writeln!(out, "## Summary");
        let _ = writeln!(out, "- Seed: {}", self.seed);
        let _ = writeln!(out, "- Total selections: {}", s.total_selections);
        let _ = writeln!(
            out,
            "- Success rate: {:.1}%",
            s.overall_success_rate * 100.0
        );
        let _ = writeln!(
            out,
            "- Selection time: avg {:.2}ms, min {:.2}ms, max {:.2}ms",
            s.average_selection_time_ms, s.min_selection_time_ms, s.max_selection_time_ms
        );
        let _ = writeln!(out, "- Total test time: {:.0}ms\n", s.total_test_time_ms);

        let _ = writeln!(out, "## Scalability");
        let _ = writeln!(out, "- Time complexity: {}", self.scalability.complexity);
        if let Some(slope) = self.scalability.slope {
            let _ = writeln!(out, "- log-log slope: {slope:.3}");
        }
        let t = &self.scalability.throughput;
        let _ = writeln!(
            out,
            "- Throughput range: {:.1} - {:.1} selections/sec (avg {:.1})\n",
            t.min, t.max, t.avg
        );

        let _ = writeln!(out, "| Pool size | Runs | Avg ms | Min ms | Max ms | Success |");
        let _ = writeln!(out, "|---:|---:|---:|---:|---:|---:|");
        for c in &self.cases {
            let _ = writeln!(
                out,
                "| {} | {} | {:.3} | {:.3} | {:.3} | {:.1}% |",
                c.candidate_count,
                c.iterations,
                c.avg_time_ms,
                c.min_time_ms,
                c.max_time_ms,
                c.success_rate * 100.0
            );
        }

        let q = &self.quality;
        let _ = writeln!(out, "\n## Quality");
        let _ = writeln!(out, "- Average diversity score: {:.3}", q.diversity.avg);
        let _ = writeln!(out, "- Perfect selections: {}", q.perfect);
        let _ = writeln!(out, "- Partial selections: {}", q.partial);
        let _ = writeln!(
            out,
            "- Failures: {} (timeout {}, insufficient diversity {}, other {})",
            q.failures,
            q.failure_analysis.timeout,
            q.failure_analysis.insufficient_diversity,
            q.failure_analysis.other
        );

        let _ = writeln!(out, "\n## Recommendations");
        if self.recommendations.is_empty() {
            let _ = writeln!(out, "- None");
        }
        for r in &self.recommendations {
            let _ = writeln!(out, "- {}", r.message);
        }
        out
    }
}

/// Classify growth of average selection time with pool size.
#[must_use]
pub fn analyze_scalability(cases: &[PoolSizeCase]) -> ScalabilityAnalysis {
    let throughput = Range::of(
        cases
            .iter()
            .map(|c| 1000.0 / c.avg_time_ms.max(MIN_TIME_MS)),
    );
    let slope = log_log_slope(cases);
    ScalabilityAnalysis {
        complexity: slope.map_or(Complexity::InsufficientData, Complexity::from_slope),
        slope,
        throughput,
    }
}

fn log_log_slope(cases: &[PoolSizeCase]) -> Option<f64> {
    if cases.len() < MIN_CASES_FOR_REGRESSION {
        return None;
    }
    let points: Vec<(f64, f64)> = cases
        .iter()
        .map(|c| {
            (
                (c.candidate_count as f64).ln(),
                c.avg_time_ms.max(MIN_TIME_MS).ln(),
            )
        })
        .collect();
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();
    let sum_x2: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let denom = n.mul_add(sum_x2, -(sum_x * sum_x));
    if denom.abs() < f64::EPSILON {
        return None;
    }
    Some(n.mul_add(sum_xy, -(sum_x * sum_y)) / denom)
}

/// Diversity and completeness of the selections.
#[must_use]
pub fn analyze_quality(outcomes: &[&SelectionOutcome], target_count: usize) -> QualityMetrics {
    let failed: Vec<&SelectionOutcome> = outcomes.iter().copied().filter(|o| !o.success).collect();
    QualityMetrics {
        diversity: Range::of(outcomes.iter().map(|o| o.diversity_score)),
        perfect: outcomes.iter().filter(|o| o.selected == target_count).count(),
        partial: outcomes
            .iter()
            .filter(|o| o.selected > 0 && o.selected < target_count)
            .count(),
        failures: failed.len(),
        failure_analysis: attribute_failures(&failed),
    }
}

/// Bucket failed selections by the first matching warning class.
#[must_use]
pub fn attribute_failures(failed: &[&SelectionOutcome]) -> FailureAnalysis {
    let mut analysis = FailureAnalysis::default();
    for outcome in failed {
        if outcome
            .warnings
            .iter()
            .any(|w| matches!(w, SelectionWarning::Timeout { .. }))
        {
            analysis.timeout += 1;
        } else if outcome.warnings.iter().any(SelectionWarning::is_diversity_shortfall) {
            analysis.insufficient_diversity += 1;
        } else {
            analysis.other += 1;
        }
    }
    analysis
}

/// Advice derived from summary and scalability.
#[must_use]
pub fn recommendations(
    summary: &StressSummary,
    scalability: &ScalabilityAnalysis,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if summary.total_selections > 0 && summary.overall_success_rate < SUCCESS_RATE_FLOOR {
        out.push(Recommendation {
            kind: RecommendationKind::Reliability,
            message: format!(
                "Success rate is {:.1}%; review the threshold ladder settings",
                summary.overall_success_rate * 100.0
            ),
        });
    }
    if summary.average_selection_time_ms > SLOW_SELECTION_MS {
        out.push(Recommendation {
            kind: RecommendationKind::Performance,
            message: format!(
                "Average selection time is {:.1}ms; consider optimizing the selector",
                summary.average_selection_time_ms
            ),
        });
    }
    if scalability.complexity.is_at_least_quadratic() {
        out.push(Recommendation {
            kind: RecommendationKind::Scalability,
            message: format!(
                "Time complexity is {}; take care with large candidate pools",
                scalability.complexity
            ),
        });
    }
    out
}
