//! Rare compound event model: closed-form probability of 用九/用六 versus
//! observed frequency.
//!
//! The event needs one of the 2 qualifying hexagrams (乾 or 坤) out of 64 and
//! all 6 lines changing, each with probability 0.25, so
//! `P = (2/64) * 0.25^6 = 7.62939453125e-6`. Observed counts are compared with
//! a two-sided normal-approximation binomial test (continuity corrected) and
//! a Wilson score interval, which stays well-behaved near zero.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::{Overlay, TelemetryEvent};
use super::normal::two_sided_p_value;
use crate::core::errors::{Result, ScsError};

/// Hexagrams in the system.
pub const TOTAL_HEXAGRAMS: u32 = 64;
/// Hexagrams that can carry an overlay.
pub const QUALIFYING_HEXAGRAMS: u32 = 2;
/// Lines per hexagram.
pub const LINES: i32 = 6;
/// Chance a single line changes.
pub const LINE_CHANGE_PROBABILITY: f64 = 0.25;
/// Samples required before the binomial test is attempted.
pub const MIN_SAMPLES_FOR_TEST: u64 = 100;
/// p-value below which a test result is flagged significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Factors of the theoretical probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityComponents {
    /// See [`TOTAL_HEXAGRAMS`].
    pub total_hexagrams: u32,
    /// See [`QUALIFYING_HEXAGRAMS`].
    pub qualifying_hexagrams: u32,
    /// See [`LINES`].
    pub lines: i32,
    /// See [`LINE_CHANGE_PROBABILITY`].
    pub line_change_probability: f64,
    /// `qualifying / total`.
    pub starting_state_probability: f64,
    /// `line_change_probability ^ lines`.
    pub all_lines_change_probability: f64,
}

/// Expected overlay rate and how it was derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalProbability {
    /// Per-event probability.
    pub theoretical: f64,
    /// Human form, e.g. `0.000763%`.
    pub percentage: String,
    /// Expected occurrences per million readings, rounded.
    pub per_million: u64,
    /// Inputs to the product.
    pub components: ProbabilityComponents,
}

/// Closed-form probability of the rare compound event.
#[must_use]
pub fn theoretical_probability() -> TheoreticalProbability {
    let starting = f64::from(QUALIFYING_HEXAGRAMS) / f64::from(TOTAL_HEXAGRAMS);
    let all_lines = LINE_CHANGE_PROBABILITY.powi(LINES);
    let theoretical = starting * all_lines;
    TheoreticalProbability {
        theoretical,
        percentage: format!("{:.6}%", theoretical * 100.0),
        per_million: (theoretical * 1_000_000.0).round() as u64,
        components: ProbabilityComponents {
            total_hexagrams: TOTAL_HEXAGRAMS,
            qualifying_hexagrams: QUALIFYING_HEXAGRAMS,
            lines: LINES,
            line_change_probability: LINE_CHANGE_PROBABILITY,
            starting_state_probability: starting,
            all_lines_change_probability: all_lines,
        },
    }
}

/// Observed rare-event counts over a telemetry window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedStats {
    /// Events counted.
    pub total: u64,
    /// Events with the use-nine overlay.
    pub use_nine: u64,
    /// Events with the use-six overlay.
    pub use_six: u64,
    /// `use_nine + use_six`.
    pub combined: u64,
    /// `combined / total`, `0.0` for an empty window.
    pub rate: f64,
    /// Combined rate as a percent string.
    pub percentage: String,
    /// Combined rate per million events.
    pub per_million: f64,
}

/// Count rare-event overlays in `events`.
pub fn measure_actual<'a, I>(events: I) -> ObservedStats
where
    I: IntoIterator<Item = &'a TelemetryEvent>,
{
    let (mut total, mut use_nine, mut use_six) = (0_u64, 0_u64, 0_u64);
    for event in events {
        total += 1;
        match event.overlay {
            Some(Overlay::UseNine) => use_nine += 1,
            Some(Overlay::UseSix) => use_six += 1,
            Some(Overlay::Unrecognized) | None => {}
        }
    }
    let combined = use_nine + use_six;
    let rate = if total == 0 {
        0.0
    } else {
        combined as f64 / total as f64
    };
    ObservedStats {
        total,
        use_nine,
        use_six,
        combined,
        rate,
        percentage: format!("{:.6}%", rate * 100.0),
        per_million: rate * 1_000_000.0,
    }
}

/// Which test produced a [`TestResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Too few samples; no statistic computed.
    InsufficientData,
    /// Continuity-corrected normal approximation to the binomial.
    BinomialNormalApproximation,
}

/// Confidence bucket of a p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    /// p below 0.01.
    #[serde(rename = "99%")]
    NinetyNine,
    /// p below 0.05.
    #[serde(rename = "95%")]
    NinetyFive,
    /// Not significant.
    #[serde(rename = "none")]
    None,
}

impl ConfidenceLabel {
    fn from_p_value(p: f64) -> Self {
        if p < 0.01 {
            Self::NinetyNine
        } else if p < 0.05 {
            Self::NinetyFive
        } else {
            Self::None
        }
    }
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NinetyNine => write!(f, "99%"),
            Self::NinetyFive => write!(f, "95%"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Outcome of [`statistical_test`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test that ran.
    pub test: TestKind,
    /// Events tested.
    pub sample_size: u64,
    /// Overlay events seen.
    pub observed: u64,
    /// Overlay events expected.
    pub expected: f64,
    /// Continuity-corrected |z|; `None` without enough data.
    pub z_score: Option<f64>,
    /// Two-sided p-value.
    pub p_value: Option<f64>,
    /// Whether p fell below 0.05.
    pub significant: bool,
    /// Confidence bucket.
    pub confidence: ConfidenceLabel,
    /// Human summary.
    pub message: String,
}

/// Two-sided binomial test of `observed.combined` against the theory, gated
/// at [`MIN_SAMPLES_FOR_TEST`].
#[must_use]
pub fn statistical_test(observed: &ObservedStats, theoretical: &TheoreticalProbability) -> TestResult {
    statistical_test_with_min(observed, theoretical, MIN_SAMPLES_FOR_TEST)
}

/// [`statistical_test`] with an explicit sample floor.
#[must_use]
pub fn statistical_test_with_min(
    observed: &ObservedStats,
    theoretical: &TheoreticalProbability,
    min_samples: u64,
) -> TestResult {
    let n = observed.total;
    let p = theoretical.theoretical;
    let expected = n as f64 * p;

    if n < min_samples {
        return TestResult {
            test: TestKind::InsufficientData,
            sample_size: n,
            observed: observed.combined,
            expected,
            z_score: None,
            p_value: None,
            significant: false,
            confidence: ConfidenceLabel::None,
            message: format!("need at least {min_samples} samples, have {n}"),
        };
    }

    let std_dev = (expected * (1.0 - p)).sqrt();
    let corrected = ((observed.combined as f64 - expected).abs() - 0.5).max(0.0);
    let z = if std_dev > 0.0 { corrected / std_dev } else { 0.0 };
    let p_value = two_sided_p_value(z);
    let significant = p_value < SIGNIFICANCE_LEVEL;
    let message = if significant {
        format!(
            "observed {} vs expected {expected:.3}: deviation is significant (p={p_value:.3e})",
            observed.combined
        )
    } else {
        format!(
            "observed {} vs expected {expected:.3}: consistent with theory (p={p_value:.3})",
            observed.combined
        )
    };

    TestResult {
        test: TestKind::BinomialNormalApproximation,
        sample_size: n,
        observed: observed.combined,
        expected,
        z_score: Some(z),
        p_value: Some(p_value),
        significant,
        confidence: ConfidenceLabel::from_p_value(p_value),
        message,
    }
}

/// Supported interval confidence levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConfidenceLevel {
    /// 95%.
    #[default]
    #[serde(rename = "0.95")]
    P95,
    /// 99%.
    #[serde(rename = "0.99")]
    P99,
    /// 99.9%.
    #[serde(rename = "0.999")]
    P999,
}

impl ConfidenceLevel {
    /// Two-sided critical value.
    #[must_use]
    pub const fn z(self) -> f64 {
        match self {
            Self::P95 => 1.96,
            Self::P99 => 2.576,
            Self::P999 => 3.291,
        }
    }

    /// Level as a fraction.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::P95 => 0.95,
            Self::P99 => 0.99,
            Self::P999 => 0.999,
        }
    }
}

impl TryFrom<f64> for ConfidenceLevel {
    type Error = ScsError;

    fn try_from(value: f64) -> Result<Self> {
        [Self::P95, Self::P99, Self::P999]
            .into_iter()
            .find(|level| (level.as_f64() - value).abs() < 1e-9)
            .ok_or_else(|| {
                ScsError::invalid_input(
                    "confidence_interval",
                    format!("unsupported confidence level {value}; use 0.95, 0.99 or 0.999"),
                )
            })
    }
}

/// Wilson score interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
    /// `upper - lower`.
    pub width: f64,
    /// Level used.
    pub confidence: f64,
}

/// Wilson score interval for `count` successes in `total` trials.
///
/// An empty sample yields the uninformative `[0, 1]`.
pub fn confidence_interval(
    count: u64,
    total: u64,
    level: ConfidenceLevel,
) -> Result<ConfidenceInterval> {
    if count > total {
        return Err(ScsError::invalid_input(
            "confidence_interval",
            format!("count {count} exceeds total {total}"),
        ));
    }
    if total == 0 {
        return Ok(ConfidenceInterval {
            lower: 0.0,
            upper: 1.0,
            width: 1.0,
            confidence: level.as_f64(),
        });
    }

    let n = total as f64;
    let p_hat = count as f64 / n;
    let z = level.z();
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p_hat + z2 / (2.0 * n)) / denom;
    let margin = z * (p_hat * (1.0 - p_hat) / n + z2 / (4.0 * n * n)).sqrt() / denom;

    // Rounding can push a bound past p_hat at the edges (count 0 or total).
    let lower = (center - margin).max(0.0).min(p_hat);
    let upper = (center + margin).min(1.0).max(p_hat);
    Ok(ConfidenceInterval {
        lower,
        upper,
        width: upper - lower,
        confidence: level.as_f64(),
    })
}
