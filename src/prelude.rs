//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use scenario_sampler::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, ScsError};

// Randomness
pub use crate::rng::lcg::{DeterministicRandom, RandomState};

// Diversity
pub use crate::diversity::candidate::{Candidate, PathStep};
pub use crate::diversity::metrics::{MetricsSnapshot, RunningMetrics};
pub use crate::diversity::selector::{
    DiversitySelector, SelectionMetrics, SelectionResult, SelectionWarning,
};
pub use crate::diversity::similarity::{distance, diversity_score, levenshtein, similarity};

// Stress
pub use crate::stress::analysis::{Complexity, StressReport};
pub use crate::stress::bench::{BenchmarkMeasurer, Measurement};
pub use crate::stress::harness::StressTestHarness;

// Monitor
pub use crate::monitor::event::{Overlay, TelemetryEvent};
pub use crate::monitor::rare_event::{
    ConfidenceLevel, TestResult, TheoreticalProbability, confidence_interval, measure_actual,
    statistical_test, theoretical_probability,
};
pub use crate::monitor::realtime::{AnalysisSnapshot, MonitorNotification, RealTimeMonitor};
pub use crate::monitor::store::{JsonlTelemetryStore, MemoryTelemetryStore, TelemetryStore};

// Logging
pub use crate::logger::jsonl::{JsonlWriter, LogEntry};
