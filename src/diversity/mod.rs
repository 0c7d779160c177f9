//! Diversity selection: candidate model, distance metric, selector, metrics.

pub mod candidate;
pub mod metrics;
pub mod selector;
pub mod similarity;
