#![forbid(unsafe_code)]

//! Scenario sampler (scs): reproducible randomness and diverse selection.
//!
//! Four pieces:
//! 1. **Deterministic RNG**: a seeded LCG with derived distributions, so any
//!    run can be replayed from its seed
//! 2. **Diversity selector**: picks mutually dissimilar candidates through a
//!    relaxing threshold ladder, always returning a usable result
//! 3. **Stress harness**: drives the selector across pool sizes and reports
//!    scalability and quality
//! 4. **Rare-event monitor**: compares observed 用九/用六 frequency with its
//!    closed-form probability and raises alerts on drift
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use scenario_sampler::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use scenario_sampler::core::config::Config;
//! use scenario_sampler::diversity::selector::DiversitySelector;
//! ```

pub mod prelude;

pub mod core;
pub mod diversity;
pub mod logger;
pub mod monitor;
pub mod rng;
pub mod stress;
