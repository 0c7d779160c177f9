//! Stress testing and benchmarking of the selector and RNG.

pub mod analysis;
pub mod bench;
pub mod harness;
