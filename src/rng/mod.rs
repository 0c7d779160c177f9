//! Deterministic randomness: seeded LCG and derived distributions.

pub mod lcg;
