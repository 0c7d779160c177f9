//! Seeded linear congruential generator with derived distributions.
//!
//! The recurrence and its constants are a compatibility contract: downstream
//! consumers seed the generator and expect specific output sequences, so
//! `MULTIPLIER`, `INCREMENT` and the 2^32 modulus must never change.
//!
//! Every derived draw is built only from [`DeterministicRandom::next_f64`], and
//! no wall-clock or OS entropy is consulted anywhere. Two instances built from
//! the same seed and driven with the same call sequence stay bit-identical.

#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScsError};

/// LCG multiplier (Numerical Recipes).
pub const MULTIPLIER: u32 = 1_664_525;
/// LCG increment (Numerical Recipes).
pub const INCREMENT: u32 = 1_013_904_223;
/// Modulus as a float divisor; the integer recurrence wraps at 2^32.
pub const MODULUS: f64 = 4_294_967_296.0;
/// Seed used when the caller does not supply one.
pub const DEFAULT_SEED: u32 = 12_345;

/// Snapshot of the generator's internal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomState {
    /// Original seed, restored by `reset`.
    pub seed: u32,
    /// Mutable generator state.
    pub current: u32,
}

/// Deterministic pseudo-random source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicRandom {
    seed: u32,
    current: u32,
}

impl Default for DeterministicRandom {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl DeterministicRandom {
    /// Create a generator whose first state is `seed`.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            seed,
            current: seed,
        }
    }

    /// Seed this generator was created with (or last re-seeded to).
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    /// Advance the recurrence and return the raw 32-bit state.
    #[inline]
    fn step(&mut self) -> u32 {
        self.current = self
            .current
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.current
    }

    /// Uniform float in `[0, 1)`.
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / MODULUS
    }

    /// Uniform integer in `[min, max]`, both ends inclusive.
    pub fn next_int(&mut self, min: i64, max: i64) -> Result<i64> {
        if min > max {
            return Err(ScsError::invalid_input(
                "next_int",
                format!("min {min} is greater than max {max}"),
            ));
        }
        // Widened so spans up to 2^64 neither overflow nor wrap to zero.
        let span = (i128::from(max) - i128::from(min) + 1) as f64;
        let offset = (self.next_f64() * span).floor() as i128;
        Ok((i128::from(min) + offset).min(i128::from(max)) as i64)
    }

    /// Uniform float in `[min, max)`.
    pub fn next_float(&mut self, min: f64, max: f64) -> Result<f64> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(ScsError::invalid_input(
                "next_float",
                format!("min {min} is greater than max {max}"),
            ));
        }
        Ok(self.next_f64().mul_add(max - min, min))
    }

    /// `true` with probability `p`.
    pub fn next_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform pick from a non-empty slice.
    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T> {
        if items.is_empty() {
            return Err(ScsError::invalid_input("choice", "cannot choose from an empty slice"));
        }
        let idx = self.index_up_to(items.len() - 1);
        Ok(&items[idx])
    }

    /// Fisher–Yates shuffle into a new vector; the input is left untouched.
    pub fn shuffle<T: Clone>(&mut self, items: &[T]) -> Vec<T> {
        let mut out = items.to_vec();
        for i in (1..out.len()).rev() {
            let j = self.index_up_to(i);
            out.swap(i, j);
        }
        out
    }

    /// `count` distinct elements in shuffle order.
    pub fn sample<T: Clone>(&mut self, items: &[T], count: usize) -> Result<Vec<T>> {
        if count > items.len() {
            return Err(ScsError::invalid_input(
                "sample",
                format!("count {count} exceeds population {}", items.len()),
            ));
        }
        let mut shuffled = self.shuffle(items);
        shuffled.truncate(count);
        Ok(shuffled)
    }

    /// Pick one item with probability proportional to its weight.
    ///
    /// A single threshold is drawn; the last item absorbs floating-point
    /// residue when the cumulative walk falls short.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [T], weights: &[f64]) -> Result<&'a T> {
        if items.is_empty() || weights.is_empty() {
            return Err(ScsError::invalid_input(
                "weighted_choice",
                "items and weights must be non-empty",
            ));
        }
        if items.len() != weights.len() {
            return Err(ScsError::invalid_input(
                "weighted_choice",
                format!(
                    "{} items but {} weights",
                    items.len(),
                    weights.len()
                ),
            ));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ScsError::invalid_input(
                "weighted_choice",
                format!("weights must be finite and non-negative, got {bad}"),
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(ScsError::invalid_input(
                "weighted_choice",
                "total weight must be positive",
            ));
        }

        let threshold = self.next_f64() * total;
        let mut cumulative = 0.0;
        for (item, weight) in items.iter().zip(weights) {
            cumulative += weight;
            if threshold < cumulative {
                return Ok(item);
            }
        }
        Ok(&items[items.len() - 1])
    }

    /// Normal draw via Box–Muller.
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        if std_dev.is_nan() || std_dev < 0.0 {
            return Err(ScsError::invalid_input(
                "gaussian",
                format!("std_dev must be non-negative, got {std_dev}"),
            ));
        }
        // ln(0) would blow up; the smallest positive double keeps the draw finite.
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
        Ok(z.mul_add(std_dev, mean))
    }

    /// Exponential draw via inverse CDF.
    pub fn exponential(&mut self, lambda: f64) -> Result<f64> {
        if lambda.is_nan() || lambda <= 0.0 {
            return Err(ScsError::invalid_input(
                "exponential",
                format!("lambda must be positive, got {lambda}"),
            ));
        }
        Ok(-(1.0 - self.next_f64()).ln() / lambda)
    }

    /// Restore the state to the original seed.
    pub fn reset(&mut self) {
        self.current = self.seed;
    }

    /// Replace both seed and state.
    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
        self.current = seed;
    }

    /// Snapshot for [`Self::set_state`].
    #[must_use]
    pub const fn state(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            current: self.current,
        }
    }

    /// Restore a snapshot from [`Self::state`].
    pub fn set_state(&mut self, state: RandomState) {
        self.seed = state.seed;
        self.current = state.current;
    }

    /// Uniform index in `[0, upper]` following the `next_int` formula.
    fn index_up_to(&mut self, upper: usize) -> usize {
        let span = (upper + 1) as f64;
        (self.next_f64() * span).floor() as usize
    }
}

impl RngCore for DeterministicRandom {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.step());
        let lo = u64::from(self.step());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(4) {
            let bytes = self.step().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_draw_matches_recurrence() {
        let mut rng = DeterministicRandom::new(42);
        let expected_state = (1_664_525_u64 * 42 + 1_013_904_223) % (1_u64 << 32);
        let value = rng.next_f64();
        assert_eq!(value, expected_state as f64 / MODULUS);
        assert_eq!(u64::from(rng.state().current), expected_state);

        let second_state = (1_664_525_u64 * expected_state + 1_013_904_223) % (1_u64 << 32);
        assert_eq!(rng.next_f64(), second_state as f64 / MODULUS);
    }

    #[test]
    fn same_seed_same_stream() {
        let mut a = DeterministicRandom::new(7);
        let mut b = DeterministicRandom::new(7);
        for _ in 0..10_000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn reset_replays_from_seed() {
        let mut rng = DeterministicRandom::new(99);
        let first: Vec<f64> = (0..5).map(|_| rng.next_f64()).collect();
        rng.reset();
        let again: Vec<f64> = (0..5).map(|_| rng.next_f64()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn state_round_trip_does_not_reset() {
        let mut rng = DeterministicRandom::new(5);
        for _ in 0..17 {
            rng.next_f64();
        }
        let snapshot = rng.state();
        let fork = rng.clone();
        let expected: Vec<f64> = (0..4).map(|_| rng.next_f64()).collect();

        let mut restored = DeterministicRandom::new(1);
        restored.set_state(snapshot);
        let replayed: Vec<f64> = (0..4).map(|_| restored.next_f64()).collect();
        assert_eq!(expected, replayed);

        let mut fork = fork;
        let forked: Vec<f64> = (0..4).map(|_| fork.next_f64()).collect();
        assert_eq!(expected, forked);
        assert_eq!(restored.seed(), 5);
    }

    #[test]
    fn set_seed_overwrites_seed_and_state() {
        let mut rng = DeterministicRandom::new(1);
        rng.next_f64();
        rng.set_seed(42);
        assert_eq!(rng.state(), RandomState { seed: 42, current: 42 });
        assert_eq!(rng, DeterministicRandom::new(42));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let mut rng = DeterministicRandom::new(1);
        assert_eq!(rng.next_int(5, 3).unwrap_err().code(), "SCS-1101");
        assert!(rng.next_float(2.0, 1.0).is_err());
        assert!(rng.exponential(0.0).is_err());
        assert!(rng.exponential(-1.0).is_err());
        assert!(rng.gaussian(0.0, -1.0).is_err());
        assert!(rng.choice::<u8>(&[]).is_err());
        assert!(rng.sample(&[1, 2, 3], 4).is_err());
    }

    #[test]
    fn degenerate_ranges_return_the_bound() {
        let mut rng = DeterministicRandom::new(3);
        for _ in 0..100 {
            assert_eq!(rng.next_int(4, 4).unwrap(), 4);
            assert!((rng.next_float(2.5, 2.5).unwrap() - 2.5).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn full_width_ranges_do_not_overflow() {
        let mut rng = DeterministicRandom::new(11);
        let mut saw_negative = false;
        let mut saw_positive = false;
        for _ in 0..1_000 {
            let wide = rng.next_int(i64::MIN, i64::MAX).unwrap();
            saw_negative |= wide < 0;
            saw_positive |= wide > 0;
            assert!(rng.next_int(0, i64::MAX).unwrap() >= 0);
            let top = rng.next_int(i64::MAX - 1, i64::MAX).unwrap();
            assert!(top >= i64::MAX - 1);
        }
        assert!(saw_negative && saw_positive);
    }

    #[test]
    fn weighted_choice_validation() {
        let mut rng = DeterministicRandom::new(1);
        assert!(rng.weighted_choice(&['a', 'b'], &[1.0]).is_err());
        assert!(rng.weighted_choice::<char>(&[], &[]).is_err());
        assert!(rng.weighted_choice(&['a', 'b'], &[1.0, -1.0]).is_err());
        assert!(rng.weighted_choice(&['a', 'b'], &[0.0, 0.0]).is_err());
        assert!(rng.weighted_choice(&['a', 'b'], &[f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn weighted_choice_distribution() {
        let mut rng = DeterministicRandom::new(2024);
        let mut b_count = 0_u32;
        for _ in 0..10_000 {
            if *rng.weighted_choice(&['a', 'b'], &[1.0, 3.0]).unwrap() == 'b' {
                b_count += 1;
            }
        }
        let freq = f64::from(b_count) / 10_000.0;
        assert!((freq - 0.75).abs() < 0.05, "b frequency {freq}");
    }

    #[test]
    fn zero_weight_items_are_never_chosen() {
        let mut rng = DeterministicRandom::new(8);
        for _ in 0..1_000 {
            let pick = rng.weighted_choice(&["never", "always"], &[0.0, 2.0]).unwrap();
            assert_eq!(*pick, "always");
        }
    }

    #[test]
    fn shuffle_leaves_input_untouched() {
        let mut rng = DeterministicRandom::new(11);
        let input = vec![1, 2, 3, 4, 5, 6];
        let shuffled = rng.shuffle(&input);
        assert_eq!(input, vec![1, 2, 3, 4, 5, 6]);
        let mut sorted = shuffled;
        sorted.sort_unstable();
        assert_eq!(sorted, input);
    }

    #[test]
    fn sample_is_prefix_of_shuffle() {
        let items: Vec<u32> = (0..20).collect();
        let mut a = DeterministicRandom::new(77);
        let mut b = DeterministicRandom::new(77);
        let sampled = a.sample(&items, 5).unwrap();
        let shuffled = b.shuffle(&items);
        assert_eq!(sampled, shuffled[..5]);
    }

    #[test]
    fn gaussian_moments_are_plausible() {
        let mut rng = DeterministicRandom::new(31);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.gaussian(10.0, 2.0).unwrap()).collect();
        let mean = draws.iter().sum::<f64>() / f64::from(n);
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / f64::from(n);
        assert!((mean - 10.0).abs() < 0.1, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {}", var.sqrt());
    }

    #[test]
    fn exponential_mean_is_inverse_rate() {
        let mut rng = DeterministicRandom::new(13);
        let n = 20_000;
        let mean = (0..n).map(|_| rng.exponential(4.0).unwrap()).sum::<f64>() / f64::from(n);
        assert!((mean - 0.25).abs() < 0.02, "mean {mean}");
    }

    #[test]
    fn rng_core_stream_tracks_state() {
        let mut rng = DeterministicRandom::new(42);
        let raw = rng.next_u32();
        assert_eq!(raw, rng.state().current);
        let mut buf = [0_u8; 7];
        rng.fill_bytes(&mut buf);
        let mut replay = DeterministicRandom::new(42);
        replay.next_u32();
        let mut expected = Vec::new();
        expected.extend_from_slice(&replay.next_u32().to_le_bytes());
        expected.extend_from_slice(&replay.next_u32().to_le_bytes()[..3]);
        assert_eq!(buf.to_vec(), expected);
    }
}
