//! Property tests for the deterministic RNG and the Wilson interval.

use std::collections::HashSet;

use proptest::prelude::*;

use scenario_sampler::monitor::rare_event::{ConfidenceLevel, confidence_interval};
use scenario_sampler::rng::lcg::DeterministicRandom;

proptest! {
    #[test]
    fn same_seed_same_stream(seed in any::<u32>()) {
        let mut a = DeterministicRandom::new(seed);
        let mut b = DeterministicRandom::new(seed);
        for _ in 0..1_000 {
            prop_assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
        prop_assert_eq!(a.next_int(-5, 5).unwrap(), b.next_int(-5, 5).unwrap());
        prop_assert_eq!(a.state(), b.state());
    }

    #[test]
    fn int_and_float_stay_in_range(
        seed in any::<u32>(),
        min in -1_000_i64..1_000,
        span in 0_i64..500,
    ) {
        let max = min + span;
        let mut rng = DeterministicRandom::new(seed);
        for _ in 0..500 {
            let i = rng.next_int(min, max).unwrap();
            prop_assert!((min..=max).contains(&i));
            let f = rng.next_float(min as f64, max as f64 + 1.0).unwrap();
            prop_assert!(f >= min as f64 && f < max as f64 + 1.0);
        }
    }

    #[test]
    fn shuffle_is_permutation(seed in any::<u32>(), items in prop::collection::vec(any::<u16>(), 0..64)) {
        let mut rng = DeterministicRandom::new(seed);
        let shuffled = rng.shuffle(&items);
        let mut a = items.clone();
        let mut b = shuffled;
        a.sort_unstable();
        b.sort_unstable();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn sample_is_distinct_subset(seed in any::<u32>(), len in 0_usize..50, k in 0_usize..60) {
        let items: Vec<usize> = (0..len).collect();
        let mut rng = DeterministicRandom::new(seed);
        match rng.sample(&items, k) {
            Ok(picked) => {
                prop_assert!(k <= len);
                prop_assert_eq!(picked.len(), k);
                let unique: HashSet<usize> = picked.iter().copied().collect();
                prop_assert_eq!(unique.len(), k);
                prop_assert!(picked.iter().all(|p| *p < len));
            }
            Err(_) => prop_assert!(k > len),
        }
    }

    #[test]
    fn wilson_interval_contains_estimate(total in 1_u64..1_000_000, frac in 0.0_f64..=1.0) {
        let count = ((total as f64) * frac).floor() as u64;
        for level in [ConfidenceLevel::P95, ConfidenceLevel::P99, ConfidenceLevel::P999] {
            let ci = confidence_interval(count, total, level).unwrap();
            let p = count as f64 / total as f64;
            prop_assert!(0.0 <= ci.lower);
            prop_assert!(ci.lower <= p);
            prop_assert!(p <= ci.upper);
            prop_assert!(ci.upper <= 1.0);
        }
    }
}

#[test]
fn hundred_thousand_draws_stay_in_unit_interval() {
    let mut rng = DeterministicRandom::new(42);
    for _ in 0..100_000 {
        let x = rng.next_f64();
        assert!((0.0..1.0).contains(&x));
    }
}

#[test]
fn weighted_choice_tracks_weights() {
    let mut rng = DeterministicRandom::new(42);
    let items = ["a", "b"];
    let weights = [1.0, 3.0];
    let draws = 10_000;
    let b_hits = (0..draws)
        .filter(|_| *rng.weighted_choice(&items, &weights).unwrap() == "b")
        .count();
    let freq = b_hits as f64 / f64::from(draws);
    assert!((freq - 0.75).abs() < 0.05, "freq={freq}");
}

#[test]
fn reset_replays_from_seed() {
    let mut rng = DeterministicRandom::new(99);
    let first: Vec<u64> = (0..10).map(|_| rng.next_f64().to_bits()).collect();
    rng.reset();
    let again: Vec<u64> = (0..10).map(|_| rng.next_f64().to_bits()).collect();
    assert_eq!(first, again);
}
