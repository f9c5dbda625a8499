//! # Random sources for request sizing and the settlement lottery.
//!
//! [`RandomSource`] is the seam between the actors and randomness. Every actor
//! may call it concurrently, so implementations must be `Send + Sync`.
//!
//! - [`ThreadRandom`]: the thread-local generator from `rand` (default).
//! - [`SeededRandom`]: a seeded `StdRng` behind a mutex, for reproducible runs.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of bounded integers and weighted coin flips.
pub trait RandomSource: Send + Sync + 'static {
    /// Returns an integer in `[1, limit-1]`.
    ///
    /// Limits below 2 leave an empty range; implementations return 1.
    fn next_bounded(&self, limit: u32) -> u32;

    /// Returns `true` with probability `weight` (clamped to `[0, 1]`).
    fn lottery(&self, weight: f64) -> bool;
}

/// Thread-local generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_bounded(&self, limit: u32) -> u32 {
        if limit < 2 {
            return 1;
        }
        rand::rng().random_range(1..limit)
    }

    fn lottery(&self, weight: f64) -> bool {
        rand::rng().random_bool(clamp_weight(weight))
    }
}

/// Seeded generator shared by all actors.
///
/// Draw order across actors still depends on scheduling; the seed only fixes
/// the sequence of values.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    /// Creates a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A panic while holding the lock cannot leave the generator in a bad state.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut rng)
    }
}

impl RandomSource for SeededRandom {
    fn next_bounded(&self, limit: u32) -> u32 {
        if limit < 2 {
            return 1;
        }
        self.with_rng(|rng| rng.random_range(1..limit))
    }

    fn lottery(&self, weight: f64) -> bool {
        self.with_rng(|rng| rng.random_bool(clamp_weight(weight)))
    }
}

/// Panics on its first lottery draw, then never wins.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct PanicOnce {
    fired: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RandomSource for PanicOnce {
    fn next_bounded(&self, _limit: u32) -> u32 {
        1
    }

    fn lottery(&self, _weight: f64) -> bool {
        if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
            panic!("lottery fault");
        }
        false
    }
}

fn clamp_weight(weight: f64) -> f64 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_range() {
        let rnd = ThreadRandom;
        for _ in 0..1_000 {
            let v = rnd.next_bounded(6);
            assert!((1..=5).contains(&v), "value {v} out of [1, 5]");
        }
    }

    #[test]
    fn test_degenerate_limits() {
        assert_eq!(ThreadRandom.next_bounded(0), 1);
        assert_eq!(ThreadRandom.next_bounded(1), 1);
        assert_eq!(ThreadRandom.next_bounded(2), 1);
    }

    #[test]
    fn test_lottery_extremes() {
        let rnd = SeededRandom::new(7);
        for _ in 0..100 {
            assert!(rnd.lottery(1.0));
            assert!(!rnd.lottery(0.0));
            assert!(!rnd.lottery(f64::NAN));
            assert!(rnd.lottery(3.5));
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let a = SeededRandom::new(42);
        let b = SeededRandom::new(42);
        let xs: Vec<_> = (0..20).map(|_| a.next_bounded(10)).collect();
        let ys: Vec<_> = (0..20).map(|_| b.next_bounded(10)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_lottery_weight_is_respected() {
        let rnd = SeededRandom::new(2024);
        let hits = (0..10_000).filter(|_| rnd.lottery(0.8)).count();
        assert!((7_500..8_500).contains(&hits), "hits={hits}");
    }
}
