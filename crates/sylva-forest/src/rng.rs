//! MT19937 generator and the sampling routines built on it.
//!
//! Integer-only 32-bit Mersenne Twister. Bootstrap resampling and feature
//! subsampling both draw from it so a fixed seed reproduces a forest
//! exactly.

use crate::error::ForestError;

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// Seed used by [`MersenneTwister::default`], the MT19937 reference seed.
pub const DEFAULT_SEED: u32 = 5489;

/// A 32-bit Mersenne Twister (MT19937).
///
/// The state is only advanced through [`next_u32`](Self::next_u32); the same
/// seed followed by the same call sequence yields the same outputs. The
/// generator is not synchronized; give each thread its own instance.
#[derive(Clone)]
pub struct MersenneTwister {
    state: Box<[u32; N]>,
    cursor: usize,
}

impl MersenneTwister {
    /// Create a generator initialized from `seed`.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        let mut rng = Self {
            state: Box::new([0; N]),
            cursor: N,
        };
        rng.seed(seed);
        rng
    }

    /// Reinitialize the state from `seed`, discarding all prior draws.
    pub fn seed(&mut self, seed: u32) {
        self.state[0] = seed;
        for i in 1..N {
            let prev = self.state[i - 1];
            self.state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        self.cursor = N;
    }

    /// Advance the state and return the next 32-bit value.
    pub fn next_u32(&mut self) -> u32 {
        if self.cursor >= N {
            self.twist();
        }
        let mut y = self.state[self.cursor];
        self.cursor += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^= y >> 18;
        y
    }

    /// Return `next_u32() % bound`.
    ///
    /// The modulo bias is accepted. A `bound` of zero returns 0 without
    /// advancing the state.
    pub fn next_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.next_u32() % bound
    }

    /// Regenerate all 624 words of state.
    fn twist(&mut self) {
        let mag01 = |y: u32| if y & 1 == 0 { 0 } else { MATRIX_A };
        for kk in 0..N {
            let y = (self.state[kk] & UPPER_MASK) | (self.state[(kk + 1) % N] & LOWER_MASK);
            self.state[kk] = self.state[(kk + M) % N] ^ (y >> 1) ^ mag01(y);
        }
        self.cursor = 0;
    }
}

impl Default for MersenneTwister {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl std::fmt::Debug for MersenneTwister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MersenneTwister")
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

/// Largest row count a bootstrap draws from uniformly.
pub(crate) const MAX_BOOTSTRAP_SAMPLES: usize = u32::MAX as usize;

/// Reject row counts the 32-bit generator cannot index uniformly.
pub(crate) fn check_bootstrap_size(n_samples: usize) -> Result<(), ForestError> {
    if n_samples > MAX_BOOTSTRAP_SAMPLES {
        return Err(ForestError::TooManySamples {
            n_samples,
            max: MAX_BOOTSTRAP_SAMPLES,
        });
    }
    Ok(())
}

/// Draw `n_samples` indices uniformly from `[0, n_samples)` with replacement.
///
/// Draws are 32-bit: above `u32::MAX` rows the bound saturates and the
/// highest rows are never drawn. Forest training rejects such datasets.
pub fn bootstrap_indices(n_samples: usize, rng: &mut MersenneTwister) -> Vec<usize> {
    let bound = u32::try_from(n_samples).unwrap_or(u32::MAX);
    (0..n_samples)
        .map(|_| rng.next_bounded(bound) as usize)
        .collect()
}

/// Choose `floor(fraction * n_features)` distinct features, returned in
/// ascending order.
///
/// Every feature receives one random key; features are stably ordered by
/// key and the first ones kept. The generator advances by `n_features`
/// draws even when `fraction` is 1.0 and every feature is returned.
pub fn subsample_features(n_features: usize, fraction: f64, rng: &mut MersenneTwister) -> Vec<usize> {
    let take = resolve_feature_count(n_features, fraction);
    let mut keyed: Vec<(u32, usize)> = (0..n_features).map(|f| (rng.next_u32(), f)).collect();
    keyed.sort_by_key(|&(key, _)| key);
    let mut selected: Vec<usize> = keyed.into_iter().take(take).map(|(_, f)| f).collect();
    selected.sort_unstable();
    selected
}

/// Number of features a split search considers for the given fraction.
pub(crate) fn resolve_feature_count(n_features: usize, fraction: f64) -> usize {
    ((fraction * n_features as f64).floor() as usize).min(n_features)
}

/// Per-tree seed schedule drawn from the two master streams.
///
/// Both masters are seeded from the forest seed and advanced sequentially
/// on the calling thread, so tree `i` always receives the same pair of
/// seeds no matter which worker trains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TreeSeeds {
    pub(crate) bootstrap: u32,
    pub(crate) features: u32,
}

pub(crate) fn tree_seeds(seed: u32, n_trees: usize) -> Vec<TreeSeeds> {
    let mut bootstrap_master = MersenneTwister::new(seed);
    let mut feature_master = MersenneTwister::new(seed);
    // Skip ahead so the two streams do not hand out identical seeds.
    for _ in 0..N {
        feature_master.next_u32();
    }
    (0..n_trees)
        .map(|_| TreeSeeds {
            bootstrap: bootstrap_master.next_u32(),
            features: feature_master.next_u32(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_sequence_for_default_seed() {
        let mut rng = MersenneTwister::default();
        let head: Vec<u32> = (0..5).map(|_| rng.next_u32()).collect();
        assert_eq!(head, [3_499_211_612, 581_869_302, 3_890_346_734, 3_586_334_585, 545_404_204]);
    }

    #[test]
    fn ten_thousandth_output_matches_reference() {
        let mut rng = MersenneTwister::new(5489);
        let mut last = 0;
        for _ in 0..10_000 {
            last = rng.next_u32();
        }
        assert_eq!(last, 4_123_659_995);
    }

    #[test]
    fn reseed_restarts_sequence() {
        let mut rng = MersenneTwister::new(44);
        let first: Vec<u32> = (0..700).map(|_| rng.next_u32()).collect();
        rng.seed(44);
        let second: Vec<u32> = (0..700).map(|_| rng.next_u32()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = MersenneTwister::new(1);
        let mut b = MersenneTwister::new(2);
        assert_ne!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn bounded_stays_in_range() {
        let mut rng = MersenneTwister::new(7);
        for _ in 0..1_000 {
            assert!(rng.next_bounded(13) < 13);
        }
        assert_eq!(rng.next_bounded(0), 0);
    }

    #[test]
    fn bootstrap_size_limit() {
        assert!(check_bootstrap_size(0).is_ok());
        assert!(check_bootstrap_size(MAX_BOOTSTRAP_SAMPLES).is_ok());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn bootstrap_size_beyond_generator_range_rejected() {
        let err = check_bootstrap_size(MAX_BOOTSTRAP_SAMPLES + 1).unwrap_err();
        assert!(matches!(
            err,
            ForestError::TooManySamples { n_samples, max: MAX_BOOTSTRAP_SAMPLES }
                if n_samples == MAX_BOOTSTRAP_SAMPLES + 1
        ));
    }

    #[test]
    fn bootstrap_is_reproducible_sequentially() {
        let mut a = MersenneTwister::new(44);
        let mut b = MersenneTwister::new(44);
        let first = bootstrap_indices(50, &mut a);
        let second = bootstrap_indices(50, &mut b);
        assert_eq!(first, second);
        assert_eq!(first.len(), 50);
        assert!(first.iter().all(|&i| i < 50));
        // Consecutive calls on one generator continue the stream.
        assert_ne!(bootstrap_indices(50, &mut a), first);
    }

    #[test]
    fn full_fraction_keeps_every_feature() {
        let mut rng = MersenneTwister::new(44);
        assert_eq!(subsample_features(6, 1.0, &mut rng), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn partial_fraction_is_sorted_and_distinct() {
        let mut rng = MersenneTwister::new(3);
        let picked = subsample_features(10, 0.5, &mut rng);
        assert_eq!(picked.len(), 5);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|&f| f < 10));
    }

    #[test]
    fn tree_seeds_are_stable() {
        assert_eq!(tree_seeds(44, 4), tree_seeds(44, 4));
        let seeds = tree_seeds(44, 4);
        assert_ne!(seeds[0], seeds[1]);
        assert_ne!(seeds[0].bootstrap, seeds[0].features);
    }
}
