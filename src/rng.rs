//! # RandomNumberGenerator
//!
//! The `RandomNumberGenerator` struct is the single source of randomness of a
//! run. The engine owns one instance and threads it through initialization,
//! crossover and mutation, so that saving and restoring its state in a
//! checkpoint makes a resumed run replay exactly.
//!
//! ## Example
//!
//! ```rust
//! use simloop::rng::RandomNumberGenerator;
//!
//! let mut rng = RandomNumberGenerator::from_seed(7);
//!
//! for _ in 0..5 {
//!     let gene = rng.uniform(-1.0, 1.0);
//!     assert!((-1.0..=1.0).contains(&gene));
//! }
//! ```

use rand::{seq::index, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A wrapper around a ChaCha generator whose full state can be serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomNumberGenerator {
    pub rng: ChaCha8Rng,
}

impl RandomNumberGenerator {
    /// Creates a new `RandomNumberGenerator` instance seeded from the system entropy.
    pub fn new() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Creates a new `RandomNumberGenerator` instance with a specific seed.
    ///
    /// This is useful for reproducible runs and tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws one number uniformly from `[from, to]`.
    ///
    /// A degenerate range (`from >= to`) yields `from` every time. Ranges
    /// whose width overflows `f64` are sampled by interpolating the bounds.
    pub fn uniform(&mut self, from: f64, to: f64) -> f64 {
        if from >= to {
            return from;
        }
        if !(to - from).is_finite() {
            let u = self.probability();
            return (from + u * to - u * from).clamp(from, to);
        }
        self.rng.gen_range(from..=to)
    }

    /// Draws a probability in `[0, 1)`.
    pub fn probability(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Draws an index in `0..len`. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Draws two distinct indices in `0..len`. `len` must be at least 2.
    pub fn distinct_pair(&mut self, len: usize) -> (usize, usize) {
        let picked = index::sample(&mut self.rng, len, 2);
        (picked.index(0), picked.index(1))
    }
}

impl Default for RandomNumberGenerator {
    fn default() -> Self {
        Self::new()
    }
}
