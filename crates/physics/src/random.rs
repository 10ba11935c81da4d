//! Deterministic jitter source for the fall integrator.
//!
//! xorshift32, owned by each movement state, so two simulations fed the same
//! commands pick the same ditch escape direction.

use serde::{Deserialize, Serialize};

/// Seeded xorshift32 generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeededRandom {
    state: u32,
}

impl SeededRandom {
    /// Creates a new generator. A seed of 0 is treated as 1.
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn step(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Returns a float in [0, 1).
    pub fn next_unit(&mut self) -> f32 {
        // 24 significant bits keep the result strictly below 1.0
        (self.step() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Returns a float in [-0.5, 0.5).
    pub fn next_centered(&mut self) -> f32 {
        self.next_unit() - 0.5
    }

    /// Current internal state.
    pub fn seed(&self) -> u32 {
        self.state
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(0x9E37_79B9)
    }
}
