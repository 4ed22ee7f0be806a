//! Random number sources.
//!
//! Two flavours are used throughout the crate:
//! - [`SharedRng`]: a mutex-guarded generator owned by the population and
//!   shared between phases.
//! - [`LocalRng`]: a plain generator owned by a single task. Each parallel task
//!   gets one seeded from the shared generator, so the hot path never touches
//!   a lock.

use std::f64::consts::TAU;

use parking_lot::Mutex;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Task-local generator.
pub type LocalRng = ChaCha8Rng;

/// Thread-safe generator used to seed task-local ones.
#[derive(Debug)]
pub struct SharedRng {
    inner: Mutex<ChaCha8Rng>,
}

impl SharedRng {
    /// Create a shared generator from a seed.
    #[must_use]
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            inner: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Derive an independent task-local generator.
    #[must_use]
    pub fn fork(&self) -> LocalRng {
        LocalRng::seed_from_u64(self.inner.lock().next_u64())
    }

    /// Draw `n` seeds for task-local generators, in order.
    #[must_use]
    pub fn seeds(&self, n: usize) -> Vec<u64> {
        let mut inner = self.inner.lock();
        (0..n).map(|_| inner.next_u64()).collect()
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<T>(&self, f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
        f(&mut self.inner.lock())
    }
}

/// Standard normal sample via the Box–Muller transform.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // u1 in (0, 1] keeps ln() finite
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Uniform sample in `[min, max]`; returns `min` for an empty or inverted range.
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        min + rng.random::<f64>() * (max - min)
    } else {
        min
    }
}

/// Uniform integer in `[min, max]`; returns `min` for an inverted range.
pub fn uniform_u32<R: Rng + ?Sized>(rng: &mut R, min: u32, max: u32) -> u32 {
    if max > min {
        rng.random_range(min..=max)
    } else {
        min
    }
}
