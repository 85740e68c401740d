//! Randomness for the sampling chains
//!
//! Every chain owns two independent sources:
//!
//! - a [`UniformRng`] (Park-Miller-style LCG modulo `2³¹ − 1`) that draws the
//!   Metropolis acceptance thresholds and, without MMSE initialization, the
//!   random starting symbols;
//! - a [`PerturbationTable`] of unit-variance complex Gaussian samples read
//!   `Nt` at a time through a circular [`PerturbationCursor`].
//!
//! Nothing here touches global state; two chains given the same seed and
//! table produce the same draws.

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::f64::consts::FRAC_1_SQRT_2;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{ChainSeed, MhgdError, MhgdResult};

const LCG_MULTIPLIER: u64 = 1_664_525;
const LCG_INCREMENT: u64 = 1_013_904_223;
const LCG_MODULUS: u64 = (1 << 31) - 1;
const UNIFORM_SCALE: f64 = (1u64 << 31) as f64;

/// Golden-ratio multiplier that spreads consecutive chain indices apart.
const CHAIN_SEED_MIX: u32 = 0x9E37_79B9;

/// Per-chain uniform generator on `[0, 1)`.
#[derive(Debug, Clone)]
pub struct UniformRng {
    state: u64,
}

impl UniformRng {
    pub fn new(seed: ChainSeed) -> Self {
        Self {
            state: u64::from(seed),
        }
    }

    /// Advance and return the raw state in `[0, 2³¹ − 1)`.
    pub fn next_u31(&mut self) -> u32 {
        self.state = (LCG_MULTIPLIER * self.state + LCG_INCREMENT) % LCG_MODULUS;
        self.state as u32
    }

    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u31()) / UNIFORM_SCALE
    }

    /// `floor(u · n)` for a fresh uniform `u`; `n` must be non-zero.
    pub fn next_index(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n.saturating_sub(1))
    }
}

/// Unit-variance complex Gaussian perturbation samples for one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PerturbationTable {
    samples: Vec<Complex64>,
}

impl PerturbationTable {
    /// Wrap samples that are already `CN(0, 1)`.
    pub fn from_normalized(samples: Vec<Complex64>) -> Self {
        Self { samples }
    }

    /// Normalize samples whose real and imaginary parts are each `N(0, 1)`.
    pub fn from_standard_normal(raw: &[Complex64]) -> Self {
        Self {
            samples: raw.iter().map(|&z| z * FRAC_1_SQRT_2).collect(),
        }
    }

    /// Draw `len` fresh samples from a seeded `StdRng`.
    pub fn generate(seed: u64, len: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let raw: Vec<Complex64> = (0..len)
            .map(|_| Complex64::new(rng.sample(StandardNormal), rng.sample(StandardNormal)))
            .collect();
        Self::from_standard_normal(&raw)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Complex64] {
        &self.samples
    }

    /// Circular reader handing out `block_len` samples per call.
    pub fn cursor(&self, block_len: usize) -> MhgdResult<PerturbationCursor<'_>> {
        if block_len == 0 || block_len > self.samples.len() {
            return Err(MhgdError::InvalidInput(format!(
                "perturbation block of {block_len} samples from a table of {}",
                self.samples.len()
            )));
        }
        Ok(PerturbationCursor {
            samples: &self.samples,
            block_len,
            position: 0,
        })
    }
}

/// Circular block reader over a [`PerturbationTable`].
#[derive(Debug, Clone)]
pub struct PerturbationCursor<'a> {
    samples: &'a [Complex64],
    block_len: usize,
    position: usize,
}

impl<'a> PerturbationCursor<'a> {
    /// Next `block_len` samples; wraps to the start when fewer remain.
    pub fn next_block(&mut self) -> &'a [Complex64] {
        if self.position + self.block_len > self.samples.len() {
            self.position = 0;
        }
        let start = self.position;
        self.position += self.block_len;
        &self.samples[start..self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

/// Combine wall-clock bits with a chain index into a seed.
pub fn mix_seed(seconds: u64, nanos: u128, chain_index: usize) -> ChainSeed {
    let nanos = nanos as u64;
    (seconds as u32)
        ^ (nanos as u32)
        ^ ((nanos >> 32) as u32)
        ^ (chain_index as u32).wrapping_mul(CHAIN_SEED_MIX)
}

fn clock() -> (u64, u128) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs(), now.as_nanos())
}

/// Seed for one chain from the current time.
///
/// Best-effort decorrelation: two detections started within the same clock
/// tick can collide.
pub fn derive_seed(chain_index: usize) -> ChainSeed {
    let (seconds, nanos) = clock();
    mix_seed(seconds, nanos, chain_index)
}

/// Seeds for `count` chains from a single clock reading, pairwise distinct.
pub fn derive_seeds(count: usize) -> Vec<ChainSeed> {
    let (seconds, nanos) = clock();
    (0..count)
        .map(|chain| mix_seed(seconds, nanos, chain))
        .collect()
}
