//! Rayleigh MIMO trial generation
//!
//! Produces everything one detection needs, from a single seeded `StdRng`:
//!
//! - `H` with i.i.d. `CN(0, 1)` entries (flat Rayleigh fading)
//! - random bits, Gray-mapped onto the constellation
//! - `y = H·x + n` with `n ~ CN(0, σ²)` and `σ² = (Nt / Nr) · 10^(−SNR/10)`
//! - per-chain seeds and perturbation tables
//!
//! Runs are reproducible for a fixed seed.

use mhgd_core::{CMatrix, ChainSeed, Constellation, MhgdError, MhgdResult, Modulation, PerturbationTable};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use std::f64::consts::FRAC_1_SQRT_2;

/// Noise variance per receive antenna for a given SNR.
pub fn noise_variance(num_tx: usize, num_rx: usize, snr_db: f64) -> f64 {
    (num_tx as f64 / num_rx as f64) * 10f64.powf(-snr_db / 10.0)
}

/// One transmitted and received vector.
#[derive(Debug, Clone)]
pub struct Trial {
    pub h: CMatrix,
    pub bits: Vec<bool>,
    pub x: Vec<Complex64>,
    pub y: Vec<Complex64>,
    pub noise_variance: f64,
}

/// Seeded generator of Rayleigh channel trials.
#[derive(Debug, Clone)]
pub struct TrialGenerator {
    rng: StdRng,
    num_antennas: usize,
    constellation: Constellation,
    /// Per-component distribution of a `CN(0, 1)` channel entry
    fading: Normal<f64>,
}

impl TrialGenerator {
    pub fn new(num_antennas: usize, modulation: Modulation, seed: u64) -> MhgdResult<Self> {
        if num_antennas == 0 {
            return Err(MhgdError::InvalidConfig(
                "num_antennas must be > 0".to_string(),
            ));
        }
        let fading = Normal::new(0.0, FRAC_1_SQRT_2)
            .map_err(|e| MhgdError::InvalidInput(e.to_string()))?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            num_antennas,
            constellation: Constellation::new(modulation),
            fading,
        })
    }

    pub fn constellation(&self) -> &Constellation {
        &self.constellation
    }

    /// Square channel with i.i.d. `CN(0, 1)` entries.
    pub fn rayleigh_channel(&mut self) -> CMatrix {
        let n = self.num_antennas;
        let mut h = CMatrix::zeros(n, n);
        for r in 0..n {
            for c in 0..n {
                let re = self.fading.sample(&mut self.rng);
                let im = self.fading.sample(&mut self.rng);
                h.set(r, c, Complex64::new(re, im));
            }
        }
        h
    }

    pub fn random_bits(&mut self, count: usize) -> Vec<bool> {
        (0..count).map(|_| self.rng.gen_bool(0.5)).collect()
    }

    /// `count` samples of `CN(0, variance)`.
    pub fn awgn(&mut self, count: usize, variance: f64) -> Vec<Complex64> {
        let std = (variance / 2.0).sqrt();
        (0..count)
            .map(|_| {
                let re: f64 = self.rng.sample(StandardNormal);
                let im: f64 = self.rng.sample(StandardNormal);
                Complex64::new(re * std, im * std)
            })
            .collect()
    }

    /// One trial at `snr_db`.
    pub fn trial(&mut self, snr_db: f64) -> MhgdResult<Trial> {
        let sigma2 = noise_variance(self.num_antennas, self.num_antennas, snr_db);
        self.trial_with_variance(sigma2)
    }

    /// One trial with an explicit noise variance (`0.0` for noiseless).
    pub fn trial_with_variance(&mut self, sigma2: f64) -> MhgdResult<Trial> {
        let h = self.rayleigh_channel();
        let bits = self.random_bits(self.num_antennas * self.constellation.bits_per_symbol());
        let x = self.constellation.modulate(&bits)?;
        let noise = self.awgn(self.num_antennas, sigma2);
        let y = h
            .mat_vec_mul(&x)
            .into_iter()
            .zip(noise)
            .map(|(hx, n)| hx + n)
            .collect();
        Ok(Trial {
            h,
            bits,
            x,
            y,
            noise_variance: sigma2,
        })
    }

    /// Chain seeds drawn from this generator.
    pub fn chain_seeds(&mut self, count: usize) -> Vec<ChainSeed> {
        (0..count).map(|_| self.rng.gen()).collect()
    }

    /// One perturbation table of `len` samples per seed.
    pub fn perturbation_tables(&mut self, seeds: &[ChainSeed], len: usize) -> Vec<PerturbationTable> {
        seeds
            .iter()
            .map(|_| {
                let raw: Vec<Complex64> = (0..len)
                    .map(|_| Complex64::new(self.rng.sample(StandardNormal), self.rng.sample(StandardNormal)))
                    .collect();
                PerturbationTable::from_standard_normal(&raw)
            })
            .collect()
    }
}
