//! MHGD Detector
//!
//! Orchestrates one detection: validate inputs, build the [`SharedSetup`],
//! run every chain to completion, and pick the survivor with the smallest
//! residual norm.
//!
//! ```text
//!               ┌─▶ chain 0 ─┐
//! (H, y, σ²) ─▶ setup ─▶ chain 1 ─┼─▶ combiner ─▶ x̂
//!               └─▶ chain K ─┘
//! ```
//!
//! Chains run as rayon tasks when the `parallel` feature is enabled and the
//! configuration asks for [`ExecutionMode::Parallel`]; the sequential path
//! gives bit-identical results because each chain depends only on its own
//! seed and perturbation table.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mhgd_core::prelude::*;
//!
//! let mut detector = MhgdDetector::new(DetectorConfig::default())?;
//! let detection = detector.detect_fresh(&h, &y, sigma2)?;
//! let bits = detector.constellation().demodulate(&detection.symbols);
//! ```

use num_complex::Complex64;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::combiner;
use crate::config::{DetectorConfig, ExecutionMode};
use crate::constellation::Constellation;
use crate::matrix::CMatrix;
use crate::noise::{derive_seeds, PerturbationTable};
use crate::sampler::{ChainOutcome, ChainSampler};
use crate::setup::SharedSetup;
use crate::types::{ChainSeed, MhgdError, MhgdResult};

/// Output of one detection.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Detected symbol vector (constellation points)
    pub symbols: Vec<Complex64>,
    /// `‖y − H·symbols‖²`
    pub residual_norm: f64,
    /// Chain that produced the winning survivor
    pub chain_index: usize,
    /// Survivor residual norm of every chain, by chain index
    pub chain_norms: Vec<f64>,
    /// Accepted proposals summed over all chains
    pub accepted: usize,
    /// Proposals evaluated over all chains
    pub proposals: usize,
}

/// Metropolis-Hastings gradient-descent MIMO detector.
#[derive(Debug, Clone)]
pub struct MhgdDetector {
    config: DetectorConfig,
    constellation: Constellation,
    total_detections: u64,
    total_proposals: u64,
    total_accepted: u64,
}

impl MhgdDetector {
    pub fn new(config: DetectorConfig) -> MhgdResult<Self> {
        config.validate()?;
        let constellation = Constellation::new(config.modulation);
        Ok(Self {
            config,
            constellation,
            total_detections: 0,
            total_proposals: 0,
            total_accepted: 0,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Constellation used for projection, handy for demodulating results.
    pub fn constellation(&self) -> &Constellation {
        &self.constellation
    }

    /// Detect with caller-supplied seeds and perturbation tables, one per chain.
    pub fn detect(
        &mut self,
        h: &CMatrix,
        y: &[Complex64],
        sigma2: f64,
        seeds: &[ChainSeed],
        noise_tables: &[PerturbationTable],
    ) -> MhgdResult<Detection> {
        let samplers = self.config.samplers;
        if seeds.len() != samplers || noise_tables.len() != samplers {
            return Err(MhgdError::ChainCountMismatch {
                expected: samplers,
                seeds: seeds.len(),
                tables: noise_tables.len(),
            });
        }
        let required = self.config.perturbation_len();
        if let Some((chain, table)) = noise_tables
            .iter()
            .enumerate()
            .find(|(_, t)| t.len() < required)
        {
            return Err(MhgdError::NoiseTableTooShort {
                chain,
                required,
                actual: table.len(),
            });
        }

        let setup = SharedSetup::prepare(&self.config, h, y, sigma2)?;
        let outcomes = self.run_chains(&setup, seeds, noise_tables)?;

        let best = combiner::select_best(&outcomes)
            .ok_or_else(|| MhgdError::InvalidConfig("no sampling chains ran".to_string()))?;

        let accepted: usize = outcomes.iter().map(|o| o.accepted).sum();
        let proposals: usize = outcomes.iter().map(|o| o.iterations).sum();
        self.total_detections += 1;
        self.total_accepted += accepted as u64;
        self.total_proposals += proposals as u64;

        debug!(
            winner = best.chain_index,
            residual_norm = best.r_norm_survivor,
            accepted,
            proposals,
            "detection complete"
        );

        Ok(Detection {
            symbols: best.x_survivor.clone(),
            residual_norm: best.r_norm_survivor,
            chain_index: best.chain_index,
            chain_norms: outcomes.iter().map(|o| o.r_norm_survivor).collect(),
            accepted,
            proposals,
        })
    }

    /// Detect with clock-derived seeds and freshly generated perturbation
    /// tables.
    pub fn detect_fresh(
        &mut self,
        h: &CMatrix,
        y: &[Complex64],
        sigma2: f64,
    ) -> MhgdResult<Detection> {
        let seeds = derive_seeds(self.config.samplers);
        let len = self.config.perturbation_len();
        let tables: Vec<PerturbationTable> = seeds
            .iter()
            .map(|&seed| PerturbationTable::generate(u64::from(seed), len))
            .collect();
        self.detect(h, y, sigma2, &seeds, &tables)
    }

    fn run_chains(
        &self,
        setup: &SharedSetup,
        seeds: &[ChainSeed],
        tables: &[PerturbationTable],
    ) -> MhgdResult<Vec<ChainOutcome>> {
        let iterations = self.config.iterations;
        let run_chain = |(chain, (&seed, table)): (usize, (&ChainSeed, &PerturbationTable))| {
            ChainSampler::new(setup, chain, iterations, seed, table).map(ChainSampler::run)
        };

        match self.config.execution {
            #[cfg(feature = "parallel")]
            ExecutionMode::Parallel => seeds
                .par_iter()
                .zip(tables.par_iter())
                .enumerate()
                .map(run_chain)
                .collect(),
            _ => seeds.iter().zip(tables).enumerate().map(run_chain).collect(),
        }
    }

    /// Number of detections performed.
    pub fn detections(&self) -> u64 {
        self.total_detections
    }

    /// Fraction of proposals accepted over all detections.
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_proposals == 0 {
            0.0
        } else {
            self.total_accepted as f64 / self.total_proposals as f64
        }
    }

    pub fn reset_stats(&mut self) {
        self.total_detections = 0;
        self.total_proposals = 0;
        self.total_accepted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constellation::Modulation;
    use crate::matrix::norm_sqr;

    fn random_complex(seed: &mut u64) -> Complex64 {
        let mut next = || {
            *seed ^= *seed << 13;
            *seed ^= *seed >> 7;
            *seed ^= *seed << 17;
            (*seed as f64 / u64::MAX as f64) * 2.0 - 1.0
        };
        let re = next();
        let im = next();
        Complex64::new(re, im)
    }

    /// Well-conditioned channel `I + 0.3·E`
    fn channel(nt: usize, seed: u64) -> CMatrix {
        let mut s = seed;
        let mut h = CMatrix::identity(nt);
        for r in 0..nt {
            for c in 0..nt {
                let z = h.get(r, c) + random_complex(&mut s) * 0.3;
                h.set(r, c, z);
            }
        }
        h
    }

    fn symbols(constellation: &Constellation, nt: usize, seed: u64) -> Vec<Complex64> {
        let mut s = seed;
        (0..nt)
            .map(|_| {
                let u = random_complex(&mut s).re * 0.5 + 0.5;
                let idx = ((u * constellation.len() as f64) as usize).min(constellation.len() - 1);
                constellation.point(idx)
            })
            .collect()
    }

    fn inputs(config: &DetectorConfig, seed: u64) -> (Vec<ChainSeed>, Vec<PerturbationTable>) {
        let seeds: Vec<ChainSeed> = (0..config.samplers as u32).map(|k| 1000 + 31 * k + seed as u32).collect();
        let tables = seeds
            .iter()
            .map(|&s| PerturbationTable::generate(u64::from(s) ^ seed, config.perturbation_len()))
            .collect();
        (seeds, tables)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectorConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            MhgdDetector::new(config),
            Err(MhgdError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_noiseless_recovery_qpsk() {
        let config = DetectorConfig {
            num_antennas: 4,
            modulation: Modulation::Qpsk,
            iterations: 20,
            samplers: 8,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let mut recovered = 0;
        for trial in 1..=5u64 {
            let h = channel(4, trial * 17);
            let x = symbols(detector.constellation(), 4, trial * 101);
            let y = h.mat_vec_mul(&x);
            let (seeds, tables) = inputs(&config, trial);
            let det = detector.detect(&h, &y, 0.0, &seeds, &tables).unwrap();
            if det.residual_norm < 1e-12 {
                let exact = det
                    .symbols
                    .iter()
                    .zip(&x)
                    .all(|(a, b)| (a - b).norm() < 1e-9);
                assert!(exact, "zero residual must mean the transmitted vector");
                recovered += 1;
            }
        }
        assert!(recovered >= 4, "recovered {recovered} of 5");
        assert_eq!(detector.detections(), 5);
    }

    #[test]
    fn test_noiseless_recovery_mmse_init_qam64() {
        let config = DetectorConfig {
            num_antennas: 8,
            modulation: Modulation::Qam64,
            mmse_init: true,
            inversion: crate::inverse::InversionMethod::Cholesky,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let h = channel(8, 5);
        let x = symbols(detector.constellation(), 8, 6);
        let y = h.mat_vec_mul(&x);
        let (seeds, tables) = inputs(&config, 2);
        let det = detector.detect(&h, &y, 0.0, &seeds, &tables).unwrap();
        assert!(det.residual_norm < 1e-20);
        assert_eq!(det.chain_index, 0);
        assert_eq!(detector.constellation().demodulate(&det.symbols), detector.constellation().demodulate(&x));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let config = DetectorConfig {
            num_antennas: 8,
            samplers: 4,
            ..Default::default()
        };
        let h = channel(8, 9);
        let c = Constellation::new(config.modulation);
        let x = symbols(&c, 8, 10);
        let mut y = h.mat_vec_mul(&x);
        let mut s = 77;
        for v in &mut y {
            *v += random_complex(&mut s) * 0.05;
        }
        let (seeds, tables) = inputs(&config, 3);

        let mut a = MhgdDetector::new(config.clone()).unwrap();
        let mut b = MhgdDetector::new(config.clone()).unwrap();
        let first = a.detect(&h, &y, 0.01, &seeds, &tables).unwrap();
        let second = b.detect(&h, &y, 0.01, &seeds, &tables).unwrap();
        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first.chain_norms, second.chain_norms);

        let mut sequential = MhgdDetector::new(DetectorConfig {
            execution: ExecutionMode::Sequential,
            ..config
        })
        .unwrap();
        let third = sequential.detect(&h, &y, 0.01, &seeds, &tables).unwrap();
        assert_eq!(first.symbols, third.symbols);
        assert_eq!(first.chain_norms, third.chain_norms);
        assert_eq!(first.chain_index, third.chain_index);
        assert_eq!(first.accepted, third.accepted);
    }

    #[test]
    fn test_winner_has_minimum_norm() {
        let config = DetectorConfig {
            num_antennas: 4,
            samplers: 6,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let h = channel(4, 21);
        let x = symbols(detector.constellation(), 4, 22);
        let mut y = h.mat_vec_mul(&x);
        let mut s = 5;
        for v in &mut y {
            *v += random_complex(&mut s) * 0.2;
        }
        let (seeds, tables) = inputs(&config, 4);
        let det = detector.detect(&h, &y, 0.04, &seeds, &tables).unwrap();
        assert_eq!(det.chain_norms.len(), 6);
        let min = det.chain_norms.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(det.residual_norm, min);
        assert_eq!(det.chain_norms[det.chain_index], min);
        let r = crate::matrix::residual(&h, &y, &det.symbols);
        assert!((norm_sqr(&r) - det.residual_norm).abs() < 1e-9);
        assert_eq!(det.proposals, 6 * config.iterations);
    }

    #[test]
    fn test_chain_count_mismatch() {
        let config = DetectorConfig {
            num_antennas: 2,
            samplers: 3,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let (seeds, tables) = inputs(&config, 1);
        let h = channel(2, 1);
        let y = vec![Complex64::new(0.0, 0.0); 2];
        let err = detector.detect(&h, &y, 0.1, &seeds[..2], &tables).unwrap_err();
        assert_eq!(
            err,
            MhgdError::ChainCountMismatch {
                expected: 3,
                seeds: 2,
                tables: 3
            }
        );
    }

    #[test]
    fn test_short_table_rejected_before_sampling() {
        let config = DetectorConfig {
            num_antennas: 2,
            samplers: 2,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let (seeds, mut tables) = inputs(&config, 1);
        tables[1] = PerturbationTable::generate(0, config.perturbation_len() - 2);
        let h = channel(2, 1);
        let y = vec![Complex64::new(0.0, 0.0); 2];
        let err = detector.detect(&h, &y, 0.1, &seeds, &tables).unwrap_err();
        assert!(matches!(err, MhgdError::NoiseTableTooShort { chain: 1, required: 20, actual: 18 }));
        assert_eq!(detector.detections(), 0);
    }

    #[test]
    fn test_singular_channel_reported() {
        let config = DetectorConfig {
            num_antennas: 2,
            samplers: 1,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config.clone()).unwrap();
        let (seeds, tables) = inputs(&config, 1);
        let y = vec![Complex64::new(0.0, 0.0); 2];
        let err = detector
            .detect(&CMatrix::zeros(2, 2), &y, 0.0, &seeds, &tables)
            .unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn test_detect_fresh_and_stats() {
        let config = DetectorConfig {
            num_antennas: 4,
            modulation: Modulation::Qpsk,
            ..Default::default()
        };
        let mut detector = MhgdDetector::new(config).unwrap();
        let h = channel(4, 2);
        let x = symbols(detector.constellation(), 4, 3);
        let y = h.mat_vec_mul(&x);
        let det = detector.detect_fresh(&h, &y, 0.01).unwrap();
        assert_eq!(det.symbols.len(), 4);
        assert_eq!(detector.detections(), 1);
        let rate = detector.acceptance_rate();
        assert!((0.0..=1.0).contains(&rate));

        detector.reset_stats();
        assert_eq!(detector.detections(), 0);
        assert_eq!(detector.acceptance_rate(), 0.0);
    }
}
