//! BER measurement over SNR sweeps
//!
//! Runs the detector on independent Rayleigh trials and counts bit errors
//! between the transmitted bits and the demodulated detector output.
//!
//! ## Example
//!
//! ```rust
//! use mhgd_sim::ber::BerCounter;
//!
//! let mut ber = BerCounter::new();
//! let tx = vec![true, false, true, true, false, true, false, false, true, true];
//! let rx = vec![true, false, true, false, false, true, false, true, true, true];
//! //                              ^                         ^  -- 2 errors
//! ber.update(&tx, &rx);
//! assert_eq!(ber.error_bits(), 2);
//! assert!((ber.ber() - 0.2).abs() < 1e-10);
//! ```

use mhgd_core::noise::derive_seeds;
use mhgd_core::{DetectorConfig, MhgdDetector, MhgdResult, SweepConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::channel::{noise_variance, TrialGenerator};

/// Bit and vector error counter.
#[derive(Debug, Clone, Default)]
pub struct BerCounter {
    total_bits: u64,
    error_bits: u64,
    vectors: u64,
    vector_errors: u64,
}

impl BerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare one transmitted and detected bit vector; returns the bit errors.
    pub fn update(&mut self, tx_bits: &[bool], rx_bits: &[bool]) -> u64 {
        let len = tx_bits.len().min(rx_bits.len());
        let errors = tx_bits[..len]
            .iter()
            .zip(&rx_bits[..len])
            .filter(|(a, b)| a != b)
            .count() as u64;
        self.total_bits += len as u64;
        self.error_bits += errors;
        self.vectors += 1;
        if errors > 0 {
            self.vector_errors += 1;
        }
        errors
    }

    pub fn total_bits(&self) -> u64 {
        self.total_bits
    }

    pub fn error_bits(&self) -> u64 {
        self.error_bits
    }

    pub fn ber(&self) -> f64 {
        if self.total_bits == 0 {
            0.0
        } else {
            self.error_bits as f64 / self.total_bits as f64
        }
    }

    /// Fraction of vectors with at least one bit error.
    pub fn vector_error_rate(&self) -> f64 {
        if self.vectors == 0 {
            0.0
        } else {
            self.vector_errors as f64 / self.vectors as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Result for one SNR point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BerPoint {
    pub snr_db: f64,
    pub noise_variance: f64,
    pub trials: usize,
    pub total_bits: u64,
    pub error_bits: u64,
    pub ber: f64,
    pub vector_error_rate: f64,
    /// Detector acceptance rate over this point's trials
    pub acceptance_rate: f64,
}

/// Drives the detector over an SNR sweep.
pub struct BerHarness {
    detector: MhgdDetector,
    sweep: SweepConfig,
}

impl BerHarness {
    pub fn new(detector: DetectorConfig, sweep: SweepConfig) -> MhgdResult<Self> {
        Ok(Self {
            detector: MhgdDetector::new(detector)?,
            sweep,
        })
    }

    pub fn detector(&self) -> &MhgdDetector {
        &self.detector
    }

    /// Run `sweep.trials` detections at one SNR.
    ///
    /// `point_index` selects an independent random stream so every point of a
    /// sweep sees different channels.
    pub fn run_point(&mut self, snr_db: f64, point_index: usize) -> MhgdResult<BerPoint> {
        let config = self.detector.config().clone();
        let nt = config.num_antennas;
        let seed = self
            .sweep
            .seed
            .wrapping_add((point_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let mut gen = TrialGenerator::new(nt, config.modulation, seed)?;
        let mut counter = BerCounter::new();
        self.detector.reset_stats();

        for _ in 0..self.sweep.trials {
            let trial = gen.trial(snr_db)?;
            let seeds = if self.sweep.clock_seeds {
                derive_seeds(config.samplers)
            } else {
                gen.chain_seeds(config.samplers)
            };
            let tables = gen.perturbation_tables(&seeds, config.perturbation_len());
            let detection = self
                .detector
                .detect(&trial.h, &trial.y, trial.noise_variance, &seeds, &tables)?;
            let rx_bits = self.detector.constellation().demodulate(&detection.symbols);
            counter.update(&trial.bits, &rx_bits);
        }

        let point = BerPoint {
            snr_db,
            noise_variance: noise_variance(nt, nt, snr_db),
            trials: self.sweep.trials,
            total_bits: counter.total_bits(),
            error_bits: counter.error_bits(),
            ber: counter.ber(),
            vector_error_rate: counter.vector_error_rate(),
            acceptance_rate: self.detector.acceptance_rate(),
        };
        debug!(
            snr_db,
            error_bits = point.error_bits,
            total_bits = point.total_bits,
            "ber point done"
        );
        Ok(point)
    }

    /// Run every SNR point of the sweep in order.
    pub fn run_sweep(&mut self) -> MhgdResult<Vec<BerPoint>> {
        let snrs = self.sweep.snr_db.clone();
        let mut points = Vec::with_capacity(snrs.len());
        for (idx, snr_db) in snrs.into_iter().enumerate() {
            let point = self.run_point(snr_db, idx)?;
            info!(
                snr_db,
                ber = point.ber,
                vector_error_rate = point.vector_error_rate,
                "ber sweep point"
            );
            points.push(point);
        }
        Ok(points)
    }
}
