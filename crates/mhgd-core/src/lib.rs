//! # MHGD MIMO Detection
//!
//! Metropolis-Hastings gradient-descent (MHGD) detection for square MIMO
//! channels: recover a QAM symbol vector `x` from `y = H·x + n`.
//!
//! ## Overview
//!
//! Several independent Markov chains search the constellation lattice. Each
//! chain takes a preconditioned (Newton-like) gradient step toward the
//! least-squares solution, adds a scaled Gaussian perturbation, snaps the
//! result onto the lattice, and accepts or rejects the move with a
//! Metropolis rule on the residual norm. Every chain remembers the best
//! vector it has seen; the detector returns the best of those.
//!
//! - **Hermitian inversion**: LDL or Cholesky, with singular-pivot guards
//! - **Setup**: preconditioner, step-size constants, MMSE starting point
//! - **Chain sampler**: the per-chain propose/accept state machine
//! - **Noise source**: explicit per-chain uniform generator and Gaussian tables
//! - **Combiner**: lowest survivor norm, ties to the lowest chain index
//!
//! ## Signal Flow
//!
//! ```text
//! (H, y, σ²) → Setup → Chains ×K (rayon) → Combiner → x̂ → Demodulate → bits
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use mhgd_core::prelude::*;
//! use num_complex::Complex64;
//!
//! # fn main() -> MhgdResult<()> {
//! let config = DetectorConfig {
//!     num_antennas: 2,
//!     modulation: Modulation::Qpsk,
//!     ..Default::default()
//! };
//! let mut detector = MhgdDetector::new(config)?;
//!
//! let h = CMatrix::identity(2);
//! let x = detector.constellation().modulate(&[true, false, false, true])?;
//! let y: Vec<Complex64> = h.mat_vec_mul(&x);
//!
//! let detection = detector.detect_fresh(&h, &y, 0.01)?;
//! let bits = detector.constellation().demodulate(&detection.symbols);
//! assert_eq!(bits, vec![true, false, false, true]);
//! # Ok(())
//! # }
//! ```

pub mod combiner;
pub mod config;
pub mod constellation;
pub mod detector;
pub mod inverse;
pub mod matrix;
pub mod noise;
pub mod observe;
pub mod sampler;
pub mod setup;
pub mod types;

// Re-export main types
pub use config::{ConfigError, DetectorConfig, ExecutionMode, LearningRatePolicy, MhgdConfig, SweepConfig};
pub use constellation::{Constellation, Modulation};
pub use detector::{Detection, MhgdDetector};
pub use inverse::{invert_hermitian, InverseOptions, InversionMethod};
pub use matrix::CMatrix;
pub use noise::{derive_seed, derive_seeds, PerturbationTable, UniformRng};
pub use sampler::{ChainOutcome, ChainSampler, StepRecord};
pub use setup::SharedSetup;
pub use types::{ChainSeed, Complex, MhgdError, MhgdResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DetectorConfig, ExecutionMode, MhgdConfig};
    pub use crate::constellation::{Constellation, Modulation};
    pub use crate::detector::{Detection, MhgdDetector};
    pub use crate::inverse::InversionMethod;
    pub use crate::matrix::CMatrix;
    pub use crate::noise::PerturbationTable;
    pub use crate::types::{ChainSeed, MhgdError, MhgdResult};
}
