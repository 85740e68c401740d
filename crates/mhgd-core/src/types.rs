//! Core types shared across the detector
//!
//! Complex baseband values are `num_complex::Complex64` throughout. Every
//! fallible operation in the crate returns [`MhgdResult`], whose error type
//! names the exact condition that stopped the detection: a pivot that
//! collapsed during inversion, a shape that does not match the configured
//! antenna count, a noise table that cannot feed every iteration, and so on.

use num_complex::Complex64;

/// Complex sample type used for channel entries, symbols and residuals
pub type Complex = Complex64;

/// A complex vector of length `Nt` (received vector, candidate, residual)
pub type CVector = Vec<Complex64>;

/// Per-chain seed for the uniform generator
pub type ChainSeed = u32;

/// Result type for detector operations
pub type MhgdResult<T> = Result<T, MhgdError>;

/// Errors that can occur while preparing or running a detection
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MhgdError {
    #[error("Singular matrix: pivot {pivot:e} at index {index}")]
    SingularMatrix { index: usize, pivot: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Noise table for chain {chain} too short: need {required} samples, got {actual}")]
    NoiseTableTooShort {
        chain: usize,
        required: usize,
        actual: usize,
    },

    #[error("Chain count mismatch: configured {expected} samplers, got {seeds} seeds and {tables} noise tables")]
    ChainCountMismatch {
        expected: usize,
        seeds: usize,
        tables: usize,
    },
}

impl MhgdError {
    /// True when the failure comes from the numbers themselves rather than
    /// from how the detector was called.
    pub fn is_numerical(&self) -> bool {
        matches!(self, MhgdError::SingularMatrix { .. })
    }

    /// True when the caller supplied inputs or configuration that can never
    /// succeed as given.
    pub fn is_usage(&self) -> bool {
        !self.is_numerical()
    }
}
