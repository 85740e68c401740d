//! Preconditioner & Setup
//!
//! Everything the chains share for one detection, computed once from
//! `(H, y, σ²)`:
//!
//! ```text
//! dqam     = sqrt(1.5 / (2^mu − 1))
//! alpha    = (Nt / 8)^(−1/3)
//! P        = (HᴴH + σ²/dqam² · I)⁻¹          gradient preconditioner
//! pmat     = H·P·Hᴴ                          exact learning rate only
//! x_mmse   = project((HᴴH + σ² · I)⁻¹ Hᴴ y)   MMSE initialization only
//! ```
//!
//! [`SharedSetup`] is immutable after [`SharedSetup::prepare`] and is
//! borrowed by every chain, so it is safe to share across rayon workers.

use num_complex::Complex64;

use crate::config::{DetectorConfig, LearningRatePolicy};
use crate::constellation::Constellation;
use crate::inverse::invert_hermitian;
use crate::matrix::{inner, norm_sqr, residual, CMatrix};
use crate::types::{MhgdError, MhgdResult};

/// Step-size decay constant `alpha = (Nt / 8)^(−1/3)`.
pub fn step_decay(num_antennas: usize) -> f64 {
    (num_antennas as f64 / 8.0).powf(-1.0 / 3.0)
}

/// Rayleigh-quotient learning rate `Re(rᴴ·M·r) / ‖M·r‖²`, zero when `M·r = 0`.
pub fn rayleigh_learning_rate(pmat: &CMatrix, r: &[Complex64]) -> f64 {
    let pr = pmat.mat_vec_mul(r);
    let denom = norm_sqr(&pr);
    if denom > 0.0 && denom.is_finite() {
        inner(r, &pr).re / denom
    } else {
        0.0
    }
}

/// Check shapes and finiteness of one detection's inputs.
pub fn validate_inputs(
    num_antennas: usize,
    h: &CMatrix,
    y: &[Complex64],
    sigma2: f64,
) -> MhgdResult<()> {
    if h.rows() != num_antennas {
        return Err(MhgdError::DimensionMismatch {
            what: "channel rows",
            expected: num_antennas,
            actual: h.rows(),
        });
    }
    if h.cols() != num_antennas {
        return Err(MhgdError::DimensionMismatch {
            what: "channel columns",
            expected: num_antennas,
            actual: h.cols(),
        });
    }
    if y.len() != num_antennas {
        return Err(MhgdError::DimensionMismatch {
            what: "received vector",
            expected: num_antennas,
            actual: y.len(),
        });
    }
    if !(sigma2.is_finite() && sigma2 >= 0.0) {
        return Err(MhgdError::InvalidInput(format!(
            "noise variance must be finite and >= 0, got {sigma2}"
        )));
    }
    if !h.is_finite() {
        return Err(MhgdError::InvalidInput(
            "channel matrix has non-finite entries".to_string(),
        ));
    }
    if y.iter().any(|z| !(z.re.is_finite() && z.im.is_finite())) {
        return Err(MhgdError::InvalidInput(
            "received vector has non-finite entries".to_string(),
        ));
    }
    Ok(())
}

/// Read-only state shared by all chains of one detection.
#[derive(Debug, Clone)]
pub struct SharedSetup {
    pub h: CMatrix,
    pub y: Vec<Complex64>,
    pub sigma2: f64,
    pub constellation: Constellation,
    pub alpha: f64,
    /// `P = (HᴴH + σ²/dqam² · I)⁻¹`
    pub grad_preconditioner: CMatrix,
    /// `H·P·Hᴴ` for the exact learning rate, all zero otherwise
    pub pmat: CMatrix,
    /// Projected MMSE starting point when MMSE initialization is on
    pub mmse_start: Option<Vec<Complex64>>,
    pub lr_policy: LearningRatePolicy,
}

impl SharedSetup {
    /// Validate inputs and compute the shared constants.
    pub fn prepare(
        config: &DetectorConfig,
        h: &CMatrix,
        y: &[Complex64],
        sigma2: f64,
    ) -> MhgdResult<Self> {
        let nt = config.num_antennas;
        validate_inputs(nt, h, y, sigma2)?;

        let constellation = Constellation::new(config.modulation);
        let dqam = constellation.dqam();
        let opts = config.inverse_options();
        let lr_policy = config.learning_rate_policy();

        let gram = h.gram();
        let mut regularized = gram.clone();
        regularized.add_diagonal(sigma2 / (dqam * dqam));
        let grad_preconditioner = invert_hermitian(&regularized, &opts)?;

        let pmat = match lr_policy {
            LearningRatePolicy::Exact => h.mat_mul(&grad_preconditioner).mat_mul(&h.hermitian()),
            LearningRatePolicy::ChainIndexed => CMatrix::zeros(nt, nt),
        };

        let mmse_start = if config.mmse_init {
            let mut mmse = gram;
            mmse.add_diagonal(sigma2);
            let filter = invert_hermitian(&mmse, &opts)?;
            let estimate = filter.mat_vec_mul(&h.hermitian_mat_vec_mul(y));
            Some(constellation.project_vec(&estimate))
        } else {
            None
        };

        Ok(Self {
            h: h.clone(),
            y: y.to_vec(),
            sigma2,
            constellation,
            alpha: step_decay(nt),
            grad_preconditioner,
            pmat,
            mmse_start,
            lr_policy,
        })
    }

    pub fn num_antennas(&self) -> usize {
        self.y.len()
    }

    pub fn dqam(&self) -> f64 {
        self.constellation.dqam()
    }

    /// `y − H·x`
    pub fn residual(&self, x: &[Complex64]) -> Vec<Complex64> {
        residual(&self.h, &self.y, x)
    }

    /// Learning rate for a chain whose current residual is `r`.
    pub fn learning_rate(&self, r: &[Complex64], chain_index: usize) -> f64 {
        match self.lr_policy {
            LearningRatePolicy::Exact => rayleigh_learning_rate(&self.pmat, r),
            LearningRatePolicy::ChainIndexed => (chain_index + 1) as f64 * 0.5,
        }
    }

    /// `alpha · max(dqam, sqrt(r_norm / Nt))`
    pub fn step_size(&self, r_norm: f64) -> f64 {
        let rms = (r_norm / self.num_antennas() as f64).sqrt();
        self.alpha * self.dqam().max(rms)
    }
}
