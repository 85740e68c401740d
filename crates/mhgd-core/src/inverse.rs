//! Hermitian Matrix Inversion
//!
//! Inverts the small Hermitian systems built during detector setup, the
//! regularized Gram matrix `HᴴH + λI` in particular. Two factorizations are
//! available:
//!
//! - **LDL** (`A = L·D·Lᴴ`, `L` unit lower-triangular, `D` real diagonal),
//!   right-looking. Works on indefinite Hermitian input as long as no pivot
//!   collapses.
//! - **Cholesky** (`A = L·Lᴴ`). Requires positive definiteness; the natural
//!   choice for a noise-regularized Gram matrix.
//!
//! ```text
//! A ──snap──▶ factor ──▶ L⁻¹ (forward substitution) ──▶ L⁻ᴴ·D⁻¹·L⁻¹ ──▶ (X + Xᴴ)/2
//! ```
//!
//! Entries smaller than a snap tolerance are zeroed before factoring, and any
//! pivot that is non-finite or smaller than `pivot_epsilon` fails with
//! [`MhgdError::SingularMatrix`] instead of producing `inf`/`NaN`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::matrix::CMatrix;
use crate::types::{MhgdError, MhgdResult};

/// Components below this magnitude are zeroed before factoring.
pub const DEFAULT_SNAP_TOLERANCE: f64 = 1e-6;

/// Pivots below this magnitude are treated as singular.
pub const DEFAULT_PIVOT_EPSILON: f64 = 1e-12;

/// Factorization used to invert Hermitian matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InversionMethod {
    Ldl,
    Cholesky,
}

impl Default for InversionMethod {
    fn default() -> Self {
        InversionMethod::Ldl
    }
}

/// Numeric guards for [`invert_hermitian`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseOptions {
    pub method: InversionMethod,
    pub snap_tolerance: f64,
    pub pivot_epsilon: f64,
}

impl Default for InverseOptions {
    fn default() -> Self {
        Self {
            method: InversionMethod::default(),
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            pivot_epsilon: DEFAULT_PIVOT_EPSILON,
        }
    }
}

impl InverseOptions {
    pub fn with_method(method: InversionMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }
}

/// `A = L·D·Lᴴ`
#[derive(Debug, Clone)]
pub struct LdlFactors {
    pub l: CMatrix,
    pub d: Vec<f64>,
}

/// Invert a Hermitian matrix into a fresh buffer.
pub fn invert_hermitian(a: &CMatrix, opts: &InverseOptions) -> MhgdResult<CMatrix> {
    if !a.is_square() {
        return Err(MhgdError::DimensionMismatch {
            what: "inverse input columns",
            expected: a.rows(),
            actual: a.cols(),
        });
    }

    let mut work = a.clone();
    work.snap_small_entries(opts.snap_tolerance);

    let inv = match opts.method {
        InversionMethod::Ldl => {
            let factors = ldl_decompose(&work, opts.pivot_epsilon)?;
            let l_inv = unit_lower_inverse(&factors.l);
            congruence_with_diagonal(&l_inv, Some(&factors.d))
        }
        InversionMethod::Cholesky => {
            let l = cholesky_decompose(&work, opts.pivot_epsilon)?;
            let l_inv = lower_inverse(&l);
            congruence_with_diagonal(&l_inv, None)
        }
    };

    Ok(symmetrize(&inv))
}

/// Right-looking LDLᴴ factorization of the lower triangle of `a`.
pub fn ldl_decompose(a: &CMatrix, pivot_epsilon: f64) -> MhgdResult<LdlFactors> {
    let n = a.rows();
    let mut work = a.clone();
    let mut l = CMatrix::identity(n);
    let mut d = vec![0.0; n];

    for j in 0..n {
        let pivot = work.get(j, j).re;
        if !pivot.is_finite() || pivot.abs() < pivot_epsilon {
            return Err(MhgdError::SingularMatrix { index: j, pivot });
        }
        d[j] = pivot;

        for i in (j + 1)..n {
            l.set(i, j, work.get(i, j) / pivot);
        }

        // Rank-one update of the trailing lower triangle
        for i in (j + 1)..n {
            let lij_d = l.get(i, j) * pivot;
            for k in (j + 1)..=i {
                let updated = work.get(i, k) - lij_d * l.get(k, j).conj();
                work.set(i, k, updated);
            }
        }
    }

    Ok(LdlFactors { l, d })
}

/// Cholesky factor `L` with `A = L·Lᴴ`.
pub fn cholesky_decompose(a: &CMatrix, pivot_epsilon: f64) -> MhgdResult<CMatrix> {
    let n = a.rows();
    let mut l = CMatrix::zeros(n, n);

    for j in 0..n {
        let mut diag = a.get(j, j).re;
        for k in 0..j {
            diag -= l.get(j, k).norm_sqr();
        }
        if !diag.is_finite() || diag <= pivot_epsilon {
            return Err(MhgdError::SingularMatrix {
                index: j,
                pivot: diag,
            });
        }
        let ljj = diag.sqrt();
        l.set(j, j, Complex64::new(ljj, 0.0));

        for i in (j + 1)..n {
            let mut sum = a.get(i, j);
            for k in 0..j {
                sum -= l.get(i, k) * l.get(j, k).conj();
            }
            l.set(i, j, sum / ljj);
        }
    }

    Ok(l)
}

/// Inverse of a unit lower-triangular matrix by forward substitution.
fn unit_lower_inverse(l: &CMatrix) -> CMatrix {
    let n = l.rows();
    let mut inv = CMatrix::identity(n);
    for j in 0..n {
        for i in (j + 1)..n {
            let mut sum = Complex64::new(0.0, 0.0);
            for k in j..i {
                sum += l.get(i, k) * inv.get(k, j);
            }
            inv.set(i, j, -sum);
        }
    }
    inv
}

/// Inverse of a lower-triangular matrix with a non-zero diagonal.
fn lower_inverse(l: &CMatrix) -> CMatrix {
    let n = l.rows();
    let mut inv = CMatrix::zeros(n, n);
    for j in 0..n {
        inv.set(j, j, l.get(j, j).inv());
        for i in (j + 1)..n {
            let mut sum = Complex64::new(0.0, 0.0);
            for k in j..i {
                sum += l.get(i, k) * inv.get(k, j);
            }
            inv.set(i, j, -sum / l.get(i, i));
        }
    }
    inv
}

/// `Mᴴ · diag(1/d) · M` for lower-triangular `M`, or `Mᴴ · M` without `d`.
fn congruence_with_diagonal(m: &CMatrix, d: Option<&[f64]>) -> CMatrix {
    let n = m.rows();
    let mut out = CMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            let mut sum = Complex64::new(0.0, 0.0);
            // M is lower-triangular, so row k contributes only when k >= max(i, j)
            for k in i.max(j)..n {
                let term = m.get(k, i).conj() * m.get(k, j);
                sum += match d {
                    Some(d) => term / d[k],
                    None => term,
                };
            }
            out.set(i, j, sum);
        }
    }
    out
}

fn symmetrize(x: &CMatrix) -> CMatrix {
    let n = x.rows();
    let mut out = CMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let avg = (x.get(i, j) + x.get(j, i).conj()) * 0.5;
            if i == j {
                out.set(i, i, Complex64::new(avg.re, 0.0));
            } else {
                out.set(i, j, avg);
                out.set(j, i, avg.conj());
            }
        }
    }
    out
}
