//! Dense complex matrices
//!
//! Row-major storage sized for the small square systems a MIMO detector
//! works on (`Nt` up to a few dozen). Operations allocate fresh outputs and
//! never alias their inputs.

use num_complex::Complex64;

use crate::types::{MhgdError, MhgdResult};

/// Row-major complex matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CMatrix {
    data: Vec<Complex64>,
    rows: usize,
    cols: usize,
}

impl CMatrix {
    /// Wrap row-major data, checking that it fills `rows × cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<Complex64>) -> MhgdResult<Self> {
        if data.len() != rows * cols {
            return Err(MhgdError::DimensionMismatch {
                what: "matrix data",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Build from a slice of equally long rows.
    pub fn from_rows(rows: &[Vec<Complex64>]) -> MhgdResult<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(MhgdError::DimensionMismatch {
                    what: "matrix row",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![Complex64::new(0.0, 0.0); rows * cols],
            rows,
            cols,
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::scaled_identity(n, 1.0)
    }

    /// `value · I`
    pub fn scaled_identity(n: usize, value: f64) -> Self {
        let mut out = Self::zeros(n, n);
        for i in 0..n {
            out.set(i, i, Complex64::new(value, 0.0));
        }
        out
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Row-major view of the entries.
    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> Complex64 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, val: Complex64) {
        self.data[r * self.cols + c] = val;
    }

    /// Conjugate transpose.
    pub fn hermitian(&self) -> Self {
        let mut out = vec![Complex64::new(0.0, 0.0); self.rows * self.cols];
        for r in 0..self.rows {
            for c in 0..self.cols {
                out[c * self.rows + r] = self.get(r, c).conj();
            }
        }
        Self {
            data: out,
            rows: self.cols,
            cols: self.rows,
        }
    }

    pub fn mat_mul(&self, other: &Self) -> Self {
        assert_eq!(self.cols, other.rows);
        let mut out = vec![Complex64::new(0.0, 0.0); self.rows * other.cols];
        for r in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(r, k);
                for c in 0..other.cols {
                    out[r * other.cols + c] += a * other.get(k, c);
                }
            }
        }
        Self {
            data: out,
            rows: self.rows,
            cols: other.cols,
        }
    }

    pub fn mat_vec_mul(&self, v: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(self.cols, v.len());
        (0..self.rows)
            .map(|r| {
                self.data[r * self.cols..(r + 1) * self.cols]
                    .iter()
                    .zip(v)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    /// `selfᴴ · v` without materializing the conjugate transpose.
    pub fn hermitian_mat_vec_mul(&self, v: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(self.rows, v.len());
        let mut out = vec![Complex64::new(0.0, 0.0); self.cols];
        for (r, vr) in v.iter().enumerate() {
            for (c, acc) in out.iter_mut().enumerate() {
                *acc += self.get(r, c).conj() * vr;
            }
        }
        out
    }

    /// Gram matrix `selfᴴ · self`, Hermitian by construction.
    pub fn gram(&self) -> Self {
        let n = self.cols;
        let mut out = Self::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let mut sum = Complex64::new(0.0, 0.0);
                for r in 0..self.rows {
                    sum += self.get(r, i).conj() * self.get(r, j);
                }
                if i == j {
                    sum.im = 0.0;
                }
                out.set(i, j, sum);
                out.set(j, i, sum.conj());
            }
        }
        out
    }

    /// Add a real value to every diagonal entry.
    pub fn add_diagonal(&mut self, value: f64) {
        for i in 0..self.rows.min(self.cols) {
            let d = self.get(i, i);
            self.set(i, i, d + value);
        }
    }

    /// Zero real and imaginary parts whose magnitude is below `tolerance`.
    pub fn snap_small_entries(&mut self, tolerance: f64) {
        for z in &mut self.data {
            if z.re.abs() < tolerance {
                z.re = 0.0;
            }
            if z.im.abs() < tolerance {
                z.im = 0.0;
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|z| z.re.is_finite() && z.im.is_finite())
    }

    pub fn is_hermitian(&self, tolerance: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        for i in 0..self.rows {
            for j in i..self.cols {
                if (self.get(i, j) - self.get(j, i).conj()).norm() > tolerance {
                    return false;
                }
            }
        }
        true
    }

    /// Largest entrywise distance to `other`, `INFINITY` on shape mismatch.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        if self.rows != other.rows || self.cols != other.cols {
            return f64::INFINITY;
        }
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }
}

/// Squared Euclidean norm `‖v‖²`.
pub fn norm_sqr(v: &[Complex64]) -> f64 {
    v.iter().map(Complex64::norm_sqr).sum()
}

/// Inner product `aᴴ · b`.
pub fn inner(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

/// Residual `y − H·x`.
pub fn residual(h: &CMatrix, y: &[Complex64], x: &[Complex64]) -> Vec<Complex64> {
    h.mat_vec_mul(x)
        .into_iter()
        .zip(y)
        .map(|(hx, yi)| yi - hx)
        .collect()
}
