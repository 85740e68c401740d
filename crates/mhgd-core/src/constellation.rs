//! Square QAM constellations
//!
//! Points sit on the odd-integer lattice `{±1, ±3, …}²` scaled by
//! `dqam = sqrt(1.5 / (2^mu − 1))`, which gives unit average symbol energy.
//! Each point carries a Gray label: the upper `mu/2` bits are the Gray code
//! of the in-phase level index, the lower `mu/2` bits that of the quadrature
//! level index, with level index 0 being the most negative level.
//!
//! ```text
//! 16-QAM, labels (I bits | Q bits)
//!
//!   Q ▲
//!  +3 │ 0010  0110  1110  1010
//!  +1 │ 0011  0111  1111  1011
//!  -1 │ 0001  0101  1101  1001
//!  -3 │ 0000  0100  1100  1000
//!     └──────────────────────▶ I
//!       -3    -1    +1    +3
//! ```
//!
//! Projection onto the lattice is the quantizer used by the sampler; the
//! modulator and demodulator are the bit-level boundary used by the
//! simulation harness.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{MhgdError, MhgdResult};

/// Supported square QAM orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modulation {
    Qpsk,
    Qam16,
    Qam64,
}

impl Default for Modulation {
    fn default() -> Self {
        Modulation::Qam16
    }
}

impl fmt::Display for Modulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modulation::Qpsk => write!(f, "QPSK"),
            Modulation::Qam16 => write!(f, "16-QAM"),
            Modulation::Qam64 => write!(f, "64-QAM"),
        }
    }
}

impl Modulation {
    /// Map bits per symbol (`mu`) to a modulation.
    pub fn from_bits_per_symbol(mu: usize) -> MhgdResult<Self> {
        match mu {
            2 => Ok(Modulation::Qpsk),
            4 => Ok(Modulation::Qam16),
            6 => Ok(Modulation::Qam64),
            other => Err(MhgdError::InvalidConfig(format!(
                "unsupported bits per symbol {other}, expected 2, 4 or 6"
            ))),
        }
    }

    pub fn bits_per_symbol(self) -> usize {
        match self {
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
            Modulation::Qam64 => 6,
        }
    }

    /// Number of constellation points, `2^mu`.
    pub fn order(self) -> usize {
        1 << self.bits_per_symbol()
    }

    /// Levels per real axis, `2^(mu/2)`.
    pub fn levels_per_axis(self) -> usize {
        1 << (self.bits_per_symbol() / 2)
    }

    /// Outermost lattice level `m` (1, 3 or 7).
    pub fn max_level(self) -> f64 {
        (self.levels_per_axis() - 1) as f64
    }

    /// Lattice spacing scale giving unit average energy.
    pub fn dqam(self) -> f64 {
        (1.5 / (self.order() - 1) as f64).sqrt()
    }
}

/// Gray code of `k`.
pub fn gray_encode(k: usize) -> usize {
    k ^ (k >> 1)
}

/// Inverse of [`gray_encode`].
pub fn gray_decode(g: usize) -> usize {
    let mut k = g;
    let mut shift = g >> 1;
    while shift != 0 {
        k ^= shift;
        shift >>= 1;
    }
    k
}

/// Quantize one real coordinate onto the odd-integer lattice.
///
/// `v ↦ clamp(2·floor(v / (2·dqam)) + 1, −m, m) · dqam`. Infinite inputs land
/// on the nearest extreme level and `NaN` on the lowest one.
#[inline]
pub fn project_component(v: f64, dqam: f64, max_level: f64) -> f64 {
    if v.is_nan() {
        return -max_level * dqam;
    }
    let level = 2.0 * (v / (2.0 * dqam)).floor() + 1.0;
    level.clamp(-max_level, max_level) * dqam
}

/// A normalized square QAM constellation with Gray labels.
#[derive(Debug, Clone)]
pub struct Constellation {
    modulation: Modulation,
    dqam: f64,
    /// Points in grid order: index `i·L + j` is I level `i`, Q level `j`.
    points: Vec<Complex64>,
    /// Gray label of each point.
    labels: Vec<usize>,
    /// Point index for each label.
    index_of_label: Vec<usize>,
}

impl Constellation {
    pub fn new(modulation: Modulation) -> Self {
        let levels = modulation.levels_per_axis();
        let half_bits = modulation.bits_per_symbol() / 2;
        let dqam = modulation.dqam();
        let max_level = modulation.max_level();

        let mut points = Vec::with_capacity(modulation.order());
        let mut labels = Vec::with_capacity(modulation.order());
        for i in 0..levels {
            for j in 0..levels {
                let re = (2.0 * i as f64 - max_level) * dqam;
                let im = (2.0 * j as f64 - max_level) * dqam;
                points.push(Complex64::new(re, im));
                labels.push((gray_encode(i) << half_bits) | gray_encode(j));
            }
        }

        let mut index_of_label = vec![0; labels.len()];
        for (idx, &label) in labels.iter().enumerate() {
            index_of_label[label] = idx;
        }

        Self {
            modulation,
            dqam,
            points,
            labels,
            index_of_label,
        }
    }

    pub fn modulation(&self) -> Modulation {
        self.modulation
    }

    pub fn dqam(&self) -> f64 {
        self.dqam
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.modulation.bits_per_symbol()
    }

    pub fn points(&self) -> &[Complex64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at grid index `idx`.
    pub fn point(&self, idx: usize) -> Complex64 {
        self.points[idx]
    }

    /// Gray label of the point at grid index `idx`.
    pub fn label(&self, idx: usize) -> usize {
        self.labels[idx]
    }

    /// Point carrying Gray label `label`.
    pub fn point_for_label(&self, label: usize) -> Complex64 {
        self.points[self.index_of_label[label]]
    }

    /// Nearest lattice point, coordinate by coordinate.
    #[inline]
    pub fn project(&self, z: Complex64) -> Complex64 {
        let m = self.modulation.max_level();
        Complex64::new(
            project_component(z.re, self.dqam, m),
            project_component(z.im, self.dqam, m),
        )
    }

    pub fn project_vec(&self, zs: &[Complex64]) -> Vec<Complex64> {
        zs.iter().map(|&z| self.project(z)).collect()
    }

    /// Grid index of the point nearest to `z`.
    pub fn nearest_index(&self, z: Complex64) -> usize {
        let levels = self.modulation.levels_per_axis();
        let q = self.project(z);
        let axis = |v: f64| {
            let level = v / self.dqam + self.modulation.max_level();
            ((level / 2.0).round() as usize).min(levels - 1)
        };
        axis(q.re) * levels + axis(q.im)
    }

    /// Symbols to Gray bits, most significant bit first.
    pub fn demodulate(&self, symbols: &[Complex64]) -> Vec<bool> {
        let bps = self.bits_per_symbol();
        let mut bits = Vec::with_capacity(symbols.len() * bps);
        for &s in symbols {
            let label = self.labels[self.nearest_index(s)];
            for b in (0..bps).rev() {
                bits.push((label >> b) & 1 != 0);
            }
        }
        bits
    }

    /// Gray bits, most significant first, to normalized symbols.
    pub fn modulate(&self, bits: &[bool]) -> MhgdResult<Vec<Complex64>> {
        let bps = self.bits_per_symbol();
        if bits.len() % bps != 0 {
            return Err(MhgdError::InvalidInput(format!(
                "{} bits is not a multiple of {bps} bits per symbol",
                bits.len()
            )));
        }
        Ok(bits
            .chunks(bps)
            .map(|chunk| {
                let label = chunk
                    .iter()
                    .fold(0usize, |acc, &b| (acc << 1) | usize::from(b));
                self.point_for_label(label)
            })
            .collect())
    }

    /// Mean symbol energy (1.0 for every supported order).
    pub fn average_energy(&self) -> f64 {
        self.points.iter().map(Complex64::norm_sqr).sum::<f64>() / self.points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dqam_values() {
        assert!((Modulation::Qpsk.dqam() - 0.5_f64.sqrt()).abs() < 1e-12);
        assert!((Modulation::Qam16.dqam() - 1.0 / 10.0_f64.sqrt()).abs() < 1e-12);
        assert!((Modulation::Qam64.dqam() - 1.0 / 42.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_unit_average_energy() {
        for m in [Modulation::Qpsk, Modulation::Qam16, Modulation::Qam64] {
            let c = Constellation::new(m);
            assert_eq!(c.len(), m.order());
            assert!((c.average_energy() - 1.0).abs() < 1e-12, "{m}");
        }
    }

    #[test]
    fn test_from_bits_per_symbol() {
        assert_eq!(Modulation::from_bits_per_symbol(6).unwrap(), Modulation::Qam64);
        assert!(Modulation::from_bits_per_symbol(8).is_err());
    }

    #[test]
    fn test_projection_clamps_extremes() {
        let d = Modulation::Qam64.dqam();
        assert!((project_component(50.0, d, 7.0) - 7.0 * d).abs() < 1e-15);
        assert!((project_component(-50.0, d, 7.0) + 7.0 * d).abs() < 1e-15);
        assert_eq!(project_component(f64::INFINITY, d, 7.0), 7.0 * d);
        assert_eq!(project_component(f64::NEG_INFINITY, d, 7.0), -7.0 * d);
        assert_eq!(project_component(f64::NAN, d, 7.0), -7.0 * d);
    }

    #[test]
    fn test_projection_decision_regions() {
        let d = Modulation::Qam16.dqam();
        // Boundaries sit at even multiples of dqam
        assert_eq!(project_component(0.0, d, 3.0), d);
        assert_eq!(project_component(-1e-9, d, 3.0), -d);
        assert_eq!(project_component(1.9 * d, d, 3.0), d);
        assert_eq!(project_component(2.1 * d, d, 3.0), 3.0 * d);
    }

    #[test]
    fn test_points_are_fixed_by_projection() {
        let c = Constellation::new(Modulation::Qam64);
        for &p in c.points() {
            assert!((c.project(p) - p).norm() < 1e-12);
        }
    }

    #[test]
    fn test_qam16_label_layout() {
        let c = Constellation::new(Modulation::Qam16);
        let d = c.dqam();
        let expected = [
            (0b0000, -3.0, -3.0),
            (0b0001, -3.0, -1.0),
            (0b0011, -3.0, 1.0),
            (0b0010, -3.0, 3.0),
            (0b0100, -1.0, -3.0),
            (0b1100, 1.0, -3.0),
            (0b1000, 3.0, -3.0),
            (0b1010, 3.0, 3.0),
        ];
        for (label, re, im) in expected {
            let p = c.point_for_label(label);
            assert!((p - Complex64::new(re * d, im * d)).norm() < 1e-12, "label {label:04b}");
        }
    }

    #[test]
    fn test_qpsk_label_layout() {
        let c = Constellation::new(Modulation::Qpsk);
        let d = c.dqam();
        assert_eq!(c.point_for_label(0), Complex64::new(-d, -d));
        assert_eq!(c.point_for_label(1), Complex64::new(-d, d));
        assert_eq!(c.point_for_label(2), Complex64::new(d, -d));
        assert_eq!(c.point_for_label(3), Complex64::new(d, d));
    }

    #[test]
    fn test_gray_neighbors_differ_by_one_bit() {
        let c = Constellation::new(Modulation::Qam64);
        let levels = 8;
        for i in 0..levels {
            for j in 0..levels - 1 {
                let a = c.label(i * levels + j);
                let b = c.label(i * levels + j + 1);
                assert_eq!((a ^ b).count_ones(), 1);
            }
        }
        for k in 0..64 {
            assert_eq!(gray_decode(gray_encode(k)), k);
        }
    }

    #[test]
    fn test_modulate_demodulate_consistency() {
        let c = Constellation::new(Modulation::Qam16);
        let bits: Vec<bool> = [1, 0, 1, 1, 0, 0, 1, 0, 0, 1, 1, 1]
            .iter()
            .map(|&b| b == 1)
            .collect();
        let symbols = c.modulate(&bits).unwrap();
        assert_eq!(symbols.len(), 3);
        assert_eq!(c.demodulate(&symbols), bits);

        // Small offsets stay inside the decision region
        let noisy: Vec<Complex64> = symbols
            .iter()
            .map(|s| s + Complex64::new(0.2 * c.dqam(), -0.3 * c.dqam()))
            .collect();
        assert_eq!(c.demodulate(&noisy), bits);
    }

    #[test]
    fn test_modulate_rejects_partial_symbol() {
        let c = Constellation::new(Modulation::Qam64);
        assert!(matches!(
            c.modulate(&[true; 5]),
            Err(MhgdError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_modulation_serde() {
        let m: Modulation = serde_yaml::from_str("qam64").unwrap();
        assert_eq!(m, Modulation::Qam64);
        assert_eq!(Modulation::default(), Modulation::Qam16);
    }
}
