//! Phase-matrix expansion in generalized spherical functions.

pub mod legendre;
pub mod truncation;

use crate::atmosphere::rayleigh;

pub use truncation::{Truncated, scale_layer, truncate};

/// Magnitude, relative to `beta[0]`, below which a negative `beta` is
/// treated as zero by [`LegendreSeries::cut_at_first_negative`].
const NEGATIVE_TOLERANCE: f64 = 1e-10;

/// Expansion coefficients of a phase matrix for spheres.
///
/// `beta` expands P11 in Legendre polynomials with `beta[0] = 1`; `gamma`
/// expands P12, and `alpha`/`zeta` expand the P22/P33 block. All four
/// vectors have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendreSeries {
    pub alpha: Vec<f64>,
    pub beta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub zeta: Vec<f64>,
}

impl LegendreSeries {
    /// A series of `len` zero coefficients.
    pub fn zeros(len: usize) -> Self {
        Self {
            alpha: vec![0.0; len],
            beta: vec![0.0; len],
            gamma: vec![0.0; len],
            zeta: vec![0.0; len],
        }
    }

    /// Depolarized Rayleigh matrix: only orders 0 and 2 are non-zero.
    pub fn rayleigh(len: usize) -> Self {
        let mut s = Self::zeros(len.max(3));
        let c = rayleigh::coefficients();
        s.beta[0] = 1.0;
        s.beta[2] = c.beta2;
        s.gamma[2] = c.gamma2;
        s.alpha[2] = c.alpha2;
        s
    }

    pub fn len(&self) -> usize {
        self.beta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beta.is_empty()
    }

    /// Highest degree carried.
    pub fn max_order(&self) -> usize {
        self.beta.len().saturating_sub(1)
    }

    /// Zeroes every coefficient from the first negative `beta` onwards.
    /// Values within rounding noise of zero, relative to `beta[0]`, count
    /// as zero and are kept.
    pub fn cut_at_first_negative(&mut self) {
        let scale = self.beta.first().map_or(1.0, |b| b.abs().max(1.0));
        let floor = -NEGATIVE_TOLERANCE * scale;
        if let Some(first) = self.beta.iter().position(|b| *b < floor) {
            for v in [&mut self.alpha, &mut self.beta, &mut self.gamma, &mut self.zeta] {
                v[first..].iter_mut().for_each(|c| *c = 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_at_first_negative() {
        let mut s = LegendreSeries::zeros(6);
        s.beta = vec![1.0, 0.8, 0.3, -0.01, 0.02, 0.01];
        s.gamma = vec![0.0, 0.0, 0.1, 0.1, 0.1, 0.1];
        s.cut_at_first_negative();
        assert_eq!(s.beta, vec![1.0, 0.8, 0.3, 0.0, 0.0, 0.0]);
        assert_eq!(s.gamma, vec![0.0, 0.0, 0.1, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rounding_noise_is_not_negative() {
        let mut s = LegendreSeries::zeros(5);
        s.beta = vec![1.0, -1e-17, 0.5, 1e-3, 2e-4];
        s.alpha = vec![0.0, 0.0, 0.4, 0.01, 0.001];
        s.cut_at_first_negative();
        assert_eq!(s.beta, vec![1.0, -1e-17, 0.5, 1e-3, 2e-4]);
        assert_eq!(s.alpha[2], 0.4);

        s.beta[3] = -0.01;
        s.cut_at_first_negative();
        assert_eq!(s.beta, vec![1.0, -1e-17, 0.5, 0.0, 0.0]);
        assert_eq!(s.alpha, vec![0.0, 0.0, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn test_rayleigh_series() {
        let s = LegendreSeries::rayleigh(10);
        assert_eq!(s.len(), 10);
        assert_eq!(s.beta[0], 1.0);
        assert!((s.beta[2] - 0.5 * s.alpha[2] / 3.0).abs() < 1e-15);
        assert!(s.gamma[2] < 0.0);
    }
}
