//! Gauss-Legendre quadrature and the angular grids shared by the solver.
//!
//! Two grids are used throughout the crate:
//!
//! - [`AngularGrid`]: the discrete-ordinate grid of the successive-orders
//!   solver. Zenith cosines are stored by signed offset from the horizon so
//!   that slot `k` and slot `-k` are the upward and downward directions of
//!   the same stream. Slot `0` holds the solar incidence `-μs` and slots
//!   `±mu` hold the observer direction. These three sentinel slots carry a
//!   zero weight and never contribute to angular integrals.
//! - [`AerosolGrid`]: the scattering-angle grid on which phase matrices are
//!   tabulated, with explicit nodes at `-1`, `0` and `+1`.

use std::ops::{Index, IndexMut};

use crate::error::{EngineError, Result};

const NEWTON_TOLERANCE: f64 = 1e-13;
const NEWTON_MAX_ITER: usize = 100;

/// Number of Gauss points on [-1, 1] used by the discrete-ordinate grid.
pub const DEFAULT_ZENITH_POINTS: usize = 48;
/// Number of Gauss points on [0, 2π] used for azimuth integration.
pub const DEFAULT_AZIMUTH_POINTS: usize = 49;
/// Number of nodes of the aerosol scattering-angle grid.
pub const DEFAULT_AEROSOL_NODES: usize = 83;

/// Gauss-Legendre abscissas and weights on `[a, b]`, in ascending order.
///
/// # Arguments
/// * `a`, `b` - Integration bounds
/// * `n` - Number of points
///
/// # Returns
/// `(abscissas, weights)`, or [`EngineError::Quadrature`] when Newton's
/// iteration on a root fails to converge.
pub fn gauss(a: f64, b: f64, n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut x = vec![0.0; n];
    let mut w = vec![0.0; n];
    if n == 0 {
        return Ok((x, w));
    }

    let m = n.div_ceil(2);
    let xm = 0.5 * (b + a);
    let xl = 0.5 * (b - a);
    let nf = n as f64;

    for i in 0..m {
        let mut z = (std::f64::consts::PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        let mut pp = 0.0;
        let mut converged = false;

        for _ in 0..NEWTON_MAX_ITER {
            let mut p1 = 1.0;
            let mut p2 = 0.0;
            for j in 1..=n {
                let p3 = p2;
                p2 = p1;
                let jf = j as f64;
                p1 = ((2.0 * jf - 1.0) * z * p2 - (jf - 1.0) * p3) / jf;
            }
            pp = nf * (z * p1 - p2) / (z * z - 1.0);
            let z1 = z;
            z = z1 - p1 / pp;
            if (z - z1).abs() < NEWTON_TOLERANCE {
                converged = true;
                break;
            }
        }

        if !converged || !pp.is_finite() {
            return Err(EngineError::Quadrature { a, b, n });
        }

        x[i] = xm - xl * z;
        x[n - 1 - i] = xm + xl * z;
        w[i] = 2.0 * xl / ((1.0 - z * z) * pp * pp);
        w[n - 1 - i] = w[i];
    }

    Ok((x, w))
}

/// A vector indexed by a signed offset in `-half..=half`.
#[derive(Debug, Clone, PartialEq)]
pub struct Symmetric<T> {
    half: usize,
    data: Vec<T>,
}

impl<T: Clone> Symmetric<T> {
    pub fn filled(half: usize, value: T) -> Self {
        Self {
            half,
            data: vec![value; 2 * half + 1],
        }
    }
}

impl<T> Symmetric<T> {
    pub fn half(&self) -> usize {
        self.half
    }

    pub fn iter(&self) -> impl Iterator<Item = (isize, &T)> {
        let half = self.half as isize;
        self.data
            .iter()
            .enumerate()
            .map(move |(i, v)| (i as isize - half, v))
    }
}

impl<T> Index<isize> for Symmetric<T> {
    type Output = T;

    fn index(&self, k: isize) -> &T {
        &self.data[(k + self.half as isize) as usize]
    }
}

impl<T> IndexMut<isize> for Symmetric<T> {
    fn index_mut(&mut self, k: isize) -> &mut T {
        &mut self.data[(k + self.half as isize) as usize]
    }
}

/// Discrete-ordinate grid for the successive-orders solver.
#[derive(Debug, Clone)]
pub struct AngularGrid {
    mu: usize,
    rm: Symmetric<f64>,
    gb: Symmetric<f64>,
    rp: Vec<f64>,
    gp: Vec<f64>,
}

impl AngularGrid {
    /// Builds the grid.
    ///
    /// # Arguments
    /// * `nquad` - Gauss points on [-1, 1], must be even and at least 4
    /// * `mu_s` - Cosine of the incidence zenith angle (slot 0 holds `-mu_s`)
    /// * `mu_v` - Cosine of the observer zenith angle (slots `±mu`)
    /// * `nphi` - Gauss points on [0, 2π]
    pub fn new(nquad: usize, mu_s: f64, mu_v: f64, nphi: usize) -> Result<Self> {
        if nquad < 4 || nquad % 2 != 0 {
            return Err(EngineError::Numerical {
                stage: "angular grid",
                reason: format!("zenith point count must be even and >= 4, got {}", nquad),
            });
        }
        if nphi == 0 {
            return Err(EngineError::Numerical {
                stage: "angular grid",
                reason: "azimuth point count must be positive".to_string(),
            });
        }

        let (anglem, weightm) = gauss(-1.0, 1.0, nquad)?;
        let mu = nquad / 2 + 1;
        let mut rm = Symmetric::filled(mu, 0.0);
        let mut gb = Symmetric::filled(mu, 0.0);

        // anglem is ascending: its first half holds the downward streams
        for j in 1..mu {
            let k = j as isize;
            rm[-k] = anglem[j - 1];
            gb[-k] = weightm[j - 1];
            rm[k] = anglem[nquad - j];
            gb[k] = weightm[nquad - j];
        }

        let (rp, gp) = gauss(0.0, 2.0 * std::f64::consts::PI, nphi)?;

        let mut grid = Self { mu, rm, gb, rp, gp };
        grid.set_directions(mu_s, mu_v);
        Ok(grid)
    }

    /// Default grid: 48 zenith points and 49 azimuth points.
    pub fn standard(mu_s: f64, mu_v: f64) -> Result<Self> {
        Self::new(DEFAULT_ZENITH_POINTS, mu_s, mu_v, DEFAULT_AZIMUTH_POINTS)
    }

    fn set_directions(&mut self, mu_s: f64, mu_v: f64) {
        let mu = self.mu as isize;
        self.rm[0] = -mu_s;
        self.rm[mu] = mu_v;
        self.rm[-mu] = -mu_v;
        self.gb[0] = 0.0;
        self.gb[mu] = 0.0;
        self.gb[-mu] = 0.0;
    }

    /// Copy of the grid with different incidence and observer cosines.
    pub fn with_directions(&self, mu_s: f64, mu_v: f64) -> Self {
        let mut grid = self.clone();
        grid.set_directions(mu_s, mu_v);
        grid
    }

    /// Index of the observer slot. Gauss streams occupy `1..mu`.
    pub fn mu(&self) -> usize {
        self.mu
    }

    pub fn rm(&self, k: isize) -> f64 {
        self.rm[k]
    }

    pub fn gb(&self, k: isize) -> f64 {
        self.gb[k]
    }

    pub fn mu_s(&self) -> f64 {
        -self.rm[0]
    }

    pub fn mu_v(&self) -> f64 {
        self.rm[self.mu as isize]
    }

    pub fn azimuths(&self) -> &[f64] {
        &self.rp
    }

    pub fn azimuth_weights(&self) -> &[f64] {
        &self.gp
    }
}

/// Scattering-angle grid for tabulated phase matrices, ascending in cosine.
#[derive(Debug, Clone, PartialEq)]
pub struct AerosolGrid {
    pub cos: Vec<f64>,
    pub weights: Vec<f64>,
}

impl AerosolGrid {
    /// Builds `nodes` points: `-1`, Gauss nodes on `[-1, 0)`, `0`, Gauss
    /// nodes on `(0, 1]`, `+1`. `nodes` must be odd and at least 5.
    pub fn new(nodes: usize) -> Result<Self> {
        if nodes < 5 || nodes % 2 == 0 {
            return Err(EngineError::Numerical {
                stage: "aerosol grid",
                reason: format!("node count must be odd and >= 5, got {}", nodes),
            });
        }
        let ng = nodes - 3;
        let half = ng / 2;
        let (x, w) = gauss(-1.0, 1.0, ng)?;

        let mut cos = Vec::with_capacity(nodes);
        let mut weights = Vec::with_capacity(nodes);
        cos.push(-1.0);
        weights.push(0.0);
        cos.extend_from_slice(&x[..half]);
        weights.extend_from_slice(&w[..half]);
        cos.push(0.0);
        weights.push(0.0);
        cos.extend_from_slice(&x[half..]);
        weights.extend_from_slice(&w[half..]);
        cos.push(1.0);
        weights.push(0.0);

        Ok(Self { cos, weights })
    }

    pub fn standard() -> Result<Self> {
        Self::new(DEFAULT_AEROSOL_NODES)
    }

    pub fn len(&self) -> usize {
        self.cos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cos.is_empty()
    }

    /// Bracketing node `j` with `cos[j] <= x < cos[j + 1]` and the
    /// interpolation coefficient used for linear interpolation in cosine.
    pub fn bracket(&self, x: f64) -> (usize, f64) {
        let n = self.cos.len();
        let mut j = n - 2;
        for k in 0..n - 1 {
            if x >= self.cos[k] && x < self.cos[k + 1] {
                j = k;
                break;
            }
        }
        let t = (x - self.cos[j]) / (self.cos[j + 1] - self.cos[j]);
        (j, t)
    }

    /// Linear interpolation of a table sampled on this grid.
    pub fn interpolate(&self, values: &[f64], x: f64) -> f64 {
        let (j, t) = self.bracket(x);
        values[j] + t * (values[j + 1] - values[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_gauss_weights_sum_to_interval() {
        for n in [2, 5, 24, 48, 80] {
            let (_, w) = gauss(-1.0, 1.0, n).unwrap();
            let sum: f64 = w.iter().sum();
            assert!((sum - 2.0).abs() < 1e-9, "n = {}, sum = {}", n, sum);
        }
        let (_, w) = gauss(0.0, 2.0 * PI, 49).unwrap();
        assert_abs_diff_eq!(w.iter().sum::<f64>(), 2.0 * PI, epsilon = 1e-9);
    }

    #[test]
    fn test_gauss_is_exact_for_polynomials() {
        let n = 6;
        let (x, w) = gauss(0.0, 1.0, n).unwrap();
        // degree 2n - 1 = 11
        let integral: f64 = x.iter().zip(&w).map(|(x, w)| w * x.powi(11)).sum();
        assert_abs_diff_eq!(integral, 1.0 / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_gauss_is_ascending_and_symmetric() {
        let (x, w) = gauss(-1.0, 1.0, 7).unwrap();
        assert!(x.windows(2).all(|p| p[0] < p[1]));
        assert_abs_diff_eq!(x[3], 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(x[0], -x[6], epsilon = 1e-14);
        assert_abs_diff_eq!(w[1], w[5], epsilon = 1e-14);
    }

    #[test]
    fn test_angular_grid_layout() {
        let grid = AngularGrid::standard(0.8, 0.9).unwrap();
        let mu = grid.mu() as isize;
        assert_eq!(mu, 25);
        assert_abs_diff_eq!(grid.rm(0), -0.8);
        assert_abs_diff_eq!(grid.rm(mu), 0.9);
        assert_abs_diff_eq!(grid.rm(-mu), -0.9);
        assert!(grid.rm(1) > 0.99 && grid.rm(1) < 1.0);
        for k in 1..mu {
            assert_abs_diff_eq!(grid.rm(k), -grid.rm(-k), epsilon = 1e-14);
            if k > 1 {
                assert!(grid.rm(k) < grid.rm(k - 1));
            }
        }
        let upper: f64 = (1..mu).map(|k| grid.gb(k)).sum();
        assert_abs_diff_eq!(upper, 1.0, epsilon = 1e-9);
        assert_eq!(grid.gb(0), 0.0);
        assert_eq!(grid.gb(mu), 0.0);
    }

    #[test]
    fn test_with_directions_swaps_sentinels() {
        let grid = AngularGrid::standard(0.8, 0.9).unwrap();
        let swapped = grid.with_directions(0.9, 0.8);
        assert_abs_diff_eq!(swapped.mu_s(), 0.9);
        assert_abs_diff_eq!(swapped.mu_v(), 0.8);
        assert_abs_diff_eq!(swapped.rm(3), grid.rm(3));
    }

    #[test]
    fn test_invalid_grid_sizes() {
        assert!(AngularGrid::new(7, 1.0, 1.0, 49).is_err());
        assert!(AerosolGrid::new(82).is_err());
    }

    #[test]
    fn test_aerosol_grid() {
        let grid = AerosolGrid::standard().unwrap();
        assert_eq!(grid.len(), 83);
        assert_eq!(grid.cos[0], -1.0);
        assert_eq!(grid.cos[41], 0.0);
        assert_eq!(grid.cos[82], 1.0);
        assert!(grid.cos.windows(2).all(|p| p[0] < p[1]));
        assert_abs_diff_eq!(grid.weights.iter().sum::<f64>(), 2.0, epsilon = 1e-9);

        let values: Vec<f64> = grid.cos.iter().map(|c| 2.0 * c + 1.0).collect();
        assert_abs_diff_eq!(grid.interpolate(&values, 0.37), 1.74, epsilon = 1e-12);
    }
}
