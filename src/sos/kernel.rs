//! Azimuthal Fourier components of the scattering kernels.

use crate::phase::LegendreSeries;
use crate::phase::legendre::{associated, rt};
use crate::quadrature::{AngularGrid, Symmetric};

/// Kernels of one Fourier order `m` on the discrete-ordinate grid.
///
/// `bp(j, k)` couples intensity to intensity. The polarized kernels
/// `gr`, `gt` (intensity to Q/U) and `arr`, `art`, `att` (Q/U to Q/U) are
/// only filled when requested. `xpl`, `xrl` and `xtl` hold the degree-2
/// functions that carry the analytic Rayleigh matrix.
#[derive(Debug, Clone)]
pub struct Kernel {
    mu: usize,
    pub xpl: Symmetric<f64>,
    pub xrl: Symmetric<f64>,
    pub xtl: Symmetric<f64>,
    bp: Vec<f64>,
    gr: Vec<f64>,
    gt: Vec<f64>,
    arr: Vec<f64>,
    art: Vec<f64>,
    att: Vec<f64>,
}

impl Kernel {
    pub fn build(m: usize, grid: &AngularGrid, series: &LegendreSeries, polarized: bool) -> Self {
        let mu = grid.mu();
        let lmax = series.max_order().max(2);
        let n = 2 * mu + 1;

        let mut psl = Vec::with_capacity(n);
        let mut r = Vec::with_capacity(n);
        let mut t = Vec::with_capacity(n);
        let mut xpl = Symmetric::filled(mu, 0.0);
        let mut xrl = Symmetric::filled(mu, 0.0);
        let mut xtl = Symmetric::filled(mu, 0.0);
        for k in -(mu as isize)..=(mu as isize) {
            let x = grid.rm(k);
            let p = associated(m, lmax, x);
            xpl[k] = p[2];
            psl.push(p);
            if polarized {
                let (rk, tk) = rt(m, lmax, x);
                xrl[k] = rk[2];
                xtl[k] = tk[2];
                r.push(rk);
                t.push(tk);
            }
        }

        let size = (mu + 1) * n;
        let mut kernel = Self {
            mu,
            xpl,
            xrl,
            xtl,
            bp: vec![0.0; size],
            gr: Vec::new(),
            gt: Vec::new(),
            arr: Vec::new(),
            art: Vec::new(),
            att: Vec::new(),
        };
        let nl = series.len().min(lmax + 1);

        for j in 0..=mu {
            let pj = &psl[j + mu];
            for (kk, pk) in psl.iter().enumerate() {
                let mut s = 0.0;
                for l in m..nl {
                    s += series.beta[l] * pj[l] * pk[l];
                }
                kernel.bp[j * n + kk] = s;
            }
        }

        if polarized {
            kernel.gr = vec![0.0; size];
            kernel.gt = vec![0.0; size];
            kernel.arr = vec![0.0; size];
            kernel.art = vec![0.0; size];
            kernel.att = vec![0.0; size];
            for j in 0..=mu {
                let (pj, rj, tj) = (&psl[j + mu], &r[j + mu], &t[j + mu]);
                for kk in 0..n {
                    let (rk, tk) = (&r[kk], &t[kk]);
                    let (mut gr, mut gt, mut arr, mut art, mut att) = (0.0, 0.0, 0.0, 0.0, 0.0);
                    for l in m.max(2)..nl {
                        let (a, g, z) = (series.alpha[l], series.gamma[l], series.zeta[l]);
                        gr += g * pj[l] * rk[l];
                        gt += g * pj[l] * tk[l];
                        arr += a * rj[l] * rk[l] + z * tj[l] * tk[l];
                        art += a * tj[l] * rk[l] + z * rj[l] * tk[l];
                        att += a * tj[l] * tk[l] + z * rj[l] * rk[l];
                    }
                    let idx = j * n + kk;
                    kernel.gr[idx] = gr;
                    kernel.gt[idx] = gt;
                    kernel.arr[idx] = arr;
                    kernel.art[idx] = art;
                    kernel.att[idx] = att;
                }
            }
        }
        kernel
    }

    fn idx(&self, j: usize, k: isize) -> usize {
        j * (2 * self.mu + 1) + (k + self.mu as isize) as usize
    }

    pub fn bp(&self, j: usize, k: isize) -> f64 {
        self.bp[self.idx(j, k)]
    }

    pub fn is_polarized(&self) -> bool {
        !self.gr.is_empty()
    }

    pub fn gr(&self, j: usize, k: isize) -> f64 {
        self.gr[self.idx(j, k)]
    }

    pub fn gt(&self, j: usize, k: isize) -> f64 {
        self.gt[self.idx(j, k)]
    }

    pub fn arr(&self, j: usize, k: isize) -> f64 {
        self.arr[self.idx(j, k)]
    }

    pub fn art(&self, j: usize, k: isize) -> f64 {
        self.art[self.idx(j, k)]
    }

    pub fn att(&self, j: usize, k: isize) -> f64 {
        self.att[self.idx(j, k)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rayleigh_kernel_matches_closed_form() {
        let grid = AngularGrid::standard(0.8, 0.6).unwrap();
        let series = LegendreSeries::rayleigh(10);
        let kernel = Kernel::build(0, &grid, &series, false);
        for (j, k) in [(1usize, 3isize), (0, -5), (7, 12)] {
            let expected = 1.0 + series.beta[2] * kernel.xpl[j as isize] * kernel.xpl[k];
            assert!((kernel.bp(j, k) - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_high_orders_vanish_for_rayleigh() {
        let grid = AngularGrid::standard(0.8, 0.6).unwrap();
        let series = LegendreSeries::rayleigh(10);
        let kernel = Kernel::build(3, &grid, &series, true);
        assert!(kernel.is_polarized());
        assert_eq!(kernel.bp(2, -4), 0.0);
        assert_eq!(kernel.gr(2, 4), 0.0);
        assert_eq!(kernel.att(1, 1), 0.0);
    }
}
