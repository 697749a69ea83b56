//! Forward-peak truncation and Legendre expansion of aerosol phase matrices.

use log::debug;

use super::LegendreSeries;
use super::legendre::{associated, generalized};
use crate::quadrature::AerosolGrid;

/// Scattering angle below which the forward peak is replaced.
const PEAK_ANGLE_DEG: f64 = 16.0;

/// Truncated expansion of one phase matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncated {
    pub series: LegendreSeries,
    /// Fraction of ½∫P11 removed with the forward peak
    pub coeff: f64,
}

/// Node of the grid closest to the peak cut-off angle.
fn peak_node(grid: &AerosolGrid) -> usize {
    let target = PEAK_ANGLE_DEG.to_radians().cos();
    let mut best = 0;
    for (k, c) in grid.cos.iter().enumerate() {
        if (c - target).abs() < (grid.cos[best] - target).abs() {
            best = k;
        }
    }
    best
}

/// Replaces the forward peak of `p11` by a log-linear continuation in
/// cos θ. Returns the truncated function.
fn flatten_peak(p11: &[f64], grid: &AerosolGrid) -> Vec<f64> {
    let mut out = p11.to_vec();
    let kk = peak_node(grid);
    if kk == 0 || kk + 1 >= p11.len() {
        return out;
    }
    let (p0, p1) = (p11[kk - 1], p11[kk]);
    if p0 <= 0.0 || p1 <= 0.0 {
        debug!("phase function not positive at the peak cut-off, keeping it whole");
        return out;
    }
    let aa = (p1 / p0).ln() / (grid.cos[kk] - grid.cos[kk - 1]);
    for j in kk + 1..p11.len() {
        out[j] = p1 * (aa * (grid.cos[j] - grid.cos[kk])).exp();
    }
    out
}

/// Expands one phase matrix sampled on `grid`.
///
/// # Arguments
/// * `p11`, `q`, `u` - P11, P12 and P33 at the grid nodes (`q` and `u`
///   are ignored unless `polarized`)
/// * `grid` - Aerosol scattering-angle grid
/// * `nterms` - Highest Legendre degree kept
/// * `polarized` - Whether to expand the polarized elements
pub fn truncate(
    p11: &[f64],
    q: &[f64],
    u: &[f64],
    grid: &AerosolGrid,
    nterms: usize,
    polarized: bool,
) -> Truncated {
    let len = nterms + 1;
    let mut series = LegendreSeries::zeros(len);
    let trunc = flatten_peak(p11, grid);

    let full: f64 = 0.5 * p11.iter().zip(&grid.weights).map(|(p, w)| p * w).sum::<f64>();
    let kept: f64 = 0.5 * trunc.iter().zip(&grid.weights).map(|(p, w)| p * w).sum::<f64>();
    if kept <= 0.0 {
        series.beta[0] = 1.0;
        return Truncated { series, coeff: 0.0 };
    }
    let coeff = if full > 0.0 { (full - kept) / full } else { 0.0 };

    for (k, (&x, &w)) in grid.cos.iter().zip(&grid.weights).enumerate() {
        if w == 0.0 {
            continue;
        }
        let pl = associated(0, nterms, x);
        for l in 0..len {
            series.beta[l] += w * trunc[k] * pl[l];
        }
        if !polarized {
            continue;
        }
        // polarized elements keep their ratio to P11 inside the peak
        let ratio = if p11[k] != 0.0 { trunc[k] / p11[k] } else { 0.0 };
        let qk = q[k] * ratio;
        let uk = u[k] * ratio;
        let p02 = generalized(0, true, nterms, x);
        let p22 = generalized(2, true, nterms, x);
        let p2m2 = generalized(2, false, nterms, x);
        for l in 2..len {
            series.gamma[l] += w * qk * p02[l];
            // for spheres P22 = P11
            let plus = w * (trunc[k] + uk) * p22[l];
            let minus = w * (trunc[k] - uk) * p2m2[l];
            series.alpha[l] += 0.5 * (plus + minus);
            series.zeta[l] += 0.5 * (plus - minus);
        }
    }

    for l in 0..len {
        let f = (2.0 * l as f64 + 1.0) / 2.0 / kept;
        series.beta[l] *= f;
        series.gamma[l] *= f;
        series.alpha[l] *= f;
        series.zeta[l] *= f;
    }
    series.beta[0] = 1.0;
    series.cut_at_first_negative();

    Truncated { series, coeff }
}

/// δ-M scaling of an aerosol layer: returns `(τ', ω')`.
pub fn scale_layer(tau: f64, omega: f64, coeff: f64) -> (f64, f64) {
    let denom = 1.0 - omega * coeff;
    if denom <= 0.0 {
        return (tau, omega);
    }
    (tau * denom, omega * (1.0 - coeff) / denom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::rayleigh;

    fn henyey_greenstein(g: f64, x: f64) -> f64 {
        (1.0 - g * g) / (1.0 + g * g - 2.0 * g * x).powf(1.5)
    }

    #[test]
    fn test_rayleigh_expansion_is_exact() {
        let grid = AerosolGrid::standard().unwrap();
        let mut p = Vec::new();
        let mut q = Vec::new();
        let mut u = Vec::new();
        for &x in &grid.cos {
            let (a, b, c) = rayleigh::phase(x);
            p.push(a);
            q.push(b);
            u.push(c);
        }
        let t = truncate(&p, &q, &u, &grid, 20, true);
        let c = rayleigh::coefficients();
        assert!(t.coeff.abs() < 1e-3, "Expected no peak, got {:.4}", t.coeff);
        assert!((t.series.beta[2] - c.beta2).abs() < 2e-3);
        assert!((t.series.gamma[2] - c.gamma2).abs() < 2e-3);
        assert!(t.series.beta[4].abs() < 1e-3);
    }

    #[test]
    fn test_forward_peak_is_removed() {
        let grid = AerosolGrid::standard().unwrap();
        let p: Vec<f64> = grid.cos.iter().map(|&x| henyey_greenstein(0.85, x)).collect();
        let zeros = vec![0.0; p.len()];
        let t = truncate(&p, &zeros, &zeros, &grid, 80, false);
        assert!(t.coeff > 0.05 && t.coeff < 0.9, "Expected a sizeable peak, got {:.3}", t.coeff);
        assert_eq!(t.series.beta[0], 1.0);
        // asymmetry of the truncated function is below the full one
        let g = t.series.beta[1] / 3.0;
        assert!(g < 0.85, "Expected g below 0.85, got {:.3}", g);
        if let Some(first) = t.series.beta.iter().position(|b| *b < 0.0) {
            panic!("negative beta left at order {}", first);
        }
    }

    #[test]
    fn test_delta_m_scaling() {
        let (tau, omega) = scale_layer(0.5, 0.9, 0.2);
        assert!((tau - 0.5 * (1.0 - 0.18)).abs() < 1e-12);
        assert!((omega - 0.9 * 0.8 / 0.82).abs() < 1e-12);
        assert_eq!(scale_layer(0.3, 1.0, 0.0), (0.3, 1.0));
    }
}
