//! Mie scattering by polydisperse spheres.
//!
//! The single-particle solution follows Bohren & Huffman, *Absorption and
//! Scattering of Light by Small Particles* (1983): the logarithmic
//! derivative D_n(mx) is obtained by downward recurrence and the
//! Riccati-Bessel functions of the size parameter by upward recurrence.
//! Cross-sections are integrated over each mode on a logarithmic radius
//! grid, then the modes are mixed by volume.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::mixture::{self, Constituent};
use super::{NB_WAVELENGTHS, OpticalTable, RawOptics, WAVELENGTHS};
use crate::config::ConfigError;
use crate::error::Result;
use crate::quadrature::AerosolGrid;

pub const MAX_MODES: usize = 4;

/// Logarithmic radius step: r_{k+1} = r_k · 10^0.011.
const RADIUS_STEP: f64 = 0.011;

/// Particle number density n(r) = dN/dr of one mode (r in µm).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distribution {
    LogNormal { mean_radius: f64, sigma: f64 },
    ModifiedGamma { alpha: f64, b: f64, gamma: f64 },
    /// Junge power law with a flat core below 0.1 µm
    PowerLaw { exponent: f64 },
    /// Sun-photometer volume distribution dV/dlog r sampled at radii
    Histogram { radius: Vec<f64>, dv_dlogr: Vec<f64> },
}

impl Distribution {
    pub fn density(&self, r: f64) -> f64 {
        match self {
            Distribution::LogNormal { mean_radius, sigma } => {
                let ls = sigma.log10();
                let lr = (r / mean_radius).log10();
                (-(lr * lr) / (2.0 * ls * ls)).exp()
                    / ((2.0 * PI).sqrt() * std::f64::consts::LN_10 * r * ls)
            }
            Distribution::ModifiedGamma { alpha, b, gamma } => {
                let expo = -b * r.powf(*gamma);
                if expo < -300.0 {
                    0.0
                } else {
                    r.powf(*alpha) * expo.exp()
                }
            }
            Distribution::PowerLaw { exponent } => {
                let r0 = 0.1;
                if r < r0 {
                    r0.powf(-exponent)
                } else {
                    r.powf(-exponent)
                }
            }
            Distribution::Histogram { radius, dv_dlogr } => {
                let n = radius.len();
                if n < 2 || r < radius[0] || r > radius[n - 1] {
                    return 0.0;
                }
                let k = radius
                    .windows(2)
                    .position(|w| r >= w[0] && r <= w[1])
                    .unwrap_or(n - 2);
                let f = (r / radius[k]).ln() / (radius[k + 1] / radius[k]).ln();
                let dv = dv_dlogr[k] + f * (dv_dlogr[k + 1] - dv_dlogr[k]);
                dv * 3.0 / (4.0 * PI * r.powi(4))
            }
        }
    }

    /// Radius range imposed by the distribution itself.
    fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Distribution::Histogram { radius, .. } => {
                Some((radius.first().copied()?, radius.last().copied()?))
            }
            _ => None,
        }
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        let ok = match self {
            Distribution::LogNormal { mean_radius, sigma } => *mean_radius > 0.0 && *sigma > 1.0,
            Distribution::ModifiedGamma { b, gamma, .. } => *b > 0.0 && *gamma > 0.0,
            Distribution::PowerLaw { exponent } => exponent.is_finite(),
            Distribution::Histogram { radius, dv_dlogr } => {
                radius.len() >= 2
                    && radius.len() == dv_dlogr.len()
                    && radius[0] > 0.0
                    && radius.windows(2).all(|w| w[1] > w[0])
                    && dv_dlogr.iter().all(|v| *v >= 0.0)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::Aerosol(format!("invalid size distribution {:?}", self)))
        }
    }
}

/// One mode of a size distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub distribution: Distribution,
    /// Volume fraction of the mode
    pub fraction: f64,
    /// Real refractive index, one value or one per reference wavelength
    pub real_index: Vec<f64>,
    /// Imaginary refractive index (absorption, positive)
    pub imag_index: Vec<f64>,
}

impl Mode {
    fn index_at(&self, l: usize) -> Complex64 {
        let pick = |v: &Vec<f64>| if v.len() == 1 { v[0] } else { v[l] };
        Complex64::new(pick(&self.real_index), pick(&self.imag_index).abs())
    }
}

fn default_r_min() -> f64 {
    0.005
}

fn default_r_max() -> f64 {
    25.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeDistribution {
    #[serde(default = "default_r_min")]
    pub r_min: f64,
    #[serde(default = "default_r_max")]
    pub r_max: f64,
    pub modes: Vec<Mode>,
}

impl SizeDistribution {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.modes.len() > MAX_MODES {
            return Err(ConfigError::TooManyModes(self.modes.len()));
        }
        if self.modes.is_empty() {
            return Err(ConfigError::Aerosol("size distribution has no mode".to_string()));
        }
        if !(self.r_min > 0.0 && self.r_max > self.r_min) {
            return Err(ConfigError::Aerosol(format!(
                "invalid radius range [{}, {}]",
                self.r_min, self.r_max
            )));
        }
        for mode in &self.modes {
            mode.distribution.validate()?;
            for values in [&mode.real_index, &mode.imag_index] {
                if values.len() != 1 && values.len() != NB_WAVELENGTHS {
                    return Err(ConfigError::Aerosol(format!(
                        "refractive index needs 1 or {} values, got {}",
                        NB_WAVELENGTHS,
                        values.len()
                    )));
                }
            }
            if mode.real_index.iter().any(|n| *n <= 0.0) || mode.fraction < 0.0 {
                return Err(ConfigError::Aerosol(
                    "refractive index and fractions must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Single-sphere solution at the requested scattering cosines.
#[derive(Debug, Clone)]
pub struct MieSolution {
    pub qext: f64,
    pub qsca: f64,
    pub s1: Vec<Complex64>,
    pub s2: Vec<Complex64>,
}

/// Scattering by one sphere of size parameter `x` and relative
/// refractive index `m` (imaginary part positive for absorption).
pub fn scatter(x: f64, m: Complex64, cos: &[f64]) -> MieSolution {
    let nstop = ((x + 4.0 * x.cbrt() + 2.0).ceil() as usize).max(2);
    let mx = m * x;
    let nmx = (nstop as f64).max(mx.norm()).ceil() as usize + 15;

    // D_n(mx), downward
    let mut d = vec![Complex64::new(0.0, 0.0); nmx + 1];
    for n in (1..=nmx).rev() {
        let en = Complex64::new(n as f64, 0.0) / mx;
        d[n - 1] = en - 1.0 / (d[n] + en);
    }

    let nang = cos.len();
    let mut s1 = vec![Complex64::new(0.0, 0.0); nang];
    let mut s2 = vec![Complex64::new(0.0, 0.0); nang];
    let mut pi0 = vec![0.0; nang];
    let mut pi1 = vec![1.0; nang];

    let mut psi0 = x.cos();
    let mut psi1 = x.sin();
    let mut chi0 = -x.sin();
    let mut chi1 = x.cos();
    let mut xi1 = Complex64::new(psi1, -chi1);

    let mut qext = 0.0;
    let mut qsca = 0.0;

    for n in 1..=nstop {
        let nf = n as f64;
        let fn_ = (2.0 * nf + 1.0) / (nf * (nf + 1.0));
        let psi = (2.0 * nf - 1.0) * psi1 / x - psi0;
        let chi = (2.0 * nf - 1.0) * chi1 / x - chi0;
        let xi = Complex64::new(psi, -chi);

        let da = d[n] / m + nf / x;
        let db = d[n] * m + nf / x;
        let an = (da * psi - psi1) / (da * xi - xi1);
        let bn = (db * psi - psi1) / (db * xi - xi1);

        qext += (2.0 * nf + 1.0) * (an.re + bn.re);
        qsca += (2.0 * nf + 1.0) * (an.norm_sqr() + bn.norm_sqr());

        for j in 0..nang {
            let mu = cos[j];
            let tau = nf * mu * pi1[j] - (nf + 1.0) * pi0[j];
            s1[j] += fn_ * (an * pi1[j] + bn * tau);
            s2[j] += fn_ * (an * tau + bn * pi1[j]);
        }

        for j in 0..nang {
            let p = pi1[j];
            pi1[j] = ((2.0 * nf + 1.0) * cos[j] * p - (nf + 1.0) * pi0[j]) / nf;
            pi0[j] = p;
        }

        psi0 = psi1;
        psi1 = psi;
        chi0 = chi1;
        chi1 = chi;
        xi1 = Complex64::new(psi1, -chi1);
    }

    let scale = 2.0 / (x * x);
    MieSolution {
        qext: qext * scale,
        qsca: qsca * scale,
        s1,
        s2,
    }
}

fn radii(r_min: f64, r_max: f64) -> Vec<(f64, f64)> {
    let factor = 10f64.powf(RADIUS_STEP) - 1.0;
    let mut out = Vec::new();
    let mut r = r_min;
    while r <= r_max {
        let dr = r * factor;
        out.push((r, dr));
        r += dr;
    }
    out
}

struct SpectralOptics {
    extinction: f64,
    scattering: f64,
    asymmetry: f64,
    p11: Vec<f64>,
    q: Vec<f64>,
    u: Vec<f64>,
}

fn integrate_wavelength(
    mode: &Mode,
    radii: &[(f64, f64)],
    wl: f64,
    m: Complex64,
    grid: &AerosolGrid,
) -> SpectralOptics {
    let nodes = grid.len();
    let mut ext = 0.0;
    let mut sca = 0.0;
    let mut p11 = vec![0.0; nodes];
    let mut q = vec![0.0; nodes];
    let mut u = vec![0.0; nodes];

    for &(r, dr) in radii {
        let nr = mode.distribution.density(r);
        if nr <= 0.0 {
            continue;
        }
        let x = 2.0 * PI * r / wl;
        let sol = scatter(x, m, &grid.cos);
        let xndpr2 = nr * dr * PI * r * r;
        ext += xndpr2 * sol.qext;
        sca += xndpr2 * sol.qsca;
        let norm = 4.0 * xndpr2 / (2.0 * x * x);
        for k in 0..nodes {
            let (a, b) = (sol.s1[k], sol.s2[k]);
            p11[k] += norm * (a.norm_sqr() + b.norm_sqr());
            q[k] += norm * (b.norm_sqr() - a.norm_sqr());
            u[k] += norm * 2.0 * (b * a.conj()).re;
        }
    }

    if sca > 0.0 {
        for v in p11.iter_mut().chain(q.iter_mut()).chain(u.iter_mut()) {
            *v /= sca;
        }
    } else {
        p11.iter_mut().for_each(|v| *v = 0.0);
        q.iter_mut().for_each(|v| *v = 0.0);
        u.iter_mut().for_each(|v| *v = 0.0);
    }

    let weighted: f64 = (0..nodes).map(|k| p11[k] * grid.weights[k]).sum();
    let asymmetry = if weighted > 0.0 {
        (0..nodes)
            .map(|k| grid.cos[k] * p11[k] * grid.weights[k])
            .sum::<f64>()
            / weighted
    } else {
        0.0
    };

    SpectralOptics {
        extinction: ext,
        scattering: sca,
        asymmetry,
        p11,
        q,
        u,
    }
}

/// Optics of one mode at the reference wavelengths, with its volume.
pub fn mode_optics(mode: &Mode, r_min: f64, r_max: f64, grid: &AerosolGrid) -> (RawOptics, f64) {
    let (lo, hi) = mode.distribution.bounds().unwrap_or((r_min, r_max));
    let radii = radii(lo, hi);

    let volume: f64 = radii
        .iter()
        .map(|&(r, dr)| 4.0 / 3.0 * PI * r.powi(3) * mode.distribution.density(r) * dr)
        .sum();

    let spectral: Vec<SpectralOptics> = (0..NB_WAVELENGTHS)
        .into_par_iter()
        .map(|l| integrate_wavelength(mode, &radii, WAVELENGTHS[l], mode.index_at(l), grid))
        .collect();

    let mut raw = RawOptics::default();
    for s in spectral {
        raw.extinction.push(s.extinction);
        raw.scattering.push(s.scattering);
        raw.asymmetry.push(s.asymmetry);
        raw.p11.push(s.p11);
        raw.q.push(s.q);
        raw.u.push(s.u);
    }
    (raw, volume)
}

/// Optical table of a size distribution.
pub fn build(sd: &SizeDistribution, grid: &AerosolGrid, name: &str) -> Result<OpticalTable> {
    sd.validate()?;
    let modes: Vec<(RawOptics, f64)> = sd
        .modes
        .iter()
        .map(|mode| mode_optics(mode, sd.r_min, sd.r_max, grid))
        .collect();
    let parts: Vec<Constituent> = modes
        .iter()
        .zip(&sd.modes)
        .map(|((optics, volume), mode)| Constituent {
            optics,
            volume: *volume,
            fraction: mode.fraction,
        })
        .collect();
    mixture::mix(name, &parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::REFERENCE_INDEX;

    #[test]
    fn test_small_sphere_rayleigh_limit() {
        let m = Complex64::new(1.5, 0.0);
        let x = 0.01;
        let sol = scatter(x, m, &[-1.0, 0.0, 1.0]);
        // Qsca = 8/3 x⁴ |(m²-1)/(m²+2)|²
        let k = ((m * m - 1.0) / (m * m + 2.0)).norm_sqr();
        let expected = 8.0 / 3.0 * x.powi(4) * k;
        assert!(
            ((sol.qsca - expected) / expected).abs() < 1e-3,
            "Expected {:e}, got {:e}",
            expected,
            sol.qsca
        );
        // no side scattering in the parallel plane at 90°
        assert!(sol.s2[1].norm() < 1e-3 * sol.s1[1].norm());
    }

    #[test]
    fn test_reference_sphere() {
        // Bohren & Huffman appendix: r = 0.525 µm, λ = 0.6328 µm, m = 1.55
        let x = 2.0 * PI * 0.525 / 0.6328;
        let sol = scatter(x, Complex64::new(1.55, 0.0), &[1.0]);
        assert!((sol.qext - 3.10543).abs() < 1e-4, "got {:.5}", sol.qext);
        assert!((sol.qext - sol.qsca).abs() < 1e-10);
        // optical theorem: Qext = 4/x² Re S(0)
        assert!((sol.qext - 4.0 / (x * x) * sol.s1[0].re).abs() < 1e-8);
    }

    #[test]
    fn test_absorbing_sphere() {
        let sol = scatter(2.0, Complex64::new(1.75, 0.44), &[0.5]);
        assert!(sol.qext > sol.qsca);
        assert!(sol.qsca > 0.0);
    }

    #[test]
    fn test_log_normal_build_is_normalized() {
        let grid = AerosolGrid::new(41).unwrap();
        let sd = SizeDistribution {
            r_min: 0.01,
            r_max: 1.0,
            modes: vec![Mode {
                distribution: Distribution::LogNormal {
                    mean_radius: 0.1,
                    sigma: 2.0,
                },
                fraction: 1.0,
                real_index: vec![1.45],
                imag_index: vec![0.0],
            }],
        };
        let table = build(&sd, &grid, "lognormal").unwrap();
        assert!((table.extinction[REFERENCE_INDEX] - 1.0).abs() < 1e-12);
        let omega = table.single_scattering_albedo(REFERENCE_INDEX);
        assert!((omega - 1.0).abs() < 1e-9, "Expected ω = 1, got {}", omega);

        let norm: f64 = table.p11[REFERENCE_INDEX]
            .iter()
            .zip(&grid.weights)
            .map(|(p, w)| p * w)
            .sum::<f64>()
            / 2.0;
        assert!((norm - 1.0).abs() < 0.02, "Expected ~1, got {:.4}", norm);
        assert!(table.asymmetry[REFERENCE_INDEX] > 0.3);
    }

    #[test]
    fn test_too_many_modes() {
        let mode = Mode {
            distribution: Distribution::PowerLaw { exponent: 4.0 },
            fraction: 1.0,
            real_index: vec![1.5],
            imag_index: vec![0.01],
        };
        let sd = SizeDistribution {
            r_min: 0.01,
            r_max: 1.0,
            modes: vec![mode; 5],
        };
        assert!(matches!(sd.validate(), Err(ConfigError::TooManyModes(5))));
    }

    #[test]
    fn test_histogram_density() {
        let d = Distribution::Histogram {
            radius: vec![0.1, 1.0],
            dv_dlogr: vec![1.0, 1.0],
        };
        let r: f64 = 0.5;
        let expected = 3.0 / (4.0 * PI * r.powi(4));
        assert!((d.density(r) - expected).abs() < 1e-12);
        assert_eq!(d.density(2.0), 0.0);
    }
}
