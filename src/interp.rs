//! Spectral interpolation of the reference-wavelength results.

use crate::aerosol::{NB_WAVELENGTHS, REFERENCE_INDEX, WAVELENGTHS};
use crate::atmosphere::rayleigh;
use crate::sos::{Components, DiscreteResults, Stokes, Transfer, WavelengthResult};

/// Magnitude below which the polarized quantities switch to linear
/// interpolation.
const LOG_FLOOR: f64 = 0.001;

/// Quantities of [`DiscreteResults`] at an arbitrary wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    pub wavelength: f64,
    /// Intrinsic reflectance at the sensor level
    pub reflectance: Components<Stokes>,
    /// Intrinsic reflectance at the top of the column
    pub reflectance_toa: Components<Stokes>,
    /// Mixed-atmosphere reflectance at relative azimuths 0..=180°
    pub azimuthal: Vec<f64>,
    pub tau: Components<f64>,
    pub tau_above_plane: Components<f64>,
    /// Aerosol scattering optical depth
    pub tau_scattering: f64,
    pub down: Components<Transfer>,
    pub up: Components<Transfer>,
    pub spherical_albedo: Components<f64>,
    /// Phase matrices at the observation scattering angle (the mixed
    /// entry is unused)
    pub phase: Components<Stokes>,
    /// Mixed top-of-column reflectance on the look-up table azimuths
    pub lut: Option<Vec<Vec<Stokes>>>,
}

/// Bracketing pair of reference wavelengths and the position of `wl`
/// between them in log space.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    lo: usize,
    hi: usize,
    /// `ln(λ/λ1) / ln(λ2/λ1)`
    t_log: f64,
    /// `(λ - λ1) / (λ2 - λ1)`
    t_lin: f64,
}

impl Bracket {
    fn new(wl: f64) -> Self {
        let mut lo = 0;
        for ll in 0..NB_WAVELENGTHS - 1 {
            if wl > WAVELENGTHS[ll] && wl <= WAVELENGTHS[ll + 1] {
                lo = ll;
            }
        }
        if wl > WAVELENGTHS[NB_WAVELENGTHS - 1] {
            lo = NB_WAVELENGTHS - 2;
        }
        let hi = lo + 1;
        let (w1, w2) = (WAVELENGTHS[lo], WAVELENGTHS[hi]);
        Self {
            lo,
            hi,
            t_log: (wl / w1).ln() / (w2 / w1).ln(),
            t_lin: (wl - w1) / (w2 - w1),
        }
    }

    fn linear(&self, v1: f64, v2: f64) -> f64 {
        v1 + (v2 - v1) * self.t_lin
    }

    /// Power law through both points; falls back to linear unless both
    /// values are positive.
    fn log_log(&self, v1: f64, v2: f64) -> f64 {
        if v1 > 0.0 && v2 > 0.0 {
            v1 * (v2 / v1).powf(self.t_log)
        } else {
            self.linear(v1, v2)
        }
    }

    /// Log-log for values of the same sign away from zero, linear
    /// otherwise.
    fn dual(&self, v1: f64, v2: f64) -> f64 {
        if v1.abs() < LOG_FLOOR || v2.abs() < LOG_FLOOR || v1 * v2 < 0.0 {
            self.linear(v1, v2)
        } else {
            v1 * (v2 / v1).powf(self.t_log)
        }
    }

    fn stokes(&self, a: Stokes, b: Stokes) -> Stokes {
        Stokes::new(self.log_log(a.i, b.i), self.dual(a.q, b.q), self.dual(a.u, b.u))
    }

    /// Interpolates a Rayleigh-relative quantity through its ratio to the
    /// molecular value.
    fn relative(&self, mixed: (f64, f64), ray: (f64, f64), ray_at: f64) -> f64 {
        if ray.0 > 0.0 && ray.1 > 0.0 {
            self.log_log(mixed.0 / ray.0, mixed.1 / ray.1) * ray_at
        } else {
            self.log_log(mixed.0, mixed.1)
        }
    }

    fn transfer(&self, a: Transfer, b: Transfer) -> Transfer {
        Transfer {
            total: self.log_log(a.total, b.total),
            direct: self.log_log(a.direct, b.direct),
        }
    }
}

/// Interpolates the reference-wavelength results at `wl` (µm).
///
/// Wavelengths outside the reference range use the edge bracket.
pub fn at_wavelength(wl: f64, discrete: &DiscreteResults) -> Interpolated {
    let b = Bracket::new(wl);
    let (r1, r2) = (&discrete.wavelengths[b.lo], &discrete.wavelengths[b.hi]);

    let stokes = |f: fn(&WavelengthResult) -> &Components<Stokes>| -> Components<Stokes> {
        let (a, c) = (f(r1), f(r2));
        Components {
            rayleigh: b.stokes(a.rayleigh, c.rayleigh),
            aerosol: b.stokes(a.aerosol, c.aerosol),
            mixed: b.stokes(a.mixed, c.mixed),
        }
    };
    let depths = |f: fn(&WavelengthResult) -> &Components<f64>| -> Components<f64> {
        let (a, c) = (f(r1), f(r2));
        Components {
            rayleigh: b.log_log(a.rayleigh, c.rayleigh),
            aerosol: b.log_log(a.aerosol, c.aerosol),
            mixed: b.log_log(a.rayleigh, c.rayleigh) + b.log_log(a.aerosol, c.aerosol),
        }
    };
    let transfers = |f: fn(&WavelengthResult) -> &Components<Transfer>| -> Components<Transfer> {
        let (a, c) = (f(r1), f(r2));
        let rayleigh = b.transfer(a.rayleigh, c.rayleigh);
        let aerosol = b.transfer(a.aerosol, c.aerosol);
        let mixed = Transfer {
            total: b.relative(
                (a.mixed.total, c.mixed.total),
                (a.rayleigh.total, c.rayleigh.total),
                rayleigh.total,
            ),
            direct: b.log_log(a.mixed.direct, c.mixed.direct),
        };
        Components { rayleigh, aerosol, mixed }
    };

    let (sa, sc) = (&r1.spherical_albedo, &r2.spherical_albedo);
    let s_rayleigh = b.log_log(sa.rayleigh, sc.rayleigh);
    let spherical_albedo = Components {
        rayleigh: s_rayleigh,
        aerosol: b.log_log(sa.aerosol, sc.aerosol),
        mixed: b.relative((sa.mixed, sc.mixed), (sa.rayleigh, sc.rayleigh), s_rayleigh),
    };

    let ext550 = discrete.wavelengths[REFERENCE_INDEX].tau.aerosol;
    let tau_scattering = if ext550 > 0.0 {
        b.log_log(r1.tau.aerosol * r1.omega_a, r2.tau.aerosol * r2.omega_a)
    } else {
        0.0
    };

    let (p, q, u) = rayleigh::phase(discrete.scattering_cosine);
    let phase = Components {
        rayleigh: Stokes::new(p, q, u),
        aerosol: b.stokes(r1.aerosol_phase, r2.aerosol_phase),
        mixed: Stokes::default(),
    };

    let azimuthal = r1
        .azimuthal
        .mixed
        .iter()
        .zip(&r2.azimuthal.mixed)
        .map(|(v1, v2)| b.log_log(*v1, *v2))
        .collect();

    let lut = match (&r1.lut, &r2.lut) {
        (Some(l1), Some(l2)) => Some(
            l1.iter()
                .zip(l2)
                .map(|(row1, row2)| row1.iter().zip(row2).map(|(a, c)| b.stokes(*a, *c)).collect())
                .collect(),
        ),
        _ => None,
    };

    Interpolated {
        wavelength: wl,
        reflectance: stokes(|r| &r.reflectance),
        reflectance_toa: stokes(|r| &r.reflectance_toa),
        azimuthal,
        tau: depths(|r| &r.tau),
        tau_above_plane: depths(|r| &r.tau_above_plane),
        tau_scattering,
        down: transfers(|r| &r.down),
        up: transfers(|r| &r.up),
        spherical_albedo,
        phase,
        lut,
    }
}

/// Linear interpolation of per-reference-wavelength scalars at `wl`, used
/// for the surface coupling terms.
pub fn linear_at(wl: f64, values: &[f64]) -> f64 {
    let b = Bracket::new(wl);
    b.linear(values[b.lo], values[b.hi])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn synthetic(l: usize) -> WavelengthResult {
        let wl = WAVELENGTHS[l];
        let tr = 0.0088 * wl.powf(-4.05);
        let ta = 0.2 * (wl / 0.55).powf(-1.3);
        let t = |tau: f64| Transfer {
            total: (-0.5 * tau).exp(),
            direct: (-tau).exp(),
        };
        WavelengthResult {
            wavelength: wl,
            tau: Components {
                rayleigh: tr,
                aerosol: ta,
                mixed: tr + ta,
            },
            tau_above_plane: Components::default(),
            omega_a: 0.9,
            reflectance: Components {
                rayleigh: Stokes::new(tr, 0.3 * tr, 0.0),
                aerosol: Stokes::new(0.1 * ta, -0.01 * ta, 0.0),
                mixed: Stokes::new(tr + 0.1 * ta, 0.3 * tr - 0.01 * ta, 0.0),
            },
            reflectance_toa: Components::default(),
            azimuthal: Components::default(),
            down: Components {
                rayleigh: t(tr),
                aerosol: t(ta),
                mixed: t(tr + ta),
            },
            up: Components {
                rayleigh: t(tr),
                aerosol: t(ta),
                mixed: t(tr + ta),
            },
            spherical_albedo: Components {
                rayleigh: 0.9 * tr,
                aerosol: 0.5 * ta,
                mixed: 0.9 * tr + 0.5 * ta,
            },
            aerosol_phase: Stokes::new(0.2, -0.01, 0.05),
            lut: None,
            coupling: None,
        }
    }

    fn discrete() -> DiscreteResults {
        DiscreteResults {
            mu_s: 0.8,
            mu_v: 1.0,
            phi: 0.0,
            scattering_cosine: -0.8,
            wavelengths: (0..NB_WAVELENGTHS).map(synthetic).collect(),
            lut_cosines: Vec::new(),
            lut_azimuths: Vec::new(),
        }
    }

    #[test]
    fn test_reference_wavelengths_are_reproduced() {
        let d = discrete();
        for l in [0, 7, NB_WAVELENGTHS - 1] {
            let wl = WAVELENGTHS[l];
            let out = at_wavelength(wl, &d);
            let expected = &d.wavelengths[l];
            assert_relative_eq!(out.tau.rayleigh, expected.tau.rayleigh, max_relative = 1e-12);
            assert_relative_eq!(
                out.reflectance.mixed.i,
                expected.reflectance.mixed.i,
                max_relative = 1e-12
            );
            assert_relative_eq!(out.down.mixed.total, expected.down.mixed.total, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_power_law_is_exact_between_nodes() {
        let d = discrete();
        let wl = 0.6;
        let out = at_wavelength(wl, &d);
        let expected = 0.0088 * wl.powf(-4.05);
        assert!(
            (out.tau.rayleigh - expected).abs() / expected < 1e-10,
            "Expected {:.6}, got {:.6}",
            expected,
            out.tau.rayleigh
        );
        assert_relative_eq!(out.tau.aerosol, 0.2 * (wl / 0.55f64).powf(-1.3), max_relative = 1e-10);
    }

    #[test]
    fn test_small_polarized_values_use_linear() {
        let b = Bracket::new(0.6);
        let (v1, v2) = (-0.0005, 0.002);
        let got = b.dual(v1, v2);
        let expected = v1 + (v2 - v1) * b.t_lin;
        assert!((got - expected).abs() < 1e-15);
        // same sign and large enough: power law
        let got = b.dual(0.01, 0.02);
        assert!((got - 0.01 * 2f64.powf(b.t_log)).abs() < 1e-15);
    }

    #[test]
    fn test_outside_range_uses_edge_bracket() {
        let below = Bracket::new(0.3);
        assert_eq!((below.lo, below.hi), (0, 1));
        let above = Bracket::new(5.0);
        assert_eq!((above.lo, above.hi), (NB_WAVELENGTHS - 2, NB_WAVELENGTHS - 1));
        let d = discrete();
        let out = at_wavelength(5.0, &d);
        assert!(out.tau.rayleigh > 0.0 && out.tau.rayleigh < d.wavelengths[NB_WAVELENGTHS - 1].tau.rayleigh);
    }

    #[test]
    fn test_rayleigh_phase_at_observation_angle() {
        let out = at_wavelength(0.55, &discrete());
        let (p, q, u) = rayleigh::phase(-0.8);
        assert_eq!(out.phase.rayleigh, Stokes::new(p, q, u));
    }

    #[test]
    fn test_linear_at() {
        let values: Vec<f64> = WAVELENGTHS.iter().map(|w| 2.0 * w).collect();
        assert_relative_eq!(linear_at(0.6, &values), 1.2, max_relative = 1e-12);
    }
}
