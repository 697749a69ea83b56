use std::f64::consts::PI;

use log::{debug, warn};
use serde::Serialize;

use crate::band::BandResult;
use crate::config::{ConfigError, Correction, Measurement};
use crate::error::Result;

/// Ground reflectance retrieved from a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inversion {
    /// Apparent reflectance of the measurement
    pub apparent_reflectance: f64,
    /// Apparent radiance (W m⁻² sr⁻¹ µm⁻¹)
    pub apparent_radiance: f64,
    /// Reflectance of a uniform Lambertian ground
    pub ground_reflectance: f64,
    /// Reflectance in the observation geometry of a ground that keeps the
    /// angular shape of the configured BRDF
    pub coupled_reflectance: Option<f64>,
    /// `[xa, xb, xc]` such that `y = xa * L - xb` and
    /// `ρ = y / (1 + xc * y)` for a radiance `L`
    pub coefficients: [f64; 3],
}

/// Solves `a x² + b x + c = 0` for its non-negative branch, falling back
/// to the linear root when the quadratic term vanishes.
fn positive_root(a: f64, b: f64, c: f64) -> f64 {
    if a.abs() < 1e-12 {
        return if b.abs() > 1e-12 { -c / b } else { 0.0 };
    }
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        debug!("negative discriminant {:.3e}, using the vertex", discriminant);
        return -b / (2.0 * a);
    }
    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    // the root of (-b + sqrt(disc)) / 2a, taken without cancellation
    if b >= 0.0 { c / q } else { q / a }
}

/// Retrieves the ground reflectance from `correction` given the simulated
/// atmosphere `band` and the solar zenith cosine `mu_s`.
pub fn invert(band: &BandResult, mu_s: f64, correction: &Correction) -> Result<Inversion> {
    let e0 = band.solar_irradiance;
    let (rho_star, radiance) = match correction.measurement {
        Measurement::Reflectance { value } => (value, value * mu_s * e0 / PI),
        Measurement::Radiance { value, gain, bias } => {
            let l = gain * value + bias;
            (PI * l / (mu_s * e0), l)
        }
    };

    let tg = band.gas.total;
    let (t_down, t_up) = (band.down.mixed, band.up.mixed);
    let s = band.spherical_albedo.mixed;
    let ratm = band.reflectance_parts.diffuse;
    let transmission = tg * t_down * t_up;

    let (ground_reflectance, coefficients) = if transmission > 1e-10 {
        let xa = PI / (mu_s * e0) / transmission;
        let xb = ratm / transmission;
        let y = (rho_star - ratm) / transmission;
        let denom = 1.0 + s * y;
        let rog = if denom.abs() < 1e-10 { y } else { y / denom };
        (rog, [xa, xb, s])
    } else {
        warn!("atmosphere is opaque (T = {:.3e}), no ground signal", transmission);
        (0.0, [0.0, 0.0, s])
    };

    let coupled_reflectance = if correction.coupled {
        let terms = band.coupling.ok_or_else(|| {
            ConfigError::Correction("a coupled correction needs a non-Lambertian surface".into())
        })?;
        if terms.rho.abs() < 1e-10 {
            warn!("surface model is black in the observation geometry, no coupled retrieval");
            None
        } else {
            let (tdd, tdu) = (band.down_direct, band.up_direct);
            let (tsd, tsu) = ((t_down - tdd).max(0.0), (t_up - tdu).max(0.0));
            let robar = terms.rho_bar / terms.rho;
            let robarp = terms.rho_bar_prime / terms.rho;
            let robarbar = terms.rho_bar_bar / terms.rho;

            let c = -(rho_star / tg - ratm / tg);
            let b = tdd * tdu + tdu * tsd * robar + tsu * tdd * robarp + tsu * tsd * robarbar;
            let quadratic = |rog: f64| {
                let bounce = 1.0 - s * rog * robarbar;
                if bounce.abs() < 1e-10 {
                    0.0
                } else {
                    t_down * t_up * s * robarbar * robarbar / bounce
                }
            };
            let mut rog = ground_reflectance;
            for _ in 0..2 {
                rog = positive_root(quadratic(rog), b, c);
            }
            Some(rog)
        }
    } else {
        None
    };

    Ok(Inversion {
        apparent_reflectance: rho_star,
        apparent_radiance: radiance,
        ground_reflectance,
        coupled_reflectance,
        coefficients,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_root() {
        // (x - 0.2)(x + 5) = x² + 4.8x - 1
        let x = positive_root(1.0, 4.8, -1.0);
        assert!((x - 0.2).abs() < 1e-12, "Expected 0.2, got {:.6}", x);
        assert!((positive_root(0.0, 2.0, -0.5) - 0.25).abs() < 1e-12);
        // tiny quadratic term keeps the linear answer
        let y = positive_root(1e-9, 0.8, -0.16);
        assert!((y - 0.2).abs() < 1e-6);
    }
}
