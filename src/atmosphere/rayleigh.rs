//! Molecular scattering: optical depth and depolarized phase matrix.

use std::f64::consts::PI;

use super::AtmosphericProfile;

/// Depolarization factor of air.
pub const DEPOLARIZATION: f64 = 0.0279;

/// Rayleigh scale height (km).
pub const SCALE_HEIGHT: f64 = 8.0;

/// Molecular number density at 288.15 K and 1013.25 mb (cm⁻³).
const LOSCHMIDT: f64 = 2.54743e19;

/// Reduced column ∫ (p/T) dz normalized to standard conditions (km).
///
/// The integration uses the trapezoidal rule and stops at the first level
/// with zero pressure.
pub fn column_density(profile: &AtmosphericProfile) -> f64 {
    let scale = 288.15 / 1013.25;
    profile
        .levels()
        .windows(2)
        .take_while(|w| w[1].p > 0.0)
        .map(|w| 0.5 * (w[0].p / w[0].t + w[1].p / w[1].t) * (w[1].z - w[0].z))
        .sum::<f64>()
        * scale
}

/// Scattering cross-section factor per unit reduced column (cm⁻¹) at
/// wavelength `wl` (µm), using an Edlén-type refractive index of air.
pub fn scattering_coefficient(wl: f64) -> f64 {
    let inv2 = 1.0 / (wl * wl);
    let a1 = 130.0 - inv2;
    let a2 = 38.9 - inv2;
    let n = 1.0 + (8342.13 + 2_406_030.0 / a1 + 15997.0 / a2) * 1.0e-8;
    let n2 = n * n;
    let delta = DEPOLARIZATION;
    let a = 24.0 * PI.powi(3) * (n2 - 1.0).powi(2) * (6.0 + 3.0 * delta)
        / (6.0 - 7.0 * delta)
        / (n2 + 2.0).powi(2);
    a / (wl.powi(4) * 1.0e-16) / LOSCHMIDT
}

/// Rayleigh optical depth of the whole profile at `wl` (µm).
pub fn optical_depth(profile: &AtmosphericProfile, wl: f64) -> f64 {
    column_density(profile) * 1.0e5 * scattering_coefficient(wl)
}

/// Non-zero Legendre coefficients of the depolarized Rayleigh matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayleighCoefficients {
    pub beta2: f64,
    pub gamma2: f64,
    pub alpha2: f64,
}

pub fn coefficients() -> RayleighCoefficients {
    let aaaa = DEPOLARIZATION / (2.0 - DEPOLARIZATION);
    let ron = (1.0 - aaaa) / (1.0 + 2.0 * aaaa);
    RayleighCoefficients {
        beta2: 0.5 * ron,
        gamma2: -ron * 1.5_f64.sqrt(),
        alpha2: 3.0 * ron,
    }
}

/// Depolarized Rayleigh phase elements `(P11, P12, P33)` at scattering
/// cosine `x`, with ½∫P11 = 1.
pub fn phase(x: f64) -> (f64, f64, f64) {
    let delta = DEPOLARIZATION;
    let d1 = 2.0 * (1.0 - delta) / (2.0 + delta);
    let d2 = 3.0 * delta / (2.0 + delta);
    let p = d1 * 0.75 * (1.0 + x * x) + d2;
    let q = d1 * 0.75 * (x * x - 1.0);
    let u = d1 * 1.5 * x;
    (p, q, u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmosphere::StandardAtmosphere;
    use crate::quadrature::gauss;

    #[test]
    fn test_us62_optical_depth() {
        let profile = AtmosphericProfile::standard(StandardAtmosphere::Us62);
        let tau = optical_depth(&profile, 0.55);
        assert!((tau - 0.0973).abs() < 0.001, "Expected ~0.0973, got {:.4}", tau);

        let tau_blue = optical_depth(&profile, 0.40);
        assert!((tau_blue - 0.360).abs() < 0.005, "Expected ~0.36, got {:.4}", tau_blue);
    }

    #[test]
    fn test_phase_is_normalized() {
        let (x, w) = gauss(-1.0, 1.0, 24).unwrap();
        let norm: f64 = x.iter().zip(&w).map(|(x, w)| w * phase(*x).0).sum::<f64>() / 2.0;
        assert!((norm - 1.0).abs() < 1e-12, "Expected 1, got {}", norm);

        let (p, q, _) = phase(0.0);
        // residual polarization at 90° comes from depolarization
        assert!(-q / p < 1.0 && -q / p > 0.9);
    }

    #[test]
    fn test_coefficients_match_phase() {
        let c = coefficients();
        // P11 = 1 + β2·P2(x), and P2(1) = 1
        let (p, _, _) = phase(1.0);
        assert!((p - (1.0 + c.beta2)).abs() < 1e-12);
        assert!(c.alpha2 > 2.8 && c.alpha2 < 3.0);
    }
}
