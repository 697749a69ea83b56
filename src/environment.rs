//! Adjacency effects and the coupling of the surface with the atmosphere.
//!
//! A heterogeneous target is seen through an environment function that
//! weights the target and its surroundings by the share of diffusely
//! transmitted light each contributes. A non-Lambertian surface couples
//! with the sky through three hemispherical averages of its BRDF taken
//! against the downward diffuse radiance at the ground.

use serde::Serialize;

use crate::brdf::Brdf;
use crate::quadrature::AngularGrid;
use crate::sos::{CouplingFields, DownwardField, Transfer};

/// Sensor altitude (km) above which the satellite coefficients apply.
pub const SATELLITE_ALTITUDE: f64 = 60.0;

/// Plane altitude nodes (km) of the environment coefficients.
const ALTITUDES: [f64; 16] = [
    0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 60.0,
];
const CFR1: [f64; 16] = [
    0.730, 0.710, 0.656, 0.606, 0.560, 0.516, 0.473, 0.433, 0.395, 0.323, 0.258, 0.209, 0.171, 0.142,
    0.122, 0.070,
];
const CFR2: [f64; 16] = [
    2.8, 1.51, 0.845, 0.634, 0.524, 0.465, 0.429, 0.405, 0.390, 0.386, 0.409, 0.445, 0.488, 0.545,
    0.608, 0.868,
];
const CFA1: [f64; 16] = [
    0.239, 0.396, 0.588, 0.626, 0.612, 0.505, 0.454, 0.448, 0.444, 0.445, 0.444, 0.448, 0.448, 0.448,
    0.448, 0.448,
];
const CFA2: [f64; 16] = [
    1.40, 1.20, 1.02, 0.86, 0.74, 0.56, 0.46, 0.42, 0.38, 0.34, 0.30, 0.28, 0.27, 0.27, 0.27, 0.27,
];
const CFA3: [f64; 16] = [
    9.17, 6.26, 5.48, 5.16, 4.74, 3.65, 3.24, 3.15, 3.07, 2.97, 2.88, 2.83, 2.83, 2.83, 2.83, 2.83,
];

/// Coefficients of the view-angle correction of the aerosol function.
const A0: f64 = 1.3347;
const B0: f64 = 0.57757;
const A1: f64 = -1.479;
const B1: f64 = -1.5275;

/// Environment functions of the molecules, of the aerosols and of the
/// mixed atmosphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentWeights {
    pub rayleigh: f64,
    pub aerosol: f64,
    pub mixed: f64,
}

fn table_at(table: &[f64; 16], altitude: f64) -> f64 {
    let i = ALTITUDES.iter().position(|z| altitude < *z).unwrap_or(ALTITUDES.len() - 1);
    if i == 0 {
        return table[0];
    }
    let (z0, z1) = (ALTITUDES[i - 1], ALTITUDES[i]);
    let t = ((altitude - z0) / (z1 - z0)).clamp(0.0, 1.0);
    table[i - 1] + (table[i] - table[i - 1]) * t
}

/// Fraction of the diffusely transmitted light that originates within
/// `radius` km of the target, for an observer at `altitude` km (`None`
/// above the atmosphere).
///
/// # Arguments
/// * `difr` - Diffuse upward transmittance of the molecules
/// * `difa` - Diffuse upward transmittance of the aerosols
pub fn environment_function(
    difr: f64,
    difa: f64,
    radius: f64,
    altitude: Option<f64>,
    mu_v: f64,
) -> EnvironmentWeights {
    let r = radius.max(0.0);
    let (fra0, fae0) = match altitude {
        Some(z) if z < SATELLITE_ALTITUDE => {
            let cfr1 = table_at(&CFR1, z);
            let cfa1 = table_at(&CFA1, z);
            (
                1.0 - cfr1 * (-r * table_at(&CFR2, z)).exp() - (1.0 - cfr1) * (-r * 0.08).exp(),
                1.0 - cfa1 * (-r * table_at(&CFA2, z)).exp() - (1.0 - cfa1) * (-r * table_at(&CFA3, z)).exp(),
            )
        }
        _ => (
            1.0 - (0.930 * (-0.8 * r).exp() + 0.070 * (-1.1 * r).exp()),
            1.0 - (0.375 * (-0.2 * r).exp() + 0.625 * (-1.83 * r).exp()),
        ),
    };

    // the coefficients hold for a nadir view
    let x = mu_v.clamp(1e-3, 1.0).ln();
    let rayleigh = fra0 * (x * (1.0 - fra0) + 1.0);
    let aerosol = fae0
        * ((1.0 + A0 * x + B0 * x * x)
            + fae0 * (A1 * x + B1 * x * x)
            + fae0 * fae0 * ((-A1 - A0) * x + (-B1 - B0) * x * x));

    let mixed = if difa + difr > 1e-3 {
        (aerosol * difa + rayleigh * difr) / (difa + difr)
    } else {
        1.0
    };
    EnvironmentWeights {
        rayleigh,
        aerosol,
        mixed,
    }
}

/// Reflectance of the average surroundings seen through the environment
/// function `fr`.
pub fn average_reflectance(fr: f64, target: f64, environment: f64) -> f64 {
    fr * target + (1.0 - fr) * environment
}

/// Direct and diffuse parts of the downward and upward transmittances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTransmittance {
    pub down: Transfer,
    pub up: Transfer,
}

/// Surface contribution of a heterogeneous Lambertian target, before gas
/// absorption.
pub fn lambertian_surface(
    target: f64,
    average: f64,
    path: &PathTransmittance,
    spherical_albedo: f64,
) -> f64 {
    let denom = 1.0 - average * spherical_albedo;
    if denom.abs() < 1e-10 {
        return 0.0;
    }
    path.down.total * (target * path.up.direct + average * path.up.diffuse()) / denom
}

/// Hemispherical averages of a BRDF against the sky radiance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CouplingTerms {
    /// Reflectance in the observation geometry
    pub rho: f64,
    /// Diffuse sky light reflected toward the sensor
    pub rho_bar: f64,
    /// Direct sunlight reflected into the diffuse upward field
    pub rho_bar_prime: f64,
    /// Diffuse light reflected into the diffuse field, taken as the
    /// bi-hemispherical albedo
    pub rho_bar_bar: f64,
}

impl CouplingTerms {
    pub fn lambertian(rho: f64) -> Self {
        Self {
            rho,
            rho_bar: rho,
            rho_bar_prime: rho,
            rho_bar_bar: rho,
        }
    }

    /// Averages `brdf` over the downward fields of the sun and of a beam
    /// entering along the view direction.
    ///
    /// The fields are indexed by the solver azimuth, which runs along the
    /// propagation of the entering beam.
    pub fn compute(brdf: &dyn Brdf, grid: &AngularGrid, fields: &CouplingFields, phi: f64) -> Self {
        let (mu_s, mu_v) = (grid.mu_s(), grid.mu_v());
        let rho = brdf.reflectance(mu_s, mu_v, phi);
        let rho_bar = weighted(grid, &fields.sun, |k, rp| brdf.reflectance(grid.rm(k), mu_v, phi - rp));
        let rho_bar_prime = weighted(grid, &fields.view, |k, rp| {
            brdf.reflectance(mu_s, grid.rm(k), phi + rp)
        });

        Self {
            rho,
            rho_bar: rho_bar.unwrap_or(rho),
            rho_bar_prime: rho_bar_prime.unwrap_or(rho),
            rho_bar_bar: brdf.bihemispherical_albedo(),
        }
    }

    /// Surface contribution, before gas absorption, including the
    /// multiple reflections between the surface and the atmosphere.
    pub fn surface(&self, path: &PathTransmittance, spherical_albedo: f64) -> f64 {
        let (tdd, tdu) = (path.down.direct, path.up.direct);
        let (tsd, tsu) = (path.down.diffuse(), path.up.diffuse());
        let bounce = 1.0 - spherical_albedo * self.rho_bar_bar;
        let multiple = if bounce.abs() < 1e-10 {
            0.0
        } else {
            (tsd + tdd) * (tsu + tdu) * spherical_albedo * self.rho_bar_bar * self.rho_bar_bar / bounce
        };
        self.rho * tdd * tdu
            + self.rho_bar * tsd * tdu
            + self.rho_bar_prime * tsu * tdd
            + self.rho_bar_bar * tsd * tsu
            + multiple
    }
}

/// Radiance-weighted mean of `f(k, azimuth)` over the downward streams.
fn weighted(grid: &AngularGrid, field: &DownwardField, f: impl Fn(isize, f64) -> f64) -> Option<f64> {
    let mut sum = 0.0;
    let mut norm = 0.0;
    for ((&rp, &gp), row) in grid.azimuths().iter().zip(grid.azimuth_weights()).zip(&field.radiance) {
        for (j, &radiance) in row.iter().enumerate() {
            let k = j as isize + 1;
            let w = radiance * grid.rm(k) * grid.gb(k) * gp;
            sum += w * f(k, rp);
            norm += w;
        }
    }
    (norm > 0.0).then(|| sum / norm)
}
