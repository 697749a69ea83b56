//! Surface reflectance models.
//!
//! Every model returns a bidirectional reflectance factor for a sun at
//! `mu_s`, a view at `mu_v` and a relative azimuth `phi` (radians). A
//! relative azimuth of zero puts the sensor on the sun side of the target,
//! so the hot spot sits at `phi = 0` and `mu_s = mu_v`.

pub mod analytic;
pub mod canopy;
pub mod insitu;
pub mod ocean;
pub mod water;

use std::f64::consts::PI;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

pub use analytic::{Hapke, Lambertian, Minnaert, Rahman, RossLi, Roujean, Walthall};
pub use canopy::{IaquintaPinty, Kuusk, LeafAngle};
pub use insitu::InSitu;
pub use ocean::Ocean;

use crate::config::ConfigError;
use crate::quadrature::gauss;

/// Gauss points of the hemispherical albedo integral in zenith cosine.
pub const ALBEDO_ZENITH_POINTS: usize = 24;
/// Gauss points of the hemispherical albedo integral in azimuth.
pub const ALBEDO_AZIMUTH_POINTS: usize = 48;

struct HemisphereNodes {
    mu: Vec<f64>,
    mu_weights: Vec<f64>,
    phi: Vec<f64>,
    phi_weights: Vec<f64>,
}

static HEMISPHERE: LazyLock<HemisphereNodes> = LazyLock::new(|| {
    let (mu, mu_weights) = gauss(0.0, 1.0, ALBEDO_ZENITH_POINTS).unwrap_or_default();
    let (phi, phi_weights) = gauss(0.0, 2.0 * PI, ALBEDO_AZIMUTH_POINTS).unwrap_or_default();
    HemisphereNodes {
        mu,
        mu_weights,
        phi,
        phi_weights,
    }
});

/// A bidirectional reflectance model.
pub trait Brdf {
    /// Reflectance factor for the sun at `mu_s`, the view at `mu_v` and
    /// relative azimuth `phi` (radians).
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64;

    /// Directional-hemispherical albedo for the sun at `mu_s`.
    fn albedo(&self, mu_s: f64) -> f64 {
        let h = &*HEMISPHERE;
        let mut sum = 0.0;
        for (&mu, &wm) in h.mu.iter().zip(&h.mu_weights) {
            for (&phi, &wp) in h.phi.iter().zip(&h.phi_weights) {
                sum += self.reflectance(mu_s, mu, phi) * mu * wm * wp;
            }
        }
        sum / PI
    }

    /// Bi-hemispherical albedo: the directional albedo averaged over a
    /// uniform sky, `2 ∫ albedo(μ) μ dμ`.
    fn bihemispherical_albedo(&self) -> f64 {
        let h = &*HEMISPHERE;
        2.0 * h
            .mu
            .iter()
            .zip(&h.mu_weights)
            .map(|(&mu, &wm)| self.albedo(mu) * mu * wm)
            .sum::<f64>()
    }

    /// Polarized reflectance `(Q, U)` in the meridian plane of the view,
    /// when the model defines one.
    fn polarized(&self, _mu_s: f64, _mu_v: f64, _phi: f64) -> Option<(f64, f64)> {
        None
    }
}

/// Surface model selection, as read from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SurfaceModel {
    Lambertian {
        reflectance: f64,
    },
    Hapke {
        om: f64,
        af: f64,
        s0: f64,
        h: f64,
    },
    Roujean {
        k0: f64,
        k1: f64,
        k2: f64,
    },
    Walthall {
        a: f64,
        ap: f64,
        b: f64,
        c: f64,
    },
    Minnaert {
        k: f64,
        b: f64,
    },
    Rahman {
        rho0: f64,
        af: f64,
        k: f64,
    },
    RossLi {
        p1: f64,
        p2: f64,
        p3: f64,
    },
    Ocean {
        /// Wind speed (m/s)
        wind_speed: f64,
        /// Wind azimuth (degrees)
        wind_azimuth: f64,
        /// Salinity (ppt)
        salinity: f64,
        /// Pigment concentration (mg/m³)
        pigment: f64,
    },
    IaquintaPinty {
        leaf_angle: LeafAngle,
        lai: f64,
        leaf_reflectance: f64,
        leaf_transmittance: f64,
        soil_reflectance: f64,
        /// Hot-spot parameter: leaf size over canopy height
        hot_spot: f64,
        #[serde(default)]
        multiple_scattering: bool,
    },
    Kuusk {
        lai: f64,
        leaf_reflectance: f64,
        leaf_transmittance: f64,
        /// Eccentricity of the elliptical leaf angle distribution
        eccentricity: f64,
        /// Modal leaf inclination (degrees)
        mean_leaf_angle: f64,
        /// Leaf size over canopy height
        leaf_size: f64,
        /// Markov clumping parameter
        clumping: f64,
        /// Refractive index of the leaf wax
        refractive_index: f64,
        /// Leaf hair parameter of the specular term
        wax: f64,
        soil_reflectance: f64,
    },
    InSitu(InSitu),
}

fn surface_error(msg: impl Into<String>) -> ConfigError {
    ConfigError::Surface(msg.into())
}

fn check_finite(model: &str, values: &[(&str, f64)]) -> Result<(), ConfigError> {
    for (name, v) in values {
        if !v.is_finite() {
            return Err(surface_error(format!("{}: {} must be finite, got {}", model, name, v)));
        }
    }
    Ok(())
}

fn check_leaf(model: &str, lai: f64, rl: f64, tl: f64, rs: f64) -> Result<(), ConfigError> {
    check_finite(model, &[("lai", lai), ("leaf reflectance", rl), ("leaf transmittance", tl)])?;
    if lai <= 0.0 {
        return Err(surface_error(format!("{}: LAI must be positive, got {}", model, lai)));
    }
    if rl < 0.0 || tl < 0.0 || rl + tl >= 1.0 {
        return Err(surface_error(format!(
            "{}: leaf reflectance and transmittance must be non-negative with a sum below 1, got {} + {}",
            model, rl, tl
        )));
    }
    if !(0.0..=1.0).contains(&rs) {
        return Err(surface_error(format!(
            "{}: soil reflectance must lie in [0, 1], got {}",
            model, rs
        )));
    }
    Ok(())
}

impl SurfaceModel {
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceModel::Lambertian { .. } => "lambertian",
            SurfaceModel::Hapke { .. } => "hapke",
            SurfaceModel::Roujean { .. } => "roujean",
            SurfaceModel::Walthall { .. } => "walthall",
            SurfaceModel::Minnaert { .. } => "minnaert",
            SurfaceModel::Rahman { .. } => "rahman",
            SurfaceModel::RossLi { .. } => "ross_li",
            SurfaceModel::Ocean { .. } => "ocean",
            SurfaceModel::IaquintaPinty { .. } => "iaquinta_pinty",
            SurfaceModel::Kuusk { .. } => "kuusk",
            SurfaceModel::InSitu(_) => "in_situ",
        }
    }

    /// Checks the parameters of the model. Out-of-range values are
    /// rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name();
        match self {
            SurfaceModel::Lambertian { reflectance } => {
                if !(0.0..=1.0).contains(reflectance) {
                    return Err(surface_error(format!(
                        "lambertian reflectance must lie in [0, 1], got {}",
                        reflectance
                    )));
                }
                Ok(())
            }
            SurfaceModel::Hapke { om, af, s0, h } => {
                check_finite(name, &[("om", *om), ("af", *af), ("s0", *s0), ("h", *h)])?;
                if *om <= 0.0 || *om > 1.0 {
                    return Err(surface_error(format!("hapke: om must lie in (0, 1], got {}", om)));
                }
                if *h <= 0.0 {
                    return Err(surface_error(format!("hapke: h must be positive, got {}", h)));
                }
                Ok(())
            }
            SurfaceModel::Roujean { k0, k1, k2 } => {
                check_finite(name, &[("k0", *k0), ("k1", *k1), ("k2", *k2)])
            }
            SurfaceModel::Walthall { a, ap, b, c } => {
                check_finite(name, &[("a", *a), ("ap", *ap), ("b", *b), ("c", *c)])
            }
            SurfaceModel::Minnaert { k, b } => check_finite(name, &[("k", *k), ("b", *b)]),
            SurfaceModel::Rahman { rho0, af, k } => {
                check_finite(name, &[("rho0", *rho0), ("af", *af), ("k", *k)])
            }
            SurfaceModel::RossLi { p1, p2, p3 } => {
                check_finite(name, &[("p1", *p1), ("p2", *p2), ("p3", *p3)])
            }
            SurfaceModel::Ocean {
                wind_speed,
                wind_azimuth,
                salinity,
                pigment,
            } => {
                check_finite(
                    name,
                    &[
                        ("wind speed", *wind_speed),
                        ("wind azimuth", *wind_azimuth),
                        ("salinity", *salinity),
                        ("pigment", *pigment),
                    ],
                )?;
                if *wind_speed < 0.0 {
                    return Err(surface_error(format!(
                        "ocean: wind speed must be non-negative, got {}",
                        wind_speed
                    )));
                }
                if *salinity < 0.0 || *pigment < 0.0 {
                    return Err(surface_error("ocean: salinity and pigment must be non-negative"));
                }
                Ok(())
            }
            SurfaceModel::IaquintaPinty {
                lai,
                leaf_reflectance,
                leaf_transmittance,
                soil_reflectance,
                hot_spot,
                ..
            } => {
                check_leaf(name, *lai, *leaf_reflectance, *leaf_transmittance, *soil_reflectance)?;
                if !hot_spot.is_finite() || *hot_spot < 0.0 {
                    return Err(surface_error(format!(
                        "iaquinta_pinty: hot-spot parameter must be non-negative, got {}",
                        hot_spot
                    )));
                }
                Ok(())
            }
            SurfaceModel::Kuusk {
                lai,
                leaf_reflectance,
                leaf_transmittance,
                eccentricity,
                mean_leaf_angle,
                leaf_size,
                clumping,
                refractive_index,
                wax,
                soil_reflectance,
            } => {
                check_leaf(name, *lai, *leaf_reflectance, *leaf_transmittance, *soil_reflectance)?;
                check_finite(
                    name,
                    &[
                        ("eccentricity", *eccentricity),
                        ("mean leaf angle", *mean_leaf_angle),
                        ("leaf size", *leaf_size),
                        ("clumping", *clumping),
                        ("refractive index", *refractive_index),
                        ("wax", *wax),
                    ],
                )?;
                if !(0.0..1.0).contains(eccentricity) {
                    return Err(surface_error(format!(
                        "kuusk: eccentricity must lie in [0, 1), got {}",
                        eccentricity
                    )));
                }
                if *clumping <= 0.0 || *clumping > 1.0 {
                    return Err(surface_error(format!(
                        "kuusk: clumping must lie in (0, 1], got {}",
                        clumping
                    )));
                }
                if *refractive_index < 1.0 || *leaf_size < 0.0 || *wax < 0.0 {
                    return Err(surface_error(
                        "kuusk: refractive index must be at least 1, leaf size and wax non-negative",
                    ));
                }
                Ok(())
            }
            SurfaceModel::InSitu(table) => table.validate(),
        }
    }

    /// Instantiates the model at wavelength `wl` (µm).
    pub fn at(&self, wl: f64) -> Box<dyn Brdf + Send + Sync> {
        match self.clone() {
            SurfaceModel::Lambertian { reflectance } => Box::new(Lambertian { reflectance }),
            SurfaceModel::Hapke { om, af, s0, h } => Box::new(Hapke { om, af, s0, h }),
            SurfaceModel::Roujean { k0, k1, k2 } => Box::new(Roujean { k0, k1, k2 }),
            SurfaceModel::Walthall { a, ap, b, c } => Box::new(Walthall { a, ap, b, c }),
            SurfaceModel::Minnaert { k, b } => Box::new(Minnaert { k, b }),
            SurfaceModel::Rahman { rho0, af, k } => Box::new(Rahman { rho0, af, k }),
            SurfaceModel::RossLi { p1, p2, p3 } => Box::new(RossLi { p1, p2, p3 }),
            SurfaceModel::Ocean {
                wind_speed,
                wind_azimuth,
                salinity,
                pigment,
            } => Box::new(Ocean::new(wind_speed, wind_azimuth, salinity, pigment, wl)),
            SurfaceModel::IaquintaPinty {
                leaf_angle,
                lai,
                leaf_reflectance,
                leaf_transmittance,
                soil_reflectance,
                hot_spot,
                multiple_scattering,
            } => Box::new(IaquintaPinty::new(
                leaf_angle,
                lai,
                leaf_reflectance,
                leaf_transmittance,
                soil_reflectance,
                hot_spot,
                multiple_scattering,
            )),
            SurfaceModel::Kuusk {
                lai,
                leaf_reflectance,
                leaf_transmittance,
                eccentricity,
                mean_leaf_angle,
                leaf_size,
                clumping,
                refractive_index,
                wax,
                soil_reflectance,
            } => Box::new(Kuusk::new(
                lai,
                leaf_reflectance,
                leaf_transmittance,
                eccentricity,
                mean_leaf_angle,
                leaf_size,
                clumping,
                refractive_index,
                wax,
                soil_reflectance,
            )),
            SurfaceModel::InSitu(table) => Box::new(table),
        }
    }

    pub fn is_lambertian(&self) -> bool {
        matches!(self, SurfaceModel::Lambertian { .. })
    }
}
