//! Runs a configured simulation end to end.
//!
//! An [`Engine`] owns the discrete-wavelength results of one atmosphere
//! and geometry. From them it integrates the signal over the band,
//! inverts measurements and builds the angular look-up table.

pub mod inversion;
pub mod lut;

use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::aerosol::{BuildOptions, NB_WAVELENGTHS, WAVELENGTHS};
use crate::atmosphere::gas::GasAbsorption;
use crate::band::{self, BandInputs, BandResult, Ground};
use crate::brdf::SurfaceModel;
use crate::config::{Correction, RunConfig, SATELLITE_LEVEL, Surface};
use crate::environment::CouplingTerms;
use crate::error::{EngineError, Result};
use crate::quadrature::{AerosolGrid, AngularGrid};
use crate::sos::layers::{AerosolLayer, DEFAULT_AEROSOL_SCALE_HEIGHT};
use crate::sos::{self, DiscreteResults, Plane, Scene, Settings};

pub use inversion::Inversion;
pub use lut::{AngularLut, LutRow};

/// Everything a run reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub band: BandResult,
    pub inversion: Option<Inversion>,
}

/// A prepared simulation.
pub struct Engine {
    config: RunConfig,
    grid: AngularGrid,
    gas: GasAbsorption,
    discrete: DiscreteResults,
    aerosol_name: String,
    coupling: Option<Vec<CouplingTerms>>,
    ground_polarization: Option<Vec<(f64, f64)>>,
}

/// Aerosol depth at 550 nm below `z` km above the target.
fn tau550_below(tau550: f64, profile: Option<&[AerosolLayer]>, z: f64) -> f64 {
    match profile {
        Some(layers) => {
            let mut base = 0.0;
            let mut below = 0.0;
            for layer in layers {
                let top = base + layer.thickness;
                if z >= top {
                    below += layer.tau550;
                } else if z > base {
                    below += layer.tau550 * (z - base) / layer.thickness;
                }
                base = top;
            }
            below
        }
        None => tau550 * (1.0 - (-z / DEFAULT_AEROSOL_SCALE_HEIGHT).exp()),
    }
}

impl Engine {
    /// Builds the grids, the aerosol optics and the discrete-wavelength
    /// radiative transfer of `config`.
    pub fn new(config: RunConfig) -> Result<Self> {
        let geometry = &config.geometry;
        let (mu_s, mu_v) = (geometry.mu_s(), geometry.mu_v());
        let phi = geometry.relative_azimuth();
        info!(
            "Geometry: θs = {:.2}°, θv = {:.2}°, φ = {:.2}°",
            geometry.solar_zenith,
            geometry.view_zenith,
            phi.to_degrees()
        );

        let grid = AngularGrid::standard(mu_s, mu_v)?;
        let aerosol_grid = AerosolGrid::standard()?;
        let profile = &config.profile;
        let aerosol = &config.aerosol;
        let optics = aerosol.model.build(&BuildOptions {
            grid: &aerosol_grid,
            cache: aerosol.cache.as_deref(),
        })?;
        let aerosol_name = aerosol.model.name();
        info!(
            "Aerosol model {} with τ550 = {:.4} over the {} atmosphere",
            aerosol_name, aerosol.tau550, config.atmosphere
        );

        let plane = config.altitudes.plane().map(|z| {
            let plane = Plane {
                altitude: z,
                rayleigh_below: profile.rayleigh_fraction_below(z),
                tau550_below: tau550_below(aerosol.tau550, aerosol.profile.as_deref(), z)
                    .min(aerosol.tau550),
            };
            info!(
                "Sensor at {:.3} km: {:.3} of the molecules and τ550 = {:.4} below",
                z, plane.rayleigh_below, plane.tau550_below
            );
            plane
        });
        let gas = GasAbsorption::from_profile(
            profile,
            config.altitudes.sensor.unwrap_or(SATELLITE_LEVEL),
        );

        let settings = Settings {
            polarized: config.polarized,
            coupling: config.surface.is_brdf(),
            lut: config.lut.is_some(),
            ..Settings::default()
        };
        let discrete = sos::compute(&Scene {
            grid: &grid,
            aerosol_grid: &aerosol_grid,
            phi,
            profile,
            optics: &optics,
            tau550: aerosol.tau550,
            aerosol_profile: aerosol.profile.as_deref(),
            plane,
            settings,
        })?;

        let coupling = match &config.surface {
            Surface::Brdf { model } if !model.is_lambertian() => {
                Some(coupling_terms(model, &grid, &discrete)?)
            }
            _ => None,
        };
        let ground_polarization = ground_polarization(&config, mu_s, mu_v, phi);

        Ok(Self {
            config,
            grid,
            gas,
            discrete,
            aerosol_name,
            coupling,
            ground_polarization,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn discrete(&self) -> &DiscreteResults {
        &self.discrete
    }

    fn ground(&self) -> Ground<'_> {
        match (&self.config.surface, &self.coupling) {
            (_, Some(terms)) => Ground::Brdf(terms),
            (Surface::Homogeneous { reflectance }, None) => Ground::Lambertian {
                target: *reflectance,
                environment: *reflectance,
                radius: None,
            },
            (
                Surface::Patchy {
                    target,
                    environment,
                    radius,
                },
                None,
            ) => Ground::Lambertian {
                target: *target,
                environment: *environment,
                radius: Some(*radius),
            },
            (Surface::Brdf { model }, None) => {
                let rho = match model {
                    SurfaceModel::Lambertian { reflectance } => *reflectance,
                    other => other.at(0.55).albedo(self.grid.mu_s()),
                };
                Ground::Lambertian {
                    target: rho,
                    environment: rho,
                    radius: None,
                }
            }
        }
    }

    /// Simulates the band-integrated signal at the sensor.
    pub fn forward(&self) -> BandResult {
        band::integrate(
            &self.config.spectrum,
            &BandInputs {
                discrete: &self.discrete,
                gas: &self.gas,
                earth_sun: self.config.earth_sun_factor(),
                ground: self.ground(),
                ground_polarization: self.ground_polarization.as_deref(),
                plane_altitude: self.config.altitudes.plane(),
                polarized: self.config.polarized,
                details: self.config.details,
            },
        )
    }

    /// Retrieves the ground reflectance that explains `correction`.
    pub fn invert(&self, correction: &Correction) -> Result<Inversion> {
        let band = self.forward();
        inversion::invert(&band, self.grid.mu_s(), correction)
    }

    /// Angular table of the path reflectance of `band`, when the engine
    /// was built with a look-up table output.
    pub fn lut(&self, band: &BandResult) -> Option<AngularLut> {
        let values = band.lut.as_ref()?;
        let mut rows: Vec<LutRow> = self
            .discrete
            .lut_cosines
            .iter()
            .zip(&self.discrete.lut_azimuths)
            .zip(values)
            .map(|((mu, azimuths), values)| LutRow {
                view_zenith: mu.clamp(-1.0, 1.0).acos().to_degrees(),
                azimuths: azimuths.clone(),
                values: values.clone(),
            })
            .collect();
        rows.sort_by(|a, b| a.view_zenith.total_cmp(&b.view_zenith));
        Some(AngularLut {
            range: band.range,
            tau_band: band.optical_depth.aerosol,
            tau550: self.config.aerosol.tau550,
            aerosol: self.aerosol_name.clone(),
            solar_zenith: self.config.geometry.solar_zenith,
            rows,
        })
    }

    /// Runs the forward simulation, the requested correction and the
    /// look-up table export.
    pub fn run(&self) -> Result<Report> {
        let band = self.forward();
        let inversion = match &self.config.correction {
            Some(correction) => Some(inversion::invert(&band, self.grid.mu_s(), correction)?),
            None => None,
        };
        if let Some(path) = &self.config.lut {
            let table = self.lut(&band).ok_or_else(|| EngineError::Numerical {
                stage: "look-up table",
                reason: "no table was sampled".into(),
            })?;
            table.write(path)?;
        }
        Ok(Report { band, inversion })
    }
}

/// Coupling terms of `model` at each reference wavelength.
fn coupling_terms(
    model: &SurfaceModel,
    grid: &AngularGrid,
    discrete: &DiscreteResults,
) -> Result<Vec<CouplingTerms>> {
    info!("Coupling the {} surface with the sky radiance", model.name());
    discrete
        .wavelengths
        .par_iter()
        .map(|w| {
            let fields = w.coupling.as_ref().ok_or_else(|| EngineError::Numerical {
                stage: "surface coupling",
                reason: format!("no downward field at {} µm", w.wavelength),
            })?;
            let brdf = model.at(w.wavelength);
            Ok(CouplingTerms::compute(brdf.as_ref(), grid, fields, discrete.phi))
        })
        .collect()
}

/// Polarized ground reflectance at each reference wavelength.
fn ground_polarization(config: &RunConfig, mu_s: f64, mu_v: f64, phi: f64) -> Option<Vec<(f64, f64)>> {
    if !config.polarized {
        return None;
    }
    if let Some(p) = config.ground_polarization {
        return Some(vec![(p.q, p.u); NB_WAVELENGTHS]);
    }
    let Surface::Brdf { model } = &config.surface else {
        return None;
    };
    let values: Vec<Option<(f64, f64)>> = WAVELENGTHS
        .iter()
        .map(|wl| model.at(*wl).polarized(mu_s, mu_v, phi))
        .collect();
    values
        .iter()
        .any(Option::is_some)
        .then(|| values.into_iter().map(|v| v.unwrap_or((0.0, 0.0))).collect())
}
