//! Successive-orders-of-scattering solver and its per-wavelength driver.
//!
//! [`compute`] runs the radiance and transmittance solves at each of the
//! reference wavelengths of the aerosol tables, for the molecular, the
//! aerosol and the mixed atmosphere.

pub mod iso;
pub mod kernel;
pub mod layers;
pub mod radiance;

use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

use crate::aerosol::{NB_WAVELENGTHS, OpticalTable, WAVELENGTHS};
use crate::atmosphere::{AtmosphericProfile, rayleigh};
use crate::error::Result;
use crate::phase::{LegendreSeries, Truncated, scale_layer, truncate};
use crate::quadrature::{AerosolGrid, AngularGrid};

use layers::{AerosolLayer, Column, DEFAULT_LAYERS, Layering, SensorLevel, THIN_DEPTH};
pub use radiance::Stokes;
use radiance::{Problem, RadianceField};

/// Plane tolerance used for the radiance solves.
pub const RADIANCE_PLANE_TOLERANCE: f64 = 5e-4;

/// One value per scatterer population.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Components<T> {
    pub rayleigh: T,
    pub aerosol: T,
    pub mixed: T,
}

impl<T> Components<T> {
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Components<U> {
        Components {
            rayleigh: f(&self.rayleigh),
            aerosol: f(&self.aerosol),
            mixed: f(&self.mixed),
        }
    }
}

/// Total and direct transmittance along one path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transfer {
    pub total: f64,
    pub direct: f64,
}

impl Transfer {
    pub const CLEAR: Transfer = Transfer {
        total: 1.0,
        direct: 1.0,
    };

    pub fn diffuse(&self) -> f64 {
        (self.total - self.direct).max(0.0)
    }
}

/// Solver options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Number of layers of the discretization
    pub layers: usize,
    pub polarized: bool,
    /// Keep the downward radiance fields needed by the BRDF coupling
    pub coupling: bool,
    /// Sample the top-of-column reflectance for the look-up table
    pub lut: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            layers: DEFAULT_LAYERS,
            polarized: false,
            coupling: false,
            lut: false,
        }
    }
}

/// Sensor inside the atmosphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Altitude above the target (km)
    pub altitude: f64,
    /// Fraction of the molecular depth found below the sensor
    pub rayleigh_below: f64,
    /// Aerosol depth at 550 nm below the sensor
    pub tau550_below: f64,
}

/// Everything the per-wavelength solves share.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub grid: &'a AngularGrid,
    pub aerosol_grid: &'a AerosolGrid,
    /// Relative azimuth (radians)
    pub phi: f64,
    pub profile: &'a AtmosphericProfile,
    pub optics: &'a OpticalTable,
    pub tau550: f64,
    pub aerosol_profile: Option<&'a [AerosolLayer]>,
    /// `None` for a sensor above the atmosphere
    pub plane: Option<Plane>,
    pub settings: Settings,
}

/// Downward diffuse radiance at the ground, `radiance[l][k - 1]` for
/// azimuth `l` of the grid and stream `k` in `1..mu`.
#[derive(Debug, Clone, PartialEq)]
pub struct DownwardField {
    pub radiance: Vec<Vec<f64>>,
}

impl DownwardField {
    fn from_streams(field: &RadianceField, mu: usize) -> Self {
        let mui = mu as isize;
        let radiance = field
            .streams
            .iter()
            .map(|s| (1..mui).map(|k| s[-k].i).collect())
            .collect();
        Self { radiance }
    }
}

/// Downward fields of the mixed atmosphere for a beam entering at the sun
/// and at the view direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingFields {
    pub sun: DownwardField,
    pub view: DownwardField,
}

/// Results at one reference wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthResult {
    pub wavelength: f64,
    /// Optical depths of the whole column (aerosol before δ-M scaling)
    pub tau: Components<f64>,
    /// Optical depths above the sensor
    pub tau_above_plane: Components<f64>,
    pub omega_a: f64,
    /// Intrinsic reflectance at the sensor level
    pub reflectance: Components<Stokes>,
    /// Intrinsic reflectance at the top of the column
    pub reflectance_toa: Components<Stokes>,
    /// Sensor-level reflectance at relative azimuths 0..=180° (empty for
    /// the aerosol-only atmosphere)
    pub azimuthal: Components<Vec<f64>>,
    pub down: Components<Transfer>,
    pub up: Components<Transfer>,
    pub spherical_albedo: Components<f64>,
    /// Aerosol phase matrix at the observation scattering angle
    pub aerosol_phase: Stokes,
    /// Top-of-column reflectance of the mixed atmosphere at the look-up
    /// table azimuths
    pub lut: Option<Vec<Vec<Stokes>>>,
    pub coupling: Option<CouplingFields>,
}

/// Results at all reference wavelengths.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteResults {
    pub mu_s: f64,
    pub mu_v: f64,
    pub phi: f64,
    /// Cosine of the observation scattering angle
    pub scattering_cosine: f64,
    pub wavelengths: Vec<WavelengthResult>,
    /// Cosines of the look-up table view directions
    pub lut_cosines: Vec<f64>,
    /// Look-up table azimuths (degrees) for each view direction
    pub lut_azimuths: Vec<Vec<f64>>,
}

/// Cosine of the scattering angle between the solar beam and the
/// observer direction.
pub fn scattering_cosine(mu_s: f64, mu_v: f64, phi: f64) -> f64 {
    let sin = (1.0 - mu_s * mu_s).max(0.0).sqrt() * (1.0 - mu_v * mu_v).max(0.0).sqrt();
    (-mu_s * mu_v - sin * phi.cos()).clamp(-1.0, 1.0)
}

/// Solves every reference wavelength, in parallel.
pub fn compute(scene: &Scene) -> Result<DiscreteResults> {
    let grid = scene.grid;
    let (mu_s, mu_v) = (grid.mu_s(), grid.mu_v());
    info!(
        "Solving {} wavelengths with {} layers (polarized: {})",
        NB_WAVELENGTHS, scene.settings.layers, scene.settings.polarized
    );

    let wavelengths = (0..NB_WAVELENGTHS)
        .into_par_iter()
        .map(|l| solve_wavelength(scene, l))
        .collect::<Vec<_>>();

    let lut_azimuths = if scene.settings.lut {
        radiance::lut_azimuths(grid)
    } else {
        Vec::new()
    };
    let lut_cosines = if scene.settings.lut {
        (1..=grid.mu() as isize).map(|k| grid.rm(k)).collect()
    } else {
        Vec::new()
    };

    Ok(DiscreteResults {
        mu_s,
        mu_v,
        phi: scene.phi,
        scattering_cosine: scattering_cosine(mu_s, mu_v, scene.phi),
        wavelengths,
        lut_cosines,
        lut_azimuths,
    })
}

/// Layerings of one column for the radiance and transmittance solves.
struct ColumnSolve {
    radiance: Layering,
    iso: Layering,
}

impl ColumnSolve {
    fn new(column: &Column, mu_s: f64, layers: usize) -> Self {
        Self {
            radiance: Layering::build(column, mu_s, layers, RADIANCE_PLANE_TOLERANCE),
            iso: Layering::build(column, mu_s, layers, iso::PLANE_TOLERANCE),
        }
    }
}

/// Output of the solves of one column.
struct ColumnOutput {
    field: RadianceField,
    down: Transfer,
    up: Transfer,
    spherical_albedo: f64,
}

fn solve_column(
    scene: &Scene,
    column: &Column,
    tau_below: f64,
    series: &LegendreSeries,
) -> ColumnOutput {
    let grid = scene.grid;
    let (mu_s, mu_v) = (grid.mu_s(), grid.mu_v());
    let layering = ColumnSolve::new(column, mu_s, scene.settings.layers);

    let field = radiance::solve(&Problem {
        grid,
        layering: &layering.radiance,
        series,
        phi: scene.phi,
        polarized: scene.settings.polarized,
        tau_a: column.tau_a,
    });

    let sun = iso::solve(&grid.with_directions(mu_s, mu_s), &layering.iso, series);
    let view = iso::solve(&grid.with_directions(mu_s, mu_v), &layering.iso, series);
    let depth = column.tau_r + column.tau_a;
    ColumnOutput {
        field,
        down: Transfer {
            total: sun.top,
            direct: (-depth / mu_s).exp(),
        },
        up: Transfer {
            total: view.plane,
            direct: (-tau_below / mu_v).exp(),
        },
        spherical_albedo: sun.spherical_albedo,
    }
}

fn sensor_level(scene: &Scene, tau_r: f64, tau_a: f64, scale: f64) -> SensorLevel {
    match scene.plane {
        Some(plane) => SensorLevel::Aircraft {
            altitude: plane.altitude,
            tau_r_above: tau_r * (1.0 - plane.rayleigh_below),
            tau_a_above: if scene.tau550 > 0.0 {
                (tau_a * (1.0 - plane.tau550_below / scene.tau550) * scale).max(0.0)
            } else {
                0.0
            },
        },
        None => SensorLevel::Satellite,
    }
}

fn solve_wavelength(scene: &Scene, l: usize) -> WavelengthResult {
    let grid = scene.grid;
    let (mu_s, mu_v) = (grid.mu_s(), grid.mu_v());
    let settings = scene.settings;
    let optics = scene.optics;
    let wavelength = WAVELENGTHS[l];

    let tau_r = rayleigh::optical_depth(scene.profile, wavelength);
    let has_aerosol = !optics.is_empty() && scene.tau550 > 0.0;
    let tau_a = if has_aerosol {
        scene.tau550 * optics.extinction[l]
    } else {
        0.0
    };
    let omega = optics.single_scattering_albedo(l);

    let xmud = scattering_cosine(mu_s, mu_v, scene.phi);
    let (truncated, aerosol_phase) = if has_aerosol {
        let ag = scene.aerosol_grid;
        let nterms = ag.len().saturating_sub(3).max(2);
        let t = truncate(
            &optics.p11[l],
            &optics.q[l],
            &optics.u[l],
            ag,
            nterms,
            settings.polarized,
        );
        let phase = Stokes::new(
            ag.interpolate(&optics.p11[l], xmud),
            ag.interpolate(&optics.q[l], xmud),
            ag.interpolate(&optics.u[l], xmud),
        );
        (t, phase)
    } else {
        (
            Truncated {
                series: LegendreSeries::zeros(3),
                coeff: 0.0,
            },
            Stokes::default(),
        )
    };
    let (tau_a_scaled, omega_scaled) = scale_layer(tau_a, omega, truncated.coeff);
    let scale = if tau_a > 0.0 { tau_a_scaled / tau_a } else { 1.0 };
    debug!(
        "λ = {:.4} µm: τr = {:.4}, τa = {:.4} (δ-M {:.4}), ω = {:.4}",
        wavelength, tau_r, tau_a, tau_a_scaled, omega
    );

    let below = |tr: f64, ta: f64| -> f64 {
        match sensor_level(scene, tr, ta, scale) {
            SensorLevel::Aircraft {
                tau_r_above,
                tau_a_above,
                ..
            } => tr + ta * scale - tau_r_above - tau_a_above,
            SensorLevel::Satellite => tr + ta * scale,
        }
    };
    let column = |tr: f64, ta: f64| Column {
        tau_r: tr,
        tau_a: ta * scale,
        omega_a: if ta > 0.0 { omega_scaled } else { 0.0 },
        sensor: sensor_level(scene, tr, ta, scale),
        profile: scene.aerosol_profile,
    };
    let series = &truncated.series;

    let rayleigh_out = solve_column(scene, &column(tau_r, 0.0), below(tau_r, 0.0), series);
    let (aerosol_out, mixed_out) = if tau_a * scale > THIN_DEPTH {
        (
            Some(solve_column(scene, &column(0.0, tau_a), below(0.0, tau_a), series)),
            Some(solve_column(scene, &column(tau_r, tau_a), below(tau_r, tau_a), series)),
        )
    } else {
        (None, None)
    };
    let mixed = mixed_out.as_ref().unwrap_or(&rayleigh_out);

    let coupling = if settings.coupling {
        let view_grid = grid.with_directions(mu_v, mu_v);
        let view_column = column(tau_r, if mixed_out.is_some() { tau_a } else { 0.0 });
        let layering = Layering::build(
            &view_column,
            mu_v,
            settings.layers,
            RADIANCE_PLANE_TOLERANCE,
        );
        let view = radiance::solve(&Problem {
            grid: &view_grid,
            layering: &layering,
            series,
            phi: scene.phi,
            polarized: false,
            tau_a: view_column.tau_a,
        });
        Some(CouplingFields {
            sun: DownwardField::from_streams(&mixed.field, grid.mu()),
            view: DownwardField::from_streams(&view, grid.mu()),
        })
    } else {
        None
    };

    let above = |tr: f64, ta: f64| -> f64 {
        match scene.plane {
            Some(plane) => {
                let ta_above = if scene.tau550 > 0.0 {
                    ta * (1.0 - plane.tau550_below / scene.tau550)
                } else {
                    0.0
                };
                tr * (1.0 - plane.rayleigh_below) + ta_above.max(0.0)
            }
            None => 0.0,
        }
    };

    let reflectance_of = |out: Option<&ColumnOutput>| -> Stokes {
        out.map_or_else(Stokes::default, |o| o.field.plane * (1.0 / mu_s))
    };
    let toa_of = |out: Option<&ColumnOutput>| -> Stokes {
        out.map_or_else(Stokes::default, |o| o.field.toa * (1.0 / mu_s))
    };
    let azimuthal_of = |out: &ColumnOutput| -> Vec<f64> {
        out.field.plane_azimuths.iter().map(|v| v / mu_s).collect()
    };
    let aerosol = aerosol_out.as_ref();

    WavelengthResult {
        wavelength,
        tau: Components {
            rayleigh: tau_r,
            aerosol: tau_a,
            mixed: tau_r + tau_a,
        },
        tau_above_plane: Components {
            rayleigh: above(tau_r, 0.0),
            aerosol: above(0.0, tau_a),
            mixed: above(tau_r, tau_a),
        },
        omega_a: omega,
        reflectance: Components {
            rayleigh: reflectance_of(Some(&rayleigh_out)),
            aerosol: reflectance_of(aerosol),
            mixed: reflectance_of(Some(mixed)),
        },
        reflectance_toa: Components {
            rayleigh: toa_of(Some(&rayleigh_out)),
            aerosol: toa_of(aerosol),
            mixed: toa_of(Some(mixed)),
        },
        azimuthal: Components {
            rayleigh: azimuthal_of(&rayleigh_out),
            aerosol: Vec::new(),
            mixed: azimuthal_of(mixed),
        },
        down: Components {
            rayleigh: rayleigh_out.down,
            aerosol: aerosol.map_or(Transfer::CLEAR, |o| o.down),
            mixed: mixed.down,
        },
        up: Components {
            rayleigh: rayleigh_out.up,
            aerosol: aerosol.map_or(Transfer::CLEAR, |o| o.up),
            mixed: mixed.up,
        },
        spherical_albedo: Components {
            rayleigh: rayleigh_out.spherical_albedo,
            aerosol: aerosol.map_or(0.0, |o| o.spherical_albedo),
            mixed: mixed.spherical_albedo,
        },
        aerosol_phase,
        lut: settings.lut.then(|| {
            mixed
                .field
                .lut
                .iter()
                .map(|row| row.iter().map(|v| *v * (1.0 / mu_s)).collect())
                .collect()
        }),
        coupling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::{AerosolModel, BuildOptions};
    use crate::atmosphere::StandardAtmosphere;

    fn scene_parts(model: AerosolModel) -> (AngularGrid, AerosolGrid, AtmosphericProfile, OpticalTable) {
        let grid = AngularGrid::standard(30f64.to_radians().cos(), 1.0).unwrap();
        let ag = AerosolGrid::standard().unwrap();
        let profile = AtmosphericProfile::standard(StandardAtmosphere::Us62);
        let optics = model.build(&BuildOptions { grid: &ag, cache: None }).unwrap();
        (grid, ag, profile, optics)
    }

    #[test]
    fn test_scattering_cosine() {
        // same azimuth: backscattering plane
        let x = scattering_cosine(1.0, 1.0, 0.0);
        assert!((x + 1.0).abs() < 1e-12);
        let x = scattering_cosine(0.5, 0.5, std::f64::consts::PI);
        assert!((x - 0.5).abs() < 1e-12, "got {:.6}", x);
    }

    #[test]
    fn test_no_aerosol_branch_is_zero() {
        let (grid, ag, profile, optics) = scene_parts(AerosolModel::None);
        let scene = Scene {
            grid: &grid,
            aerosol_grid: &ag,
            phi: 0.0,
            profile: &profile,
            optics: &optics,
            tau550: 0.0,
            aerosol_profile: None,
            plane: None,
            settings: Settings::default(),
        };
        let results = compute(&scene).unwrap();
        assert_eq!(results.wavelengths.len(), NB_WAVELENGTHS);
        for w in &results.wavelengths {
            assert_eq!(w.reflectance.aerosol, Stokes::default());
            assert_eq!(w.down.aerosol, Transfer::CLEAR);
            assert_eq!(w.reflectance.mixed, w.reflectance.rayleigh);
            assert!(w.reflectance.rayleigh.i > 0.0);
        }
        // molecular reflectance decreases with wavelength
        let first = results.wavelengths[0].reflectance.rayleigh.i;
        let last = results.wavelengths[NB_WAVELENGTHS - 1].reflectance.rayleigh.i;
        assert!(first > 10.0 * last, "Expected {:.4} >> {:.6}", first, last);
    }

    #[test]
    fn test_continental_column() {
        let (grid, ag, profile, optics) = scene_parts(AerosolModel::Continental);
        let scene = Scene {
            grid: &grid,
            aerosol_grid: &ag,
            phi: 0.0,
            profile: &profile,
            optics: &optics,
            tau550: 0.23,
            aerosol_profile: None,
            plane: None,
            settings: Settings::default(),
        };
        let results = compute(&scene).unwrap();
        let w = &results.wavelengths[crate::aerosol::REFERENCE_INDEX];
        assert!((w.tau.aerosol - 0.23).abs() < 1e-9);
        assert!(w.reflectance.aerosol.i > 0.0);
        assert!(w.reflectance.mixed.i > w.reflectance.rayleigh.i);
        assert!(w.down.mixed.total < w.down.rayleigh.total);
        assert!(w.down.mixed.total > w.down.mixed.direct);
        assert!(w.spherical_albedo.mixed > w.spherical_albedo.rayleigh);
        assert_eq!(w.tau_above_plane.mixed, 0.0);
    }

    #[test]
    fn test_parallel_runs_are_identical() {
        let (grid, ag, profile, optics) = scene_parts(AerosolModel::Maritime);
        let scene = Scene {
            grid: &grid,
            aerosol_grid: &ag,
            phi: 1.0,
            profile: &profile,
            optics: &optics,
            tau550: 0.1,
            aerosol_profile: None,
            plane: None,
            settings: Settings::default(),
        };
        let a = compute(&scene).unwrap();
        let b = compute(&scene).unwrap();
        assert_eq!(a, b);
    }
}
