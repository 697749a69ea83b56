//! Integration of the simulated signal over a sensor spectral response.

use std::f64::consts::PI;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::atmosphere::gas::GasAbsorption;
use crate::config::ConfigError;
use crate::environment::{
    CouplingTerms, PathTransmittance, average_reflectance, environment_function, lambertian_surface,
};
use crate::interp::{self, Interpolated};
use crate::solar::{self, IRRADIANCE_START, STEP};
use crate::sos::{Components, DiscreteResults, Stokes};

/// Spectral conditions of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Spectrum {
    /// A single wavelength (µm)
    Monochromatic { wavelength: f64 },
    /// A band between `start` and `end` (µm) with its response sampled
    /// every 2.5 nm from `start`. An empty response is flat.
    Band {
        start: f64,
        end: f64,
        #[serde(default)]
        response: Vec<f64>,
    },
}

/// One integration node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub wavelength: f64,
    /// Response including the trapezoid end weights
    pub weight: f64,
}

/// Index of the irradiance-table node closest to `wl`.
fn grid_index(wl: f64) -> usize {
    ((wl - IRRADIANCE_START) / STEP).round().max(0.0) as usize
}

impl Spectrum {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |wl: f64| wl.is_finite() && (0.25..=4.0).contains(&wl);
        match self {
            Spectrum::Monochromatic { wavelength } => {
                if !valid(*wavelength) {
                    return Err(ConfigError::Spectrum(format!(
                        "wavelength must lie in [0.25, 4.0] µm, got {}",
                        wavelength
                    )));
                }
            }
            Spectrum::Band {
                start,
                end,
                response,
            } => {
                if !valid(*start) || !valid(*end) || end <= start {
                    return Err(ConfigError::Spectrum(format!(
                        "band limits must satisfy 0.25 <= start < end <= 4.0 µm, got {} to {}",
                        start, end
                    )));
                }
                let n = grid_index(*end) - grid_index(*start) + 1;
                if !response.is_empty() && response.len() != n {
                    return Err(ConfigError::Spectrum(format!(
                        "expected {} response values between {} and {} µm, got {}",
                        n,
                        start,
                        end,
                        response.len()
                    )));
                }
                if response.iter().any(|s| !s.is_finite() || *s < 0.0) {
                    return Err(ConfigError::Spectrum(
                        "response values must be finite and non-negative".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Wavelength limits (µm).
    pub fn range(&self) -> (f64, f64) {
        match self {
            Spectrum::Monochromatic { wavelength } => (*wavelength, *wavelength),
            Spectrum::Band { start, end, .. } => (*start, *end),
        }
    }

    /// Integration nodes on the 2.5 nm grid. A monochromatic spectrum has
    /// one node whose weight cancels the step.
    pub fn samples(&self) -> Vec<Sample> {
        match self {
            Spectrum::Monochromatic { wavelength } => vec![Sample {
                wavelength: *wavelength,
                weight: 1.0 / STEP,
            }],
            Spectrum::Band {
                start,
                end,
                response,
            } => {
                let (first, last) = (grid_index(*start), grid_index(*end));
                (first..=last)
                    .enumerate()
                    .map(|(i, l)| {
                        let s = response.get(i).copied().unwrap_or(1.0);
                        let edge = l == first || l == last;
                        Sample {
                            wavelength: IRRADIANCE_START + l as f64 * STEP,
                            weight: if edge { 0.5 * s } else { s },
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Ground seen by the sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ground<'a> {
    /// Lambertian target inside a Lambertian surround of `radius` km.
    /// Without a radius the ground is uniform.
    Lambertian {
        target: f64,
        environment: f64,
        radius: Option<f64>,
    },
    /// Coupling terms of a BRDF at the reference wavelengths
    Brdf(&'a [CouplingTerms]),
}

/// Everything band integration needs besides the spectrum.
#[derive(Debug, Clone, Copy)]
pub struct BandInputs<'a> {
    pub discrete: &'a DiscreteResults,
    pub gas: &'a GasAbsorption,
    /// Earth-Sun distance factor of the date
    pub earth_sun: f64,
    pub ground: Ground<'a>,
    /// Polarized ground reflectance `(Q, U)` at the reference wavelengths
    pub ground_polarization: Option<&'a [(f64, f64)]>,
    /// Sensor altitude above the target (km), `None` above the atmosphere
    pub plane_altitude: Option<f64>,
    pub polarized: bool,
    /// Keep one row per integration node
    pub details: bool,
}

/// Signal at one integration node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetailRow {
    pub wavelength: f64,
    pub solar_irradiance: f64,
    pub response: f64,
    pub path_reflectance: f64,
    pub apparent_reflectance: f64,
    /// Surface contribution after gas absorption
    pub surface_reflectance: f64,
    pub down: f64,
    pub up: f64,
    pub spherical_albedo: f64,
    pub gas: f64,
}

/// Direct, diffuse and environment parts of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Parts {
    pub direct: f64,
    pub diffuse: f64,
    pub environment: f64,
}

impl Parts {
    fn add(&mut self, o: Parts, w: f64) {
        self.direct += o.direct * w;
        self.diffuse += o.diffuse * w;
        self.environment += o.environment * w;
    }

    fn scale(&mut self, f: f64) {
        self.direct *= f;
        self.diffuse *= f;
        self.environment *= f;
    }
}

/// Gas transmittances averaged over the band.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GasBand {
    pub down: f64,
    pub up: f64,
    pub total: f64,
}

/// Polarized part of the signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Polarization {
    pub reflectance: Stokes,
    /// Radiance (W m⁻² sr⁻¹ µm⁻¹)
    pub radiance: Stokes,
}

impl Polarization {
    pub fn degree(&self) -> f64 {
        self.radiance.degree_of_polarization()
    }

    pub fn plane_angle(&self) -> f64 {
        self.radiance.plane_angle()
    }
}

/// Band-integrated signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandResult {
    /// Wavelength limits (µm)
    pub range: (f64, f64),
    /// Integrated response
    pub response: f64,
    /// Mean solar irradiance at the top of the atmosphere
    pub solar_irradiance: f64,
    /// Top-of-atmosphere reflectance
    pub apparent_reflectance: f64,
    /// Apparent radiance (W m⁻² sr⁻¹ µm⁻¹)
    pub radiance: f64,
    /// Target reflectance in the observation geometry
    pub ground_reflectance: f64,
    /// Atmospheric, environment and target parts of the apparent
    /// reflectance
    pub reflectance_parts: Parts,
    /// The same parts as radiances
    pub radiance_parts: Parts,
    /// Direct, diffuse and environment shares of the ground irradiance
    pub irradiance_fractions: Parts,
    /// Ground irradiance (W m⁻² µm⁻¹)
    pub irradiance: Parts,
    pub intrinsic: Components<Stokes>,
    pub phase: Components<Stokes>,
    pub optical_depth: Components<f64>,
    /// Depths between the target and the sensor
    pub optical_depth_plane: Components<f64>,
    pub single_scattering_albedo: Components<f64>,
    pub down: Components<f64>,
    pub up: Components<f64>,
    /// Direct parts of the mixed downward and upward transmittances
    pub down_direct: f64,
    pub up_direct: f64,
    pub spherical_albedo: Components<f64>,
    /// BRDF coupling terms averaged over the band
    pub coupling: Option<CouplingTerms>,
    pub gas: GasBand,
    pub polarization: Option<Polarization>,
    /// Path reflectance at relative azimuths 0..=180°
    pub azimuthal: Vec<f64>,
    /// Mixed path reflectance at the look-up table nodes
    pub lut: Option<Vec<Vec<Stokes>>>,
    pub details: Vec<DetailRow>,
}

fn add_components(acc: &mut Components<f64>, v: Components<f64>, w: f64) {
    acc.rayleigh += v.rayleigh * w;
    acc.aerosol += v.aerosol * w;
    acc.mixed += v.mixed * w;
}

fn add_stokes(acc: &mut Components<Stokes>, v: &Components<Stokes>, w: f64) {
    acc.rayleigh += v.rayleigh * w;
    acc.aerosol += v.aerosol * w;
    acc.mixed += v.mixed * w;
}

/// Ground quantities at one wavelength.
struct GroundAt {
    /// Target reflectance
    target: f64,
    /// Reflectance seen through the diffuse upward path
    average: f64,
    /// Surface contribution before gas absorption
    surface: f64,
    terms: Option<CouplingTerms>,
}

fn ground_at(inputs: &BandInputs, it: &Interpolated, path: &PathTransmittance) -> GroundAt {
    let s = it.spherical_albedo.mixed;
    match inputs.ground {
        Ground::Lambertian {
            target,
            environment,
            radius,
        } => {
            let average = match radius {
                Some(r) => {
                    let fr = environment_function(
                        it.up.rayleigh.diffuse(),
                        it.up.aerosol.diffuse(),
                        r,
                        inputs.plane_altitude,
                        inputs.discrete.mu_v,
                    )
                    .mixed;
                    average_reflectance(fr, target, environment)
                }
                None => target,
            };
            GroundAt {
                target,
                average,
                surface: lambertian_surface(target, average, path, s),
                terms: None,
            }
        }
        Ground::Brdf(terms) => {
            let pick = |f: fn(&CouplingTerms) -> f64| -> f64 {
                let values: Vec<f64> = terms.iter().map(f).collect();
                interp::linear_at(it.wavelength, &values)
            };
            let at = CouplingTerms {
                rho: pick(|t| t.rho),
                rho_bar: pick(|t| t.rho_bar),
                rho_bar_prime: pick(|t| t.rho_bar_prime),
                rho_bar_bar: pick(|t| t.rho_bar_bar),
            };
            GroundAt {
                target: at.rho,
                average: at.rho_bar_bar,
                surface: at.surface(path, s),
                terms: Some(at),
            }
        }
    }
}

/// Integrates the signal over `spectrum`.
pub fn integrate(spectrum: &Spectrum, inputs: &BandInputs) -> BandResult {
    let discrete = inputs.discrete;
    let (mu_s, mu_v) = (discrete.mu_s, discrete.mu_v);
    let samples = spectrum.samples();
    debug!("Integrating {} spectral nodes", samples.len());

    let mut sb = 0.0;
    let mut seb = 0.0;
    let mut refet = 0.0;
    let mut radiance = 0.0;
    let mut rog = 0.0;
    let mut reflectance_parts = Parts::default();
    let mut radiance_parts = Parts::default();
    let mut irradiance_fractions = Parts::default();
    let mut irradiance = Parts::default();
    let mut intrinsic = Components::<Stokes>::default();
    let mut phase = Components::<Stokes>::default();
    let mut optical_depth = Components::<f64>::default();
    let mut optical_depth_plane = Components::<f64>::default();
    let mut scattering = 0.0;
    let mut down = Components::<f64>::default();
    let mut up = Components::<f64>::default();
    let mut spherical_albedo = Components::<f64>::default();
    let mut direct_paths = (0.0, 0.0);
    let mut coupling: Option<CouplingTerms> = None;
    let mut gas = GasBand::default();
    let mut polarized = (Stokes::default(), Stokes::default());
    let mut azimuthal: Vec<f64> = Vec::new();
    let mut lut: Option<Vec<Vec<Stokes>>> = None;
    let mut details = Vec::new();

    for sample in &samples {
        let wl = sample.wavelength;
        let e0 = solar::irradiance(wl) * inputs.earth_sun;
        let coef = sample.weight * STEP * e0;
        let coefp = sample.weight * STEP;
        sb += coefp;
        seb += coef;

        let it = interp::at_wavelength(wl, discrete);
        let g = inputs.gas.at(wl, mu_s, mu_v);
        let tg = g.total();
        let path = PathTransmittance {
            down: it.down.mixed,
            up: it.up.mixed,
        };
        let s = it.spherical_albedo.mixed;
        let ground = ground_at(inputs, &it, &path);

        let romix = it.reflectance.mixed;
        // path and surface signals both cross the full gas column
        let ratm = romix.i * tg;
        let apparent = ratm + ground.surface * tg;
        refet += apparent * coef;
        let to_radiance = mu_s * e0 / PI;
        radiance += to_radiance * apparent * coefp;
        rog += ground.target * coef;

        // irradiance at the ground and radiance at the sensor, split by origin
        let denom = 1.0 - ground.average * s;
        let denom = if denom.abs() < 1e-10 { 1.0 } else { denom };
        let t_down = path.down.total;
        let direct = path.down.direct * g.down;
        let diffuse = path.down.diffuse() * g.down;
        let environment = g.down * ground.average * s * t_down / denom;
        let total = t_down * g.down / denom;
        let ground_irradiance = Parts {
            direct,
            diffuse,
            environment,
        };
        if total > 1e-3 {
            let mut fractions = ground_irradiance;
            fractions.scale(1.0 / total);
            irradiance_fractions.add(fractions, coef);
        }
        irradiance.add(ground_irradiance, mu_s * e0 * coefp);
        let parts = Parts {
            direct: ground.target * t_down * path.up.direct * tg / denom,
            diffuse: ratm,
            environment: ground.average * t_down * path.up.diffuse() * tg / denom,
        };
        reflectance_parts.add(parts, coef);
        radiance_parts.add(parts, to_radiance * coefp);

        add_stokes(&mut intrinsic, &it.reflectance, coef);
        add_stokes(&mut phase, &it.phase, coef);
        add_components(&mut optical_depth, it.tau, coef);
        let plane = Components {
            rayleigh: it.tau.rayleigh - it.tau_above_plane.rayleigh,
            aerosol: it.tau.aerosol - it.tau_above_plane.aerosol,
            mixed: it.tau.mixed - it.tau_above_plane.mixed,
        };
        add_components(&mut optical_depth_plane, plane, coef);
        scattering += it.tau_scattering * coef;
        add_components(&mut down, it.down.map(|t| t.total), coef);
        add_components(&mut up, it.up.map(|t| t.total), coef);
        add_components(&mut spherical_albedo, it.spherical_albedo, coef);
        direct_paths.0 += path.down.direct * coef;
        direct_paths.1 += path.up.direct * coef;
        if let Some(t) = ground.terms {
            let acc = coupling.get_or_insert(CouplingTerms::lambertian(0.0));
            acc.rho += t.rho * coef;
            acc.rho_bar += t.rho_bar * coef;
            acc.rho_bar_prime += t.rho_bar_prime * coef;
            acc.rho_bar_bar += t.rho_bar_bar * coef;
        }
        gas.down += g.down * coef;
        gas.up += g.up * coef;
        gas.total += tg * coef;

        if inputs.polarized {
            let (ropq, ropu) = inputs.ground_polarization.map_or((0.0, 0.0), |values| {
                let q: Vec<f64> = values.iter().map(|v| v.0).collect();
                let u: Vec<f64> = values.iter().map(|v| v.1).collect();
                (interp::linear_at(wl, &q), interp::linear_at(wl, &u))
            });
            let tdir = (-plane.mixed * (1.0 / mu_v + 1.0 / mu_s)).exp();
            let q = (romix.q + ropq * tdir) * tg;
            let u = (romix.u + ropu * tdir) * tg;
            let reflectance = Stokes::new(apparent, q, u);
            polarized.0 += reflectance * coef;
            polarized.1 += reflectance * (to_radiance * coefp);
        }

        if azimuthal.is_empty() {
            azimuthal = vec![0.0; it.azimuthal.len()];
        }
        for (acc, v) in azimuthal.iter_mut().zip(&it.azimuthal) {
            *acc += v * tg * coef;
        }
        if let Some(table) = &it.lut {
            let acc = lut.get_or_insert_with(|| {
                table.iter().map(|row| vec![Stokes::default(); row.len()]).collect()
            });
            for (acc_row, row) in acc.iter_mut().zip(table) {
                for (a, v) in acc_row.iter_mut().zip(row) {
                    *a += *v * coef;
                }
            }
        }

        if inputs.details {
            details.push(DetailRow {
                wavelength: wl,
                solar_irradiance: e0,
                response: sample.weight,
                path_reflectance: ratm,
                apparent_reflectance: apparent,
                surface_reflectance: ground.surface * tg,
                down: t_down,
                up: path.up.total,
                spherical_albedo: s,
                gas: tg,
            });
        }
    }

    let (nseb, nsb) = (
        if seb > 0.0 { 1.0 / seb } else { 0.0 },
        if sb > 0.0 { 1.0 / sb } else { 0.0 },
    );
    let norm = |c: Components<f64>| c.map(|v| v * nseb);
    let norm_stokes = |c: Components<Stokes>| c.map(|v| *v * nseb);

    let optical_depth = norm(optical_depth);
    let scattering = scattering * nseb;
    let omega_a = if optical_depth.aerosol > 0.0 {
        scattering / optical_depth.aerosol
    } else {
        0.0
    };
    let tau_total = optical_depth.rayleigh + optical_depth.aerosol;
    let single_scattering_albedo = Components {
        rayleigh: 1.0,
        aerosol: omega_a,
        mixed: if tau_total > 0.0 {
            (optical_depth.rayleigh + omega_a * optical_depth.aerosol) / tau_total
        } else {
            1.0
        },
    };
    let mut phase = norm_stokes(phase);
    if tau_total > 0.0 {
        phase.mixed = (phase.rayleigh * optical_depth.rayleigh + phase.aerosol * optical_depth.aerosol)
            * (1.0 / tau_total);
    }
    reflectance_parts.scale(nseb);
    radiance_parts.scale(nsb);
    irradiance_fractions.scale(nseb);
    irradiance.scale(nsb);
    gas.down *= nseb;
    gas.up *= nseb;
    gas.total *= nseb;

    BandResult {
        range: spectrum.range(),
        response: sb,
        solar_irradiance: seb * nsb,
        apparent_reflectance: refet * nseb,
        radiance: radiance * nsb,
        ground_reflectance: rog * nseb,
        reflectance_parts,
        radiance_parts,
        irradiance_fractions,
        irradiance,
        intrinsic: norm_stokes(intrinsic),
        phase,
        optical_depth,
        optical_depth_plane: norm(optical_depth_plane),
        single_scattering_albedo,
        down: norm(down),
        up: norm(up),
        down_direct: direct_paths.0 * nseb,
        up_direct: direct_paths.1 * nseb,
        spherical_albedo: norm(spherical_albedo),
        coupling: coupling.map(|t| CouplingTerms {
            rho: t.rho * nseb,
            rho_bar: t.rho_bar * nseb,
            rho_bar_prime: t.rho_bar_prime * nseb,
            rho_bar_bar: t.rho_bar_bar * nseb,
        }),
        gas,
        polarization: inputs.polarized.then(|| Polarization {
            reflectance: polarized.0 * nseb,
            radiance: polarized.1 * nsb,
        }),
        azimuthal: azimuthal.into_iter().map(|v| v * nseb).collect(),
        lut: lut.map(|table| {
            table
                .into_iter()
                .map(|row| row.into_iter().map(|v| v * nseb).collect())
                .collect()
        }),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::{AerosolModel, BuildOptions};
    use crate::atmosphere::{AtmosphericProfile, StandardAtmosphere};
    use crate::quadrature::{AerosolGrid, AngularGrid};
    use crate::sos::{self, Scene, Settings};

    fn discrete(tau550: f64) -> DiscreteResults {
        let grid = AngularGrid::standard(30f64.to_radians().cos(), 1.0).unwrap();
        let ag = AerosolGrid::standard().unwrap();
        let profile = AtmosphericProfile::standard(StandardAtmosphere::Us62);
        let model = if tau550 > 0.0 {
            AerosolModel::Continental
        } else {
            AerosolModel::None
        };
        let optics = model.build(&BuildOptions { grid: &ag, cache: None }).unwrap();
        sos::compute(&Scene {
            grid: &grid,
            aerosol_grid: &ag,
            phi: 0.0,
            profile: &profile,
            optics: &optics,
            tau550,
            aerosol_profile: None,
            plane: None,
            settings: Settings {
                polarized: true,
                ..Settings::default()
            },
        })
        .unwrap()
    }

    fn inputs<'a>(d: &'a DiscreteResults, gas: &'a GasAbsorption, ground: Ground<'a>) -> BandInputs<'a> {
        BandInputs {
            discrete: d,
            gas,
            earth_sun: 1.0,
            ground,
            ground_polarization: None,
            plane_altitude: None,
            polarized: true,
            details: true,
        }
    }

    fn uniform(rho: f64) -> Ground<'static> {
        Ground::Lambertian {
            target: rho,
            environment: rho,
            radius: None,
        }
    }

    #[test]
    fn test_samples_halve_the_band_edges() {
        let band = Spectrum::Band {
            start: 0.5,
            end: 0.51,
            response: vec![1.0, 0.8, 0.6, 0.4, 0.2],
        };
        band.validate().unwrap();
        let samples = band.samples();
        assert_eq!(samples.len(), 5);
        assert!((samples[0].wavelength - 0.5).abs() < 1e-12);
        assert!((samples[4].wavelength - 0.51).abs() < 1e-12);
        assert_eq!(samples[0].weight, 0.5);
        assert_eq!(samples[1].weight, 0.8);
        assert!((samples[4].weight - 0.1).abs() < 1e-12);

        let mono = Spectrum::Monochromatic { wavelength: 0.55 }.samples();
        assert_eq!(mono.len(), 1);
        assert!((mono[0].weight * STEP - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_spectrum_validation() {
        let short = Spectrum::Band {
            start: 0.5,
            end: 0.51,
            response: vec![1.0; 3],
        };
        assert!(matches!(short.validate(), Err(ConfigError::Spectrum(_))));
        let reversed = Spectrum::Band {
            start: 0.6,
            end: 0.5,
            response: Vec::new(),
        };
        assert!(reversed.validate().is_err());
        assert!(Spectrum::Monochromatic { wavelength: 5.0 }.validate().is_err());
    }

    #[test]
    fn test_uniform_lambertian_closed_form() {
        let d = discrete(0.0);
        let gas = GasAbsorption::none();
        let rho = 0.2;
        let r = integrate(
            &Spectrum::Monochromatic { wavelength: 0.55 },
            &inputs(&d, &gas, uniform(rho)),
        );
        let row = &r.details[0];
        let expected = row.path_reflectance + row.down * row.up * rho / (1.0 - rho * row.spherical_albedo);
        assert!(
            (r.apparent_reflectance - expected).abs() < 1e-12,
            "Expected {:.6}, got {:.6}",
            expected,
            r.apparent_reflectance
        );
        assert!((r.response - 1.0).abs() < 1e-12);
        assert!((r.ground_reflectance - rho).abs() < 1e-12);
        let sum = r.irradiance_fractions.direct + r.irradiance_fractions.diffuse + r.irradiance_fractions.environment;
        assert!((sum - 1.0).abs() < 1e-9, "got {:.6}", sum);
    }

    #[test]
    fn test_black_ground_gives_path_reflectance() {
        let d = discrete(0.2);
        let gas = GasAbsorption::none();
        let r = integrate(
            &Spectrum::Band {
                start: 0.5,
                end: 0.6,
                response: Vec::new(),
            },
            &inputs(&d, &gas, uniform(0.0)),
        );
        assert!((r.apparent_reflectance - r.intrinsic.mixed.i).abs() < 1e-12);
        assert!((r.reflectance_parts.diffuse - r.apparent_reflectance).abs() < 1e-12);
        assert_eq!(r.details.len(), 41);
        let pol = r.polarization.unwrap();
        assert!(pol.degree() > 0.0 && pol.degree() < 1.0);
        assert!(r.single_scattering_albedo.aerosol > 0.8 && r.single_scattering_albedo.aerosol < 1.0);
    }

    #[test]
    fn test_patchy_ground_with_equal_reflectances_is_uniform() {
        let d = discrete(0.2);
        let gas = GasAbsorption::none();
        let spectrum = Spectrum::Monochromatic { wavelength: 0.65 };
        let a = integrate(&spectrum, &inputs(&d, &gas, uniform(0.3)));
        let b = integrate(
            &spectrum,
            &inputs(
                &d,
                &gas,
                Ground::Lambertian {
                    target: 0.3,
                    environment: 0.3,
                    radius: Some(0.5),
                },
            ),
        );
        assert!((a.apparent_reflectance - b.apparent_reflectance).abs() < 1e-12);
        // a dark surround lowers the signal of a bright target
        let c = integrate(
            &spectrum,
            &inputs(
                &d,
                &gas,
                Ground::Lambertian {
                    target: 0.3,
                    environment: 0.05,
                    radius: Some(0.5),
                },
            ),
        );
        assert!(c.apparent_reflectance < a.apparent_reflectance);
    }

    #[test]
    fn test_path_signal_crosses_the_whole_ozone_column() {
        let d = discrete(0.2);
        let gas = GasAbsorption {
            ozone: 0.35,
            ozone_up: 0.35,
        };
        let r = integrate(
            &Spectrum::Monochromatic { wavelength: 0.6 },
            &inputs(&d, &gas, uniform(0.0)),
        );
        let tg = r.gas.total;
        assert!(tg < 0.95, "Expected ozone absorption, got {:.4}", tg);
        let expected = r.intrinsic.mixed.i * tg;
        assert!(
            (r.apparent_reflectance - expected).abs() < 1e-12,
            "Expected {:.6}, got {:.6}",
            expected,
            r.apparent_reflectance
        );
        let pol = r.polarization.unwrap();
        assert!((pol.reflectance.q - r.intrinsic.mixed.q * tg).abs() < 1e-12);
        assert!((pol.reflectance.u - r.intrinsic.mixed.u * tg).abs() < 1e-12);
    }
}
