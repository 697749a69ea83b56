use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::aerosol::{AerosolModel, visibility_to_tau550};
use crate::atmosphere::{AtmosphericProfile, Level, StandardAtmosphere};
use crate::band::Spectrum;
use crate::brdf::SurfaceModel;
use crate::sos::layers::AerosolLayer;

pub mod error;
pub use error::ConfigError;

pub mod geometry;
pub use geometry::Geometry;

/// Sensor altitudes (km above the target) at or beyond which the sensor
/// sits above the atmosphere.
pub const SATELLITE_LEVEL: f64 = 100.0;

/// Aerosol content of the column.
#[derive(Debug, Clone, PartialEq)]
pub struct AerosolConfig {
    pub model: AerosolModel,
    /// Optical depth at 550 nm
    pub tau550: f64,
    /// Vertical profile, listed from the ground up
    pub profile: Option<Vec<AerosolLayer>>,
    /// Where to store a computed size-distribution model
    pub cache: Option<PathBuf>,
}

/// Target and sensor altitudes (km).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Altitudes {
    /// Target altitude above sea level
    #[serde(default)]
    pub target: f64,
    /// Sensor altitude above the target, `None` for a satellite
    #[serde(default)]
    pub sensor: Option<f64>,
}

impl Default for Altitudes {
    fn default() -> Self {
        Self {
            target: 0.0,
            sensor: None,
        }
    }
}

impl Altitudes {
    /// Altitude of an airborne sensor above the target.
    pub fn plane(&self) -> Option<f64> {
        self.sensor.filter(|z| *z < SATELLITE_LEVEL)
    }
}

/// Ground boundary of the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Surface {
    /// Uniform Lambertian ground
    Homogeneous { reflectance: f64 },
    /// Lambertian disc of `radius` km inside a Lambertian surround
    Patchy {
        target: f64,
        environment: f64,
        radius: f64,
    },
    Brdf { model: SurfaceModel },
}

impl Surface {
    fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &str, v: f64| {
            if (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(ConfigError::Surface(format!(
                    "{} reflectance must lie in [0, 1], got {}",
                    name, v
                )))
            }
        };
        match self {
            Surface::Homogeneous { reflectance } => unit("ground", *reflectance),
            Surface::Patchy {
                target,
                environment,
                radius,
            } => {
                unit("target", *target)?;
                unit("environment", *environment)?;
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(ConfigError::Surface(format!(
                        "target radius must be positive, got {}",
                        radius
                    )));
                }
                Ok(())
            }
            Surface::Brdf { model } => model.validate(),
        }
    }

    /// True when the ground reflects as a non-Lambertian surface.
    pub fn is_brdf(&self) -> bool {
        matches!(self, Surface::Brdf { model } if !model.is_lambertian())
    }
}

/// Polarized reflectance of the ground, held constant over the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPolarization {
    pub q: f64,
    pub u: f64,
}

/// Signal recorded by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measurement {
    /// Apparent reflectance at the sensor
    Reflectance { value: f64 },
    /// Digital count or radiance, calibrated as `gain * value + bias`
    /// (W m⁻² sr⁻¹ µm⁻¹)
    Radiance {
        value: f64,
        #[serde(default = "unit_gain")]
        gain: f64,
        #[serde(default)]
        bias: f64,
    },
}

fn unit_gain() -> f64 {
    1.0
}

/// Atmospheric correction request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub measurement: Measurement,
    /// Account for the directional reflectance of the ground
    #[serde(default)]
    pub coupled: bool,
}

impl Correction {
    fn validate(&self, surface: &Surface) -> Result<(), ConfigError> {
        match self.measurement {
            Measurement::Reflectance { value } if !value.is_finite() => {
                return Err(ConfigError::Correction(format!(
                    "reflectance must be finite, got {}",
                    value
                )));
            }
            Measurement::Radiance { value, gain, bias } => {
                if !value.is_finite() || !bias.is_finite() || !gain.is_finite() || gain <= 0.0 {
                    return Err(ConfigError::Correction(format!(
                        "invalid calibration: value {}, gain {}, bias {}",
                        value, gain, bias
                    )));
                }
            }
            _ => {}
        }
        if self.coupled && !surface.is_brdf() {
            return Err(ConfigError::Correction(
                "a coupled correction needs a non-Lambertian surface model".into(),
            ));
        }
        Ok(())
    }
}

/// A validated simulation request.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub geometry: Geometry,
    /// Name of the atmospheric profile
    pub atmosphere: String,
    /// Molecular profile above the target
    pub profile: AtmosphericProfile,
    pub aerosol: AerosolConfig,
    pub altitudes: Altitudes,
    pub spectrum: Spectrum,
    pub surface: Surface,
    pub ground_polarization: Option<GroundPolarization>,
    pub polarized: bool,
    pub correction: Option<Correction>,
    /// Where to write the angular look-up table
    pub lut: Option<PathBuf>,
    /// Report the signal at every integration node
    pub details: bool,
}

// Deserializes a RunConfig through helper structs, building the
// atmospheric profile and the aerosol loading and checking every value.
impl<'de> Deserialize<'de> for RunConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            geometry: Geometry,
            atmosphere: AtmosphereHelper,
            aerosol: AerosolHelper,
            #[serde(default)]
            altitudes: Altitudes,
            spectrum: Spectrum,
            surface: Surface,
            ground_polarization: Option<GroundPolarization>,
            #[serde(default)]
            polarized: bool,
            correction: Option<Correction>,
            lut: Option<PathBuf>,
            #[serde(default)]
            details: bool,
        }

        #[derive(Deserialize)]
        struct AtmosphereHelper {
            standard: Option<StandardAtmosphere>,
            levels: Option<Vec<Level>>,
            /// Water vapour column (g/cm²)
            water_vapour: Option<f64>,
            /// Ozone column (atm-cm)
            ozone: Option<f64>,
        }

        #[derive(Deserialize)]
        struct AerosolHelper {
            model: AerosolModel,
            /// Horizontal visibility (km)
            visibility: Option<f64>,
            tau550: Option<f64>,
            profile: Option<Vec<AerosolLayer>>,
            cache: Option<PathBuf>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        // Atmosphere
        let atm = helper.atmosphere;
        let (name, profile) = match (atm.standard, atm.levels) {
            (Some(kind), None) => {
                let name = serde_json::to_value(kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                (name, AtmosphericProfile::standard(kind))
            }
            (None, Some(levels)) => (
                "user".to_string(),
                AtmosphericProfile::from_levels(levels).map_err(D::Error::custom)?,
            ),
            _ => {
                return Err(D::Error::custom(ConfigError::Atmosphere(
                    "give either a standard profile or a list of levels".into(),
                )));
            }
        };
        for (what, column) in [("water vapour", atm.water_vapour), ("ozone", atm.ozone)] {
            if column.is_some_and(|c| !c.is_finite() || c < 0.0) {
                return Err(D::Error::custom(ConfigError::Atmosphere(format!(
                    "{} column must be non-negative",
                    what
                ))));
            }
        }
        let profile = profile.with_columns(atm.water_vapour, atm.ozone);

        // Altitudes
        let altitudes = helper.altitudes;
        let top = profile
            .levels()
            .last()
            .map(|l| l.z)
            .unwrap_or(SATELLITE_LEVEL);
        if !altitudes.target.is_finite()
            || altitudes.target < profile.ground_altitude()
            || altitudes.target >= top
        {
            return Err(D::Error::custom(ConfigError::Atmosphere(format!(
                "target altitude must lie between the ground and the top of the profile, got {} km",
                altitudes.target
            ))));
        }
        if altitudes.sensor.is_some_and(|z| !z.is_finite() || z <= 0.0) {
            return Err(D::Error::custom(ConfigError::Atmosphere(
                "sensor altitude must be positive".into(),
            )));
        }
        let profile = profile.truncated_at(altitudes.target);

        // Aerosol
        let aer = helper.aerosol;
        aer.model.validate().map_err(D::Error::custom)?;
        let tau550 = match (&aer.profile, aer.visibility, aer.tau550) {
            _ if aer.model == AerosolModel::None => 0.0,
            (Some(layers), None, None) => {
                if layers
                    .iter()
                    .any(|l| !(l.thickness > 0.0) || !(l.tau550 >= 0.0))
                {
                    return Err(D::Error::custom(ConfigError::Aerosol(
                        "profile layers need a positive thickness and a non-negative depth".into(),
                    )));
                }
                layers.iter().map(|l| l.tau550).sum()
            }
            (None, Some(v), None) => {
                if !(v > 0.0) {
                    return Err(D::Error::custom(ConfigError::Aerosol(format!(
                        "visibility must be positive, got {}",
                        v
                    ))));
                }
                visibility_to_tau550(v)
            }
            (None, None, Some(t)) => {
                if !(t >= 0.0) || !t.is_finite() {
                    return Err(D::Error::custom(ConfigError::Aerosol(format!(
                        "optical depth must be non-negative, got {}",
                        t
                    ))));
                }
                t
            }
            _ => {
                return Err(D::Error::custom(ConfigError::Aerosol(
                    "give exactly one of visibility, tau550 or a vertical profile".into(),
                )));
            }
        };

        helper.spectrum.validate().map_err(D::Error::custom)?;
        helper.surface.validate().map_err(D::Error::custom)?;
        if let Some(correction) = &helper.correction {
            correction
                .validate(&helper.surface)
                .map_err(D::Error::custom)?;
        }

        Ok(RunConfig {
            geometry: helper.geometry,
            atmosphere: name,
            profile,
            aerosol: AerosolConfig {
                model: aer.model,
                tau550,
                profile: aer.profile,
                cache: aer.cache,
            },
            altitudes,
            spectrum: helper.spectrum,
            surface: helper.surface,
            ground_polarization: helper.ground_polarization,
            polarized: helper.polarized,
            correction: helper.correction,
            lut: helper.lut,
            details: helper.details,
        })
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RunConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: RunConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Earth-Sun distance factor of the acquisition date.
    pub fn earth_sun_factor(&self) -> f64 {
        crate::solar::earth_sun_factor(self.geometry.day_of_year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    const BASE: &str = r#"
    {
        "geometry": {"solar_zenith": 30.0, "solar_azimuth": 0.0,
                     "view_zenith": 0.0, "view_azimuth": 0.0, "month": 7, "day": 23},
        "atmosphere": {"standard": "midlatitude_summer"},
        "aerosol": {"model": {"type": "continental"}, "visibility": 23.0},
        "spectrum": {"type": "band", "start": 0.5, "end": 0.6},
        "surface": {"type": "homogeneous", "reflectance": 0.2}
    }
    "#;

    fn with(key: &str, value: &str) -> String {
        let mut v: serde_json::Value = serde_json::from_str(BASE).unwrap();
        v[key] = serde_json::from_str(value).unwrap();
        v.to_string()
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.json");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(BASE.as_bytes()).unwrap();

        let config = RunConfig::from_file(file_path).unwrap();

        assert_eq!(config.atmosphere, "midlatitude_summer");
        assert!(
            (config.aerosol.tau550 - 0.235).abs() < 0.01,
            "Expected ~0.235, got {:.3}",
            config.aerosol.tau550
        );
        assert_eq!(config.altitudes.plane(), None);
        assert!(!config.polarized);
        assert!(config.correction.is_none());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = RunConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_aerosol_profile_sets_the_depth() {
        let json = with(
            "aerosol",
            r#"{"model": {"type": "maritime"},
                "profile": [{"thickness": 1.0, "tau550": 0.1}, {"thickness": 2.0, "tau550": 0.05}]}"#,
        );
        let config: RunConfig = serde_json::from_str(&json).unwrap();
        assert!((config.aerosol.tau550 - 0.15).abs() < 1e-12);

        let both = with(
            "aerosol",
            r#"{"model": {"type": "maritime"}, "visibility": 10.0, "tau550": 0.3}"#,
        );
        assert!(serde_json::from_str::<RunConfig>(&both).is_err());
    }

    #[test]
    fn test_elevated_target_truncates_the_profile() {
        let json = with("altitudes", r#"{"target": 1.5, "sensor": 3.0}"#);
        let config: RunConfig = serde_json::from_str(&json).unwrap();
        assert!((config.profile.ground_altitude() - 1.5).abs() < 1e-9);
        assert_eq!(config.altitudes.plane(), Some(3.0));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            with("surface", r#"{"type": "homogeneous", "reflectance": 1.5}"#),
            with(
                "surface",
                r#"{"type": "patchy", "target": 0.1, "environment": 0.3, "radius": 0.0}"#,
            ),
            with("aerosol", r#"{"model": {"type": "urban"}, "visibility": -5.0}"#),
            with("spectrum", r#"{"type": "monochromatic", "wavelength": 5.0}"#),
            with("atmosphere", r#"{"standard": "tropical", "ozone": -0.3}"#),
            with("altitudes", r#"{"target": 0.0, "sensor": -1.0}"#),
            with(
                "correction",
                r#"{"measurement": {"type": "reflectance", "value": 0.1}, "coupled": true}"#,
            ),
            with(
                "correction",
                r#"{"measurement": {"type": "radiance", "value": 80.0, "gain": 0.0}}"#,
            ),
        ];
        for json in &cases {
            assert!(
                serde_json::from_str::<RunConfig>(json).is_err(),
                "accepted {}",
                json
            );
        }
    }

    #[test]
    fn test_correction_and_brdf_surface() {
        let json = with(
            "surface",
            r#"{"type": "brdf", "model": {"kind": "ross_li", "p1": 0.1, "p2": 0.05, "p3": 0.02}}"#,
        );
        let mut v: serde_json::Value = serde_json::from_str(&json).unwrap();
        v["correction"] = serde_json::json!({
            "measurement": {"type": "radiance", "value": 120.0, "gain": 0.5},
            "coupled": true
        });
        let config: RunConfig = serde_json::from_str(&v.to_string()).unwrap();
        assert!(config.surface.is_brdf());
        let correction = config.correction.unwrap();
        assert!(correction.coupled);
        assert_eq!(
            correction.measurement,
            Measurement::Radiance {
                value: 120.0,
                gain: 0.5,
                bias: 0.0
            }
        );
    }
}
