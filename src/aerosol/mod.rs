//! Aerosol optical properties at the reference wavelengths.
//!
//! An [`AerosolModel`] describes what the aerosol is made of. Building it
//! produces an [`OpticalTable`]: extinction and scattering normalized to 1
//! at 550 nm, asymmetry, and the P11, Q and U phase elements tabulated on
//! the aerosol scattering-angle grid for each of the 20 wavelengths.

pub mod cache;
pub mod components;
pub mod mie;
pub mod mixture;

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::error::Result;
use crate::quadrature::AerosolGrid;
pub use components::Component;
pub use mie::SizeDistribution;
use mixture::Constituent;

pub const NB_WAVELENGTHS: usize = 20;

/// Reference wavelengths (µm) at which optical properties are tabulated
/// and the scattering problem is solved.
pub const WAVELENGTHS: [f64; NB_WAVELENGTHS] = [
    0.350, 0.400, 0.412, 0.443, 0.470, 0.488, 0.515, 0.550, 0.590, 0.633, 0.670, 0.694, 0.760,
    0.860, 1.240, 1.536, 1.650, 1.950, 2.250, 3.750,
];

/// Index of 550 nm in [`WAVELENGTHS`].
pub const REFERENCE_INDEX: usize = 7;

/// Unnormalized optics: coefficients in arbitrary units, phase elements
/// normalized so that ½∫P11 = 1. Phase rows are `[wavelength][node]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOptics {
    pub extinction: Vec<f64>,
    pub scattering: Vec<f64>,
    pub asymmetry: Vec<f64>,
    pub p11: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
    pub u: Vec<Vec<f64>>,
}

/// Optical properties of an aerosol model.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalTable {
    pub name: String,
    /// Extinction normalized to 1 at 550 nm
    pub extinction: Vec<f64>,
    /// Scattering on the same scale as `extinction`
    pub scattering: Vec<f64>,
    pub asymmetry: Vec<f64>,
    pub raw_extinction: Vec<f64>,
    pub raw_scattering: Vec<f64>,
    pub p11: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
    pub u: Vec<Vec<f64>>,
}

impl OpticalTable {
    /// The no-aerosol table: zero extinction and scattering, no phase.
    pub fn empty() -> Self {
        Self {
            name: "none".to_string(),
            extinction: vec![0.0; NB_WAVELENGTHS],
            scattering: vec![0.0; NB_WAVELENGTHS],
            asymmetry: vec![0.0; NB_WAVELENGTHS],
            raw_extinction: vec![0.0; NB_WAVELENGTHS],
            raw_scattering: vec![0.0; NB_WAVELENGTHS],
            p11: Vec::new(),
            q: Vec::new(),
            u: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p11.is_empty()
    }

    pub fn nodes(&self) -> usize {
        self.p11.first().map_or(0, Vec::len)
    }

    pub fn single_scattering_albedo(&self, l: usize) -> f64 {
        if self.extinction[l] > 0.0 {
            self.scattering[l] / self.extinction[l]
        } else {
            0.0
        }
    }
}

/// Aerosol model choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AerosolModel {
    None,
    Continental,
    Maritime,
    Urban,
    Desert,
    BiomassBurning,
    Stratospheric,
    /// Volume fractions of the four basic components
    Mixture {
        dust: f64,
        water_soluble: f64,
        oceanic: f64,
        soot: f64,
    },
    SizeDistribution(SizeDistribution),
    FromCache {
        path: PathBuf,
    },
}

/// Inputs shared by every model build.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions<'a> {
    pub grid: &'a AerosolGrid,
    /// Where to save a computed size-distribution model
    pub cache: Option<&'a Path>,
}

impl AerosolModel {
    pub fn name(&self) -> String {
        match self {
            AerosolModel::None => "none".to_string(),
            AerosolModel::Continental => "continental".to_string(),
            AerosolModel::Maritime => "maritime".to_string(),
            AerosolModel::Urban => "urban".to_string(),
            AerosolModel::Desert => "desert".to_string(),
            AerosolModel::BiomassBurning => "biomass_burning".to_string(),
            AerosolModel::Stratospheric => "stratospheric".to_string(),
            AerosolModel::Mixture {
                dust,
                water_soluble,
                oceanic,
                soot,
            } => format!(
                "mixture(dust={}, water_soluble={}, oceanic={}, soot={})",
                dust, water_soluble, oceanic, soot
            ),
            AerosolModel::SizeDistribution(sd) => format!("size_distribution({} modes)", sd.modes.len()),
            AerosolModel::FromCache { path } => format!("cache({})", path.display()),
        }
    }

    fn fractions(&self) -> Option<[f64; 4]> {
        match self {
            AerosolModel::Continental => Some([0.70, 0.29, 0.0, 0.01]),
            AerosolModel::Maritime => Some([0.0, 0.05, 0.95, 0.0]),
            AerosolModel::Urban => Some([0.17, 0.61, 0.0, 0.22]),
            AerosolModel::Mixture {
                dust,
                water_soluble,
                oceanic,
                soot,
            } => Some([*dust, *water_soluble, *oceanic, *soot]),
            _ => None,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match self {
            AerosolModel::Mixture { .. } => {
                let f = self.fractions().unwrap_or_default();
                if f.iter().any(|v| *v < 0.0 || !v.is_finite()) {
                    return Err(ConfigError::Aerosol(format!(
                        "volume fractions must be non-negative, got {:?}",
                        f
                    )));
                }
                if f.iter().sum::<f64>() <= 0.0 {
                    return Err(ConfigError::Aerosol(
                        "volume fractions sum to zero".to_string(),
                    ));
                }
                Ok(())
            }
            AerosolModel::SizeDistribution(sd) => sd.validate(),
            _ => Ok(()),
        }
    }

    /// Builds the optical table of the model.
    pub fn build(&self, opts: &BuildOptions) -> Result<OpticalTable> {
        self.validate()?;
        let table = match self {
            AerosolModel::None => OpticalTable::empty(),
            AerosolModel::Desert => single(Component::Desert, opts, &self.name())?,
            AerosolModel::BiomassBurning => single(Component::BiomassBurning, opts, &self.name())?,
            AerosolModel::Stratospheric => single(Component::Stratospheric, opts, &self.name())?,
            AerosolModel::SizeDistribution(sd) => {
                let table = mie::build(sd, opts.grid, &self.name())?;
                if let Some(path) = opts.cache {
                    cache::write(path, &table, opts.grid)?;
                    info!("Saved aerosol model to {}", path.display());
                }
                table
            }
            AerosolModel::FromCache { path } => cache::read(path)?,
            _ => {
                let fractions = self.fractions().unwrap_or_default();
                let basics = [
                    Component::Dust,
                    Component::WaterSoluble,
                    Component::Oceanic,
                    Component::Soot,
                ];
                let tables = basics
                    .iter()
                    .map(|c| c.load())
                    .collect::<Result<Vec<_>>>()?;
                check_nodes(&tables[0].optics, opts)?;
                let parts: Vec<Constituent> = tables
                    .iter()
                    .zip(fractions)
                    .map(|(t, fraction)| Constituent {
                        optics: &t.optics,
                        volume: t.volume.unwrap_or(1.0),
                        fraction,
                    })
                    .collect();
                mixture::mix(&self.name(), &parts)?
            }
        };
        info!(
            "Aerosol model {}: ω(550) = {:.4}, g(550) = {:.4}",
            table.name,
            table.single_scattering_albedo(REFERENCE_INDEX),
            table.asymmetry[REFERENCE_INDEX]
        );
        Ok(table)
    }
}

fn check_nodes(optics: &RawOptics, opts: &BuildOptions) -> Result<()> {
    let nodes = optics.p11.first().map_or(0, Vec::len);
    if nodes != opts.grid.len() {
        return Err(crate::error::EngineError::Numerical {
            stage: "aerosol build",
            reason: format!(
                "tabulated components use {} angles, the grid has {}",
                nodes,
                opts.grid.len()
            ),
        });
    }
    Ok(())
}

fn single(component: Component, opts: &BuildOptions, name: &str) -> Result<OpticalTable> {
    let table = component.load()?;
    check_nodes(&table.optics, opts)?;
    mixture::mix(
        name,
        &[Constituent {
            optics: &table.optics,
            volume: 1.0,
            fraction: 1.0,
        }],
    )
}

/// Aerosol optical depth at 550 nm for a horizontal visibility (km).
pub fn visibility_to_tau550(visibility: f64) -> f64 {
    ((3.912 / visibility - 0.01159) * 1.455).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(model: AerosolModel) -> OpticalTable {
        let grid = AerosolGrid::standard().unwrap();
        model.build(&BuildOptions { grid: &grid, cache: None }).unwrap()
    }

    #[test]
    fn test_presets_are_normalized_at_550() {
        for model in [
            AerosolModel::Continental,
            AerosolModel::Maritime,
            AerosolModel::Urban,
            AerosolModel::Desert,
            AerosolModel::BiomassBurning,
            AerosolModel::Stratospheric,
        ] {
            let table = build(model.clone());
            assert!(
                (table.extinction[REFERENCE_INDEX] - 1.0).abs() < 1e-12,
                "{}: ext(550) = {}",
                model.name(),
                table.extinction[REFERENCE_INDEX]
            );
            for l in 0..NB_WAVELENGTHS {
                let omega = table.single_scattering_albedo(l);
                assert!(omega > 0.0 && omega <= 1.0 + 1e-9, "{}: ω = {}", model.name(), omega);
            }
        }
    }

    #[test]
    fn test_continental_properties() {
        let table = build(AerosolModel::Continental);
        let omega = table.single_scattering_albedo(REFERENCE_INDEX);
        assert!((omega - 0.89).abs() < 0.03, "Expected ω ~0.89, got {:.3}", omega);
        // extinction decreases with wavelength
        assert!(table.extinction[0] > table.extinction[13]);
    }

    #[test]
    fn test_none_is_explicit_zero() {
        let table = build(AerosolModel::None);
        assert!(table.is_empty());
        assert!(table.extinction.iter().all(|e| *e == 0.0));
        assert_eq!(table.single_scattering_albedo(REFERENCE_INDEX), 0.0);
    }

    #[test]
    fn test_invalid_mixture() {
        let grid = AerosolGrid::standard().unwrap();
        let model = AerosolModel::Mixture {
            dust: 0.0,
            water_soluble: 0.0,
            oceanic: 0.0,
            soot: 0.0,
        };
        assert!(model.build(&BuildOptions { grid: &grid, cache: None }).is_err());

        let negative = AerosolModel::Mixture {
            dust: -0.1,
            water_soluble: 1.0,
            oceanic: 0.0,
            soot: 0.0,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_visibility_conversion() {
        let tau = visibility_to_tau550(23.0);
        assert!((tau - 0.23).abs() < 0.005, "Expected ~0.23, got {:.3}", tau);
        assert!(visibility_to_tau550(5.0) > visibility_to_tau550(10.0));
        assert_eq!(visibility_to_tau550(1000.0), 0.0);
    }

    #[test]
    fn test_model_deserialize() {
        let model: AerosolModel = serde_json::from_str(r#"{"type": "maritime"}"#).unwrap();
        assert_eq!(model, AerosolModel::Maritime);
        let mix: AerosolModel = serde_json::from_str(
            r#"{"type": "mixture", "dust": 0.5, "water_soluble": 0.5, "oceanic": 0.0, "soot": 0.0}"#,
        )
        .unwrap();
        assert!(matches!(mix, AerosolModel::Mixture { .. }));
    }
}
