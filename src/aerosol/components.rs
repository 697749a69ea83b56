//! Tabulated aerosol components.
//!
//! Every component file holds, for the 20 reference wavelengths, the
//! extinction and scattering coefficients and the asymmetry factor, then
//! the P11, Q and U elements at the 83 nodes of the standard aerosol grid
//! (one row per node, one column per wavelength). The four basic
//! components also carry the reference particle volume used for mixing.

use serde::{Deserialize, Serialize};

use super::{NB_WAVELENGTHS, RawOptics};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Dust,
    WaterSoluble,
    Oceanic,
    Soot,
    Desert,
    BiomassBurning,
    Stratospheric,
}

impl Component {
    pub fn name(&self) -> &'static str {
        match self {
            Component::Dust => "dust",
            Component::WaterSoluble => "water_soluble",
            Component::Oceanic => "oceanic",
            Component::Soot => "soot",
            Component::Desert => "desert",
            Component::BiomassBurning => "biomass_burning",
            Component::Stratospheric => "stratospheric",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            Component::Dust => include_str!("../../data/aerosol/dust.txt"),
            Component::WaterSoluble => include_str!("../../data/aerosol/water_soluble.txt"),
            Component::Oceanic => include_str!("../../data/aerosol/oceanic.txt"),
            Component::Soot => include_str!("../../data/aerosol/soot.txt"),
            Component::Desert => include_str!("../../data/aerosol/desert.txt"),
            Component::BiomassBurning => include_str!("../../data/aerosol/biomass.txt"),
            Component::Stratospheric => include_str!("../../data/aerosol/stratospheric.txt"),
        }
    }

    /// Parses the embedded table of the component.
    pub fn load(&self) -> Result<ComponentTable> {
        parse_table(self.name(), self.source())
    }
}

/// Raw optics of one component with its reference volume.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTable {
    /// Reference volume, present for the basic mixing components
    pub volume: Option<f64>,
    pub optics: RawOptics,
}

fn data_error(name: &'static str, reason: impl Into<String>) -> EngineError {
    EngineError::Data {
        name,
        reason: reason.into(),
    }
}

fn parse_values(name: &'static str, tokens: &[&str]) -> Result<Vec<f64>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f64>()
                .map_err(|e| data_error(name, format!("bad number {:?}: {}", t, e)))
        })
        .collect()
}

fn parse_table(name: &'static str, text: &str) -> Result<ComponentTable> {
    let mut volume = None;
    let mut extinction = Vec::new();
    let mut scattering = Vec::new();
    let mut asymmetry = Vec::new();
    // rows[block][node][wavelength]
    let mut blocks: Vec<Vec<Vec<f64>>> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "volume" => {
                let v = parse_values(name, &tokens[1..])?;
                volume = v.first().copied();
            }
            "extinction" => extinction = parse_values(name, &tokens[1..])?,
            "scattering" => scattering = parse_values(name, &tokens[1..])?,
            "asymmetry" => asymmetry = parse_values(name, &tokens[1..])?,
            "phase" | "q" | "u" => blocks.push(Vec::new()),
            _ => {
                let row = parse_values(name, &tokens)?;
                match blocks.last_mut() {
                    Some(block) => block.push(row),
                    None => return Err(data_error(name, "angular rows before a block header")),
                }
            }
        }
    }

    for (label, values) in [
        ("extinction", &extinction),
        ("scattering", &scattering),
        ("asymmetry", &asymmetry),
    ] {
        if values.len() != NB_WAVELENGTHS {
            return Err(data_error(
                name,
                format!("{} has {} values, expected {}", label, values.len(), NB_WAVELENGTHS),
            ));
        }
    }
    if blocks.len() != 3 {
        return Err(data_error(
            name,
            format!("expected phase, q and u blocks, found {}", blocks.len()),
        ));
    }

    let nodes = blocks[0].len();
    let mut transposed = Vec::with_capacity(3);
    for block in &blocks {
        if block.len() != nodes || block.iter().any(|row| row.len() != NB_WAVELENGTHS) {
            return Err(data_error(name, "angular blocks have inconsistent shapes"));
        }
        let per_wavelength: Vec<Vec<f64>> = (0..NB_WAVELENGTHS)
            .map(|l| block.iter().map(|row| row[l]).collect())
            .collect();
        transposed.push(per_wavelength);
    }
    let u = transposed.pop().unwrap_or_default();
    let q = transposed.pop().unwrap_or_default();
    let p11 = transposed.pop().unwrap_or_default();

    Ok(ComponentTable {
        volume,
        optics: RawOptics {
            extinction,
            scattering,
            asymmetry,
            p11,
            q,
            u,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aerosol::REFERENCE_INDEX;
    use crate::quadrature::AerosolGrid;

    const ALL: [Component; 7] = [
        Component::Dust,
        Component::WaterSoluble,
        Component::Oceanic,
        Component::Soot,
        Component::Desert,
        Component::BiomassBurning,
        Component::Stratospheric,
    ];

    #[test]
    fn test_embedded_tables_parse() {
        for component in ALL {
            let table = component.load().unwrap();
            assert_eq!(table.optics.p11.len(), NB_WAVELENGTHS, "{}", component.name());
            assert_eq!(table.optics.p11[0].len(), 83, "{}", component.name());
            assert_eq!(table.optics.q[5].len(), 83);
            let basic = matches!(
                component,
                Component::Dust | Component::WaterSoluble | Component::Oceanic | Component::Soot
            );
            assert_eq!(table.volume.is_some(), basic, "{}", component.name());
        }
    }

    #[test]
    fn test_phase_functions_are_normalized() {
        let grid = AerosolGrid::standard().unwrap();
        for component in [Component::WaterSoluble, Component::Oceanic] {
            let table = component.load().unwrap();
            let p = &table.optics.p11[REFERENCE_INDEX];
            let norm: f64 = p.iter().zip(&grid.weights).map(|(p, w)| p * w).sum::<f64>() / 2.0;
            assert!(
                (norm - 1.0).abs() < 0.05,
                "{}: expected ~1, got {:.3}",
                component.name(),
                norm
            );
        }
    }

    #[test]
    fn test_soot_absorbs() {
        let soot = Component::Soot.load().unwrap();
        let omega = soot.optics.scattering[REFERENCE_INDEX] / soot.optics.extinction[REFERENCE_INDEX];
        assert!(omega < 0.5, "Expected a dark component, got ω = {:.3}", omega);
    }

    #[test]
    fn test_malformed_table() {
        assert!(parse_table("bad", "extinction 1 2 3\n").is_err());
        assert!(parse_table("bad", "phase\nabc\n").is_err());
    }
}
