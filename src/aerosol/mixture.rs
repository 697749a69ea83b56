//! External mixing of aerosol constituents.

use super::{NB_WAVELENGTHS, OpticalTable, REFERENCE_INDEX, RawOptics};
use crate::config::ConfigError;
use crate::error::Result;

/// One member of a mixture.
#[derive(Debug, Clone, Copy)]
pub struct Constituent<'a> {
    pub optics: &'a RawOptics,
    /// Particle volume per unit of the constituent's coefficients
    pub volume: f64,
    /// Volume fraction
    pub fraction: f64,
}

/// Number weights `c_i = (f_i/V_i) / Σ_j (f_j/V_j)`. A lone constituent
/// has weight 1.
fn number_weights(parts: &[Constituent]) -> std::result::Result<Vec<f64>, ConfigError> {
    if parts.len() == 1 {
        return Ok(vec![1.0]);
    }
    let raw: Vec<f64> = parts
        .iter()
        .map(|p| if p.volume > 0.0 { p.fraction / p.volume } else { 0.0 })
        .collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(ConfigError::Aerosol(
            "mixture has no constituent with a positive fraction".to_string(),
        ));
    }
    Ok(raw.iter().map(|c| c / total).collect())
}

fn weighted_phase(
    parts: &[Constituent],
    weights: &[f64],
    scattering: f64,
    l: usize,
    element: impl Fn(&RawOptics) -> &Vec<Vec<f64>>,
) -> Vec<f64> {
    let nodes = element(parts[0].optics)
        .get(l)
        .map_or(0, Vec::len);
    let mut out = vec![0.0; nodes];
    if scattering <= 0.0 {
        return out;
    }
    for (part, c) in parts.iter().zip(weights) {
        let w = c * part.optics.scattering[l] / scattering;
        if w == 0.0 {
            continue;
        }
        if let Some(row) = element(part.optics).get(l) {
            out.iter_mut().zip(row).for_each(|(o, v)| *o += w * v);
        }
    }
    out
}

/// Mixes constituents and normalizes extinction to 1 at 550 nm.
///
/// Extinction and scattering are number-weighted sums. The phase
/// elements and the asymmetry factor are weighted by each constituent's
/// scattering and divided by the mixed scattering.
pub fn mix(name: &str, parts: &[Constituent]) -> Result<OpticalTable> {
    if parts.is_empty() {
        return Err(ConfigError::Aerosol("empty mixture".to_string()).into());
    }
    let weights = number_weights(parts)?;

    let mut raw_extinction = vec![0.0; NB_WAVELENGTHS];
    let mut raw_scattering = vec![0.0; NB_WAVELENGTHS];
    for (part, c) in parts.iter().zip(&weights) {
        for l in 0..NB_WAVELENGTHS {
            raw_extinction[l] += c * part.optics.extinction[l];
            raw_scattering[l] += c * part.optics.scattering[l];
        }
    }

    let reference = raw_extinction[REFERENCE_INDEX];
    if reference <= 0.0 {
        return Err(ConfigError::Aerosol(format!(
            "{} has no extinction at 550 nm",
            name
        ))
        .into());
    }
    let nis = 1.0 / reference;

    let mut asymmetry = vec![0.0; NB_WAVELENGTHS];
    let mut p11 = Vec::with_capacity(NB_WAVELENGTHS);
    let mut q = Vec::with_capacity(NB_WAVELENGTHS);
    let mut u = Vec::with_capacity(NB_WAVELENGTHS);
    for l in 0..NB_WAVELENGTHS {
        let sca = raw_scattering[l];
        if sca > 0.0 {
            asymmetry[l] = parts
                .iter()
                .zip(&weights)
                .map(|(p, c)| c * p.optics.scattering[l] * p.optics.asymmetry[l])
                .sum::<f64>()
                / sca;
        }
        p11.push(weighted_phase(parts, &weights, sca, l, |o| &o.p11));
        q.push(weighted_phase(parts, &weights, sca, l, |o| &o.q));
        u.push(weighted_phase(parts, &weights, sca, l, |o| &o.u));
    }

    Ok(OpticalTable {
        name: name.to_string(),
        extinction: raw_extinction.iter().map(|e| e * nis).collect(),
        scattering: raw_scattering.iter().map(|s| s * nis).collect(),
        asymmetry,
        raw_extinction,
        raw_scattering,
        p11,
        q,
        u,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(ext: f64, sca: f64, g: f64, phase: f64) -> RawOptics {
        RawOptics {
            extinction: vec![ext; NB_WAVELENGTHS],
            scattering: vec![sca; NB_WAVELENGTHS],
            asymmetry: vec![g; NB_WAVELENGTHS],
            p11: vec![vec![phase; 3]; NB_WAVELENGTHS],
            q: vec![vec![0.0; 3]; NB_WAVELENGTHS],
            u: vec![vec![0.0; 3]; NB_WAVELENGTHS],
        }
    }

    #[test]
    fn test_number_weights_use_volume() {
        let a = flat(2.0, 1.0, 0.5, 1.0);
        let b = flat(4.0, 4.0, 0.8, 3.0);
        let parts = [
            Constituent { optics: &a, volume: 1.0, fraction: 0.5 },
            Constituent { optics: &b, volume: 2.0, fraction: 0.5 },
        ];
        // c = (0.5, 0.25) / 0.75
        let table = mix("pair", &parts).unwrap();
        let ext = (2.0 * 2.0 + 4.0) / 3.0;
        let sca = (2.0 * 1.0 + 4.0) / 3.0;
        assert!((table.raw_extinction[0] - ext).abs() < 1e-12);
        assert!((table.extinction[REFERENCE_INDEX] - 1.0).abs() < 1e-12);
        assert!((table.scattering[0] - sca / ext).abs() < 1e-12);

        // scattering-weighted phase and asymmetry
        let wa = (2.0 / 3.0) * 1.0 / sca;
        let wb = (1.0 / 3.0) * 4.0 / sca;
        assert!((table.p11[3][1] - (wa * 1.0 + wb * 3.0)).abs() < 1e-12);
        assert!((table.asymmetry[3] - (wa * 0.5 + wb * 0.8)).abs() < 1e-12);
    }

    #[test]
    fn test_non_scattering_mixture_has_zero_phase() {
        let dark = flat(1.0, 0.0, 0.0, 1.0);
        let table = mix(
            "dark",
            &[Constituent { optics: &dark, volume: 1.0, fraction: 1.0 }],
        )
        .unwrap();
        assert!(table.p11[0].iter().all(|p| *p == 0.0));
        assert_eq!(table.single_scattering_albedo(0), 0.0);
    }

    #[test]
    fn test_zero_fractions_rejected() {
        let a = flat(1.0, 1.0, 0.5, 1.0);
        let parts = [
            Constituent { optics: &a, volume: 1.0, fraction: 0.0 },
            Constituent { optics: &a, volume: 1.0, fraction: 0.0 },
        ];
        assert!(mix("zero", &parts).is_err());
    }
}
