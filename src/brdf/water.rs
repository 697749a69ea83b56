//! Optical constants of sea water.
//!
//! The case-1 water coefficients are those of Morel (1988) on a 10 nm
//! grid. The refractive index of pure water follows Hale and Querry
//! (1973) and is corrected for salinity.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Salinity (ppt) of the reference sea water.
pub const REFERENCE_SALINITY: f64 = 34.3;
/// Increase of the real index for the reference salinity.
const SALINITY_INDEX_SHIFT: f64 = 0.006;

/// Morel case-1 coefficients at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorelCoefficients {
    /// Diffuse attenuation of pure water (m⁻¹)
    pub kw: f64,
    /// Pigment attenuation factor χ
    pub chi: f64,
    /// Pigment attenuation exponent e
    pub e: f64,
    /// Scattering of pure water (m⁻¹)
    pub bw: f64,
}

const fn morel(kw: f64, chi: f64, e: f64, bw: f64) -> MorelCoefficients {
    MorelCoefficients { kw, chi, e, bw }
}

/// Morel coefficients by wavelength (nm)
pub static MOREL: LazyLock<BTreeMap<u32, MorelCoefficients>> = LazyLock::new(|| {
    BTreeMap::from([
        (400, morel(0.0209, 0.1100, 0.668, 0.00760)),
        (410, morel(0.0196, 0.1125, 0.681, 0.00681)),
        (420, morel(0.0183, 0.1126, 0.685, 0.00612)),
        (430, morel(0.0171, 0.1078, 0.683, 0.00551)),
        (440, morel(0.0168, 0.1041, 0.673, 0.00498)),
        (450, morel(0.0168, 0.0962, 0.658, 0.00450)),
        (460, morel(0.0173, 0.0892, 0.646, 0.00408)),
        (470, morel(0.0175, 0.0821, 0.631, 0.00370)),
        (480, morel(0.0194, 0.0744, 0.621, 0.00337)),
        (490, morel(0.0224, 0.0680, 0.618, 0.00307)),
        (500, morel(0.0271, 0.0620, 0.614, 0.00280)),
        (510, morel(0.0384, 0.0541, 0.615, 0.00256)),
        (520, morel(0.0490, 0.0452, 0.618, 0.00234)),
        (530, morel(0.0516, 0.0380, 0.622, 0.00214)),
        (540, morel(0.0578, 0.0341, 0.628, 0.00196)),
        (550, morel(0.0640, 0.0308, 0.636, 0.00180)),
        (560, morel(0.0717, 0.0281, 0.646, 0.00166)),
        (570, morel(0.0807, 0.0255, 0.652, 0.00153)),
        (580, morel(0.1077, 0.0232, 0.660, 0.00141)),
        (590, morel(0.1611, 0.0214, 0.660, 0.00130)),
        (600, morel(0.2457, 0.0204, 0.661, 0.00120)),
        (610, morel(0.2883, 0.0199, 0.653, 0.00111)),
        (620, morel(0.3012, 0.0196, 0.646, 0.00103)),
        (630, morel(0.3128, 0.0192, 0.645, 0.00095)),
        (640, morel(0.3307, 0.0187, 0.648, 0.00088)),
        (650, morel(0.3560, 0.0186, 0.658, 0.00082)),
        (660, morel(0.4027, 0.0209, 0.684, 0.00076)),
        (670, morel(0.4385, 0.0216, 0.698, 0.00071)),
        (680, morel(0.4654, 0.0155, 0.698, 0.00066)),
        (690, morel(0.5015, 0.0076, 0.689, 0.00062)),
        (700, morel(0.6240, 0.0000, 0.000, 0.00058)),
    ])
});

/// `(wavelength µm, real index, imaginary index)` of pure water.
static WATER_INDEX: LazyLock<Vec<(f64, f64, f64)>> = LazyLock::new(|| {
    include_str!("../../data/ocean/water_index.txt")
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let v: Vec<f64> = line.split_whitespace().filter_map(|t| t.parse().ok()).collect();
            (v.len() == 3).then(|| (v[0], v[1], v[2]))
        })
        .collect()
});

/// Refractive index `(n, k)` of sea water at `wl` (µm) and salinity
/// `salinity` (ppt). Wavelengths outside the table extrapolate from the
/// edge interval.
pub fn refractive_index(wl: f64, salinity: f64) -> (f64, f64) {
    let table = &*WATER_INDEX;
    if table.len() < 2 {
        return (1.34 + SALINITY_INDEX_SHIFT * salinity / REFERENCE_SALINITY, 0.0);
    }
    let i = table
        .iter()
        .position(|(w, _, _)| wl < *w)
        .unwrap_or(table.len() - 1)
        .clamp(1, table.len() - 1);
    let (w0, n0, k0) = table[i - 1];
    let (w1, n1, k1) = table[i];
    let f = (wl - w0) / (w1 - w0);
    let n = n0 + f * (n1 - n0) + SALINITY_INDEX_SHIFT * salinity / REFERENCE_SALINITY;
    let k = k0 + f * (k1 - k0);
    (n, k.max(0.0))
}

/// Unpolarized Fresnel reflectance of the interface, with the
/// perpendicular and parallel components: `(R, Rs, Rp)`.
pub fn fresnel(n: f64, k: f64, cos_chi: f64) -> (f64, f64, f64) {
    let cos_chi = cos_chi.clamp(0.0, 1.0);
    let sin2 = 1.0 - cos_chi * cos_chi;
    let a1 = (n * n - k * k - sin2).abs();
    let a2 = ((n * n - k * k - sin2).powi(2) + 4.0 * n * n * k * k).sqrt();
    let u = (0.5 * (a1 + a2).abs()).sqrt();
    let v = (0.5 * (a2 - a1).abs()).sqrt();
    let rs = ((cos_chi - u).powi(2) + v * v) / ((cos_chi + u).powi(2) + v * v);
    let b1 = (n * n - k * k) * cos_chi;
    let b2 = 2.0 * n * k * cos_chi;
    let rp = ((b1 - u).powi(2) + (b2 + v).powi(2)) / ((b1 + u).powi(2) + (b2 - v).powi(2));
    (0.5 * (rs + rp), rs, rp)
}

/// Irradiance reflectance just below the surface of case-1 water with a
/// pigment concentration `pigment` (mg/m³). Zero outside 0.4-0.7 µm.
pub fn water_body_reflectance(wl: f64, pigment: f64) -> f64 {
    if !(0.4..=0.7).contains(&wl) {
        return 0.0;
    }
    let key = 400 + 10 * ((wl - 0.4) / 0.01).round() as u32;
    let Some(m) = MOREL.get(&key) else {
        return 0.0;
    };
    let (bb, kd) = if pigment.abs() < 1e-4 {
        (0.5 * m.bw, m.kw)
    } else {
        let b = 0.30 * pigment.powf(0.62);
        let bbt = 0.002 + 0.02 * (0.5 - 0.25 * pigment.log10()) * 0.550 / wl;
        (0.5 * m.bw + bbt * b, m.kw + m.chi * pigment.powf(m.e))
    };

    // iterate on the mean cosine of the upwelling light
    let mut r1 = 0.33 * bb / 0.75 / kd;
    for _ in 0..100 {
        let u2 = 0.90 * (1.0 - r1) / (1.0 + 2.25 * r1);
        let r2 = 0.33 * bb / u2 / kd;
        if ((r2 - r1) / r2).abs() < 1e-4 {
            return r2;
        }
        r1 = r2;
    }
    r1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresnel_at_normal_incidence() {
        let (r, rs, rp) = fresnel(1.334, 0.0, 1.0);
        let expected = ((1.334f64 - 1.0) / (1.334 + 1.0)).powi(2);
        assert!((r - expected).abs() < 1e-9, "Expected {:.5}, got {:.5}", expected, r);
        assert!((rs - rp).abs() < 1e-9);
    }

    #[test]
    fn test_brewster_angle_cancels_parallel_component() {
        let n: f64 = 1.334;
        let brewster = n.atan();
        let (_, rs, rp) = fresnel(n, 0.0, brewster.cos());
        assert!(rp < 1e-9, "got {:.3e}", rp);
        assert!(rs > 0.03);
    }

    #[test]
    fn test_refractive_index_and_salinity() {
        let (n, k) = refractive_index(0.55, 0.0);
        assert!((n - 1.333).abs() < 1e-9);
        assert!(k < 1e-8);
        let (ns, _) = refractive_index(0.55, REFERENCE_SALINITY);
        assert!((ns - n - 0.006).abs() < 1e-9);
    }

    #[test]
    fn test_water_body_reflectance() {
        assert_eq!(water_body_reflectance(0.8, 0.1), 0.0);
        let blue = water_body_reflectance(0.44, 0.1);
        let red = water_body_reflectance(0.66, 0.1);
        assert!(blue > red, "clear water is blue: {:.4} vs {:.4}", blue, red);
        assert!(blue > 0.01 && blue < 0.1, "got {:.4}", blue);
    }
}
