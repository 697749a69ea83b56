//! Vertical discretization of the scattering column into optical-depth
//! levels, with the sensor level inserted as an exact boundary.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::atmosphere::rayleigh::SCALE_HEIGHT as RAYLEIGH_SCALE_HEIGHT;

/// Number of layers of the default discretization.
pub const DEFAULT_LAYERS: usize = 30;
/// Altitude (km) taken as the top of the column.
pub const TOP_OF_COLUMN: f64 = 300.0;
/// Aerosol scale height used when none can be derived.
pub const DEFAULT_AEROSOL_SCALE_HEIGHT: f64 = 2.0;
/// Below this depth a scatterer is considered absent.
pub const THIN_DEPTH: f64 = 1e-3;

/// Sensor altitudes above this are treated as satellite altitude.
pub const AIRCRAFT_CEILING: f64 = 900.0;

const BISECTION_STEPS: usize = 60;

/// One layer of a user aerosol profile, listed from the ground up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AerosolLayer {
    /// Layer thickness (km)
    pub thickness: f64,
    /// Aerosol optical depth of the layer at 550 nm
    pub tau550: f64,
}

/// Where the sensor sits in the column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorLevel {
    /// Aircraft at `altitude` km with the Rayleigh and aerosol depths of
    /// the column above it.
    Aircraft {
        altitude: f64,
        tau_r_above: f64,
        tau_a_above: f64,
    },
    Satellite,
}

/// Aerosol vertical distribution.
#[derive(Debug, Clone, PartialEq)]
enum Vertical {
    Exponential { scale_height: f64 },
    /// `(base, top, fraction of the total depth)` per layer
    Layers(Vec<(f64, f64, f64)>),
}

impl Vertical {
    fn from_profile(profile: &[AerosolLayer]) -> Option<Self> {
        let total: f64 = profile.iter().map(|l| l.tau550).sum();
        if total <= 0.0 {
            return None;
        }
        let mut base = 0.0;
        let mut layers = Vec::with_capacity(profile.len() + 1);
        for l in profile {
            layers.push((base, base + l.thickness, l.tau550 / total));
            base += l.thickness;
        }
        if base < TOP_OF_COLUMN {
            layers.push((base, TOP_OF_COLUMN, 0.0));
        }
        Some(Vertical::Layers(layers))
    }

    /// Aerosol depth above altitude `z`.
    fn depth_above(&self, tau_a: f64, z: f64) -> f64 {
        match self {
            Vertical::Exponential { scale_height } => {
                let x = -z / scale_height;
                if x <= -20.0 { 0.0 } else { tau_a * x.exp() }
            }
            Vertical::Layers(layers) => {
                let mut above = 0.0;
                for &(base, top, frac) in layers {
                    if z <= base {
                        above += frac;
                    } else if z < top {
                        above += frac * (top - z) / (top - base);
                    }
                }
                tau_a * above
            }
        }
    }

    /// Aerosol extinction coefficient (km⁻¹) at altitude `z`.
    fn extinction(&self, tau_a: f64, z: f64) -> f64 {
        match self {
            Vertical::Exponential { scale_height } => self.depth_above(tau_a, z) / scale_height,
            Vertical::Layers(layers) => layers
                .iter()
                .find(|(base, top, _)| z >= *base && z < *top)
                .map_or(0.0, |(base, top, frac)| tau_a * frac / (top - base)),
        }
    }
}

/// Optical content of the column for one wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<'a> {
    pub tau_r: f64,
    pub tau_a: f64,
    pub omega_a: f64,
    pub sensor: SensorLevel,
    pub profile: Option<&'a [AerosolLayer]>,
}

/// Discretized column: depth `h[i]` of each level from the top, the
/// aerosol (`xdel`, scaled by ω) and molecular (`ydel`) scattering shares
/// and the attenuated solar source `ch`.
#[derive(Debug, Clone, PartialEq)]
pub struct Layering {
    pub h: Vec<f64>,
    pub xdel: Vec<f64>,
    pub ydel: Vec<f64>,
    pub ch: Vec<f64>,
    pub altitude: Vec<f64>,
    /// Level holding the sensor
    pub iplane: usize,
}

impl Layering {
    /// Index of the ground level.
    pub fn nt(&self) -> usize {
        self.h.len() - 1
    }

    /// Total depth of the column.
    pub fn depth(&self) -> f64 {
        self.h[self.nt()]
    }

    /// Builds the layering of `column` with `nt` layers.
    ///
    /// # Arguments
    /// * `column` - Depths and single-scattering albedo
    /// * `mu_s` - Cosine of the solar zenith angle
    /// * `nt` - Number of layers
    /// * `plane_tolerance` - Depth within which the sensor snaps to an
    ///   existing level instead of adding one
    pub fn build(column: &Column, mu_s: f64, nt: usize, plane_tolerance: f64) -> Self {
        let (tr, ta, piz) = (column.tau_r, column.tau_a, column.omega_a);
        let aircraft = match column.sensor {
            SensorLevel::Aircraft { altitude, tau_r_above, tau_a_above }
                if altitude > 0.0 && altitude <= AIRCRAFT_CEILING =>
            {
                Some((altitude, tau_r_above, tau_a_above))
            }
            _ => None,
        };
        let ha = match aircraft {
            Some((z, _, tap)) if tap > THIN_DEPTH && ta > tap => -z / (tap / ta).ln(),
            _ => DEFAULT_AEROSOL_SCALE_HEIGHT,
        };
        let vertical = column
            .profile
            .and_then(Vertical::from_profile)
            .unwrap_or(Vertical::Exponential { scale_height: ha });
        let ntp = if aircraft.is_some() { nt - 1 } else { nt };

        let mut layering = Self {
            h: vec![0.0; nt + 1],
            xdel: vec![0.0; nt + 1],
            ydel: vec![0.0; nt + 1],
            ch: vec![0.0; nt + 1],
            altitude: vec![0.0; nt + 1],
            iplane: 0,
        };

        let share = |z: f64| -> f64 {
            let cr = tr * (-z / RAYLEIGH_SCALE_HEIGHT).exp() / RAYLEIGH_SCALE_HEIGHT;
            let ca = vertical.extinction(ta, z);
            if cr + ca > 0.0 { cr / (cr + ca) } else { 1.0 }
        };

        if ta <= THIN_DEPTH && tr > ta {
            for j in 0..=ntp {
                layering.h[j] = j as f64 * tr / ntp as f64;
                layering.ydel[j] = 1.0;
                layering.xdel[j] = 0.0;
                layering.altitude[j] = if j == 0 {
                    TOP_OF_COLUMN
                } else {
                    -(layering.h[j] / tr).ln() * RAYLEIGH_SCALE_HEIGHT
                };
            }
        } else if tr <= THIN_DEPTH && ta > tr {
            for j in 0..=ntp {
                layering.h[j] = j as f64 * ta / ntp as f64;
                layering.ydel[j] = 0.0;
                layering.xdel[j] = piz;
                layering.altitude[j] = if j == 0 {
                    TOP_OF_COLUMN
                } else {
                    -(layering.h[j] / ta).ln() * ha
                };
            }
        } else {
            let depth_above =
                |z: f64| tr * (-z / RAYLEIGH_SCALE_HEIGHT).exp() + vertical.depth_above(ta, z);
            let total = depth_above(0.0);
            for it in 0..=ntp {
                let target = it as f64 * total / ntp as f64;
                let z = if it == 0 {
                    TOP_OF_COLUMN
                } else if it == ntp {
                    0.0
                } else {
                    bisect(&depth_above, target)
                };
                layering.h[it] = if it == 0 { 0.0 } else { depth_above(z) };
                layering.altitude[it] = z;
                let ratio = share(z);
                layering.ydel[it] = ratio;
                layering.xdel[it] = (1.0 - ratio) * piz;
            }
            layering.ydel[0] = 1.0;
            layering.xdel[0] = 0.0;
        }

        let mut nt_used = nt;
        if let Some((palt, trp, tap)) = aircraft {
            let taup = tap + trp;
            let mut iplane = 0;
            for i in 0..=ntp {
                if taup >= layering.h[i] {
                    iplane = i;
                }
            }
            let xt1 = (layering.h[iplane] - taup).abs();
            let xt2 = if iplane < ntp {
                (layering.h[iplane + 1] - taup).abs()
            } else {
                f64::INFINITY
            };
            if xt1 > plane_tolerance && xt2 > plane_tolerance {
                iplane += 1;
                for i in (iplane..=nt).rev() {
                    layering.h[i] = layering.h[i - 1];
                    layering.xdel[i] = layering.xdel[i - 1];
                    layering.ydel[i] = layering.ydel[i - 1];
                    layering.altitude[i] = layering.altitude[i - 1];
                }
            } else {
                nt_used = ntp;
                if xt2 < xt1 {
                    iplane += 1;
                }
            }
            debug!("sensor at {:.2} km placed on level {}", palt, iplane);
            layering.h[iplane] = taup;
            layering.altitude[iplane] = palt;
            if tr > THIN_DEPTH && ta > THIN_DEPTH {
                let ratio = share(palt);
                layering.ydel[iplane] = ratio;
                layering.xdel[iplane] = (1.0 - ratio) * piz;
            } else if tr > THIN_DEPTH {
                layering.ydel[iplane] = 1.0;
                layering.xdel[iplane] = 0.0;
            } else {
                layering.ydel[iplane] = 0.0;
                layering.xdel[iplane] = piz;
            }
            layering.iplane = iplane;
        }

        for v in [
            &mut layering.h,
            &mut layering.xdel,
            &mut layering.ydel,
            &mut layering.altitude,
        ] {
            v.truncate(nt_used + 1);
        }
        layering.ch = layering.h.iter().map(|h| (-h / mu_s).exp() / 2.0).collect();
        layering
    }
}

/// Altitude at which `depth_above` reaches `target`, in `[0, TOP_OF_COLUMN]`.
fn bisect(depth_above: &impl Fn(f64) -> f64, target: f64) -> f64 {
    let (mut lo, mut hi) = (0.0, TOP_OF_COLUMN);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        // depth decreases with altitude
        if depth_above(mid) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(tau_r: f64, tau_a: f64, sensor: SensorLevel) -> Column<'static> {
        Column {
            tau_r,
            tau_a,
            omega_a: 0.9,
            sensor,
            profile: None,
        }
    }

    #[test]
    fn test_pure_rayleigh_equal_steps() {
        let l = Layering::build(&column(0.1, 0.0, SensorLevel::Satellite), 0.8, 10, 5e-4);
        assert_eq!(l.nt(), 10);
        for (j, h) in l.h.iter().enumerate() {
            assert!((h - 0.01 * j as f64).abs() < 1e-12);
        }
        assert!(l.ydel.iter().all(|y| *y == 1.0));
        assert!(l.xdel.iter().all(|x| *x == 0.0));
        assert!((l.ch[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mixed_layers_are_monotonic() {
        let l = Layering::build(&column(0.1, 0.3, SensorLevel::Satellite), 0.8, 30, 5e-4);
        assert!((l.depth() - 0.4).abs() < 1e-9, "Expected 0.4, got {:.6}", l.depth());
        for w in l.h.windows(2) {
            assert!(w[1] > w[0]);
        }
        // aerosol dominates near the ground with a 2 km scale height
        assert!(l.ydel[l.nt()] < 0.5);
        assert!(l.xdel[l.nt()] > 0.4);
        for w in l.h.windows(2) {
            assert!((w[1] - w[0] - 0.4 / 30.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_aircraft_level_is_inserted() {
        let sensor = SensorLevel::Aircraft {
            altitude: 3.0,
            tau_r_above: 0.1 * (-3.0_f64 / 8.0).exp(),
            tau_a_above: 0.3 * (-1.5_f64).exp(),
        };
        let l = Layering::build(&column(0.1, 0.3, sensor), 0.8, 30, 5e-4);
        let taup = 0.1 * (-3.0_f64 / 8.0).exp() + 0.3 * (-1.5_f64).exp();
        assert!((l.h[l.iplane] - taup).abs() < 1e-12);
        assert!(l.iplane > 0 && l.iplane < l.nt());
        assert_eq!(l.altitude[l.iplane], 3.0);
        for w in l.h.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn test_user_profile_confines_aerosol() {
        let profile = [
            AerosolLayer { thickness: 1.0, tau550: 0.2 },
            AerosolLayer { thickness: 1.0, tau550: 0.0 },
        ];
        let col = Column {
            tau_r: 0.1,
            tau_a: 0.2,
            omega_a: 1.0,
            sensor: SensorLevel::Satellite,
            profile: Some(&profile),
        };
        let l = Layering::build(&col, 0.8, 20, 5e-4);
        for (i, z) in l.altitude.iter().enumerate() {
            if *z > 1.0 + 1e-9 {
                assert_eq!(l.xdel[i], 0.0, "level {} at {:.2} km", i, z);
            }
        }
        assert!((l.depth() - 0.3).abs() < 1e-9);
    }
}
