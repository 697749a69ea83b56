//! Vertical structure of the molecular atmosphere.
//!
//! An [`AtmosphericProfile`] is a list of levels ordered by altitude. It
//! provides the columns of water vapour and ozone, the Rayleigh optical
//! depth (see [`rayleigh`]) and the split of the atmosphere at a target
//! or sensor altitude.

pub mod gas;
pub mod profiles;
pub mod rayleigh;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use profiles::ProfileTable;

/// Ozone column (g/m²) of one atm-cm.
const OZONE_ATM_CM: f64 = 21.4148;

/// Standard atmospheres shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardAtmosphere {
    /// US 1962 profile without gaseous absorption
    NoGas,
    Tropical,
    MidlatitudeSummer,
    MidlatitudeWinter,
    SubarcticSummer,
    SubarcticWinter,
    Us62,
}

impl StandardAtmosphere {
    fn table(&self) -> &'static ProfileTable {
        match self {
            StandardAtmosphere::Tropical => &profiles::TROPICAL,
            StandardAtmosphere::MidlatitudeSummer => &profiles::MIDLATITUDE_SUMMER,
            StandardAtmosphere::MidlatitudeWinter => &profiles::MIDLATITUDE_WINTER,
            StandardAtmosphere::SubarcticSummer => &profiles::SUBARCTIC_SUMMER,
            StandardAtmosphere::SubarcticWinter => &profiles::SUBARCTIC_WINTER,
            StandardAtmosphere::Us62 | StandardAtmosphere::NoGas => &profiles::US62,
        }
    }
}

/// One level of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Altitude (km)
    pub z: f64,
    /// Pressure (mb)
    pub p: f64,
    /// Temperature (K)
    pub t: f64,
    /// Water vapour density (g/m³)
    pub wh: f64,
    /// Ozone density (g/m³)
    pub wo: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtmosphericProfile {
    levels: Vec<Level>,
    absorbing: bool,
}

impl AtmosphericProfile {
    pub fn standard(kind: StandardAtmosphere) -> Self {
        let table = kind.table();
        let mut levels: Vec<Level> = (0..profiles::ALTITUDES.len())
            .map(|i| Level {
                z: profiles::ALTITUDES[i],
                p: table.pressure[i],
                t: table.temperature[i],
                wh: table.water_vapour[i],
                wo: table.ozone[i],
            })
            .collect();
        levels.push(Level {
            z: profiles::TOP_ALTITUDE,
            p: 0.0,
            t: table.temperature[profiles::ALTITUDES.len() - 1],
            wh: 0.0,
            wo: 0.0,
        });
        Self {
            levels,
            absorbing: kind != StandardAtmosphere::NoGas,
        }
    }

    /// Builds a profile from user levels.
    ///
    /// Levels must be strictly ascending in altitude with positive
    /// temperature and non-negative pressure and densities.
    pub fn from_levels(levels: Vec<Level>) -> Result<Self, ConfigError> {
        if levels.len() < 2 {
            return Err(ConfigError::Atmosphere(format!(
                "a profile needs at least 2 levels, got {}",
                levels.len()
            )));
        }
        if levels.windows(2).any(|w| w[1].z <= w[0].z) {
            return Err(ConfigError::Atmosphere(
                "profile altitudes must be strictly ascending".to_string(),
            ));
        }
        if let Some(bad) = levels
            .iter()
            .find(|l| l.t <= 0.0 || l.p < 0.0 || l.wh < 0.0 || l.wo < 0.0)
        {
            return Err(ConfigError::Atmosphere(format!(
                "invalid level at {} km: p = {}, T = {}, wh = {}, wo = {}",
                bad.z, bad.p, bad.t, bad.wh, bad.wo
            )));
        }
        Ok(Self {
            levels,
            absorbing: true,
        })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Whether gaseous absorption applies along the path.
    pub fn is_absorbing(&self) -> bool {
        self.absorbing
    }

    pub fn ground_altitude(&self) -> f64 {
        self.levels[0].z
    }

    /// Trapezoidal column of a density through the layers below the first
    /// zero-pressure level. Returns density × km.
    fn column(&self, density: impl Fn(&Level) -> f64) -> f64 {
        self.levels
            .windows(2)
            .take_while(|w| w[1].p > 0.0)
            .map(|w| 0.5 * (density(&w[0]) + density(&w[1])) * (w[1].z - w[0].z))
            .sum()
    }

    /// Water vapour column (g/cm²).
    pub fn water_vapour_column(&self) -> f64 {
        self.column(|l| l.wh) * 0.1
    }

    /// Ozone column (atm-cm).
    pub fn ozone_column(&self) -> f64 {
        self.column(|l| l.wo) * 1000.0 / OZONE_ATM_CM
    }

    /// Rescales the water vapour (g/cm²) and ozone (atm-cm) densities so
    /// that the columns match the requested values.
    pub fn with_columns(&self, water: Option<f64>, ozone: Option<f64>) -> Self {
        let mut scaled = self.clone();
        if let Some(uw) = water {
            let current = self.water_vapour_column();
            let factor = if current > 0.0 { uw / current } else { 0.0 };
            scaled.levels.iter_mut().for_each(|l| l.wh *= factor);
        }
        if let Some(uo3) = ozone {
            let current = self.ozone_column();
            let factor = if current > 0.0 { uo3 / current } else { 0.0 };
            scaled.levels.iter_mut().for_each(|l| l.wo *= factor);
        }
        scaled
    }

    fn level_at(&self, z: f64) -> Level {
        let n = self.levels.len();
        let k = self
            .levels
            .windows(2)
            .position(|w| z >= w[0].z && z < w[1].z)
            .unwrap_or(n - 2);
        let (lo, hi) = (self.levels[k], self.levels[k + 1]);
        let f = ((z - lo.z) / (hi.z - lo.z)).clamp(0.0, 1.0);
        let geometric = |a: f64, b: f64| {
            if a > 0.0 && b > 0.0 {
                a * (f * (b / a).ln()).exp()
            } else {
                a + f * (b - a)
            }
        };
        Level {
            z,
            p: geometric(lo.p, hi.p),
            t: lo.t + f * (hi.t - lo.t),
            wh: geometric(lo.wh, hi.wh),
            wo: geometric(lo.wo, hi.wo),
        }
    }

    /// Profile above altitude `z` (km), used for an elevated target. The
    /// new ground level is interpolated exponentially in pressure and
    /// density and linearly in temperature.
    pub fn truncated_at(&self, z: f64) -> Self {
        if z <= self.ground_altitude() {
            return self.clone();
        }
        let mut levels = vec![self.level_at(z)];
        levels.extend(self.levels.iter().copied().filter(|l| l.z > z));
        Self {
            levels,
            absorbing: self.absorbing,
        }
    }

    /// Profile from the ground up to altitude `z` (km), closed by an
    /// interpolated level at `z`.
    pub fn below(&self, z: f64) -> Self {
        let ground = self.ground_altitude();
        if z <= ground {
            let first = self.levels[0];
            return Self {
                levels: vec![first, Level { z: ground, ..first }],
                absorbing: self.absorbing,
            };
        }
        let mut levels: Vec<Level> = self.levels.iter().copied().filter(|l| l.z < z).collect();
        levels.push(self.level_at(z));
        Self {
            levels,
            absorbing: self.absorbing,
        }
    }

    /// Fraction of the molecular optical depth found below altitude
    /// `z` (km) above the ground.
    pub fn rayleigh_fraction_below(&self, z: f64) -> f64 {
        let total = rayleigh::column_density(self);
        if total <= 0.0 {
            return 0.0;
        }
        let below = rayleigh::column_density(&self.below(self.ground_altitude() + z));
        (below / total).clamp(0.0, 1.0)
    }
}
