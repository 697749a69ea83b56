//! Gaseous transmittance.
//!
//! Only ozone absorption is modelled, through its Huggins and Chappuis
//! bands. Water vapour and the other absorbers are transparent, so the
//! transmittance variants that differ by their water vapour path all
//! reduce to the ozone value.

use super::AtmosphericProfile;

/// Ozone absorption coefficient (per atm-cm) against wavelength (µm).
const OZONE_ABSORPTION: [(f64, f64); 21] = [
    (0.25, 300.0),
    (0.28, 100.0),
    (0.30, 10.0),
    (0.31, 2.7),
    (0.32, 0.9),
    (0.33, 0.35),
    (0.34, 0.1),
    (0.35, 0.03),
    (0.36, 0.01),
    (0.38, 0.0),
    (0.40, 0.0),
    (0.45, 0.003),
    (0.50, 0.034),
    (0.55, 0.092),
    (0.60, 0.125),
    (0.65, 0.063),
    (0.70, 0.021),
    (0.75, 0.010),
    (0.80, 0.006),
    (0.85, 0.003),
    (0.90, 0.0015),
];

/// Linear interpolation in the absorption table, zero outside it.
pub fn ozone_coefficient(wl: f64) -> f64 {
    let first = OZONE_ABSORPTION[0];
    let last = OZONE_ABSORPTION[OZONE_ABSORPTION.len() - 1];
    if wl < first.0 || wl > last.0 {
        return 0.0;
    }
    OZONE_ABSORPTION
        .windows(2)
        .find(|w| wl >= w[0].0 && wl <= w[1].0)
        .map(|w| {
            let f = (wl - w[0].0) / (w[1].0 - w[0].0);
            w[0].1 + f * (w[1].1 - w[0].1)
        })
        .unwrap_or(0.0)
}

/// Transmittances along the sun and view paths at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasTransmittance {
    pub down: f64,
    pub up: f64,
}

impl GasTransmittance {
    pub const UNITY: GasTransmittance = GasTransmittance { down: 1.0, up: 1.0 };

    pub fn total(&self) -> f64 {
        self.down * self.up
    }
}

/// Absorber amounts on the downward and upward paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasAbsorption {
    /// Ozone column between the top and the ground (atm-cm)
    pub ozone: f64,
    /// Ozone column between the ground and the sensor (atm-cm)
    pub ozone_up: f64,
}

impl GasAbsorption {
    pub fn none() -> Self {
        Self {
            ozone: 0.0,
            ozone_up: 0.0,
        }
    }

    /// Absorber amounts for a sensor at `sensor_altitude` km above the
    /// ground of `profile`. Sensors at 100 km or more see the whole column.
    pub fn from_profile(profile: &AtmosphericProfile, sensor_altitude: f64) -> Self {
        if !profile.is_absorbing() {
            return Self::none();
        }
        let ozone = profile.ozone_column();
        let ozone_up = if sensor_altitude >= 100.0 {
            ozone
        } else {
            profile
                .below(profile.ground_altitude() + sensor_altitude)
                .ozone_column()
        };
        Self { ozone, ozone_up }
    }

    pub fn at(&self, wl: f64, mu_s: f64, mu_v: f64) -> GasTransmittance {
        let k = ozone_coefficient(wl);
        GasTransmittance {
            down: (-k * self.ozone / mu_s).exp(),
            up: (-k * self.ozone_up / mu_v).exp(),
        }
    }
}
