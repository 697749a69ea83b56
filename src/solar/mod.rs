//! Extraterrestrial solar irradiance and Earth-Sun distance.

pub mod sunpos;

use std::f64::consts::PI;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};

pub use sunpos::SolarPosition;

/// First wavelength of the irradiance table (µm).
pub const IRRADIANCE_START: f64 = 0.25;
/// Spectral step of the irradiance table and of band integration (µm).
pub const STEP: f64 = 0.0025;

static IRRADIANCE: LazyLock<Vec<f64>> = LazyLock::new(|| {
    include_str!("../../data/solar/irradiance.txt")
        .lines()
        .filter(|line| !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .filter_map(|token| token.parse().ok())
        .collect()
});

/// Solar irradiance at the top of the atmosphere (W m⁻² µm⁻¹) at
/// wavelength `wl` (µm), for the mean Earth-Sun distance.
///
/// Uses the nearest table sample. Wavelengths outside 0.25-4.0 µm give 0.
pub fn irradiance(wl: f64) -> f64 {
    let pos = (wl - IRRADIANCE_START) / STEP + 0.5;
    if pos < 0.0 {
        return 0.0;
    }
    IRRADIANCE.get(pos as usize).copied().unwrap_or(0.0)
}

/// Day of year in a non-leap calendar.
pub fn day_of_year(month: u32, day: u32) -> u32 {
    let m = month as i64;
    let d = day as i64;
    let j = if m <= 2 {
        31 * (m - 1) + d
    } else if m > 8 {
        31 * (m - 1) - ((m - 2) / 2) - 2 + d
    } else {
        31 * (m - 1) - ((m - 1) / 2) - 2 + d
    };
    j.max(1) as u32
}

/// Squared ratio of the mean to the actual Earth-Sun distance for a day
/// of the year. Multiplies the mean irradiance.
pub fn earth_sun_factor(day_of_year: u32) -> f64 {
    let om = 0.9856 * (day_of_year as f64 - 4.0) * PI / 180.0;
    1.0 / (1.0 - 0.01673 * om.cos()).powi(2)
}

/// Earth-Sun factor for a calendar date.
pub fn earth_sun_factor_on(date: NaiveDate) -> f64 {
    earth_sun_factor(day_of_year(date.month(), date.day()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irradiance_table() {
        assert_eq!(IRRADIANCE.len(), 1501);
        assert!((irradiance(0.25) - 69.3).abs() < 1e-9);
        assert!((irradiance(0.2525) - 77.65).abs() < 1e-9);
        assert_eq!(irradiance(0.1), 0.0);
        assert_eq!(irradiance(4.5), 0.0);

        let green = irradiance(0.55);
        assert!(green > 1700.0 && green < 2000.0, "Expected ~1850, got {:.1}", green);
    }

    #[test]
    fn test_day_of_year() {
        assert_eq!(day_of_year(1, 1), 1);
        assert_eq!(day_of_year(3, 1), 60);
        assert_eq!(day_of_year(7, 14), 195);
        assert_eq!(day_of_year(12, 31), 365);
    }

    #[test]
    fn test_earth_sun_factor_extremes() {
        let perihelion = earth_sun_factor(4);
        let aphelion = earth_sun_factor(186);
        assert!((perihelion - 1.0343).abs() < 0.001, "got {:.4}", perihelion);
        assert!((aphelion - 0.9674).abs() < 0.001, "got {:.4}", aphelion);

        let date = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        assert_eq!(earth_sun_factor_on(date), earth_sun_factor(195));
    }
}
