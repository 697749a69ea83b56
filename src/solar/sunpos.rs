/// Solar position from date, time and location.
///
/// Declination and equation of time follow Spencer's Fourier series in the
/// day angle. Azimuth is measured clockwise from north.
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq)]
pub struct SolarPosition {
    pub zenith_angle_deg: f64,
    pub azimuth_angle_deg: f64,
    pub altitude_angle_deg: f64,
    pub declination_deg: f64,
    pub hour_angle_deg: f64,
    /// Equation of time in minutes
    pub equation_of_time: f64,
}

impl SolarPosition {
    /// Calculate the solar position
    ///
    /// # Arguments
    /// * `jday` - Day of year (1-365/366)
    /// * `hour` - Hour in decimal format (0.0-24.0, UTC time)
    /// * `latitude` - Latitude in decimal degrees (-90 to +90)
    /// * `longitude` - Longitude in decimal degrees (-180 to +180), positive east
    pub fn calculate(jday: u32, hour: f64, latitude: f64, longitude: f64) -> Self {
        let d2r = PI / 180.0;
        let r2d = 180.0 / PI;

        // Mean solar time
        let tsm = hour + longitude / 15.0;
        let latrad = latitude * d2r;
        let tet = 2.0 * PI * jday as f64 / 365.0;

        let et = (0.000075 + 0.001868 * tet.cos()
            - 0.032077 * tet.sin()
            - 0.014615 * (2.0 * tet).cos()
            - 0.040849 * (2.0 * tet).sin())
            * 12.0
            * 60.0
            / PI;

        // True solar time relative to noon, then hour angle
        let tsv = tsm + et / 60.0 - 12.0;
        let ah = tsv * 15.0 * d2r;

        let decrad = 0.006918 - 0.399912 * tet.cos() + 0.070257 * tet.sin()
            - 0.006758 * (2.0 * tet).cos()
            + 0.000907 * (2.0 * tet).sin()
            - 0.002697 * (3.0 * tet).cos()
            + 0.00148 * (3.0 * tet).sin();

        let amuzero =
            latrad.sin() * decrad.sin() + latrad.cos() * decrad.cos() * ah.cos();
        let elev = amuzero.clamp(-1.0, 1.0).asin();

        let sin_az = (decrad.cos() * ah.sin() / elev.cos()).clamp(-1.0, 1.0);
        let cos_az =
            (-latrad.cos() * decrad.sin() + latrad.sin() * decrad.cos() * ah.cos()) / elev.cos();

        let mut azim = sin_az.asin();
        if cos_az <= 0.0 {
            azim = PI - azim;
        } else if sin_az <= 0.0 {
            azim += 2.0 * PI;
        }
        azim += PI;
        if azim > 2.0 * PI {
            azim -= 2.0 * PI;
        }

        SolarPosition {
            zenith_angle_deg: 90.0 - elev * r2d,
            azimuth_angle_deg: azim * r2d,
            altitude_angle_deg: elev * r2d,
            declination_deg: decrad * r2d,
            hour_angle_deg: ah * r2d,
            equation_of_time: et,
        }
    }

    /// Solar position at a UTC date-time.
    pub fn at(datetime: NaiveDateTime, latitude: f64, longitude: f64) -> Self {
        let hour = datetime.num_seconds_from_midnight() as f64 / 3600.0;
        Self::calculate(datetime.ordinal(), hour, latitude, longitude)
    }

    pub fn is_daylight(&self) -> bool {
        self.zenith_angle_deg < 90.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sunpos_noon_solstice() {
        let pos = SolarPosition::calculate(172, 12.0, 45.0, 0.0);
        assert!(
            (pos.zenith_angle_deg - 21.55).abs() < 0.1,
            "Expected zenith ~21.55°, got {:.2}°",
            pos.zenith_angle_deg
        );
        // Due south at solar noon
        assert!((pos.azimuth_angle_deg - 180.0).abs() < 2.0);
        assert!((pos.altitude_angle_deg + pos.zenith_angle_deg - 90.0).abs() < 1e-9);
        assert!((pos.declination_deg - 23.45).abs() < 0.1);
    }

    #[test]
    fn test_sunpos_morning_and_afternoon() {
        let morning = SolarPosition::calculate(172, 8.0, 45.0, 0.0);
        let afternoon = SolarPosition::calculate(172, 16.0, 45.0, 0.0);
        assert!(
            morning.azimuth_angle_deg > 45.0 && morning.azimuth_angle_deg < 135.0,
            "Expected an eastern sun, got {:.1}°",
            morning.azimuth_angle_deg
        );
        assert!(
            afternoon.azimuth_angle_deg > 225.0 && afternoon.azimuth_angle_deg < 315.0,
            "Expected a western sun, got {:.1}°",
            afternoon.azimuth_angle_deg
        );
        assert!((morning.zenith_angle_deg - afternoon.zenith_angle_deg).abs() < 1.0);
    }

    #[test]
    fn test_sunpos_winter() {
        let pos = SolarPosition::calculate(355, 12.0, 45.0, 0.0);
        assert!(pos.zenith_angle_deg > 60.0);
        assert!(pos.declination_deg < -23.0);
    }

    #[test]
    fn test_sunpos_equator_equinox() {
        let pos = SolarPosition::calculate(80, 12.0, 0.0, 0.0);
        assert!(
            pos.zenith_angle_deg < 3.0,
            "Zenith angle should be very small at equator/equinox, got {:.2}",
            pos.zenith_angle_deg
        );
    }

    #[test]
    fn test_sunpos_longitude_shift() {
        // Solar noon at 75°W is near 17:00 UTC
        let pos = SolarPosition::calculate(100, 17.0, 45.0, -75.0);
        assert!((pos.azimuth_angle_deg - 180.0).abs() < 2.0);
        assert!((pos.zenith_angle_deg - 36.98).abs() < 0.1);
    }

    #[test]
    fn test_sunpos_southern_hemisphere_faces_north() {
        let pos = SolarPosition::calculate(172, 12.0, -30.0, 0.0);
        assert!(pos.azimuth_angle_deg < 5.0 || pos.azimuth_angle_deg > 355.0);
    }

    #[test]
    fn test_sunpos_from_datetime() {
        let dt = NaiveDateTime::parse_from_str("2023-06-21 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let pos = SolarPosition::at(dt, 45.0, 0.0);
        assert_eq!(pos, SolarPosition::calculate(172, 12.0, 45.0, 0.0));
        assert!(pos.is_daylight());

        let night = SolarPosition::calculate(172, 0.0, 45.0, 0.0);
        assert!(!night.is_daylight());
    }
}
