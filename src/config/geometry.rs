use chrono::{NaiveDate, NaiveDateTime};
use serde::de::Error;
use serde::{Deserialize, Deserializer};

use super::ConfigError;
use crate::solar::{SolarPosition, day_of_year};

/// Sun and sensor directions of an observation, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub solar_zenith: f64,
    pub solar_azimuth: f64,
    pub view_zenith: f64,
    pub view_azimuth: f64,
    pub month: u32,
    pub day: u32,
}

impl<'de> Deserialize<'de> for Geometry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct GeometryHelper {
            solar_zenith: Option<f64>,
            solar_azimuth: Option<f64>,
            view_zenith: f64,
            view_azimuth: f64,
            month: Option<u32>,
            day: Option<u32>,
            /// UTC date-time, `%Y-%m-%dT%H:%M:%S`
            datetime: Option<String>,
            latitude: Option<f64>,
            longitude: Option<f64>,
        }

        let h = GeometryHelper::deserialize(deserializer)?;

        let geometry = match (h.datetime, h.solar_zenith) {
            (Some(text), None) => {
                let datetime = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S")
                    .map_err(|e| D::Error::custom(ConfigError::DateParse(e)))?;
                let (Some(latitude), Some(longitude)) = (h.latitude, h.longitude) else {
                    return Err(D::Error::custom(ConfigError::Geometry(
                        "a date-time needs a latitude and a longitude".into(),
                    )));
                };
                Geometry::at(datetime, latitude, longitude, h.view_zenith, h.view_azimuth)
                    .map_err(D::Error::custom)?
            }
            (None, Some(solar_zenith)) => {
                let (Some(month), Some(day)) = (h.month, h.day) else {
                    return Err(D::Error::custom(ConfigError::Geometry(
                        "explicit angles need a month and a day".into(),
                    )));
                };
                Geometry {
                    solar_zenith,
                    solar_azimuth: h.solar_azimuth.unwrap_or(0.0),
                    view_zenith: h.view_zenith,
                    view_azimuth: h.view_azimuth,
                    month,
                    day,
                }
            }
            _ => {
                return Err(D::Error::custom(ConfigError::Geometry(
                    "give either the solar angles or a date-time, not both".into(),
                )));
            }
        };
        geometry.validate().map_err(D::Error::custom)?;
        Ok(geometry)
    }
}

impl Geometry {
    /// Geometry with the sun placed from a UTC date-time and a location.
    pub fn at(
        datetime: NaiveDateTime,
        latitude: f64,
        longitude: f64,
        view_zenith: f64,
        view_azimuth: f64,
    ) -> Result<Self, ConfigError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::Geometry(format!(
                "invalid location ({}, {})",
                latitude, longitude
            )));
        }
        let sun = SolarPosition::at(datetime, latitude, longitude);
        if !sun.is_daylight() {
            return Err(ConfigError::Geometry(format!(
                "the sun is below the horizon at {} (zenith {:.2}°)",
                datetime, sun.zenith_angle_deg
            )));
        }
        let date: NaiveDate = datetime.date();
        Ok(Self {
            solar_zenith: sun.zenith_angle_deg,
            solar_azimuth: sun.azimuth_angle_deg,
            view_zenith,
            view_azimuth,
            month: chrono::Datelike::month(&date),
            day: chrono::Datelike::day(&date),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..90.0).contains(&self.solar_zenith) {
            return Err(ConfigError::Geometry(format!(
                "solar zenith must lie in [0, 90), got {}",
                self.solar_zenith
            )));
        }
        if !(0.0..90.0).contains(&self.view_zenith) {
            return Err(ConfigError::Geometry(format!(
                "view zenith must lie in [0, 90), got {}",
                self.view_zenith
            )));
        }
        if !self.solar_azimuth.is_finite() || !self.view_azimuth.is_finite() {
            return Err(ConfigError::Geometry("azimuths must be finite".into()));
        }
        if NaiveDate::from_ymd_opt(2001, self.month, self.day).is_none() {
            return Err(ConfigError::Geometry(format!(
                "invalid date: month {}, day {}",
                self.month, self.day
            )));
        }
        Ok(())
    }

    pub fn mu_s(&self) -> f64 {
        self.solar_zenith.to_radians().cos()
    }

    pub fn mu_v(&self) -> f64 {
        self.view_zenith.to_radians().cos()
    }

    /// Relative azimuth (radians). Zero puts the sensor on the sun side.
    pub fn relative_azimuth(&self) -> f64 {
        (self.view_azimuth - self.solar_azimuth).to_radians()
    }

    pub fn day_of_year(&self) -> u32 {
        day_of_year(self.month, self.day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_angles() {
        let json = r#"{"solar_zenith": 30.0, "solar_azimuth": 120.0,
            "view_zenith": 10.0, "view_azimuth": 300.0, "month": 7, "day": 14}"#;
        let g: Geometry = serde_json::from_str(json).unwrap();
        assert!((g.mu_s() - 30f64.to_radians().cos()).abs() < 1e-12);
        assert!((g.relative_azimuth() - 180f64.to_radians()).abs() < 1e-12);
        assert_eq!(g.day_of_year(), 195);
    }

    #[test]
    fn test_sun_from_date_time() {
        let json = r#"{"datetime": "2023-06-21T12:00:00", "latitude": 45.0,
            "longitude": 0.0, "view_zenith": 0.0, "view_azimuth": 0.0}"#;
        let g: Geometry = serde_json::from_str(json).unwrap();
        assert!((g.solar_zenith - 21.56).abs() < 1.0, "got {:.2}", g.solar_zenith);
        assert_eq!((g.month, g.day), (6, 21));
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let night = r#"{"datetime": "2023-06-21T00:00:00", "latitude": 45.0,
            "longitude": 0.0, "view_zenith": 0.0, "view_azimuth": 0.0}"#;
        assert!(serde_json::from_str::<Geometry>(night).is_err());
        let grazing = r#"{"solar_zenith": 95.0, "view_zenith": 0.0,
            "view_azimuth": 0.0, "month": 1, "day": 1}"#;
        assert!(serde_json::from_str::<Geometry>(grazing).is_err());
        let bad_date = r#"{"solar_zenith": 30.0, "view_zenith": 0.0,
            "view_azimuth": 0.0, "month": 2, "day": 30}"#;
        assert!(serde_json::from_str::<Geometry>(bad_date).is_err());
    }
}
