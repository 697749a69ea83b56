use serde::{Deserialize, Serialize};

use super::Brdf;
use crate::config::ConfigError;

/// Reflectance factors tabulated in one zenith angle and the relative
/// azimuth (degrees).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngularTable {
    pub zenith: Vec<f64>,
    pub azimuth: Vec<f64>,
    /// Reflectance factors indexed `[zenith][azimuth]`
    pub values: Vec<Vec<f64>>,
}

/// Measured reflectance of a scene, with the measured albedo.
///
/// Two tables are read: `sun_fixed` keeps the sun at `solar_zenith` and
/// varies the view, `view_fixed` keeps the view at `view_zenith` and
/// varies the sun. Evaluations that hold the scene sun use the first,
/// those that hold the scene view use the second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InSitu {
    /// Sun zenith of the sun-fixed measurements (degrees)
    pub solar_zenith: f64,
    /// View zenith of the view-fixed measurements (degrees)
    pub view_zenith: f64,
    pub sun_fixed: AngularTable,
    pub view_fixed: AngularTable,
    pub albedo: f64,
}

/// Angular distance (degrees) under which a zenith counts as the fixed one.
const FIXED_TOLERANCE: f64 = 1e-6;

fn ascending(axis: &[f64]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1])
}

/// Index of the lower node of the bracket containing `x`, clamped to the
/// edge intervals, with the interpolation weight.
fn bracket(axis: &[f64], x: f64) -> (usize, f64) {
    let i = axis
        .iter()
        .position(|v| x < *v)
        .unwrap_or(axis.len() - 1)
        .clamp(1, axis.len() - 1)
        - 1;
    let t = ((x - axis[i]) / (axis[i + 1] - axis[i])).clamp(0.0, 1.0);
    (i, t)
}

fn zenith_deg(mu: f64) -> f64 {
    mu.clamp(-1.0, 1.0).acos().to_degrees()
}

impl AngularTable {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let err = |msg: String| Err(ConfigError::Surface(format!("in_situ {}: {}", name, msg)));
        if self.zenith.len() < 2 || self.azimuth.len() < 2 {
            return err("at least two zenith and two azimuth nodes are required".into());
        }
        if !ascending(&self.zenith) || !ascending(&self.azimuth) {
            return err("zenith and azimuth nodes must be strictly ascending".into());
        }
        if self.values.len() != self.zenith.len()
            || self.values.iter().any(|row| row.len() != self.azimuth.len())
        {
            return err(format!(
                "expected {} rows of {} values",
                self.zenith.len(),
                self.azimuth.len()
            ));
        }
        if self.values.iter().flatten().any(|v| !v.is_finite() || *v < 0.0) {
            return err("reflectance values must be finite and non-negative".into());
        }
        Ok(())
    }

    /// Bilinear value at zenith `theta` and azimuth `phi` (degrees).
    fn interpolate(&self, theta: f64, phi: f64) -> f64 {
        let az = phi.rem_euclid(360.0);
        let (i, ti) = bracket(&self.zenith, theta);
        let (j, tj) = bracket(&self.azimuth, az);
        let v = &self.values;
        (1.0 - ti) * ((1.0 - tj) * v[i][j] + tj * v[i][j + 1])
            + ti * ((1.0 - tj) * v[i + 1][j] + tj * v[i + 1][j + 1])
    }
}

impl InSitu {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, angle) in [("solar zenith", self.solar_zenith), ("view zenith", self.view_zenith)] {
            if !(0.0..90.0).contains(&angle) {
                return Err(ConfigError::Surface(format!(
                    "in_situ: {} must lie in [0, 90), got {}",
                    name, angle
                )));
            }
        }
        self.sun_fixed.validate("sun_fixed")?;
        self.view_fixed.validate("view_fixed")?;
        if !(0.0..=1.0).contains(&self.albedo) {
            return Err(ConfigError::Surface(format!(
                "in_situ: albedo must lie in [0, 1], got {}",
                self.albedo
            )));
        }
        Ok(())
    }
}

impl Brdf for InSitu {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (theta_s, theta_v) = (zenith_deg(mu_s), zenith_deg(mu_v));
        let az = phi.to_degrees();
        let sun_offset = (theta_s - self.solar_zenith).abs();
        let view_offset = (theta_v - self.view_zenith).abs();
        // away from both fixed angles, the closer table is used
        if sun_offset <= FIXED_TOLERANCE || sun_offset <= view_offset {
            self.sun_fixed.interpolate(theta_v, az)
        } else {
            self.view_fixed.interpolate(theta_s, az)
        }
    }

    fn albedo(&self, _mu_s: f64) -> f64 {
        self.albedo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(values: Vec<Vec<f64>>) -> AngularTable {
        AngularTable {
            zenith: vec![0.0, 30.0, 60.0],
            azimuth: vec![0.0, 180.0, 360.0],
            values,
        }
    }

    fn table() -> InSitu {
        InSitu {
            solar_zenith: 30.0,
            view_zenith: 10.0,
            sun_fixed: grid(vec![vec![0.1, 0.1, 0.1], vec![0.2, 0.1, 0.2], vec![0.3, 0.1, 0.3]]),
            view_fixed: grid(vec![vec![0.05, 0.05, 0.05], vec![0.15, 0.05, 0.15], vec![0.25, 0.05, 0.25]]),
            albedo: 0.15,
        }
    }

    fn mu(deg: f64) -> f64 {
        deg.to_radians().cos()
    }

    #[test]
    fn test_bilinear_interpolation() {
        let t = table();
        let v = t.reflectance(mu(30.0), mu(15.0), 90f64.to_radians());
        // midway between 0.1 and the row mean 0.15
        assert!((v - 0.125).abs() < 1e-6, "Expected 0.125, got {:.4}", v);
        assert!((t.reflectance(mu(30.0), 1.0, 0.0) - 0.1).abs() < 1e-9);
        assert_eq!(t.albedo(0.3), 0.15);
    }

    #[test]
    fn test_view_fixed_table_follows_incidence() {
        let t = table();
        let mu_v = mu(10.0);
        // sky directions seen from the scene view
        let low = t.reflectance(mu(15.0), mu_v, 90f64.to_radians());
        let high = t.reflectance(mu(60.0), mu_v, 0.0);
        assert!((low - 0.075).abs() < 1e-6, "Expected 0.075, got {:.4}", low);
        assert!((high - 0.25).abs() < 1e-6, "Expected 0.25, got {:.4}", high);
        // the scene sun still reads the sun-fixed table
        let obs = t.reflectance(mu(30.0), mu_v, 0.0);
        let expected = 0.1 + (0.2 - 0.1) * 10.0 / 30.0;
        assert!((obs - expected).abs() < 1e-6, "Expected {:.4}, got {:.4}", expected, obs);
    }

    #[test]
    fn test_validation() {
        assert!(table().validate().is_ok());
        let mut ragged = table();
        ragged.sun_fixed.values[1].pop();
        assert!(ragged.validate().is_err());
        let mut ragged_view = table();
        ragged_view.view_fixed.values.pop();
        assert!(ragged_view.validate().is_err());
        let mut unsorted = table();
        unsorted.view_fixed.zenith = vec![0.0, 60.0, 30.0];
        assert!(unsorted.validate().is_err());
        let mut negative = table();
        negative.sun_fixed.values[0][0] = -0.1;
        assert!(negative.validate().is_err());
        let mut grazing = table();
        grazing.solar_zenith = 90.0;
        assert!(grazing.validate().is_err());
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "kind": "in_situ",
            "solar_zenith": 30.0,
            "view_zenith": 10.0,
            "sun_fixed": {"zenith": [0, 60], "azimuth": [0, 360], "values": [[0.1, 0.1], [0.2, 0.2]]},
            "view_fixed": {"zenith": [0, 60], "azimuth": [0, 360], "values": [[0.1, 0.1], [0.3, 0.3]]},
            "albedo": 0.12
        }"#;
        let model: crate::brdf::SurfaceModel = serde_json::from_str(json).unwrap();
        assert!(model.validate().is_ok());
        let r = model.at(0.55).reflectance(mu(60.0), mu(10.0), 0.0);
        assert!((r - 0.3).abs() < 1e-9, "Expected 0.3, got {:.4}", r);
    }
}
