use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::sos::Stokes;

/// Top-of-atmosphere path reflectance of one view zenith angle, sampled
/// at relative azimuths spaced by steps of scattering angle.
#[derive(Debug, Clone, PartialEq)]
pub struct LutRow {
    /// View zenith angle (degrees)
    pub view_zenith: f64,
    /// Relative azimuths (degrees), ascending from 0 to 180
    pub azimuths: Vec<f64>,
    pub values: Vec<Stokes>,
}

/// Angular look-up table for a fixed sun, aerosol model and loading.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularLut {
    /// Wavelength limits (µm)
    pub range: (f64, f64),
    /// Aerosol optical depth over the band
    pub tau_band: f64,
    pub tau550: f64,
    pub aerosol: String,
    /// Solar zenith angle (degrees)
    pub solar_zenith: f64,
    /// Rows sorted by view zenith
    pub rows: Vec<LutRow>,
}

/// Lower index of the bracket holding `target` and the weight of the
/// upper node. Targets outside the axis clamp to the nearest edge.
fn get_indice(axis: &[f64], target: f64) -> (usize, f64) {
    if axis.len() < 2 || target <= axis[0] {
        return (0, 0.0);
    }
    let last = axis.len() - 1;
    if target >= axis[last] {
        return (last - 1, 1.0);
    }
    let mut idx = 0;
    for i in 0..last {
        if target >= axis[i] && target < axis[i + 1] {
            idx = i;
            break;
        }
    }
    let rr = (target - axis[idx]) / (axis[idx + 1] - axis[idx]);
    (idx, rr)
}

impl LutRow {
    fn scattering_range(&self, mu_s: f64) -> (f64, f64) {
        let mu_v = self.view_zenith.to_radians().cos();
        let sin = (1.0 - mu_s * mu_s).max(0.0).sqrt() * (1.0 - mu_v * mu_v).max(0.0).sqrt();
        let angle = |phi: f64| {
            (-mu_s * mu_v - phi.to_radians().cos() * sin)
                .clamp(-1.0, 1.0)
                .acos()
                .to_degrees()
        };
        let first = self.azimuths.first().copied().unwrap_or(0.0);
        let last = self.azimuths.last().copied().unwrap_or(180.0);
        (angle(first), angle(last))
    }

    fn at(&self, phi: f64) -> Stokes {
        match self.values.len() {
            0 => Stokes::default(),
            1 => self.values[0],
            _ => {
                let (j, r) = get_indice(&self.azimuths, phi);
                self.values[j] * (1.0 - r) + self.values[j + 1] * r
            }
        }
    }
}

impl AngularLut {
    /// Writes the table as text: a three-line header followed, for each
    /// view direction, by a line `θs θv n scattering-max scattering-min`
    /// and a line of `n` reflectances.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "AERO-LUT Lambda min,max {:10.7} {:10.7}", self.range.0, self.range.1)?;
        writeln!(
            out,
            "Tau-Lambda,Tau550 asol {:10.7} {:10.7} {:10.7}",
            self.tau_band, self.tau550, self.solar_zenith
        )?;
        writeln!(out, "aerosol model {}", self.aerosol.to_uppercase())?;

        let mu_s = self.solar_zenith.to_radians().cos();
        for row in &self.rows {
            let (scamax, scamin) = row.scattering_range(mu_s);
            writeln!(
                out,
                "{:10.5} {:10.5} {:3}{:10.5}{:10.5}",
                self.solar_zenith,
                row.view_zenith,
                row.values.len(),
                scamax,
                scamin
            )?;
            let line: Vec<String> = row.values.iter().map(|v| format!("{:8.5}", v.i)).collect();
            writeln!(out, "{}", line.join(" "))?;
        }
        out.flush()?;
        info!("Look-up table written to {}", path.display());
        Ok(())
    }

    /// Bilinear lookup at view zenith `view_zenith` and relative azimuth
    /// `phi` (degrees). Azimuths fold onto [0, 180] by symmetry.
    pub fn interpolate(&self, view_zenith: f64, phi: f64) -> Stokes {
        if self.rows.is_empty() {
            return Stokes::default();
        }
        let phi = phi.rem_euclid(360.0);
        let phi = if phi > 180.0 { 360.0 - phi } else { phi };
        let zeniths: Vec<f64> = self.rows.iter().map(|r| r.view_zenith).collect();
        if zeniths.len() == 1 {
            return self.rows[0].at(phi);
        }
        let (i, r) = get_indice(&zeniths, view_zenith);
        self.rows[i].at(phi) * (1.0 - r) + self.rows[i + 1].at(phi) * r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn lut() -> AngularLut {
        let row = |vz: f64, base: f64| LutRow {
            view_zenith: vz,
            azimuths: vec![0.0, 90.0, 180.0],
            values: vec![
                Stokes::new(base, 0.0, 0.0),
                Stokes::new(base + 0.01, 0.001, 0.0),
                Stokes::new(base + 0.02, 0.002, 0.0),
            ],
        };
        AngularLut {
            range: (0.5, 0.6),
            tau_band: 0.21,
            tau550: 0.23,
            aerosol: "continental".into(),
            solar_zenith: 30.0,
            rows: vec![row(0.0, 0.10), row(40.0, 0.14)],
        }
    }

    #[test]
    fn test_get_indice() {
        let axis = [0.0, 10.0, 30.0];
        assert_eq!(get_indice(&axis, -5.0), (0, 0.0));
        assert_eq!(get_indice(&axis, 40.0), (1, 1.0));
        let (i, r) = get_indice(&axis, 20.0);
        assert_eq!(i, 1);
        assert!((r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_lookup() {
        let t = lut();
        let v = t.interpolate(20.0, 45.0);
        assert!((v.i - 0.125).abs() < 1e-12, "Expected 0.125, got {:.4}", v.i);
        // azimuths beyond 180° mirror
        let a = t.interpolate(10.0, 300.0);
        let b = t.interpolate(10.0, 60.0);
        assert!((a.i - b.i).abs() < 1e-12);
        // nodes are reproduced exactly
        assert!((t.interpolate(40.0, 180.0).i - 0.16).abs() < 1e-12);
    }

    #[test]
    fn test_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotoa.txt");
        lut().write(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3 + 2 * 2);
        assert!(lines[0].starts_with("AERO-LUT Lambda min,max"));
        assert!(lines[2].ends_with("CONTINENTAL"));
        let values: Vec<f64> = lines[4]
            .split_whitespace()
            .map(|v| v.parse().unwrap())
            .collect();
        assert_eq!(values, vec![0.1, 0.11, 0.12]);
        let header: Vec<&str> = lines[5].split_whitespace().collect();
        assert_eq!(header[2], "3");
    }
}
