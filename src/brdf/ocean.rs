//! Wind-roughened ocean: sun glint, whitecaps and the water body.

use std::f64::consts::PI;

use super::{Brdf, HEMISPHERE};
use super::water::{fresnel, refractive_index, water_body_reflectance};

/// Effective reflectance of whitecaps.
const FOAM_REFLECTANCE: f64 = 0.22;
/// Internal reflection coefficient of upwelling light at the surface.
const INTERNAL_REFLECTION: f64 = 0.485;

/// Ocean surface at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ocean {
    pub wind_speed: f64,
    /// Wind azimuth (radians)
    pub wind_azimuth: f64,
    /// Refractive index of sea water
    pub n: f64,
    pub k: f64,
    /// Irradiance reflectance just below the surface
    pub water_body: f64,
}

/// Glint frame quantities of one geometry.
struct Facet {
    /// Slope distribution density
    probability: f64,
    /// Cosine of the reflection angle on the facet
    cos_chi: f64,
    /// Cosine of the facet tilt
    cos_tilt: f64,
}

impl Ocean {
    pub fn new(wind_speed: f64, wind_azimuth_deg: f64, salinity: f64, pigment: f64, wl: f64) -> Self {
        let (n, k) = refractive_index(wl, salinity);
        Self {
            wind_speed,
            wind_azimuth: wind_azimuth_deg.to_radians(),
            n,
            k,
            water_body: water_body_reflectance(wl, pigment),
        }
    }

    /// Fraction of the surface covered by whitecaps.
    pub fn foam_coverage(&self) -> f64 {
        2.95e-6 * self.wind_speed.powf(3.52)
    }

    fn foam(&self) -> f64 {
        self.foam_coverage() * FOAM_REFLECTANCE
    }

    /// Gram-Charlier slope distribution of the facet reflecting the sun
    /// toward the sensor.
    fn facet(&self, mu_s: f64, mu_v: f64, phi: f64) -> Facet {
        let ws = self.wind_speed;
        let (ss, sv) = ((1.0 - mu_s * mu_s).max(0.0).sqrt(), (1.0 - mu_v * mu_v).max(0.0).sqrt());
        let zx = -sv * phi.sin() / (mu_s + mu_v);
        let zy = (ss + sv * phi.cos()) / (mu_s + mu_v);
        let tilt = zx.hypot(zy).atan();

        let sigma_c = 0.003 + 0.00192 * ws;
        let sigma_u = (0.00316 * ws).max(1e-6);
        let c21 = 0.01 - 0.0086 * ws;
        let c03 = 0.04 - 0.033 * ws;
        let (c40, c22, c04) = (0.40, 0.12, 0.23);

        let (sw, cw) = self.wind_azimuth.sin_cos();
        let xe = (cw * zx + sw * zy) / sigma_c.sqrt();
        let xn = (-sw * zx + cw * zy) / sigma_u.sqrt();
        let (xe2, xn2) = (xe * xe, xn * xn);
        let coef = 1.0 - c21 / 2.0 * (xe2 - 1.0) * xn - c03 / 6.0 * (xn2 - 3.0) * xn
            + c40 / 24.0 * (xe2 * xe2 - 6.0 * xe2 + 3.0)
            + c04 / 24.0 * (xn2 * xn2 - 6.0 * xn2 + 3.0)
            + c22 / 4.0 * (xe2 - 1.0) * (xn2 - 1.0);
        let probability = coef / 2.0 / PI / sigma_u.sqrt() / sigma_c.sqrt() * (-(xe2 + xn2) / 2.0).exp();

        let cos2chi = (mu_v * mu_s + sv * ss * phi.cos()).clamp(-0.99999999999, 0.99999999999);
        Facet {
            probability: probability.max(0.0),
            cos_chi: (0.5 * (1.0 + cos2chi)).sqrt(),
            cos_tilt: tilt.cos(),
        }
    }

    /// Glint reflectance with its perpendicular and parallel parts.
    fn glint(&self, mu_s: f64, mu_v: f64, phi: f64) -> (f64, f64, f64) {
        let facet = self.facet(mu_s, mu_v, phi);
        let (r, rs, rp) = fresnel(self.n, self.k, facet.cos_chi);
        let scale = PI * facet.probability / 4.0 / mu_s / mu_v / facet.cos_tilt.powi(4);
        (r * scale, rs * scale, rp * scale)
    }

    /// Light leaving the water body toward the sensor.
    fn water_leaving(&self, mu_s: f64, mu_v: f64) -> f64 {
        if self.water_body <= 0.0 {
            return 0.0;
        }
        let tds = 1.0 - fresnel(self.n, self.k, mu_s).0;
        let tdv = 1.0 - fresnel(self.n, self.k, mu_v).0;
        tds * tdv * self.water_body / (self.n * self.n) / (1.0 - INTERNAL_REFLECTION * self.water_body)
    }
}

impl Brdf for Ocean {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let w = self.foam_coverage();
        let rwc = self.foam();
        let (glint, _, _) = self.glint(mu_s, mu_v, phi);
        rwc + (1.0 - w) * glint + (1.0 - rwc) * self.water_leaving(mu_s, mu_v)
    }

    /// The glint albedo of a rough surface is close to the Fresnel
    /// reflectance at the incidence angle, which a coarse hemispherical
    /// quadrature of the glint peak cannot resolve.
    fn albedo(&self, mu_s: f64) -> f64 {
        let w = self.foam_coverage();
        let rwc = self.foam();
        let glint = fresnel(self.n, self.k, mu_s).0;
        // the water-leaving term is isotropic in azimuth
        let h = &*HEMISPHERE;
        let body: f64 = h
            .mu
            .iter()
            .zip(&h.mu_weights)
            .map(|(&mu, &wm)| 2.0 * mu * wm * self.water_leaving(mu_s, mu))
            .sum();
        rwc + (1.0 - w) * glint + (1.0 - rwc) * body
    }

    /// Fresnel polarization of the glint, rotated from the reflection
    /// plane into the meridian plane of the view.
    fn polarized(&self, mu_s: f64, mu_v: f64, phi: f64) -> Option<(f64, f64)> {
        let (_, rs, rp) = self.glint(mu_s, mu_v, phi);
        let w = self.foam_coverage();
        let q_local = (1.0 - w) * 0.5 * (rp - rs);

        let (ss, sv) = ((1.0 - mu_s * mu_s).max(0.0).sqrt(), (1.0 - mu_v * mu_v).max(0.0).sqrt());
        // propagation of the solar beam and of the reflected light
        let incident = [-ss, 0.0, -mu_s];
        let exit = [sv * phi.cos(), sv * phi.sin(), mu_v];
        let plane = normalized(cross(incident, exit));
        let meridian = normalized(cross([0.0, 0.0, 1.0], exit));
        let (Some(plane), Some(meridian)) = (plane, meridian) else {
            return Some((q_local, 0.0));
        };
        let cos_psi = dot(plane, meridian);
        let sin_psi = dot(cross(meridian, plane), exit);
        let (cos2, sin2) = (cos_psi * cos_psi - sin_psi * sin_psi, 2.0 * sin_psi * cos_psi);
        Some((q_local * cos2, q_local * sin2))
    }
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn normalized(a: [f64; 3]) -> Option<[f64; 3]> {
    let n = dot(a, a).sqrt();
    (n > 1e-12).then(|| [a[0] / n, a[1] / n, a[2] / n])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ocean(wind: f64) -> Ocean {
        Ocean::new(wind, 0.0, 34.3, 0.3, 0.55)
    }

    #[test]
    fn test_glint_peaks_in_specular_direction() {
        let o = ocean(5.0);
        let mu = 30f64.to_radians().cos();
        // φ = π puts the sensor opposite the sun: specular geometry
        let specular = o.reflectance(mu, mu, PI);
        let backward = o.reflectance(mu, mu, 0.0);
        assert!(specular > 10.0 * backward, "Expected a glint: {:.4} vs {:.4}", specular, backward);
    }

    #[test]
    fn test_foam_coverage_grows_with_wind() {
        assert_eq!(ocean(0.0).foam_coverage(), 0.0);
        let w = ocean(10.0).foam_coverage();
        assert!((w - 2.95e-6 * 10f64.powf(3.52)).abs() < 1e-12);
        assert!(ocean(15.0).foam_coverage() > w);
    }

    #[test]
    fn test_glint_is_polarized_perpendicular() {
        let o = ocean(3.0);
        let mu = 50f64.to_radians().cos();
        let (q, u) = o.polarized(mu, mu, PI).unwrap();
        let i = o.reflectance(mu, mu, PI);
        assert!(q.hypot(u) > 0.05 * i, "Expected polarized glint, got q = {:.4}, u = {:.4}", q, u);
    }

    #[test]
    fn test_albedo_is_small() {
        let a = ocean(7.0).albedo(0.8);
        assert!(a > 0.02 && a < 0.1, "got {:.4}", a);
    }

    #[test]
    fn test_albedo_water_body_term() {
        let o = Ocean {
            wind_speed: 5.0,
            wind_azimuth: 0.0,
            n: 1.34,
            k: 0.0,
            water_body: 0.08,
        };
        let dark = Ocean { water_body: 0.0, ..o };
        let mu_s = 0.8;
        let body = o.albedo(mu_s) - dark.albedo(mu_s);

        let (mu, wm) = crate::quadrature::gauss(0.0, 1.0, 48).unwrap();
        let expected: f64 = (1.0 - o.foam())
            * mu.iter()
                .zip(&wm)
                .map(|(&m, &w)| 2.0 * m * w * o.water_leaving(mu_s, m))
                .sum::<f64>();
        assert!(
            ((body - expected) / expected).abs() < 1e-4,
            "Expected {:.6}, got {:.6}",
            expected,
            body
        );
        // the exit through the surface divides the radiance by n²
        let bound = (1.0 - fresnel(1.34, 0.0, mu_s).0) * 0.08 / (1.34 * 1.34) / (1.0 - 0.485 * 0.08);
        assert!(body < bound, "Expected below {:.4}, got {:.4}", bound, body);
    }
}
