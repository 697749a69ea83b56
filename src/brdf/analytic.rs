//! Closed-form reflectance models.

use std::f64::consts::PI;

use super::Brdf;

fn sin_of(mu: f64) -> f64 {
    (1.0 - mu * mu).max(0.0).sqrt()
}

fn tan_of(mu: f64) -> f64 {
    sin_of(mu) / mu.max(1e-9)
}

/// Cosine of the phase angle between the directions to the sun and to
/// the sensor.
fn cos_phase(mu_s: f64, mu_v: f64, phi: f64) -> f64 {
    (mu_s * mu_v + sin_of(mu_s) * sin_of(mu_v) * phi.cos()).clamp(-1.0, 1.0)
}

/// Horizontal distance between the sun and view directions projected on
/// a unit-height plane.
fn geometric_distance(mu_s: f64, mu_v: f64, phi: f64) -> f64 {
    let (ts, tv) = (tan_of(mu_s), tan_of(mu_v));
    (ts * ts + tv * tv - 2.0 * ts * tv * phi.cos()).max(0.0).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lambertian {
    pub reflectance: f64,
}

impl Brdf for Lambertian {
    fn reflectance(&self, _mu_s: f64, _mu_v: f64, _phi: f64) -> f64 {
        self.reflectance
    }

    fn albedo(&self, _mu_s: f64) -> f64 {
        self.reflectance
    }
}

/// Hapke's model with a Henyey-Greenstein particle phase function and an
/// opposition surge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hapke {
    /// Single-scattering albedo
    pub om: f64,
    /// Asymmetry parameter
    pub af: f64,
    /// Amplitude of the hot spot
    pub s0: f64,
    /// Angular width of the hot spot
    pub h: f64,
}

impl Hapke {
    fn chandrasekhar(&self, x: f64) -> f64 {
        (1.0 + 2.0 * x) / (1.0 + 2.0 * (1.0 - self.om).sqrt() * x)
    }
}

impl Brdf for Hapke {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let cg = cos_phase(mu_s, mu_v, phi);
        let g = cg.acos();
        let af = self.af;
        let phase = (1.0 - af * af) / (1.0 + af * af + 2.0 * af * cg).powf(1.5);
        let surge = self.s0 / (1.0 + (0.5 * g).tan() / self.h);
        let f = self.om / 4.0 / (mu_s + mu_v);
        f * ((1.0 + surge) * phase + self.chandrasekhar(mu_s) * self.chandrasekhar(mu_v) - 1.0)
    }
}

/// Roujean's kernel-driven model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roujean {
    pub k0: f64,
    pub k1: f64,
    pub k2: f64,
}

impl Brdf for Roujean {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (ts, tv) = (tan_of(mu_s), tan_of(mu_v));
        let fi = phi.rem_euclid(2.0 * PI);
        let fi = if fi > PI { 2.0 * PI - fi } else { fi };
        let delta = geometric_distance(mu_s, mu_v, phi);
        let f1 = 0.5 / PI * ((PI - fi) * fi.cos() + fi.sin()) * ts * tv - (ts + tv + delta) / PI;
        let xi = cos_phase(mu_s, mu_v, phi).acos();
        let f2 = 4.0 / (3.0 * PI) / (mu_s + mu_v) * ((0.5 * PI - xi) * xi.cos() + xi.sin()) - 1.0 / 3.0;
        self.k0 + self.k1 * f1 + self.k2 * f2
    }
}

/// Walthall's empirical polynomial in the zenith angles (radians).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Walthall {
    pub a: f64,
    pub ap: f64,
    pub b: f64,
    pub c: f64,
}

impl Brdf for Walthall {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (ts, tv) = (mu_s.acos(), mu_v.acos());
        self.a * ts * ts * tv * tv + self.ap * (ts * ts + tv * tv) + self.b * ts * tv * phi.cos() + self.c
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minnaert {
    pub k: f64,
    pub b: f64,
}

impl Brdf for Minnaert {
    fn reflectance(&self, mu_s: f64, mu_v: f64, _phi: f64) -> f64 {
        0.5 * (self.k + 1.0) * self.b * (mu_s * mu_v).powf(self.k - 1.0)
    }
}

/// Rahman-Pinty-Verstraete model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rahman {
    /// Intensity of the reflectance
    pub rho0: f64,
    /// Asymmetry factor
    pub af: f64,
    /// Structural parameter
    pub k: f64,
}

impl Brdf for Rahman {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let coef1 = (mu_s * mu_v * (mu_s + mu_v)).powf(self.k - 1.0);
        let cospha = cos_phase(mu_s, mu_v, phi);
        let af = self.af;
        let coef2 = (1.0 - af * af) / (1.0 + af * af - 2.0 * af * cospha).powf(1.5);
        let coef3 = 1.0 + (1.0 - self.rho0) / (1.0 + geometric_distance(mu_s, mu_v, phi));
        self.rho0 * coef1 * coef2 * coef3
    }
}

/// Ross-Thick Li-Sparse-Reciprocal kernels (h/b = 2, b/r = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RossLi {
    /// Isotropic weight
    pub p1: f64,
    /// Volumetric weight
    pub p2: f64,
    /// Geometric weight
    pub p3: f64,
}

impl RossLi {
    const HB: f64 = 2.0;

    pub fn volumetric(mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let cx = cos_phase(mu_s, mu_v, phi);
        let xi = cx.acos();
        ((0.5 * PI - xi) * cx + xi.sin()) / (mu_s + mu_v) - 0.25 * PI
    }

    pub fn geometric(mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (ts, tv) = (tan_of(mu_s), tan_of(mu_v));
        let (sec_s, sec_v) = (1.0 / mu_s.max(1e-9), 1.0 / mu_v.max(1e-9));
        let d = geometric_distance(mu_s, mu_v, phi);
        let cross = ts * tv * phi.sin();
        let cost = (Self::HB * (d * d + cross * cross).sqrt() / (sec_s + sec_v)).clamp(-1.0, 1.0);
        let t = cost.acos();
        let overlap = (t - t.sin() * cost) * (sec_s + sec_v) / PI;
        let cx = cos_phase(mu_s, mu_v, phi);
        overlap - sec_s - sec_v + 0.5 * (1.0 + cx) * sec_s * sec_v
    }
}

impl Brdf for RossLi {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        self.p1 + self.p2 * Self::volumetric(mu_s, mu_v, phi) + self.p3 * Self::geometric(mu_s, mu_v, phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hapke_isotropic_limit() {
        // conservative isotropic scatterers reflect nearly all light
        let hapke = Hapke {
            om: 1.0,
            af: 0.0,
            s0: 0.0,
            h: 0.1,
        };
        for mu_s in [0.3, 0.5, 0.8, 1.0] {
            let a = hapke.albedo(mu_s);
            assert!((a - 1.0).abs() < 0.06, "Expected ~1 at μs = {}, got {:.4}", mu_s, a);
        }
        // and the reflectance has no azimuthal dependence
        let r0 = hapke.reflectance(0.7, 0.6, 0.0);
        let r1 = hapke.reflectance(0.7, 0.6, 2.0);
        assert!((r0 - r1).abs() < 1e-12);
    }

    #[test]
    fn test_hapke_hot_spot() {
        let hapke = Hapke {
            om: 0.5,
            af: 0.0,
            s0: 0.8,
            h: 0.05,
        };
        let hot = hapke.reflectance(0.8, 0.8, 0.0);
        let away = hapke.reflectance(0.8, 0.8, PI);
        assert!(hot > away, "Expected a hot spot: {:.4} vs {:.4}", hot, away);
    }

    #[test]
    fn test_ross_li_kernels_at_nadir() {
        // both kernels vanish for nadir sun and view
        assert!(RossLi::volumetric(1.0, 1.0, 0.0).abs() < 1e-9);
        assert!(RossLi::geometric(1.0, 1.0, 0.0).abs() < 1e-9);
        let model = RossLi {
            p1: 0.2,
            p2: 0.1,
            p3: 0.05,
        };
        assert!((model.reflectance(1.0, 1.0, 0.0) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_minnaert_albedo() {
        let m = Minnaert { k: 1.5, b: 0.4 };
        // albedo(μs) = b μs^(k-1)
        let a = m.albedo(0.64);
        assert!((a - 0.4 * 0.8).abs() < 1e-4, "got {:.6}", a);
    }

    #[test]
    fn test_roujean_reduces_to_k0_at_nadir() {
        let r = Roujean {
            k0: 0.1,
            k1: 0.05,
            k2: 0.3,
        };
        let v = r.reflectance(1.0, 1.0, 0.0);
        // f1 = 0 and f2 = 4/(3π)·(π/2)/2 - 1/3 = 0 at nadir
        assert!((v - 0.1).abs() < 1e-9, "got {:.6}", v);
    }
}
