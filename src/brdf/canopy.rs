//! Turbid-medium vegetation canopies over a Lambertian soil.
//!
//! Both models share the same single-scattering core: leaf normals follow
//! a leaf angle distribution, leaves are bi-Lambertian, and the hot spot
//! reduces the attenuation of light scattered back along the incident
//! path. Multiple scattering in the canopy is solved as an
//! azimuthally-averaged isotropic problem and added as a Lambertian term.

use std::f64::consts::PI;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use super::Brdf;
use super::water::fresnel;
use crate::quadrature::gauss;

const NODES: usize = 20;
const MS_LAYERS: usize = 20;
const MS_MAX_ORDERS: usize = 50;
const MS_TOLERANCE: f64 = 1e-6;
/// Smallest sine of the specular leaf inclination.
const MIN_SIN_NORMAL: f64 = 0.02;

struct CanopyNodes {
    theta: Vec<f64>,
    theta_weights: Vec<f64>,
    phi: Vec<f64>,
    phi_weights: Vec<f64>,
    mu: Vec<f64>,
    mu_weights: Vec<f64>,
}

static CANOPY_NODES: LazyLock<CanopyNodes> = LazyLock::new(|| {
    let (theta, theta_weights) = gauss(0.0, 0.5 * PI, NODES).unwrap_or_default();
    let (phi, phi_weights) = gauss(0.0, 2.0 * PI, NODES).unwrap_or_default();
    let (mu, mu_weights) = gauss(-1.0, 1.0, NODES).unwrap_or_default();
    CanopyNodes {
        theta,
        theta_weights,
        phi,
        phi_weights,
        mu,
        mu_weights,
    }
});

/// Classic leaf angle distributions of de Wit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeafAngle {
    Planophile,
    Erectophile,
    Plagiophile,
    Extremophile,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Distribution {
    Classic(LeafAngle),
    /// Elliptical distribution with its normalization constant
    Elliptical {
        eccentricity: f64,
        mode: f64,
        norm: f64,
    },
}

impl Distribution {
    fn elliptical(eccentricity: f64, mode: f64) -> Self {
        let raw = Distribution::Elliptical {
            eccentricity,
            mode,
            norm: 1.0,
        };
        let nodes = &*CANOPY_NODES;
        let total: f64 = nodes
            .theta
            .iter()
            .zip(&nodes.theta_weights)
            .map(|(t, w)| w * raw.density(*t))
            .sum();
        Distribution::Elliptical {
            eccentricity,
            mode,
            norm: if total > 0.0 { 1.0 / total } else { 1.0 },
        }
    }

    /// Density of leaf inclinations, normalized over [0, π/2].
    fn density(&self, theta: f64) -> f64 {
        let two_pi = 2.0 / PI;
        match self {
            Distribution::Classic(LeafAngle::Planophile) => two_pi * (1.0 + (2.0 * theta).cos()),
            Distribution::Classic(LeafAngle::Erectophile) => two_pi * (1.0 - (2.0 * theta).cos()),
            Distribution::Classic(LeafAngle::Plagiophile) => two_pi * (1.0 - (4.0 * theta).cos()),
            Distribution::Classic(LeafAngle::Extremophile) => two_pi * (1.0 + (4.0 * theta).cos()),
            Distribution::Classic(LeafAngle::Uniform) => theta.sin(),
            Distribution::Elliptical {
                eccentricity,
                mode,
                norm,
            } => {
                let c = (theta - mode).cos();
                norm / (1.0 - eccentricity * eccentricity * c * c).sqrt()
            }
        }
    }
}

/// Mean projection of leaves with inclination `theta_l` on a plane
/// normal to a direction of cosine `mu`.
fn projection(mu: f64, theta_l: f64) -> f64 {
    let (sl, cl) = theta_l.sin_cos();
    let s = (1.0 - mu * mu).max(0.0).sqrt();
    if s < 1e-9 || sl < 1e-9 {
        return (mu * cl).abs();
    }
    let cot = (mu / s) * (cl / sl);
    if cot.abs() > 1.0 {
        (mu * cl).abs()
    } else {
        let pt = (-cot).acos();
        (mu * cl * (2.0 * pt / PI - 1.0) + 2.0 / PI * s * sl * pt.sin()).abs()
    }
}

/// Hot-spot correction of the exit attenuation at cumulative leaf area
/// `l` for a correlation length `li`.
fn hot_spot(l: f64, li: f64) -> f64 {
    let a = 4.0 / 3.0 / PI;
    if l < li {
        (1.0 - a) / li * l
    } else {
        1.0 - a * li / l
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Shared canopy description.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Canopy {
    distribution: Distribution,
    lai: f64,
    rl: f64,
    tl: f64,
    rs: f64,
    /// Leaf size over canopy height
    hot_spot: f64,
    clumping: f64,
    multiple_scattering: bool,
}

/// Sun propagation and view directions for a sun at azimuth 0.
fn directions(mu_s: f64, mu_v: f64, phi: f64) -> ([f64; 3], [f64; 3]) {
    let (ss, sv) = ((1.0 - mu_s * mu_s).max(0.0).sqrt(), (1.0 - mu_v * mu_v).max(0.0).sqrt());
    ([-ss, 0.0, -mu_s], [sv * phi.cos(), sv * phi.sin(), mu_v])
}

impl Canopy {
    /// Leaf projection function G(μ).
    fn g(&self, mu: f64) -> f64 {
        let nodes = &*CANOPY_NODES;
        nodes
            .theta
            .iter()
            .zip(&nodes.theta_weights)
            .map(|(t, w)| w * self.distribution.density(*t) * projection(mu, *t))
            .sum()
    }

    /// Area scattering phase function of bi-Lambertian leaves, scaled by π.
    fn gamma(&self, incident: [f64; 3], exit: [f64; 3]) -> f64 {
        let nodes = &*CANOPY_NODES;
        let mut sum = 0.0;
        for (&t, &wt) in nodes.theta.iter().zip(&nodes.theta_weights) {
            let gl = self.distribution.density(t);
            let (st, ct) = t.sin_cos();
            for (&p, &wp) in nodes.phi.iter().zip(&nodes.phi_weights) {
                let normal = [st * p.cos(), st * p.sin(), ct];
                let dp = dot(incident, normal);
                let dpp = dot(exit, normal);
                let leaf = if dp * dpp < 0.0 { self.rl } else { self.tl };
                sum += wt * wp * gl * leaf * dp.abs() / PI * dpp.abs();
            }
        }
        0.5 * sum
    }

    /// Bidirectional gap probability integrated over the canopy depth and
    /// the gap to the soil.
    fn gaps(&self, mu_s: f64, mu_v: f64, phi: f64) -> (f64, f64) {
        let ki = self.clumping * self.g(mu_s) / mu_s;
        let ke = self.clumping * self.g(mu_v) / mu_v.max(1e-5);
        let ts = (1.0 - mu_s * mu_s).max(0.0).sqrt() / mu_s;
        let tv = (1.0 - mu_v * mu_v).max(0.0).sqrt() / mu_v.max(1e-5);
        let geo = (ts * ts + tv * tv - 2.0 * ts * tv * phi.cos()).max(0.0).sqrt().max(1e-35);
        let li = self.hot_spot / geo;

        let (x, w) = gauss(0.0, self.lai, NODES).unwrap_or_default();
        let canopy = x
            .iter()
            .zip(&w)
            .map(|(l, wl)| {
                let tau = (ki + ke * hot_spot(*l, li)) * l;
                if tau <= 20.0 { wl * (-tau).exp() } else { 0.0 }
            })
            .sum();
        let tau = (ki + ke * hot_spot(self.lai, li)) * self.lai;
        let soil = if tau <= 20.0 { (-tau).exp() } else { 0.0 };
        (canopy, soil)
    }

    fn single(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (incident, exit) = directions(mu_s, mu_v, phi);
        let (canopy, soil) = self.gaps(mu_s, mu_v, phi);
        let mu_v = mu_v.max(1e-5);
        self.clumping * self.gamma(incident, exit) / (mu_s * mu_v) * canopy + self.rs * soil
    }

    /// Multiply scattered reflectance, isotropic in the view direction.
    fn multiple(&self, mu_s: f64) -> f64 {
        if !self.multiple_scattering {
            return 0.0;
        }
        let nodes = &*CANOPY_NODES;
        let dl = self.lai / MS_LAYERS as f64;
        let omega = self.rl + self.tl;
        let gi = self.clumping * self.g(mu_s);
        let ki = gi / mu_s;
        let gj: Vec<f64> = nodes.mu.iter().map(|m| self.clumping * self.g(m.abs())).collect();
        let trans: Vec<f64> = nodes
            .mu
            .iter()
            .zip(&gj)
            .map(|(m, g)| (-g * dl / m.abs()).exp())
            .collect();

        // field[k][j]: radiance at level k (0 at the top) in stream j
        let sweep = |sources: &[f64], bottom: f64| -> Vec<Vec<f64>> {
            let mut field = vec![vec![0.0; NODES]; MS_LAYERS + 1];
            for (j, &m) in nodes.mu.iter().enumerate() {
                let equilibrium = |k: usize| if gj[j] > 0.0 { sources[k] / gj[j] } else { 0.0 };
                if m < 0.0 {
                    for k in 0..MS_LAYERS {
                        field[k + 1][j] = field[k][j] * trans[j] + equilibrium(k) * (1.0 - trans[j]);
                    }
                } else {
                    field[MS_LAYERS][j] = bottom;
                    for k in (0..MS_LAYERS).rev() {
                        field[k][j] = field[k + 1][j] * trans[j] + equilibrium(k) * (1.0 - trans[j]);
                    }
                }
            }
            field
        };
        let flux = |radiance: &[f64], upward: bool| -> f64 {
            2.0 * PI
                * nodes
                    .mu
                    .iter()
                    .zip(&nodes.mu_weights)
                    .zip(radiance)
                    .filter(|((m, _), _)| (**m > 0.0) == upward)
                    .map(|((m, w), r)| w * m.abs() * r)
                    .sum::<f64>()
        };

        let first: Vec<f64> = (0..MS_LAYERS)
            .map(|k| {
                let l = (k as f64 + 0.5) * dl;
                omega * gi * (-ki * l).exp() / (4.0 * PI)
            })
            .collect();
        let direct_bottom = mu_s * (-ki * self.lai).exp();
        let mut field = sweep(&first, self.rs / PI * direct_bottom);

        let mut total = 0.0;
        for _ in 1..MS_MAX_ORDERS {
            let sources: Vec<f64> = (0..MS_LAYERS)
                .map(|k| {
                    let intercepted: f64 = (0..NODES)
                        .map(|j| nodes.mu_weights[j] * gj[j] * 0.5 * (field[k][j] + field[k + 1][j]))
                        .sum();
                    omega / (4.0 * PI) * 2.0 * PI * intercepted
                })
                .collect();
            let bottom = self.rs / PI * flux(&field[MS_LAYERS], false);
            field = sweep(&sources, bottom);
            let up = flux(&field[0], true);
            total += up;
            if up < MS_TOLERANCE * mu_s {
                break;
            }
        }
        total / mu_s
    }
}

/// Iaquinta and Pinty canopy model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IaquintaPinty {
    canopy: Canopy,
}

impl IaquintaPinty {
    pub fn new(
        leaf_angle: LeafAngle,
        lai: f64,
        leaf_reflectance: f64,
        leaf_transmittance: f64,
        soil_reflectance: f64,
        hot_spot: f64,
        multiple_scattering: bool,
    ) -> Self {
        Self {
            canopy: Canopy {
                distribution: Distribution::Classic(leaf_angle),
                lai,
                rl: leaf_reflectance,
                tl: leaf_transmittance,
                rs: soil_reflectance,
                hot_spot,
                clumping: 1.0,
                multiple_scattering,
            },
        }
    }
}

impl Brdf for IaquintaPinty {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        self.canopy.single(mu_s, mu_v, phi) + self.canopy.multiple(mu_s)
    }

    fn albedo(&self, mu_s: f64) -> f64 {
        let single = SingleOnly(&self.canopy).albedo(mu_s);
        single + self.canopy.multiple(mu_s)
    }
}

/// Kuusk's canopy model in a reduced form: elliptical leaf angles, Markov
/// clumping and specular reflection on the leaf wax, with multiple
/// scattering always included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kuusk {
    canopy: Canopy,
    refractive_index: f64,
    wax: f64,
}

impl Kuusk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lai: f64,
        leaf_reflectance: f64,
        leaf_transmittance: f64,
        eccentricity: f64,
        mean_leaf_angle: f64,
        leaf_size: f64,
        clumping: f64,
        refractive_index: f64,
        wax: f64,
        soil_reflectance: f64,
    ) -> Self {
        Self {
            canopy: Canopy {
                distribution: Distribution::elliptical(eccentricity, mean_leaf_angle.to_radians()),
                lai,
                rl: leaf_reflectance,
                tl: leaf_transmittance,
                rs: soil_reflectance,
                hot_spot: leaf_size,
                clumping,
                multiple_scattering: true,
            },
            refractive_index,
            wax,
        }
    }

    /// Specular reflection on leaves oriented along the bisector of the
    /// sun and view directions.
    fn specular(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        let (incident, exit) = directions(mu_s, mu_v, phi);
        let h = [exit[0] - incident[0], exit[1] - incident[1], exit[2] - incident[2]];
        let norm = dot(h, h).sqrt();
        if norm < 1e-12 {
            return 0.0;
        }
        let h = [h[0] / norm, h[1] / norm, h[2] / norm];
        let theta_n = h[2].clamp(-1.0, 1.0).acos();
        let cos_alpha = -dot(incident, h);
        if cos_alpha <= 0.0 {
            return 0.0;
        }
        let tan_alpha = (1.0 - cos_alpha * cos_alpha).max(0.0).sqrt() / cos_alpha;
        let density = self.canopy.distribution.density(theta_n) / theta_n.sin().max(MIN_SIN_NORMAL);
        let (f, _, _) = fresnel(self.refractive_index, 0.0, cos_alpha);
        let (canopy, _) = self.canopy.gaps(mu_s, mu_v, phi);
        self.canopy.clumping * density * f * (-self.wax * tan_alpha).exp() / (8.0 * mu_s * mu_v.max(1e-5))
            * canopy
    }
}

impl Brdf for Kuusk {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        self.canopy.single(mu_s, mu_v, phi) + self.specular(mu_s, mu_v, phi) + self.canopy.multiple(mu_s)
    }

    fn albedo(&self, mu_s: f64) -> f64 {
        let directional = KuuskDirectional(self).albedo(mu_s);
        directional + self.canopy.multiple(mu_s)
    }
}

/// Single-scattering part of a canopy, integrated by the default albedo.
struct SingleOnly<'a>(&'a Canopy);

impl Brdf for SingleOnly<'_> {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        self.0.single(mu_s, mu_v, phi)
    }
}

struct KuuskDirectional<'a>(&'a Kuusk);

impl Brdf for KuuskDirectional<'_> {
    fn reflectance(&self, mu_s: f64, mu_v: f64, phi: f64) -> f64 {
        self.0.canopy.single(mu_s, mu_v, phi) + self.0.specular(mu_s, mu_v, phi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canopy(leaf_angle: LeafAngle) -> Canopy {
        Canopy {
            distribution: Distribution::Classic(leaf_angle),
            lai: 3.0,
            rl: 0.45,
            tl: 0.45,
            rs: 0.1,
            hot_spot: 0.1,
            clumping: 1.0,
            multiple_scattering: true,
        }
    }

    #[test]
    fn test_leaf_angle_distributions_are_normalized() {
        let nodes = &*CANOPY_NODES;
        let mut all: Vec<Distribution> = [
            LeafAngle::Planophile,
            LeafAngle::Erectophile,
            LeafAngle::Plagiophile,
            LeafAngle::Extremophile,
            LeafAngle::Uniform,
        ]
        .into_iter()
        .map(Distribution::Classic)
        .collect();
        all.push(Distribution::elliptical(0.8, 0.6));
        for d in all {
            let total: f64 = nodes
                .theta
                .iter()
                .zip(&nodes.theta_weights)
                .map(|(t, w)| w * d.density(*t))
                .sum();
            assert!((total - 1.0).abs() < 1e-6, "{:?} integrates to {:.6}", d, total);
        }
    }

    #[test]
    fn test_spherical_canopy_projection_is_half() {
        let c = canopy(LeafAngle::Uniform);
        for mu in [0.1, 0.5, 0.9, 1.0] {
            let g = c.g(mu);
            assert!((g - 0.5).abs() < 3e-3, "Expected G = 0.5 at μ = {}, got {:.4}", mu, g);
        }
    }

    #[test]
    fn test_hot_spot_brightens_backscatter() {
        let c = canopy(LeafAngle::Uniform);
        let hot = c.single(0.8, 0.8, 0.0);
        let near = c.single(0.8, 0.8, 0.5);
        assert!(hot > near, "Expected a hot spot: {:.4} vs {:.4}", hot, near);
    }

    #[test]
    fn test_multiple_scattering_adds_reflectance() {
        let c = canopy(LeafAngle::Planophile);
        let m = c.multiple(0.8);
        assert!(m > 0.0 && m < 1.0, "got {:.4}", m);
        let dark = Canopy {
            rl: 0.0,
            tl: 0.0,
            rs: 0.0,
            ..c
        };
        assert_eq!(dark.multiple(0.8), 0.0);
    }

    #[test]
    fn test_kuusk_has_specular_component() {
        let k = Kuusk::new(3.0, 0.05, 0.05, 0.9, 20.0, 0.1, 0.9, 1.5, 0.0, 0.1);
        let mu = 40f64.to_radians().cos();
        let forward = k.specular(mu, mu, PI);
        assert!(forward > 0.0);
        let a = k.albedo(mu);
        assert!(a > 0.0 && a < 1.0, "got {:.4}", a);
    }
}
