//! Successive orders of scattering for the solar radiance field.
//!
//! Each azimuthal Fourier order is solved independently: the primary
//! source is integrated through the layers, then orders of scattering are
//! added until they become negligible or a geometric series can be summed
//! in closed form. Fourier orders are accumulated until the last one no
//! longer changes the field.

use std::f64::consts::PI;
use std::ops::{Add, AddAssign, Mul};

use log::debug;
use serde::{Deserialize, Serialize};

use super::kernel::Kernel;
use super::layers::{Layering, THIN_DEPTH};
use crate::atmosphere::rayleigh::{self, RayleighCoefficients};
use crate::phase::LegendreSeries;
use crate::quadrature::{AngularGrid, Symmetric};

/// Highest order of scattering computed explicitly.
pub const MAX_ORDERS: usize = 20;
/// Number of relative azimuths (0..=180°) of the sensor-level field.
pub const PLANE_AZIMUTHS: usize = 181;
/// Scattering-angle step (degrees) of the look-up-table azimuths.
pub const LUT_SCATTERING_STEP: f64 = 4.0;

pub(crate) const TINY: f64 = 1e-20;
const SOURCE_FLOOR: f64 = 1e-30;

/// Stokes parameters of a radiance or reflectance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stokes {
    pub i: f64,
    pub q: f64,
    pub u: f64,
}

impl Stokes {
    pub fn new(i: f64, q: f64, u: f64) -> Self {
        Self { i, q, u }
    }

    /// Polarized fraction `sqrt(Q² + U²) / I`.
    pub fn degree_of_polarization(&self) -> f64 {
        if self.i.abs() < TINY {
            return 0.0;
        }
        self.q.hypot(self.u) / self.i
    }

    /// Orientation of the polarization plane (degrees).
    pub fn plane_angle(&self) -> f64 {
        if self.q == 0.0 && self.u == 0.0 {
            return 0.0;
        }
        0.5 * self.u.atan2(self.q).to_degrees()
    }
}

impl Add for Stokes {
    type Output = Stokes;

    fn add(self, o: Stokes) -> Stokes {
        Stokes::new(self.i + o.i, self.q + o.q, self.u + o.u)
    }
}

impl AddAssign for Stokes {
    fn add_assign(&mut self, o: Stokes) {
        *self = *self + o;
    }
}

impl Mul<f64> for Stokes {
    type Output = Stokes;

    fn mul(self, f: f64) -> Stokes {
        Stokes::new(self.i * f, self.q * f, self.u * f)
    }
}

/// Convergence settings of the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Geometric extrapolation is used below this stability measure
    pub acceleration: f64,
    /// An order contributing less than this fraction ends the series
    pub order: f64,
    /// A Fourier term contributing less than this fraction ends the sum
    pub fourier: f64,
}

impl Thresholds {
    pub const SCALAR: Thresholds = Thresholds {
        acceleration: 1e-4,
        order: 1e-5,
        fourier: 1e-3,
    };
    pub const POLARIZED: Thresholds = Thresholds {
        acceleration: 0.01,
        order: 1e-8,
        fourier: 5e-4,
    };
}

/// One Stokes component on every level: `field[level][stream]`.
pub(crate) type LevelField = Vec<Symmetric<f64>>;

pub(crate) fn level_field(nt: usize, mu: usize) -> LevelField {
    vec![Symmetric::filled(mu, 0.0); nt + 1]
}

/// Integrates a source linear in optical depth through every layer.
///
/// Upward streams start from zero at the ground, downward streams from
/// zero at the top. With `prune`, values below [`TINY`] are flushed.
pub(crate) fn integrate(
    layering: &Layering,
    grid: &AngularGrid,
    source: &LevelField,
    out: &mut LevelField,
    prune: bool,
) {
    let nt = layering.nt();
    let h = &layering.h;
    let mu = grid.mu() as isize;
    let flush = |z: f64| if prune && z.abs() <= TINY { 0.0 } else { z };

    for k in 1..=mu {
        let yy = grid.rm(k);
        let mut zi = 0.0;
        out[nt][k] = 0.0;
        for i in (0..nt).rev() {
            let jj = i + 1;
            let f = h[jj] - h[i];
            if f > 0.0 {
                let c = (-f / yy).exp();
                let d = 1.0 - c;
                let xx = h[i] - h[jj] * c;
                let a = (source[jj][k] - source[i][k]) / f;
                let b = source[i][k] - a * h[i];
                zi = flush(c * zi + (d * (b + a * yy) + a * xx) * 0.5);
            }
            out[i][k] = zi;
        }
    }
    for k in -mu..=-1 {
        let yy = grid.rm(k);
        let mut zi = 0.0;
        out[0][k] = 0.0;
        for i in 1..=nt {
            let jj = i - 1;
            let f = h[i] - h[jj];
            if f > 0.0 {
                let c = (f / yy).exp();
                let d = 1.0 - c;
                let xx = h[i] - h[jj] * c;
                let a = (source[i][k] - source[jj][k]) / f;
                let b = source[i][k] - a * h[i];
                zi = flush(c * zi + (d * (b + a * yy) + a * xx) * 0.5);
            }
            out[i][k] = zi;
        }
    }
}

/// Emergent radiance of one order: upward at the top, downward at the
/// ground.
pub(crate) fn emergent(field: &LevelField, nt: usize) -> Symmetric<f64> {
    let mu = field[0].half();
    let mut out = Symmetric::filled(mu, 0.0);
    for k in 1..=mu as isize {
        out[k] = field[0][k];
        out[-k] = field[nt][-k];
    }
    out
}

fn floor(v: f64) -> f64 {
    if v.abs() < SOURCE_FLOOR { 0.0 } else { v }
}

/// Scattering source of the next order from the radiance of the current
/// one, for Fourier order `m`.
pub(crate) fn scatter(
    m: usize,
    kernel: &Kernel,
    layering: &Layering,
    grid: &AngularGrid,
    ray: &RayleighCoefficients,
    field: &[LevelField],
    source: &mut [LevelField],
) {
    let mu = grid.mu() as isize;
    let polarized = field.len() == 3 && kernel.is_polarized();
    let rayleigh_order = m <= 2;
    let beta0 = if m == 0 { 1.0 } else { 0.0 };
    let (beta2, gamma2, alpha2) = (ray.beta2, ray.gamma2, ray.alpha2);
    let (xpl, xrl, xtl) = (&kernel.xpl, &kernel.xrl, &kernel.xtl);

    for k in 1..=mu {
        let (xpk, xrk, xtk) = (xpl[k], xrl[k], xtl[k]);
        let (ypk, yrk, ytk) = (xpl[-k], xrl[-k], xtl[-k]);
        let ku = k as usize;
        for i in 0..=layering.nt() {
            let x = layering.xdel[i];
            let y = if rayleigh_order { layering.ydel[i] } else { 0.0 };
            let (mut ii1, mut ii2) = (0.0, 0.0);
            let (mut qq1, mut qq2, mut uu1, mut uu2) = (0.0, 0.0, 0.0, 0.0);
            for j in 1..mu {
                let z = grid.gb(j);
                let ju = j as usize;
                let (xpj, xrj, xtj) = (xpl[j], xrl[j], xtl[j]);
                let (xi1, xi2) = (field[0][i][j], field[0][i][-j]);
                let bpjk = kernel.bp(ju, k) * x + y * (beta0 + beta2 * xpj * xpk);
                let bpjmk = kernel.bp(ju, -k) * x + y * (beta0 + beta2 * xpj * ypk);
                if !polarized {
                    ii2 += z * (xi1 * bpjk + xi2 * bpjmk);
                    ii1 += z * (xi1 * bpjmk + xi2 * bpjk);
                    continue;
                }
                let (yrj, ytj) = (xrl[-j], xtl[-j]);
                let (xq1, xq2) = (field[1][i][j], field[1][i][-j]);
                let (xu1, xu2) = (field[2][i][j], field[2][i][-j]);

                let gtjk = kernel.gt(ju, k) * x + y * gamma2 * xpj * xtk;
                let gtjmk = kernel.gt(ju, -k) * x + y * gamma2 * xpj * ytk;
                let gtkj = kernel.gt(ku, j) * x + y * gamma2 * xpk * xtj;
                let gtkmj = kernel.gt(ku, -j) * x + y * gamma2 * xpk * ytj;
                let grjk = kernel.gr(ju, k) * x + y * gamma2 * xpj * xrk;
                let grjmk = kernel.gr(ju, -k) * x + y * gamma2 * xpj * yrk;
                let grkj = kernel.gr(ku, j) * x + y * gamma2 * xpk * xrj;
                let grkmj = kernel.gr(ku, -j) * x + y * gamma2 * xpk * yrj;
                let arrjk = kernel.arr(ju, k) * x + y * alpha2 * xrj * xrk;
                let arrjmk = kernel.arr(ju, -k) * x + y * alpha2 * xrj * yrk;
                let artjk = kernel.art(ju, k) * x + y * alpha2 * xtj * xrk;
                let artjmk = kernel.art(ju, -k) * x + y * alpha2 * xtj * yrk;
                let artkj = kernel.art(ku, j) * x + y * alpha2 * xtk * xrj;
                let artkmj = kernel.art(ku, -j) * x + y * alpha2 * xtk * yrj;
                let attjk = kernel.att(ju, k) * x + y * alpha2 * xtj * xtk;
                let attjmk = kernel.att(ju, -k) * x + y * alpha2 * xtj * ytk;

                ii2 += z * (xi1 * bpjk + xi2 * bpjmk + xq1 * grkj + xq2 * grkmj
                    - xu1 * gtkj
                    - xu2 * gtkmj);
                ii1 += z * (xi1 * bpjmk + xi2 * bpjk + xq1 * grkmj + xq2 * grkj
                    + xu1 * gtkmj
                    + xu2 * gtkj);
                qq2 += z * (xi1 * grjk + xi2 * grjmk + xq1 * arrjk + xq2 * arrjmk - xu1 * artjk
                    + xu2 * artjmk);
                qq1 += z * (xi1 * grjmk + xi2 * grjk + xq1 * arrjmk + xq2 * arrjk - xu1 * artjmk
                    + xu2 * artjk);
                uu2 -= z * (xi1 * gtjk - xi2 * gtjmk + xq1 * artkj + xq2 * artkmj
                    - xu1 * attjk
                    - xu2 * attjmk);
                uu1 -= z * (xi1 * gtjmk - xi2 * gtjk - xq1 * artkmj - xq2 * artkj
                    - xu1 * attjmk
                    - xu2 * attjk);
            }
            source[0][i][k] = floor(ii2);
            source[0][i][-k] = floor(ii1);
            if polarized {
                source[1][i][k] = floor(qq2);
                source[1][i][-k] = floor(qq1);
                source[2][i][k] = floor(uu2);
                source[2][i][-k] = floor(uu1);
            }
        }
    }
}

/// Running sum of the orders of one Stokes component, with the two
/// previous orders kept for the geometric extrapolation.
#[derive(Debug, Clone)]
pub(crate) struct OrderSum {
    pub total: Symmetric<f64>,
    prev: Symmetric<f64>,
    prev2: Symmetric<f64>,
    pub plane_total: f64,
    plane_prev: f64,
    plane_prev2: f64,
}

fn geometric_ratio(a: f64, d: f64, g: f64, total: f64) -> f64 {
    ((g / d - d / a) / (1.0 - g / d).powi(2) * (g / total)).abs()
}

impl OrderSum {
    /// Starts the sum with the first order.
    pub fn new(first: Symmetric<f64>, plane: f64) -> Self {
        Self {
            total: first.clone(),
            prev: first.clone(),
            prev2: first,
            plane_total: plane,
            plane_prev: 0.0,
            plane_prev2: plane,
        }
    }

    /// Largest variation of the order-to-order ratio.
    pub fn instability(&self, cur: &Symmetric<f64>, plane: f64) -> f64 {
        let mut z: f64 = 0.0;
        let (a, d) = (self.plane_prev2, self.plane_prev);
        if a.abs() >= TINY && d.abs() >= TINY && self.plane_total.abs() >= TINY {
            z = z.max(geometric_ratio(a, d, plane, self.plane_total));
        }
        for (l, g) in cur.iter() {
            if l == 0 {
                continue;
            }
            let (a, d, t) = (self.prev2[l], self.prev[l], self.total[l]);
            if a.abs() <= TINY || d.abs() <= TINY || t.abs() <= TINY {
                continue;
            }
            z = z.max(geometric_ratio(a, d, *g, t));
        }
        z
    }

    /// Adds the remaining orders as a geometric series of ratio `g/d`.
    pub fn extrapolate(&mut self, cur: &Symmetric<f64>, plane: f64) {
        for (l, g) in cur.iter() {
            let d = self.prev[l];
            if l == 0 || d.abs() <= TINY || (g - d).abs() <= TINY {
                continue;
            }
            self.total[l] += g / (1.0 - g / d);
        }
        let d = self.plane_prev;
        if d.abs() >= TINY {
            let g = if (plane - d).abs() >= TINY {
                plane / (1.0 - plane / d)
            } else {
                plane
            };
            self.plane_total += g;
        }
    }

    /// Adds order `cur` to the sum.
    pub fn push(&mut self, cur: Symmetric<f64>, plane: f64, shift: bool) {
        if shift {
            std::mem::swap(&mut self.prev2, &mut self.prev);
            self.plane_prev2 = self.plane_prev;
        }
        for (l, v) in cur.iter() {
            self.total[l] += v;
        }
        self.prev = cur;
        self.plane_total += plane;
        self.plane_prev = plane;
    }

    /// Largest relative contribution of the last order pushed.
    pub fn last_change(&self) -> f64 {
        self.prev
            .iter()
            .filter(|(l, _)| self.total[*l].abs() >= TINY)
            .map(|(l, v)| (v / self.total[l]).abs())
            .fold(0.0, f64::max)
    }
}

/// Inputs of a radiance solve.
#[derive(Debug, Clone, Copy)]
pub struct Problem<'a> {
    pub grid: &'a AngularGrid,
    pub layering: &'a Layering,
    /// Truncated aerosol expansion
    pub series: &'a LegendreSeries,
    /// Relative azimuth of the observer (radians)
    pub phi: f64,
    pub polarized: bool,
    /// Aerosol depth of the column, used to skip high Fourier orders
    pub tau_a: f64,
}

/// Radiance field produced by [`solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct RadianceField {
    /// `streams[l][m]`: upward radiance at the top (`m > 0`) or downward
    /// radiance at the ground (`m < 0`) in stream `m` at azimuth `rp(l)`
    pub streams: Vec<Symmetric<Stokes>>,
    /// Upward radiance at the top of the column in the observer direction
    pub toa: Stokes,
    /// Upward radiance at the sensor level in the observer direction
    pub plane: Stokes,
    /// Diffuse downward flux at the ground divided by π
    pub ground_flux: Stokes,
    /// Sensor-level radiance at relative azimuths 0..=180°
    pub plane_azimuths: Vec<f64>,
    /// Look-up-table azimuths (degrees) for each upward stream `1..=mu`
    pub lut_azimuths: Vec<Vec<f64>>,
    /// Top-of-column radiance at [`lut_azimuths`](Self::lut_azimuths)
    pub lut: Vec<Vec<Stokes>>,
}

/// Relative azimuths (degrees) at which the look-up table is sampled for
/// each upward stream, spaced by steps of 4° in scattering angle.
pub fn lut_azimuths(grid: &AngularGrid) -> Vec<Vec<f64>> {
    let mu_s = grid.mu_s();
    let ts = mu_s.acos().to_degrees();
    (1..=grid.mu() as isize)
        .map(|i| {
            let mu_v = grid.rm(i);
            let tv = mu_v.acos().to_degrees();
            let scamax = 180.0 - (tv - ts).abs();
            let scamin = 180.0 - (tv + ts);
            let n = (((scamax - scamin) / LUT_SCATTERING_STEP) as usize + 1).max(2);
            let sin = (1.0 - mu_s * mu_s).max(0.0).sqrt() * (1.0 - mu_v * mu_v).max(0.0).sqrt();
            let mut fi = vec![0.0; n];
            fi[n - 1] = 180.0;
            let mut sca = scamax;
            for slot in fi.iter_mut().take(n - 1).skip(1) {
                sca -= LUT_SCATTERING_STEP;
                *slot = if sin < 1e-9 {
                    0.0
                } else {
                    let cfi = -(sca.to_radians().cos() + mu_s * mu_v) / sin;
                    cfi.clamp(-1.0, 1.0).acos().to_degrees()
                };
            }
            fi
        })
        .collect()
}

/// Wraps an azimuth to `[0, 2π)`.
pub fn wrap_azimuth(phi: f64) -> f64 {
    phi.rem_euclid(2.0 * PI)
}

/// Solves the radiance field for a unit solar flux.
///
/// Radiances are normalized so that dividing by `μs` gives a reflectance.
pub fn solve(problem: &Problem) -> RadianceField {
    let Problem { grid, layering, series, phi, polarized, tau_a } = *problem;
    let thresholds = if polarized {
        Thresholds::POLARIZED
    } else {
        Thresholds::SCALAR
    };
    let ncomp = if polarized { 3 } else { 1 };
    let mu = grid.mu();
    let mui = mu as isize;
    let nt = layering.nt();
    let iplane = layering.iplane;
    let phi = wrap_azimuth(phi);
    let ray = rayleigh::coefficients();

    let lut_azimuths = lut_azimuths(grid);
    let mut out = RadianceField {
        streams: vec![Symmetric::filled(mu, Stokes::default()); grid.azimuths().len()],
        toa: Stokes::default(),
        plane: Stokes::default(),
        ground_flux: Stokes::default(),
        plane_azimuths: vec![0.0; PLANE_AZIMUTHS],
        lut: lut_azimuths.iter().map(|f| vec![Stokes::default(); f.len()]).collect(),
        lut_azimuths,
    };

    let iborm = if (grid.mu_s() - 1.0).abs() < 1e-6 {
        0
    } else if tau_a <= THIN_DEPTH {
        2
    } else {
        series.max_order().max(2)
    };

    let mut field: Vec<LevelField> = (0..ncomp).map(|_| level_field(nt, mu)).collect();
    let mut source: Vec<LevelField> = (0..ncomp).map(|_| level_field(nt, mu)).collect();
    let mut i4: Vec<Symmetric<f64>> = (0..ncomp).map(|_| Symmetric::filled(mu, 0.0)).collect();

    for is in 0..=iborm {
        let kernel = Kernel::build(is, grid, series, polarized);
        let beta0 = if is == 0 { 1.0 } else { 0.0 };
        let spl = kernel.xpl[0];

        // primary scattering of the attenuated solar beam
        for j in -mui..=mui {
            let (sa1, sb1, sc1) = if is <= 2 {
                (
                    beta0 + ray.beta2 * kernel.xpl[j] * spl,
                    ray.gamma2 * kernel.xrl[j] * spl,
                    ray.gamma2 * kernel.xtl[j] * spl,
                )
            } else {
                (0.0, 0.0, 0.0)
            };
            let sa2 = kernel.bp(0, j);
            let (sb2, sc2) = if polarized {
                (kernel.gr(0, j), kernel.gt(0, j))
            } else {
                (0.0, 0.0)
            };
            for k in 0..=nt {
                let (c, a, b) = (layering.ch[k], layering.ydel[k], layering.xdel[k]);
                source[0][k][j] = c * (sa2 * b + sa1 * a);
                if polarized {
                    source[1][k][j] = c * (sb2 * b + sb1 * a);
                    source[2][k][j] = -c * (sc2 * b + sc1 * a);
                }
            }
        }
        for c in 0..ncomp {
            integrate(layering, grid, &source[c], &mut field[c], false);
        }

        let mut sums: Vec<OrderSum> = field
            .iter()
            .map(|f| OrderSum::new(emergent(f, nt), f[iplane][mui]))
            .collect();

        let mut ig = 1;
        loop {
            ig += 1;
            scatter(is, &kernel, layering, grid, &ray, &field, &mut source);
            for c in 0..ncomp {
                integrate(layering, grid, &source[c], &mut field[c], true);
            }
            let current: Vec<(Symmetric<f64>, f64)> = field
                .iter()
                .map(|f| (emergent(f, nt), f[iplane][mui]))
                .collect();

            if ig > 2 {
                let z = sums
                    .iter()
                    .zip(&current)
                    .map(|(s, (cur, plane))| s.instability(cur, *plane))
                    .fold(0.0, f64::max);
                if z < thresholds.acceleration {
                    for (s, (cur, plane)) in sums.iter_mut().zip(&current) {
                        s.extrapolate(cur, *plane);
                    }
                    break;
                }
            }
            let mut change: f64 = 0.0;
            for (s, (cur, plane)) in sums.iter_mut().zip(current) {
                s.push(cur, plane, ig > 2);
                change = change.max(s.last_change());
            }
            if change < thresholds.order || ig > MAX_ORDERS {
                break;
            }
        }

        let delta0s = if is == 0 { 1.0 } else { 2.0 };
        let isf = is as f64;
        let stokes = |k: isize| -> Stokes {
            Stokes::new(
                sums[0].total[k],
                sums.get(1).map_or(0.0, |s| s.total[k]),
                sums.get(2).map_or(0.0, |s| s.total[k]),
            )
        };
        let plane_total = Stokes::new(
            sums[0].plane_total,
            sums.get(1).map_or(0.0, |s| s.plane_total),
            sums.get(2).map_or(0.0, |s| s.plane_total),
        );
        let rotate = |s: Stokes, angle: f64| -> Stokes {
            Stokes::new(
                delta0s * s.i * (isf * angle).cos(),
                delta0s * s.q * (isf * angle).cos(),
                delta0s * s.u * (isf * angle).sin(),
            )
        };

        for (s, sum) in i4.iter_mut().zip(&sums) {
            for (l, v) in sum.total.iter() {
                s[l] += (delta0s * v).abs();
            }
        }
        for (l, &rp) in grid.azimuths().iter().enumerate() {
            for m in -(mui - 1)..=(mui - 1) {
                let angle = if m > 0 { rp + PI } else { rp };
                out.streams[l][m] += rotate(stokes(m), angle);
            }
        }
        for (m, (azimuths, values)) in out.lut_azimuths.iter().zip(out.lut.iter_mut()).enumerate() {
            let s = stokes(m as isize + 1);
            for (fi, v) in azimuths.iter().zip(values.iter_mut()) {
                *v += rotate(s, fi.to_radians() + PI);
            }
        }
        if is == 0 {
            for k in 1..mui {
                out.ground_flux += stokes(-k) * (grid.rm(k) * grid.gb(k));
            }
        }
        out.toa += rotate(stokes(mui), phi + PI);
        out.plane += rotate(plane_total, phi + PI);
        for (ifi, v) in out.plane_azimuths.iter_mut().enumerate() {
            let angle = (ifi as f64).to_radians() + PI;
            *v += delta0s * plane_total.i * (isf * angle).cos();
        }

        let mut z: f64 = 0.0;
        for (s, sum) in i4.iter().zip(&sums) {
            for (l, v) in sum.total.iter() {
                if s[l].abs() >= TINY {
                    z = z.max((delta0s * v / s[l]).abs());
                }
            }
        }
        if z <= thresholds.fourier {
            debug!("Fourier series converged after order {}", is);
            break;
        }
    }
    out
}
