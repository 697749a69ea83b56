//! Transmittance and spherical albedo from a unit isotropic source at the
//! ground.
//!
//! By reciprocity the upward radiance reaching the top in direction μ is
//! the total (direct + diffuse) transmittance of the column for a beam
//! entering at μ, and the diffuse flux sent back to the ground gives the
//! spherical albedo.

use super::kernel::Kernel;
use super::layers::Layering;
use super::radiance::{MAX_ORDERS, OrderSum, Thresholds, emergent, integrate, level_field, scatter};
use crate::atmosphere::rayleigh;
use crate::phase::LegendreSeries;
use crate::quadrature::AngularGrid;

/// Plane tolerance used when inserting the sensor level for this solve.
pub const PLANE_TOLERANCE: f64 = 0.005;

/// Output of [`solve`] for the direction held in the observer slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transmittance {
    /// Total transmittance of the whole column
    pub top: f64,
    /// Total transmittance between the ground and the sensor level
    pub plane: f64,
    /// Spherical albedo of the column
    pub spherical_albedo: f64,
}

/// Solves the isotropic-source problem on `grid`; the direction of
/// interest is the observer slot of the grid.
pub fn solve(grid: &AngularGrid, layering: &Layering, series: &LegendreSeries) -> Transmittance {
    let thresholds = Thresholds::SCALAR;
    let mu = grid.mu();
    let mui = mu as isize;
    let nt = layering.nt();
    let iplane = layering.iplane;
    let depth = layering.depth();
    let ray = rayleigh::coefficients();
    let kernel = Kernel::build(0, grid, series, false);

    let mut field = vec![level_field(nt, mu)];
    let mut source = vec![level_field(nt, mu)];
    for k in 1..=mui {
        let yy = grid.rm(k);
        field[0][nt][k] = 1.0;
        for i in (0..nt).rev() {
            field[0][i][k] = (-(depth - layering.h[i]) / yy).exp();
        }
    }

    let mut sum = OrderSum::new(emergent(&field[0], nt), field[0][iplane][mui]);
    let mut ig = 1;
    loop {
        ig += 1;
        scatter(0, &kernel, layering, grid, &ray, &field, &mut source);
        integrate(layering, grid, &source[0], &mut field[0], false);
        let cur = emergent(&field[0], nt);
        let plane = field[0][iplane][mui];

        if ig > 2 && sum.instability(&cur, plane) < thresholds.acceleration {
            sum.extrapolate(&cur, plane);
            break;
        }
        sum.push(cur, plane, ig > 2);
        if sum.last_change() < thresholds.order || ig > MAX_ORDERS {
            break;
        }
    }

    let flux: f64 = (1..mui).map(|k| grid.rm(k) * grid.gb(k) * sum.total[-k]).sum();
    Transmittance {
        top: sum.total[mui],
        plane: sum.plane_total,
        spherical_albedo: 2.0 * flux,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sos::layers::{Column, DEFAULT_LAYERS, SensorLevel};

    fn rayleigh_layering(tau: f64, mu_s: f64) -> Layering {
        let column = Column {
            tau_r: tau,
            tau_a: 0.0,
            omega_a: 0.0,
            sensor: SensorLevel::Satellite,
            profile: None,
        };
        Layering::build(&column, mu_s, DEFAULT_LAYERS, PLANE_TOLERANCE)
    }

    #[test]
    fn test_transmittance_exceeds_direct_beam() {
        let mu_v = 0.7;
        let tau = 0.2;
        let grid = AngularGrid::standard(0.8, mu_v).unwrap();
        let layering = rayleigh_layering(tau, 0.8);
        let t = solve(&grid, &layering, &LegendreSeries::zeros(3));
        let direct = (-tau / mu_v).exp();
        assert!(t.top > direct, "Expected > {:.4}, got {:.4}", direct, t.top);
        assert!(t.top < 1.0);
        assert!((t.plane - t.top).abs() < 1e-12);
    }

    #[test]
    fn test_spherical_albedo_of_thin_rayleigh() {
        // for a thin conservative layer s ≈ τ
        let tau = 0.01;
        let grid = AngularGrid::standard(0.8, 0.7).unwrap();
        let layering = rayleigh_layering(tau, 0.8);
        let t = solve(&grid, &layering, &LegendreSeries::zeros(3));
        assert!(
            (t.spherical_albedo - tau).abs() < 0.2 * tau,
            "Expected ~{:.4}, got {:.5}",
            tau,
            t.spherical_albedo
        );
    }

    #[test]
    fn test_energy_conservation() {
        // a conservative atmosphere transmits what it does not reflect
        let tau = 0.3;
        let mu_v = 0.6;
        let grid = AngularGrid::standard(0.8, mu_v).unwrap();
        let layering = rayleigh_layering(tau, 0.8);
        let t = solve(&grid, &layering, &LegendreSeries::zeros(3));
        assert!(t.top > 0.7 && t.top < 0.95, "got {:.4}", t.top);
        assert!(t.spherical_albedo > 0.1 && t.spherical_albedo < 0.3);
    }
}
