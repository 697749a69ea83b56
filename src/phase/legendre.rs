//! Legendre-type functions used to expand phase matrices.
//!
//! All functions return a vector indexed by degree `l = 0..=lmax`; entries
//! below the lowest admissible degree are zero.

/// Normalized associated Legendre functions
/// `sqrt((l-m)!/(l+m)!) P_l^m(x)`, without the Condon-Shortley phase.
///
/// For `m = 0` these are the ordinary Legendre polynomials.
pub fn associated(m: usize, lmax: usize, x: f64) -> Vec<f64> {
    let mut psl = vec![0.0; lmax + 1];
    if m > lmax {
        return psl;
    }
    let mut a = 1.0;
    for i in 1..=m {
        a *= (((i + m) as f64) / i as f64).sqrt() * 0.5;
    }
    let s = (1.0 - x * x).max(0.0).sqrt();
    psl[m] = a * s.powi(m as i32);

    let mf = m as f64;
    for l in m..lmax {
        let lf = l as f64;
        let prev = if l > m { psl[l - 1] } else { 0.0 };
        let back = (lf * lf - mf * mf).max(0.0).sqrt();
        let norm = ((lf + 1.0) * (lf + 1.0) - mf * mf).sqrt();
        psl[l + 1] = ((2.0 * lf + 1.0) * x * psl[l] - back * prev) / norm;
    }
    psl
}

/// Starting value `P^{l0}_{m,n}(x)` of the generalized functions at the
/// lowest degree `l0 = max(m, 2)`, for `n = ±2`.
fn generalized_start(m: usize, plus: bool, x: f64) -> f64 {
    let one_minus = (1.0 - x).max(0.0);
    let one_plus = (1.0 + x).max(0.0);
    match m {
        0 => 6.0_f64.sqrt() / 4.0 * (1.0 - x * x),
        1 => {
            if plus {
                -0.5 * one_minus.sqrt() * one_plus.powf(1.5)
            } else {
                0.5 * one_minus.powf(1.5) * one_plus.sqrt()
            }
        }
        _ => {
            // A_m = 2^-m sqrt((2m)! / ((m-2)! (m+2)!))
            let mut ratio = 1.0;
            for i in (m + 3)..=(2 * m) {
                ratio *= i as f64;
            }
            for i in 2..=(m - 2) {
                ratio /= i as f64;
            }
            let a = 0.5_f64.powi(m as i32) * ratio.sqrt();
            let mf = m as f64;
            if plus {
                a * one_minus.powf((mf - 2.0) / 2.0) * one_plus.powf((mf + 2.0) / 2.0)
            } else {
                a * one_minus.powf((mf + 2.0) / 2.0) * one_plus.powf((mf - 2.0) / 2.0)
            }
        }
    }
}

/// Generalized spherical functions `P^l_{m,2}(x)` (`plus`) or
/// `P^l_{m,-2}(x)`.
pub fn generalized(m: usize, plus: bool, lmax: usize, x: f64) -> Vec<f64> {
    let mut p = vec![0.0; lmax + 1];
    let l0 = m.max(2);
    if l0 > lmax {
        return p;
    }
    p[l0] = generalized_start(m, plus, x);

    let mf = m as f64;
    let n = if plus { 2.0 } else { -2.0 };
    for l in l0..lmax {
        let lf = l as f64;
        let prev = if l > l0 { p[l - 1] } else { 0.0 };
        let back = ((lf * lf - mf * mf) * (lf * lf - n * n)).max(0.0).sqrt();
        let next = (((lf + 1.0) * (lf + 1.0) - mf * mf) * ((lf + 1.0) * (lf + 1.0) - n * n)).sqrt();
        p[l + 1] = ((2.0 * lf + 1.0) * (lf * (lf + 1.0) * x - mf * n) * p[l] - (lf + 1.0) * back * prev)
            / (lf * next);
    }
    p
}

/// The `R = (P_{m,2} + P_{m,-2})/2` and `T = (P_{m,2} - P_{m,-2})/2`
/// combinations that couple Q and U.
pub fn rt(m: usize, lmax: usize, x: f64) -> (Vec<f64>, Vec<f64>) {
    let plus = generalized(m, true, lmax, x);
    let minus = generalized(m, false, lmax, x);
    let r = plus.iter().zip(&minus).map(|(p, q)| 0.5 * (p + q)).collect();
    let t = plus.iter().zip(&minus).map(|(p, q)| 0.5 * (p - q)).collect();
    (r, t)
}
