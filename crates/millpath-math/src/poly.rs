//! Closed-form real roots of polynomials up to degree four.
//!
//! The cubic uses the trigonometric form for three real roots and Cardano's
//! formula otherwise; the quartic is reduced through its resolvent cubic
//! into two quadratics (Ferrari). Each solver returns an empty vector when
//! no real root exists. Root order is solver-defined and not sorted.

use std::f64::consts::PI;

const NEAR_ZERO: f64 = 1e-4;
const SMALL: f64 = 1e-4;

fn near_zero(x: f64) -> bool {
    x.abs() < NEAR_ZERO
}

fn cube_root(x: f64) -> f64 {
    if x >= 0.0 {
        x.powf(1.0 / 3.0)
    } else {
        -(-x).powf(1.0 / 3.0)
    }
}

/// Root of `a*x + b = 0`.
pub fn poly1_roots(a: f64, b: f64) -> Vec<f64> {
    if near_zero(a) {
        Vec::new()
    } else {
        vec![-b / a]
    }
}

/// Real roots of `a*x^2 + b*x + c = 0`.
pub fn poly2_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let d = b * b - 4.0 * a * c;
    if d < 0.0 {
        return Vec::new();
    }
    if near_zero(a) {
        return poly1_roots(b, c);
    }
    if d == 0.0 {
        return vec![-b / (2.0 * a)];
    }
    let q = d.sqrt();
    if a < 0.0 {
        vec![(-b + q) / (2.0 * a), (-b - q) / (2.0 * a)]
    } else {
        vec![(-b - q) / (2.0 * a), (-b + q) / (2.0 * a)]
    }
}

/// Real roots of `a*x^3 + b*x^2 + c*x + d = 0`.
///
/// Repeated roots are reported once per multiplicity when the discriminant
/// is exactly zero.
pub fn poly3_roots(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    if near_zero(a) {
        return poly2_roots(b, c, d);
    }
    let c1 = b / a;
    let c2 = c / a;
    let c3 = d / a;

    let c1_3 = c1 / 3.0;
    // depressed cubic t^3 + p*t + q
    let p = c2 - c1 * c1_3;
    let q = (2.0 * c1 * c1 * c1 - 9.0 * c1 * c2 + 27.0 * c3) / 27.0;
    let delta = q * q / 4.0 + p * p * p / 27.0;

    if delta > 0.0 {
        let r_delta = delta.sqrt();
        let major = cube_root(-q / 2.0 + r_delta);
        let minor = cube_root(-q / 2.0 - r_delta);
        return vec![major + minor - c1_3];
    }
    if delta == 0.0 {
        let s = cube_root(-q / 2.0);
        return vec![2.0 * s - c1_3, -s - c1_3, -s - c1_3];
    }

    let (fact, cs_phi, sn_phi_s3) = if p > 0.0 {
        (0.0, 1.0, 0.0)
    } else {
        let p = -p / 3.0;
        let fact = p.sqrt();
        let f = -q / 2.0 / (p * fact);
        if f >= 1.0 {
            (fact, 1.0, 0.0)
        } else if f <= -1.0 {
            let phi = PI / 3.0;
            (fact, phi.cos(), phi.sin() * 3f64.sqrt())
        } else {
            let phi = f.acos() / 3.0;
            (fact, phi.cos(), phi.sin() * 3f64.sqrt())
        }
    };
    let r1 = 2.0 * fact * cs_phi;
    let r2 = fact * (sn_phi_s3 - cs_phi);
    let r3 = fact * (-sn_phi_s3 - cs_phi);
    vec![r1 - c1_3, r2 - c1_3, r3 - c1_3]
}

/// Real roots of `a*x^4 + b*x^3 + c*x^2 + d*x + e = 0`.
pub fn poly4_roots(a: f64, b: f64, c: f64, d: f64, e: f64) -> Vec<f64> {
    if a == 0.0 {
        return poly3_roots(b, c, d, e);
    }
    let c1 = b / a;
    let c2 = c / a;
    let c3 = d / a;
    let c4 = e / a;

    let resolvent = poly3_roots(
        1.0,
        -c2,
        c3 * c1 - 4.0 * c4,
        -c3 * c3 - c4 * c1 * c1 + 4.0 * c4 * c2,
    );
    let Some(mut u) = resolvent.into_iter().reduce(f64::max) else {
        return Vec::new();
    };

    let p = c1 * c1 / 4.0 + u - c2;
    u /= 2.0;
    let q = u * u - c4;
    let p = if p < 0.0 {
        if p < -SMALL {
            return Vec::new();
        }
        0.0
    } else {
        p.sqrt()
    };
    let q = if q < 0.0 {
        if q < -SMALL {
            return Vec::new();
        }
        0.0
    } else {
        q.sqrt()
    };

    let b1 = c1 / 2.0 - p;
    let b2 = c1 / 2.0 + p;
    let q1 = u - q;
    let q2 = u + q;

    let (c_quad1, c_quad2) = if near_zero(b1 * q2 + b2 * q1 - c3) {
        (q1, q2)
    } else if near_zero(b1 * q1 + b2 * q2 - c3) {
        (q2, q1)
    } else {
        return Vec::new();
    };

    let mut roots = poly2_roots(1.0, b1, c_quad1);
    roots.extend(poly2_roots(1.0, b2, c_quad2));
    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut roots: Vec<f64>) -> Vec<f64> {
        roots.sort_by(f64::total_cmp);
        roots
    }

    fn assert_roots(actual: Vec<f64>, expected: &[f64]) {
        let actual = sorted(actual);
        assert_eq!(actual.len(), expected.len(), "roots: {actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "roots: {actual:?}, expected {expected:?}");
        }
    }

    #[test]
    fn test_linear() {
        assert_roots(poly1_roots(1.0, 2.0), &[-2.0]);
        assert!(poly1_roots(0.0, 2.0).is_empty());
    }

    #[test]
    fn test_quadratic() {
        assert_roots(poly2_roots(1.0, 2.0, 0.0), &[-2.0, 0.0]);
        assert_roots(poly2_roots(1.0, 2.0, 1.0), &[-1.0]);
        assert!(poly2_roots(1.0, 2.0, 2.0).is_empty());
        // degenerate leading coefficient falls back to the linear case
        assert_roots(poly2_roots(0.0, 2.0, -4.0), &[2.0]);
    }

    #[test]
    fn test_quadratic_root_order_follows_sign() {
        assert_eq!(poly2_roots(1.0, 0.0, -1.0), vec![-1.0, 1.0]);
        assert_eq!(poly2_roots(-1.0, 0.0, 1.0), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_cubic() {
        assert_roots(poly3_roots(1.0, 0.0, 0.0, -1.0), &[1.0]);
        assert_roots(
            poly3_roots(1.0, 0.0, -2.0, 0.0),
            &[-2f64.sqrt(), 0.0, 2f64.sqrt()],
        );
        assert_roots(
            poly3_roots(1.0, 0.0, -2.0, 1.0),
            &[-1.618033988749895, 0.6180339887498949, 1.0],
        );
    }

    #[test]
    fn test_cubic_triple_root() {
        assert_roots(poly3_roots(1.0, 0.0, 0.0, 0.0), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_quartic_four_roots() {
        assert_roots(
            poly4_roots(1.0, -10.0, 35.0, -50.0, 24.0),
            &[1.0, 2.0, 3.0, 4.0],
        );
    }

    #[test]
    fn test_quartic_two_roots() {
        assert_roots(poly4_roots(1.0, 0.0, 0.0, 0.0, -1.0), &[-1.0, 1.0]);
        assert_roots(
            poly4_roots(1.0, 0.0, 6.0, -60.0, 36.0),
            &[0.6443988642268161, 3.099874424018815],
        );
    }

    #[test]
    fn test_quartic_residuals() {
        let (a, b, c, d, e) = (1.0, -25.0, 235.895, -995.565, 1585.25);
        let roots = poly4_roots(a, b, c, d, e);
        assert_eq!(roots.len(), 2);
        for r in roots {
            let f = a * r.powi(4) + b * r.powi(3) + c * r * r + d * r + e;
            assert!(f.abs() < SMALL, "f({r}) = {f}");
        }
    }
}
