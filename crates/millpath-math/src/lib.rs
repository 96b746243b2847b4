#![warn(missing_docs)]

//! Math types for the millpath collision engine.
//!
//! Thin wrappers around nalgebra providing the point/vector types used by
//! every other millpath crate, affine transforms that keep the distinction
//! between bound points and free vectors, the fixed comparison epsilon, and
//! a handful of numerically guarded helpers shared by the collision solvers.

use std::cmp::Ordering;

use nalgebra::{Matrix4, Rotation3, Unit, Vector3, Vector4};

mod poly;

pub use poly::{poly1_roots, poly2_roots, poly3_roots, poly4_roots};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A free vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// Fixed epsilon used for every geometric comparison.
pub const EPSILON: f64 = 1e-5;

/// An affine transformation stored as a homogeneous 4x4 matrix.
///
/// Points are transformed with an implicit `w = 1` (translation applies),
/// vectors with `w = 0` (translation is ignored).
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Build a transform from the three rows of a 3x4 affine matrix.
    ///
    /// The last column holds the translation.
    pub fn from_rows(rows: [[f64; 4]; 3]) -> Self {
        let mut matrix = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                matrix[(r, c)] = *value;
            }
        }
        Self { matrix }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vec3::new(dx, dy, dz)),
        }
    }

    /// Non-uniform scale by `(sx, sy, sz)` about the origin.
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::x_axis(), angle)
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::y_axis(), angle)
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        Self::rotation_about_axis(&Vec3::z_axis(), angle)
    }

    /// Rotation about an axis through the origin by `angle` radians.
    pub fn rotation_about_axis(axis: &Dir3, angle: f64) -> Self {
        Self {
            matrix: Rotation3::from_axis_angle(axis, angle).to_homogeneous(),
        }
    }

    /// Rotation about an axis passing through `center`.
    pub fn rotation_about_point(center: &Point3, axis: &Dir3, angle: f64) -> Self {
        let to_origin = Self::translation(-center.x, -center.y, -center.z);
        let back = Self::translation(center.x, center.y, center.z);
        back.then(&Self::rotation_about_axis(axis, angle))
            .then(&to_origin)
    }

    /// Compose: the result applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a bound point (translation applies).
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a free vector (translation is ignored).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Transform a surface normal with the inverse transpose of the linear part.
    ///
    /// Singular transforms fall back to [`Transform::apply_vec`].
    pub fn apply_normal(&self, n: &Vec3) -> Vec3 {
        let linear = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        match linear.try_inverse() {
            Some(inv) => inv.transpose() * n,
            None => self.apply_vec(n),
        }
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Epsilon-based comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Per-axis linear tolerance.
    pub linear: f64,
}

impl Tolerance {
    /// The engine-wide tolerance ([`EPSILON`]).
    pub const DEFAULT: Self = Self { linear: EPSILON };

    /// Two points are equal when every axis differs by at most the tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() <= self.linear)
    }

    /// Check if a scalar is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Order two points axis by axis, treating differences up to [`EPSILON`] as equal.
pub fn compare_points(a: &Point3, b: &Point3) -> Ordering {
    for axis in 0..3 {
        if (a[axis] - b[axis]).abs() > EPSILON {
            return a[axis].total_cmp(&b[axis]);
        }
    }
    Ordering::Equal
}

/// `true` if both points lie within [`EPSILON`] of each other on every axis.
pub fn points_near(a: &Point3, b: &Point3) -> bool {
    compare_points(a, b) == Ordering::Equal
}

/// Exact collinearity test of three points (zero cross product).
pub fn points_in_line(a: &Point3, b: &Point3, c: &Point3) -> bool {
    let v1 = a - b;
    let v2 = a - c;
    v1.y * v2.z == v1.z * v2.y && v1.x * v2.z == v1.z * v2.x && v1.x * v2.y == v1.y * v2.x
}

/// `true` if walking `p1 -> p2 -> p3` keeps the same heading.
///
/// Coincident neighbours have no heading and never count as collinear.
pub fn is_collinear_step(p1: &Point3, p2: &Point3, p3: &Point3) -> bool {
    match (normalize(&(p2 - p1)), normalize(&(p3 - p2))) {
        (Some(a), Some(b)) => (0..3).all(|i| (a[i] - b[i]).abs() <= EPSILON),
        _ => false,
    }
}

/// Normalize a vector; `None` for the zero vector.
pub fn normalize(v: &Vec3) -> Option<Vec3> {
    let n = v.norm();
    if n == 0.0 || !n.is_finite() {
        None
    } else {
        Some(v / n)
    }
}

/// Square root that absorbs negative round-off.
///
/// Values in `(-EPSILON, 0]` map to zero; anything more negative yields `None`.
pub fn safe_sqrt(value: f64) -> Option<f64> {
    if value > 0.0 {
        Some(value.sqrt())
    } else if value > -EPSILON {
        Some(0.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_point_and_vector_application() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(p, Point3::new(11.0, 22.0, 33.0), epsilon = 1e-12);
        // free vectors ignore the translation part
        let v = t.apply_vec(&Vec3::new(1.0, 2.0, 3.0));
        assert_abs_diff_eq!(v, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_z_quarter_turn() {
        let t = Transform::rotation_z(PI / 2.0);
        let p = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_about_point() {
        let center = Point3::new(1.0, 1.0, 0.0);
        let t = Transform::rotation_about_point(&center, &Vec3::z_axis(), PI);
        let p = t.apply_point(&Point3::new(2.0, 1.0, 5.0));
        assert_abs_diff_eq!(p, Point3::new(0.0, 1.0, 5.0), epsilon = 1e-12);
    }

    #[test]
    fn test_from_rows_matches_translation() {
        let t = Transform::from_rows([
            [1.0, 0.0, 0.0, 4.0],
            [0.0, 1.0, 0.0, -2.0],
            [0.0, 0.0, 1.0, 1.0],
        ]);
        assert_eq!(t, Transform::translation(4.0, -2.0, 1.0));
    }

    #[test]
    fn test_then_applies_right_operand_first() {
        let translate = Transform::translation(1.0, 0.0, 0.0);
        let scale = Transform::scale(2.0, 2.0, 2.0);
        let p = scale.then(&translate).apply_point(&Point3::origin());
        assert_abs_diff_eq!(p.x, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::rotation_x(0.3).then(&Transform::translation(1.0, 2.0, 3.0));
        let inv = t.inverse().unwrap();
        let p = Point3::new(5.0, 6.0, 7.0);
        assert_abs_diff_eq!(inv.apply_point(&t.apply_point(&p)), p, epsilon = 1e-9);
    }

    #[test]
    fn test_normal_under_nonuniform_scale() {
        // plane x + y = c scaled by (2, 1, 1) has normal (1, 2, 0) direction
        let t = Transform::scale(2.0, 1.0, 1.0);
        let n = t.apply_normal(&Vec3::new(1.0, 1.0, 0.0)).normalize();
        let expected = Vec3::new(1.0, 2.0, 0.0).normalize();
        assert_abs_diff_eq!(n, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_compare_points_with_epsilon() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-6, 2.0, 3.0);
        assert_eq!(compare_points(&a, &b), Ordering::Equal);
        assert!(points_near(&a, &b));
        let c = Point3::new(1.0, 2.5, 0.0);
        assert_eq!(compare_points(&a, &c), Ordering::Less);
        assert_eq!(compare_points(&c, &a), Ordering::Greater);
    }

    #[test]
    fn test_points_in_line() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 1.0, 1.0);
        let c = Point3::new(3.0, 3.0, 3.0);
        assert!(points_in_line(&a, &b, &c));
        assert!(!points_in_line(&a, &b, &Point3::new(3.0, 3.0, 2.0)));
    }

    #[test]
    fn test_collinear_step_requires_same_heading() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        assert!(is_collinear_step(&a, &b, &Point3::new(4.0, 0.0, 0.0)));
        // reversing direction is not a straight continuation
        assert!(!is_collinear_step(&a, &b, &Point3::new(0.5, 0.0, 0.0)));
        assert!(!is_collinear_step(&a, &a, &b));
    }

    #[test]
    fn test_safe_sqrt() {
        assert_eq!(safe_sqrt(4.0), Some(2.0));
        assert_eq!(safe_sqrt(-1e-7), Some(0.0));
        assert_eq!(safe_sqrt(-1.0), None);
    }

    #[test]
    fn test_normalize_zero() {
        assert!(normalize(&Vec3::zeros()).is_none());
        assert_abs_diff_eq!(
            normalize(&Vec3::new(0.0, 3.0, 4.0)).unwrap(),
            Vec3::new(0.0, 0.6, 0.8),
            epsilon = 1e-12
        );
    }
}
