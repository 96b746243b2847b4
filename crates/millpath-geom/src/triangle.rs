//! Triangles with cached edges, bounds and circumcircle.

use millpath_math::{normalize, Point3, Transform, Vec3};

use crate::{Bounds3, Line, Plane};

/// Circle through all three corners of a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circumcircle {
    /// Circle centre.
    pub middle: Point3,
    /// Circle radius.
    pub radius: f64,
}

/// A triangle with corners `p1, p2, p3` in clockwise order (seen from the
/// side its normal points to).
///
/// Everything derived from the corners is computed at construction and
/// again by [`Triangle::set_points`].
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    p1: Point3,
    p2: Point3,
    p3: Point3,
    normal: Vec3,
    bounds: Bounds3,
    e1: Line,
    e2: Line,
    e3: Line,
    center: Point3,
    plane: Option<Plane>,
    circumcircle: Option<Circumcircle>,
}

impl Triangle {
    /// Create a triangle. Without an explicit (non-zero) normal it is derived
    /// from the winding.
    pub fn new(p1: Point3, p2: Point3, p3: Point3, normal: Option<Vec3>) -> Self {
        let normal = normal
            .and_then(|n| normalize(&n))
            .unwrap_or_else(|| winding_normal(&p1, &p2, &p3));
        let mut tri = Self {
            p1,
            p2,
            p3,
            normal,
            bounds: Bounds3::new(p1, p2),
            e1: Line::new(p1, p2),
            e2: Line::new(p2, p3),
            e3: Line::new(p3, p1),
            center: p1,
            plane: None,
            circumcircle: None,
        };
        tri.recompute();
        tri
    }

    /// Replace the corners; the normal is re-derived from the new winding.
    pub fn set_points(&mut self, p1: Point3, p2: Point3, p3: Point3) {
        self.p1 = p1;
        self.p2 = p2;
        self.p3 = p3;
        self.normal = winding_normal(&p1, &p2, &p3);
        self.recompute();
    }

    fn recompute(&mut self) {
        let (p1, p2, p3) = (self.p1, self.p2, self.p3);
        let mut bounds = Bounds3::new(p1, p2);
        bounds.extend(&p3);
        self.bounds = bounds;
        self.e1 = Line::new(p1, p2);
        self.e2 = Line::new(p2, p3);
        self.e3 = Line::new(p3, p1);
        self.center = Point3::from((p1.coords + p2.coords + p3.coords) / 3.0);
        self.plane = Plane::new(self.center, self.normal);
        self.circumcircle = circumcircle(&p1, &p2, &p3);
    }

    /// First corner.
    pub fn p1(&self) -> Point3 {
        self.p1
    }

    /// Second corner.
    pub fn p2(&self) -> Point3 {
        self.p2
    }

    /// Third corner.
    pub fn p3(&self) -> Point3 {
        self.p3
    }

    /// All three corners in winding order.
    pub fn points(&self) -> [Point3; 3] {
        [self.p1, self.p2, self.p3]
    }

    /// Unit normal (zero for a degenerate triangle without a given normal).
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Axis-aligned bounds.
    pub fn bounds(&self) -> &Bounds3 {
        &self.bounds
    }

    /// Edge `p1 -> p2`.
    pub fn e1(&self) -> &Line {
        &self.e1
    }

    /// Edge `p2 -> p3`.
    pub fn e2(&self) -> &Line {
        &self.e2
    }

    /// Edge `p3 -> p1`.
    pub fn e3(&self) -> &Line {
        &self.e3
    }

    /// All three edges.
    pub fn edges(&self) -> [&Line; 3] {
        [&self.e1, &self.e2, &self.e3]
    }

    /// Centroid.
    pub fn center(&self) -> Point3 {
        self.center
    }

    /// Supporting plane through the centroid.
    pub fn plane(&self) -> Option<&Plane> {
        self.plane.as_ref()
    }

    /// Circumcircle, `None` for collinear corners.
    pub fn circumcircle(&self) -> Option<&Circumcircle> {
        self.circumcircle.as_ref()
    }

    /// Collinear or coincident corners. Such triangles take part in no
    /// collision query.
    pub fn is_degenerate(&self) -> bool {
        self.circumcircle.is_none() || self.plane.is_none()
    }

    /// Strict barycentric containment test; points on the boundary are
    /// outside. Only meaningful for points in the triangle's plane.
    pub fn is_point_inside(&self, p: &Point3) -> bool {
        let v0 = self.p3 - self.p1;
        let v1 = self.p2 - self.p1;
        let v2 = p - self.p1;
        let dot00 = v0.dot(&v0);
        let dot01 = v0.dot(&v1);
        let dot02 = v0.dot(&v2);
        let dot11 = v1.dot(&v1);
        let dot12 = v1.dot(&v2);
        let denom = dot00 * dot11 - dot01 * dot01;
        if denom == 0.0 {
            return false;
        }
        let u = (dot11 * dot02 - dot01 * dot12) / denom;
        let v = (dot00 * dot12 - dot01 * dot02) / denom;
        u > 0.0 && v > 0.0 && u + v < 1.0
    }

    /// Surface area.
    pub fn area(&self) -> f64 {
        (self.p2 - self.p1).cross(&(self.p3 - self.p1)).norm() / 2.0
    }

    /// Split into `4^depth` triangles by repeated edge-midpoint subdivision.
    pub fn subdivide(&self, depth: u32) -> Vec<Triangle> {
        if depth == 0 {
            return vec![self.clone()];
        }
        let p4 = nalgebra::center(&self.p1, &self.p2);
        let p5 = nalgebra::center(&self.p2, &self.p3);
        let p6 = nalgebra::center(&self.p3, &self.p1);
        [
            Triangle::new(self.p1, p4, p6, None),
            Triangle::new(p6, p5, self.p3, None),
            Triangle::new(p6, p4, p5, None),
            Triangle::new(p4, self.p2, p5, None),
        ]
        .iter()
        .flat_map(|t| t.subdivide(depth - 1))
        .collect()
    }

    /// Apply an affine transform. The normal is carried along as a free vector.
    pub fn transformed(&self, t: &Transform) -> Triangle {
        Triangle::new(
            t.apply_point(&self.p1),
            t.apply_point(&self.p2),
            t.apply_point(&self.p3),
            Some(t.apply_vec(&self.normal)),
        )
    }
}

fn winding_normal(p1: &Point3, p2: &Point3, p3: &Point3) -> Vec3 {
    normalize(&(p3 - p1).cross(&(p2 - p1))).unwrap_or_else(Vec3::zeros)
}

fn circumcircle(p1: &Point3, p2: &Point3, p3: &Point3) -> Option<Circumcircle> {
    let denom = (p2 - p1).cross(&(p3 - p2)).norm();
    if denom == 0.0 {
        return None;
    }
    let radius = (p2 - p1).norm() * (p3 - p2).norm() * (p3 - p1).norm() / (2.0 * denom);
    let denom2 = 2.0 * denom * denom;
    let alpha = (p3 - p2).norm_squared() * (p1 - p2).dot(&(p1 - p3)) / denom2;
    let beta = (p1 - p3).norm_squared() * (p2 - p1).dot(&(p2 - p3)) / denom2;
    let gamma = (p1 - p2).norm_squared() * (p3 - p1).dot(&(p3 - p2)) / denom2;
    let middle = Point3::from(p1.coords * alpha + p2.coords * beta + p3.coords * gamma);
    if !radius.is_finite() || !middle.coords.iter().all(|c| c.is_finite()) {
        return None;
    }
    Some(Circumcircle { middle, radius })
}
