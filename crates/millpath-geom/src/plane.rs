//! Infinite planes: ray intersection and triangle waterlines.

use millpath_math::{normalize, Point3, Vec3, EPSILON};

use crate::{Line, Triangle};

/// An infinite plane through `point` with unit `normal`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    point: Point3,
    normal: Vec3,
}

impl Plane {
    /// Create a plane; the normal is normalized. A zero normal yields `None`.
    pub fn new(point: Point3, normal: Vec3) -> Option<Self> {
        Some(Self {
            point,
            normal: normalize(&normal)?,
        })
    }

    /// A point on the plane.
    pub fn point(&self) -> Point3 {
        self.point
    }

    /// Unit normal.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    /// Cast a ray from `point` along `direction` onto the plane.
    ///
    /// Returns the hit point and the signed distance along the (normalized)
    /// direction. A zero direction or a ray parallel to the plane gives
    /// `None`.
    pub fn intersect_point(&self, direction: &Vec3, point: &Point3) -> Option<(Point3, f64)> {
        let norm = direction.norm();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        let direction = if norm != 1.0 { direction / norm } else { *direction };
        let denom = self.normal.dot(&direction);
        if denom == 0.0 {
            return None;
        }
        let l = -(self.normal.dot(&point.coords) - self.normal.dot(&self.point.coords)) / denom;
        Some((point + direction * l, l))
    }

    /// Orthogonal projection of `point` onto the plane.
    pub fn project_point(&self, point: &Point3) -> Point3 {
        point - self.normal * self.normal.dot(&(point - self.point))
    }

    /// Signed distance of `point` from the plane along the normal.
    pub fn signed_distance(&self, point: &Point3) -> f64 {
        self.normal.dot(&(point - self.point))
    }

    /// Segment where the triangle crosses this plane.
    ///
    /// `None` if the triangle misses the plane, touches it in a single
    /// vertex, or lies completely in it (a neighbouring sloped triangle
    /// provides that waterline instead). The segment runs clockwise around
    /// the material when seen against the plane normal, or counter-clockwise
    /// on request.
    pub fn intersect_triangle(&self, triangle: &Triangle, counter_clockwise: bool) -> Option<Line> {
        let mut collisions: Vec<Point3> = Vec::with_capacity(3);
        for (edge, point) in [
            (triangle.e1(), triangle.p1()),
            (triangle.e2(), triangle.p2()),
            (triangle.e3(), triangle.p3()),
        ] {
            let Some(dir) = edge.dir() else {
                continue;
            };
            match self.intersect_point(&dir, &point) {
                // vertices are counted by the edge that starts there
                Some((cp, l)) if -EPSILON < l && l < edge.len() - EPSILON => collisions.push(cp),
                Some(_) => {}
                None => {
                    if self.normal.dot(&dir) == 0.0 && self.signed_distance(&point).abs() < EPSILON {
                        collisions.push(point);
                    }
                }
            }
        }
        if collisions.len() != 2 {
            return None;
        }
        let line = Line::new(collisions[0], collisions[1]);
        let Some(dir) = line.dir() else {
            return Some(line);
        };
        let clockwise = self.normal.cross(&dir).dot(&triangle.normal()) >= 0.0;
        if clockwise == counter_clockwise {
            Some(line.reversed())
        } else {
            Some(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn xy_plane(z: f64) -> Plane {
        Plane::new(Point3::new(0.0, 0.0, z), Vec3::z()).unwrap()
    }

    #[test]
    fn test_zero_normal_rejected() {
        assert!(Plane::new(Point3::origin(), Vec3::zeros()).is_none());
    }

    #[test]
    fn test_intersect_point_renormalizes_direction() {
        let plane = xy_plane(1.0);
        let (cp, l) = plane
            .intersect_point(&Vec3::new(0.0, 0.0, 2.0), &Point3::new(3.0, 4.0, -1.0))
            .unwrap();
        assert_abs_diff_eq!(cp, Point3::new(3.0, 4.0, 1.0));
        assert_abs_diff_eq!(l, 2.0);
    }

    #[test]
    fn test_intersect_point_parallel() {
        let plane = xy_plane(0.0);
        assert!(plane.intersect_point(&Vec3::x(), &Point3::new(0.0, 0.0, 1.0)).is_none());
        assert!(plane.intersect_point(&Vec3::zeros(), &Point3::origin()).is_none());
    }

    #[test]
    fn test_projection() {
        let plane = Plane::new(Point3::origin(), Vec3::new(0.0, 0.0, 5.0)).unwrap();
        assert_abs_diff_eq!(
            plane.project_point(&Point3::new(1.0, 2.0, 3.0)),
            Point3::new(1.0, 2.0, 0.0)
        );
        assert_abs_diff_eq!(plane.signed_distance(&Point3::new(1.0, 2.0, 3.0)), 3.0);
    }

    fn sloped_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 2.0),
            Point3::new(2.0, 0.0, 2.0),
            None,
        )
    }

    #[test]
    fn test_waterline_through_triangle() {
        let line = xy_plane(1.0).intersect_triangle(&sloped_triangle(), false).unwrap();
        assert_abs_diff_eq!(line.p1().z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.p2().z, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.len(), 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_waterline_orientation_flips() {
        let tri = sloped_triangle();
        let cw = xy_plane(1.0).intersect_triangle(&tri, false).unwrap();
        let ccw = xy_plane(1.0).intersect_triangle(&tri, true).unwrap();
        assert_abs_diff_eq!(cw.p1(), ccw.p2(), epsilon = 1e-12);
        assert_abs_diff_eq!(cw.p2(), ccw.p1(), epsilon = 1e-12);
    }

    #[test]
    fn test_waterline_misses_and_coplanar() {
        let tri = sloped_triangle();
        assert!(xy_plane(5.0).intersect_triangle(&tri, false).is_none());
        let flat = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            None,
        );
        assert!(xy_plane(1.0).intersect_triangle(&flat, false).is_none());
    }
}
