//! Line segments with eagerly derived direction, length and bounds.

use millpath_math::{normalize, points_near, Point3, Transform, Vec3, EPSILON};

use crate::{Bounds3, Plane};

/// A directed line segment from `p1` to `p2`.
///
/// Direction, length and bounds are computed whenever an endpoint changes,
/// so endpoints are only mutable through [`Line::set_p1`] and
/// [`Line::set_p2`].
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    p1: Point3,
    p2: Point3,
    vector: Vec3,
    dir: Option<Vec3>,
    len: f64,
    bounds: Bounds3,
}

impl Line {
    /// Create a segment between two points.
    pub fn new(p1: Point3, p2: Point3) -> Self {
        let vector = p2 - p1;
        Self {
            p1,
            p2,
            vector,
            dir: normalize(&vector),
            len: vector.norm(),
            bounds: Bounds3::new(p1, p2),
        }
    }

    /// Start point.
    pub fn p1(&self) -> Point3 {
        self.p1
    }

    /// End point.
    pub fn p2(&self) -> Point3 {
        self.p2
    }

    /// `p2 - p1`.
    pub fn vector(&self) -> Vec3 {
        self.vector
    }

    /// Unit direction, `None` for a zero-length segment.
    pub fn dir(&self) -> Option<Vec3> {
        self.dir
    }

    /// Segment length.
    pub fn len(&self) -> f64 {
        self.len
    }

    /// `true` for a zero-length segment.
    pub fn is_empty(&self) -> bool {
        self.dir.is_none()
    }

    /// Axis-aligned bounds of both endpoints.
    pub fn bounds(&self) -> &Bounds3 {
        &self.bounds
    }

    /// Move the start point and recompute derived data.
    pub fn set_p1(&mut self, p1: Point3) {
        *self = Self::new(p1, self.p2);
    }

    /// Move the end point and recompute derived data.
    pub fn set_p2(&mut self, p2: Point3) {
        *self = Self::new(self.p1, p2);
    }

    /// The same segment running the other way.
    pub fn reversed(&self) -> Self {
        Self::new(self.p2, self.p1)
    }

    /// Apply an affine transform to both endpoints.
    pub fn transformed(&self, t: &Transform) -> Self {
        Self::new(t.apply_point(&self.p1), t.apply_point(&self.p2))
    }

    /// `p1 + dir * t * len`, i.e. `t = 0` is `p1` and `t = 1` is `p2`.
    pub fn point_with_length_multiply(&self, t: f64) -> Point3 {
        self.p1 + self.vector * t
    }

    /// Closest point to `p` on the infinite line through the segment.
    pub fn closest_point(&self, p: &Point3) -> Point3 {
        match self.dir {
            Some(v) => {
                let dist = self.p1.coords.dot(&v) - p.coords.dot(&v);
                self.p1 - v * dist
            }
            None => self.p1,
        }
    }

    /// Distance from `p` to the infinite line through the segment.
    pub fn dist_to_point(&self, p: &Point3) -> f64 {
        (p - self.closest_point(p)).norm()
    }

    /// `true` if `p` lies on the segment (endpoints included).
    pub fn is_point_inside(&self, p: &Point3) -> bool {
        if points_near(p, &self.p1) || points_near(p, &self.p2) {
            return true;
        }
        let (Some(dir1), Some(dir2)) = (normalize(&(p - self.p1)), normalize(&(self.p2 - p)))
        else {
            return true;
        };
        match self.dir {
            Some(dir) => same_direction(&dir1, &dir2) && same_direction(&dir1, &dir),
            None => false,
        }
    }

    /// Intersection with another segment.
    ///
    /// Returns the point and its parameter along `self` (0 at `p1`, 1 at
    /// `p2`). With `infinite` set, both segments are treated as infinite
    /// lines. Collinear overlapping segments report the first shared point
    /// found among `other.p1`, `other.p2`, `self.p1`, `self.p2`.
    pub fn intersection(&self, other: &Line, infinite: bool) -> Option<(Point3, f64)> {
        self.dir?;
        let (x1, x2, x3, x4) = (self.p1, self.p2, other.p1, other.p2);
        let a = x2 - x1;
        let b = x4 - x3;
        let c = x3 - x1;
        let ab = a.cross(&b);
        let denom = ab.norm_squared();
        if denom == 0.0 {
            // parallel: either apart or on one straight line
            if a.cross(&c).norm() != 0.0 {
                return None;
            }
            let a_len = a.norm();
            return if self.is_point_inside(&x3) {
                Some((x3, c.norm() / a_len))
            } else if self.is_point_inside(&x4) {
                Some((x4, (x4 - x1).norm() / a_len))
            } else if other.is_point_inside(&x1) {
                Some((x1, 0.0))
            } else if other.is_point_inside(&x2) {
                Some((x2, 1.0))
            } else {
                None
            };
        }
        let factor = c.cross(&b).dot(&ab) / denom;
        let point = x1 + a * factor;
        if infinite {
            return Some((point, factor));
        }
        if (-EPSILON..=1.0 + EPSILON).contains(&factor) && other.bounds.contains(&point) {
            Some((point, factor))
        } else {
            None
        }
    }

    /// Clip the segment against an axis-aligned box.
    ///
    /// Returns `None` when nothing (or only a single point) of the segment
    /// lies inside the box.
    pub fn cropped(&self, bounds: &Bounds3) -> Option<Line> {
        if bounds.contains_bounds(&self.bounds) {
            return Some(self.clone());
        }
        if bounds.is_disjoint(&self.bounds) {
            return None;
        }
        let mut hits: Vec<(Point3, f64)> = Vec::new();
        if let Some(dir) = self.dir {
            for corner in [bounds.min, bounds.max] {
                for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
                    let Some(plane) = Plane::new(corner, axis) else {
                        continue;
                    };
                    if let Some((cp, dist)) = plane.intersect_point(&dir, &self.p1) {
                        if (-EPSILON..=self.len + EPSILON).contains(&dist) && bounds.contains(&cp)
                        {
                            hits.push((cp, dist));
                        }
                    }
                }
            }
        }
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        let new_p1 = match hits.first() {
            Some((cp, _)) if !bounds.contains(&self.p1) => *cp,
            _ => self.p1,
        };
        let new_p2 = match hits.last() {
            Some((cp, _)) if !bounds.contains(&self.p2) => *cp,
            _ => self.p2,
        };
        if points_near(&new_p1, &new_p2) {
            None
        } else {
            Some(Line::new(new_p1, new_p2))
        }
    }
}

fn same_direction(a: &Vec3, b: &Vec3) -> bool {
    (0..3).all(|i| (a[i] - b[i]).abs() <= EPSILON)
}
