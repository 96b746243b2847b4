//! Axis-aligned bounding boxes.

use millpath_math::{Point3, EPSILON};

/// An axis-aligned box given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Bounds3 {
    /// Create a box from two corners (each axis is sorted).
    pub fn new(a: Point3, b: Point3) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Smallest box containing every point; `None` for an empty iterator.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in points {
            bounds.extend(p);
        }
        Some(bounds)
    }

    /// Grow the box to include `p`.
    pub fn extend(&mut self, p: &Point3) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Bounds3) -> Self {
        let mut out = *self;
        out.extend(&other.min);
        out.extend(&other.max);
        out
    }

    /// `true` if `p` lies in the box, allowing [`EPSILON`] slack on every side.
    pub fn contains(&self, p: &Point3) -> bool {
        (0..3).all(|i| self.min[i] - EPSILON <= p[i] && p[i] <= self.max[i] + EPSILON)
    }

    /// `true` if `other` lies entirely inside this box (epsilon tolerant).
    pub fn contains_bounds(&self, other: &Bounds3) -> bool {
        self.contains(&other.min) && self.contains(&other.max)
    }

    /// `true` if `other` is separated from this box on at least one axis by
    /// more than [`EPSILON`].
    pub fn is_disjoint(&self, other: &Bounds3) -> bool {
        (0..3).any(|i| {
            self.max[i] + EPSILON < other.min[i] || other.max[i] < self.min[i] - EPSILON
        })
    }

    /// `true` if the XY projections of both boxes overlap.
    pub fn overlaps_xy(&self, other: &Bounds3) -> bool {
        (0..2).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Extent along each axis.
    pub fn size(&self) -> [f64; 3] {
        [
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        ]
    }
}
