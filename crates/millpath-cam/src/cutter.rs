//! Cutter shapes and their collision with triangles.

use millpath_geom::{Line, Triangle};
use millpath_math::{normalize, Point3, Vec3, EPSILON};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::collision::{self, Touch};
use crate::{CamError, Result};

/// Shape of the cutter tip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CutterShape {
    /// Flat end mill.
    Cylindrical,
    /// Ball end mill.
    Spherical,
    /// Bull nose end mill with a rounded corner.
    Toroidal {
        /// Corner radius.
        minor_radius: f64,
    },
}

/// Result of probing a cutter against a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Cutter location (tip centre) at the moment of contact.
    pub cl: Point3,
    /// Contact point on the cutter surface, before moving.
    pub ccp: Point3,
    /// Contact point on the triangle.
    pub cp: Point3,
    /// Signed travel along the probing direction.
    pub distance: f64,
}

/// A cutter: shape, size, a safety margin and the current location.
///
/// The location is the centre of the tip. All collision queries take an
/// explicit start location instead of mutating the cutter, so one cutter
/// can be shared by parallel workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutter {
    shape: CutterShape,
    radius: f64,
    required_distance: f64,
    location: Point3,
    height: f64,
}

fn vertical() -> Vec3 {
    Vec3::new(0.0, 0.0, -1.0)
}

impl Cutter {
    /// Default shaft height.
    pub const DEFAULT_HEIGHT: f64 = 10.0;

    /// Flat end mill.
    pub fn cylindrical(radius: f64) -> Result<Self> {
        Self::new(CutterShape::Cylindrical, radius)
    }

    /// Ball end mill.
    pub fn spherical(radius: f64) -> Result<Self> {
        Self::new(CutterShape::Spherical, radius)
    }

    /// Bull nose end mill with corner radius `minor_radius`.
    pub fn toroidal(radius: f64, minor_radius: f64) -> Result<Self> {
        Self::new(CutterShape::Toroidal { minor_radius }, radius)
    }

    /// Cutter of any shape, validated.
    pub fn new(shape: CutterShape, radius: f64) -> Result<Self> {
        if !(radius > 0.0) || !radius.is_finite() {
            return Err(CamError::InvalidTool(format!("radius {radius} must be positive")));
        }
        if let CutterShape::Toroidal { minor_radius } = shape {
            if !(minor_radius > 0.0 && minor_radius < radius) {
                return Err(CamError::InvalidTool(format!(
                    "minor radius {minor_radius} must lie between 0 and {radius}"
                )));
            }
        }
        Ok(Self {
            shape,
            radius,
            required_distance: 0.0,
            location: Point3::origin(),
            height: Self::DEFAULT_HEIGHT,
        })
    }

    /// Shape of the tip.
    pub fn shape(&self) -> CutterShape {
        self.shape
    }

    /// Nominal radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Shaft height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Set the shaft height.
    pub fn set_height(&mut self, height: f64) -> Result<()> {
        if !(height > 0.0) {
            return Err(CamError::InvalidTool(format!("height {height} must be positive")));
        }
        self.height = height;
        Ok(())
    }

    /// Extra clearance kept between the cutter and the model.
    pub fn required_distance(&self) -> f64 {
        self.required_distance
    }

    /// Set the clearance. Negative values are rejected.
    pub fn set_required_distance(&mut self, value: f64) -> Result<()> {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(CamError::InvalidTool(format!(
                "required distance {value} must be non-negative"
            )));
        }
        self.required_distance = value;
        Ok(())
    }

    /// Radius including the clearance.
    pub fn distance_radius(&self) -> f64 {
        self.radius + self.required_distance
    }

    /// Current location.
    pub fn location(&self) -> Point3 {
        self.location
    }

    /// Move the cutter.
    pub fn moveto(&mut self, location: Point3) {
        self.location = location;
    }

    /// Centre of the tip geometry: the sphere centre, the torus centre, or
    /// the location itself for a flat end mill.
    pub fn center(&self) -> Point3 {
        match self.shape {
            CutterShape::Cylindrical => self.location,
            CutterShape::Spherical => self.location + Vec3::new(0.0, 0.0, self.radius),
            CutterShape::Toroidal { minor_radius } => {
                self.location + Vec3::new(0.0, 0.0, minor_radius)
            }
        }
    }

    /// `[minx, maxx, miny, maxy]` covered by the cutter at `start`.
    pub fn footprint(&self, start: &Point3) -> [f64; 4] {
        let r = self.distance_radius();
        [start.x - r, start.x + r, start.y - r, start.y + r]
    }

    fn shape_center(&self, start: &Point3) -> Point3 {
        start + (self.center() - self.location)
    }

    /// Torus radii `(major, minor)` including the clearance.
    fn torus_radii(&self, minor_radius: f64) -> (f64, f64) {
        (
            self.radius - minor_radius + self.required_distance,
            minor_radius + self.required_distance,
        )
    }

    /// Drop the cutter vertically from `start` onto `triangle`.
    ///
    /// Returns the cutter location at the first contact, `None` if the
    /// triangle is out of reach or degenerate.
    pub fn drop(&self, triangle: &Triangle, start: &Point3) -> Option<Point3> {
        if triangle.is_degenerate() {
            trace!("skipping degenerate triangle");
            return None;
        }
        let [minx, maxx, miny, maxy] = self.footprint(start);
        let b = triangle.bounds();
        if minx > b.max.x + EPSILON
            || maxx < b.min.x - EPSILON
            || miny > b.max.y + EPSILON
            || maxy < b.min.y - EPSILON
        {
            return None;
        }
        let circle = triangle.circumcircle()?;
        let dr = self.distance_radius();
        let dx = circle.middle.x - start.x;
        let dy = circle.middle.y - start.y;
        let reach = dr * dr + 2.0 * dr * circle.radius + circle.radius * circle.radius;
        if dx * dx + dy * dy > reach + EPSILON {
            return None;
        }
        self.intersect(&vertical(), triangle, start).map(|c| c.cl)
    }

    /// First contact of the cutter moving from `start` along `direction`
    /// with `triangle`.
    ///
    /// `direction` is normalized first; a zero vector has no contact. Every
    /// face, edge and vertex solver of the shape is evaluated; the smallest
    /// signed distance wins and ties keep the earlier primitive.
    pub fn intersect(&self, direction: &Vec3, triangle: &Triangle, start: &Point3) -> Option<Contact> {
        if triangle.is_degenerate() {
            return None;
        }
        let direction = &normalize(direction)?;
        match self.shape {
            CutterShape::Cylindrical => self.intersect_cylindrical(direction, triangle, start),
            CutterShape::Spherical => self.intersect_spherical(direction, triangle, start),
            CutterShape::Toroidal { minor_radius } => {
                self.intersect_toroidal(direction, triangle, start, minor_radius)
            }
        }
    }

    fn intersect_cylindrical(&self, direction: &Vec3, tri: &Triangle, start: &Point3) -> Option<Contact> {
        let radius = self.distance_radius();
        let mut best = Best::default();
        best.offer(self.circle_triangle(direction, tri, start, radius));
        if best.found() && is_vertical(direction) {
            return best.into_inner();
        }
        for edge in tri.edges() {
            best.offer(self.circle_edge(direction, edge, start, radius));
        }
        for point in tri.points() {
            best.offer(self.circle_vertex(direction, &point, start, radius));
        }
        if !is_vertical(direction) {
            self.offer_cylinder(&mut best, direction, tri, start);
        }
        best.into_inner()
    }

    fn intersect_spherical(&self, direction: &Vec3, tri: &Triangle, start: &Point3) -> Option<Contact> {
        let center = self.shape_center(start);
        let radius = self.distance_radius();
        let mut best = Best::default();
        best.offer(
            collision::sphere_plane(&center, radius, direction, tri)
                .filter(|t| tri.is_point_inside(&t.cp))
                .map(|t| contact(start, t)),
        );
        if best.found() && is_vertical(direction) {
            return best.into_inner();
        }
        for edge in tri.edges() {
            best.offer(
                collision::sphere_line(&center, radius, direction, edge)
                    .filter(|t| {
                        let d = edge.vector();
                        let m = (t.cp - edge.p1()).dot(&d);
                        (-EPSILON..=d.norm_squared() + EPSILON).contains(&m)
                    })
                    .map(|t| contact(start, t)),
            );
        }
        for point in tri.points() {
            best.offer(
                collision::sphere_point(&center, radius, direction, &point).map(|t| contact(start, t)),
            );
        }
        if is_vertical(direction) {
            return best.into_inner();
        }
        self.offer_cylinder(&mut best, direction, tri, start);
        best.into_inner()
    }

    fn intersect_toroidal(
        &self,
        direction: &Vec3,
        tri: &Triangle,
        start: &Point3,
        minor_radius: f64,
    ) -> Option<Contact> {
        let center = self.shape_center(start);
        let (major, minor) = self.torus_radii(minor_radius);
        let mut best = Best::default();
        best.offer(
            collision::torus_plane(&center, &Vec3::z(), major, minor, direction, tri)
                .filter(|t| tri.is_point_inside(&t.cp))
                .map(|t| contact(start, t)),
        );
        for edge in tri.edges() {
            best.offer(self.torus_edge(direction, edge, start, &center, major, minor));
        }
        for point in tri.points() {
            best.offer(
                collision::torus_point(&center, &Vec3::z(), major, minor, direction, &point)
                    .map(|t| contact(start, t)),
            );
        }
        best.offer(self.circle_triangle(direction, tri, start, major));
        for point in tri.points() {
            best.offer(self.circle_vertex(direction, &point, start, major));
        }
        for edge in tri.edges() {
            best.offer(self.circle_edge(direction, edge, start, major));
        }
        if !is_vertical(direction) {
            self.offer_cylinder(&mut best, direction, tri, start);
        }
        best.into_inner()
    }

    /// Sample the edge, probe the torus against each sample point and refine
    /// around the best one.
    fn torus_edge(
        &self,
        direction: &Vec3,
        edge: &Line,
        start: &Point3,
        center: &Point3,
        major: f64,
        minor: f64,
    ) -> Option<Contact> {
        let probe = |m: f64| {
            let p = edge.point_with_length_multiply(m);
            collision::torus_point(center, &Vec3::z(), major, minor, direction, &p)
                .map(|t| contact(start, t))
        };
        let scale = ((edge.len() / minor * 2.0) as usize).max(3);
        let mut best = Best::default();
        let mut best_m = 0.0;
        for i in 0..=scale {
            let m = i as f64 / scale as f64;
            if best.offer(probe(m)) {
                best_m = m;
            }
        }
        if !best.found() {
            return None;
        }
        const REFINE: usize = 10;
        for i in 1..=REFINE {
            let m = best_m + ((i as f64 / REFINE as f64) * 2.0 - 1.0) / scale as f64;
            if !(-EPSILON..=1.0 + EPSILON).contains(&m) {
                continue;
            }
            best.offer(probe(m));
        }
        best.into_inner()
    }

    /// Flat disc at the tip against the face of `tri`.
    fn circle_triangle(&self, direction: &Vec3, tri: &Triangle, start: &Point3, radius: f64) -> Option<Contact> {
        collision::circle_plane(start, radius, direction, tri)
            .filter(|t| tri.is_point_inside(&t.cp))
            .map(|t| contact(start, t))
    }

    fn circle_vertex(&self, direction: &Vec3, point: &Point3, start: &Point3, radius: f64) -> Option<Contact> {
        collision::circle_point(start, &Vec3::z(), radius, direction, point).map(|t| contact(start, t))
    }

    fn circle_edge(&self, direction: &Vec3, edge: &Line, start: &Point3, radius: f64) -> Option<Contact> {
        collision::circle_line(start, &Vec3::z(), radius, direction, edge)
            .filter(|t| within_edge(edge, &t.cp))
            .map(|t| contact(start, t))
    }

    /// Shaft wall against the vertices, then the edges. Contacts below the
    /// tip geometry's centre belong to the tip and are rejected.
    fn offer_cylinder(&self, best: &mut Best, direction: &Vec3, tri: &Triangle, start: &Point3) {
        let center = self.shape_center(start);
        let radius = self.distance_radius();
        for point in tri.points() {
            best.offer(
                collision::cylinder_point(&center, &Vec3::z(), radius, direction, &point)
                    .filter(|t| t.ccp.z >= center.z)
                    .map(|t| contact(start, t)),
            );
        }
        for edge in tri.edges() {
            best.offer(
                collision::cylinder_line(&center, &Vec3::z(), radius, direction, edge)
                    .filter(|t| within_edge(edge, &t.cp) && t.ccp.z >= center.z)
                    .map(|t| contact(start, t)),
            );
        }
    }
}

fn is_vertical(direction: &Vec3) -> bool {
    direction.x == 0.0 && direction.y == 0.0
}

fn contact(start: &Point3, t: Touch) -> Contact {
    Contact {
        cl: start + (t.cp - t.ccp),
        ccp: t.ccp,
        cp: t.cp,
        distance: t.distance,
    }
}

fn within_edge(edge: &Line, p: &Point3) -> bool {
    let Some(dir) = edge.dir() else {
        return false;
    };
    let m = (p - edge.p1()).dot(&dir);
    (-EPSILON..=edge.len() + EPSILON).contains(&m)
}

/// Running minimum over candidate contacts.
#[derive(Default)]
struct Best(Option<Contact>);

impl Best {
    /// Keep `candidate` if it is strictly closer. Returns whether it was kept.
    fn offer(&mut self, candidate: Option<Contact>) -> bool {
        let Some(c) = candidate else {
            return false;
        };
        if !c.distance.is_finite() {
            return false;
        }
        match self.0 {
            Some(current) if c.distance >= current.distance => false,
            _ => {
                self.0 = Some(c);
                true
            }
        }
    }

    fn found(&self) -> bool {
        self.0.is_some()
    }

    fn into_inner(self) -> Option<Contact> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn flat_triangle() -> Triangle {
        Triangle::new(
            Point3::new(-2.0, 2.0, 3.0),
            Point3::new(2.0, 0.0, 3.0),
            Point3::new(-2.0, -2.0, 3.0),
            None,
        )
    }

    /// Plane `z = 3 + x * tan(angle)` around the origin.
    fn skewed_triangle(degrees: f64) -> Triangle {
        let rise = 2.0 * degrees.to_radians().tan();
        Triangle::new(
            Point3::new(-2.0, 2.0, 3.0 - rise),
            Point3::new(2.0, 0.0, 3.0 + rise),
            Point3::new(-2.0, -2.0, 3.0 - rise),
            None,
        )
    }

    #[test]
    fn test_validation() {
        assert!(Cutter::cylindrical(0.0).is_err());
        assert!(Cutter::spherical(-1.0).is_err());
        assert!(Cutter::toroidal(1.0, 1.0).is_err());
        assert!(Cutter::toroidal(1.0, 0.0).is_err());
        let mut c = Cutter::toroidal(1.0, 0.25).unwrap();
        assert!(c.set_required_distance(-0.1).is_err());
        c.set_required_distance(0.5).unwrap();
        assert_abs_diff_eq!(c.distance_radius(), 1.5);
        assert_eq!(c.torus_radii(0.25), (1.25, 0.75));
    }

    #[test]
    fn test_center_and_footprint() {
        let mut c = Cutter::spherical(2.0).unwrap();
        c.moveto(Point3::new(1.0, 1.0, 1.0));
        assert_eq!(c.center(), Point3::new(1.0, 1.0, 3.0));
        assert_eq!(c.footprint(&Point3::new(0.0, 0.0, 0.0)), [-2.0, 2.0, -2.0, 2.0]);
        let t = Cutter::toroidal(2.0, 0.5).unwrap();
        assert_eq!(t.center(), Point3::new(0.0, 0.0, 0.5));
        assert_eq!(Cutter::cylindrical(1.0).unwrap().center(), Point3::origin());
    }

    #[test]
    fn test_cylindrical_drop() {
        let origin = Point3::origin();
        let c = Cutter::cylindrical(3.0).unwrap();
        assert_abs_diff_eq!(c.drop(&flat_triangle(), &origin).unwrap(), Point3::new(0.0, 0.0, 3.0), epsilon = 1e-9);

        // z = 2 + x / 2
        let skewed = Triangle::new(
            Point3::new(-2.0, 2.0, 1.0),
            Point3::new(2.0, 0.0, 3.0),
            Point3::new(-2.0, -2.0, 1.0),
            None,
        );
        for (radius, z) in [(1.0, 2.5), (1.5, 2.75), (1.9, 2.95)] {
            let c = Cutter::cylindrical(radius).unwrap();
            let cl = c.drop(&skewed, &origin).unwrap();
            assert_abs_diff_eq!(cl, Point3::new(0.0, 0.0, z), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_spherical_drop_flat() {
        let c = Cutter::spherical(3.0).unwrap();
        let cl = c.drop(&flat_triangle(), &Point3::origin()).unwrap();
        assert_abs_diff_eq!(cl, Point3::new(0.0, 0.0, 3.0), epsilon = 1e-9);
    }

    #[test]
    fn test_spherical_drop_on_slopes() {
        for degrees in [30.0, 45.0, 60.0] {
            for radius in [0.1, 0.5, 1.0] {
                let c = Cutter::spherical(radius).unwrap();
                let cl = c.drop(&skewed_triangle(degrees), &Point3::origin()).unwrap();
                let offset = radius * (1.0 / f64::to_radians(degrees).cos() - 1.0);
                assert_abs_diff_eq!(cl.z, 3.0 + offset, epsilon = 1e-9);
                assert_abs_diff_eq!(cl.x, 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_toroidal_drop_flat() {
        let c = Cutter::toroidal(1.0, 0.25).unwrap();
        let cl = c.drop(&flat_triangle(), &Point3::new(0.0, 0.0, 10.0)).unwrap();
        assert_abs_diff_eq!(cl.z, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_toroidal_drop_on_slope() {
        // 45 degrees: torus centre circle offset plus the rounded corner
        let c = Cutter::toroidal(1.0, 0.25).unwrap();
        let cl = c.drop(&skewed_triangle(45.0), &Point3::new(0.0, 0.0, 10.0)).unwrap();
        let expected = 3.0 + 0.75 + 0.25 * (2f64.sqrt() - 1.0);
        assert_abs_diff_eq!(cl.z, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_required_distance_lifts_drop() {
        let mut c = Cutter::cylindrical(1.0).unwrap();
        c.set_required_distance(0.5).unwrap();
        let cl = c.drop(&flat_triangle(), &Point3::new(0.0, 0.0, 10.0)).unwrap();
        assert_abs_diff_eq!(cl.z, 3.0, epsilon = 1e-9);
        let far = Point3::new(3.2, 0.0, 10.0);
        assert!(Cutter::cylindrical(1.0).unwrap().drop(&flat_triangle(), &far).is_none());
        assert!(c.drop(&flat_triangle(), &far).is_some());
    }

    #[test]
    fn test_drop_misses_far_triangle() {
        let c = Cutter::spherical(1.0).unwrap();
        assert!(c.drop(&flat_triangle(), &Point3::new(10.0, 10.0, 10.0)).is_none());
    }

    #[test]
    fn test_degenerate_triangle_is_skipped() {
        let degenerate = Triangle::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            None,
        );
        for c in [
            Cutter::cylindrical(1.0).unwrap(),
            Cutter::spherical(1.0).unwrap(),
            Cutter::toroidal(1.0, 0.2).unwrap(),
        ] {
            assert!(c.drop(&degenerate, &Point3::new(0.0, 0.0, 5.0)).is_none());
            assert!(c.intersect(&Vec3::x(), &degenerate, &Point3::new(-5.0, 0.0, 1.0)).is_none());
        }
    }

    #[test]
    fn test_push_against_vertical_wall() {
        // wall in the plane x = 5, facing -x
        let wall = Triangle::new(
            Point3::new(5.0, -5.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(5.0, 0.0, 10.0),
            None,
        );
        let start = Point3::new(0.0, 0.0, 1.0);
        for c in [
            Cutter::cylindrical(1.0).unwrap(),
            Cutter::spherical(1.0).unwrap(),
            Cutter::toroidal(1.0, 0.25).unwrap(),
        ] {
            let hit = c.intersect(&Vec3::x(), &wall, &start).unwrap();
            assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-9);
            assert_abs_diff_eq!(hit.cl, Point3::new(4.0, 0.0, 1.0), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_push_direction_is_normalized() {
        let wall = Triangle::new(
            Point3::new(5.0, -5.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(5.0, 0.0, 10.0),
            None,
        );
        let start = Point3::new(0.0, 0.0, 1.0);
        for c in [
            Cutter::cylindrical(1.0).unwrap(),
            Cutter::spherical(1.0).unwrap(),
            Cutter::toroidal(1.0, 0.25).unwrap(),
        ] {
            let hit = c.intersect(&Vec3::new(2.0, 0.0, 0.0), &wall, &start).unwrap();
            assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-9);
            assert_abs_diff_eq!(hit.cl, Point3::new(4.0, 0.0, 1.0), epsilon = 1e-9);
            assert!(c.intersect(&Vec3::zeros(), &wall, &start).is_none());
        }
    }

    #[test]
    fn test_cutter_serde() {
        let c = Cutter::toroidal(3.0, 0.5).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"Toroidal\""));
        let back: Cutter = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
