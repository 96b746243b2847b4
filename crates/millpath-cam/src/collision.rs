//! Closed-form contact solvers between tool surfaces and mesh primitives.
//!
//! Every solver moves a tool surface (cylinder wall, flat disc, sphere or
//! torus) along a unit `direction` until it first touches a plane, a point
//! or an infinite line. The returned [`Touch`] carries the contact point on
//! the tool before moving (`ccp`), the contact point on the primitive (`cp`)
//! and the signed travel along `direction`. Negative travel means the
//! surface already overlaps the primitive at its start position.
//!
//! Solvers never check segment or triangle containment; the cutter does
//! that for the primitive it actually probes.

use millpath_geom::{Line, Plane, Triangle};
use millpath_math::{normalize, poly4_roots, Point3, Vec3, EPSILON};

/// A solver result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    /// Contact point on the tool surface at its start position.
    pub ccp: Point3,
    /// Contact point on the primitive.
    pub cp: Point3,
    /// Signed travel along the probing direction.
    pub distance: f64,
}

impl Touch {
    fn new(ccp: Point3, cp: Point3, distance: f64) -> Self {
        Self { ccp, cp, distance }
    }
}

// ===== Cylinder wall =====

/// Infinite cylinder around `axis` through `center` against a point.
pub fn cylinder_point(
    center: &Point3,
    axis: &Vec3,
    radius: f64,
    direction: &Vec3,
    point: &Point3,
) -> Option<Touch> {
    let n = normalize(&direction.cross(axis))?;
    let d = n.dot(&point.coords) - n.dot(&center.coords);
    if d.abs() > radius - EPSILON {
        return None;
    }
    let d2 = (radius * radius - d * d).sqrt();
    let ccl = center + n * d + direction * d2;
    let plane = Plane::new(ccl, *direction)?;
    let (ccp, l) = plane.intersect_point(direction, point)?;
    Some(Touch::new(ccp, *point, -l))
}

/// Infinite cylinder against the infinite line through `edge`.
pub fn cylinder_line(
    center: &Point3,
    axis: &Vec3,
    radius: f64,
    direction: &Vec3,
    edge: &Line,
) -> Option<Touch> {
    let d = edge.dir()?;
    // plane through the line, parallel to the axis
    let n = normalize(&d.cross(axis))?;
    let ccl = if n.dot(direction) < 0.0 {
        center - n * radius
    } else {
        center + n * radius
    };
    // the contact line swept along the direction
    let n2 = normalize(&direction.cross(axis))?;
    let sweep = Plane::new(ccl, n2)?;
    let (cp, _) = sweep.intersect_point(&d, &edge.p1())?;
    let front = Plane::new(ccl, *direction)?;
    let (ccp, l) = front.intersect_point(direction, &cp)?;
    let cp = ccp - direction * l;
    Some(Touch::new(ccp, cp, -l))
}

// ===== Flat disc =====

/// Flat disc of `radius` around `center` (normal `+z`) against the plane of
/// `triangle`.
pub fn circle_plane(
    center: &Point3,
    radius: f64,
    direction: &Vec3,
    triangle: &Triangle,
) -> Option<Touch> {
    let plane = triangle.plane()?;
    let mut n = triangle.normal();
    let dn = n.dot(direction);
    if dn == 0.0 {
        return None;
    }
    if dn > 0.0 {
        n = -n;
    }
    let horizontal = Vec3::new(n.x, n.y, 0.0);
    let Some(n2) = normalize(&horizontal) else {
        // plane parallel to the disc
        let (cp, d) = plane.intersect_point(direction, center)?;
        let ccp = cp - direction * d;
        return Some(Touch::new(ccp, cp, d));
    };
    let ccp = center - n2 * radius;
    let (cp, d) = plane.intersect_point(direction, &ccp)?;
    Some(Touch::new(ccp, cp, d))
}

/// Flat disc against a point. Only points that hit the disc strictly inside
/// its rim count.
pub fn circle_point(
    center: &Point3,
    axis: &Vec3,
    radius: f64,
    direction: &Vec3,
    point: &Point3,
) -> Option<Touch> {
    let base = Plane::new(*center, *axis)?;
    let (ccp, l) = base.intersect_point(direction, point)?;
    if (center - ccp).norm_squared() < radius * radius - EPSILON {
        Some(Touch::new(ccp, *point, -l))
    } else {
        None
    }
}

/// Flat disc against the infinite line through `edge`.
pub fn circle_line(
    center: &Point3,
    axis: &Vec3,
    radius: f64,
    direction: &Vec3,
    edge: &Line,
) -> Option<Touch> {
    let d = edge.dir()?;
    if d.dot(axis) == 0.0 {
        return circle_parallel_line(center, axis, radius, direction, edge, &d);
    }
    let n = normalize(&d.cross(direction))?;
    let base = Plane::new(*center, *axis)?;
    let (lp, _) = base.intersect_point(&d, &edge.p1())?;
    // the line where the swept plane cuts the disc's plane
    let v = normalize(&axis.cross(&n))?;
    let n2 = normalize(&v.cross(axis))?;
    let dist = n2.dot(&center.coords) - n2.dot(&lp.coords);
    if dist * dist > radius * radius - EPSILON {
        return None;
    }
    let dist2 = (radius * radius - dist * dist).sqrt();
    let swept = Plane::new(edge.p1(), d.cross(direction).cross(&d))?;
    // the chord meets the rim twice; the earlier contact along the direction wins
    [dist2, -dist2]
        .into_iter()
        .filter_map(|offset| {
            let ccp = center - (n2 * dist - v * offset);
            let (cp, l) = swept.intersect_point(direction, &ccp)?;
            Some(Touch::new(ccp, cp, l))
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Edge lying parallel to the disc: project it into the disc plane and take
/// an endpoint inside the disc, or the closest point if the chord spans it.
fn circle_parallel_line(
    center: &Point3,
    axis: &Vec3,
    radius: f64,
    direction: &Vec3,
    edge: &Line,
    d: &Vec3,
) -> Option<Touch> {
    if direction.dot(axis) == 0.0 {
        return None;
    }
    let base = Plane::new(*center, *axis)?;
    let (p1, l1) = base.intersect_point(direction, &edge.p1())?;
    let (p2, l2) = base.intersect_point(direction, &edge.p2())?;
    let projected = Line::new(p1, p2);
    let pc = projected.closest_point(center);
    let d_sq = (pc - center).norm_squared();
    if d_sq >= radius * radius {
        return None;
    }
    let a = (radius * radius - d_sq).sqrt();
    let d1 = (p1 - pc).dot(d);
    let d2 = (p2 - pc).dot(d);
    let (ccp, l) = if d1.abs() < a - EPSILON {
        (p1, l1)
    } else if d2.abs() < a - EPSILON {
        (p2, l2)
    } else if (d1 < -a + EPSILON && d2 > a - EPSILON) || (d2 < -a + EPSILON && d1 > a - EPSILON) {
        let span = projected.vector().norm_squared();
        let t = if span > 0.0 {
            (pc - p1).dot(&projected.vector()) / span
        } else {
            0.0
        };
        (pc, l1 + t * (l2 - l1))
    } else {
        return None;
    };
    let cp = ccp - direction * l;
    Some(Touch::new(ccp, cp, -l))
}

// ===== Sphere =====

/// Sphere against the plane of `triangle`.
pub fn sphere_plane(
    center: &Point3,
    radius: f64,
    direction: &Vec3,
    triangle: &Triangle,
) -> Option<Touch> {
    let plane = triangle.plane()?;
    let n = triangle.normal();
    let dn = n.dot(direction);
    if dn == 0.0 {
        return None;
    }
    let ccp = if dn < 0.0 {
        center - n * radius
    } else {
        center + n * radius
    };
    let (cp, d) = plane.intersect_point(direction, &ccp)?;
    Some(Touch::new(ccp, cp, d))
}

/// Sphere against a point: the smaller root of the ray/sphere quadratic.
pub fn sphere_point(
    center: &Point3,
    radius: f64,
    direction: &Vec3,
    point: &Point3,
) -> Option<Touch> {
    let p0 = center - point;
    let a = direction.norm_squared();
    if a == 0.0 {
        return None;
    }
    let b = 2.0 * p0.dot(direction);
    let c = p0.norm_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let dist = (-b - disc.sqrt()) / (2.0 * a);
    let ccp = point - direction * dist;
    Some(Touch::new(ccp, *point, dist))
}

/// Sphere against the infinite line through `edge`.
pub fn sphere_line(
    center: &Point3,
    radius: f64,
    direction: &Vec3,
    edge: &Line,
) -> Option<Touch> {
    let d = edge.dir()?;
    // plane swept by the line along the direction
    let n = normalize(&d.cross(direction))?;
    let dist = edge.p1().coords.dot(&n) - center.coords.dot(&n);
    if dist.abs() > radius - EPSILON {
        return None;
    }
    let n2 = normalize(&n.cross(&d))?;
    let dist2 = (radius * radius - dist * dist).sqrt();
    let ccp = center + n * dist + n2 * dist2;
    let plane = Plane::new(edge.p1(), n2)?;
    let (cp, l) = plane.intersect_point(direction, &ccp)?;
    Some(Touch::new(ccp, cp, l))
}

// ===== Torus =====

/// Torus (tube of `minor` radius around a circle of `major` radius) against
/// the plane of `triangle`. Planes perpendicular to the axis touch the
/// flat bottom instead and yield `None`.
pub fn torus_plane(
    center: &Point3,
    axis: &Vec3,
    major: f64,
    minor: f64,
    direction: &Vec3,
    triangle: &Triangle,
) -> Option<Touch> {
    let plane = triangle.plane()?;
    let mut n = triangle.normal();
    let dn = n.dot(direction);
    if dn == 0.0 {
        return None;
    }
    if dn > 0.0 {
        n = -n;
    }
    if n.dot(axis) == 1.0 {
        return None;
    }
    // point on the torus whose surface normal is -n
    let b = -n;
    let a = normalize(&(b - axis * axis.dot(&b)))?;
    let ccp = center + a * major + b * minor;
    let (cp, l) = plane.intersect_point(direction, &ccp)?;
    Some(Touch::new(ccp, cp, l))
}

/// Torus against a point.
///
/// Vertical and horizontal directions are solved directly; any other
/// direction takes the smallest real root of the ray/torus quartic.
pub fn torus_point(
    center: &Point3,
    axis: &Vec3,
    major: f64,
    minor: f64,
    direction: &Vec3,
    point: &Point3,
) -> Option<Touch> {
    if direction.x == 0.0 && direction.y == 0.0 {
        let min_sq = (major - minor).powi(2);
        let max_sq = (major + minor).powi(2);
        let l_sq = (point.x - center.x).powi(2) + (point.y - center.y).powi(2);
        if l_sq < min_sq + EPSILON || l_sq > max_sq - EPSILON {
            return None;
        }
        let z_sq = minor * minor - (major - l_sq.sqrt()).powi(2);
        if z_sq < 0.0 {
            return None;
        }
        let ccp = Point3::new(point.x, point.y, center.z - z_sq.sqrt());
        let dist = ccp.z - point.z;
        return Some(Touch::new(ccp, *point, dist));
    }
    if direction.z == 0.0 {
        let z = point.z - center.z;
        if z.abs() > minor - EPSILON {
            return None;
        }
        let reach = major + (minor * minor - z * z).sqrt();
        let n = axis.cross(direction);
        let d = n.dot(&point.coords) - n.dot(&center.coords);
        if d.abs() > reach - EPSILON {
            return None;
        }
        let a = (reach * reach - d * d).sqrt();
        let mut ccp = center + n * d + direction * a;
        ccp.z = point.z;
        let dist = (point - ccp).dot(direction);
        return Some(Touch::new(ccp, *point, dist));
    }
    let x = point - center;
    let v = -direction;
    let x_x = x.dot(&x);
    let x_v = x.dot(&v);
    let x1 = Vec3::new(x.x, x.y, 0.0);
    let v1 = Vec3::new(v.x, v.y, 0.0);
    let r2_major = major * major;
    let r2_minor = minor * minor;
    let diff = r2_major - r2_minor;
    let b = 4.0 * x_v;
    let c = 2.0 * (x_x + 2.0 * x_v * x_v + diff - 2.0 * r2_major * v1.dot(&v1));
    let d = 4.0 * (x_x * x_v + x_v * diff - 2.0 * r2_major * x1.dot(&v1));
    let e = x_x * x_x + 2.0 * x_x * diff + diff * diff - 4.0 * r2_major * x1.dot(&x1);
    let l = poly4_roots(1.0, b, c, d, e)
        .into_iter()
        .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |m| m.min(r))))?;
    let ccp = point - direction * l;
    Some(Touch::new(ccp, *point, l))
}
