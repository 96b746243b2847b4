#![warn(missing_docs)]

//! Geometry primitives for the millpath collision engine.
//!
//! All primitives are plain data with eagerly computed derived fields
//! (direction, length, bounds, circumcircle). They hold no references to
//! each other; operations that need several kinds of primitive take them
//! as explicit arguments.
//!
//! # Example
//!
//! ```
//! use millpath_geom::{Plane, Triangle};
//! use millpath_math::{Point3, Vec3};
//!
//! let tri = Triangle::new(
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 1.0),
//!     Point3::new(1.0, 0.0, 1.0),
//!     None,
//! );
//! let plane = Plane::new(Point3::new(0.0, 0.0, 0.5), Vec3::z()).unwrap();
//! let waterline = plane.intersect_triangle(&tri, false).unwrap();
//! assert!((waterline.len() - 0.5f64.hypot(0.5)).abs() < 1e-9);
//! ```

mod bounds;
mod line;
mod plane;
mod triangle;

pub use bounds::Bounds3;
pub use line::Line;
pub use plane::Plane;
pub use triangle::{Circumcircle, Triangle};
