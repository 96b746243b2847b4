#![warn(missing_docs)]

//! Toolpath generation against triangle meshes.
//!
//! A [`Cutter`] is moved over a [`Model`] along the lines of a motion grid.
//! Two generators are provided:
//!
//! - [`DropCutter`] lowers the cutter vertically onto the mesh at every grid
//!   position and records the highest contact.
//! - [`PushCutter`] sweeps the cutter horizontally along each grid line and
//!   records the intervals where it is free of the mesh, optionally joining
//!   them into closed waterline contours. [`contact_intervals`] gives the
//!   complementary stretches where the cutter touches material.
//!
//! Both accept any nested iterator of layers, lines and points; [`FixedGrid`]
//! is the stock grid. Progress is reported through a callback returning
//! [`Control`], which is also how a run is cancelled.
//!
//! # Example
//!
//! ```
//! use millpath_cam::{
//!     Control, Cutter, DropCutter, GeneratorSettings, Model,
//! };
//! use millpath_geom::Triangle;
//! use millpath_math::Point3;
//!
//! let model = Model::new(vec![Triangle::new(
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(0.0, 10.0, 1.0),
//!     Point3::new(10.0, 0.0, 1.0),
//!     None,
//! )])
//! .unwrap();
//! let cutter = Cutter::spherical(0.5).unwrap();
//!
//! let grid = vec![vec![vec![Point3::new(1.0, 1.0, 0.0), Point3::new(2.0, 1.0, 0.0)]]];
//! let settings = GeneratorSettings::default();
//! let result = DropCutter::new()
//!     .generate_toolpath(&model, &cutter, grid, &settings, |_| Control::Continue)
//!     .unwrap();
//!
//! assert_eq!(result.straight_count(), 2);
//! assert!(result.positions().iter().all(|p| (p.z - 1.0).abs() < 1e-9));
//! ```

pub mod collision;
mod cutter;
mod dropcutter;
mod error;
pub mod extractor;
mod grid;
mod model;
pub mod processor;
mod progress;
mod pushcutter;
mod settings;
mod toolpath;
mod workers;

pub use cutter::{Contact, Cutter, CutterShape};
pub use dropcutter::{max_height, max_height_dynamic, DropCutter};
pub use error::{CamError, Result};
pub use extractor::{Policy, PolygonExtractor, ScanDirection};
pub use grid::{
    fixed_grid_layer, fixed_grid_line, float_range, float_range_steps, FixedGrid, FloatRange,
    GridDirection, GridLine, GridLineIter, GridParams, Layer, MillingStyle, StartPosition,
};
pub use model::{Model, ModelBuilder};
pub use processor::{ContourCutter, PathProcessor, PolygonCutter};
pub use progress::{Control, ProgressCounter, ProgressEvent};
pub use pushcutter::{contact_intervals, free_paths, PushCutter};
pub use settings::{GeneratorSettings, MAX_OVERSAMPLE_DEPTH};
pub use toolpath::{Move, ToolpathResult};
