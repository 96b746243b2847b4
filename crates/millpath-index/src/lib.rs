#![warn(missing_docs)]

//! Spatial indexes for the millpath collision engine.
//!
//! - [`KdTree`]: a median-split k-d tree over fixed-dimension bounds, with
//!   exact branch-and-bound nearest neighbour search.
//! - [`TriangleIndex`]: the 4D `[minx, maxx, miny, maxy]` specialization
//!   answering "which triangles overlap this rectangle" queries.
//! - [`VertexWelder`]: deduplicates nearly coincident vertices while a mesh
//!   is being assembled.

mod error;
mod kdtree;
mod triangle;
mod welder;

pub use error::{IndexError, Result};
pub use kdtree::{KdTree, Metric, Node, SquaredEuclidean};
pub use triangle::{TriangleIndex, DEFAULT_CUTOFF, DEFAULT_CUTOFF_DISTANCE};
pub use welder::{VertexId, VertexWelder};
