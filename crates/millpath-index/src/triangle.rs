//! 2D range index over triangle footprints.

use millpath_geom::Triangle;

use crate::{KdTree, Node, Result};

/// Default bucket size of a [`TriangleIndex`].
pub const DEFAULT_CUTOFF: usize = 3;

/// Default bucket spread of a [`TriangleIndex`].
pub const DEFAULT_CUTOFF_DISTANCE: f64 = 1.0;

/// Index of triangle positions (into the owning model's triangle list),
/// keyed by their XY bounding rectangle `[minx, maxx, miny, maxy]`.
#[derive(Debug, Clone)]
pub struct TriangleIndex {
    tree: KdTree<usize, 4>,
}

impl TriangleIndex {
    /// Build with the default bucket parameters.
    pub fn new(triangles: &[Triangle]) -> Result<Self> {
        Self::with_params(triangles, DEFAULT_CUTOFF, DEFAULT_CUTOFF_DISTANCE)
    }

    /// Build with explicit bucket parameters.
    pub fn with_params(triangles: &[Triangle], cutoff: usize, cutoff_distance: f64) -> Result<Self> {
        let nodes = triangles
            .iter()
            .enumerate()
            .map(|(i, t)| Node::new(i, footprint(t)))
            .collect();
        Ok(Self {
            tree: KdTree::new(nodes, cutoff, cutoff_distance)?,
        })
    }

    /// Add the triangle stored at position `index`.
    pub fn insert(&mut self, index: usize, triangle: &Triangle) -> Result<()> {
        self.tree.insert(Node::new(index, footprint(triangle)))
    }

    /// Positions of all triangles whose XY bounds overlap the rectangle.
    pub fn search(&self, minx: f64, maxx: f64, miny: f64, maxy: f64) -> Vec<usize> {
        self.tree
            .search_rect(minx, maxx, miny, maxy)
            .into_iter()
            .map(|n| n.item)
            .collect()
    }

    /// Number of indexed triangles.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

fn footprint(t: &Triangle) -> [f64; 4] {
    let b = t.bounds();
    [b.min.x, b.max.x, b.min.y, b.max.y]
}
