//! Vertex deduplication while a mesh is assembled.

use millpath_math::{Point3, EPSILON};
use tracing::trace;

use crate::{IndexError, KdTree, Node, Result, SquaredEuclidean};

/// Handle of a welded vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// Merges vertices closer than a tolerance into one shared vertex.
///
/// The welder is owned by whoever is assembling a mesh (an importer, a
/// model builder) and lives only as long as that job.
#[derive(Debug, Clone)]
pub struct VertexWelder {
    tree: KdTree<VertexId, 3>,
    vertices: Vec<Point3>,
    tolerance: f64,
    last: Option<([f64; 3], VertexId)>,
}

impl VertexWelder {
    /// Welder with bucket size 3, bucket spread 1.0 and tolerance [`EPSILON`].
    pub fn new() -> Self {
        Self {
            tree: KdTree::default(),
            vertices: Vec::new(),
            tolerance: EPSILON,
            last: None,
        }
    }

    /// Welder with explicit parameters. `tolerance` bounds the squared
    /// distance under which two points are the same vertex.
    pub fn with_params(cutoff: usize, cutoff_distance: f64, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(IndexError::InvalidTolerance(tolerance));
        }
        Ok(Self {
            tree: KdTree::empty(cutoff, cutoff_distance)?,
            vertices: Vec::new(),
            tolerance,
            last: None,
        })
    }

    /// Resolve `p` to a vertex, creating one if no existing vertex is close
    /// enough.
    pub fn weld(&mut self, p: &Point3) -> Result<VertexId> {
        let key = [p.x, p.y, p.z];
        if let Some((last_key, id)) = self.last {
            if last_key == key {
                return Ok(id);
            }
        }
        if let Some((node, dist)) = self.tree.nearest_neighbor(&key, &SquaredEuclidean) {
            if dist < self.tolerance {
                let id = node.item;
                self.last = Some((key, id));
                return Ok(id);
            }
        }
        let id = VertexId(self.vertices.len());
        self.tree.insert(Node::new(id, key))?;
        self.vertices.push(*p);
        self.last = Some((key, id));
        trace!(?id, "new vertex");
        Ok(id)
    }

    /// Position of a welded vertex.
    pub fn vertex(&self, id: VertexId) -> Option<Point3> {
        self.vertices.get(id.0).copied()
    }

    /// All welded vertices, indexed by [`VertexId`].
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// Number of distinct vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// `true` before the first weld.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

impl Default for VertexWelder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_point_same_vertex() {
        let mut w = VertexWelder::new();
        let a = w.weld(&Point3::new(1.0, 2.0, 3.0)).unwrap();
        let b = w.weld(&Point3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_within_tolerance_merges() {
        let mut w = VertexWelder::new();
        let a = w.weld(&Point3::new(0.0, 0.0, 0.0)).unwrap();
        w.weld(&Point3::new(5.0, 5.0, 5.0)).unwrap();
        let b = w.weld(&Point3::new(1e-4, 0.0, 0.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(w.vertex(b), Some(Point3::origin()));
    }

    #[test]
    fn test_distant_points_stay_apart() {
        let mut w = VertexWelder::new();
        let a = w.weld(&Point3::new(0.0, 0.0, 0.0)).unwrap();
        let b = w.weld(&Point3::new(0.01, 0.0, 0.0)).unwrap();
        assert_ne!(a, b);
        assert_eq!(w.vertices().len(), 2);
    }

    #[test]
    fn test_many_vertices() {
        let mut w = VertexWelder::new();
        for round in 0..2 {
            for i in 0..50 {
                let p = Point3::new(i as f64 * 0.7, (i % 5) as f64, 0.0);
                let id = w.weld(&p).unwrap();
                assert_eq!(id, VertexId(i), "round {round}");
            }
        }
        assert_eq!(w.len(), 50);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut w = VertexWelder::new();
        assert!(w.weld(&Point3::new(f64::NAN, 0.0, 0.0)).is_err());
        assert!(w.is_empty());
        assert!(VertexWelder::with_params(3, 1.0, -1.0).is_err());
    }
}
