//! Triangle models with a 2D range index.

use millpath_geom::{Bounds3, Line, Plane, Triangle};
use millpath_index::{TriangleIndex, VertexWelder, DEFAULT_CUTOFF, DEFAULT_CUTOFF_DISTANCE};
use millpath_math::{Point3, Transform, Vec3};
use tracing::{debug, warn};

use crate::{GeneratorSettings, Result};

/// An immutable triangle mesh plus the index used to find the triangles
/// below a cutter.
///
/// Triangles live in one arena; the index refers to them by position.
/// Degenerate triangles are kept (so positions stay stable) but never take
/// part in a collision query.
#[derive(Debug, Clone)]
pub struct Model {
    triangles: Vec<Triangle>,
    index: TriangleIndex,
    bounds: Option<Bounds3>,
    degenerate: usize,
    cutoff: usize,
    cutoff_distance: f64,
}

impl Model {
    /// Build a model with the default index parameters.
    pub fn new(triangles: Vec<Triangle>) -> Result<Self> {
        Self::with_index_params(triangles, DEFAULT_CUTOFF, DEFAULT_CUTOFF_DISTANCE)
    }

    /// Build a model with explicit index bucket parameters.
    pub fn with_index_params(
        triangles: Vec<Triangle>,
        cutoff: usize,
        cutoff_distance: f64,
    ) -> Result<Self> {
        let index = TriangleIndex::with_params(&triangles, cutoff, cutoff_distance)?;
        let bounds = triangles.iter().fold(None, |acc: Option<Bounds3>, t| match acc {
            Some(b) => Some(b.union(t.bounds())),
            None => Some(*t.bounds()),
        });
        let degenerate = triangles.iter().filter(|t| t.is_degenerate()).count();
        if degenerate > 0 {
            warn!(degenerate, total = triangles.len(), "model contains degenerate triangles");
        }
        debug!(triangles = triangles.len(), "model indexed");
        Ok(Self {
            triangles,
            index,
            bounds,
            degenerate,
            cutoff,
            cutoff_distance,
        })
    }

    /// All triangles, in insertion order.
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Number of triangles (degenerate ones included).
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    /// `true` for a model without triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounds of all triangles, `None` for an empty model.
    pub fn bounds(&self) -> Option<Bounds3> {
        self.bounds
    }

    /// Number of triangles skipped by collision queries.
    pub fn degenerate_count(&self) -> usize {
        self.degenerate
    }

    /// Non-degenerate triangles whose XY bounds overlap the rectangle.
    pub fn query(
        &self,
        minx: f64,
        maxx: f64,
        miny: f64,
        maxy: f64,
    ) -> impl Iterator<Item = &Triangle> + '_ {
        self.index
            .search(minx, maxx, miny, maxy)
            .into_iter()
            .filter_map(move |i| self.triangles.get(i))
            .filter(|t| !t.is_degenerate())
    }

    /// A single model holding the triangles of all given models.
    pub fn combine<'a>(models: impl IntoIterator<Item = &'a Model>) -> Result<Self> {
        let triangles = models
            .into_iter()
            .flat_map(|m| m.triangles.iter().cloned())
            .collect();
        Self::new(triangles)
    }

    /// A transformed copy; the index is rebuilt.
    pub fn transformed(&self, t: &Transform) -> Result<Self> {
        let triangles = self.triangles.iter().map(|tri| tri.transformed(t)).collect();
        Self::with_index_params(triangles, self.cutoff, self.cutoff_distance)
    }

    /// A copy with every triangle split `4^depth` times.
    pub fn subdivided(&self, depth: u32) -> Result<Self> {
        let triangles = self
            .triangles
            .iter()
            .flat_map(|tri| tri.subdivide(depth))
            .collect();
        Self::with_index_params(triangles, self.cutoff, self.cutoff_distance)
    }

    /// Segments where the model crosses `plane`, each oriented
    /// counter-clockwise around the material.
    pub fn waterline(&self, plane: &Plane) -> Vec<Line> {
        self.triangles
            .iter()
            .filter(|t| !t.is_degenerate())
            .filter_map(|t| plane.intersect_triangle(t, true))
            .collect()
    }
}

/// Assembles a [`Model`] from loose triangles, welding shared corners so
/// neighbouring triangles use bit-identical vertices.
///
/// The builder owns the welder for the lifetime of one import.
#[derive(Debug)]
pub struct ModelBuilder {
    welder: VertexWelder,
    triangles: Vec<Triangle>,
    cutoff: usize,
    cutoff_distance: f64,
}

impl ModelBuilder {
    /// Builder with default welding and index parameters.
    pub fn new() -> Self {
        Self {
            welder: VertexWelder::new(),
            triangles: Vec::new(),
            cutoff: DEFAULT_CUTOFF,
            cutoff_distance: DEFAULT_CUTOFF_DISTANCE,
        }
    }

    /// Builder using the index and weld parameters of `settings`.
    pub fn with_settings(settings: &GeneratorSettings) -> Result<Self> {
        Ok(Self {
            welder: VertexWelder::with_params(
                settings.kdtree_cutoff,
                settings.kdtree_cutoff_distance,
                settings.weld_tolerance,
            )?,
            triangles: Vec::new(),
            cutoff: settings.kdtree_cutoff,
            cutoff_distance: settings.kdtree_cutoff_distance,
        })
    }

    /// Add a triangle; corners are welded against all earlier corners.
    pub fn add_triangle(
        &mut self,
        p1: Point3,
        p2: Point3,
        p3: Point3,
        normal: Option<Vec3>,
    ) -> Result<()> {
        let mut corners = [p1, p2, p3];
        for corner in corners.iter_mut() {
            let id = self.welder.weld(corner)?;
            if let Some(v) = self.welder.vertex(id) {
                *corner = v;
            }
        }
        let [p1, p2, p3] = corners;
        self.triangles.push(Triangle::new(p1, p2, p3, normal));
        Ok(())
    }

    /// Number of distinct vertices so far.
    pub fn vertex_count(&self) -> usize {
        self.welder.len()
    }

    /// Number of triangles so far.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Finish the import.
    pub fn build(self) -> Result<Model> {
        Model::with_index_params(self.triangles, self.cutoff, self.cutoff_distance)
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Two triangles forming the square `[0, 2] x [0, 2]` at height `z`.
    fn square(z: f64) -> Vec<Triangle> {
        vec![
            Triangle::new(
                Point3::new(0.0, 0.0, z),
                Point3::new(0.0, 2.0, z),
                Point3::new(2.0, 0.0, z),
                None,
            ),
            Triangle::new(
                Point3::new(2.0, 0.0, z),
                Point3::new(0.0, 2.0, z),
                Point3::new(2.0, 2.0, z),
                None,
            ),
        ]
    }

    #[test]
    fn test_bounds_and_len() {
        let model = Model::new(square(1.0)).unwrap();
        assert_eq!(model.len(), 2);
        let b = model.bounds().unwrap();
        assert_eq!(b.min, Point3::new(0.0, 0.0, 1.0));
        assert_eq!(b.max, Point3::new(2.0, 2.0, 1.0));
        assert!(Model::new(Vec::new()).unwrap().bounds().is_none());
    }

    #[test]
    fn test_query_skips_degenerate() {
        let mut triangles = square(0.0);
        triangles.push(Triangle::new(
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.5, 1.0, 0.0),
            None,
        ));
        let model = Model::new(triangles).unwrap();
        assert_eq!(model.degenerate_count(), 1);
        assert_eq!(model.query(0.9, 1.1, 0.9, 1.1).count(), 2);
        assert_eq!(model.query(5.0, 6.0, 5.0, 6.0).count(), 0);
    }

    #[test]
    fn test_combine_and_transform() {
        let a = Model::new(square(0.0)).unwrap();
        let b = Model::new(square(1.0)).unwrap();
        let both = Model::combine([&a, &b]).unwrap();
        assert_eq!(both.len(), 4);
        let moved = both.transformed(&Transform::translation(10.0, 0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(moved.bounds().unwrap().min.x, 10.0);
        assert_eq!(moved.query(10.5, 11.0, 0.5, 1.0).count(), 4);
        assert_eq!(moved.query(0.5, 1.0, 0.5, 1.0).count(), 0);
    }

    #[test]
    fn test_subdivided() {
        let model = Model::new(square(0.0)).unwrap().subdivided(1).unwrap();
        assert_eq!(model.len(), 8);
    }

    #[test]
    fn test_waterline_of_pyramid_side() {
        let model = Model::new(vec![Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 2.0),
            Point3::new(2.0, 0.0, 2.0),
            None,
        )])
        .unwrap();
        let plane = Plane::new(Point3::new(0.0, 0.0, 1.0), Vec3::z()).unwrap();
        let lines = model.waterline(&plane);
        assert_eq!(lines.len(), 1);
        assert_abs_diff_eq!(lines[0].p1().z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_builder_welds_shared_corners() {
        let mut builder = ModelBuilder::new();
        builder
            .add_triangle(
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                None,
            )
            .unwrap();
        builder
            .add_triangle(
                Point3::new(1.0 + 1e-4, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                None,
            )
            .unwrap();
        assert_eq!(builder.vertex_count(), 4);
        assert_eq!(builder.triangle_count(), 2);
        let model = builder.build().unwrap();
        assert_eq!(model.triangles()[1].p1(), Point3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_builder_rejects_nan() {
        let mut builder = ModelBuilder::new();
        let nan = Point3::new(f64::NAN, 0.0, 0.0);
        assert!(builder
            .add_triangle(nan, Point3::origin(), Point3::new(1.0, 0.0, 0.0), None)
            .is_err());
    }
}
