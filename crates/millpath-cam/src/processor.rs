//! Turning scanline crossings into cutting paths.

use millpath_math::{is_collinear_step, Point3, Vec3};

use crate::extractor::{Policy, PolygonExtractor, ScanDirection};

/// Consumer of scanline results, fed in the same call order as a
/// [`PolygonExtractor`].
pub trait PathProcessor {
    /// Start a pass of scanlines along `direction`.
    fn new_direction(&mut self, direction: ScanDirection);
    /// End the current pass.
    fn end_direction(&mut self);
    /// Start a scanline.
    fn new_scanline(&mut self);
    /// Add a point of the current scanline.
    fn append(&mut self, point: Point3);
    /// End the current scanline.
    fn end_scanline(&mut self);
    /// Convert everything collected into paths.
    fn finish(&mut self);
    /// Paths produced so far, upper paths first.
    fn paths(&self) -> &[Vec<Point3>];
}

/// Remove every point whose incoming and outgoing directions agree.
pub fn simplify_path(points: &mut Vec<Point3>) {
    let mut i = 1;
    while i + 1 < points.len() {
        if is_collinear_step(&points[i - 1], &points[i], &points[i + 1]) {
            points.remove(i);
        } else {
            i += 1;
        }
    }
}

/// Stable reorder by the height of each path's first point.
pub fn sort_layered(paths: &mut [Vec<Point3>], upper_first: bool) {
    let height = |p: &Vec<Point3>| p.first().map_or(f64::NEG_INFINITY, |q| q.z);
    if upper_first {
        paths.sort_by(|a, b| height(b).total_cmp(&height(a)));
    } else {
        paths.sort_by(|a, b| height(a).total_cmp(&height(b)));
    }
}

// ===== Contour =====

/// Builds closed waterline contours from push-cutter sweeps.
///
/// Every scanline is expected to hold the free-path points of one sweep:
/// the two line ends plus the enter/exit pairs between them. The ends are
/// dropped; the pairs are fed to a contour [`PolygonExtractor`].
#[derive(Debug, Clone, Default)]
pub struct ContourCutter {
    extractor: Option<PolygonExtractor>,
    points: Vec<Point3>,
    paths: Vec<Vec<Point3>>,
}

impl ContourCutter {
    /// Empty processor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathProcessor for ContourCutter {
    fn new_direction(&mut self, direction: ScanDirection) {
        self.extractor
            .get_or_insert_with(|| PolygonExtractor::new(Policy::Contour))
            .new_direction(direction);
    }

    fn end_direction(&mut self) {
        if let Some(extractor) = self.extractor.as_mut() {
            extractor.end_direction();
        }
    }

    fn new_scanline(&mut self) {
        if let Some(extractor) = self.extractor.as_mut() {
            extractor.new_scanline();
        }
        self.points.clear();
    }

    /// Points are kept sorted along `(1, 1, 0)`.
    fn append(&mut self, point: Point3) {
        let forward = Vec3::new(1.0, 1.0, 0.0);
        match self.points.first() {
            Some(first) if (point - first).dot(&forward) < 0.0 => self.points.insert(0, point),
            _ => self.points.push(point),
        }
    }

    fn end_scanline(&mut self) {
        let Some(extractor) = self.extractor.as_mut() else {
            return;
        };
        if self.points.len() > 2 {
            for &p in &self.points[1..self.points.len() - 1] {
                extractor.append(p);
            }
        }
        extractor.end_scanline();
    }

    fn finish(&mut self) {
        let Some(extractor) = self.extractor.take() else {
            return;
        };
        let out = extractor.finish();
        let mut paths = if !out.merged.is_empty() {
            out.merged
        } else if !out.horizontal.is_empty() {
            out.horizontal
        } else {
            out.vertical
        };
        if paths.is_empty() {
            return;
        }
        for path in &mut paths {
            if let Some(&first) = path.first() {
                path.push(first);
            }
            simplify_path(path);
        }
        self.paths.extend(paths);
        sort_layered(&mut self.paths, true);
    }

    fn paths(&self) -> &[Vec<Point3>] {
        &self.paths
    }
}

// ===== Polygon =====

/// Clears extracted polygons with zig-zag passes.
///
/// Each monotone polygon is walked from both ends at once; the pairs
/// `(points[i], points[n - 1 - i])` become single passes in alternating
/// direction.
#[derive(Debug, Clone)]
pub struct PolygonCutter {
    extractor: PolygonExtractor,
    reverse: bool,
    paths: Vec<Vec<Point3>>,
}

impl PolygonCutter {
    /// Processor emitting passes in scan order, or reversed.
    pub fn new(reverse: bool) -> Self {
        Self {
            extractor: PolygonExtractor::new(Policy::Monotone),
            reverse,
            paths: Vec::new(),
        }
    }
}

impl Default for PolygonCutter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PathProcessor for PolygonCutter {
    fn new_direction(&mut self, direction: ScanDirection) {
        self.extractor.new_direction(direction);
    }

    fn end_direction(&mut self) {
        self.extractor.end_direction();
    }

    fn new_scanline(&mut self) {
        self.extractor.new_scanline();
    }

    fn append(&mut self, point: Point3) {
        self.extractor.append(point);
    }

    fn end_scanline(&mut self) {
        self.extractor.end_scanline();
    }

    fn finish(&mut self) {
        let extractor = std::mem::replace(&mut self.extractor, PolygonExtractor::new(Policy::Monotone));
        let out = extractor.finish();
        let mut passes = Vec::new();
        for polygon in out.horizontal.iter().chain(&out.vertical) {
            let n = polygon.len();
            for i in 0..n.div_ceil(2) {
                let (a, b) = (polygon[i], polygon[n - 1 - i]);
                passes.push(if i % 2 == 0 { vec![a, b] } else { vec![b, a] });
            }
        }
        if passes.is_empty() {
            return;
        }
        for pass in &mut passes {
            simplify_path(pass);
            if self.reverse {
                pass.reverse();
            }
        }
        self.paths.extend(passes);
        sort_layered(&mut self.paths, true);
    }

    fn paths(&self) -> &[Vec<Point3>] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn sweep_lines(z: f64, enter: f64, exit: f64) -> Vec<Vec<Point3>> {
        [1.0, 2.0, 3.0]
            .iter()
            .map(|&y| vec![p(-5.0, y, z), p(enter, y, z), p(exit, y, z), p(10.0, y, z)])
            .collect()
    }

    fn feed(processor: &mut impl PathProcessor, lines: &[Vec<Point3>]) {
        processor.new_direction(ScanDirection::X);
        for line in lines {
            processor.new_scanline();
            for &point in line {
                processor.append(point);
            }
            processor.end_scanline();
        }
        processor.end_direction();
        processor.finish();
    }

    #[test]
    fn test_simplify_path() {
        let mut path = vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 1.0, 0.0)];
        simplify_path(&mut path);
        assert_eq!(path, vec![p(0.0, 0.0, 0.0), p(2.0, 0.0, 0.0), p(2.0, 1.0, 0.0)]);

        // coincident points have no direction and stay
        let mut path = vec![p(0.0, 0.0, 0.0), p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)];
        simplify_path(&mut path);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_sort_layered_is_stable() {
        let mut paths = vec![
            vec![p(0.0, 0.0, 1.0)],
            vec![p(1.0, 0.0, 2.0)],
            vec![p(2.0, 0.0, 1.0)],
        ];
        sort_layered(&mut paths, true);
        assert_eq!(paths[0][0].x, 1.0);
        assert_eq!(paths[1][0].x, 0.0);
        assert_eq!(paths[2][0].x, 2.0);
        sort_layered(&mut paths, false);
        assert_eq!(paths[2][0].x, 1.0);
    }

    #[test]
    fn test_contour_closes_rectangle() {
        let mut lines = sweep_lines(1.0, 1.0, 4.0);
        lines[1].reverse();
        let mut cutter = ContourCutter::new();
        feed(&mut cutter, &lines);
        assert_eq!(
            cutter.paths(),
            &[vec![
                p(1.0, 1.0, 1.0),
                p(1.0, 3.0, 1.0),
                p(4.0, 3.0, 1.0),
                p(4.0, 1.0, 1.0),
                p(1.0, 1.0, 1.0)
            ]]
        );
    }

    #[test]
    fn test_contour_layers_upper_first() {
        let mut cutter = ContourCutter::new();
        feed(&mut cutter, &sweep_lines(1.0, 1.0, 4.0));
        feed(&mut cutter, &sweep_lines(2.0, 2.0, 3.0));
        let paths = cutter.paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0][0], p(2.0, 1.0, 2.0));
        assert_eq!(paths[1][0], p(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_contour_ignores_free_lines() {
        let mut cutter = ContourCutter::new();
        let lines: Vec<Vec<Point3>> = (1..4)
            .map(|y| vec![p(-5.0, y as f64, 0.0), p(10.0, y as f64, 0.0)])
            .collect();
        feed(&mut cutter, &lines);
        assert!(cutter.paths().is_empty());
    }

    #[test]
    fn test_polygon_cutter_zigzag() {
        let lines: Vec<Vec<Point3>> = [1.0, 2.0, 3.0]
            .iter()
            .map(|&y| vec![p(1.0, y, 0.0), p(4.0, y, 0.0)])
            .collect();
        let mut cutter = PolygonCutter::default();
        feed(&mut cutter, &lines);
        assert_eq!(
            cutter.paths(),
            &[
                vec![p(1.0, 1.0, 0.0), p(4.0, 1.0, 0.0)],
                vec![p(4.0, 2.0, 0.0), p(1.0, 2.0, 0.0)],
                vec![p(1.0, 3.0, 0.0), p(4.0, 3.0, 0.0)],
            ]
        );

        let mut reversed = PolygonCutter::new(true);
        feed(&mut reversed, &lines);
        assert_eq!(reversed.paths()[0], vec![p(4.0, 1.0, 0.0), p(1.0, 1.0, 0.0)]);
    }
}
