//! Horizontal sweeps and waterlines.
//!
//! The cutter is pushed along each grid line at a fixed height. Every
//! triangle near the line is probed forward and backward from the line
//! start; sorting those contacts along the line tells where the cutter
//! enters and leaves the material.

use millpath_math::{normalize, points_near, Point3, EPSILON};
use tracing::{debug, info, instrument};

use crate::extractor::ScanDirection;
use crate::processor::{ContourCutter, PathProcessor};
use crate::progress::{Control, ProgressCounter, ProgressEvent};
use crate::workers::Workers;
use crate::{Cutter, GeneratorSettings, Model, Move, Result, ToolpathResult};

/// A contact along the swept line.
#[derive(Debug, Clone, Copy)]
struct Hit {
    cl: Point3,
    /// Signed position along the line, measured from its start.
    d: f64,
    forward: bool,
}

/// Collision-free stretches of the segment `p1 -> p2`.
///
/// The result holds start/end pairs, so its length is always even. An
/// empty result means the whole segment lies inside the material. With
/// several models the first one is swept and every free pair is swept
/// again against the others.
pub fn free_paths(models: &[&Model], cutter: &Cutter, p1: Point3, p2: Point3) -> Vec<Point3> {
    match models {
        [] => vec![p1, p2],
        [model] => sweep(model, cutter, p1, p2),
        [first, rest @ ..] => sweep(first, cutter, p1, p2)
            .chunks_exact(2)
            .flat_map(|pair| free_paths(rest, cutter, pair[0], pair[1]))
            .collect(),
    }
}

/// Stretches of the segment `p1 -> p2` where the cutter touches material,
/// as `(enter, exit)` pairs ordered along the segment.
///
/// This is the complement of [`free_paths`]: no pairs means the segment is
/// entirely free, a single `(p1, p2)` pair that it lies inside the material
/// from end to end.
pub fn contact_intervals(
    models: &[&Model],
    cutter: &Cutter,
    p1: Point3,
    p2: Point3,
) -> Vec<(Point3, Point3)> {
    let free = free_paths(models, cutter, p1, p2);
    let bounds: Vec<Point3> = std::iter::once(p1)
        .chain(free)
        .chain(std::iter::once(p2))
        .collect();
    bounds
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .filter(|(enter, exit)| !points_near(enter, exit))
        .collect()
}

fn sweep(model: &Model, cutter: &Cutter, p1: Point3, p2: Point3) -> Vec<Point3> {
    let (Some(forward), Some(backward)) = (normalize(&(p2 - p1)), normalize(&(p1 - p2))) else {
        return vec![p1, p2];
    };
    let length = (p2 - p1).norm();
    let dr = cutter.distance_radius();

    let mut hits = Vec::new();
    for t in model.query(
        p1.x.min(p2.x) - dr,
        p1.x.max(p2.x) + dr,
        p1.y.min(p2.y) - dr,
        p1.y.max(p2.y) + dr,
    ) {
        if let Some(c) = cutter.intersect(&backward, t, &p1) {
            hits.push(Hit {
                cl: c.cl,
                d: -c.distance,
                forward: false,
            });
        }
        if let Some(c) = cutter.intersect(&forward, t, &p1) {
            hits.push(Hit {
                cl: c.cl,
                d: c.distance,
                forward: true,
            });
        }
    }
    hits.sort_by(|a, b| a.d.total_cmp(&b.d));

    let in_range = |d: f64| (-EPSILON..=length + EPSILON).contains(&d);
    let mut count = 0_i32;
    let mut points = Vec::new();
    for hit in &hits {
        if hit.forward {
            if count == 0 && in_range(hit.d) {
                if points.is_empty() {
                    points.push(p1);
                }
                points.push(hit.cl);
            }
            count += 1;
        } else {
            if count == 1 && in_range(hit.d) {
                points.push(hit.cl);
            }
            count -= 1;
        }
    }
    if points.len() % 2 == 1 {
        points.push(p2);
    }

    if points.is_empty() {
        // nothing crossed: either entirely free or entirely inside
        let inside: i32 = hits
            .iter()
            .take_while(|h| h.d < -EPSILON)
            .map(|h| if h.forward { 1 } else { -1 })
            .sum();
        if inside <= 0 {
            points.push(p1);
            points.push(p2);
        }
    }
    points
}

// ===== Generator =====

/// Generates push-cutter toolpaths over a motion grid.
///
/// Without waterlines every free stretch of a grid line becomes one cut.
/// With waterlines the stretches of each layer are stitched into closed
/// contours (using the first model only) and the contours are cut instead;
/// any further models act as obstacles for those contours.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushCutter {
    /// Follow the material outline instead of cutting along the grid.
    pub waterlines: bool,
}

impl PushCutter {
    /// Create a push-cutter generator.
    pub fn new(waterlines: bool) -> Self {
        Self { waterlines }
    }

    /// Sweep every grid line, layer by layer.
    ///
    /// Only the first and last point of each grid line are used. The
    /// callback is asked before each layer, after each line and after each
    /// reported position; on cancel the moves emitted so far are returned
    /// with `cancelled` set.
    #[instrument(skip_all, fields(waterlines = self.waterlines, models = models.len()))]
    pub fn generate_toolpath<G, L, P, F>(
        &self,
        models: &[&Model],
        cutter: &Cutter,
        grid: G,
        settings: &GeneratorSettings,
        mut callback: F,
    ) -> Result<ToolpathResult>
    where
        G: IntoIterator<Item = L>,
        L: IntoIterator<Item = P>,
        P: IntoIterator<Item = Point3>,
        F: FnMut(&ProgressEvent) -> Control,
    {
        settings.validate()?;
        let workers = Workers::new(settings)?;
        let sweep_models = if self.waterlines && !models.is_empty() {
            &models[..1]
        } else {
            models
        };

        let layers: Vec<Vec<(Point3, Point3)>> = grid
            .into_iter()
            .map(|layer| layer.into_iter().filter_map(endpoints).collect())
            .collect();
        let total: usize = layers.iter().map(Vec::len).sum();
        info!(layers = layers.len(), lines = total, "push-cutter started");

        let mut counter = ProgressCounter::new(total);
        let mut result = ToolpathResult::default();
        let mut contour = ContourCutter::new();

        'layers: for (index, layer) in layers.iter().enumerate() {
            let text = format!("PushCutter: processing layer {}/{}", index + 1, layers.len());
            if callback(&ProgressEvent::Text(text)).is_cancel() {
                result.cancelled = true;
                break;
            }
            if self.waterlines {
                contour.new_direction(ScanDirection::X);
            }
            for batch in layer.chunks(workers.batch_size()) {
                debug!(layer = index, count = batch.len(), "sweeping batch");
                let swept = workers.map(batch, |&(p1, p2)| free_paths(sweep_models, cutter, p1, p2));
                for points in swept {
                    if let Some(&last) = points.last() {
                        if self.waterlines {
                            contour.new_scanline();
                            for &p in &points {
                                contour.append(p);
                            }
                        } else {
                            push_pairs(&mut result.moves, &points);
                        }
                        if callback(&ProgressEvent::Position(Some(last))).is_cancel() {
                            result.cancelled = true;
                        }
                        if self.waterlines {
                            contour.end_scanline();
                        }
                    }
                    if counter.increment(&mut callback).is_cancel() {
                        result.cancelled = true;
                    }
                    if result.cancelled {
                        break 'layers;
                    }
                }
            }
            if self.waterlines {
                contour.end_direction();
                contour.finish();
            }
        }

        if self.waterlines {
            let obstacles = models.get(1..).unwrap_or(&[]);
            for path in contour.paths() {
                for pair in path.windows(2) {
                    if obstacles.is_empty() {
                        push_pairs(&mut result.moves, pair);
                    } else {
                        let free = free_paths(obstacles, cutter, pair[0], pair[1]);
                        push_pairs(&mut result.moves, &free);
                    }
                }
            }
        }

        info!(
            moves = result.moves.len(),
            cancelled = result.cancelled,
            "push-cutter finished"
        );
        Ok(result)
    }
}

fn endpoints<P: IntoIterator<Item = Point3>>(line: P) -> Option<(Point3, Point3)> {
    let mut iter = line.into_iter();
    let first = iter.next()?;
    let last = iter.last()?;
    Some((first, last))
}

/// One cut per start/end pair, each followed by a retract.
fn push_pairs(moves: &mut Vec<Move>, points: &[Point3]) {
    for pair in points.chunks_exact(2) {
        moves.push(Move::Straight(pair[0]));
        moves.push(Move::Straight(pair[1]));
        moves.push(Move::Safety);
    }
}
