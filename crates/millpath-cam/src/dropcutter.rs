//! Drop-probe toolpaths.
//!
//! The cutter is lowered at each grid position until it rests on the model.
//! Where neighbouring heights bend, extra probes are inserted between them;
//! straight runs are thinned out again before the moves are emitted.

use millpath_math::{points_in_line, Point3, EPSILON};
use tracing::{debug, info, instrument};

use crate::progress::{Control, ProgressCounter, ProgressEvent};
use crate::workers::Workers;
use crate::{Cutter, GeneratorSettings, Model, Move, Result, ToolpathResult};

/// Cutter location at `(x, y)` after dropping from `maxz`.
///
/// The highest contact over all triangles below the cutter footprint wins.
/// Without contact, or below `minz`, the cutter rests at `minz`. A contact
/// above `maxz` means the position cannot be reached and yields `None`.
pub fn max_height(
    model: &Model,
    cutter: &Cutter,
    x: f64,
    y: f64,
    minz: f64,
    maxz: f64,
) -> Option<Point3> {
    let start = Point3::new(x, y, maxz);
    let [minx, maxx, miny, maxy] = cutter.footprint(&start);
    let height = model
        .query(minx, maxx, miny, maxy)
        .filter_map(|t| cutter.drop(t, &start))
        .map(|cl| cl.z)
        .fold(None, |acc: Option<f64>, z| match acc {
            Some(h) if h >= z => Some(h),
            _ => Some(z),
        });
    match height {
        Some(h) if h >= minz + EPSILON => (h <= maxz + EPSILON).then(|| Point3::new(x, y, h)),
        _ => Some(Point3::new(x, y, minz)),
    }
}

/// Probe every position of one line, oversampling up to `max_depth` levels
/// where the heights bend, then drop points in line with both neighbours.
///
/// Only the x and y coordinates of `positions` are used.
pub fn max_height_dynamic(
    model: &Model,
    cutter: &Cutter,
    positions: &[Point3],
    minz: f64,
    maxz: f64,
    max_depth: u32,
) -> Vec<Option<Point3>> {
    let probe = |x: f64, y: f64| max_height(model, cutter, x, y, minz, maxz);
    let probed = positions.iter().map(|p| probe(p.x, p.y)).collect();
    filter_linear(oversample(probed, &probe, max_depth))
}

/// Height limits of a run: explicit settings win, otherwise the model's z
/// extent with the top raised by the cutter radius.
fn height_limits(model: &Model, cutter: &Cutter, settings: &GeneratorSettings) -> (f64, f64) {
    let bounds = model.bounds();
    let minz = settings
        .minz
        .or_else(|| bounds.map(|b| b.min.z))
        .unwrap_or(0.0);
    let maxz = settings
        .maxz
        .or_else(|| bounds.map(|b| b.max.z + cutter.distance_radius()))
        .unwrap_or(minz);
    (minz, maxz.max(minz))
}

fn in_line(p1: &Option<Point3>, p2: &Option<Point3>, p3: &Option<Point3>) -> bool {
    match (p1, p2, p3) {
        (Some(a), Some(b), Some(c)) => points_in_line(a, b, c),
        _ => false,
    }
}

/// Probe midpoints between `start` and `end` until they line up.
fn fill_between<P>(start: &Point3, end: &Point3, probe: &P, levels: u32, out: &mut Vec<Option<Point3>>)
where
    P: Fn(f64, f64) -> Option<Point3>,
{
    if levels == 0 {
        return;
    }
    let Some(middle) = probe((start.x + end.x) / 2.0, (start.y + end.y) / 2.0) else {
        return;
    };
    if points_in_line(start, &middle, end) {
        return;
    }
    fill_between(start, &middle, probe, levels - 1, out);
    out.push(Some(middle));
    fill_between(&middle, end, probe, levels - 1, out);
}

fn oversample<P>(points: Vec<Option<Point3>>, probe: &P, max_depth: u32) -> Vec<Option<Point3>>
where
    P: Fn(f64, f64) -> Option<Point3>,
{
    let n = points.len();
    if max_depth == 0 || n < 2 {
        return points;
    }
    let mut out = Vec::with_capacity(n);
    let mut last_filled = false;
    for w in points.windows(3) {
        out.push(w[0]);
        last_filled = match (w[0], w[1], w[2]) {
            (Some(a), Some(b), Some(c)) if !points_in_line(&a, &b, &c) => {
                fill_between(&a, &b, probe, max_depth - 1, &mut out);
                true
            }
            _ => false,
        };
    }
    out.push(points[n - 2]);
    if last_filled {
        if let (Some(a), Some(b)) = (points[n - 2], points[n - 1]) {
            fill_between(&a, &b, probe, max_depth - 1, &mut out);
        }
    }
    out.push(points[n - 1]);
    out
}

/// Remove every point that lies in line with both neighbours. `None`
/// entries always stay.
fn filter_linear(points: Vec<Option<Point3>>) -> Vec<Option<Point3>> {
    let mut out = Vec::with_capacity(points.len());
    let mut iter = points.into_iter();
    let Some(mut p1) = iter.next() else {
        return out;
    };
    let Some(mut p2) = iter.next() else {
        out.push(p1);
        return out;
    };
    for p3 in iter {
        if in_line(&p1, &p2, &p3) {
            p2 = p3;
        } else {
            out.push(p1);
            p1 = p2;
            p2 = p3;
        }
    }
    out.push(p1);
    out.push(p2);
    out
}

// ===== Generator =====

/// Generates drop-probe toolpaths over a motion grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropCutter;

impl DropCutter {
    /// Create a drop-cutter generator.
    pub fn new() -> Self {
        Self
    }

    /// Probe every grid line and emit one cutting pass per line.
    ///
    /// All layers are flattened into a single list of lines. Each line
    /// yields `Straight` moves for reachable positions, `Safety` for
    /// unreachable ones and a closing `Safety`. The callback is asked before
    /// each line and after each point; on cancel the moves emitted so far
    /// are returned with `cancelled` set.
    #[instrument(skip_all, fields(shape = ?cutter.shape(), radius = cutter.radius()))]
    pub fn generate_toolpath<G, L, P, F>(
        &self,
        model: &Model,
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
        let (minz, maxz) = height_limits(model, cutter, settings);
        let depth = if settings.oversample { settings.max_depth } else { 0 };

        let lines: Vec<Vec<Point3>> = grid
            .into_iter()
            .flatten()
            .map(|line| line.into_iter().collect())
            .collect();
        let total = lines.len();
        info!(lines = total, minz, maxz, depth, "drop-cutter started");

        let mut counter = ProgressCounter::new(total);
        let mut result = ToolpathResult::default();
        let mut done = 0;

        'batches: for batch in lines.chunks(workers.batch_size()) {
            debug!(from = done, count = batch.len(), "probing batch");
            let heights = workers.map(batch, |line| {
                max_height_dynamic(model, cutter, line, minz, maxz, depth)
            });
            for points in heights {
                done += 1;
                let text = format!("DropCutter: processing line {done}/{total}");
                if callback(&ProgressEvent::Text(text)).is_cancel() {
                    result.cancelled = true;
                    break 'batches;
                }
                for point in points {
                    result.moves.push(match point {
                        Some(p) => Move::Straight(p),
                        None => Move::Safety,
                    });
                    if callback(&ProgressEvent::Position(point)).is_cancel() {
                        result.cancelled = true;
                        break;
                    }
                }
                result.moves.push(Move::Safety);
                if counter.increment(&mut callback).is_cancel() {
                    result.cancelled = true;
                }
                if result.cancelled {
                    break 'batches;
                }
            }
        }

        info!(
            moves = result.moves.len(),
            cancelled = result.cancelled,
            "drop-cutter finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use millpath_geom::Triangle;

    fn flat(z: f64) -> Model {
        Model::new(vec![
            Triangle::new(
                Point3::new(0.0, 0.0, z),
                Point3::new(0.0, 10.0, z),
                Point3::new(10.0, 0.0, z),
                None,
            ),
            Triangle::new(
                Point3::new(10.0, 0.0, z),
                Point3::new(0.0, 10.0, z),
                Point3::new(10.0, 10.0, z),
                None,
            ),
        ])
        .unwrap()
    }

    /// A ridge along y: flat at z=0 for x < 4 and x > 6, peaking at z=1 on x=5.
    fn ridge() -> Model {
        let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
        let quad = |a: Point3, b: Point3, c: Point3, d: Point3| {
            [Triangle::new(a, b, c, None), Triangle::new(c, b, d, None)]
        };
        let mut triangles = Vec::new();
        triangles.extend(quad(p(0.0, 0.0, 0.0), p(0.0, 4.0, 0.0), p(4.0, 0.0, 0.0), p(4.0, 4.0, 0.0)));
        triangles.extend(quad(p(4.0, 0.0, 0.0), p(4.0, 4.0, 0.0), p(5.0, 0.0, 1.0), p(5.0, 4.0, 1.0)));
        triangles.extend(quad(p(5.0, 0.0, 1.0), p(5.0, 4.0, 1.0), p(6.0, 0.0, 0.0), p(6.0, 4.0, 0.0)));
        triangles.extend(quad(p(6.0, 0.0, 0.0), p(6.0, 4.0, 0.0), p(10.0, 0.0, 0.0), p(10.0, 4.0, 0.0)));
        Model::new(triangles).unwrap()
    }

    fn line(y: f64, xs: &[f64]) -> Vec<Point3> {
        xs.iter().map(|&x| Point3::new(x, y, 0.0)).collect()
    }

    #[test]
    fn test_max_height_flat() {
        let model = flat(3.0);
        let cutter = Cutter::spherical(1.0).unwrap();
        let p = max_height(&model, &cutter, 5.0, 5.0, 0.0, 10.0).unwrap();
        assert_abs_diff_eq!(p.z, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_max_height_limits() {
        let model = flat(3.0);
        let cutter = Cutter::cylindrical(1.0).unwrap();
        // no triangle below: rest on the floor
        let p = max_height(&model, &cutter, 50.0, 50.0, -1.0, 10.0).unwrap();
        assert_eq!(p, Point3::new(50.0, 50.0, -1.0));
        // contact below the floor is clamped
        let p = max_height(&model, &cutter, 5.0, 5.0, 4.0, 10.0).unwrap();
        assert_abs_diff_eq!(p.z, 4.0);
        // probe starting below the surface cannot reach it
        assert!(max_height(&model, &cutter, 5.0, 5.0, 0.0, 2.0).is_none());
        // empty model
        let empty = Model::new(Vec::new()).unwrap();
        let p = max_height(&empty, &cutter, 1.0, 2.0, 0.5, 10.0).unwrap();
        assert_eq!(p, Point3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_filter_linear() {
        let a = Some(Point3::new(0.0, 0.0, 0.0));
        let b = Some(Point3::new(1.0, 0.0, 0.0));
        let c = Some(Point3::new(2.0, 0.0, 0.0));
        let d = Some(Point3::new(3.0, 0.0, 1.0));
        assert_eq!(filter_linear(vec![a, b, c, d]), vec![a, c, d]);
        assert_eq!(filter_linear(vec![a, None, c]), vec![a, None, c]);
        assert_eq!(filter_linear(vec![a]), vec![a]);
        assert!(filter_linear(Vec::new()).is_empty());
    }

    #[test]
    fn test_oversample_short_input_unchanged() {
        let probe = |_: f64, _: f64| -> Option<Point3> { panic!("no probe expected") };
        let a = Some(Point3::new(0.0, 0.0, 0.0));
        let b = Some(Point3::new(1.0, 0.0, 1.0));
        assert_eq!(oversample(vec![a, b], &probe, 5), vec![a, b]);
        assert_eq!(oversample(vec![a], &probe, 5), vec![a]);
        assert_eq!(oversample(vec![a, b, a], &probe, 0), vec![a, b, a]);
    }

    #[test]
    fn test_dynamic_finds_ridge_peak() {
        let model = ridge();
        let cutter = Cutter::cylindrical(0.1).unwrap();
        let positions = line(2.0, &[0.0, 4.5, 10.0]);

        let coarse = max_height_dynamic(&model, &cutter, &positions, 0.0, 5.0, 0);
        assert_eq!(coarse.len(), 3);
        let coarse_top = coarse.iter().flatten().fold(0.0_f64, |m, p| m.max(p.z));
        assert_abs_diff_eq!(coarse_top, 0.6, epsilon = 1e-9);

        let fine = max_height_dynamic(&model, &cutter, &positions, 0.0, 5.0, 5);
        let fine_top = fine.iter().flatten().fold(0.0_f64, |m, p| m.max(p.z));
        assert!(fine.len() > coarse.len());
        assert!(fine_top > 0.9, "peak not found: {fine_top}");
        assert_eq!(fine.first().copied().flatten().map(|p| p.x), Some(0.0));
        assert_eq!(fine.last().copied().flatten().map(|p| p.x), Some(10.0));
    }

    #[test]
    fn test_generate_flat_grid() {
        let model = flat(2.0);
        let cutter = Cutter::cylindrical(0.5).unwrap();
        let grid = vec![vec![
            line(2.0, &[1.0, 2.0, 3.0, 4.0]),
            line(4.0, &[4.0, 3.0, 2.0, 1.0]),
        ]];
        let result = DropCutter::new()
            .generate_toolpath(&model, &cutter, grid, &GeneratorSettings::default(), |_| {
                Control::Continue
            })
            .unwrap();
        assert!(!result.cancelled);
        // collinear probes collapse to the line ends
        assert_eq!(result.straight_count(), 4);
        assert_eq!(result.safety_count(), 2);
        for p in result.positions() {
            assert_abs_diff_eq!(p.z, 2.0, epsilon = 1e-9);
        }
        assert_eq!(result.moves[2], Move::Safety);
    }

    #[test]
    fn test_generate_cancel_on_second_line() {
        let model = flat(2.0);
        let cutter = Cutter::cylindrical(0.5).unwrap();
        let grid = vec![vec![
            line(1.0, &[1.0, 5.0]),
            line(2.0, &[5.0, 1.0]),
            line(3.0, &[1.0, 5.0]),
        ]];
        let mut texts = 0;
        let result = DropCutter::new()
            .generate_toolpath(&model, &cutter, grid, &GeneratorSettings::default(), |e| {
                if let ProgressEvent::Text(_) = e {
                    texts += 1;
                }
                Control::from(texts == 2)
            })
            .unwrap();
        assert!(result.cancelled);
        assert_eq!(
            result.moves,
            vec![
                Move::Straight(Point3::new(1.0, 1.0, 2.0)),
                Move::Straight(Point3::new(5.0, 1.0, 2.0)),
                Move::Safety,
            ]
        );
    }

    #[test]
    fn test_generate_rejects_bad_settings() {
        let model = flat(0.0);
        let cutter = Cutter::spherical(1.0).unwrap();
        let settings = GeneratorSettings {
            max_depth: 100,
            ..Default::default()
        };
        let grid: Vec<Vec<Vec<Point3>>> = Vec::new();
        assert!(DropCutter::new()
            .generate_toolpath(&model, &cutter, grid, &settings, |_| Control::Continue)
            .is_err());
    }
}
