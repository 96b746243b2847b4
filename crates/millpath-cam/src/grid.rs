//! Fixed motion grids.
//!
//! A grid is a sequence of layers, a layer a sequence of lines, a line a
//! sequence of positions. Drop-cutter runs want many positions per line
//! (`step_width` set); push-cutter runs only need the two line ends.

use std::ops::{BitOr, BitXor, BitXorAssign};

use millpath_geom::Bounds3;
use millpath_math::{Point3, EPSILON};
use serde::{Deserialize, Serialize};

use crate::{CamError, Result};

/// Positions along one grid line.
pub type GridLine = Vec<Point3>;

/// Lines of one layer.
pub type Layer = Vec<GridLine>;

/// Axis the grid lines run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridDirection {
    /// Lines parallel to the x axis.
    X,
    /// Lines parallel to the y axis.
    Y,
    /// One x layer and one y layer per height.
    XY,
}

/// Cutting direction relative to the spindle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MillingStyle {
    /// Any direction; consecutive lines alternate (zig-zag).
    #[default]
    Ignore,
    /// Every line in the conventional direction.
    Conventional,
    /// Every line in the climb direction.
    Climb,
}

/// Corner of the grid box a layer starts from.
///
/// A set bit means "start at the upper end of that axis".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartPosition(u8);

impl StartPosition {
    /// Lower x, lower y, lower z.
    pub const NONE: Self = Self(0);
    /// Upper x.
    pub const X: Self = Self(1);
    /// Upper y.
    pub const Y: Self = Self(2);
    /// Upper z (layers from top to bottom).
    pub const Z: Self = Self(4);

    /// Raw bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// `true` if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for StartPosition {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitXor for StartPosition {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        Self(self.0 ^ rhs.0)
    }
}

impl BitXorAssign for StartPosition {
    fn bitxor_assign(&mut self, rhs: Self) {
        self.0 ^= rhs.0;
    }
}

// ===== Ranges =====

/// Evenly spaced values from `start` to `end`, both included.
#[derive(Debug, Clone)]
pub struct FloatRange {
    start: f64,
    inc: f64,
    steps: usize,
    index: usize,
}

impl Iterator for FloatRange {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index >= self.steps {
            return None;
        }
        let value = self.start + self.inc * self.index as f64;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.steps - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for FloatRange {}

fn single(value: f64) -> FloatRange {
    FloatRange {
        start: value,
        inc: 0.0,
        steps: 1,
        index: 0,
    }
}

/// Values from `start` to `end` no further apart than `inc`.
///
/// The spacing is shrunk so both ends are hit exactly; an increment
/// pointing away from `end` is flipped.
pub fn float_range(start: f64, end: f64, inc: f64) -> Result<FloatRange> {
    if (start - end).abs() < EPSILON {
        return Ok(single(start));
    }
    if !inc.is_finite() || inc == 0.0 {
        return Err(CamError::InvalidGrid(format!("increment must be non-zero, got {inc}")));
    }
    let inc = if (end - start > 0.0) != (inc > 0.0) { -inc } else { inc };
    let steps = ((end - start) / inc).ceil() as usize + 1;
    float_range_steps(start, end, steps)
}

/// `steps` values from `start` to `end`.
pub fn float_range_steps(start: f64, end: f64, steps: usize) -> Result<FloatRange> {
    if (start - end).abs() < EPSILON {
        return Ok(single(start));
    }
    if steps < 2 {
        return Err(CamError::InvalidGrid(format!("need at least 2 steps, got {steps}")));
    }
    Ok(FloatRange {
        start,
        inc: (end - start) / (steps - 1) as f64,
        steps,
        index: 0,
    })
}

// ===== Lines and layers =====

#[derive(Debug, Clone)]
enum Steps {
    Ends(std::array::IntoIter<f64, 2>),
    Range(FloatRange),
}

/// Positions of a single grid line, see [`fixed_grid_line`].
#[derive(Debug, Clone)]
pub struct GridLineIter {
    steps: Steps,
    line_pos: f64,
    z: f64,
    direction: GridDirection,
}

impl Iterator for GridLineIter {
    type Item = Point3;

    fn next(&mut self) -> Option<Point3> {
        let pos = match &mut self.steps {
            Steps::Ends(it) => it.next()?,
            Steps::Range(it) => it.next()?,
        };
        Some(match self.direction {
            GridDirection::X => Point3::new(pos, self.line_pos, self.z),
            _ => Point3::new(self.line_pos, pos, self.z),
        })
    }
}

/// Positions from `start` to `end` along `direction`, at `line_pos` on the
/// other axis. Without a step width only the two ends are produced.
pub fn fixed_grid_line(
    start: f64,
    end: f64,
    line_pos: f64,
    z: f64,
    step_width: Option<f64>,
    direction: GridDirection,
) -> Result<GridLineIter> {
    let steps = match step_width {
        None => Steps::Ends([start, end].into_iter()),
        Some(w) => Steps::Range(float_range(start, end, w)?),
    };
    Ok(GridLineIter {
        steps,
        line_pos,
        z,
        direction,
    })
}

/// Spacing and ordering of grid lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridParams {
    /// Distance between neighbouring lines.
    pub line_distance: f64,
    /// Distance between positions on a line; `None` for end points only.
    pub step_width: Option<f64>,
    /// Axis the lines run along.
    pub direction: GridDirection,
    /// Line direction policy.
    pub milling_style: MillingStyle,
}

impl GridParams {
    /// Check that spacings are positive and finite.
    pub fn validate(&self) -> Result<()> {
        if !(self.line_distance.is_finite() && self.line_distance > 0.0) {
            return Err(CamError::InvalidGrid(format!(
                "line distance must be positive, got {}",
                self.line_distance
            )));
        }
        if let Some(w) = self.step_width {
            if !(w.is_finite() && w > 0.0) {
                return Err(CamError::InvalidGrid(format!(
                    "step width must be positive, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Lines covering `rect = [minx, maxx, miny, maxy]` at height `z`.
///
/// Returns the lines and the corner the tool ends up at, which is the
/// natural start of the next layer. A start corner that contradicts the
/// milling style is moved to the nearest usable corner first. With
/// [`MillingStyle::Ignore`] lines alternate direction: given a step width
/// they are chained into one line, otherwise connecting lines are inserted
/// between them.
pub fn fixed_grid_layer(
    rect: [f64; 4],
    z: f64,
    params: &GridParams,
    start_position: StartPosition,
) -> Result<(Layer, StartPosition)> {
    let [minx, maxx, miny, maxy] = rect;
    let direction = params.direction;
    if direction == GridDirection::XY {
        return Err(CamError::InvalidGrid(
            "a single layer cannot run along both axes".into(),
        ));
    }
    let zigzag = params.milling_style == MillingStyle::Ignore;
    let (primary, secondary) = match direction {
        GridDirection::X => (StartPosition::X, StartPosition::Y),
        _ => (StartPosition::Y, StartPosition::X),
    };

    let mut start = start_position;
    if !zigzag {
        let climb_like = (params.milling_style == MillingStyle::Climb) == (direction == GridDirection::X);
        let same_side = start.contains(StartPosition::X) == start.contains(StartPosition::Y);
        if climb_like == same_side {
            start ^= if maxx - minx <= maxy - miny {
                StartPosition::X
            } else {
                StartPosition::Y
            };
        }
    }

    let (mut from, mut to, mut line_from, mut line_to) = match direction {
        GridDirection::X => (minx, maxx, miny, maxy),
        _ => (miny, maxy, minx, maxx),
    };
    if start.contains(primary) {
        std::mem::swap(&mut from, &mut to);
    }
    if start.contains(secondary) {
        std::mem::swap(&mut line_from, &mut line_to);
    }

    let mut end_position = start ^ secondary;
    if !zigzag {
        end_position ^= primary;
    }

    let mut lines = Vec::new();
    for line_pos in float_range(line_from, line_to, params.line_distance)? {
        lines.push(fixed_grid_line(from, to, line_pos, z, params.step_width, direction)?.collect::<GridLine>());
        if zigzag {
            std::mem::swap(&mut from, &mut to);
            end_position ^= primary;
        }
    }

    if zigzag {
        if params.step_width.is_some() {
            lines = vec![lines.concat()];
        } else {
            let mut chained = Vec::with_capacity(2 * lines.len());
            let mut last: Option<Point3> = None;
            for line in lines {
                if let (Some(prev), Some(&first)) = (last, line.first()) {
                    chained.push(vec![prev, first]);
                }
                last = line.last().copied();
                chained.push(line);
            }
            lines = chained;
        }
    }
    Ok((lines, end_position))
}

// ===== Grid =====

/// Layers of a fixed grid over a box, produced on demand.
///
/// Heights run from the top of the box down when the start position has
/// [`StartPosition::Z`], otherwise upwards. Without a layer distance a
/// single layer at the bottom of the box is produced.
#[derive(Debug, Clone)]
pub struct FixedGrid {
    rect: [f64; 4],
    heights: FloatRange,
    params: GridParams,
    start: StartPosition,
    fixed_start: bool,
    queued: Option<f64>,
}

impl FixedGrid {
    /// Grid over `bounds`. With `fixed_start` every layer starts at the same
    /// corner instead of where the previous layer ended.
    pub fn new(
        bounds: &Bounds3,
        layer_distance: Option<f64>,
        params: GridParams,
        start: StartPosition,
        fixed_start: bool,
    ) -> Result<Self> {
        params.validate()?;
        let heights = match layer_distance {
            None => single(bounds.min.z),
            Some(d) if start.contains(StartPosition::Z) => float_range(bounds.max.z, bounds.min.z, d)?,
            Some(d) => float_range(bounds.min.z, bounds.max.z, d)?,
        };
        Ok(Self {
            rect: [bounds.min.x, bounds.max.x, bounds.min.y, bounds.max.y],
            heights,
            params,
            start,
            fixed_start,
            queued: None,
        })
    }

    fn layer(&mut self, z: f64, direction: GridDirection) -> Option<Layer> {
        let params = GridParams {
            direction,
            ..self.params
        };
        let (lines, end) = fixed_grid_layer(self.rect, z, &params, self.start).ok()?;
        if !self.fixed_start {
            self.start = end;
        }
        Some(lines)
    }
}

impl Iterator for FixedGrid {
    type Item = Layer;

    fn next(&mut self) -> Option<Layer> {
        if let Some(z) = self.queued.take() {
            return self.layer(z, GridDirection::Y);
        }
        let z = self.heights.next()?;
        match self.params.direction {
            GridDirection::X => self.layer(z, GridDirection::X),
            GridDirection::Y => self.layer(z, GridDirection::Y),
            GridDirection::XY => {
                self.queued = Some(z);
                self.layer(z, GridDirection::X)
            }
        }
    }
}
