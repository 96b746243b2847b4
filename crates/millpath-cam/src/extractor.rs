//! Closed polygon reconstruction from scanline crossings.
//!
//! Each scanline delivers the points where it enters and leaves the
//! material, sorted along the scan axis. Consecutive scanlines are matched
//! interval by interval; every interval boundary grows a path, and paths are
//! joined at the top (where an interval appears) and at the bottom (where it
//! disappears). When a direction ends, joined paths are spliced into closed
//! polygons.
//!
//! The contour policy can run a second, vertical pass. The horizontal
//! polygons are then cut into x-monotone chains and replayed as virtual
//! vertical scanlines, so both passes end up in one merged outline.

use std::collections::VecDeque;

use millpath_math::Point3;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How overlapping intervals are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Policy {
    /// Follow the outline of the material.
    Contour,
    /// Split the material into monotone pieces for zig-zag clearing.
    Monotone,
}

/// Axis the scanlines run along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScanDirection {
    /// Scanlines parallel to the x axis; crossings are ordered by x.
    #[default]
    X,
    /// Scanlines parallel to the y axis; crossings are ordered by y.
    Y,
}

impl ScanDirection {
    /// Coordinate index compared within a scanline.
    pub fn axis(self) -> usize {
        match self {
            ScanDirection::X => 0,
            ScanDirection::Y => 1,
        }
    }
}

/// Position inside a sequence that may grow and shrink around it.
///
/// Items before the cursor are consumed; [`insert`](Cursor::insert) and
/// [`take_next`](Cursor::take_next) work at the cursor.
#[derive(Debug, Clone, Default)]
pub struct Cursor<T> {
    seq: Vec<T>,
    ind: usize,
}

impl<T: Copy + PartialEq> Cursor<T> {
    /// Cursor at the start of `seq`.
    pub fn new(seq: Vec<T>) -> Self {
        Self { seq, ind: 0 }
    }

    /// Item `offset` places after the cursor.
    pub fn peek(&self, offset: usize) -> Option<T> {
        self.seq.get(self.ind + offset).copied()
    }

    /// Remove and return the item at the cursor.
    pub fn take_next(&mut self) -> Option<T> {
        (self.ind < self.seq.len()).then(|| self.seq.remove(self.ind))
    }

    /// Insert at the cursor and step past the new item.
    pub fn insert(&mut self, item: T) {
        self.seq.insert(self.ind, item);
        self.ind += 1;
    }

    /// Insert before the last consumed item and keep pointing at the same
    /// next item.
    pub fn insert_before(&mut self, item: T) {
        self.seq.insert(self.ind.saturating_sub(1), item);
        self.ind += 1;
    }

    /// Append at the end without moving the cursor.
    pub fn push(&mut self, item: T) {
        self.seq.push(item);
    }

    /// Remove the first occurrence of `item`; `false` if absent.
    pub fn remove(&mut self, item: T) -> bool {
        match self.seq.iter().position(|x| *x == item) {
            Some(i) => {
                self.seq.remove(i);
                if i < self.ind {
                    self.ind -= 1;
                }
                true
            }
            None => false,
        }
    }

    /// Number of items after the cursor.
    pub fn remains(&self) -> usize {
        self.seq.len().saturating_sub(self.ind)
    }

    /// Step over `n` items.
    pub fn skip_items(&mut self, n: usize) {
        self.ind = (self.ind + n).min(self.seq.len());
    }

    /// The whole underlying sequence.
    pub fn into_inner(self) -> Vec<T> {
        self.seq
    }
}

impl<T: Copy + PartialEq> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.peek(0)?;
        self.ind += 1;
        Some(item)
    }
}

type PathId = usize;

#[derive(Debug, Clone, Default)]
struct ExtractPath {
    points: Vec<Point3>,
    top_join: Option<PathId>,
    bot_join: Option<PathId>,
    winding: i32,
}

/// Polygons found by a [`PolygonExtractor`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Result of the last x pass.
    pub horizontal: Vec<Vec<Point3>>,
    /// Result of the last y pass when it was not merged.
    pub vertical: Vec<Vec<Point3>>,
    /// Contour policy only: the y pass merged with the replayed x result.
    pub merged: Vec<Vec<Point3>>,
}

/// Incremental scanline to polygon converter.
///
/// Call order: `new_direction`, then per scanline `new_scanline`, `append`
/// for each crossing and `end_scanline`, then `end_direction`. Paths live in
/// an arena and refer to each other by index.
#[derive(Debug, Clone)]
pub struct PolygonExtractor {
    policy: Policy,
    direction: ScanDirection,
    arena: Vec<ExtractPath>,
    finished: Vec<PathId>,
    active: Vec<PathId>,
    prev_line: Vec<Point3>,
    curr_line: Vec<Point3>,
    result: Extracted,
    pending: VecDeque<Vec<Point3>>,
    replaying: Vec<Vec<Point3>>,
    last_x: f64,
    delta_x: f64,
    scanline: usize,
}

impl PolygonExtractor {
    /// Empty extractor.
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            direction: ScanDirection::X,
            arena: Vec::new(),
            finished: Vec::new(),
            active: Vec::new(),
            prev_line: Vec::new(),
            curr_line: Vec::new(),
            result: Extracted::default(),
            pending: VecDeque::new(),
            replaying: Vec::new(),
            last_x: f64::NEG_INFINITY,
            delta_x: 0.0,
            scanline: 0,
        }
    }

    /// Policy chosen at construction.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Polygons of the last x pass.
    pub fn horizontal(&self) -> &[Vec<Point3>] {
        &self.result.horizontal
    }

    /// Polygons of the last unmerged y pass.
    pub fn vertical(&self) -> &[Vec<Point3>] {
        &self.result.vertical
    }

    /// Merged polygons of a contour y pass.
    pub fn merged(&self) -> &[Vec<Point3>] {
        &self.result.merged
    }

    fn replays_horizontal(&self) -> bool {
        self.policy == Policy::Contour && !self.result.horizontal.is_empty()
    }

    /// Start a pass of scanlines along `direction`.
    pub fn new_direction(&mut self, direction: ScanDirection) {
        self.direction = direction;
        self.scanline = 0;
        self.arena.clear();
        self.finished.clear();
        self.active.clear();
        self.prev_line.clear();
        self.curr_line.clear();
        if direction == ScanDirection::Y && self.replays_horizontal() {
            self.last_x = f64::NEG_INFINITY;
            self.delta_x = 0.0;
            let mut chains: Vec<Vec<Point3>> = self
                .result
                .horizontal
                .iter()
                .flat_map(|polygon| monotone_chains(polygon))
                .filter(|chain| !chain.is_empty())
                .collect();
            chains.sort_by(|a, b| a[0].x.total_cmp(&b[0].x));
            self.pending = chains.into();
            self.replaying.clear();
        }
    }

    /// Close all open paths and link them into polygons.
    pub fn end_direction(&mut self) {
        if self.replays_horizontal() {
            self.replay_horizontal(f64::INFINITY);
        }
        self.new_scanline();
        self.end_scanline();

        if self.replays_horizontal() {
            for &id in &self.finished {
                drop_backward_steps(&mut self.arena[id].points);
            }
        }

        let polygons = self.link_paths();
        match self.direction {
            ScanDirection::X => self.result.horizontal = polygons,
            ScanDirection::Y => {
                if self.replays_horizontal() && !polygons.is_empty() {
                    self.result.merged = polygons;
                } else {
                    self.result.vertical = polygons;
                }
            }
        }
    }

    /// Start a new scanline.
    pub fn new_scanline(&mut self) {
        self.curr_line.clear();
    }

    /// Add the next crossing of the current scanline.
    pub fn append(&mut self, point: Point3) {
        self.curr_line.push(point);
    }

    /// Match the current scanline against the previous one.
    pub fn end_scanline(&mut self) {
        let line = std::mem::take(&mut self.curr_line);
        if self.direction == ScanDirection::Y && self.replays_horizontal() {
            let next_x = match line.first() {
                Some(p) => {
                    self.delta_x = p.x - self.last_x;
                    self.last_x = p.x;
                    p.x
                }
                None => self.last_x + self.delta_x,
            };
            if next_x > f64::NEG_INFINITY {
                self.replay_horizontal(next_x);
            }
        }
        self.process_scanline(line, self.direction.axis());
    }

    /// Hand out everything found so far.
    pub fn finish(self) -> Extracted {
        self.result
    }

    // ===== Scanline matching =====

    fn new_path(&mut self, first: Option<Point3>, winding: i32) -> PathId {
        self.arena.push(ExtractPath {
            points: first.into_iter().collect(),
            winding,
            ..Default::default()
        });
        self.arena.len() - 1
    }

    fn join_top(&mut self, a: PathId, b: PathId) {
        self.arena[a].top_join = Some(b);
        self.arena[b].top_join = Some(a);
    }

    fn join_bottom(&mut self, a: PathId, b: PathId) {
        self.arena[a].bot_join = Some(b);
        self.arena[b].bot_join = Some(a);
        self.finished.push(a);
        self.finished.push(b);
    }

    /// Match `line` against the previous scanline. A scanline that cannot
    /// be matched is skipped as a whole; the next one is matched against
    /// the last good scanline instead.
    fn process_scanline(&mut self, line: Vec<Point3>, axis: usize) {
        let index = self.scanline;
        self.scanline += 1;
        if line.len() % 2 == 1 {
            warn!(scanline = index, crossings = line.len(), "skipping scanline with odd crossing count");
            return;
        }
        let checkpoint = Checkpoint::new(self);
        let mut prev_point = Cursor::new(std::mem::take(&mut self.prev_line));
        let mut curr_point = Cursor::new(line);
        let mut curr_path = Cursor::new(std::mem::take(&mut self.active));
        match self.match_intervals(&mut prev_point, &mut curr_point, &mut curr_path, axis) {
            Some(()) => {
                self.prev_line = curr_point.into_inner();
                self.active = curr_path.into_inner();
            }
            None => {
                warn!(scanline = index, "skipping scanline inconsistent with the previous one");
                checkpoint.restore(self);
            }
        }
    }

    fn match_intervals(
        &mut self,
        prev_point: &mut Cursor<Point3>,
        curr_point: &mut Cursor<Point3>,
        curr_path: &mut Cursor<PathId>,
        axis: usize,
    ) -> Option<()> {
        let mut winding = 0;
        while prev_point.remains() > 0 || curr_point.remains() > 0 {
            if prev_point.remains() == 0 && curr_point.remains() >= 2 {
                // interval appears
                let c0 = curr_point.next();
                let c1 = curr_point.next();
                let s0 = self.new_path(c0, winding + 1);
                let s1 = self.new_path(c1, winding);
                curr_path.push(s0);
                curr_path.push(s1);
                self.join_top(s0, s1);
                continue;
            }
            if prev_point.remains() >= 2 && curr_point.remains() == 0 {
                // interval disappears
                let s0 = curr_path.take_next()?;
                let s1 = curr_path.take_next()?;
                prev_point.skip_items(2);
                self.join_bottom(s0, s1);
                continue;
            }
            if prev_point.remains() < 2 || curr_point.remains() < 2 {
                return None;
            }

            let p0 = prev_point.peek(0)?;
            let mut p1 = prev_point.peek(1)?;
            let c0 = curr_point.peek(0)?;
            let mut c1 = curr_point.peek(1)?;

            if c1[axis] < p0[axis] {
                // new interval entirely before the old one
                let s0 = self.new_path(Some(c0), winding + 1);
                curr_path.insert(s0);
                let s1 = self.new_path(Some(c1), winding);
                curr_path.insert(s1);
                curr_point.skip_items(2);
                self.join_top(s0, s1);
            } else if c0[axis] > p1[axis] {
                // old interval ends before the new one
                let s0 = curr_path.take_next()?;
                let s1 = curr_path.take_next()?;
                prev_point.skip_items(2);
                self.join_bottom(s0, s1);
                winding = self.arena[s1].winding;
            } else {
                let mut left_path = curr_path.next()?;
                let mut right_path = curr_path.peek(0)?;
                let mut left_point = c0;
                let mut right_point = c1;
                winding = self.arena[left_path].winding;
                curr_point.skip_items(1);
                prev_point.skip_items(1);

                loop {
                    let mut overlap = false;

                    // the next old interval touches the new one: join
                    if prev_point.remains() >= 2 {
                        let p2 = prev_point.peek(1)?;
                        if p2[axis] <= c1[axis] {
                            overlap = true;
                            let s1 = match self.policy {
                                Policy::Contour => {
                                    let s0 = curr_path.take_next()?;
                                    let s1 = curr_path.take_next()?;
                                    if let Some(next) = curr_path.peek(0) {
                                        right_path = next;
                                    }
                                    self.join_bottom(s0, s1);
                                    s1
                                }
                                Policy::Monotone => {
                                    let s0 = curr_path.take_next()?;
                                    curr_path.remove(left_path);
                                    self.join_bottom(left_path, s0);
                                    let s1 = curr_path.next()?;
                                    left_path = s1;
                                    right_path = curr_path.peek(0)?;
                                    s1
                                }
                            };
                            prev_point.skip_items(2);
                            winding = self.arena[s1].winding;
                            if let Some(next) = prev_point.peek(0) {
                                p1 = next;
                            }
                        }
                    }

                    // the next new interval starts under the old one: split
                    if curr_point.remains() >= 2 {
                        let c2 = curr_point.peek(1)?;
                        if c2[axis] <= p1[axis] {
                            overlap = true;
                            let s0 = self.new_path(None, winding + 1);
                            let s1 = self.new_path(None, winding);
                            self.join_top(s0, s1);
                            curr_point.skip_items(2);
                            match self.policy {
                                Policy::Contour => {
                                    self.arena[s0].points.push(c1);
                                    curr_path.insert(s0);
                                    self.arena[s1].points.push(c2);
                                    curr_path.insert(s1);
                                }
                                Policy::Monotone => {
                                    self.arena[s0].points.push(left_point);
                                    self.arena[s1].points.push(c1);
                                    curr_path.insert_before(s0);
                                    curr_path.insert_before(s1);
                                    left_point = c2;
                                }
                            }
                            if let Some(next) = curr_point.peek(0) {
                                c1 = next;
                                right_point = c1;
                            }
                        }
                    }

                    if !overlap {
                        break;
                    }
                }

                self.arena[left_path].points.push(left_point);
                self.arena[right_path].points.push(right_point);
                if curr_path.peek(0) == Some(right_path) {
                    curr_path.skip_items(1);
                }
                winding = self.arena[right_path].winding;
                prev_point.skip_items(1);
                curr_point.skip_items(1);
            }
        }
        Some(())
    }

    // ===== Polygon linking =====

    fn link_paths(&mut self) -> Vec<Vec<Point3>> {
        let mut remaining = std::mem::take(&mut self.finished);
        let mut polygons = Vec::new();
        while let Some(first) = remaining.iter().copied().min() {
            take_id(&mut remaining, first);
            let mut points = std::mem::take(&mut self.arena[first].points);
            let mut next = self.arena[first].bot_join;
            while let Some(down) = next {
                if !take_id(&mut remaining, down) {
                    break;
                }
                points.extend(self.arena[down].points.drain(..).rev());
                let up = self.arena[down].top_join;
                if up == Some(first) {
                    break;
                }
                let Some(up) = up else { break };
                if !take_id(&mut remaining, up) {
                    break;
                }
                points.append(&mut self.arena[up].points);
                next = self.arena[up].bot_join;
            }
            polygons.push(points);
        }
        polygons
    }

    // ===== Horizontal replay =====

    /// Feed the monotone chains that start before `limit` into the y pass
    /// as virtual scanlines.
    fn replay_horizontal(&mut self, limit: f64) {
        loop {
            let mut next_x = f64::INFINITY;
            if let Some(chain) = self.pending.front() {
                next_x = next_x.min(chain[0].x);
            }
            if let Some(chain) = self.replaying.first() {
                next_x = next_x.min(chain[0].x);
            }
            if next_x >= limit {
                return;
            }

            while self.pending.front().is_some_and(|c| c[0].x <= next_x) {
                if let Some(chain) = self.pending.pop_front() {
                    self.replaying.push(chain);
                }
            }
            self.replaying.sort_by(|a, b| a[0].x.total_cmp(&b[0].x));

            let mut scanline = Vec::new();
            let mut i = 0;
            while i < self.replaying.len() {
                let chain = &mut self.replaying[i];
                scanline.push(chain[0]);
                if chain[0].x <= next_x {
                    if chain.len() <= 1 {
                        self.replaying.remove(i);
                        continue;
                    }
                    chain.remove(0);
                }
                i += 1;
            }
            self.replaying.sort_by(|a, b| a[0].x.total_cmp(&b[0].x));
            if scanline.is_empty() {
                return;
            }
            scanline.sort_by(|a, b| a.y.total_cmp(&b.y));
            self.process_scanline(scanline, ScanDirection::Y.axis());
        }
    }
}

/// State of an extractor before a scanline is matched.
struct Checkpoint {
    arena_len: usize,
    finished_len: usize,
    active: Vec<PathId>,
    prev_line: Vec<Point3>,
    /// Point count and bottom join of every active path.
    paths: Vec<(PathId, usize, Option<PathId>)>,
}

impl Checkpoint {
    fn new(e: &PolygonExtractor) -> Self {
        Self {
            arena_len: e.arena.len(),
            finished_len: e.finished.len(),
            active: e.active.clone(),
            prev_line: e.prev_line.clone(),
            paths: e
                .active
                .iter()
                .map(|&id| (id, e.arena[id].points.len(), e.arena[id].bot_join))
                .collect(),
        }
    }

    fn restore(self, e: &mut PolygonExtractor) {
        e.arena.truncate(self.arena_len);
        e.finished.truncate(self.finished_len);
        for (id, len, bot_join) in self.paths {
            let path = &mut e.arena[id];
            path.points.truncate(len);
            path.bot_join = bot_join;
        }
        e.active = self.active;
        e.prev_line = self.prev_line;
    }
}

fn take_id(ids: &mut Vec<PathId>, id: PathId) -> bool {
    match ids.iter().position(|&x| x == id) {
        Some(i) => {
            ids.remove(i);
            true
        }
        None => false,
    }
}

/// Remove points that step back in x.
fn drop_backward_steps(points: &mut Vec<Point3>) {
    let mut i = 0;
    while i + 1 < points.len() {
        if points[i].x > points[i + 1].x {
            points.remove(i);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
}

/// Endless walk around a closed polygon.
struct Cyclic<'a> {
    points: &'a [Point3],
    ind: usize,
}

impl Cyclic<'_> {
    fn next_point(&mut self) -> Point3 {
        let p = self.points[self.ind];
        self.ind = (self.ind + 1) % self.points.len();
        p
    }
}

/// Split a closed polygon into chains with non-decreasing x.
fn monotone_chains(polygon: &[Point3]) -> Vec<Vec<Point3>> {
    let n = polygon.len();
    let Some(&first) = polygon.first() else {
        return Vec::new();
    };
    if polygon.iter().all(|p| p.x == first.x) {
        let miny = polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let maxy = polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        return vec![
            polygon.iter().copied().filter(|p| p.y == miny).collect(),
            polygon.iter().copied().filter(|p| p.y == maxy).collect(),
        ];
    }

    let last = polygon[n - 1];
    let mut walk = Cyclic {
        points: polygon,
        ind: 0,
    };
    let mut p = first;
    let mut next_p = walk.next_point();
    let mut steps = 0;
    while !(last.x >= p.x && next_p.x > p.x) {
        p = next_p;
        next_p = walk.next_point();
        steps += 1;
        if steps > 2 * n {
            return vec![polygon.to_vec()];
        }
    }

    let mut chains = Vec::new();
    let mut count = 0;
    while count < n {
        let mut rising = Vec::new();
        while next_p.x >= p.x {
            rising.push(p);
            p = next_p;
            next_p = walk.next_point();
            count += 1;
        }
        rising.push(p);
        trim_vertical_ends(&mut rising);
        chains.push(rising);

        let mut falling = Vec::new();
        while next_p.x <= p.x {
            falling.push(p);
            p = next_p;
            next_p = walk.next_point();
            count += 1;
        }
        falling.push(p);
        falling.reverse();
        trim_vertical_ends(&mut falling);
        chains.push(falling);
    }
    chains
}

fn trim_vertical_ends(chain: &mut Vec<Point3>) {
    while chain.len() > 1 && chain[0].x == chain[1].x {
        chain.remove(0);
    }
    while chain.len() > 1 && chain[chain.len() - 2].x == chain[chain.len() - 1].x {
        chain.pop();
    }
}
