//! Median-split k-d tree over fixed-dimension bounds.

use tracing::debug;

use crate::{IndexError, Result};

/// An indexed item together with its bound vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T, const D: usize> {
    /// Payload; opaque to the tree.
    pub item: T,
    /// Position of the node in the tree's key space.
    pub bound: [f64; D],
}

impl<T, const D: usize> Node<T, D> {
    /// Create a node.
    pub fn new(item: T, bound: [f64; D]) -> Self {
        Self { item, bound }
    }
}

/// Distance function used by nearest neighbour search.
pub trait Metric<const D: usize> {
    /// Distance between two bound vectors.
    fn distance(&self, a: &[f64; D], b: &[f64; D]) -> f64;

    /// Smallest distance any node can have from a query whose separation
    /// from a cut plane is `delta` along the cut axis.
    fn axis_distance(&self, delta: f64) -> f64;
}

/// Sum of squared per-axis differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredEuclidean;

impl<const D: usize> Metric<D> for SquaredEuclidean {
    fn distance(&self, a: &[f64; D], b: &[f64; D]) -> f64 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    fn axis_distance(&self, delta: f64) -> f64 {
        delta * delta
    }
}

#[derive(Debug, Clone)]
enum Tree<T, const D: usize> {
    Bucket(Vec<Node<T, D>>),
    Split {
        cutdim: usize,
        cutval: f64,
        /// Smallest coordinate along `cutdim` in this subtree.
        minval: f64,
        /// Largest coordinate along `cutdim` in this subtree.
        maxval: f64,
        lo: Box<Tree<T, D>>,
        hi: Box<Tree<T, D>>,
    },
}

/// A k-d tree over `D`-dimensional bounds.
///
/// Node sets are split at the median of their widest dimension until a set
/// holds at most `cutoff` nodes or spreads no more than `cutoff_distance`
/// along every dimension; such sets stay together as a bucket.
#[derive(Debug, Clone)]
pub struct KdTree<T, const D: usize> {
    root: Tree<T, D>,
    cutoff: usize,
    cutoff_distance: f64,
    len: usize,
}

impl<T, const D: usize> KdTree<T, D> {
    /// Build a tree from `nodes`.
    ///
    /// Fails for a zero `cutoff`, a negative or non-finite
    /// `cutoff_distance`, or any non-finite bound coordinate.
    pub fn new(nodes: Vec<Node<T, D>>, cutoff: usize, cutoff_distance: f64) -> Result<Self> {
        if cutoff == 0 {
            return Err(IndexError::InvalidCutoff(cutoff));
        }
        if !cutoff_distance.is_finite() || cutoff_distance < 0.0 {
            return Err(IndexError::InvalidTolerance(cutoff_distance));
        }
        for node in &nodes {
            check_bound(&node.bound)?;
        }
        let len = nodes.len();
        let root = Tree::build(nodes, cutoff, cutoff_distance);
        debug!(len, cutoff, cutoff_distance, "built kd-tree");
        Ok(Self {
            root,
            cutoff,
            cutoff_distance,
            len,
        })
    }

    /// An empty tree.
    pub fn empty(cutoff: usize, cutoff_distance: f64) -> Result<Self> {
        Self::new(Vec::new(), cutoff, cutoff_distance)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the tree stores no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a node. A bucket that grows beyond `cutoff` is rebuilt under
    /// the same bucket rule as [`KdTree::new`].
    pub fn insert(&mut self, node: Node<T, D>) -> Result<()> {
        check_bound(&node.bound)?;
        self.root.insert(node, self.cutoff, self.cutoff_distance);
        self.len += 1;
        Ok(())
    }

    /// Every stored node, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<T, D>> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out.into_iter()
    }

    /// Exact nearest neighbour of `query` under `metric`.
    ///
    /// Returns the node and its distance, or `None` for an empty tree.
    pub fn nearest_neighbor<M: Metric<D>>(
        &self,
        query: &[f64; D],
        metric: &M,
    ) -> Option<(&Node<T, D>, f64)> {
        let mut best = None;
        self.root.nearest(query, metric, &mut best);
        best
    }

    /// Depth of the deepest bucket (a single bucket has depth 0).
    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl<T, const D: usize> Default for KdTree<T, D> {
    /// Empty tree with bucket size 3 and bucket spread 1.0.
    fn default() -> Self {
        Self {
            root: Tree::Bucket(Vec::new()),
            cutoff: 3,
            cutoff_distance: 1.0,
            len: 0,
        }
    }
}

impl<T> KdTree<T, 4> {
    /// Nodes whose `[minx, maxx, miny, maxy]` interval overlaps the query
    /// rectangle (touching counts as overlap).
    pub fn search_rect(&self, minx: f64, maxx: f64, miny: f64, maxy: f64) -> Vec<&Node<T, 4>> {
        let mut out = Vec::new();
        self.root.search_rect([minx, maxx, miny, maxy], &mut out);
        out
    }
}

fn check_bound<const D: usize>(bound: &[f64; D]) -> Result<()> {
    match bound.iter().position(|v| !v.is_finite()) {
        Some(dim) => Err(IndexError::NonFiniteBound { dim }),
        None => Ok(()),
    }
}

/// Dimension with the largest spread; ties go to the lower dimension.
fn max_spread<T, const D: usize>(nodes: &[Node<T, D>]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for dim in 0..D {
        let (min, max) = nodes.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), n| {
            (lo.min(n.bound[dim]), hi.max(n.bound[dim]))
        });
        let spread = max - min;
        if spread > best.1 {
            best = (dim, spread);
        }
    }
    best
}

impl<T, const D: usize> Tree<T, D> {
    fn build(mut nodes: Vec<Node<T, D>>, cutoff: usize, cutoff_distance: f64) -> Self {
        if nodes.len() <= cutoff {
            return Tree::Bucket(nodes);
        }
        let (cutdim, spread) = max_spread(&nodes);
        if spread <= cutoff_distance {
            return Tree::Bucket(nodes);
        }
        Self::split(&mut nodes, cutdim, cutoff, cutoff_distance)
    }

    /// Split at the median along `cutdim`; `nodes` must hold at least two entries.
    fn split(nodes: &mut Vec<Node<T, D>>, cutdim: usize, cutoff: usize, cutoff_distance: f64) -> Self {
        nodes.sort_by(|a, b| a.bound[cutdim].total_cmp(&b.bound[cutdim]));
        let median = nodes.len() / 2;
        let minval = nodes[0].bound[cutdim];
        let maxval = nodes[nodes.len() - 1].bound[cutdim];
        let cutval = nodes[median].bound[cutdim];
        let hi = nodes.split_off(median);
        let lo = std::mem::take(nodes);
        Tree::Split {
            cutdim,
            cutval,
            minval,
            maxval,
            lo: Box::new(Self::build(lo, cutoff, cutoff_distance)),
            hi: Box::new(Self::build(hi, cutoff, cutoff_distance)),
        }
    }

    fn insert(&mut self, node: Node<T, D>, cutoff: usize, cutoff_distance: f64) {
        match self {
            Tree::Bucket(nodes) => {
                nodes.push(node);
                if nodes.len() > cutoff {
                    *self = Self::build(std::mem::take(nodes), cutoff, cutoff_distance);
                }
            }
            Tree::Split {
                cutdim,
                cutval,
                minval,
                maxval,
                lo,
                hi,
            } => {
                let v = node.bound[*cutdim];
                *minval = minval.min(v);
                *maxval = maxval.max(v);
                if v <= *cutval {
                    lo.insert(node, cutoff, cutoff_distance);
                } else {
                    hi.insert(node, cutoff, cutoff_distance);
                }
            }
        }
    }

    fn nearest<'a, M: Metric<D>>(
        &'a self,
        query: &[f64; D],
        metric: &M,
        best: &mut Option<(&'a Node<T, D>, f64)>,
    ) {
        match self {
            Tree::Bucket(nodes) => {
                for node in nodes {
                    let d = metric.distance(&node.bound, query);
                    if best.map_or(true, |(_, best_d)| d < best_d) {
                        *best = Some((node, d));
                    }
                }
            }
            Tree::Split {
                cutdim, cutval, lo, hi, ..
            } => {
                let delta = query[*cutdim] - cutval;
                let (near, far) = if delta <= 0.0 { (lo, hi) } else { (hi, lo) };
                near.nearest(query, metric, best);
                if best.map_or(true, |(_, best_d)| metric.axis_distance(delta) < best_d) {
                    far.nearest(query, metric, best);
                }
            }
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a Node<T, D>>) {
        match self {
            Tree::Bucket(nodes) => out.extend(nodes),
            Tree::Split { lo, hi, .. } => {
                lo.collect(out);
                hi.collect(out);
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Tree::Bucket(_) => 0,
            Tree::Split { lo, hi, .. } => 1 + lo.depth().max(hi.depth()),
        }
    }
}

impl<T> Tree<T, 4> {
    fn search_rect<'a>(&'a self, rect: [f64; 4], out: &mut Vec<&'a Node<T, 4>>) {
        let [minx, maxx, miny, maxy] = rect;
        match self {
            Tree::Bucket(nodes) => {
                out.extend(nodes.iter().filter(|n| {
                    !(n.bound[0] > maxx || n.bound[1] < minx || n.bound[2] > maxy || n.bound[3] < miny)
                }));
            }
            Tree::Split {
                cutdim,
                cutval,
                minval,
                maxval,
                lo,
                hi,
            } => {
                // even dimensions hold interval minima, odd ones maxima
                let (visit_lo, visit_hi) = match cutdim {
                    0 | 2 => {
                        let query_max = if *cutdim == 0 { maxx } else { maxy };
                        if query_max < *minval {
                            (false, false)
                        } else {
                            (true, query_max >= *cutval)
                        }
                    }
                    _ => {
                        let query_min = if *cutdim == 1 { minx } else { miny };
                        if query_min > *maxval {
                            (false, false)
                        } else {
                            (query_min <= *cutval, true)
                        }
                    }
                };
                if visit_lo {
                    lo.search_rect(rect, out);
                }
                if visit_hi {
                    hi.search_rect(rect, out);
                }
            }
        }
    }
}
