//! Spatial indices over the graph: a 3-D k-d tree for nearest-node queries
//! and an R-tree over way bounding boxes for nearest-way queries.
//!
//! Both indices work in Earth-centered Cartesian space (kilometers), which
//! sidesteps the antimeridian and pole discontinuities of raw lat/lon
//! coordinates. Reported distances are straight-line chord lengths; for the
//! sub-kilometer scales these queries serve, chord and arc agree to within
//! floating error.

use rstar::{RTree, RTreeObject, AABB};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geo::dist2;

struct KdNode {
    point: [f64; 3],
    index: u32,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// 3-D k-d tree whose payload is the dense vertex index of each node.
///
/// Supports k-nearest and nearest-with-filter; the filter is a predicate
/// over vertex indices used e.g. to exclude the origin node when querying
/// from a known node.
pub struct KdTree {
    root: Option<Box<KdNode>>,
    len: usize,
}

impl KdTree {
    /// Build from `(cartesian_point, vertex_index)` pairs. The slice is
    /// reordered in place while building.
    pub fn build(points: &mut [([f64; 3], u32)]) -> Self {
        let len = points.len();
        KdTree {
            root: build_node(points, 0),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Nearest vertex to `query`, skipping vertices rejected by `filter`.
    /// Returns the vertex index and chord distance in kilometers.
    pub fn nearest_filtered<F>(&self, query: &[f64; 3], filter: F) -> Option<(u32, f64)>
    where
        F: Fn(u32) -> bool,
    {
        let mut best: Option<(u32, f64)> = None;
        if let Some(ref root) = self.root {
            nearest_impl(root, query, 0, &filter, &mut best);
        }
        best.map(|(idx, d2)| (idx, d2.sqrt()))
    }

    /// Nearest vertex to `query`
    pub fn nearest(&self, query: &[f64; 3]) -> Option<(u32, f64)> {
        self.nearest_filtered(query, |_| true)
    }

    /// The `k` nearest vertices, closest first, with chord distances in
    /// kilometers.
    pub fn k_nearest(&self, query: &[f64; 3], k: usize) -> Vec<(u32, f64)> {
        if k == 0 {
            return vec![];
        }
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(k + 1);
        if let Some(ref root) = self.root {
            k_nearest_impl(root, query, 0, k, &mut heap);
        }
        heap.into_sorted_vec()
            .into_iter()
            .map(|e| (e.index, e.d2.sqrt()))
            .collect()
    }
}

fn build_node(points: &mut [([f64; 3], u32)], depth: usize) -> Option<Box<KdNode>> {
    match points.len() {
        0 => None,
        1 => Some(Box::new(KdNode {
            point: points[0].0,
            index: points[0].1,
            left: None,
            right: None,
        })),
        _ => {
            let axis = depth % 3;
            points.sort_by(|a, b| {
                a.0[axis]
                    .partial_cmp(&b.0[axis])
                    .unwrap_or(Ordering::Equal)
            });
            let median = points.len() / 2;
            let (point, index) = points[median];
            let (left, right_and_pivot) = points.split_at_mut(median);
            let right = &mut right_and_pivot[1..];
            Some(Box::new(KdNode {
                point,
                index,
                left: build_node(left, depth + 1),
                right: build_node(right, depth + 1),
            }))
        }
    }
}

fn nearest_impl<F>(
    node: &KdNode,
    query: &[f64; 3],
    depth: usize,
    filter: &F,
    best: &mut Option<(u32, f64)>,
) where
    F: Fn(u32) -> bool,
{
    let d2 = dist2(query, &node.point);
    if filter(node.index) && best.map(|(_, b)| d2 < b).unwrap_or(true) {
        *best = Some((node.index, d2));
    }

    let axis = depth % 3;
    let diff = query[axis] - node.point[axis];
    let (first, second) = if diff < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(ref branch) = first {
        nearest_impl(branch, query, depth + 1, filter, best);
    }

    // The far branch can only hold a closer point if the splitting plane is
    // closer than the current best candidate.
    if best.map(|(_, b)| diff * diff < b).unwrap_or(true) {
        if let Some(ref branch) = second {
            nearest_impl(branch, query, depth + 1, filter, best);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    d2: f64,
    index: u32,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.d2.eq(&other.d2)
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap over distance: the worst of the current k candidates is
        // always at the top, ready to be evicted.
        self.d2.partial_cmp(&other.d2).unwrap_or(Ordering::Equal)
    }
}

fn k_nearest_impl(
    node: &KdNode,
    query: &[f64; 3],
    depth: usize,
    k: usize,
    heap: &mut BinaryHeap<HeapEntry>,
) {
    let d2 = dist2(query, &node.point);
    if heap.len() < k {
        heap.push(HeapEntry {
            d2,
            index: node.index,
        });
    } else if d2 < heap.peek().map(|e| e.d2).unwrap_or(f64::INFINITY) {
        heap.pop();
        heap.push(HeapEntry {
            d2,
            index: node.index,
        });
    }

    let axis = depth % 3;
    let diff = query[axis] - node.point[axis];
    let (first, second) = if diff < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(ref branch) = first {
        k_nearest_impl(branch, query, depth + 1, k, heap);
    }

    let worst = if heap.len() < k {
        f64::INFINITY
    } else {
        heap.peek().map(|e| e.d2).unwrap_or(f64::INFINITY)
    };
    if diff * diff < worst {
        if let Some(ref branch) = second {
            k_nearest_impl(branch, query, depth + 1, k, heap);
        }
    }
}

/// Axis-aligned bounding box of one way's node coordinates, for the R-tree
#[derive(Debug, Clone, PartialEq)]
pub struct WayBounds {
    pub way_id: i64,
    envelope: AABB<[f64; 3]>,
}

impl WayBounds {
    /// Bounding box over the Cartesian coordinates of a way's nodes.
    /// Returns `None` for ways with no resolvable coordinates.
    pub fn from_points<I>(way_id: i64, points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut lower = first;
        let mut upper = first;
        for p in iter {
            for axis in 0..3 {
                lower[axis] = lower[axis].min(p[axis]);
                upper[axis] = upper[axis].max(p[axis]);
            }
        }
        Some(WayBounds {
            way_id,
            envelope: AABB::from_corners(lower, upper),
        })
    }
}

impl RTreeObject for WayBounds {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over way bounding volumes, payload = way id
pub struct WayIndex {
    tree: RTree<WayBounds>,
}

impl WayIndex {
    pub fn build(bounds: Vec<WayBounds>) -> Self {
        WayIndex {
            tree: RTree::bulk_load(bounds),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of all ways whose bounding box intersects the axis-aligned cube
    /// of half-side `radius` centered on `center`.
    pub fn ways_in_cube(&self, center: &[f64; 3], radius: f64) -> Vec<i64> {
        let lower = [center[0] - radius, center[1] - radius, center[2] - radius];
        let upper = [center[0] + radius, center[1] + radius, center[2] + radius];
        let probe = AABB::from_corners(lower, upper);
        self.tree
            .locate_in_envelope_intersecting(&probe)
            .map(|b| b.way_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_tree() -> KdTree {
        // 3x3 grid in the z=0 plane
        let mut points = vec![];
        let mut index = 0u32;
        for x in [0.0, 1.0, 2.0] {
            for y in [0.0, 1.0, 2.0] {
                points.push(([x, y, 0.0], index));
                index += 1;
            }
        }
        KdTree::build(&mut points)
    }

    #[test]
    fn test_kd_nearest() {
        let tree = grid_tree();
        assert_eq!(tree.len(), 9);

        // Query near (1, 1): expect the center vertex (index 4)
        let (idx, d) = tree.nearest(&[1.1, 0.9, 0.0]).unwrap();
        assert_eq!(idx, 4);
        assert!(d < 0.2);

        // Exactly on a grid point
        let (idx, d) = tree.nearest(&[2.0, 2.0, 0.0]).unwrap();
        assert_eq!(idx, 8);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_kd_nearest_filtered() {
        let tree = grid_tree();
        // Excluding the exact match returns a neighbor at distance 1
        let (idx, d) = tree
            .nearest_filtered(&[2.0, 2.0, 0.0], |i| i != 8)
            .unwrap();
        assert_ne!(idx, 8);
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kd_k_nearest_ordering() {
        let tree = grid_tree();
        let result = tree.k_nearest(&[0.0, 0.0, 0.0], 3);
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].0, 0);
        assert_eq!(result[0].1, 0.0);
        // The two axis neighbors come next, both at distance 1
        assert!((result[1].1 - 1.0).abs() < 1e-12);
        assert!((result[2].1 - 1.0).abs() < 1e-12);
        assert!(result[1].1 <= result[2].1);
    }

    #[test]
    fn test_kd_k_larger_than_len() {
        let tree = grid_tree();
        assert_eq!(tree.k_nearest(&[0.0, 0.0, 0.0], 20).len(), 9);
        assert!(tree.k_nearest(&[0.0, 0.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let tree = KdTree::build(&mut []);
        assert!(tree.is_empty());
        assert_eq!(tree.nearest(&[0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_way_index_cube_query() {
        let a = WayBounds::from_points(100, vec![[0.0, 0.0, 0.0], [1.0, 1.0, 0.0]]).unwrap();
        let b = WayBounds::from_points(200, vec![[5.0, 5.0, 0.0], [6.0, 7.0, 0.0]]).unwrap();
        let index = WayIndex::build(vec![a, b]);

        let near_origin = index.ways_in_cube(&[0.5, 0.5, 0.0], 1.0);
        assert_eq!(near_origin, vec![100]);

        let mut all = index.ways_in_cube(&[3.0, 3.0, 0.0], 4.0);
        all.sort();
        assert_eq!(all, vec![100, 200]);

        assert!(index.ways_in_cube(&[-10.0, -10.0, 0.0], 1.0).is_empty());
    }

    #[test]
    fn test_way_bounds_empty() {
        assert!(WayBounds::from_points(1, vec![]).is_none());
    }
}
