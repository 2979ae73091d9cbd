//! Shortest-path search: Dijkstra and A* with early exit, a pluggable
//! cost adjustment for turn restrictions, and cached per-source states.
//!
//! Both algorithms share one loop, generic over the search-state container.
//! The vector back-end preallocates dense arrays sized |V| and wins on
//! queries that touch much of the graph; the dict back-end allocates only
//! for touched vertices and wins on short local queries. The heap does not
//! support decrease-key; stale entries are skipped via the visited flag
//! when popped.

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::geo::haversine_distance;
use crate::graph::OsmGraph;

/// Speed bound (km/h) that keeps the time heuristic admissible. Documented
/// precondition: no way in the graph may be faster than this.
const TIME_HEURISTIC_SPEED: f64 = 100.0;

/// Which search variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    DijkstraVector,
    DijkstraDict,
    AStarVector,
    AStarDict,
}

impl Algorithm {
    fn is_astar(&self) -> bool {
        matches!(self, Algorithm::AStarVector | Algorithm::AStarDict)
    }

    fn is_dense(&self) -> bool {
        matches!(self, Algorithm::DijkstraVector | Algorithm::AStarVector)
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dijkstra" | "dijkstra_vector" => Ok(Algorithm::DijkstraVector),
            "dijkstra_dict" => Ok(Algorithm::DijkstraDict),
            "astar" | "astar_vector" => Ok(Algorithm::AStarVector),
            "astar_dict" => Ok(Algorithm::AStarDict),
            _ => Err(Error::UnknownOption {
                kind: "algorithm",
                value: s.to_string(),
            }),
        }
    }
}

/// A* guidance toward the goal. `Distance` is admissible for distance
/// weights; `Time` for time and lane-efficiency weights as long as no way
/// exceeds 100 km/h. An inadmissible pairing still yields a path, just not
/// necessarily the shortest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    Zero,
    Distance,
    Time,
}

impl FromStr for Heuristic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zero" | "none" => Ok(Heuristic::Zero),
            "distance" => Ok(Heuristic::Distance),
            "time" => Ok(Heuristic::Time),
            _ => Err(Error::UnknownOption {
                kind: "heuristic",
                value: s.to_string(),
            }),
        }
    }
}

/// Extra cost applied when relaxing an edge. `TurnRestrictions` consults the
/// graph's indexed restrictions and returns infinity for prohibited moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CostAdjustment {
    Zero,
    #[default]
    TurnRestrictions,
}

/// Per-query options for [OsmGraph::shortest_path]
#[derive(Debug, Clone, Default)]
pub struct RouteOptions<'a> {
    pub cost_adjustment: CostAdjustment,
    /// `None` picks the heuristic matching the graph's weight type (A* only)
    pub heuristic: Option<Heuristic>,
    /// Abandon the search once the frontier minimum exceeds this
    pub max_distance: Option<f64>,
    /// Sparse override of the stored weight matrix
    pub weights: Option<&'a HashMap<(u32, u32), f64>>,
}

/// Cached result of a goal-less Dijkstra run from one source
#[derive(Debug, Clone)]
pub struct DijkstraState {
    parents: Vec<u32>,
}

const NO_PARENT: u32 = u32::MAX;

/// Search bookkeeping, abstracted over dense and sparse storage
trait SearchState {
    fn dist(&self, v: u32) -> f64;
    fn set_dist(&mut self, v: u32, d: f64);
    fn parent(&self, v: u32) -> Option<u32>;
    fn set_parent(&mut self, v: u32, p: u32);
    fn visited(&self, v: u32) -> bool;
    fn mark_visited(&mut self, v: u32);
}

struct DenseState {
    dist: Vec<f64>,
    parent: Vec<u32>,
    visited: Vec<bool>,
}

impl DenseState {
    fn new(n: usize) -> Self {
        DenseState {
            dist: vec![f64::INFINITY; n],
            parent: vec![NO_PARENT; n],
            visited: vec![false; n],
        }
    }
}

impl SearchState for DenseState {
    fn dist(&self, v: u32) -> f64 {
        self.dist[v as usize]
    }

    fn set_dist(&mut self, v: u32, d: f64) {
        self.dist[v as usize] = d;
    }

    fn parent(&self, v: u32) -> Option<u32> {
        match self.parent[v as usize] {
            NO_PARENT => None,
            p => Some(p),
        }
    }

    fn set_parent(&mut self, v: u32, p: u32) {
        self.parent[v as usize] = p;
    }

    fn visited(&self, v: u32) -> bool {
        self.visited[v as usize]
    }

    fn mark_visited(&mut self, v: u32) {
        self.visited[v as usize] = true;
    }
}

#[derive(Default)]
struct SparseState {
    dist: HashMap<u32, f64>,
    parent: HashMap<u32, u32>,
    visited: HashSet<u32>,
}

impl SearchState for SparseState {
    fn dist(&self, v: u32) -> f64 {
        self.dist.get(&v).copied().unwrap_or(f64::INFINITY)
    }

    fn set_dist(&mut self, v: u32, d: f64) {
        self.dist.insert(v, d);
    }

    fn parent(&self, v: u32) -> Option<u32> {
        self.parent.get(&v).copied()
    }

    fn set_parent(&mut self, v: u32, p: u32) {
        self.parent.insert(v, p);
    }

    fn visited(&self, v: u32) -> bool {
        self.visited.contains(&v)
    }

    fn mark_visited(&mut self, v: u32) {
        self.visited.insert(v);
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueItem {
    score: f64,
    node: u32,
    hops: u32,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.score.eq(&other.score)
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: lower scores are better and BinaryHeap is a max-heap
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
    }
}

/// Core search loop shared by every variant. Returns `false` when the
/// search was abandoned because the frontier minimum exceeded
/// `max_distance`.
fn search<S, H>(
    graph: &OsmGraph,
    state: &mut S,
    origin: u32,
    goal: Option<u32>,
    options: &RouteOptions,
    heuristic: H,
) -> bool
where
    S: SearchState,
    H: Fn(u32) -> f64,
{
    let mut queue = BinaryHeap::new();
    state.set_dist(origin, 0.0);
    queue.push(QueueItem {
        score: heuristic(origin),
        node: origin,
        hops: 0,
    });

    while let Some(item) = queue.pop() {
        let u = item.node;
        if state.visited(u) {
            continue;
        }
        state.mark_visited(u);

        if goal == Some(u) {
            return true;
        }

        let du = state.dist(u);
        if let Some(max) = options.max_distance {
            if du > max {
                return false;
            }
        }

        for (v, weight) in graph.out_edges(u) {
            if state.visited(v) {
                continue;
            }
            let weight = options
                .weights
                .and_then(|w| w.get(&(u, v)).copied())
                .unwrap_or(weight);
            let adjustment = match options.cost_adjustment {
                CostAdjustment::Zero => 0.0,
                CostAdjustment::TurnRestrictions => restriction_cost(graph, u, v, state),
            };
            let alt = du + weight + adjustment;
            if alt < state.dist(v) {
                state.set_dist(v, alt);
                state.set_parent(v, u);
                queue.push(QueueItem {
                    score: alt + heuristic(v),
                    node: v,
                    hops: item.hops + 1,
                });
            }
        }
    }

    true
}

/// Infinity when moving u -> v would complete a restricted sequence.
///
/// Sequences at key `u` have the shape `[v', u, p1, p2, ..]`; the move is
/// prohibited when `v' == v` and the parent chain of `u` matches
/// `p1, p2, ..` in lock-step.
fn restriction_cost<S: SearchState>(graph: &OsmGraph, u: u32, v: u32, state: &S) -> f64 {
    let sequences = match graph.indexed_restrictions.get(&u) {
        Some(s) => s,
        None => return 0.0,
    };

    'sequences: for sequence in sequences {
        if sequence[0] != v {
            continue;
        }
        let mut current = u;
        for &expected in &sequence[2..] {
            match state.parent(current) {
                Some(p) if p == expected => current = p,
                _ => continue 'sequences,
            }
        }
        return f64::INFINITY;
    }

    0.0
}

fn resolve_heuristic<'a>(
    graph: &'a OsmGraph,
    algorithm: Algorithm,
    options: &RouteOptions,
    goal: u32,
) -> impl Fn(u32) -> f64 + 'a {
    let kind = if algorithm.is_astar() {
        options.heuristic.unwrap_or(match graph.weight_type {
            crate::config::WeightType::Distance => Heuristic::Distance,
            _ => Heuristic::Time,
        })
    } else {
        Heuristic::Zero
    };

    let goal_coord = graph.node_coordinates[goal as usize];
    move |v: u32| {
        let c = graph.node_coordinates[v as usize];
        match kind {
            Heuristic::Zero => 0.0,
            Heuristic::Distance => {
                haversine_distance(c[0], c[1], goal_coord[0], goal_coord[1])
            }
            Heuristic::Time => {
                haversine_distance(c[0], c[1], goal_coord[0], goal_coord[1])
                    / TIME_HEURISTIC_SPEED
            }
        }
    }
}

fn reconstruct<S: SearchState>(
    graph: &OsmGraph,
    state: &S,
    origin: u32,
    goal: u32,
) -> Option<Vec<i64>> {
    if origin == goal {
        return graph.node_id(origin).map(|id| vec![id]);
    }
    state.parent(goal)?;

    let mut indices = vec![goal];
    let mut current = goal;
    while current != origin {
        current = state.parent(current)?;
        indices.push(current);
    }
    indices.reverse();
    indices.into_iter().map(|idx| graph.node_id(idx)).collect()
}

/// Shortest path between two node ids; `None` when unreachable, when the
/// search exceeded `max_distance`, or when either endpoint is unknown.
pub fn shortest_path(
    graph: &OsmGraph,
    algorithm: Algorithm,
    origin: i64,
    destination: i64,
    options: &RouteOptions,
) -> Option<Vec<i64>> {
    let origin_idx = graph.node_index(origin)?;
    let goal_idx = graph.node_index(destination)?;
    let heuristic = resolve_heuristic(graph, algorithm, options, goal_idx);

    if algorithm.is_dense() {
        let mut state = DenseState::new(graph.vertex_count());
        if !search(graph, &mut state, origin_idx, Some(goal_idx), options, heuristic) {
            return None;
        }
        reconstruct(graph, &state, origin_idx, goal_idx)
    } else {
        let mut state = SparseState::default();
        if !search(graph, &mut state, origin_idx, Some(goal_idx), options, heuristic) {
            return None;
        }
        reconstruct(graph, &state, origin_idx, goal_idx)
    }
}

/// Goal-less Dijkstra from one source, producing the cacheable parent vector
pub fn dijkstra_state(graph: &OsmGraph, origin: i64) -> Result<DijkstraState> {
    let origin_idx = graph
        .node_index(origin)
        .ok_or(Error::UndefinedCachedState(origin))?;
    Ok(compute_state(graph, origin_idx))
}

fn compute_state(graph: &OsmGraph, origin_idx: u32) -> DijkstraState {
    let mut state = DenseState::new(graph.vertex_count());
    let options = RouteOptions::default();
    search(graph, &mut state, origin_idx, None, &options, |_| 0.0);
    DijkstraState {
        parents: state.parent,
    }
}

/// Dijkstra states for several origins. With `parallel` the sources fan out
/// over the rayon pool; workers share the read-only graph and each writes
/// its own output slot.
pub fn dijkstra_states(
    graph: &OsmGraph,
    origins: &[i64],
    parallel: bool,
) -> Result<Vec<(u32, DijkstraState)>> {
    let indices: Vec<u32> = origins
        .iter()
        .map(|&id| {
            graph
                .node_index(id)
                .ok_or(Error::UndefinedCachedState(id))
        })
        .collect::<Result<_>>()?;

    let states = if parallel {
        indices
            .into_par_iter()
            .map(|idx| (idx, compute_state(graph, idx)))
            .collect()
    } else {
        indices
            .into_iter()
            .map(|idx| (idx, compute_state(graph, idx)))
            .collect()
    };

    Ok(states)
}

/// Extract a path from a cached Dijkstra state in O(path length)
pub fn path_from_dijkstra_state(
    graph: &OsmGraph,
    origin: i64,
    destination: i64,
) -> Result<Option<Vec<i64>>> {
    let origin_idx = graph
        .node_index(origin)
        .ok_or(Error::UndefinedCachedState(origin))?;
    let state = graph
        .dijkstra_states
        .get(&origin_idx)
        .ok_or(Error::UndefinedCachedState(origin))?;

    let goal_idx = match graph.node_index(destination) {
        Some(idx) => idx,
        None => return Ok(None),
    };

    if goal_idx == origin_idx {
        return Ok(Some(vec![origin]));
    }
    if state.parents[goal_idx as usize] == NO_PARENT {
        return Ok(None);
    }

    let mut indices = vec![goal_idx];
    let mut current = goal_idx;
    while current != origin_idx {
        current = state.parents[current as usize];
        if current == NO_PARENT {
            return Ok(None);
        }
        indices.push(current);
    }
    indices.reverse();

    Ok(indices
        .into_iter()
        .map(|idx| graph.node_id(idx))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_pops_lowest_score_first() {
        let mut queue = BinaryHeap::new();
        for (score, node) in [(3.0, 1), (1.0, 2), (2.0, 3)] {
            queue.push(QueueItem {
                score,
                node,
                hops: 0,
            });
        }
        let order: Vec<u32> = std::iter::from_fn(|| queue.pop().map(|i| i.node)).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn test_algorithm_aliases() {
        assert_eq!(
            "dijkstra".parse::<Algorithm>().unwrap(),
            Algorithm::DijkstraVector
        );
        assert_eq!(
            "astar".parse::<Algorithm>().unwrap(),
            Algorithm::AStarVector
        );
        assert_eq!(
            "astar_dict".parse::<Algorithm>().unwrap(),
            Algorithm::AStarDict
        );
        assert!("bellman_ford".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_state_containers_agree() {
        let mut dense = DenseState::new(4);
        let mut sparse = SparseState::default();

        for state in [&mut dense as &mut dyn SearchState, &mut sparse] {
            assert!(state.dist(2).is_infinite());
            assert_eq!(state.parent(2), None);
            assert!(!state.visited(2));

            state.set_dist(2, 1.5);
            state.set_parent(2, 0);
            state.mark_visited(2);

            assert_eq!(state.dist(2), 1.5);
            assert_eq!(state.parent(2), Some(0));
            assert!(state.visited(2));
        }
    }
}
