//! Graph assembly: from the raw OSM attribute tree to a query-ready,
//! edge-weighted directed network.
//!
//! Construction pipeline:
//! - filter ways by network type and normalize their tags
//! - keep exactly the nodes referenced by retained ways (input order defines
//!   the dense vertex indexing)
//! - emit directed edges per consecutive node pair, honoring oneway and
//!   reverseway, weighted by the chosen weight type
//! - validate and store turn restrictions, then index them by via vertex
//! - optionally trim to the largest weakly connected component
//! - build the spatial indices
//!
//! Every mutating operation (trimming, subgraphing) re-runs assembly so the
//! vertex bijection, weights and derived indices stay consistent.

use log::info;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

use crate::config::{Config, NetworkType, WeightType};
use crate::error::{Error, Result};
use crate::geo::{self, GeoLocation};
use crate::osm::{Node, OsmData, Restriction, RestrictionVia, Way};
use crate::restrictions;
use crate::route::{self, Algorithm, DijkstraState, RouteOptions};
use crate::simplify::{self, SimplifiedGraph};
use crate::spatial::{KdTree, WayBounds, WayIndex};
use crate::tags;

/// Options controlling [build_graph]
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub network_type: NetworkType,
    pub weight_type: WeightType,
    /// Trim the result to its largest weakly connected component
    pub largest_connected_component: bool,
    /// Precompute a Dijkstra state for every vertex (parallelized; expensive)
    pub precompute_states: bool,
    /// Explicit configuration; `None` snapshots the process-wide default
    pub config: Option<Config>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            network_type: NetworkType::Drive,
            weight_type: WeightType::Distance,
            largest_connected_component: true,
            precompute_states: false,
            config: None,
        }
    }
}

/// A position along a way: the pair of consecutive way nodes bracketing it
/// and the fractional position in [0, 1] between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePoint {
    pub n1: i64,
    pub n2: i64,
    pub position: f64,
}

/// An OpenStreetMap road or rail network, ready for routing and spatial
/// queries.
pub struct OsmGraph {
    /// Retained nodes by id
    pub nodes: HashMap<i64, Node>,
    /// Retained ways by id
    pub ways: HashMap<i64, Way>,
    /// Validated turn restrictions by relation id
    pub restrictions: HashMap<i64, Restriction>,
    /// Directed adjacency; node weight = OSM id, edge weight = routing weight.
    /// The edge weights double as the sparse weight matrix: an entry exists
    /// exactly where an edge exists, and every weight is positive.
    pub graph: DiGraph<i64, f64>,
    /// OSM node id -> dense vertex index
    pub node_map: HashMap<i64, NodeIndex>,
    /// Dense vertex index -> OSM node id
    pub index_to_node: Vec<i64>,
    /// Vertex index -> [lat, lon]
    pub node_coordinates: Vec<[f64; 2]>,
    /// Node id -> ids of ways containing it
    pub node_to_way: HashMap<i64, HashSet<i64>>,
    /// Directed edge (u id, v id) -> way id (last way iterated wins)
    pub edge_to_way: HashMap<(i64, i64), i64>,
    /// Via vertex index -> restricted sequences `[to, via.., from]`
    pub indexed_restrictions: HashMap<u32, Vec<Vec<u32>>>,
    /// What quantity the edge weights carry
    pub weight_type: WeightType,

    pub(crate) way_order: Vec<i64>,
    pub(crate) cartesian: Vec<[f64; 3]>,
    pub(crate) node_tree: KdTree,
    pub(crate) way_index: WayIndex,
    pub(crate) dijkstra_states: HashMap<u32, DijkstraState>,
    pub(crate) config: Config,
}

/// Build a graph from raw OSM data
pub fn build_graph(data: &OsmData, options: &BuildOptions) -> Result<OsmGraph> {
    let config = options.config.clone().unwrap_or_else(Config::global);
    let class_key = if options.network_type.is_rail() {
        "railway"
    } else {
        "highway"
    };
    let filters = config.filters(options.network_type);

    // Ways: classified for this network and not excluded by any filter rule
    let mut ways = Vec::new();
    for raw in &data.ways {
        if raw.nodes.len() < 2 || !raw.tags.contains_key(class_key) {
            continue;
        }
        if filters.iter().any(|rule| rule.matches(&raw.tags)) {
            continue;
        }
        ways.push(tags::normalize_way(raw, class_key, &config));
    }

    // Nodes: exactly those referenced by retained ways, in input order
    let keep: HashSet<i64> = ways.iter().flat_map(|w| w.nodes.iter().copied()).collect();
    let nodes: Vec<Node> = data
        .nodes
        .iter()
        .filter(|n| keep.contains(&n.id))
        .map(|n| Node {
            id: n.id,
            location: GeoLocation::new(n.lat, n.lon),
            tags: n.tags.clone(),
        })
        .collect();

    if nodes.len() != keep.len() {
        return Err(Error::DataQuality(format!(
            "retained ways reference {} distinct nodes but the extract provides {}",
            keep.len(),
            nodes.len()
        )));
    }

    let way_lookup: HashMap<i64, &Way> = ways.iter().map(|w| (w.id, w)).collect();
    let restrictions = restrictions::parse_restrictions(&data.relations, &way_lookup);
    drop(way_lookup);

    let mut graph = assemble(nodes, ways, restrictions, options.weight_type, config)?;

    if options.largest_connected_component {
        graph.retain_largest_component()?;
    }

    info!(
        "built {} network: {} nodes, {} edges, {} ways, {} restrictions",
        options.network_type.name(),
        graph.graph.node_count(),
        graph.graph.edge_count(),
        graph.ways.len(),
        graph.restrictions.len()
    );

    if options.precompute_states {
        let all: Vec<i64> = graph.index_to_node.clone();
        graph.set_dijkstra_states(&all, true)?;
    }

    Ok(graph)
}

/// Assemble a graph from already-typed parts. Nodes and ways must be
/// mutually consistent; order defines vertex indexing and edge-to-way
/// precedence.
fn assemble(
    nodes: Vec<Node>,
    ways: Vec<Way>,
    restrictions: Vec<Restriction>,
    weight_type: WeightType,
    config: Config,
) -> Result<OsmGraph> {
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
    let mut node_map = HashMap::with_capacity(nodes.len());
    let mut index_to_node = Vec::with_capacity(nodes.len());
    let mut node_coordinates = Vec::with_capacity(nodes.len());
    let mut cartesian = Vec::with_capacity(nodes.len());
    let mut node_store = HashMap::with_capacity(nodes.len());

    for node in nodes {
        let idx = graph.add_node(node.id);
        node_map.insert(node.id, idx);
        index_to_node.push(node.id);
        node_coordinates.push([node.location.lat, node.location.lon]);
        cartesian.push(node.location.to_cartesian());
        node_store.insert(node.id, node);
    }

    let mut node_to_way: HashMap<i64, HashSet<i64>> = HashMap::new();
    let mut edge_to_way = HashMap::new();
    let mut way_order = Vec::with_capacity(ways.len());
    let mut way_store = HashMap::with_capacity(ways.len());

    for way in ways {
        for &node_id in &way.nodes {
            if !node_map.contains_key(&node_id) {
                return Err(Error::DataQuality(format!(
                    "way {} references missing node {}",
                    way.id, node_id
                )));
            }
            node_to_way.entry(node_id).or_default().insert(way.id);
        }

        for pair in way.nodes.windows(2) {
            let (a, b) = if way.reverseway {
                (pair[1], pair[0])
            } else {
                (pair[0], pair[1])
            };
            let weight = edge_weight(
                &node_store[&a].location,
                &node_store[&b].location,
                &way,
                weight_type,
                &config,
            );
            graph.update_edge(node_map[&a], node_map[&b], weight);
            edge_to_way.insert((a, b), way.id);
            if !way.oneway {
                graph.update_edge(node_map[&b], node_map[&a], weight);
                edge_to_way.insert((b, a), way.id);
            }
        }

        way_order.push(way.id);
        way_store.insert(way.id, way);
    }

    let restriction_store: HashMap<i64, Restriction> =
        restrictions.into_iter().map(|r| (r.id, r)).collect();

    let mut result = OsmGraph {
        nodes: node_store,
        ways: way_store,
        restrictions: restriction_store,
        graph,
        node_map,
        index_to_node,
        node_coordinates,
        node_to_way,
        edge_to_way,
        indexed_restrictions: HashMap::new(),
        weight_type,
        way_order,
        cartesian,
        node_tree: KdTree::build(&mut []),
        way_index: WayIndex::build(vec![]),
        dijkstra_states: HashMap::new(),
        config,
    };

    result.indexed_restrictions = restrictions::index_restrictions(&result);
    result.rebuild_spatial_indices();
    Ok(result)
}

fn edge_weight(
    a: &GeoLocation,
    b: &GeoLocation,
    way: &Way,
    weight_type: WeightType,
    config: &Config,
) -> f64 {
    let km = geo::distance(a, b);
    let weight = match weight_type {
        WeightType::Distance => km,
        WeightType::Time => km / way.maxspeed as f64,
        WeightType::LaneEfficiency => {
            km / (way.maxspeed as f64 * config.efficiency(way.lanes))
        }
    };
    // Zero-length edges would break the strict-positivity contract of the
    // routing core; clip to the smallest representable positive value.
    weight.max(f64::MIN_POSITIVE)
}

impl OsmGraph {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Dense vertex index of an OSM node id
    pub fn node_index(&self, id: i64) -> Option<u32> {
        self.node_map.get(&id).map(|idx| idx.index() as u32)
    }

    /// OSM node id of a dense vertex index
    pub fn node_id(&self, index: u32) -> Option<i64> {
        self.index_to_node.get(index as usize).copied()
    }

    /// Location of a vertex
    pub fn node_location(&self, index: u32) -> Option<GeoLocation> {
        self.node_coordinates
            .get(index as usize)
            .map(|c| GeoLocation::new(c[0], c[1]))
    }

    /// Stored weight of the directed edge between two vertex indices
    pub fn weight(&self, u: u32, v: u32) -> Option<f64> {
        self.graph
            .find_edge(NodeIndex::new(u as usize), NodeIndex::new(v as usize))
            .map(|e| self.graph[e])
    }

    /// Out-neighbors of a vertex with their edge weights
    pub(crate) fn out_edges(&self, u: u32) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.graph
            .edges(NodeIndex::new(u as usize))
            .map(|e| (e.target().index() as u32, *e.weight()))
    }

    /// Way that produced the directed edge between two vertex indices
    pub(crate) fn way_for_edge(&self, u: u32, v: u32) -> Option<i64> {
        let u_id = self.node_id(u)?;
        let v_id = self.node_id(v)?;
        self.edge_to_way.get(&(u_id, v_id)).copied()
    }

    /// Per-edge weights along a path of node ids. `weights` overrides the
    /// stored matrix where it has an entry. Returns `None` when the path
    /// traverses a nonexistent edge.
    pub fn weights_from_path(
        &self,
        path: &[i64],
        weights: Option<&HashMap<(u32, u32), f64>>,
    ) -> Option<Vec<f64>> {
        path.windows(2)
            .map(|pair| {
                let u = self.node_index(pair[0])?;
                let v = self.node_index(pair[1])?;
                match weights.and_then(|w| w.get(&(u, v))) {
                    Some(&w) => Some(w),
                    None => self.weight(u, v),
                }
            })
            .collect()
    }

    /// Total weight of a path of node ids, or `None` if the path is invalid
    pub fn total_path_weight(
        &self,
        path: &[i64],
        weights: Option<&HashMap<(u32, u32), f64>>,
    ) -> Option<f64> {
        self.weights_from_path(path, weights)
            .map(|w| w.iter().sum())
    }

    /// Shortest path between two node ids, or `None` when no path exists
    /// (including when `max_distance` is exceeded).
    pub fn shortest_path(
        &self,
        algorithm: Algorithm,
        origin: i64,
        destination: i64,
        options: &RouteOptions,
    ) -> Option<Vec<i64>> {
        route::shortest_path(self, algorithm, origin, destination, options)
    }

    /// Run goal-less Dijkstra from `origin` and cache the resulting parent
    /// vector for later O(path-length) extraction.
    pub fn set_dijkstra_state(&mut self, origin: i64) -> Result<()> {
        let state = route::dijkstra_state(self, origin)?;
        let idx = self
            .node_index(origin)
            .ok_or(Error::UndefinedCachedState(origin))?;
        self.dijkstra_states.insert(idx, state);
        Ok(())
    }

    /// Cache Dijkstra states for several origins, optionally in parallel.
    /// Workers only read the graph; each result lands in its own slot.
    pub fn set_dijkstra_states(&mut self, origins: &[i64], parallel: bool) -> Result<()> {
        let states = route::dijkstra_states(self, origins, parallel)?;
        self.dijkstra_states.extend(states);
        Ok(())
    }

    /// Extract a shortest path from a previously cached Dijkstra state
    pub fn shortest_path_from_dijkstra_state(
        &self,
        origin: i64,
        destination: i64,
    ) -> Result<Option<Vec<i64>>> {
        route::path_from_dijkstra_state(self, origin, destination)
    }

    /// Nearest node to a location: `(node id, chord distance in km)`
    pub fn nearest_node(&self, location: &GeoLocation) -> Option<(i64, f64)> {
        let query = location.to_cartesian();
        let (idx, dist) = self.node_tree.nearest(&query)?;
        Some((self.index_to_node[idx as usize], dist))
    }

    /// The `k` nearest nodes to a location, closest first
    pub fn nearest_nodes(&self, location: &GeoLocation, k: usize) -> Vec<(i64, f64)> {
        let query = location.to_cartesian();
        self.node_tree
            .k_nearest(&query, k)
            .into_iter()
            .map(|(idx, dist)| (self.index_to_node[idx as usize], dist))
            .collect()
    }

    /// Nearest node to a known node, excluding the node itself
    pub fn nearest_node_to(&self, node_id: i64) -> Option<(i64, f64)> {
        let origin = self.node_index(node_id)?;
        let query = self.cartesian[origin as usize];
        let (idx, dist) = self.node_tree.nearest_filtered(&query, |i| i != origin)?;
        Some((self.index_to_node[idx as usize], dist))
    }

    /// Nearest way to a location. When `search_radius` (km) is omitted the
    /// distance to the nearest node is used. Returns the way id, the
    /// straight-line distance to the way and the position along it.
    pub fn nearest_way(
        &self,
        location: &GeoLocation,
        search_radius: Option<f64>,
    ) -> Option<(i64, f64, EdgePoint)> {
        let query = location.to_cartesian();
        let radius = match search_radius {
            Some(r) => r,
            None => self.node_tree.nearest(&query)?.1,
        };

        let mut best: Option<(i64, f64, EdgePoint)> = None;
        for way_id in self.way_index.ways_in_cube(&query, radius) {
            let way = &self.ways[&way_id];
            for pair in way.nodes.windows(2) {
                let a_idx = match self.node_index(pair[0]) {
                    Some(i) => i,
                    None => continue,
                };
                let b_idx = match self.node_index(pair[1]) {
                    Some(i) => i,
                    None => continue,
                };
                let a = &self.cartesian[a_idx as usize];
                let b = &self.cartesian[b_idx as usize];
                let (position, d2) = geo::point_segment_position(&query, a, b);
                let dist = d2.sqrt();
                if best.as_ref().map(|(_, d, _)| dist < *d).unwrap_or(true) {
                    best = Some((
                        way_id,
                        dist,
                        EdgePoint {
                            n1: pair[0],
                            n2: pair[1],
                            position,
                        },
                    ));
                }
            }
        }
        best
    }

    /// Ids of all ways whose bounding box intersects the cube of half-side
    /// `search_radius` (km) around the location
    pub fn nearest_ways(&self, location: &GeoLocation, search_radius: f64) -> Vec<i64> {
        self.way_index
            .ways_in_cube(&location.to_cartesian(), search_radius)
    }

    /// Subgraph induced by a vertex subset: includes every way any of whose
    /// nodes lies in the subset, together with all nodes of those ways.
    pub fn osm_subgraph(&self, node_ids: &[i64]) -> Result<OsmGraph> {
        let subset: HashSet<i64> = node_ids.iter().copied().collect();
        let kept_ways: Vec<Way> = self
            .way_order
            .iter()
            .filter_map(|id| self.ways.get(id))
            .filter(|w| w.nodes.iter().any(|n| subset.contains(n)))
            .cloned()
            .collect();

        self.rebuild_from_ways(kept_ways)
    }

    /// Contract degree-two chains into single weighted edges
    pub fn simplify(&self) -> SimplifiedGraph {
        simplify::simplify_graph(self)
    }

    /// Trim the graph to its largest weakly connected component and rebuild
    /// every derived structure.
    pub(crate) fn retain_largest_component(&mut self) -> Result<()> {
        let n = self.graph.node_count();
        if n == 0 {
            return Ok(());
        }

        let mut union = UnionFind::<u32>::new(n);
        for edge in self.graph.edge_references() {
            union.union(
                edge.source().index() as u32,
                edge.target().index() as u32,
            );
        }

        let mut sizes: HashMap<u32, usize> = HashMap::new();
        for idx in 0..n as u32 {
            *sizes.entry(union.find(idx)).or_insert(0) += 1;
        }
        let largest = sizes
            .iter()
            .max_by_key(|(_, size)| **size)
            .map(|(root, _)| *root)
            .expect("nonempty graph has a component");

        if sizes.len() == 1 {
            return Ok(());
        }

        let kept_nodes: HashSet<i64> = (0..n as u32)
            .filter(|&idx| union.find(idx) == largest)
            .map(|idx| self.index_to_node[idx as usize])
            .collect();

        // A way's nodes always share a weak component, so ways survive or
        // die wholesale with their first node.
        let kept_ways: Vec<Way> = self
            .way_order
            .iter()
            .filter_map(|id| self.ways.get(id))
            .filter(|w| w.nodes.iter().all(|n| kept_nodes.contains(n)))
            .cloned()
            .collect();

        *self = self.rebuild_from_ways(kept_ways)?;
        Ok(())
    }

    /// Rebuild a graph from a subset of this graph's ways, carrying over the
    /// restrictions that remain fully referenced.
    fn rebuild_from_ways(&self, ways: Vec<Way>) -> Result<OsmGraph> {
        let way_ids: HashSet<i64> = ways.iter().map(|w| w.id).collect();
        let node_ids: HashSet<i64> = ways.iter().flat_map(|w| w.nodes.iter().copied()).collect();

        // Preserve the existing vertex order for the retained nodes
        let nodes: Vec<Node> = self
            .index_to_node
            .iter()
            .filter(|id| node_ids.contains(id))
            .map(|id| self.nodes[id].clone())
            .collect();

        let restrictions: Vec<Restriction> = self
            .restrictions
            .values()
            .filter(|r| {
                let via_ok = match &r.via {
                    RestrictionVia::Node(n) => node_ids.contains(n),
                    RestrictionVia::Ways(ws) => ws.iter().all(|w| way_ids.contains(w)),
                };
                via_ok && way_ids.contains(&r.from_way) && way_ids.contains(&r.to_way)
            })
            .cloned()
            .collect();

        assemble(
            nodes,
            ways,
            restrictions,
            self.weight_type,
            self.config.clone(),
        )
    }

    pub(crate) fn rebuild_spatial_indices(&mut self) {
        let mut points: Vec<([f64; 3], u32)> = self
            .cartesian
            .iter()
            .enumerate()
            .map(|(idx, p)| (*p, idx as u32))
            .collect();
        self.node_tree = KdTree::build(&mut points);

        let bounds: Vec<WayBounds> = self
            .way_order
            .iter()
            .filter_map(|id| {
                let way = self.ways.get(id)?;
                WayBounds::from_points(
                    *id,
                    way.nodes.iter().filter_map(|n| {
                        self.node_map
                            .get(n)
                            .map(|idx| self.cartesian[idx.index()])
                    }),
                )
            })
            .collect();
        self.way_index = WayIndex::build(bounds);
    }

    /// Structural self-check, used by tests and debugging. Verifies the
    /// node/way cross-references, the vertex bijection, weight positivity
    /// and the restriction sequences.
    pub fn check_invariants(&self) -> Result<()> {
        for way in self.ways.values() {
            for node in &way.nodes {
                if !self.nodes.contains_key(node) {
                    return Err(Error::DataQuality(format!(
                        "way {} references missing node {}",
                        way.id, node
                    )));
                }
            }
        }

        if self.index_to_node.len() != self.nodes.len()
            || self.node_map.len() != self.nodes.len()
        {
            return Err(Error::DataQuality("vertex bijection out of sync".into()));
        }
        for (idx, id) in self.index_to_node.iter().enumerate() {
            if self.node_map.get(id).map(|i| i.index()) != Some(idx) {
                return Err(Error::DataQuality(format!(
                    "vertex bijection broken at index {}",
                    idx
                )));
            }
        }

        for edge in self.graph.edge_references() {
            if !edge.weight().is_finite() || *edge.weight() <= 0.0 {
                return Err(Error::DataQuality(format!(
                    "non-positive weight on edge {:?}",
                    edge
                )));
            }
        }

        for ((u, v), way_id) in &self.edge_to_way {
            let covered = [u, v].into_iter().all(|node| {
                self.node_to_way
                    .get(node)
                    .map(|set| set.contains(way_id))
                    .unwrap_or(false)
            });
            if !covered {
                return Err(Error::DataQuality(format!(
                    "edge ({}, {}) maps to way {} unknown to node_to_way",
                    u, v, way_id
                )));
            }
        }

        for (via, sequences) in &self.indexed_restrictions {
            for seq in sequences {
                if seq.len() < 3 || seq[1] != *via {
                    return Err(Error::DataQuality(format!(
                        "malformed restriction sequence {:?} at via {}",
                        seq, via
                    )));
                }
                for pair in seq.windows(2) {
                    if self.weight(pair[1], pair[0]).is_none() {
                        return Err(Error::DataQuality(format!(
                            "restriction sequence {:?} traverses missing edge ({}, {})",
                            seq, pair[1], pair[0]
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::{RawNode, RawWay};
    use std::collections::HashMap as StdHashMap;

    fn raw_node(id: i64, lat: f64, lon: f64) -> RawNode {
        RawNode {
            id,
            lat,
            lon,
            tags: StdHashMap::new(),
        }
    }

    fn raw_way(id: i64, nodes: &[i64], extra: &[(&str, &str)]) -> RawWay {
        let mut tags = StdHashMap::new();
        tags.insert("highway".to_string(), "residential".to_string());
        for (key, value) in extra {
            tags.insert(key.to_string(), value.to_string());
        }
        RawWay {
            id,
            nodes: nodes.to_vec(),
            tags,
        }
    }

    fn options(weight_type: WeightType) -> BuildOptions {
        BuildOptions {
            network_type: NetworkType::Drive,
            weight_type,
            largest_connected_component: false,
            precompute_states: false,
            config: None,
        }
    }

    #[test]
    fn test_explicit_config_overrides_defaults() {
        let data = OsmData {
            nodes: vec![raw_node(1, 0.0, 0.0), raw_node(2, 0.001, 0.0)],
            ways: vec![raw_way(7, &[1, 2], &[])],
            relations: vec![],
        };

        let mut config = Config::default();
        config.maxspeeds.insert("residential".to_string(), 10);
        let custom = BuildOptions {
            config: Some(config),
            ..options(WeightType::Time)
        };

        let slow = build_graph(&data, &custom).unwrap();
        let stock = build_graph(&data, &options(WeightType::Time)).unwrap();

        let w_slow = slow.total_path_weight(&[1, 2], None).unwrap();
        let w_stock = stock.total_path_weight(&[1, 2], None).unwrap();
        // The stock residential default is 50 km/h
        assert!((w_slow / w_stock - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reverseway_emits_reversed_edges() {
        let data = OsmData {
            nodes: vec![raw_node(1, 0.0, 0.0), raw_node(2, 0.001, 0.0)],
            ways: vec![raw_way(7, &[1, 2], &[("oneway", "-1")])],
            relations: vec![],
        };
        let graph = build_graph(&data, &options(WeightType::Distance)).unwrap();

        let u = graph.node_index(1).unwrap();
        let v = graph.node_index(2).unwrap();
        // Stored order 1 -> 2, but travel direction is 2 -> 1 only
        assert!(graph.weight(v, u).is_some());
        assert!(graph.weight(u, v).is_none());
        assert_eq!(graph.edge_to_way.get(&(2, 1)), Some(&7));
        assert!(!graph.edge_to_way.contains_key(&(1, 2)));
    }

    #[test]
    fn test_lane_efficiency_scales_time() {
        let nodes = vec![raw_node(1, 0.0, 0.0), raw_node(2, 0.001, 0.0)];
        let single_lane = OsmData {
            nodes: nodes.clone(),
            ways: vec![raw_way(7, &[1, 2], &[("maxspeed", "50"), ("lanes", "1")])],
            relations: vec![],
        };
        let four_lanes = OsmData {
            nodes,
            ways: vec![raw_way(7, &[1, 2], &[("maxspeed", "50"), ("lanes", "4")])],
            relations: vec![],
        };

        let slow = build_graph(&single_lane, &options(WeightType::LaneEfficiency)).unwrap();
        let fast = build_graph(&four_lanes, &options(WeightType::LaneEfficiency)).unwrap();

        let w_slow = slow.total_path_weight(&[1, 2], None).unwrap();
        let w_fast = fast.total_path_weight(&[1, 2], None).unwrap();
        // One lane runs at 70% efficiency, four lanes at 100%
        assert!((w_slow / w_fast - 1.0 / 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_network_filter_drops_ways() {
        let data = OsmData {
            nodes: vec![
                raw_node(1, 0.0, 0.0),
                raw_node(2, 0.001, 0.0),
                raw_node(3, 0.002, 0.0),
            ],
            ways: vec![
                raw_way(7, &[1, 2], &[]),
                raw_way(8, &[2, 3], &[("highway", "footway")]),
            ],
            relations: vec![],
        };
        let graph = build_graph(&data, &options(WeightType::Distance)).unwrap();
        assert_eq!(graph.ways.len(), 1);
        assert!(graph.node_index(3).is_none());

        let walk = BuildOptions {
            network_type: NetworkType::Walk,
            weight_type: WeightType::Distance,
            largest_connected_component: false,
            precompute_states: false,
            config: None,
        };
        let graph = build_graph(&data, &walk).unwrap();
        assert_eq!(graph.ways.len(), 2);
    }

    #[test]
    fn test_parallel_edges_last_way_wins() {
        let data = OsmData {
            nodes: vec![raw_node(1, 0.0, 0.0), raw_node(2, 0.001, 0.0)],
            ways: vec![
                raw_way(7, &[1, 2], &[]),
                raw_way(8, &[1, 2], &[]),
            ],
            relations: vec![],
        };
        let graph = build_graph(&data, &options(WeightType::Distance)).unwrap();
        assert_eq!(graph.edge_to_way.get(&(1, 2)), Some(&8));
        // Still a single stored edge per direction
        assert_eq!(graph.graph.edge_count(), 2);
    }

    #[test]
    fn test_rail_network_selects_railway_ways() {
        let mut rail_tags = StdHashMap::new();
        rail_tags.insert("railway".to_string(), "rail".to_string());
        let data = OsmData {
            nodes: vec![raw_node(1, 0.0, 0.0), raw_node(2, 0.001, 0.0)],
            ways: vec![
                RawWay {
                    id: 7,
                    nodes: vec![1, 2],
                    tags: rail_tags,
                },
                raw_way(8, &[1, 2], &[]),
            ],
            relations: vec![],
        };
        let rail = BuildOptions {
            network_type: NetworkType::Rail,
            weight_type: WeightType::Distance,
            largest_connected_component: false,
            precompute_states: false,
            config: None,
        };
        let graph = build_graph(&data, &rail).unwrap();
        assert_eq!(graph.ways.len(), 1);
        assert!(graph.ways[&7].rail.is_some());
    }
}
