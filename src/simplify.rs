//! Topological simplification: contract chains of degree-two vertices into
//! single edges, keeping only true intersections and dead-ends.
//!
//! The contracted edge carries the summed weight of the original path, the
//! ordered list of original vertex indices it replaces, and the set of way
//! ids it traverses, so routing on the simplified graph reproduces original
//! path weights and the full geometry stays recoverable.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

use crate::graph::OsmGraph;

/// One contracted edge: total weight, the original vertex indices along the
/// contracted path (endpoints included), and the ways it runs over.
#[derive(Debug, Clone)]
pub struct SimplifiedEdge {
    pub weight: f64,
    pub path: Vec<u32>,
    pub ways: HashSet<i64>,
}

/// The simplified companion of an [OsmGraph]: vertices are intersections
/// and dead-ends of the original; edges contract the chains between them.
pub struct SimplifiedGraph {
    /// Adjacency over endpoints; node weight = original OSM node id, edge
    /// weight = the minimum contracted path weight between the endpoints
    pub graph: DiGraph<i64, f64>,
    /// OSM node id -> simplified vertex
    pub node_map: HashMap<i64, NodeIndex>,
    /// Simplified vertex index -> original vertex index
    pub endpoints: Vec<u32>,
    /// All contracted edges per endpoint pair (original vertex indices).
    /// Slot 0 is primary and holds the minimum weight; parallel chains
    /// follow under incrementing positions.
    pub edges: HashMap<(u32, u32), Vec<SimplifiedEdge>>,
}

impl SimplifiedGraph {
    /// Total weight of the cheapest endpoint-to-endpoint route, computed
    /// with Dijkstra on the contracted edges
    pub fn shortest_path_weight(&self, origin: i64, destination: i64) -> Option<f64> {
        let from = *self.node_map.get(&origin)?;
        let to = *self.node_map.get(&destination)?;
        let result = petgraph::algo::astar(
            &self.graph,
            from,
            |v| v == to,
            |e| *e.weight(),
            |_| 0.0,
        );
        result.map(|(cost, _)| cost)
    }

    /// Shortest endpoint-to-endpoint route as OSM node ids of the
    /// simplified graph
    pub fn shortest_path(&self, origin: i64, destination: i64) -> Option<Vec<i64>> {
        let from = *self.node_map.get(&origin)?;
        let to = *self.node_map.get(&destination)?;
        let (_, path) = petgraph::algo::astar(
            &self.graph,
            from,
            |v| v == to,
            |e| *e.weight(),
            |_| 0.0,
        )?;
        Some(path.into_iter().map(|idx| self.graph[idx]).collect())
    }
}

struct Degrees {
    out_neighbors: Vec<Vec<u32>>,
    in_degree: Vec<usize>,
    out_degree: Vec<usize>,
    neighbors: Vec<HashSet<u32>>,
    self_loop: Vec<bool>,
}

fn degrees(graph: &OsmGraph) -> Degrees {
    let n = graph.vertex_count();
    let mut out_neighbors = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    let mut out_degree = vec![0usize; n];
    let mut neighbors: Vec<HashSet<u32>> = vec![HashSet::new(); n];
    let mut self_loop = vec![false; n];

    for edge in graph.graph.edge_references() {
        let u = edge.source().index() as u32;
        let v = edge.target().index() as u32;
        if u == v {
            self_loop[u as usize] = true;
            continue;
        }
        out_neighbors[u as usize].push(v);
        out_degree[u as usize] += 1;
        in_degree[v as usize] += 1;
        neighbors[u as usize].insert(v);
        neighbors[v as usize].insert(u);
    }

    Degrees {
        out_neighbors,
        in_degree,
        out_degree,
        neighbors,
        self_loop,
    }
}

/// A vertex survives simplification when it is anything but the interior of
/// a uniform chain: a self-loop, a source or sink, a spot where the one-way
/// property changes, or a junction with more or fewer than two neighbors.
fn is_endpoint(d: &Degrees, v: usize) -> bool {
    if d.self_loop[v] {
        return true;
    }
    if d.in_degree[v] == 0 || d.out_degree[v] == 0 {
        return true;
    }
    let distinct = d.neighbors[v].len();
    if distinct == 2 && d.in_degree[v] != d.out_degree[v] {
        return true;
    }
    distinct != 2
}

/// Contract every endpoint-to-endpoint chain of `graph`
pub fn simplify_graph(graph: &OsmGraph) -> SimplifiedGraph {
    let n = graph.vertex_count();
    let d = degrees(graph);
    let endpoint: Vec<bool> = (0..n).map(|v| is_endpoint(&d, v)).collect();

    let mut result = SimplifiedGraph {
        graph: DiGraph::new(),
        node_map: HashMap::new(),
        endpoints: Vec::new(),
        edges: HashMap::new(),
    };
    let mut simplified_index: HashMap<u32, NodeIndex> = HashMap::new();

    let ensure_node = |result: &mut SimplifiedGraph,
                           simplified_index: &mut HashMap<u32, NodeIndex>,
                           original: u32|
     -> NodeIndex {
        *simplified_index.entry(original).or_insert_with(|| {
            let id = graph.node_id(original).expect("vertex in range");
            let idx = result.graph.add_node(id);
            result.node_map.insert(id, idx);
            result.endpoints.push(original);
            idx
        })
    };

    for start in 0..n as u32 {
        if !endpoint[start as usize] {
            continue;
        }

        for &first in &d.out_neighbors[start as usize] {
            // Walk forward through interior vertices until the next endpoint
            let mut path = vec![start, first];
            let mut previous = start;
            let mut current = first;
            let mut steps = 0usize;
            while !endpoint[current as usize] && steps <= n {
                let next = d.out_neighbors[current as usize]
                    .iter()
                    .copied()
                    .find(|&candidate| candidate != previous);
                match next {
                    Some(next) => {
                        path.push(next);
                        previous = current;
                        current = next;
                        steps += 1;
                    }
                    None => break,
                }
            }
            if !endpoint[current as usize] {
                continue;
            }

            let mut weight = 0.0;
            let mut ways = HashSet::new();
            for pair in path.windows(2) {
                weight += graph.weight(pair[0], pair[1]).unwrap_or(f64::INFINITY);
                if let Some(way_id) = graph.way_for_edge(pair[0], pair[1]) {
                    ways.insert(way_id);
                }
            }

            let from = ensure_node(&mut result, &mut simplified_index, start);
            let to = ensure_node(&mut result, &mut simplified_index, current);
            let data = SimplifiedEdge {
                weight,
                path,
                ways,
            };

            let slot = result.edges.entry((start, current)).or_default();
            if slot.is_empty() {
                result.graph.add_edge(from, to, weight);
                slot.push(data);
            } else {
                // Parallel chain between the same endpoints: the primary
                // slot keeps the minimum weight
                if weight < slot[0].weight {
                    if let Some(edge) = result.graph.find_edge(from, to) {
                        result.graph[edge] = weight;
                    }
                    slot.insert(0, data);
                } else {
                    slot.push(data);
                }
            }
        }

        // A self-loop survives as a loop edge on the endpoint itself
        if d.self_loop[start as usize] {
            if let Some(weight) = graph.weight(start, start) {
                let idx = ensure_node(&mut result, &mut simplified_index, start);
                let slot = result.edges.entry((start, start)).or_default();
                if slot.is_empty() {
                    result.graph.add_edge(idx, idx, weight);
                    slot.push(SimplifiedEdge {
                        weight,
                        path: vec![start, start],
                        ways: graph.way_for_edge(start, start).into_iter().collect(),
                    });
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkType, WeightType};
    use crate::graph::{build_graph, BuildOptions};
    use crate::osm::{OsmData, RawNode, RawWay};
    use std::collections::HashMap as StdHashMap;

    fn node(id: i64, lat: f64, lon: f64) -> RawNode {
        RawNode {
            id,
            lat,
            lon,
            tags: StdHashMap::new(),
        }
    }

    fn way(id: i64, nodes: &[i64], oneway: bool) -> RawWay {
        let mut tags = StdHashMap::new();
        tags.insert("highway".to_string(), "residential".to_string());
        if oneway {
            tags.insert("oneway".to_string(), "yes".to_string());
        }
        RawWay {
            id,
            nodes: nodes.to_vec(),
            tags,
        }
    }

    fn options() -> BuildOptions {
        BuildOptions {
            network_type: NetworkType::Drive,
            weight_type: WeightType::Distance,
            largest_connected_component: false,
            precompute_states: false,
            config: None,
        }
    }

    /// Two intersections joined by a three-hop chain and a direct link,
    /// each with a spur:
    ///
    ///   6 - 1 - 2 - 3 - 4 - 5   (ways 13, 10, 12)
    ///       1 ----------4       (way 11, direct)
    fn chain_network() -> OsmData {
        OsmData {
            nodes: vec![
                node(1, 0.000, 0.000),
                node(2, 0.001, 0.000),
                node(3, 0.002, 0.000),
                node(4, 0.003, 0.000),
                node(5, 0.003, 0.001),
                node(6, 0.000, -0.001),
            ],
            ways: vec![
                way(10, &[1, 2, 3, 4], false),
                way(11, &[1, 4], false),
                way(12, &[4, 5], false),
                way(13, &[1, 6], false),
            ],
            relations: vec![],
        }
    }

    #[test]
    fn test_chain_contracts_to_single_edge() {
        let graph = build_graph(&chain_network(), &options()).unwrap();
        let simplified = graph.simplify();

        // 2 and 3 are interior; 1, 4, 5, 6 survive
        assert_eq!(simplified.graph.node_count(), 4);
        assert!(simplified.node_map.contains_key(&1));
        assert!(simplified.node_map.contains_key(&4));
        assert!(simplified.node_map.contains_key(&5));

        let i1 = graph.node_index(1).unwrap();
        let i4 = graph.node_index(4).unwrap();
        let chains = &simplified.edges[&(i1, i4)];
        // Parallel connections: the contracted chain and the direct way
        assert_eq!(chains.len(), 2);
        // The primary slot holds the cheaper of the two
        assert!(chains[0].weight <= chains[1].weight);

        let chain = chains.iter().find(|c| c.path.len() == 4).unwrap();
        assert_eq!(chain.ways, [10].into_iter().collect());
        let expected: f64 = graph.total_path_weight(&[1, 2, 3, 4], None).unwrap();
        assert!((chain.weight - expected).abs() < 1e-12);
    }

    #[test]
    fn test_simplified_weight_matches_original() {
        let graph = build_graph(&chain_network(), &options()).unwrap();
        let simplified = graph.simplify();

        let original = graph
            .shortest_path(
                crate::route::Algorithm::DijkstraVector,
                1,
                5,
                &Default::default(),
            )
            .unwrap();
        let original_weight = graph.total_path_weight(&original, None).unwrap();
        let simplified_weight = simplified.shortest_path_weight(1, 5).unwrap();

        let tolerance = 1e-9 * original.len() as f64;
        assert!((original_weight - simplified_weight).abs() <= tolerance);
    }

    #[test]
    fn test_oneway_change_is_endpoint() {
        // 1 -> 2 -> 3 one-way, then 3 - 4 two-way: 3 changes the one-way
        // property and must survive
        let data = OsmData {
            nodes: vec![
                node(1, 0.000, 0.000),
                node(2, 0.001, 0.000),
                node(3, 0.002, 0.000),
                node(4, 0.003, 0.000),
            ],
            ways: vec![way(20, &[1, 2, 3], true), way(21, &[3, 4], false)],
            relations: vec![],
        };
        let graph = build_graph(&data, &options()).unwrap();
        let simplified = graph.simplify();

        assert!(simplified.node_map.contains_key(&3));
        assert!(!simplified.node_map.contains_key(&2));
    }

    #[test]
    fn test_dead_end_survives() {
        let graph = build_graph(&chain_network(), &options()).unwrap();
        let simplified = graph.simplify();
        // 5 is a dead end
        assert!(simplified.node_map.contains_key(&5));
        let i4 = graph.node_index(4).unwrap();
        let i5 = graph.node_index(5).unwrap();
        assert!(simplified.edges.contains_key(&(i4, i5)));
        assert!(simplified.edges.contains_key(&(i5, i4)));
    }
}
