//! Turn restriction validation and indexing.
//!
//! OSM encodes restrictions as relations with `from`/`via`/`to` members.
//! Validation happens against the retained way set; anything malformed is
//! dropped with a log line rather than failing the build. Indexing converts
//! each surviving restriction into vertex-index sequences
//! `[to, via_k, .., via_1, from]` keyed by the via vertex nearest the `to`
//! end, the shape the routing cost adjustment matches against the parent
//! chain.

use log::{debug, warn};
use std::collections::HashMap;

use crate::error::Error;
use crate::graph::OsmGraph;
use crate::osm::{
    MemberKind, RawRelation, Restriction, RestrictionKind, RestrictionVia, Way,
};

/// Extract and validate restriction relations against the retained ways
pub fn parse_restrictions(
    relations: &[RawRelation],
    ways: &HashMap<i64, &Way>,
) -> Vec<Restriction> {
    let mut result = Vec::new();

    for relation in relations {
        if relation.tags.get("type").map(|s| s.as_str()) != Some("restriction") {
            continue;
        }
        let kind = match relation.tags.get("restriction").map(|s| s.as_str()) {
            Some(value) if value.starts_with("no_") => RestrictionKind::Exclusion,
            Some(value) if value.starts_with("only_") => RestrictionKind::Exclusive,
            _ => continue,
        };

        match validate(relation, kind, ways) {
            Ok(restriction) => result.push(restriction),
            Err(error) => warn!("dropping {}", error),
        }
    }

    result
}

fn validate(
    relation: &RawRelation,
    kind: RestrictionKind,
    ways: &HashMap<i64, &Way>,
) -> Result<Restriction, Error> {
    let bad = |reason: String| Error::BadRestriction {
        relation: relation.id,
        reason,
    };

    let mut from_ways = Vec::new();
    let mut to_ways = Vec::new();
    let mut via_nodes = Vec::new();
    let mut via_ways = Vec::new();

    for member in &relation.members {
        match (member.role.as_str(), member.kind) {
            ("from", MemberKind::Way) => from_ways.push(member.ref_id),
            ("to", MemberKind::Way) => to_ways.push(member.ref_id),
            ("via", MemberKind::Node) => via_nodes.push(member.ref_id),
            ("via", MemberKind::Way) => via_ways.push(member.ref_id),
            _ => {}
        }
    }

    let (&from_way, &to_way) = match (from_ways.as_slice(), to_ways.as_slice()) {
        ([from], [to]) => (from, to),
        _ => {
            return Err(bad(format!(
                "expected exactly one from and one to way, got {} and {}",
                from_ways.len(),
                to_ways.len()
            )))
        }
    };

    let via = match (via_nodes.as_slice(), via_ways.as_slice()) {
        ([node], []) => RestrictionVia::Node(*node),
        ([], [_, ..]) => RestrictionVia::Ways(via_ways.clone()),
        _ => {
            return Err(bad(format!(
                "expected one via node or at least one via way, got {} nodes and {} ways",
                via_nodes.len(),
                via_ways.len()
            )))
        }
    };

    // Every referenced way must be retained and distinct (this also drops
    // u-turn restrictions, whose from and to coincide)
    let mut referenced = vec![from_way, to_way];
    if let RestrictionVia::Ways(ref ws) = via {
        referenced.extend(ws.iter().copied());
    }
    for way_id in &referenced {
        if !ways.contains_key(way_id) {
            return Err(bad(format!("way {} is not part of the network", way_id)));
        }
    }
    let mut deduped = referenced.clone();
    deduped.sort_unstable();
    deduped.dedup();
    if deduped.len() != referenced.len() {
        return Err(bad("referenced ways are not distinct".to_string()));
    }

    match &via {
        RestrictionVia::Node(node) => {
            if !ways[&from_way].is_trailing(*node) || !ways[&to_way].is_trailing(*node) {
                return Err(bad(format!(
                    "via node {} is not a trailing node of both from and to ways",
                    node
                )));
            }
        }
        RestrictionVia::Ways(via_ids) => {
            if via_chain(via_ids, ways[&from_way], ways[&to_way], ways).is_none() {
                return Err(bad(
                    "via ways do not form a chain between the from and to ways".to_string(),
                ));
            }
        }
    }

    Ok(Restriction {
        id: relation.id,
        from_way,
        to_way,
        via,
        kind,
        tags: relation.tags.clone(),
    })
}

/// Join the via ways into a single node chain whose first node is trailing
/// on the from way and whose last node is trailing on the to way.
fn via_chain(
    via_ids: &[i64],
    from_way: &Way,
    to_way: &Way,
    ways: &HashMap<i64, &Way>,
) -> Option<Vec<i64>> {
    // Candidate chain starts: any via way with a trailing node shared with
    // the from way, in either orientation.
    for (start_pos, &start_id) in via_ids.iter().enumerate() {
        let start = ways.get(&start_id)?;
        for reversed in [false, true] {
            let mut chain = oriented_nodes(start, reversed);
            if !from_way.is_trailing(chain[0]) {
                continue;
            }

            let mut remaining: Vec<i64> = via_ids
                .iter()
                .enumerate()
                .filter(|(pos, _)| *pos != start_pos)
                .map(|(_, id)| *id)
                .collect();

            let mut stuck = false;
            while !remaining.is_empty() && !stuck {
                stuck = true;
                for pos in 0..remaining.len() {
                    let way = ways[&remaining[pos]];
                    let (first, last) = way.trailing_nodes();
                    let tail = *chain.last().unwrap();
                    let segment = if first == tail {
                        Some(oriented_nodes(way, false))
                    } else if last == tail {
                        Some(oriented_nodes(way, true))
                    } else {
                        None
                    };
                    if let Some(segment) = segment {
                        chain.extend_from_slice(&segment[1..]);
                        remaining.remove(pos);
                        stuck = false;
                        break;
                    }
                }
            }

            if remaining.is_empty() && to_way.is_trailing(*chain.last().unwrap()) {
                return Some(chain);
            }
        }
    }

    None
}

fn oriented_nodes(way: &Way, reversed: bool) -> Vec<i64> {
    if reversed {
        way.nodes.iter().rev().copied().collect()
    } else {
        way.nodes.clone()
    }
}

/// Build the via-vertex-indexed restriction sequences for a constructed
/// graph. Sequences whose required edges are not present (e.g. a one-way
/// via way opposing the restricted direction) are vacuous and skipped.
pub fn index_restrictions(graph: &OsmGraph) -> HashMap<u32, Vec<Vec<u32>>> {
    let mut indexed: HashMap<u32, Vec<Vec<u32>>> = HashMap::new();

    for restriction in graph.restrictions.values() {
        let sequences = match (&restriction.via, restriction.kind) {
            (RestrictionVia::Node(via), RestrictionKind::Exclusion) => via_node_sequences(
                graph,
                restriction.from_way,
                restriction.to_way,
                *via,
            ),
            (RestrictionVia::Node(via), RestrictionKind::Exclusive) => {
                exclusive_sequences(graph, restriction, *via)
            }
            (RestrictionVia::Ways(via_ids), RestrictionKind::Exclusion) => {
                via_way_sequences(graph, restriction, via_ids)
            }
            (RestrictionVia::Ways(_), RestrictionKind::Exclusive) => {
                debug!(
                    "restriction {}: only_* via way chains are not indexed",
                    restriction.id
                );
                vec![]
            }
        };

        for sequence in sequences {
            indexed.entry(sequence[1]).or_default().push(sequence);
        }
    }

    indexed
}

/// `[to, via, from]` sequences for a via-node restriction between two ways
fn via_node_sequences(graph: &OsmGraph, from_way: i64, to_way: i64, via: i64) -> Vec<Vec<u32>> {
    let via_idx = match graph.node_index(via) {
        Some(idx) => idx,
        None => return vec![],
    };
    let from = match graph.ways.get(&from_way) {
        Some(way) => way,
        None => return vec![],
    };
    let to = match graph.ways.get(&to_way) {
        Some(way) => way,
        None => return vec![],
    };

    let mut sequences = Vec::new();
    for from_adj in incoming_adjacent(graph, from, via_idx) {
        for to_adj in outgoing_adjacent(graph, to, via_idx) {
            sequences.push(vec![to_adj, via_idx, from_adj]);
        }
    }
    sequences
}

/// Expand an `only_*` restriction into exclusions of every other transition
/// at the via node
fn exclusive_sequences(graph: &OsmGraph, restriction: &Restriction, via: i64) -> Vec<Vec<u32>> {
    let incident = match graph.node_to_way.get(&via) {
        Some(set) => set,
        None => return vec![],
    };

    let mut sequences = Vec::new();
    for &way_id in incident {
        if way_id == restriction.from_way || way_id == restriction.to_way {
            continue;
        }
        sequences.extend(via_node_sequences(
            graph,
            restriction.from_way,
            way_id,
            via,
        ));
    }
    sequences
}

/// `[to, via_k, .., via_1, from]` sequences for a via-way restriction
fn via_way_sequences(graph: &OsmGraph, restriction: &Restriction, via_ids: &[i64]) -> Vec<Vec<u32>> {
    let way_refs: HashMap<i64, &Way> = graph.ways.iter().map(|(id, w)| (*id, w)).collect();
    let from = match way_refs.get(&restriction.from_way) {
        Some(way) => *way,
        None => return vec![],
    };
    let to = match way_refs.get(&restriction.to_way) {
        Some(way) => *way,
        None => return vec![],
    };
    let chain = match via_chain(via_ids, from, to, &way_refs) {
        Some(chain) => chain,
        None => return vec![],
    };

    let chain_idx: Vec<u32> = match chain.iter().map(|n| graph.node_index(*n)).collect() {
        Some(idx) => idx,
        None => return vec![],
    };

    // The restricted movement traverses the chain head to tail; every hop
    // must exist as a directed edge or the restriction cannot fire.
    for pair in chain_idx.windows(2) {
        if graph.weight(pair[0], pair[1]).is_none() {
            debug!(
                "restriction {}: via chain not traversable, skipping",
                restriction.id
            );
            return vec![];
        }
    }

    let head = chain_idx[0];
    let tail = *chain_idx.last().unwrap();

    let mut sequences = Vec::new();
    for from_adj in incoming_adjacent(graph, from, head) {
        for to_adj in outgoing_adjacent(graph, to, tail) {
            let mut sequence = Vec::with_capacity(chain_idx.len() + 2);
            sequence.push(to_adj);
            sequence.extend(chain_idx.iter().rev());
            sequence.push(from_adj);
            sequences.push(sequence);
        }
    }
    sequences
}

/// Neighbors of `via` along a way from which `via` can be reached, i.e.
/// positional neighbors `p` with a directed edge `p -> via`.
fn incoming_adjacent(graph: &OsmGraph, way: &Way, via: u32) -> Vec<u32> {
    positional_neighbors(graph, way, via)
        .into_iter()
        .filter(|&p| graph.weight(p, via).is_some())
        .collect()
}

/// Neighbors of `via` along a way reachable from `via`, i.e. positional
/// neighbors `s` with a directed edge `via -> s`. An interior position on a
/// two-way way yields both neighbors.
fn outgoing_adjacent(graph: &OsmGraph, way: &Way, via: u32) -> Vec<u32> {
    positional_neighbors(graph, way, via)
        .into_iter()
        .filter(|&s| graph.weight(via, s).is_some())
        .collect()
}

fn positional_neighbors(graph: &OsmGraph, way: &Way, via: u32) -> Vec<u32> {
    let via_id = match graph.node_id(via) {
        Some(id) => id,
        None => return vec![],
    };

    let mut neighbors = Vec::new();
    for (pos, &node) in way.nodes.iter().enumerate() {
        if node != via_id {
            continue;
        }
        if pos > 0 {
            neighbors.push(way.nodes[pos - 1]);
        }
        if pos + 1 < way.nodes.len() {
            neighbors.push(way.nodes[pos + 1]);
        }
    }
    neighbors.sort_unstable();
    neighbors.dedup();

    neighbors
        .into_iter()
        .filter_map(|id| graph.node_index(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::RawMember;
    use std::collections::HashMap;

    fn way(id: i64, nodes: &[i64]) -> Way {
        Way {
            id,
            nodes: nodes.to_vec(),
            class: "residential".into(),
            maxspeed: 50,
            lanes: 1,
            oneway: false,
            reverseway: false,
            rail: None,
            tags: HashMap::new(),
        }
    }

    fn member(role: &str, kind: MemberKind, ref_id: i64) -> RawMember {
        RawMember {
            kind,
            ref_id,
            role: role.to_string(),
        }
    }

    fn restriction_relation(id: i64, kind: &str, members: Vec<RawMember>) -> RawRelation {
        let mut tags = HashMap::new();
        tags.insert("type".to_string(), "restriction".to_string());
        tags.insert("restriction".to_string(), kind.to_string());
        RawRelation { id, members, tags }
    }

    #[test]
    fn test_parse_valid_via_node() {
        let w1 = way(1, &[10, 11]);
        let w2 = way(2, &[11, 12]);
        let ways: HashMap<i64, &Way> = [(1, &w1), (2, &w2)].into_iter().collect();

        let relation = restriction_relation(
            100,
            "no_left_turn",
            vec![
                member("from", MemberKind::Way, 1),
                member("via", MemberKind::Node, 11),
                member("to", MemberKind::Way, 2),
            ],
        );
        let parsed = parse_restrictions(&[relation], &ways);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].from_way, 1);
        assert_eq!(parsed[0].to_way, 2);
        assert_eq!(parsed[0].via, RestrictionVia::Node(11));
        assert_eq!(parsed[0].kind, RestrictionKind::Exclusion);
    }

    #[test]
    fn test_parse_rejects_interior_via_node() {
        let w1 = way(1, &[10, 11, 13]);
        let w2 = way(2, &[11, 12]);
        let ways: HashMap<i64, &Way> = [(1, &w1), (2, &w2)].into_iter().collect();

        let relation = restriction_relation(
            100,
            "no_left_turn",
            vec![
                member("from", MemberKind::Way, 1),
                member("via", MemberKind::Node, 11),
                member("to", MemberKind::Way, 2),
            ],
        );
        assert!(parse_restrictions(&[relation], &ways).is_empty());
    }

    #[test]
    fn test_parse_rejects_duplicate_ways() {
        let w1 = way(1, &[10, 11]);
        let ways: HashMap<i64, &Way> = [(1, &w1)].into_iter().collect();

        // U-turn style: from and to are the same way
        let relation = restriction_relation(
            100,
            "no_u_turn",
            vec![
                member("from", MemberKind::Way, 1),
                member("via", MemberKind::Node, 11),
                member("to", MemberKind::Way, 1),
            ],
        );
        assert!(parse_restrictions(&[relation], &ways).is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_members() {
        let w1 = way(1, &[10, 11]);
        let w2 = way(2, &[11, 12]);
        let ways: HashMap<i64, &Way> = [(1, &w1), (2, &w2)].into_iter().collect();

        let relation = restriction_relation(
            100,
            "no_right_turn",
            vec![
                member("from", MemberKind::Way, 1),
                member("to", MemberKind::Way, 2),
            ],
        );
        assert!(parse_restrictions(&[relation], &ways).is_empty());

        let relation = restriction_relation(
            101,
            "no_right_turn",
            vec![
                member("from", MemberKind::Way, 1),
                member("via", MemberKind::Node, 11),
                member("via", MemberKind::Way, 2),
                member("to", MemberKind::Way, 2),
            ],
        );
        assert!(parse_restrictions(&[relation], &ways).is_empty());
    }

    #[test]
    fn test_parse_ignores_unhandled_kinds() {
        let w1 = way(1, &[10, 11]);
        let w2 = way(2, &[11, 12]);
        let ways: HashMap<i64, &Way> = [(1, &w1), (2, &w2)].into_iter().collect();

        let relation = restriction_relation(
            100,
            "give_way",
            vec![
                member("from", MemberKind::Way, 1),
                member("via", MemberKind::Node, 11),
                member("to", MemberKind::Way, 2),
            ],
        );
        assert!(parse_restrictions(&[relation], &ways).is_empty());
    }

    #[test]
    fn test_via_chain_single_way() {
        let from = way(1, &[10, 11]);
        let via = way(2, &[11, 12, 13]);
        let to = way(3, &[13, 14]);
        let ways: HashMap<i64, &Way> =
            [(1, &from), (2, &via), (3, &to)].into_iter().collect();

        let chain = via_chain(&[2], &from, &to, &ways).unwrap();
        assert_eq!(chain, vec![11, 12, 13]);
    }

    #[test]
    fn test_via_chain_reversed_and_joined() {
        let from = way(1, &[10, 11]);
        // Stored backwards relative to the travel direction
        let via_a = way(2, &[12, 11]);
        let via_b = way(3, &[12, 13]);
        let to = way(4, &[13, 14]);
        let ways: HashMap<i64, &Way> = [(1, &from), (2, &via_a), (3, &via_b), (4, &to)]
            .into_iter()
            .collect();

        let chain = via_chain(&[2, 3], &from, &to, &ways).unwrap();
        assert_eq!(chain, vec![11, 12, 13]);

        // A chain that never reaches the to way is rejected
        let unrelated = way(5, &[20, 21]);
        assert!(via_chain(&[2], &from, &unrelated, &ways).is_none());
    }
}
