//! OSM data model: the raw attribute tree handed over by the deserialization
//! collaborator, and the typed node / way / restriction entities the graph is
//! assembled from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::geo::GeoLocation;

/// Member kind inside a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// One `{type, ref, role}` member of a raw relation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMember {
    pub kind: MemberKind,
    pub ref_id: i64,
    pub role: String,
}

/// A node entry as delivered by the downloader/deserializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A way entry as delivered by the downloader/deserializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// A relation entry as delivered by the downloader/deserializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelation {
    pub id: i64,
    pub members: Vec<RawMember>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// The logical mapping with three keyed lists that this core consumes.
/// Both on-the-wire flavors (XML-ish and JSON-ish) are normalized into this
/// shape before reaching the graph builder; list order is preserved and
/// defines the canonical vertex order of retained nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsmData {
    pub nodes: Vec<RawNode>,
    pub ways: Vec<RawWay>,
    pub relations: Vec<RawRelation>,
}

/// A graph node: id, position, residual tags
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub location: GeoLocation,
    pub tags: HashMap<String, String>,
}

/// Rail-specific attributes, filled during tag normalization.
/// Missing values default to the literal `"unknown"`, except `gauge` which
/// stays absent.
#[derive(Debug, Clone, PartialEq)]
pub struct RailInfo {
    pub rail_type: String,
    pub electrified: String,
    pub gauge: Option<String>,
    pub usage: String,
    pub name: String,
}

/// A way: an ordered polyline of node ids sharing one tag set.
///
/// The fields routing depends on (`maxspeed`, `lanes`, `oneway`,
/// `reverseway`, `class`) are typed on the struct; everything else stays in
/// the untyped `tags` map.
#[derive(Debug, Clone)]
pub struct Way {
    pub id: i64,
    pub nodes: Vec<i64>,
    /// The `highway` (or `railway`) classification value
    pub class: String,
    /// Speed limit in km/h
    pub maxspeed: u32,
    /// Lane count, at least 1
    pub lanes: u32,
    /// Traversable only in stored node order
    pub oneway: bool,
    /// Stored node order is against the travel direction
    pub reverseway: bool,
    pub rail: Option<RailInfo>,
    pub tags: HashMap<String, String>,
}

impl Way {
    /// First and last node id
    pub fn trailing_nodes(&self) -> (i64, i64) {
        (*self.nodes.first().unwrap(), *self.nodes.last().unwrap())
    }

    /// Whether `node` is the first or last node of this way
    pub fn is_trailing(&self, node: i64) -> bool {
        let (first, last) = self.trailing_nodes();
        node == first || node == last
    }
}

/// Whether a turn restriction forbids or mandates its transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    /// `no_*`: the from→to transition is forbidden
    Exclusion,
    /// `only_*`: the from→to transition is the only one permitted
    Exclusive,
}

/// The center of a turn restriction: a single node, or a chain of ways
#[derive(Debug, Clone, PartialEq)]
pub enum RestrictionVia {
    Node(i64),
    Ways(Vec<i64>),
}

/// A validated turn restriction relation
#[derive(Debug, Clone)]
pub struct Restriction {
    pub id: i64,
    pub from_way: i64,
    pub to_way: i64,
    pub via: RestrictionVia,
    pub kind: RestrictionKind,
    pub tags: HashMap<String, String>,
}

impl Restriction {
    /// True for `no_*` restrictions
    pub fn is_exclusion(&self) -> bool {
        self.kind == RestrictionKind::Exclusion
    }

    /// True for `only_*` restrictions
    pub fn is_exclusive(&self) -> bool {
        self.kind == RestrictionKind::Exclusive
    }
}
