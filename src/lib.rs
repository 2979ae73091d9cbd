//! osmgraph: in-memory OpenStreetMap road and rail networks
//!
//! Pipeline:
//! - Tag normalization - typed maxspeed / lanes / oneway from raw OSM tags
//! - Graph assembly - directed, edge-weighted adjacency from way polylines
//! - Turn restrictions - via-node and via-way relations indexed for routing
//! - Connectivity trim - reduce to the largest weakly connected component
//! - Spatial indices - k-d tree over nodes, R-tree over way bounding boxes
//! - Routing - Dijkstra and A* with early exit and restriction enforcement
//! - Simplification - contract degree-two chains into weighted edges
//!
//! Key principle: one dense vertex index space ties everything together.
//! Weights, restriction sequences, spatial payloads and cached search
//! states all speak vertex indices; the id<->index bijection is rebuilt on
//! every mutation so it never drifts.
//!
//! ```no_run
//! use osmgraph::{build_graph, BuildOptions, Algorithm, RouteOptions};
//!
//! # fn main() -> osmgraph::Result<()> {
//! # let raw_osm = osmgraph::OsmData::default();
//! let graph = build_graph(&raw_osm, &BuildOptions::default())?;
//! let path = graph.shortest_path(
//!     Algorithm::DijkstraVector,
//!     174183,
//!     174212,
//!     &RouteOptions::default(),
//! );
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod graph;
pub mod osm;
pub mod restrictions;
pub mod route;
pub mod simplify;
pub mod spatial;
pub mod tags;

pub use config::{Config, ExclusionRule, NetworkType, WeightType};
pub use error::{Error, Result};
pub use geo::{haversine_distance, GeoLocation};
pub use graph::{build_graph, BuildOptions, EdgePoint, OsmGraph};
pub use osm::{
    MemberKind, Node, OsmData, RawMember, RawNode, RawRelation, RawWay, Restriction,
    RestrictionKind, RestrictionVia, Way,
};
pub use route::{Algorithm, CostAdjustment, DijkstraState, Heuristic, RouteOptions};
pub use simplify::{SimplifiedEdge, SimplifiedGraph};
