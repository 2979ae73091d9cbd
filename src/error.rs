//! Error types for osmgraph operations
//!
//! Parsing-layer defects (bad tags, malformed restrictions) are recovered
//! locally and logged; they only surface here when a caller asks for strict
//! handling. Structural violations discovered after construction are fatal.
//! "No path found" is never an error: routing returns `None`.

use std::fmt;

/// Main error type for graph construction and queries
#[derive(Debug)]
pub enum Error {
    /// A tag value could not be interpreted for a typed field
    BadTag {
        way: i64,
        key: &'static str,
        value: String,
    },

    /// A restriction relation failed validation and was dropped
    BadRestriction { relation: i64, reason: String },

    /// The input data violates a structural invariant (e.g. a way references
    /// a node that is not present in the extract)
    DataQuality(String),

    /// Unrecognized network type, weight type, algorithm or heuristic name
    UnknownOption { kind: &'static str, value: String },

    /// A cached Dijkstra state was requested for an origin that has none
    UndefinedCachedState(i64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadTag { way, key, value } => {
                write!(f, "Way {}: cannot interpret {}={:?}", way, key, value)
            }
            Error::BadRestriction { relation, reason } => {
                write!(f, "Restriction {}: {}", relation, reason)
            }
            Error::DataQuality(msg) => {
                write!(f, "Data quality: {}", msg)
            }
            Error::UnknownOption { kind, value } => {
                write!(f, "Unknown {} {:?}", kind, value)
            }
            Error::UndefinedCachedState(node) => {
                write!(f, "No cached Dijkstra state for origin node {}", node)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Convenience result type for osmgraph operations
pub type Result<T> = std::result::Result<T, Error>;
