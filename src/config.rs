//! Build-time configuration: default speed/lane tables and the per-network
//! exclusion filters applied to raw ways.
//!
//! A [Config] is passed explicitly into the graph builder. Callers that
//! prefer the implicit style can mutate the process-wide default with
//! [Config::set_global]; a build snapshots whatever the global holds at the
//! time it starts.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::RwLock;

use crate::error::Error;

/// Which subset of the road/rail network a build keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    Drive,
    DriveService,
    Walk,
    Bike,
    All,
    AllPrivate,
    None,
    Rail,
    DriveMainroads,
}

impl NetworkType {
    /// Rail networks select on the `railway` tag instead of `highway`
    pub fn is_rail(&self) -> bool {
        matches!(self, NetworkType::Rail)
    }

    pub fn name(&self) -> &'static str {
        match self {
            NetworkType::Drive => "drive",
            NetworkType::DriveService => "drive_service",
            NetworkType::Walk => "walk",
            NetworkType::Bike => "bike",
            NetworkType::All => "all",
            NetworkType::AllPrivate => "all_private",
            NetworkType::None => "none",
            NetworkType::Rail => "rail",
            NetworkType::DriveMainroads => "drive_mainroads",
        }
    }
}

impl FromStr for NetworkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "drive" => Ok(NetworkType::Drive),
            "drive_service" => Ok(NetworkType::DriveService),
            "walk" => Ok(NetworkType::Walk),
            "bike" => Ok(NetworkType::Bike),
            "all" => Ok(NetworkType::All),
            "all_private" => Ok(NetworkType::AllPrivate),
            "none" => Ok(NetworkType::None),
            "rail" => Ok(NetworkType::Rail),
            "drive_mainroads" => Ok(NetworkType::DriveMainroads),
            _ => Err(Error::UnknownOption {
                kind: "network type",
                value: s.to_string(),
            }),
        }
    }
}

/// What quantity edge weights carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightType {
    /// Great-circle length in kilometers
    Distance,
    /// Travel time in hours at the way's maxspeed
    Time,
    /// Travel time scaled by lane efficiency
    LaneEfficiency,
}

impl FromStr for WeightType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "distance" => Ok(WeightType::Distance),
            "time" => Ok(WeightType::Time),
            "lane_efficiency" => Ok(WeightType::LaneEfficiency),
            _ => Err(Error::UnknownOption {
                kind: "weight type",
                value: s.to_string(),
            }),
        }
    }
}

/// One exclusion rule: a way is rejected when its value for `key` is in
/// `values`. A network filter is a list of such rules; a way survives only
/// if no rule matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub key: String,
    pub values: HashSet<String>,
}

impl ExclusionRule {
    fn new(key: &str, values: &[&str]) -> Self {
        ExclusionRule {
            key: key.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn matches(&self, tags: &HashMap<String, String>) -> bool {
        tags.get(&self.key)
            .map(|v| self.values.contains(v))
            .unwrap_or(false)
    }
}

/// Tunable defaults consumed by tag normalization and weight computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default maxspeed (km/h) per highway class; must contain "other"
    pub maxspeeds: HashMap<String, u32>,
    /// Default lane count per highway class; must contain "other"
    pub lanes: HashMap<String, u32>,
    /// Throughput efficiency per lane count, in (0, 1]; unlisted counts are 1.0
    pub lane_efficiency: HashMap<u32, f64>,
    /// Default one-way flag per highway class
    pub oneway_defaults: HashMap<String, bool>,
    /// Meters per building level (consumed by the buildings extractor, not here)
    pub building_height_per_level: f64,
    /// Cap on inferred building levels (same)
    pub max_building_levels: u32,
    /// Per-network exclusion filters
    pub exclusion_filters: HashMap<NetworkType, Vec<ExclusionRule>>,
}

impl Default for Config {
    fn default() -> Self {
        let maxspeeds = [
            ("motorway", 100),
            ("trunk", 100),
            ("primary", 100),
            ("secondary", 100),
            ("tertiary", 50),
            ("unclassified", 50),
            ("residential", 50),
            ("other", 50),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let lanes = [
            ("motorway", 3),
            ("trunk", 3),
            ("primary", 2),
            ("secondary", 2),
            ("tertiary", 1),
            ("unclassified", 1),
            ("residential", 1),
            ("other", 1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let lane_efficiency = [(1, 0.7), (2, 0.8), (3, 0.9), (4, 1.0)].into_iter().collect();

        let oneway_defaults = [
            ("motorway", true),
            ("motorway_link", true),
            ("other", false),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Config {
            maxspeeds,
            lanes,
            lane_efficiency,
            oneway_defaults,
            building_height_per_level: 3.0,
            max_building_levels: 100,
            exclusion_filters: default_exclusion_filters(),
        }
    }
}

impl Config {
    /// Snapshot of the process-wide configuration
    pub fn global() -> Config {
        GLOBAL.read().expect("config lock poisoned").clone()
    }

    /// Replace the process-wide configuration. Builds already running keep
    /// the snapshot they captured.
    pub fn set_global(config: Config) {
        *GLOBAL.write().expect("config lock poisoned") = config;
    }

    /// Default maxspeed for a highway/railway class, falling back to "other"
    pub fn default_maxspeed(&self, class: &str) -> u32 {
        self.maxspeeds
            .get(class)
            .or_else(|| self.maxspeeds.get("other"))
            .copied()
            .unwrap_or(50)
    }

    /// Default lane count for a highway/railway class, falling back to "other"
    pub fn default_lanes(&self, class: &str) -> u32 {
        self.lanes
            .get(class)
            .or_else(|| self.lanes.get("other"))
            .copied()
            .unwrap_or(1)
    }

    /// Default one-way flag for a highway class
    pub fn default_oneway(&self, class: &str) -> bool {
        self.oneway_defaults
            .get(class)
            .or_else(|| self.oneway_defaults.get("other"))
            .copied()
            .unwrap_or(false)
    }

    /// Lane efficiency factor in (0, 1]; 1.0 for unlisted counts
    pub fn efficiency(&self, lanes: u32) -> f64 {
        self.lane_efficiency.get(&lanes).copied().unwrap_or(1.0)
    }

    /// Exclusion rules for a network type (empty when unconfigured)
    pub fn filters(&self, network: NetworkType) -> &[ExclusionRule] {
        self.exclusion_filters
            .get(&network)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

static GLOBAL: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

const NON_ROAD_HIGHWAYS: &[&str] = &[
    "abandoned",
    "construction",
    "planned",
    "platform",
    "proposed",
    "raceway",
];

fn default_exclusion_filters() -> HashMap<NetworkType, Vec<ExclusionRule>> {
    let mut filters = HashMap::new();

    let drive_highways: Vec<&str> = NON_ROAD_HIGHWAYS
        .iter()
        .chain(
            [
                "bridleway",
                "bus_guideway",
                "busway",
                "corridor",
                "cycleway",
                "elevator",
                "escalator",
                "footway",
                "path",
                "pedestrian",
                "steps",
                "track",
            ]
            .iter(),
        )
        .copied()
        .collect();

    let drive_base = vec![
        ExclusionRule::new("area", &["yes"]),
        ExclusionRule::new("highway", &drive_highways),
        ExclusionRule::new("motor_vehicle", &["no"]),
        ExclusionRule::new("motorcar", &["no"]),
        ExclusionRule::new("access", &["no", "private"]),
    ];

    let mut drive = drive_base.clone();
    drive.push(ExclusionRule::new(
        "service",
        &["alley", "driveway", "emergency_access", "parking", "parking_aisle", "private"],
    ));
    filters.insert(NetworkType::Drive, drive);

    let mut drive_service = drive_base.clone();
    drive_service.push(ExclusionRule::new(
        "service",
        &["emergency_access", "private"],
    ));
    filters.insert(NetworkType::DriveService, drive_service);

    let mut drive_mainroads = drive_base;
    drive_mainroads.push(ExclusionRule::new(
        "highway",
        &[
            "living_street",
            "residential",
            "road",
            "service",
            "unclassified",
        ],
    ));
    filters.insert(NetworkType::DriveMainroads, drive_mainroads);

    let walk_highways: Vec<&str> = NON_ROAD_HIGHWAYS
        .iter()
        .chain(["bus_guideway", "busway", "motorway", "motorway_link"].iter())
        .copied()
        .collect();
    filters.insert(
        NetworkType::Walk,
        vec![
            ExclusionRule::new("area", &["yes"]),
            ExclusionRule::new("highway", &walk_highways),
            ExclusionRule::new("foot", &["no"]),
            ExclusionRule::new("access", &["no", "private"]),
            ExclusionRule::new("service", &["private"]),
        ],
    );

    let bike_highways: Vec<&str> = NON_ROAD_HIGHWAYS
        .iter()
        .chain(
            [
                "bus_guideway",
                "busway",
                "corridor",
                "elevator",
                "escalator",
                "footway",
                "motorway",
                "motorway_link",
                "steps",
            ]
            .iter(),
        )
        .copied()
        .collect();
    filters.insert(
        NetworkType::Bike,
        vec![
            ExclusionRule::new("area", &["yes"]),
            ExclusionRule::new("highway", &bike_highways),
            ExclusionRule::new("bicycle", &["no"]),
            ExclusionRule::new("access", &["no", "private"]),
            ExclusionRule::new("service", &["private"]),
        ],
    );

    filters.insert(
        NetworkType::All,
        vec![
            ExclusionRule::new("area", &["yes"]),
            ExclusionRule::new("highway", NON_ROAD_HIGHWAYS),
            ExclusionRule::new("access", &["no", "private"]),
            ExclusionRule::new("service", &["private"]),
        ],
    );

    filters.insert(
        NetworkType::AllPrivate,
        vec![
            ExclusionRule::new("area", &["yes"]),
            ExclusionRule::new("highway", NON_ROAD_HIGHWAYS),
        ],
    );

    filters.insert(NetworkType::None, vec![]);

    filters.insert(
        NetworkType::Rail,
        vec![
            ExclusionRule::new("area", &["yes"]),
            ExclusionRule::new(
                "railway",
                &[
                    "abandoned",
                    "construction",
                    "disused",
                    "platform",
                    "proposed",
                    "razed",
                ],
            ),
        ],
    );

    filters
}
