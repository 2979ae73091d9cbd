//! Tag normalization: turns the raw string tag soup of a way into the typed
//! fields routing depends on.
//!
//! OSM values are dirty. Maxspeed shows up as `"50"`, `"50 mph"`,
//! `"60;80"`, `"40-60"` or with conditional clauses appended; lanes as
//! `"2"` or `"2;3"`. Every numeric field goes through the same treatment:
//! strip conditionals, split on delimiters, average the numeric fragments.

use log::debug;
use std::collections::HashMap;

use crate::config::Config;
use crate::osm::{RailInfo, RawWay, Way};

/// Delimiters separating multiple values inside one tag
const DELIMITERS: &[char] = &['+', '^', ':', ';', ',', '|', '-'];

/// Kilometers per mile, for `mph` speed values
const KM_PER_MILE: f64 = 1.60934;

/// Extract the numeric values of a composite tag value. Fragments without
/// any digit are skipped; a `mph` fragment is converted to km/h.
fn numeric_fragments(value: &str) -> Vec<f64> {
    // Conditional clauses ("60 conditional @ ...") only qualify the base
    // value; everything from the marker on is dropped.
    let value = match value.find("conditional") {
        Some(pos) => &value[..pos],
        None => value,
    };

    value
        .split(DELIMITERS)
        .filter_map(|fragment| {
            let number = numeric_prefix(fragment)?;
            if fragment.contains("mph") {
                Some(number * KM_PER_MILE)
            } else {
                Some(number)
            }
        })
        .collect()
}

/// Leading numeric portion of a fragment, if it has one
fn numeric_prefix(fragment: &str) -> Option<f64> {
    let trimmed = fragment.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || *c == '.')
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    trimmed[..end].parse().ok()
}

/// Arithmetic mean of the fragments, rounded to an integer
fn mean_of_fragments(value: &str) -> Option<u32> {
    let fragments = numeric_fragments(value);
    if fragments.is_empty() {
        return None;
    }
    let mean = fragments.iter().sum::<f64>() / fragments.len() as f64;
    Some(mean.round() as u32)
}

/// Parsed maxspeed in km/h, falling back to the class default
pub fn parse_maxspeed(raw: Option<&str>, class: &str, config: &Config, way_id: i64) -> u32 {
    match raw {
        None => config.default_maxspeed(class),
        Some(value) => match mean_of_fragments(value) {
            Some(speed) if speed > 0 => speed,
            _ => {
                debug!(
                    "way {}: maxspeed {:?} has no usable value, using {} default",
                    way_id, value, class
                );
                config.default_maxspeed(class)
            }
        },
    }
}

/// Parsed lane count, at least 1, falling back to the class default
pub fn parse_lanes(raw: Option<&str>, class: &str, config: &Config, way_id: i64) -> u32 {
    match raw {
        None => config.default_lanes(class),
        Some(value) => match mean_of_fragments(value) {
            Some(lanes) => lanes.max(1),
            None => {
                debug!(
                    "way {}: lanes {:?} has no usable value, using {} default",
                    way_id, value, class
                );
                config.default_lanes(class)
            }
        },
    }
}

/// One-way and reverse-way flags from the raw tags.
///
/// Roundabouts are one-way regardless of their `oneway` tag; a `-1` value
/// marks a way stored against its travel direction.
pub fn parse_oneway(tags: &HashMap<String, String>, class: &str, config: &Config) -> (bool, bool) {
    let raw = tags.get("oneway").map(|s| s.as_str());
    let reverseway = raw == Some("-1");

    if tags.get("junction").map(|s| s.as_str()) == Some("roundabout") {
        return (true, reverseway);
    }

    let oneway = match raw {
        Some("yes") | Some("true") | Some("1") | Some("-1") => true,
        Some("no") | Some("false") | Some("0") => false,
        _ => config.default_oneway(class),
    };

    (oneway, reverseway)
}

fn rail_info(tags: &HashMap<String, String>) -> RailInfo {
    let field = |key: &str| {
        tags.get(key)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    };
    RailInfo {
        rail_type: field("railway"),
        electrified: field("electrified"),
        gauge: tags.get("gauge").cloned(),
        usage: field("usage"),
        name: field("name"),
    }
}

/// Normalize a retained raw way into its typed form. `class_key` is
/// `"highway"` for road networks and `"railway"` for rail.
pub fn normalize_way(raw: &RawWay, class_key: &str, config: &Config) -> Way {
    let class = raw
        .tags
        .get(class_key)
        .cloned()
        .unwrap_or_else(|| "other".to_string());

    let maxspeed = parse_maxspeed(
        raw.tags.get("maxspeed").map(|s| s.as_str()),
        &class,
        config,
        raw.id,
    );
    let lanes = parse_lanes(
        raw.tags.get("lanes").map(|s| s.as_str()),
        &class,
        config,
        raw.id,
    );
    let (oneway, reverseway) = parse_oneway(&raw.tags, &class, config);

    let rail = if class_key == "railway" {
        Some(rail_info(&raw.tags))
    } else {
        None
    };

    Way {
        id: raw.id,
        nodes: raw.nodes.clone(),
        class,
        maxspeed,
        lanes,
        oneway,
        reverseway,
        rail,
        tags: raw.tags.clone(),
    }
}
