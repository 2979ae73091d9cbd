//! Geographic primitives: positions, great-circle distance, Cartesian
//! conversion for the spatial indices.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A position in degrees, with optional altitude in kilometers.
///
/// Equality is field-exact, which makes `GeoLocation` usable as a
/// deduplication key via [GeoLocation::hash_key].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl GeoLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoLocation { lat, lon, alt: 0.0 }
    }

    pub fn with_alt(lat: f64, lon: f64, alt: f64) -> Self {
        GeoLocation { lat, lon, alt }
    }

    /// Bit-exact key for hashing; two locations collide iff all fields are
    /// bitwise identical.
    pub fn hash_key(&self) -> (u64, u64, u64) {
        (self.lat.to_bits(), self.lon.to_bits(), self.alt.to_bits())
    }

    /// Convert to 3-D Cartesian coordinates (kilometers) on a sphere of
    /// radius [EARTH_RADIUS_KM] plus altitude.
    pub fn to_cartesian(&self) -> [f64; 3] {
        let r = EARTH_RADIUS_KM + self.alt;
        let lat = self.lat.to_radians();
        let lon = self.lon.to_radians();
        [
            r * lat.cos() * lon.cos(),
            r * lat.cos() * lon.sin(),
            r * lat.sin(),
        ]
    }
}

/// Compute haversine distance between two points in kilometers
pub fn haversine_distance(lat1_deg: f64, lon1_deg: f64, lat2_deg: f64, lon2_deg: f64) -> f64 {
    let lat1 = lat1_deg.to_radians();
    let lat2 = lat2_deg.to_radians();
    let delta_lat = (lat2_deg - lat1_deg).to_radians();
    let delta_lon = (lon2_deg - lon1_deg).to_radians();

    let a =
        (delta_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two locations in kilometers
pub fn distance(a: &GeoLocation, b: &GeoLocation) -> f64 {
    haversine_distance(a.lat, a.lon, b.lat, b.lon)
}

/// Squared Euclidean distance between two Cartesian points
pub fn dist2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Closest point on the segment `a`-`b` to `p`, returned as the fractional
/// position along the segment in [0, 1] together with the squared distance.
pub fn point_segment_position(p: &[f64; 3], a: &[f64; 3], b: &[f64; 3]) -> (f64, f64) {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ap = [p[0] - a[0], p[1] - a[1], p[2] - a[2]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1] + ab[2] * ab[2];

    // Degenerate segment: both endpoints coincide
    if len2 == 0.0 {
        return (0.0, dist2(p, a));
    }

    let t = ((ap[0] * ab[0] + ap[1] * ab[1] + ap[2] * ab[2]) / len2).clamp(0.0, 1.0);
    let closest = [a[0] + t * ab[0], a[1] + t * ab[1], a[2] + t * ab[2]];
    (t, dist2(p, &closest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 344 km
        let d = haversine_distance(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 344.0).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_haversine_zero() {
        assert_eq!(haversine_distance(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_cartesian_radius() {
        let p = GeoLocation::new(-38.0, 145.0).to_cartesian();
        let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
        assert!((r - EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_cartesian_chord_close_to_arc() {
        // For short distances the chord and the great-circle arc agree
        let a = GeoLocation::new(-38.0751, 145.3326);
        let b = GeoLocation::new(-38.0752, 145.3326);
        let chord = dist2(&a.to_cartesian(), &b.to_cartesian()).sqrt();
        let arc = distance(&a, &b);
        assert!((chord - arc).abs() / arc < 1e-6);
    }

    #[test]
    fn test_point_segment_position() {
        let a = [0.0, 0.0, 0.0];
        let b = [10.0, 0.0, 0.0];

        let (t, d2) = point_segment_position(&[5.0, 3.0, 0.0], &a, &b);
        assert!((t - 0.5).abs() < 1e-12);
        assert!((d2 - 9.0).abs() < 1e-12);

        // Beyond the far endpoint the position clamps to 1
        let (t, d2) = point_segment_position(&[14.0, 0.0, 3.0], &a, &b);
        assert_eq!(t, 1.0);
        assert!((d2 - 25.0).abs() < 1e-12);

        // Degenerate segment
        let (t, d2) = point_segment_position(&[1.0, 0.0, 0.0], &a, &a);
        assert_eq!(t, 0.0);
        assert!((d2 - 1.0).abs() < 1e-12);
    }
}
