//! Geo Queries
//! Mission: Great-circle distances and the two-stage nearest-station lookup

use crate::stations::models::{GeoPoint, NearbyStation};
use crate::stations::store::StationStore;
use anyhow::Result;
use tracing::debug;

/// Sphere radius used for all distance math, in meters
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// First-stage search radius in meters
pub const NEAR_RADIUS_M: f64 = 1_000.0;
/// How many stations the first stage returns at most
pub const NEAR_LIMIT: usize = 2;
/// Distances below this are rendered in meters, otherwise kilometers
pub const METERS_DISPLAY_THRESHOLD: f64 = 500.0;

/// Haversine distance between two points, in meters
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = lat2 - lat1;
    let dlng = (b.longitude() - a.longitude()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Lat/lng rectangle enclosing a circle; `lng_range` is `None` when the
/// circle touches a pole or wraps the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub lng_range: Option<(f64, f64)>,
}

pub fn bounding_box(center: &GeoPoint, radius_m: f64) -> BoundingBox {
    let lat = center.latitude();
    let lng = center.longitude();
    let angular = radius_m / EARTH_RADIUS_M;
    let dlat = angular.to_degrees();

    let min_lat = (lat - dlat).max(-90.0);
    let max_lat = (lat + dlat).min(90.0);

    let lng_range = if min_lat <= -90.0 || max_lat >= 90.0 {
        None
    } else {
        // Half-width at the circle's tangent meridians, not along the center's parallel
        let ratio = angular.sin() / lat.to_radians().cos();
        if ratio >= 1.0 {
            None
        } else {
            let dlng = ratio.asin().to_degrees();
            let (lo, hi) = (lng - dlng, lng + dlng);
            (lo >= -180.0 && hi <= 180.0).then_some((lo, hi))
        }
    };

    BoundingBox {
        min_lat,
        max_lat,
        lng_range,
    }
}

/// `"N m"` under 500 m, `"N.NN km"` from there on
pub fn format_distance(meters: f64) -> String {
    if meters < METERS_DISPLAY_THRESHOLD {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// Up to two active stations within 1 km; if fewer than two are found,
/// the single closest active station regardless of distance.
pub fn find_nearest(store: &StationStore, center: &GeoPoint) -> Result<Vec<NearbyStation>> {
    let mut hits = store.nearest_active(center, Some(NEAR_RADIUS_M), NEAR_LIMIT)?;

    if hits.len() < NEAR_LIMIT {
        debug!(
            "{} station(s) within {} m, falling back to closest overall",
            hits.len(),
            NEAR_RADIUS_M
        );
        hits = store.nearest_active(center, None, 1)?;
    }

    Ok(hits
        .into_iter()
        .map(|(station, meters)| NearbyStation {
            id: station.id,
            name: station.name,
            location: station.location,
            distance: format_distance(meters),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::models::StationDraft;
    use tempfile::NamedTempFile;

    #[test]
    fn test_format_distance_boundaries() {
        assert_eq!(format_distance(0.0), "0 m");
        assert_eq!(format_distance(123.4), "123 m");
        assert_eq!(format_distance(499.0), "499 m");
        assert_eq!(format_distance(500.0), "0.50 km");
        assert_eq!(format_distance(1500.0), "1.50 km");
        assert_eq!(format_distance(12_345.0), "12.35 km");
    }

    #[test]
    fn test_haversine_known_values() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert_eq!(haversine_distance(&origin, &origin), 0.0);

        // One degree along the equator
        let east = GeoPoint::new(1.0, 0.0);
        let expected = EARTH_RADIUS_M * 1f64.to_radians();
        assert!((haversine_distance(&origin, &east) - expected).abs() < 1e-6);

        let a = GeoPoint::new(31.2357, 30.0444);
        let b = GeoPoint::new(29.9187, 31.2001);
        assert!((haversine_distance(&a, &b) - haversine_distance(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = GeoPoint::new(31.2357, 30.0444);
        let bbox = bounding_box(&center, 1000.0);
        let (min_lng, max_lng) = bbox.lng_range.unwrap();

        let north = GeoPoint::new(31.2357, bbox.max_lat);
        assert!((haversine_distance(&center, &north) - 1000.0).abs() < 1.0);
        assert!(min_lng < 31.2357 && max_lng > 31.2357);

        let polar = bounding_box(&GeoPoint::new(0.0, 89.999), 1000.0);
        assert!(polar.lng_range.is_none());

        let dateline = bounding_box(&GeoPoint::new(179.9999, 0.0), 1000.0);
        assert!(dateline.lng_range.is_none());
    }

    #[test]
    fn test_bounding_box_wide_enough_near_pole() {
        let center = GeoPoint::new(0.0, 89.99);
        let bbox = bounding_box(&center, 1000.0);
        let (_, max_lng) = bbox.lng_range.unwrap();

        // Poleward of the center, about 964 m away, past the naive dlat / cos(lat) edge
        let edge = GeoPoint::new(60.0, 89.995);
        assert!(haversine_distance(&center, &edge) < 1000.0);
        assert!(edge.longitude() < max_lng);
        assert!(edge.latitude() <= bbox.max_lat);

        let (store, _temp) = seeded_store(&[("Edge", 60.0, 89.995)]);
        let hits = store.nearest_active(&center, Some(NEAR_RADIUS_M), NEAR_LIMIT).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.name, "Edge");
    }

    fn seeded_store(points: &[(&str, f64, f64)]) -> (StationStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = StationStore::new(temp_file.path().to_str().unwrap()).unwrap();
        for (name, lng, lat) in points {
            store
                .create(&StationDraft {
                    name: name.to_string(),
                    location: Some(GeoPoint::new(*lng, *lat)),
                    address: "addr".to_string(),
                    city: "Cairo".to_string(),
                    is_active: true,
                })
                .unwrap();
        }
        (store, temp_file)
    }

    #[test]
    fn test_find_nearest_two_within_radius() {
        let (store, _temp) = seeded_store(&[
            ("A", 31.2357, 30.0447),
            ("B", 31.2357, 30.0480),
            ("C", 31.2357, 30.0460),
        ]);
        let hits = find_nearest(&store, &GeoPoint::new(31.2357, 30.0444)).unwrap();

        let names: Vec<_> = hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(hits[0].distance.ends_with(" m"));
    }

    #[test]
    fn test_find_nearest_falls_back_to_single_closest() {
        // One station inside 1 km is not enough; the fallback returns only the closest
        let (store, _temp) = seeded_store(&[("Inside", 31.2357, 30.0450), ("Far", 31.2357, 30.2444)]);
        let hits = find_nearest(&store, &GeoPoint::new(31.2357, 30.0444)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Inside");

        let (remote, _temp2) = seeded_store(&[("Far", 31.2357, 30.2444)]);
        let hits = find_nearest(&remote, &GeoPoint::new(31.2357, 30.0444)).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance.ends_with(" km"));
    }

    #[test]
    fn test_find_nearest_empty_store() {
        let (store, _temp) = seeded_store(&[]);
        assert!(find_nearest(&store, &GeoPoint::new(0.0, 0.0)).unwrap().is_empty());
    }
}
