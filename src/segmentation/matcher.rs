//! Nearest-enclosing-place lookup.
//!
//! Distances use the haversine formula on a spherical Earth of radius
//! 6,371,000 m. Place radii are compared against that exact figure, so the
//! constant is spelled out here rather than taken from a geodesy crate with a
//! slightly different mean radius.

use crate::db::models::Place;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS84 coordinates.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lon1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lon2.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS_METERS
}

/// First place in `places` whose circle contains the coordinate.
///
/// List order decides between overlapping places; this is not a nearest-center
/// search. The boundary is inclusive.
pub fn closest_containing_place(places: &[Place], latitude: f64, longitude: f64) -> Option<&Place> {
    places.iter().find(|place| {
        haversine_distance(place.latitude, place.longitude, latitude, longitude) <= place.radius
    })
}
