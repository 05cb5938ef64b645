//! Place and day-section models.

use serde::{Deserialize, Serialize};

/// A named circular geofence used to label samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub name: String,
    /// Symbolic color name (e.g. "SteelBlue"); rendering is up to the consumer.
    pub color: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
}

impl Place {
    pub fn is_same_place(a: Option<&Place>, b: Option<&Place>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a.name == b.name,
            (None, None) => true,
            _ => false,
        }
    }
}

/// A contiguous slice of one day attributed to a place, or to no known place.
///
/// Times are fractions of the day: 0.0 is midnight, 1.0 the next midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSection {
    pub place: Option<Place>,
    pub start_time: f64,
    pub end_time: f64,
}

impl PlaceSection {
    pub fn unknown(start_time: f64, end_time: f64) -> Self {
        Self {
            place: None,
            start_time,
            end_time,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.end_time - self.start_time
    }

    pub fn place_name(&self) -> Option<&str> {
        self.place.as_ref().map(|p| p.name.as_str())
    }
}
