//! A single timestamped position from a location-history export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One location sample. Samples are keyed by `timestamp`; storing a sample
/// whose timestamp already exists replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoSample {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoSample {
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
        }
    }
}
