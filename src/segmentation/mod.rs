pub mod algorithm;
pub mod config;
pub mod matcher;

pub use algorithm::{segments_for_day, time_of_day_fraction};
pub use config::{DayZone, SegmentationConfig};
pub use matcher::{closest_containing_place, haversine_distance};
