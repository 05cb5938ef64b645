pub mod geo_sample;
pub mod place;

pub use geo_sample::GeoSample;
pub use place::{Place, PlaceSection};
