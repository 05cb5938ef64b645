pub mod places;
pub mod samples;
pub mod timeline;
