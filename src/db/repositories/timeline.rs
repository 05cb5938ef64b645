use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::db::{
    connection::Database,
    models::PlaceSection,
    repositories::{places::list_places_with, samples::samples_in_range_with},
};
use crate::segmentation::{segments_for_day, DayZone, SegmentationConfig};

impl Database {
    /// Place sections for one calendar day.
    ///
    /// Reads the day's samples and a snapshot of the place list in a single
    /// store round-trip, then segments off the database thread.
    pub async fn place_day_sections(
        &self,
        date: NaiveDate,
        zone: DayZone,
        config: &SegmentationConfig,
    ) -> Result<Vec<PlaceSection>> {
        let (start, end) = zone.day_window(date)?;

        let (places, samples) = self
            .execute(move |conn| {
                let places = list_places_with(conn)?;
                let samples = samples_in_range_with(conn, &start, &end)?;
                Ok((places, samples))
            })
            .await
            .with_context(|| format!("failed to load timeline for {date}"))?;

        Ok(segments_for_day((start, end), &samples, &places, config))
    }
}
