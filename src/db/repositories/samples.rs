use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_timestamp, parse_datetime, parse_optional_datetime},
    models::GeoSample,
};

fn row_to_sample(row: &Row) -> Result<GeoSample> {
    let timestamp: String = row.get("timestamp")?;

    Ok(GeoSample {
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
    })
}

/// Inserts `samples` in one transaction, replacing rows with the same timestamp.
pub(crate) fn upsert_samples_with(conn: &mut Connection, samples: &[GeoSample]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO timeline (timestamp, latitude, longitude)
             VALUES (?1, ?2, ?3)",
        )?;
        for sample in samples {
            stmt.execute(params![
                format_timestamp(&sample.timestamp),
                sample.latitude,
                sample.longitude,
            ])?;
        }
    }
    tx.commit().context("failed to commit sample batch")?;
    Ok(())
}

pub(crate) fn samples_in_range_with(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<GeoSample>> {
    let mut stmt = conn.prepare_cached(
        "SELECT timestamp, latitude, longitude
         FROM timeline
         WHERE timestamp >= ?1 AND timestamp < ?2
         ORDER BY timestamp ASC",
    )?;

    let mut rows = stmt.query(params![format_timestamp(start), format_timestamp(end)])?;
    let mut samples = Vec::new();
    while let Some(row) = rows.next()? {
        samples.push(row_to_sample(row)?);
    }

    Ok(samples)
}

impl Database {
    pub async fn upsert_sample(&self, sample: &GeoSample) -> Result<()> {
        self.upsert_samples(std::slice::from_ref(sample)).await
    }

    /// Batch upsert keyed by timestamp. Re-storing a timestamp overwrites it.
    pub async fn upsert_samples(&self, samples: &[GeoSample]) -> Result<()> {
        let samples = samples.to_vec();
        self.execute(move |conn| {
            upsert_samples_with(conn, &samples).context("failed to upsert samples")
        })
        .await
    }

    /// Samples with `start <= timestamp < end`, oldest first.
    pub async fn samples_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GeoSample>> {
        self.execute(move |conn| samples_in_range_with(conn, &start, &end))
            .await
    }

    /// Earliest and latest stored timestamps, or `None` for an empty store.
    pub async fn timestamp_bounds(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        self.execute(|conn| {
            let (min, max): (Option<String>, Option<String>) = conn.query_row(
                "SELECT MIN(timestamp), MAX(timestamp) FROM timeline",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let min = parse_optional_datetime(min, "min timestamp")?;
            let max = parse_optional_datetime(max, "max timestamp")?;
            Ok(min.zip(max))
        })
        .await
    }

    pub async fn sample_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM timeline", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
