use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, Row};

use crate::db::{connection::Database, models::Place};

fn row_to_place(row: &Row) -> Result<Place> {
    Ok(Place {
        name: row.get("name")?,
        color: row.get("color")?,
        latitude: row.get("latitude")?,
        longitude: row.get("longitude")?,
        radius: row.get("radius")?,
    })
}

fn validate(place: &Place) -> Result<()> {
    if place.name.trim().is_empty() {
        bail!("place name must not be blank");
    }
    if !(-90.0..=90.0).contains(&place.latitude) || !(-180.0..=180.0).contains(&place.longitude)
    {
        bail!(
            "place '{}' has out-of-range coordinates ({}, {})",
            place.name,
            place.latitude,
            place.longitude
        );
    }
    if !place.radius.is_finite() || place.radius < 0.0 {
        bail!("place '{}' has invalid radius {}", place.name, place.radius);
    }
    Ok(())
}

/// All places in first-match order (insertion order).
pub(crate) fn list_places_with(conn: &Connection) -> Result<Vec<Place>> {
    let mut stmt = conn.prepare_cached(
        "SELECT name, color, latitude, longitude, radius
         FROM places
         ORDER BY rowid ASC",
    )?;

    let mut rows = stmt.query([])?;
    let mut places = Vec::new();
    while let Some(row) = rows.next()? {
        places.push(row_to_place(row)?);
    }

    Ok(places)
}

impl Database {
    pub async fn list_places(&self) -> Result<Vec<Place>> {
        self.execute(|conn| list_places_with(conn)).await
    }

    /// Inserts a place or updates the one with the same name in place, keeping
    /// its position in the match order.
    pub async fn upsert_place(&self, place: &Place) -> Result<()> {
        validate(place)?;
        let record = place.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO places (name, color, latitude, longitude, radius)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(name) DO UPDATE SET
                     color = excluded.color,
                     latitude = excluded.latitude,
                     longitude = excluded.longitude,
                     radius = excluded.radius",
                params![
                    record.name,
                    record.color,
                    record.latitude,
                    record.longitude,
                    record.radius,
                ],
            )
            .with_context(|| format!("failed to save place '{}'", record.name))?;
            Ok(())
        })
        .await
    }

    /// Returns whether a place with that name existed.
    pub async fn delete_place(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.execute(move |conn| {
            let rows = conn.execute("DELETE FROM places WHERE name = ?1", params![name])?;
            Ok(rows > 0)
        })
        .await
    }

    /// Replaces the whole place list, as the place editor saves it: entries with
    /// blank names are dropped, the rest are stored in the given order.
    /// Returns how many places were stored.
    pub async fn replace_places(&self, places: &[Place]) -> Result<usize> {
        let places: Vec<Place> = places
            .iter()
            .filter(|p| !p.name.trim().is_empty())
            .cloned()
            .collect();
        for place in &places {
            validate(place)?;
        }

        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM places", [])?;
            for place in &places {
                tx.execute(
                    "INSERT INTO places (name, color, latitude, longitude, radius)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        place.name,
                        place.color,
                        place.latitude,
                        place.longitude,
                        place.radius,
                    ],
                )
                .with_context(|| format!("failed to insert place '{}'", place.name))?;
            }
            tx.commit().context("failed to commit place list")?;
            Ok(places.len())
        })
        .await
    }
}
