//! Pulls location records out of a location-history export.
//!
//! The export is one JSON document whose records sit at a fixed depth:
//!
//! ```text
//! { "locations": [ { "latitudeE7": 473769120, "longitudeE7": 85417000,
//!                    "timestamp": "2024-03-01T08:15:00.000Z", ... }, ... ] }
//! ```
//!
//! Only property names at record-field depth are inspected; everything else
//! in the document is skipped token by token.

use std::io::Read;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::db::models::GeoSample;
use crate::json::{JsonError, Token, TokenReader};

/// Depth of a record object: root object -> records array -> record.
const RECORD_DEPTH: usize = 2;
/// Depth of a record's own fields.
const RECORD_FIELD_DEPTH: usize = 3;

const LATITUDE_FIELD: &str = "latitudeE7";
const LONGITUDE_FIELD: &str = "longitudeE7";
const TIMESTAMP_FIELD: &str = "timestamp";
const TIMESTAMP_MS_FIELD: &str = "timestampMs";

/// Timestamps without an offset are read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

const E7: f64 = 10_000_000.0;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Json(#[from] JsonError),
    #[error("invalid '{field}' value near byte {offset}: {reason}")]
    InvalidField {
        field: &'static str,
        offset: u64,
        reason: String,
    },
}

/// Result of processing one token.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Sample(GeoSample),
    Skipped,
}

#[derive(Debug, Default)]
struct PendingRecord {
    latitude: Option<f64>,
    longitude: Option<f64>,
    timestamp: Option<DateTime<Utc>>,
}

impl PendingRecord {
    fn take_complete(&mut self) -> Option<GeoSample> {
        match (self.latitude, self.longitude, self.timestamp) {
            (Some(latitude), Some(longitude), Some(timestamp)) => {
                *self = Self::default();
                Some(GeoSample::new(timestamp, latitude, longitude))
            }
            _ => None,
        }
    }
}

pub struct RecordExtractor<R> {
    reader: TokenReader<R>,
    pending: PendingRecord,
    failed: bool,
}

impl<R: Read> RecordExtractor<R> {
    pub fn new(reader: TokenReader<R>) -> Self {
        Self {
            reader,
            pending: PendingRecord::default(),
            failed: false,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.reader.bytes_read()
    }

    /// Processes one token, plus the value of a recognised field.
    ///
    /// Returns `None` once the document is complete. Records missing a field
    /// never produce a sample.
    pub fn advance(&mut self) -> Result<Option<Extracted>, ExtractError> {
        let Some(event) = self.reader.next_token()? else {
            return Ok(None);
        };

        match event.token {
            Token::StartObject if event.depth == RECORD_DEPTH => {
                self.pending = PendingRecord::default();
            }
            Token::PropertyName(name) if event.depth == RECORD_FIELD_DEPTH => {
                self.read_field(&name)?;
            }
            _ => {}
        }

        Ok(Some(match self.pending.take_complete() {
            Some(sample) => Extracted::Sample(sample),
            None => Extracted::Skipped,
        }))
    }

    fn read_field(&mut self, name: &str) -> Result<(), ExtractError> {
        match name {
            LATITUDE_FIELD => {
                let value = self.scalar(LATITUDE_FIELD)?;
                self.pending.latitude = Some(self.fixed_point(LATITUDE_FIELD, &value)?);
            }
            LONGITUDE_FIELD => {
                let value = self.scalar(LONGITUDE_FIELD)?;
                self.pending.longitude = Some(self.fixed_point(LONGITUDE_FIELD, &value)?);
            }
            TIMESTAMP_FIELD => {
                let value = self.scalar(TIMESTAMP_FIELD)?;
                self.pending.timestamp = Some(self.date_time(&value)?);
            }
            TIMESTAMP_MS_FIELD => {
                let value = self.scalar(TIMESTAMP_MS_FIELD)?;
                self.pending.timestamp = Some(self.epoch_millis(&value)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn scalar(&mut self, field: &'static str) -> Result<Token, ExtractError> {
        match self.reader.next_token()? {
            Some(event) if event.token.is_scalar() => Ok(event.token),
            Some(event) => Err(self.invalid(field, format!("expected a scalar, found {:?}", event.token))),
            None => Err(self.invalid(field, "missing value".into())),
        }
    }

    fn fixed_point(&self, field: &'static str, value: &Token) -> Result<f64, ExtractError> {
        match value {
            Token::Number(n) => n
                .as_i64()
                .map(|raw| raw as f64 / E7)
                .ok_or_else(|| self.invalid(field, format!("{n} is not an integer"))),
            other => Err(self.invalid(field, format!("expected an integer, found {other:?}"))),
        }
    }

    fn date_time(&self, value: &Token) -> Result<DateTime<Utc>, ExtractError> {
        match value {
            Token::String(text) => match DateTime::parse_from_rfc3339(text) {
                Ok(dt) => Ok(dt.with_timezone(&Utc)),
                Err(err) => NAIVE_TIMESTAMP_FORMATS
                    .iter()
                    .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                    .map(|naive| naive.and_utc())
                    .ok_or_else(|| self.invalid(TIMESTAMP_FIELD, format!("'{text}': {err}"))),
            },
            other => Err(self.invalid(TIMESTAMP_FIELD, format!("expected a string, found {other:?}"))),
        }
    }

    fn epoch_millis(&self, value: &Token) -> Result<DateTime<Utc>, ExtractError> {
        let millis = match value {
            Token::String(text) => text.parse::<i64>().ok(),
            Token::Number(n) => n.as_i64(),
            _ => None,
        };
        millis
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| self.invalid(TIMESTAMP_MS_FIELD, format!("{value:?} is not epoch milliseconds")))
    }

    fn invalid(&self, field: &'static str, reason: String) -> ExtractError {
        ExtractError::InvalidField {
            field,
            offset: self.reader.bytes_read(),
            reason,
        }
    }
}

impl<R: Read> Iterator for RecordExtractor<R> {
    type Item = Result<GeoSample, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.advance() {
                Ok(Some(Extracted::Sample(sample))) => return Some(Ok(sample)),
                Ok(Some(Extracted::Skipped)) => continue,
                Ok(None) => return None,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
