use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

/// Tunables for day segmentation.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Leading gaps longer than this fraction of a day are reported as an
    /// unknown section; shorter ones are absorbed into the first section.
    pub min_leading_gap: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            // One minute.
            min_leading_gap: 1.0 / 1440.0,
        }
    }
}

/// Which clock decides where a calendar day starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayZone {
    #[default]
    Utc,
    Local,
}

impl DayZone {
    /// Start of `date` in this zone.
    pub fn day_start(self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self {
            DayZone::Utc => Ok(Utc.from_utc_datetime(&midnight)),
            DayZone::Local => Local
                .from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| anyhow!("{date} has no local midnight")),
        }
    }

    /// Half-open `[start, end)` interval covering `date`.
    pub fn day_window(self, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let next = date
            .succ_opt()
            .ok_or_else(|| anyhow!("{date} is the last representable day"))?;
        Ok((self.day_start(date)?, self.day_start(next)?))
    }
}
