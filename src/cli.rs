use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "place-timeline")]
#[command(about = "Import location history and see where each day was spent", long_about = None)]
#[command(version)]
pub(crate) struct Cli {
    /// Settings file (JSON).
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,
    /// Database file; overrides the settings file and PLACE_TIMELINE_DB.
    #[arg(long, global = true)]
    pub(crate) db: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest a location-history export (Records.json). Ctrl-C stops early and
    /// keeps what was read.
    Load {
        file: PathBuf,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show where one calendar day was spent.
    Day {
        /// Date as YYYY-MM-DD.
        date: NaiveDate,
        #[arg(long)]
        json: bool,
    },

    /// One line per day of a month.
    Month {
        /// Month as YYYY-MM.
        month: String,
    },

    /// Number of stored samples and the span they cover.
    Range,

    /// Manage known places.
    Places {
        #[command(subcommand)]
        command: PlacesCommand,
    },
}

#[derive(Subcommand)]
pub(crate) enum PlacesCommand {
    /// List places in match order.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add a place, or update the one with the same name.
    Set {
        name: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Radius in meters.
        #[arg(long)]
        radius: f64,
        #[arg(long, default_value = "Gray")]
        color: String,
    },

    /// Remove a place by name.
    Remove { name: String },

    /// Replace every place with the contents of a JSON array file.
    Import { file: PathBuf },
}

/// Parses `YYYY-MM` into the first day of that month.
pub(crate) fn parse_month(value: &str) -> Option<NaiveDate> {
    let (year, month) = value.split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}
