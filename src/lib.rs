mod cli;
pub mod db;
pub mod ingest;
pub mod json;
pub mod segmentation;
pub mod settings;
mod utils;

use std::{collections::BTreeMap, fs, path::PathBuf, process::ExitCode};

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

use cli::{parse_month, Cli, Command, PlacesCommand};
use db::{Database, Place, PlaceSection};
use ingest::{IngestOutcome, IngestionController, IngestionSummary};
use segmentation::SegmentationConfig;
use settings::{Settings, DATABASE_ENV_VAR, DEFAULT_SETTINGS_FILE};

const PROGRESS_TICKS: u64 = 1000;

pub fn run() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    match start(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Opens the store outside the runtime, then runs the command on it.
fn start(cli: Cli) -> Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = Settings::load(&config_path)?
        .with_database_override(cli.db.clone(), std::env::var(DATABASE_ENV_VAR).ok());

    let db = Database::new(settings.database_path.clone())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;

    runtime.block_on(dispatch(cli.command, &settings, &db))
}

async fn dispatch(command: Command, settings: &Settings, db: &Database) -> Result<()> {
    match command {
        Command::Load { file, json } => load(db, settings, file, json).await,
        Command::Day { date, json } => {
            let sections = db
                .place_day_sections(date, settings.day_zone, &SegmentationConfig::default())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&sections)?);
            } else {
                print_day(date, &sections);
            }
            Ok(())
        }
        Command::Month { month } => {
            let first = parse_month(&month)
                .ok_or_else(|| anyhow!("expected a month as YYYY-MM, got '{month}'"))?;
            print_month(db, settings, first).await
        }
        Command::Range => {
            let count = db.sample_count().await?;
            match db.timestamp_bounds().await? {
                Some((earliest, latest)) => {
                    println!("{count} samples from {earliest} to {latest}")
                }
                None => println!("no samples stored"),
            }
            Ok(())
        }
        Command::Places { command } => places(db, command).await,
    }
}

async fn load(db: &Database, settings: &Settings, file: PathBuf, json: bool) -> Result<()> {
    let mut controller = IngestionController::new();
    let mut progress = controller.start(file, db.clone(), settings.ingest_options())?;

    let bar = ProgressBar::new(PROGRESS_TICKS);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{elapsed_precise}] {wide_bar} {percent}%") {
        bar.set_style(style);
    }

    loop {
        tokio::select! {
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let fraction = *progress.borrow_and_update();
                bar.set_position((fraction * PROGRESS_TICKS as f64) as u64);
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("Stopping ingestion; records read so far are kept");
                controller.cancel();
            }
        }
    }

    let outcome = controller.wait().await;
    bar.finish_and_clear();

    match outcome? {
        IngestOutcome::Completed(summary) if json => {
            println!("{}", serde_json::to_string_pretty(&summary)?)
        }
        IngestOutcome::Completed(summary) => print_summary(&summary),
        IngestOutcome::Cancelled { committed } => {
            println!("cancelled; {committed} records stored")
        }
    }
    Ok(())
}

fn print_summary(summary: &IngestionSummary) {
    match (summary.earliest, summary.latest) {
        (Some(earliest), Some(latest)) => println!(
            "{} records from {earliest} to {latest}",
            summary.record_count
        ),
        _ => println!("no location records found"),
    }
}

/// `0.5` -> `12:00`.
fn clock(fraction: f64) -> String {
    let minutes = (fraction * 1440.0).round() as u32;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn print_day(date: NaiveDate, sections: &[PlaceSection]) {
    println!("{date}");
    for section in sections {
        println!(
            "  {}-{}  {:<20} {:>5.1}%",
            clock(section.start_time),
            clock(section.end_time),
            section.place_name().unwrap_or("?"),
            section.fraction() * 100.0
        );
    }
}

async fn print_month(db: &Database, settings: &Settings, first: NaiveDate) -> Result<()> {
    let config = SegmentationConfig::default();
    let mut date = first;
    while date.month() == first.month() {
        let sections = db
            .place_day_sections(date, settings.day_zone, &config)
            .await?;

        let mut shares: BTreeMap<&str, f64> = BTreeMap::new();
        for section in &sections {
            *shares.entry(section.place_name().unwrap_or("?")).or_default() +=
                section.fraction();
        }
        let line: Vec<String> = shares
            .iter()
            .map(|(name, share)| format!("{name} {:.0}%", share * 100.0))
            .collect();
        println!("{date}  {}", line.join(", "));

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(())
}

async fn places(db: &Database, command: PlacesCommand) -> Result<()> {
    match command {
        PlacesCommand::List { json } => {
            let places = db.list_places().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&places)?);
            } else {
                for place in &places {
                    println!(
                        "{:<20} {:>10.6} {:>11.6} {:>8.0} m  {}",
                        place.name, place.latitude, place.longitude, place.radius, place.color
                    );
                }
            }
        }
        PlacesCommand::Set {
            name,
            lat,
            lon,
            radius,
            color,
        } => {
            db.upsert_place(&Place {
                name,
                color,
                latitude: lat,
                longitude: lon,
                radius,
            })
            .await?;
        }
        PlacesCommand::Remove { name } => {
            if !db.delete_place(&name).await? {
                println!("no place named '{name}'");
            }
        }
        PlacesCommand::Import { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let places: Vec<Place> = serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON array of places", file.display()))?;
            let stored = db.replace_places(&places).await?;
            println!("stored {stored} places");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formats_fractions() {
        assert_eq!(clock(0.0), "00:00");
        assert_eq!(clock(0.5), "12:00");
        assert_eq!(clock(0.75 + 1.0 / 1440.0), "18:01");
        assert_eq!(clock(1.0), "24:00");
    }
}
