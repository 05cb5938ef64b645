use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::db::{models::GeoSample, repositories::samples::upsert_samples_with, Database};
use crate::json::TokenReader;

use super::extractor::{Extracted, RecordExtractor};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Progress is reported each time this fraction of the source has been read.
const PROGRESS_STEPS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Initial size of the token buffer; it grows to fit the largest token.
    pub read_buffer_bytes: usize,
    /// Samples written per store transaction.
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            read_buffer_bytes: 16 * 1024,
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    pub record_count: u64,
    /// `None` only when no record was found.
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Completed(IngestionSummary),
    /// Stopped on request. Samples read before the stop stay stored.
    Cancelled { committed: u64 },
}

/// Accumulates samples for one run and writes them in batches.
struct RunState<'a> {
    db: &'a Database,
    batch: Vec<GeoSample>,
    batch_size: usize,
    record_count: u64,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

impl<'a> RunState<'a> {
    fn new(db: &'a Database, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            record_count: 0,
            earliest: None,
            latest: None,
        }
    }

    fn push(&mut self, sample: GeoSample) -> Result<()> {
        self.record_count += 1;
        self.earliest = Some(self.earliest.map_or(sample.timestamp, |t| t.min(sample.timestamp)));
        self.latest = Some(self.latest.map_or(sample.timestamp, |t| t.max(sample.timestamp)));
        self.batch.push(sample);

        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        self.db
            .execute_blocking(move |conn| upsert_samples_with(conn, &batch))
            .context("failed to store location samples")
    }

    fn summary(&self) -> IngestionSummary {
        IngestionSummary {
            record_count: self.record_count,
            earliest: self.earliest,
            latest: self.latest,
        }
    }
}

/// Ingests a location-history export file into `db`.
///
/// Blocking; run it on a worker thread. A missing or unreadable file fails
/// before any progress is reported.
pub fn ingest_file(
    db: &Database,
    path: &Path,
    options: &IngestOptions,
    progress: &watch::Sender<f64>,
    cancel: &CancellationToken,
) -> Result<IngestOutcome> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let total_bytes = file
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();

    log_info!("Ingesting {} ({} bytes)", path.display(), total_bytes);
    ingest_reader(db, file, total_bytes, options, progress, cancel)
}

/// Streams `source` through the record extractor and upserts every sample.
///
/// `total_bytes` is the expected source length, used only for progress.
/// Cancellation is checked before every token. On cancellation or a parse
/// failure the samples read so far are still written.
pub fn ingest_reader<R: Read>(
    db: &Database,
    source: R,
    total_bytes: u64,
    options: &IngestOptions,
    progress: &watch::Sender<f64>,
    cancel: &CancellationToken,
) -> Result<IngestOutcome> {
    let reader = TokenReader::with_capacity(source, options.read_buffer_bytes);
    let mut extractor = RecordExtractor::new(reader);
    let mut run = RunState::new(db, options.batch_size);

    let report_step = total_bytes / PROGRESS_STEPS;
    let mut last_report = 0u64;

    loop {
        if cancel.is_cancelled() {
            run.flush()?;
            log_info!("Ingestion cancelled after {} records", run.record_count);
            return Ok(IngestOutcome::Cancelled {
                committed: run.record_count,
            });
        }

        let step = match extractor.advance() {
            Ok(step) => step,
            Err(err) => {
                if let Err(flush_err) = run.flush() {
                    log_warn!("Failed to store samples read before parse error: {flush_err:#}");
                }
                return Err(anyhow::Error::new(err).context("failed to parse location history"));
            }
        };

        match step {
            Some(Extracted::Sample(sample)) => run.push(sample)?,
            Some(Extracted::Skipped) => {}
            None => break,
        }

        let position = extractor.bytes_read();
        if total_bytes > 0 && position - last_report >= report_step {
            progress.send_replace((position as f64 / total_bytes as f64).min(1.0));
            last_report = position;
        }
    }

    run.flush()?;
    progress.send_replace(1.0);

    let summary = run.summary();
    log_info!(
        "Ingested {} records ({:?} to {:?})",
        summary.record_count,
        summary.earliest,
        summary.latest
    );
    Ok(IngestOutcome::Completed(summary))
}
