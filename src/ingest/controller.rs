use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::db::Database;

use super::driver::{ingest_file, IngestOptions, IngestOutcome};

/// Owns at most one background ingestion run.
pub struct IngestionController {
    handle: Option<JoinHandle<Result<IngestOutcome>>>,
    cancel_token: Option<CancellationToken>,
}

impl IngestionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Starts ingesting `path` on a blocking worker and returns the progress
    /// channel. Fails if a run is still active on this controller; the result
    /// of a finished run that was never waited for is discarded.
    pub fn start(
        &mut self,
        path: PathBuf,
        db: Database,
        options: IngestOptions,
    ) -> Result<watch::Receiver<f64>> {
        if self.is_running() {
            bail!("ingestion already active");
        }
        if self.handle.take().is_some() {
            info!("Discarding result of previous ingestion run");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let (progress_tx, progress_rx) = watch::channel(0.0);

        info!("Starting ingestion of {}", path.display());
        let handle = tokio::task::spawn_blocking(move || {
            ingest_file(&db, &path, &options, &progress_tx, &token_clone)
        });

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(progress_rx)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Asks the active run to stop; it commits what it has read and finishes
    /// with [`IngestOutcome::Cancelled`].
    pub fn cancel(&self) {
        if let Some(token) = &self.cancel_token {
            token.cancel();
            info!("Cancellation requested for ingestion");
        }
    }

    /// Waits for the active run to finish. The controller can be started
    /// again afterwards.
    pub async fn wait(&mut self) -> Result<IngestOutcome> {
        self.cancel_token = None;
        let Some(handle) = self.handle.take() else {
            bail!("no ingestion running");
        };
        handle.await.context("ingestion task failed to join")?
    }
}

impl Default for IngestionController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::mpsc, time::Duration};

    use super::*;

    fn setup(records: usize) -> (tempfile::TempDir, Database, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("controller.sqlite3")).unwrap();

        let locations: Vec<String> = (0..records)
            .map(|i| {
                format!(
                    r#"{{"latitudeE7": 470000000, "longitudeE7": 80000000, "timestamp": "2024-03-01T{:02}:{:02}:00Z"}}"#,
                    i / 60,
                    i % 60
                )
            })
            .collect();
        let path = dir.path().join("Records.json");
        fs::write(&path, format!(r#"{{"locations": [{}]}}"#, locations.join(","))).unwrap();
        (dir, db, path)
    }

    #[tokio::test]
    async fn runs_to_completion_and_can_restart() {
        let (_dir, db, path) = setup(90);
        let mut controller = IngestionController::new();

        let progress = controller
            .start(path.clone(), db.clone(), IngestOptions::default())
            .unwrap();
        let outcome = controller.wait().await.unwrap();

        let IngestOutcome::Completed(summary) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(summary.record_count, 90);
        assert_eq!(*progress.borrow(), 1.0);
        assert_eq!(db.sample_count().await.unwrap(), 90);

        controller.start(path, db, IngestOptions::default()).unwrap();
        assert!(controller.wait().await.is_ok());
    }

    #[tokio::test]
    async fn finished_run_does_not_block_a_new_one() {
        let (_dir, db, path) = setup(5);
        let mut controller = IngestionController::new();

        controller
            .start(path.clone(), db.clone(), IngestOptions::default())
            .unwrap();
        while controller.is_running() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        controller.start(path, db, IngestOptions::default()).unwrap();
        let outcome = controller.wait().await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn rejects_second_concurrent_run() {
        let (_dir, db, path) = setup(10);
        let mut controller = IngestionController::new();

        // Hold the database thread so the run cannot finish its final write.
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let gate_db = db.clone();
        let gate = std::thread::spawn(move || {
            gate_db.execute_blocking(move |_conn| {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
                Ok(())
            })
        });
        entered_rx.recv().unwrap();

        controller
            .start(path.clone(), db.clone(), IngestOptions::default())
            .unwrap();
        assert!(controller.is_running());
        assert!(controller
            .start(path, db, IngestOptions::default())
            .is_err());

        release_tx.send(()).unwrap();
        gate.join().unwrap().unwrap();
        controller.wait().await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_surfaces_error() {
        let (dir, db, _) = setup(0);
        let mut controller = IngestionController::new();

        controller
            .start(dir.path().join("nope.json"), db, IngestOptions::default())
            .unwrap();
        assert!(controller.wait().await.is_err());
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn wait_without_run_fails() {
        let mut controller = IngestionController::default();
        assert!(controller.wait().await.is_err());
    }
}
