use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::ingest::IngestOptions;
use crate::segmentation::DayZone;

pub const DEFAULT_SETTINGS_FILE: &str = "place-timeline.json";
pub const DATABASE_ENV_VAR: &str = "PLACE_TIMELINE_DB";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Initial tokenizer buffer size in bytes.
    pub read_buffer_bytes: usize,
    /// Samples per store transaction during ingestion.
    pub upsert_batch_size: usize,
    pub day_zone: DayZone,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("db.sqlite3"),
            read_buffer_bytes: 16 * 1024,
            upsert_batch_size: 1000,
            day_zone: DayZone::Utc,
        }
    }
}

impl Settings {
    /// Reads settings from `path`. A missing file yields defaults; a file that
    /// does not parse yields defaults with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = match serde_json::from_str::<Settings>(&contents) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(
                    "Ignoring malformed settings file {}: {err}",
                    path.display()
                );
                Self::default()
            }
        };
        Ok(settings.normalized())
    }

    /// Applies the database override, flag first, then environment.
    pub fn with_database_override(mut self, flag: Option<PathBuf>, env: Option<String>) -> Self {
        if let Some(path) = flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from)) {
            self.database_path = path;
        }
        self
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            read_buffer_bytes: self.read_buffer_bytes,
            batch_size: self.upsert_batch_size,
        }
    }

    fn normalized(mut self) -> Self {
        self.read_buffer_bytes = self.read_buffer_bytes.max(1);
        self.upsert_batch_size = self.upsert_batch_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"day_zone": "local", "upsert_batch_size": 0}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.day_zone, DayZone::Local);
        assert_eq!(settings.upsert_batch_size, 1);
        assert_eq!(settings.read_buffer_bytes, 16 * 1024);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());
    }

    #[test]
    fn reads_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
                "database_path": "/tmp/elsewhere.sqlite3",
                "read_buffer_bytes": 4096,
                "upsert_batch_size": 250,
                "day_zone": "local"
            }"#,
        )
        .unwrap();

        assert_eq!(
            Settings::load(&path).unwrap(),
            Settings {
                database_path: PathBuf::from("/tmp/elsewhere.sqlite3"),
                read_buffer_bytes: 4096,
                upsert_batch_size: 250,
                day_zone: DayZone::Local,
            }
        );
    }

    #[test]
    fn flag_beats_environment() {
        let base = Settings::default();
        let from_env = base
            .clone()
            .with_database_override(None, Some("env.sqlite3".into()));
        assert_eq!(from_env.database_path, PathBuf::from("env.sqlite3"));

        let from_flag = base.with_database_override(
            Some(PathBuf::from("flag.sqlite3")),
            Some("env.sqlite3".into()),
        );
        assert_eq!(from_flag.database_path, PathBuf::from("flag.sqlite3"));
    }
}
