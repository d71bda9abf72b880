//! Persistence of analyzed scenes.
//!
//! Each analysis is written as a PNG plus a JSON record, and summarized in
//! an append-only `master_log.jsonl`. Records are keyed by a timestamp
//! string that is returned to the client.

use crate::capture::EncodedImage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Name of the append-only summary log.
pub const MASTER_LOG: &str = "master_log.jsonl";

/// Timestamp layout used as the record key.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Errors that can occur while persisting a record.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("journal lock poisoned")]
    Poisoned,
}

/// Journal location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory receiving images and analyses.
    pub dir: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vision_logs"),
        }
    }
}

/// One analysis as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub timestamp: String,
    pub status: String,
    pub description: String,
    pub image_file: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct MasterLogLine<'a> {
    timestamp: &'a str,
    description: &'a str,
}

/// Writes analyzed scenes to a directory.
#[derive(Debug)]
pub struct VisionJournal {
    dir: PathBuf,
    last_timestamp: Mutex<Option<String>>,
}

impl VisionJournal {
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            last_timestamp: Mutex::new(None),
        }
    }

    /// Persists an image and its description. Blocks on file I/O.
    ///
    /// Returns the record's timestamp key.
    pub fn record(&self, image: &EncodedImage, description: &str) -> Result<String, JournalError> {
        fs::create_dir_all(&self.dir).map_err(|source| JournalError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let timestamp = self.next_timestamp()?;
        let image_file = format!("{timestamp}_image.png");
        let image_path = self.dir.join(&image_file);
        fs::write(&image_path, image.png()).map_err(|source| JournalError::Io {
            path: image_path.clone(),
            source,
        })?;

        let record = AnalysisRecord {
            timestamp: timestamp.clone(),
            status: "success".to_string(),
            description: description.to_string(),
            image_file,
            captured_at: image.captured_at(),
        };
        let record_path = self.dir.join(format!("{timestamp}_analysis.json"));
        fs::write(&record_path, serde_json::to_vec_pretty(&record)?).map_err(|source| {
            JournalError::Io {
                path: record_path.clone(),
                source,
            }
        })?;

        self.append_master(&timestamp, description)?;

        tracing::debug!(timestamp = %timestamp, dir = %self.dir.display(), "Recorded analysis");
        Ok(timestamp)
    }

    fn append_master(&self, timestamp: &str, description: &str) -> Result<(), JournalError> {
        let path = self.dir.join(MASTER_LOG);
        let mut line = serde_json::to_string(&MasterLogLine {
            timestamp,
            description,
        })?;
        line.push('\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .map_err(|source| JournalError::Io { path, source })
    }

    /// Produces a timestamp strictly different from the previous one.
    fn next_timestamp(&self) -> Result<String, JournalError> {
        let mut last = self
            .last_timestamp
            .lock()
            .map_err(|_| JournalError::Poisoned)?;
        let mut now = Utc::now();
        let mut candidate = now.format(TIMESTAMP_FORMAT).to_string();
        while last.as_deref() >= Some(candidate.as_str()) {
            now += chrono::Duration::microseconds(1);
            candidate = now.format(TIMESTAMP_FORMAT).to_string();
        }
        *last = Some(candidate.clone());
        Ok(candidate)
    }
}

/// Reads every line of the master log.
pub fn read_master_log(dir: &Path) -> std::io::Result<Vec<serde_json::Value>> {
    let content = fs::read_to_string(dir.join(MASTER_LOG))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(std::io::Error::from))
        .collect()
}
