//! Append-only retraining history.
//!
//! The history is a JSON array of [`RetrainingEvent`]s. Appending reads the
//! whole file, pushes one event and rewrites the file; nothing else ever
//! modifies it. Status is always recomputed from the file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};
use crate::util::fs::{path_lock, write_json_atomic};

/// One retraining attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingEvent {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub samples_count: usize,
    pub model_path: String,
    pub vectorizer_path: String,
}

impl RetrainingEvent {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        success: bool,
        samples_count: usize,
        model_path: P,
        vectorizer_path: Q,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            success,
            samples_count,
            model_path: model_path.as_ref().display().to_string(),
            vectorizer_path: vectorizer_path.as_ref().display().to_string(),
        }
    }
}

/// Aggregate view of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingStatus {
    pub retraining_count: usize,
    pub last_retraining: Option<DateTime<Utc>>,
    pub successful_retrainings: usize,
    pub failed_retrainings: usize,
    pub recent_events: Vec<RetrainingEvent>,
}

/// The history file.
#[derive(Debug, Clone)]
pub struct RetrainingHistory {
    path: PathBuf,
}

impl RetrainingHistory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All events, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<RetrainingEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            AugurError::serialization(format!(
                "malformed history {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Append one event.
    ///
    /// Appends to the same file are serialized across every handle in the
    /// process.
    pub fn append(&self, event: RetrainingEvent) -> Result<()> {
        let lock = path_lock(&self.path);
        let _appending = lock.lock();
        let mut events = self.load()?;
        events.push(event);
        write_json_atomic(&self.path, &events).map_err(|e| {
            AugurError::serialization(format!(
                "cannot write history {}: {e}",
                self.path.display()
            ))
        })?;
        if let Some(event) = events.last() {
            log::info!(
                "Retraining event logged: success={} samples={}",
                event.success,
                event.samples_count
            );
        }
        Ok(())
    }

    /// Counts and the `recent` most recent events.
    pub fn status(&self, recent: usize) -> Result<RetrainingStatus> {
        let events = self.load()?;
        let successful = events.iter().filter(|e| e.success).count();
        let start = events.len().saturating_sub(recent);
        Ok(RetrainingStatus {
            retraining_count: events.len(),
            last_retraining: events.last().map(|e| e.timestamp),
            successful_retrainings: successful,
            failed_retrainings: events.len() - successful,
            recent_events: events[start..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_history_is_empty() {
        let dir = TempDir::new().unwrap();
        let history = RetrainingHistory::new(dir.path().join("logs/history.json"));
        let status = history.status(5).unwrap();
        assert_eq!(status.retraining_count, 0);
        assert!(status.last_retraining.is_none());
        assert!(status.recent_events.is_empty());
    }

    #[test]
    fn test_append_and_status() {
        let dir = TempDir::new().unwrap();
        let history = RetrainingHistory::new(dir.path().join("logs/history.json"));

        for i in 0..7 {
            history
                .append(RetrainingEvent::new(i != 3, i * 10, "m.bin", "v.bin"))
                .unwrap();
        }

        let status = history.status(5).unwrap();
        assert_eq!(status.retraining_count, 7);
        assert_eq!(status.successful_retrainings, 6);
        assert_eq!(status.failed_retrainings, 1);
        assert_eq!(status.recent_events.len(), 5);
        assert_eq!(status.recent_events[0].samples_count, 20);
        assert_eq!(status.last_retraining, Some(status.recent_events[4].timestamp));
    }

    #[test]
    fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let history = RetrainingHistory::new(&path);
        history
            .append(RetrainingEvent::new(true, 4, "models/intent_model.bin", "models/vectorizer.bin"))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let event = &raw[0];
        assert_eq!(event["success"], true);
        assert_eq!(event["samples_count"], 4);
        assert_eq!(event["model_path"], "models/intent_model.bin");
        assert!(event["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_concurrent_appends_keep_every_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/history.json");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let path = &path;
                scope.spawn(move || {
                    let history = RetrainingHistory::new(path);
                    for i in 0..50 {
                        history
                            .append(RetrainingEvent::new(true, i, "m.bin", "v.bin"))
                            .unwrap();
                    }
                });
            }
        });

        let status = RetrainingHistory::new(&path).status(5).unwrap();
        assert_eq!(status.retraining_count, 200);
        assert_eq!(status.successful_retrainings, 200);
    }
}
