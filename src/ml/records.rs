//! Low-confidence prediction records.
//!
//! Serving writes a [`LowConfidenceRecord`] whenever a prediction falls
//! below the routing threshold; the retrainer later harvests them. Stores
//! sit behind the narrow [`LowConfidenceStore`] trait so the retrainer can
//! run against SQLite in production and an in-memory store in tests.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::error::{AugurError, Result};
use crate::util::fs::ensure_parent;

/// A prediction that did not clear the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowConfidenceRecord {
    pub query: String,
    pub predicted_intent: String,
    pub confidence: f64,
    /// Probability per known intent at prediction time.
    pub scores: BTreeMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

impl LowConfidenceRecord {
    pub fn new<Q: Into<String>, I: Into<String>>(
        query: Q,
        predicted_intent: I,
        confidence: f64,
        scores: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            query: query.into(),
            predicted_intent: predicted_intent.into(),
            confidence,
            scores,
            timestamp: Utc::now(),
        }
    }
}

/// Repository of low-confidence records.
pub trait LowConfidenceStore: Send + Sync {
    /// Records with `confidence < threshold`, lowest confidence first.
    ///
    /// The result is a point-in-time snapshot; records added afterwards are
    /// not visible in it.
    fn harvest(&self, threshold: f64) -> Result<Vec<LowConfidenceRecord>>;

    /// Store one record.
    fn record(&self, record: &LowConfidenceRecord) -> Result<()>;

    /// Total number of stored records.
    fn count(&self) -> Result<usize>;
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<LowConfidenceRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<LowConfidenceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

impl LowConfidenceStore for InMemoryRecordStore {
    fn harvest(&self, threshold: f64) -> Result<Vec<LowConfidenceRecord>> {
        let mut harvested: Vec<LowConfidenceRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.confidence < threshold)
            .cloned()
            .collect();
        harvested.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));
        Ok(harvested)
    }

    fn record(&self, record: &LowConfidenceRecord) -> Result<()> {
        self.records.write().push(record.clone());
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().len())
    }
}

/// Store backed by the `low_confidence_queries` SQLite table.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore").finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let conn = Connection::open(path)
            .map_err(|e| AugurError::storage_read(format!("{}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS low_confidence_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_query TEXT NOT NULL,
                predicted_intent TEXT NOT NULL,
                confidence REAL NOT NULL,
                all_scores TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_low_confidence_confidence
                ON low_confidence_queries(confidence);
            "#,
        )?;
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> DateTime<Utc> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return ts.with_timezone(&Utc);
        }
        match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            Ok(naive) => naive.and_utc(),
            Err(_) => {
                log::warn!("Unparseable record timestamp '{raw}'");
                DateTime::<Utc>::UNIX_EPOCH
            }
        }
    }

    fn parse_scores(raw: Option<String>) -> BTreeMap<String, f64> {
        match raw {
            Some(json) if !json.is_empty() => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed score mapping: {e}");
                BTreeMap::new()
            }),
            _ => BTreeMap::new(),
        }
    }
}

impl LowConfidenceStore for SqliteRecordStore {
    fn harvest(&self, threshold: f64) -> Result<Vec<LowConfidenceRecord>> {
        let conn = self.conn.lock();
        let read = || -> rusqlite::Result<Vec<(String, String, f64, Option<String>, String)>> {
            let mut stmt = conn.prepare_cached(
                r#"SELECT user_query, predicted_intent, confidence, all_scores, timestamp
                   FROM low_confidence_queries
                   WHERE confidence < ?1
                   ORDER BY confidence ASC, id ASC"#,
            )?;
            let rows = stmt.query_map(params![threshold], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            let collected = rows.collect();
            collected
        };
        let rows = read().map_err(|e| AugurError::storage_read(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(query, predicted_intent, confidence, scores, timestamp)| LowConfidenceRecord {
                query,
                predicted_intent,
                confidence,
                scores: Self::parse_scores(scores),
                timestamp: Self::parse_timestamp(&timestamp),
            })
            .collect())
    }

    fn record(&self, record: &LowConfidenceRecord) -> Result<()> {
        let scores = serde_json::to_string(&record.scores)?;
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO low_confidence_queries
               (user_query, predicted_intent, confidence, all_scores, timestamp)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                record.query,
                record.predicted_intent,
                record.confidence,
                scores,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM low_confidence_queries", [], |row| row.get(0))
            .map_err(|e| AugurError::storage_read(e.to_string()))?;
        Ok(count as usize)
    }
}
