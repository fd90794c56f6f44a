//! Audit trail of successful selections, per caller.
//!
//! Each successful `visible` request is recorded as one [`ObservationRecord`].
//! Stores are append-only; history comes back newest first by `created_at`,
//! with later appends winning ties.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SkyguideError};

/// Opaque identity of whoever issued a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub caller: CallerId,
    pub constellation: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Observation time from the request.
    pub timestamp: DateTime<Utc>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

pub trait ObservationStore: Send + Sync {
    fn append(&self, record: ObservationRecord) -> Result<()>;

    /// Records for `caller`, newest `created_at` first.
    fn history(&self, caller: &CallerId) -> Result<Vec<ObservationRecord>>;
}

/// Stable newest-first ordering over records kept in append order.
fn newest_first(mut records: Vec<ObservationRecord>) -> Vec<ObservationRecord> {
    records.reverse();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

#[derive(Debug, Default)]
pub struct InMemoryObservationStore {
    records: Mutex<Vec<ObservationRecord>>,
}

impl InMemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ObservationStore for InMemoryObservationStore {
    fn append(&self, record: ObservationRecord) -> Result<()> {
        self.records.lock().push(record);
        Ok(())
    }

    fn history(&self, caller: &CallerId) -> Result<Vec<ObservationRecord>> {
        let matching = self
            .records
            .lock()
            .iter()
            .filter(|r| &r.caller == caller)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }
}

/// Append-only file with one JSON object per line.
///
/// Writes are serialized through a mutex so concurrent appends never
/// interleave within a line. Unparseable lines are skipped with a warning when
/// reading history.
#[derive(Debug)]
pub struct JsonLinesObservationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesObservationStore {
    /// Open (creating if needed) the log at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SkyguideError::store(format!("cannot open {}: {e}", path.display())))?;
        info!("Observation log at {}", path.display());
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, action: &str, e: std::io::Error) -> SkyguideError {
        SkyguideError::store(format!("cannot {action} {}: {e}", self.path.display()))
    }
}

impl ObservationStore for JsonLinesObservationStore {
    fn append(&self, record: ObservationRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| SkyguideError::store(format!("cannot encode record: {e}")))?;
        line.push('\n');

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error("open", e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error("write", e))?;
        info!(
            "Recorded {} for {} in {}",
            record.constellation,
            record.caller,
            self.path.display()
        );
        Ok(())
    }

    fn history(&self, caller: &CallerId) -> Result<Vec<ObservationRecord>> {
        let _guard = self.lock.lock();
        let file = File::open(&self.path).map_err(|e| self.io_error("open", e))?;

        let mut matching = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error("read", e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ObservationRecord>(&line) {
                Ok(record) if &record.caller == caller => matching.push(record),
                Ok(_) => {}
                Err(e) => warn!(
                    "Skipping line {} of {}: {}",
                    lineno + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(newest_first(matching))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn record(caller: &str, constellation: &str, created_at: DateTime<Utc>) -> ObservationRecord {
        ObservationRecord {
            caller: CallerId::new(caller),
            constellation: constellation.to_string(),
            latitude: 37.0,
            longitude: -122.0,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 8, 7, 56, 0).unwrap(),
            created_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, 8, 0, 0).unwrap()
    }

    #[test]
    fn in_memory_history_is_newest_first_per_caller() {
        let store = InMemoryObservationStore::new();
        store.append(record("ana", "UMa", t0())).unwrap();
        store.append(record("bo", "Ori", t0() + Duration::seconds(1))).unwrap();
        store.append(record("ana", "Cas", t0() + Duration::seconds(2))).unwrap();
        store.append(record("ana", "Lyr", t0() + Duration::seconds(1))).unwrap();

        let names: Vec<String> = store
            .history(&CallerId::new("ana"))
            .unwrap()
            .into_iter()
            .map(|r| r.constellation)
            .collect();
        assert_eq!(names, vec!["Cas", "Lyr", "UMa"]);
        assert_eq!(store.history(&CallerId::new("bo")).unwrap().len(), 1);
        assert!(store.history(&CallerId::new("cy")).unwrap().is_empty());
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn equal_created_at_puts_later_append_first() {
        let store = InMemoryObservationStore::new();
        store.append(record("ana", "UMa", t0())).unwrap();
        store.append(record("ana", "Cas", t0())).unwrap();
        let history = store.history(&CallerId::new("ana")).unwrap();
        assert_eq!(history[0].constellation, "Cas");
        assert_eq!(history[1].constellation, "UMa");
    }

    #[test]
    fn json_lines_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.jsonl");

        {
            let store = JsonLinesObservationStore::open(&path).unwrap();
            store.append(record("ana", "UMa", t0())).unwrap();
            store.append(record("bo", "Ori", t0() + Duration::seconds(5))).unwrap();
        }

        let store = JsonLinesObservationStore::open(&path).unwrap();
        store.append(record("ana", "Cyg", t0() + Duration::seconds(10))).unwrap();

        let history = store.history(&CallerId::new("ana")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].constellation, "Cyg");
        assert_eq!(history[1], record("ana", "UMa", t0()));
    }

    #[test]
    fn json_lines_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.jsonl");
        let store = JsonLinesObservationStore::open(&path).unwrap();
        store.append(record("ana", "UMa", t0())).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not json").unwrap();
            writeln!(f).unwrap();
        }
        store.append(record("ana", "Cas", t0() + Duration::seconds(1))).unwrap();
        let history = store.history(&CallerId::new("ana")).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn unopenable_path_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesObservationStore::open(dir.path().join("missing/dir/log.jsonl"))
            .unwrap_err();
        assert!(matches!(err, SkyguideError::Store(_)));
    }

    #[test]
    fn caller_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&CallerId::new("ana")).unwrap();
        assert_eq!(json, "\"ana\"");
    }
}
