//! Period history persistence with file locking.
//!
//! The log is a single JSON document. Reads take a shared lock; writes go
//! to a locked temp file in the same directory that is renamed over
//! the previous file. A crash never leaves a half-written history.

use crate::{Error, PeriodRecord, Result};
use chrono::Local;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// File name of the history inside the data directory
pub const HISTORY_FILE: &str = "periods.json";

/// Every logged period
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PeriodLog {
    #[serde(default)]
    pub records: Vec<PeriodRecord>,
}

/// What the history file held when it was read
enum Snapshot {
    Missing,
    /// Parsed document; `skipped` records couldn't be read and were left out
    Parsed { log: PeriodLog, skipped: usize },
    Unparseable(serde_json::Error),
}

/// On-disk shape, with each record kept raw so one bad entry can't sink the rest
#[derive(Deserialize)]
struct StoredLog {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::Missing);
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    let stored = match serde_json::from_str::<StoredLog>(&contents) {
        Ok(stored) => stored,
        Err(e) => return Ok(Snapshot::Unparseable(e)),
    };

    let mut log = PeriodLog::default();
    let mut skipped = 0;
    for (idx, raw) in stored.records.into_iter().enumerate() {
        match serde_json::from_value::<PeriodRecord>(raw) {
            Ok(record) => log.records.push(record),
            Err(e) => {
                tracing::warn!("Skipping unreadable record #{} in {:?}: {}", idx, path, e);
                skipped += 1;
            }
        }
    }
    Ok(Snapshot::Parsed { log, skipped })
}

/// Copy a damaged history next to itself before it gets overwritten.
fn set_aside(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| HISTORY_FILE.to_string());
    let stamp = Local::now().format("%Y%m%dT%H%M%S");
    let backup = path.with_file_name(format!("{}.corrupt-{}", file_name, stamp));

    std::fs::copy(path, &backup)?;
    tracing::warn!("Kept a copy of the damaged history at {:?}", backup);
    Ok(backup)
}

impl PeriodLog {
    /// Load the log from a file with shared locking
    ///
    /// Returns an empty log if the file doesn't exist.
    /// Records that can't be read are skipped. If the whole file is
    /// unreadable or corrupted, logs a warning and returns an empty log.
    pub fn load(path: &Path) -> Result<Self> {
        match read_snapshot(path) {
            Ok(Snapshot::Missing) => {
                tracing::info!("No history file at {:?}, starting empty", path);
                Ok(Self::default())
            }
            Ok(Snapshot::Parsed { log, skipped }) => {
                if skipped > 0 {
                    tracing::warn!("{} record(s) in {:?} could not be read", skipped, path);
                }
                tracing::debug!("Loaded {} period(s) from {:?}", log.records.len(), path);
                Ok(log)
            }
            Ok(Snapshot::Unparseable(e)) => {
                tracing::warn!("Failed to parse history {:?}: {}. Starting empty.", path, e);
                Ok(Self::default())
            }
            Err(e) => {
                tracing::warn!("Unable to read history {:?}: {}. Starting empty.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save the log atomically with exclusive locking
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "history path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} period(s) to {:?}", self.records.len(), path);
        Ok(())
    }

    /// Load, modify and save back
    ///
    /// Unlike `load`, an unreadable file is an error here. A file that parses
    /// only partly, or not at all, is copied to `<name>.corrupt-<timestamp>`
    /// before the readable records are written back.
    pub fn update<F, T>(path: &Path, f: F) -> Result<T>
    where
        F: FnOnce(&mut PeriodLog) -> Result<T>,
    {
        let mut log = match read_snapshot(path)? {
            Snapshot::Missing => Self::default(),
            Snapshot::Parsed { log, skipped: 0 } => log,
            Snapshot::Parsed { log, skipped } => {
                tracing::warn!("{} record(s) in {:?} could not be read", skipped, path);
                set_aside(path)?;
                log
            }
            Snapshot::Unparseable(e) => {
                tracing::warn!("Failed to parse history {:?}: {}", path, e);
                set_aside(path)?;
                Self::default()
            }
        };
        let out = f(&mut log)?;
        log.save(path)?;
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a record. Ids are never reused, so a duplicate id is rejected.
    pub fn add(&mut self, record: PeriodRecord) -> Result<Uuid> {
        if self.get(record.id).is_some() {
            return Err(Error::Store(format!("record {} already exists", record.id)));
        }
        let id = record.id;
        self.records.push(record);
        tracing::info!("Added period {}", id);
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Option<&PeriodRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut PeriodRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<PeriodRecord> {
        let idx = self.records.iter().position(|r| r.id == id)?;
        tracing::info!("Removed period {}", id);
        Some(self.records.remove(idx))
    }

    /// Resolve a record from a full id or a unique prefix of one
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Uuid> {
        let needle = prefix.trim().to_lowercase();
        if needle.is_empty() {
            return Err(Error::InvalidInput("empty record id".into()));
        }

        let matches: Vec<Uuid> = self
            .records
            .iter()
            .map(|r| r.id)
            .filter(|id| id.to_string().starts_with(&needle))
            .collect();

        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(Error::RecordNotFound(format!("no record matches '{}'", prefix))),
            _ => Err(Error::InvalidInput(format!(
                "'{}' matches {} records, use more characters",
                prefix,
                matches.len()
            ))),
        }
    }

    /// Snapshot ordered by start date, most recent first
    pub fn history(&self) -> Vec<PeriodRecord> {
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FlowLevel, Symptom};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);

        let mut log = PeriodLog::default();
        let id = log
            .add(
                PeriodRecord::new(at(2024, 1, 1))
                    .with_end(at(2024, 1, 5))
                    .with_flow(FlowLevel::Heavy)
                    .with_symptoms([Symptom::Cramps])
                    .with_notes("rough one"),
            )
            .unwrap();
        log.save(&path).unwrap();

        let loaded = PeriodLog::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        let record = loaded.get(id).unwrap();
        assert_eq!(record.flow, FlowLevel::Heavy);
        assert!(record.symptoms.contains(&Symptom::Cramps));
        assert_eq!(record.notes, "rough one");
        assert_eq!(record.end_date, Some(at(2024, 1, 5)));
    }

    #[test]
    fn test_load_nonexistent_returns_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = PeriodLog::load(&temp_dir.path().join("missing.json")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn test_corrupted_history_returns_empty() {
        crate::logging::init_test();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);
        std::fs::write(&path, "{ invalid json }").unwrap();

        let log = PeriodLog::load(&path).unwrap();
        assert!(log.is_empty());
    }

    const PARTLY_DAMAGED: &str = r#"{
  "records": [
    {"id": "11111111-0000-4000-8000-000000000001", "start_date": "2024-01-01T08:00:00"},
    {"id": "11111111-0000-4000-8000-000000000002", "start_date": "2024-01-29T08:00:00", "flow": "Heavy"},
    {"id": "11111111-0000-4000-8000-000000000003", "start_date": "2024-02-26T08:00:00",
     "flow": null, "symptoms": ["Cramps", 7]},
    {"id": "11111111-0000-4000-8000-000000000004", "start_date": "yesterday"},
    {"start_date": "2024-03-25T08:00:00"}
  ]
}"#;

    fn backups(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with("periods.json.corrupt-"))
                    .unwrap_or(false)
            })
            .collect()
    }

    #[test]
    fn test_bad_records_do_not_hide_good_ones() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);
        std::fs::write(&path, PARTLY_DAMAGED).unwrap();

        let log = PeriodLog::load(&path).unwrap();
        assert_eq!(log.len(), 3);
        let lenient = log
            .get(Uuid::parse_str("11111111-0000-4000-8000-000000000003").unwrap())
            .unwrap();
        assert_eq!(lenient.flow, FlowLevel::Medium);
        assert_eq!(lenient.symptoms.len(), 1);
    }

    #[test]
    fn test_update_keeps_readable_records_and_a_backup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);
        std::fs::write(&path, PARTLY_DAMAGED).unwrap();

        PeriodLog::update(&path, |log| log.add(PeriodRecord::new(at(2024, 3, 25)))).unwrap();

        assert_eq!(PeriodLog::load(&path).unwrap().len(), 4);

        let saved = backups(temp_dir.path());
        assert_eq!(saved.len(), 1);
        assert_eq!(std::fs::read_to_string(&saved[0]).unwrap(), PARTLY_DAMAGED);
    }

    #[test]
    fn test_update_over_unparseable_file_keeps_a_backup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);
        std::fs::write(&path, "{ invalid json }").unwrap();

        PeriodLog::update(&path, |log| log.add(PeriodRecord::new(at(2024, 3, 25)))).unwrap();

        assert_eq!(PeriodLog::load(&path).unwrap().len(), 1);
        let saved = backups(temp_dir.path());
        assert_eq!(saved.len(), 1);
        assert_eq!(std::fs::read_to_string(&saved[0]).unwrap(), "{ invalid json }");
    }

    #[test]
    fn test_clean_update_makes_no_backup() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);

        PeriodLog::update(&path, |log| log.add(PeriodRecord::new(at(2024, 1, 1)))).unwrap();
        PeriodLog::update(&path, |log| log.add(PeriodRecord::new(at(2024, 1, 29)))).unwrap();

        assert!(backups(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_update_pattern() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);

        let id = PeriodLog::update(&path, |log| log.add(PeriodRecord::new(at(2024, 2, 1)))).unwrap();

        PeriodLog::update(&path, |log| {
            let record = log
                .get_mut(id)
                .ok_or_else(|| Error::Store("missing".into()))?;
            record.end_date = Some(at(2024, 2, 4));
            Ok(())
        })
        .unwrap();

        let loaded = PeriodLog::load(&path).unwrap();
        assert_eq!(loaded.get(id).unwrap().end_date, Some(at(2024, 2, 4)));
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(HISTORY_FILE);

        PeriodLog::default().save(&path).unwrap();

        assert!(path.exists());
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != HISTORY_FILE)
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }

    #[test]
    fn test_history_is_newest_first() {
        let mut log = PeriodLog::default();
        log.add(PeriodRecord::new(at(2024, 1, 1))).unwrap();
        log.add(PeriodRecord::new(at(2024, 2, 26))).unwrap();
        log.add(PeriodRecord::new(at(2024, 1, 29))).unwrap();

        let starts: Vec<_> = log.history().iter().map(|r| r.start_date).collect();
        assert_eq!(starts, vec![at(2024, 2, 26), at(2024, 1, 29), at(2024, 1, 1)]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut log = PeriodLog::default();
        let record = PeriodRecord::new(at(2024, 1, 1));
        log.add(record.clone()).unwrap();
        assert!(log.add(record).is_err());
    }

    #[test]
    fn test_remove() {
        let mut log = PeriodLog::default();
        let id = log.add(PeriodRecord::new(at(2024, 1, 1))).unwrap();

        assert!(log.remove(id).is_some());
        assert!(log.remove(id).is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_find_by_prefix() {
        let mut log = PeriodLog::default();
        let mut a = PeriodRecord::new(at(2024, 1, 1));
        a.id = Uuid::parse_str("aaaa1111-0000-4000-8000-000000000000").unwrap();
        let mut b = PeriodRecord::new(at(2024, 1, 29));
        b.id = Uuid::parse_str("aaaa2222-0000-4000-8000-000000000000").unwrap();
        log.add(a.clone()).unwrap();
        log.add(b.clone()).unwrap();

        assert_eq!(log.find_by_prefix("aaaa1").unwrap(), a.id);
        assert_eq!(log.find_by_prefix("AAAA2222").unwrap(), b.id);
        assert!(matches!(log.find_by_prefix("aaaa"), Err(Error::InvalidInput(_))));
        assert!(matches!(log.find_by_prefix("ffff"), Err(Error::RecordNotFound(_))));
        assert!(log.find_by_prefix("").is_err());
    }
}
