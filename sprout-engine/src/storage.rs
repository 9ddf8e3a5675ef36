//! # Watering record storage
//!
//! The only durable state is one line per plant: the date it was last
//! watered, written as `MM/DD/YYYY`. Records are keyed by plant name.

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Calendar format of a persisted watering date
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Suffix appended to the plant name to form the record file name
const RECORD_SUFFIX: &str = "_water_data.txt";

/// Format a watering time for storage. Only the calendar date survives.
pub fn format_date(at: NaiveDateTime) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Parse a stored watering date. The time of day is midnight.
pub fn parse_date(line: &str) -> Result<NaiveDateTime> {
    let line = line.trim();
    let date = NaiveDate::parse_from_str(line, DATE_FORMAT).map_err(|e| {
        Error::parse_failed(format!("'{}' is not a MM/DD/YYYY date", line)).set_source(e)
    })?;
    date.and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::parse_failed(format!("'{}' has no midnight", line)))
}

/// Backend holding last-watered records
pub trait WateringStore: Send {
    fn name(&self) -> &'static str;

    /// Stored line for `plant`, or `None` if the plant has no record.
    fn load(&self, plant: &str) -> Result<Option<String>>;

    /// Replace the record for `plant`.
    fn save(&mut self, plant: &str, line: &str) -> Result<()>;
}

/// In-memory records. Clones share the same records, which lets a second
/// engine instance "restart" against what the first one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record directly, bypassing date formatting.
    pub fn insert(&self, plant: &str, line: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(plant.to_string(), line.to_string());
        }
    }
}

impl WateringStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self, plant: &str) -> Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::persistence_load(plant, "record map poisoned"))?;
        Ok(records.get(plant).cloned())
    }

    fn save(&mut self, plant: &str, line: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::persistence_write(plant, "record map poisoned"))?;
        records.insert(plant.to_string(), line.to_string());
        Ok(())
    }
}

/// One text file per plant under a base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path).map_err(|e| {
            Error::from(e)
                .with_operation("storage::new")
                .with_context("path", base_path.display().to_string())
        })?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the record file for `plant`
    pub fn record_path(&self, plant: &str) -> PathBuf {
        let safe_name = plant.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.base_path.join(format!("{}{}", safe_name, RECORD_SUFFIX))
    }
}

impl WateringStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self, plant: &str) -> Result<Option<String>> {
        let path = self.record_path(plant);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::persistence_load(plant, format!("failed to read {}", path.display()))
                .with_operation("storage::load")
                .set_source(e)
        })?;
        Ok(Some(content.lines().next().unwrap_or("").trim().to_string()))
    }

    fn save(&mut self, plant: &str, line: &str) -> Result<()> {
        let path = self.record_path(plant);
        let tmp_path = path.with_extension("txt.tmp");

        replace_synced(&tmp_path, &path, line).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            Error::persistence_write(plant, format!("failed to write {}", path.display()))
                .with_operation("storage::save")
                .set_source(e)
        })
    }
}

/// Write `line` to `tmp_path`, flush it to disk, then rename it over `path`.
///
/// The record is either the old line or the new one after a power cut,
/// never empty.
fn replace_synced(tmp_path: &Path, path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(line.as_bytes())?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp_path, path)?;

    // Persist the rename too; not every platform can open a directory.
    if let Some(dir) = path.parent() {
        if let Ok(dir) = File::open(dir) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_date_format() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(17, 45, 3)
            .unwrap();
        assert_eq!(format_date(at), "03/09/2024");

        let parsed = parse_date("03/09/2024\n").unwrap();
        assert_eq!(parsed.date(), at.date());
        assert_eq!(parsed.time(), chrono::NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_other_formats() {
        for bad in ["2024-03-09", "13/01/2024", "yesterday", ""] {
            let err = parse_date(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ParseFailed, "input {:?}", bad);
        }
    }

    #[test]
    fn test_memory_store_clones_share_records() {
        let store = MemoryStore::new();
        let mut writer = store.clone();

        assert_eq!(store.load("fern").unwrap(), None);
        writer.save("fern", "01/02/2024").unwrap();
        assert_eq!(store.load("fern").unwrap(), Some("01/02/2024".to_string()));
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path()).unwrap();

        assert_eq!(store.load("MyPothos").unwrap(), None);

        store.save("MyPothos", "03/09/2024").unwrap();
        store.save("MyPothos", "03/10/2024").unwrap();

        let path = temp_dir.path().join("MyPothos_water_data.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "03/10/2024");
        assert_eq!(store.load("MyPothos").unwrap(), Some("03/10/2024".to_string()));
        assert!(!path.with_extension("txt.tmp").exists());
    }

    #[test]
    fn test_file_store_reads_first_line_only() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        std::fs::write(store.record_path("ivy"), "  04/01/2024 \nleftover\n").unwrap();

        assert_eq!(store.load("ivy").unwrap(), Some("04/01/2024".to_string()));
    }

    #[test]
    fn test_record_path_is_sanitized() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path()).unwrap();
        let path = store.record_path("../evil:plant");

        assert_eq!(path.parent().unwrap(), temp_dir.path());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            ".._evil_plant_water_data.txt"
        );
    }

    #[test]
    fn test_file_store_replaces_stale_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path()).unwrap();
        let path = store.record_path("MyPothos");
        let tmp_path = path.with_extension("txt.tmp");
        std::fs::write(&tmp_path, "left over from a crash mid-write").unwrap();

        store.save("MyPothos", "03/10/2024").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "03/10/2024");
        assert!(!tmp_path.exists());
    }

    #[test]
    fn test_failed_save_keeps_previous_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path()).unwrap();
        store.save("MyPothos", "03/09/2024").unwrap();
        // A directory at the temp path makes the write fail before the rename.
        std::fs::create_dir(store.record_path("MyPothos").with_extension("txt.tmp")).unwrap();

        let err = store.save("MyPothos", "03/10/2024").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceWriteFailed);
        assert_eq!(store.load("MyPothos").unwrap(), Some("03/09/2024".to_string()));
    }

    #[test]
    fn test_file_store_write_failure() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = FileStore::new(temp_dir.path()).unwrap();
        // A directory where the record file should be makes the rename fail.
        std::fs::create_dir(store.record_path("blocked")).unwrap();

        let err = store.save("blocked", "03/10/2024").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceWriteFailed);
        assert!(err.source_ref().is_some());
    }
}
