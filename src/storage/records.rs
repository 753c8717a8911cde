//! Durable player records.
//!
//! Two integers survive between sessions: the lifetime high score and the
//! record streak. They live under fixed keys so an existing save file keeps
//! loading after upgrades.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::game::state::SessionRecords;

/// Key for the lifetime high score.
pub const HIGH_SCORE_KEY: &str = "coinFlipHighScore";

/// Key for the lifetime record streak.
pub const RECORD_STREAK_KEY: &str = "coinFlipRecordStreak";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("records I/O error: {0}")]
    Io(#[from] io::Error),

    /// Save file could not be encoded.
    #[error("records encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value collaborator for [`SessionRecords`].
pub trait RecordStore {
    /// Read the records. Missing or unreadable values load as 0.
    fn load(&self) -> SessionRecords;

    /// Overwrite the stored records.
    fn save(&self, records: &SessionRecords) -> Result<(), StorageError>;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn load(&self) -> SessionRecords {
        (**self).load()
    }

    fn save(&self, records: &SessionRecords) -> Result<(), StorageError> {
        (**self).save(records)
    }
}

/// In-memory store. Counts writes so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<SessionRecords>,
    writes: AtomicUsize,
}

impl MemoryRecordStore {
    /// Create a store holding `records`.
    pub fn with_records(records: SessionRecords) -> Self {
        Self {
            records: Mutex::new(records),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `save` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self) -> SessionRecords {
        match self.records.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn save(&self, records: &SessionRecords) -> Result<(), StorageError> {
        match self.records.lock() {
            Ok(mut guard) => *guard = *records,
            Err(poisoned) => *poisoned.into_inner() = *records,
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON file holding string-keyed integers.
///
/// Unknown keys in the file are preserved on save.
#[derive(Debug, Clone)]
pub struct JsonFileRecordStore {
    path: PathBuf,
}

impl JsonFileRecordStore {
    /// Store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next save is staged in.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_map(&self) -> BTreeMap<String, Value> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!("Failed to read records from {}: {}", self.path.display(), e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(map) => map,
            Err(e) => {
                warn!("Ignoring malformed records file {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }
}

/// Accepts both numbers and numeric strings, since older saves stored strings.
fn read_counter(map: &BTreeMap<String, Value>, key: &str) -> u32 {
    match map.get(key) {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl RecordStore for JsonFileRecordStore {
    fn load(&self) -> SessionRecords {
        let map = self.read_map();
        let records = SessionRecords {
            high_score: read_counter(&map, HIGH_SCORE_KEY),
            record_streak: read_counter(&map, RECORD_STREAK_KEY),
        };
        debug!(?records, "Loaded records from {}", self.path.display());
        records
    }

    fn save(&self, records: &SessionRecords) -> Result<(), StorageError> {
        let mut map = self.read_map();
        map.insert(HIGH_SCORE_KEY.to_string(), Value::from(records.high_score));
        map.insert(RECORD_STREAK_KEY.to_string(), Value::from(records.record_streak));

        // Stage then rename so a torn write never replaces good records.
        let text = serde_json::to_string_pretty(&map)?;
        let staging = self.staging_path();
        fs::write(&staging, text)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
