//! Extraction record store.
//!
//! Records are write-once: saving an id that already exists is rejected, and
//! the only other mutation is deletion.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use uuid::Uuid;

use crate::models::ExtractionResult;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record already exists: {0}")]
    Duplicate(Uuid),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Persistence boundary for extraction records.
pub trait ExtractionStore: Send + Sync {
    /// Persist a new record. Fails with `Duplicate` if the id is taken.
    fn save(&self, record: &ExtractionResult) -> Result<(), StoreError>;

    fn get(&self, document_id: &Uuid) -> Result<Option<ExtractionResult>, StoreError>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<ExtractionResult>, StoreError>;

    /// Remove a record. Returns whether anything was removed.
    fn delete(&self, document_id: &Uuid) -> Result<bool, StoreError>;
}

fn newest_first(records: &mut [ExtractionResult]) {
    records.sort_by(|a, b| {
        b.extracted_at
            .cmp(&a.extracted_at)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
}

// ═══════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════

/// Process-local store for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, ExtractionResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExtractionStore for MemoryStore {
    fn save(&self, record: &ExtractionResult) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        if records.contains_key(&record.document_id) {
            return Err(StoreError::Duplicate(record.document_id));
        }
        records.insert(record.document_id, record.clone());
        Ok(())
    }

    fn get(&self, document_id: &Uuid) -> Result<Option<ExtractionResult>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(document_id).cloned())
    }

    fn list(&self) -> Result<Vec<ExtractionResult>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut all: Vec<_> = records.values().cloned().collect();
        newest_first(&mut all);
        Ok(all)
    }

    fn delete(&self, document_id: &Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.remove(document_id).is_some())
    }
}

// ═══════════════════════════════════════════════════════════
// JSON directory
// ═══════════════════════════════════════════════════════════

/// One pretty-printed JSON file per record: `<dir>/<document_id>.json`.
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, document_id: &Uuid) -> PathBuf {
        self.dir.join(format!("{document_id}.json"))
    }
}

impl ExtractionStore for JsonDirStore {
    fn save(&self, record: &ExtractionResult) -> Result<(), StoreError> {
        let path = self.record_path(&record.document_id);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Duplicate(record.document_id));
            }
            Err(e) => return Err(e.into()),
        };

        let mut writer = BufWriter::new(file);
        let written = serde_json::to_writer_pretty(&mut writer, record)
            .map_err(StoreError::from)
            .and_then(|_| writer.flush().map_err(StoreError::from));
        if let Err(e) = written {
            // Never leave a half-written record behind.
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        tracing::debug!(
            document_id = %record.document_id,
            path = %path.display(),
            "Extraction record saved"
        );
        Ok(())
    }

    fn get(&self, document_id: &Uuid) -> Result<Option<ExtractionResult>, StoreError> {
        match fs::read(self.record_path(document_id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<ExtractionResult>, StoreError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from));
            match parsed {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable extraction record"
                ),
            }
        }
        newest_first(&mut records);
        Ok(records)
    }

    fn delete(&self, document_id: &Uuid) -> Result<bool, StoreError> {
        match fs::remove_file(self.record_path(document_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
