//! Upload intake: accept a credential file, keep a copy under a fresh id,
//! run the pipeline on it and persist the record.
//!
//! The stored copy never outlives a failed intake.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ExtractionResult, MediaKind, SourceDocument, ALLOWED_EXTENSIONS};
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::processor::CredentialProcessor;
use crate::store::{ExtractionStore, StoreError};

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Unsupported file type '{extension}'. Allowed: {}", ALLOWED_EXTENSIONS.join(", "))]
    UnsupportedFileType { extension: String },

    #[error("Upload has no file name")]
    MissingFileName,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Could not save extraction record: {0}")]
    Store(#[from] StoreError),
}

pub struct CredentialIntake {
    processor: CredentialProcessor,
    store: Box<dyn ExtractionStore>,
    uploads_dir: PathBuf,
}

impl CredentialIntake {
    pub fn new(
        processor: CredentialProcessor,
        store: Box<dyn ExtractionStore>,
        uploads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            processor,
            store,
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn store(&self) -> &dyn ExtractionStore {
        self.store.as_ref()
    }

    /// Ingest a file from disk. The source is copied, never moved.
    pub fn ingest(&self, source: &Path) -> Result<ExtractionResult, IntakeError> {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(IntakeError::MissingFileName)?;
        self.accept(filename, |target| fs::copy(source, target).map(|_| ()))
    }

    /// Ingest uploaded bytes under their client-supplied file name.
    pub fn ingest_bytes(&self, filename: &str, bytes: &[u8]) -> Result<ExtractionResult, IntakeError> {
        self.accept(filename, |target| fs::write(target, bytes))
    }

    /// Delete a record and its stored upload. Returns whether a record existed.
    pub fn remove(&self, document_id: &Uuid) -> Result<bool, IntakeError> {
        remove_record(self.store.as_ref(), document_id)
    }

    fn accept(
        &self,
        filename: &str,
        write_copy: impl FnOnce(&Path) -> std::io::Result<()>,
    ) -> Result<ExtractionResult, IntakeError> {
        let original_filename = sanitize_filename(filename).ok_or(IntakeError::MissingFileName)?;
        let extension = Path::new(&original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let kind = MediaKind::from_extension(&extension).ok_or_else(|| {
            IntakeError::UnsupportedFileType {
                extension: extension.clone(),
            }
        })?;

        let document_id = Uuid::new_v4();
        fs::create_dir_all(&self.uploads_dir)?;
        let stored_path = self.uploads_dir.join(format!("{document_id}.{extension}"));
        let outcome = write_copy(&stored_path)
            .map_err(IntakeError::from)
            .and_then(|()| {
                tracing::info!(
                    document_id = %document_id,
                    file = %original_filename,
                    kind = kind.as_str(),
                    "Credential upload stored"
                );
                let document = SourceDocument::with_id(document_id, &stored_path, kind);
                let record = self.processor.process(&document, &original_filename)?;
                self.store.save(&record)?;
                Ok(record)
            });

        if let Err(e) = &outcome {
            tracing::warn!(
                document_id = %document_id,
                error = %e,
                "Intake failed, removing stored upload"
            );
            match fs::remove_file(&stored_path) {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
                Err(cleanup) => tracing::error!(
                    path = %stored_path.display(),
                    error = %cleanup,
                    "Failed to remove stored upload"
                ),
            }
        }
        outcome
    }
}

/// Delete a record from `store` together with the upload it points at.
/// An upload that is already gone is not an error.
pub fn remove_record(store: &dyn ExtractionStore, document_id: &Uuid) -> Result<bool, IntakeError> {
    let Some(record) = store.get(document_id)? else {
        return Ok(false);
    };
    match fs::remove_file(&record.file_path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(store.delete(document_id)?)
}

/// Last path component of a client-supplied name, without separators or
/// NUL bytes, capped at 255 characters.
fn sanitize_filename(original: &str) -> Option<String> {
    let name = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let clean: String = name.chars().filter(|c| *c != '\0').take(255).collect();
    let clean = clean.trim();
    (!clean.is_empty() && clean != "." && clean != "..").then(|| clean.to_string())
}
