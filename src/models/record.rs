use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credential::CredentialFields;

/// A persisted extraction: which document it came from, what was found, and
/// when. Records are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub original_filename: String,
    pub file_path: PathBuf,
    pub extracted_data: CredentialFields,
    pub extracted_at: DateTime<Utc>,
}
