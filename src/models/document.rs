use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MediaKind;

/// A file handed to the pipeline for one extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Uuid,
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self::with_id(Uuid::new_v4(), path, kind)
    }

    pub fn with_id(id: Uuid, path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            id,
            path: path.into(),
            kind,
        }
    }
}
