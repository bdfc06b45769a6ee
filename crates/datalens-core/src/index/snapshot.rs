//! Index snapshot persistence
//!
//! One JSON file per index instance holding the full document table.
//! A missing file is not an error; a present-but-unreadable file is a
//! loud `CorruptSnapshot`.

use super::Document;
use crate::error::{DataLensError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub(crate) const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot format
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub version: u32,
    pub dimension: Option<usize>,
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Validate internal consistency before the snapshot replaces live state
    pub(crate) fn validate(&self, path: &Path) -> Result<()> {
        let corrupt = |reason: String| DataLensError::CorruptSnapshot {
            path: path.display().to_string(),
            reason,
        };

        if self.version != SNAPSHOT_VERSION {
            return Err(corrupt(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for doc in &self.documents {
            if !seen.insert(doc.id.as_str()) {
                return Err(corrupt(format!("duplicate document id '{}'", doc.id)));
            }
            match self.dimension {
                Some(dim) if doc.embedding.len() != dim => {
                    return Err(corrupt(format!(
                        "document '{}' has dimension {}, expected {}",
                        doc.id,
                        doc.embedding.len(),
                        dim
                    )));
                }
                None if !self.documents.is_empty() => {
                    return Err(corrupt("dimension missing for non-empty corpus".into()));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Write a snapshot, creating parent directories as needed
pub(crate) fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a snapshot. `Ok(None)` when the file does not exist.
pub(crate) fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read(path)?;
    let snapshot: Snapshot =
        serde_json::from_slice(&content).map_err(|e| DataLensError::CorruptSnapshot {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    snapshot.validate(path)?;
    Ok(Some(snapshot))
}
