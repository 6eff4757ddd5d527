//! Per-dataset sync metadata: the record that makes the incremental-vs-full
//! decision possible on the next invocation.
//!
//! One `metadata.json` per dataset directory, written only after a successful
//! sync and always fully overwritten, never merged.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

pub const METADATA_FILE: &str = "metadata.json";

/// Cached metadata older than this forces a full sync.
const FRESHNESS_WINDOW_DAYS: i64 = 21;

pub fn freshness_window() -> Duration {
    Duration::days(FRESHNESS_WINDOW_DAYS)
}

/// Tracks when a dataset was last synchronised and from where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub last_sync: DateTime<Utc>,
    pub source_url: String,
}

/// Read the metadata record from a dataset directory.
/// An absent record is not an error; unreadable or malformed records are.
pub fn load(dataset_dir: &Path) -> Result<Option<SyncMetadata>, SyncError> {
    let path = dataset_dir.join(METADATA_FILE);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SyncError::storage(&path, e)),
    };

    let metadata = serde_json::from_slice(&data).map_err(|e| SyncError::Parse {
        context: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(metadata))
}

/// Write the metadata record, fully replacing any prior content.
pub fn save(dataset_dir: &Path, metadata: &SyncMetadata) -> Result<(), SyncError> {
    let path = dataset_dir.join(METADATA_FILE);
    let data = serde_json::to_string_pretty(metadata).map_err(|e| SyncError::Parse {
        context: path.display().to_string(),
        source: e,
    })?;
    fs::write(&path, data).map_err(|e| SyncError::storage(&path, e))
}

/// Check whether the cached dataset is still fresh.
///
/// Valid iff a record exists and `now - last_sync` is under the freshness
/// window. An expired record is still returned so callers can report the
/// previous sync time and reuse the source URL.
pub fn validity(dataset_dir: &Path) -> Result<(bool, Option<SyncMetadata>), SyncError> {
    validity_at(dataset_dir, Utc::now())
}

pub fn validity_at(
    dataset_dir: &Path,
    now: DateTime<Utc>,
) -> Result<(bool, Option<SyncMetadata>), SyncError> {
    let Some(metadata) = load(dataset_dir)? else {
        return Ok((false, None));
    };

    // Exclusive-stale boundary: a record exactly at the window edge is valid.
    let cutoff = now - freshness_window();
    if metadata.last_sync < cutoff {
        return Ok((false, Some(metadata)));
    }
    Ok((true, Some(metadata)))
}
