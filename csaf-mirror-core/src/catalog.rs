//! Dataset catalog: enumerate, size, re-synchronise and delete locally
//! cached datasets.
//!
//! Batch operations iterate one dataset at a time and collect per-item
//! failures as typed `(dataset, error)` pairs instead of aborting on the
//! first one.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::config::CacheConfig;
use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::metadata;
use crate::sync::{sync_directory, SyncReport};

/// One locally cached dataset. Derived on demand, never persisted.
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Outcome of `sync_all`: successful reports plus per-dataset failures.
#[derive(Debug)]
pub struct SyncAllOutcome {
    pub reports: Vec<SyncReport>,
    pub failures: Vec<(String, SyncError)>,
}

/// Outcome of `clear_all`: removed dataset names plus per-dataset failures.
#[derive(Debug)]
pub struct ClearAllOutcome {
    pub removed: Vec<String>,
    pub failures: Vec<(String, SyncError)>,
}

/// Enumerate cached datasets with their computed sizes, sorted by name.
/// A missing cache root is an empty catalog, not an error.
pub fn list_datasets(config: &CacheConfig) -> Result<Vec<DatasetRecord>, SyncError> {
    if !config.root.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    let entries = fs::read_dir(&config.root).map_err(|e| SyncError::storage(&config.root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::storage(&config.root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let size_bytes = directory_size(&path);
        records.push(DatasetRecord {
            name,
            path,
            size_bytes,
        });
    }

    records.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(records)
}

/// Total size of all regular files under a dataset directory.
/// A failed walk reports zero rather than failing the whole listing.
fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Resolve the original source URL of a cached dataset from its metadata
/// record. Distinguishes a missing dataset from a missing record.
pub fn source_url(config: &CacheConfig, name: &str) -> Result<String, SyncError> {
    let path = config.dataset_path(name);
    if !path.is_dir() {
        return Err(SyncError::NotFound(name.to_string()));
    }
    match metadata::load(&path)? {
        Some(meta) => Ok(meta.source_url),
        None => Err(SyncError::NoMetadata(name.to_string())),
    }
}

/// Delete one cached dataset.
pub fn clear_dataset(config: &CacheConfig, name: &str) -> Result<(), SyncError> {
    let path = config.dataset_path(name);
    if !path.is_dir() {
        return Err(SyncError::NotFound(name.to_string()));
    }
    fs::remove_dir_all(&path).map_err(|e| SyncError::storage(&path, e))?;
    info!(dataset = name, "cleared cached dataset");
    Ok(())
}

/// Delete every cached dataset, collecting per-dataset failures.
pub fn clear_all(config: &CacheConfig) -> Result<ClearAllOutcome, SyncError> {
    let mut removed = Vec::new();
    let mut failures = Vec::new();

    for record in list_datasets(config)? {
        match clear_dataset(config, &record.name) {
            Ok(()) => removed.push(record.name),
            Err(e) => {
                error!(dataset = %record.name, error = %e, "failed to clear dataset");
                failures.push((record.name, e));
            }
        }
    }

    Ok(ClearAllOutcome { removed, failures })
}

/// Re-synchronise every cached dataset from its recorded source URL,
/// sequentially, collecting per-dataset failures.
pub async fn sync_all<F>(fetcher: &F, config: &CacheConfig) -> Result<SyncAllOutcome, SyncError>
where
    F: Fetcher + ?Sized,
{
    let mut reports = Vec::new();
    let mut failures = Vec::new();

    for record in list_datasets(config)? {
        let url = match source_url(config, &record.name) {
            Ok(url) => url,
            Err(e) => {
                warn!(dataset = %record.name, error = %e, "dataset has no usable source URL");
                failures.push((record.name, e));
                continue;
            }
        };
        match sync_directory(fetcher, config, &url).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(dataset = %record.name, error = %e, "dataset sync failed");
                failures.push((record.name, e));
            }
        }
    }

    Ok(SyncAllOutcome { reports, failures })
}
