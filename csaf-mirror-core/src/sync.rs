//! High-level orchestration: decide, per remote directory, between an
//! incremental update and a full re-fetch, run the chosen strategy and
//! persist sync metadata on success.
//!
//! The decision is made purely from local cache age before touching the
//! network: a valid (under 21 days old) metadata record selects the
//! incremental path, anything else selects a full sync. Only one network
//! round-trip commits to a strategy.
//!
//! # Error Handling
//! Fail-fast: any unrecovered error aborts the invocation without writing
//! metadata, so the previously persisted record (if any) stays authoritative
//! for the next run. A broken change log never silently degrades to a full
//! sync.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::changelog;
use crate::config::CacheConfig;
use crate::download::{
    fetch_archive, fetch_files, join_url, sanitize_directory_name, ARCHIVE_POINTER_FILE,
    CHANGES_FILE, INDEX_FILE,
};
use crate::error::SyncError;
use crate::fetch::Fetcher;
use crate::metadata::{self, SyncMetadata};

/// What a successful sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Valid cache: only files changed since the last sync were fetched.
    /// `updated == 0` means the upstream published no changes.
    Incremental { updated: usize },
    /// Full sync via the advertised archive.
    FullArchive,
    /// Full sync via the `index.txt` listing fallback.
    FullListing { files: usize },
}

/// Report returned from a successful sync of one directory URL.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub dataset: String,
    pub path: PathBuf,
    pub outcome: SyncOutcome,
}

/// Synchronise one remote directory into the local cache.
pub async fn sync_directory<F>(
    fetcher: &F,
    config: &CacheConfig,
    directory_url: &str,
) -> Result<SyncReport, SyncError>
where
    F: Fetcher + ?Sized,
{
    let cache_root = config.ensure_root()?;
    let dataset = sanitize_directory_name(directory_url);
    let target = cache_root.join(&dataset);
    fs::create_dir_all(&target).map_err(|e| SyncError::storage(&target, e))?;

    let (valid, previous) = metadata::validity(&target)?;

    let outcome = match previous {
        Some(prev) if valid => {
            info!(
                dataset = %dataset,
                last_sync = %prev.last_sync.to_rfc3339(),
                "valid cache found, performing incremental update"
            );
            let updated = incremental_update(fetcher, directory_url, &target, prev.last_sync).await?;
            SyncOutcome::Incremental { updated }
        }
        previous => {
            match &previous {
                Some(prev) => info!(
                    dataset = %dataset,
                    last_sync = %prev.last_sync.to_rfc3339(),
                    "cache is stale, performing full download"
                ),
                None => info!(dataset = %dataset, "no cache found, performing full download"),
            }
            full_download(fetcher, directory_url, &target).await?
        }
    };

    // Persisted even when the incremental change set was empty, so an
    // unchanged upstream is not re-checked against an expired timestamp
    // forever.
    metadata::save(
        &target,
        &SyncMetadata {
            last_sync: Utc::now(),
            source_url: directory_url.to_string(),
        },
    )?;

    info!(dataset = %dataset, outcome = ?outcome, "sync completed");
    Ok(SyncReport {
        dataset,
        path: target,
        outcome,
    })
}

/// Fetch the change log and download exactly the files whose logged
/// modification time is strictly after `last_sync`.
async fn incremental_update<F>(
    fetcher: &F,
    directory_url: &str,
    target: &Path,
    last_sync: DateTime<Utc>,
) -> Result<usize, SyncError>
where
    F: Fetcher + ?Sized,
{
    let changes_url = join_url(directory_url, CHANGES_FILE);
    let data = fetcher.fetch(&changes_url).await?;
    let changes = changelog::parse_changes_csv(&data)?;

    let mut changed: Vec<String> = changes
        .into_iter()
        .filter(|(_, timestamp)| *timestamp > last_sync)
        .map(|(path, _)| path)
        .collect();

    if changed.is_empty() {
        info!("no files have changed since last sync");
        return Ok(0);
    }
    changed.sort();

    info!(files = changed.len(), "found files to update");
    fetch_files(fetcher, directory_url, &changed, target).await
}

/// Replace the dataset wholesale: clear the directory, then either unpack
/// the advertised archive or fetch every file named by `index.txt`.
async fn full_download<F>(
    fetcher: &F,
    directory_url: &str,
    target: &Path,
) -> Result<SyncOutcome, SyncError>
where
    F: Fetcher + ?Sized,
{
    // Full sync never merges with prior incremental state.
    fs::remove_dir_all(target).map_err(|e| SyncError::storage(target, e))?;
    fs::create_dir_all(target).map_err(|e| SyncError::storage(target, e))?;

    let pointer_url = join_url(directory_url, ARCHIVE_POINTER_FILE);
    match fetcher.fetch_optional(&pointer_url).await? {
        Some(pointer) => {
            let archive_name = String::from_utf8_lossy(&pointer).trim().to_string();
            let archive_url = join_url(directory_url, &archive_name);
            fetch_archive(fetcher, &archive_url, target).await?;
            Ok(SyncOutcome::FullArchive)
        }
        None => {
            // Not every provider publishes an archive; the 404 on the probe
            // is an accepted outcome.
            warn!(url = %pointer_url, "no archive advertised, falling back to file listing");

            let index_url = join_url(directory_url, INDEX_FILE);
            let data = fetcher.fetch(&index_url).await?;
            let files: Vec<String> = String::from_utf8_lossy(&data)
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();

            if files.is_empty() {
                return Err(SyncError::NoFilesFound { url: index_url });
            }

            let count = fetch_files(fetcher, directory_url, &files, target).await?;
            Ok(SyncOutcome::FullListing { files: count })
        }
    }
}
