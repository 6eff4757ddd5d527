//! Fetch strategies: bulk archive download and per-file listing download,
//! plus the URL helpers both strategies share.
//!
//! Both strategies are strictly sequential; a failure on any file or step
//! aborts the whole operation. Files written before a failure stay on disk
//! (no rollback); the orchestrator clears the destination before a full
//! sync, so partial state is self-contained to one dataset.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::fetch::Fetcher;

/// Optional remote resource naming the current full archive.
pub const ARCHIVE_POINTER_FILE: &str = "archive_latest.txt";
/// Fallback full listing of relative file paths, one per line.
pub const INDEX_FILE: &str = "index.txt";
/// Change manifest consumed by incremental syncs.
pub const CHANGES_FILE: &str = "changes.csv";

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]").expect("valid pattern"));
static UNDERSCORE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").expect("valid pattern"));

/// Join a base URL and a relative path with exactly one slash between them,
/// regardless of trailing/leading slashes on either side.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Derive the local directory name identifying a cached dataset.
///
/// Pure function of the source URL: host and path with every character
/// outside `[a-zA-Z0-9._-]` replaced by `_`, runs of `_` collapsed, and
/// leading/trailing `_` trimmed.
pub fn sanitize_directory_name(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host_and_path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);

    let replaced = UNSAFE_CHARS.replace_all(host_and_path, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Bulk fetch strategy: download a compressed archive representing the full
/// current state of a directory and unpack it into `dest_dir`.
///
/// The archive is streamed to disk, zstd-decoded into an intermediate tar
/// file (never buffered whole in memory), unpacked, and both intermediates
/// are removed on success.
pub async fn fetch_archive<F>(
    fetcher: &F,
    archive_url: &str,
    dest_dir: &Path,
) -> Result<(), SyncError>
where
    F: Fetcher + ?Sized,
{
    let compressed_path = dest_dir.join("archive.tar.zst");
    info!(url = archive_url, "downloading dataset archive");
    fetcher.fetch_to_file(archive_url, &compressed_path).await?;

    let tar_path = dest_dir.join("archive.tar");
    decompress_to_file(&compressed_path, &tar_path)?;

    let tar_file = File::open(&tar_path).map_err(|e| SyncError::storage(&tar_path, e))?;
    tar::Archive::new(tar_file)
        .unpack(dest_dir)
        .map_err(|e| SyncError::Decode {
            path: tar_path.clone(),
            source: e,
        })?;

    for intermediate in [&compressed_path, &tar_path] {
        if let Err(e) = fs::remove_file(intermediate) {
            warn!(
                path = %intermediate.display(),
                error = %e,
                "failed to remove intermediate archive file"
            );
        }
    }

    info!(path = %dest_dir.display(), "dataset archive unpacked");
    Ok(())
}

fn decompress_to_file(compressed: &Path, tar_path: &Path) -> Result<(), SyncError> {
    let input = File::open(compressed).map_err(|e| SyncError::storage(compressed, e))?;
    let output = File::create(tar_path).map_err(|e| SyncError::storage(tar_path, e))?;

    let mut writer = BufWriter::new(output);
    zstd::stream::copy_decode(BufReader::new(input), &mut writer).map_err(|e| {
        SyncError::Decode {
            path: compressed.to_path_buf(),
            source: e,
        }
    })?;
    writer
        .flush()
        .map_err(|e| SyncError::storage(tar_path, e))?;
    Ok(())
}

/// Listing fetch strategy: download an explicit set of relative file paths
/// one by one into `dest_dir`, overwriting existing files.
///
/// Whitespace-only paths are skipped. The first failing fetch aborts the
/// remaining files. Returns how many files were written.
pub async fn fetch_files<F>(
    fetcher: &F,
    base_url: &str,
    paths: &[String],
    dest_dir: &Path,
) -> Result<usize, SyncError>
where
    F: Fetcher + ?Sized,
{
    let mut written = 0usize;
    for path in paths {
        let relative = path.trim();
        if relative.is_empty() {
            continue;
        }

        let file_url = join_url(base_url, relative);
        let local_path = dest_dir.join(relative.trim_start_matches('/'));
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::storage(parent, e))?;
        }

        let body = fetcher.fetch(&file_url).await?;
        fs::write(&local_path, &body).map_err(|e| SyncError::storage(&local_path, e))?;
        debug!(url = file_url, path = %local_path.display(), "fetched file");
        written += 1;
    }

    if written > 0 {
        info!(files = written, "downloaded individual files");
    }
    Ok(written)
}
