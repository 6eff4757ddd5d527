//! Error taxonomy for the synchronisation engine.
//!
//! Every variant carries the URL, path or dataset name needed to diagnose a
//! failure without re-running with extra logging. The orchestrator performs
//! no retries; a single failure aborts the current sync attempt and leaves
//! prior cache state intact.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Network-level failure while fetching a resource.
    #[error("failed to fetch {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The remote answered with a non-2xx status outside an accepted-404 case.
    #[error("failed to fetch {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Archive decompression or unpacking failed.
    #[error("failed to decode archive {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A change log row carried a timestamp that is not RFC 3339.
    #[error("invalid timestamp {value:?} in change log: {source}")]
    ChangeLogParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A JSON document (metadata record, discovery document) failed to parse.
    #[error("malformed document from {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A document parsed but is missing required content.
    #[error("invalid document from {context}: {reason}")]
    Validation { context: String, reason: String },

    /// A full-sync file listing turned out to be empty.
    #[error("no files found in {url}")]
    NoFilesFound { url: String },

    /// Local filesystem read/write/create failure.
    #[error("storage failure at {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No cached dataset directory with the given name exists.
    #[error("no cached dataset named {0:?}")]
    NotFound(String),

    /// The dataset directory exists but carries no sync metadata record.
    #[error("dataset {0:?} has no sync metadata record")]
    NoMetadata(String),
}

impl SyncError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}
