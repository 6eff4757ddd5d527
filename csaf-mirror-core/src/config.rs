//! Cache root configuration.
//!
//! The cache root is resolved once by the caller (the CLI) and passed into
//! every component that touches the cache; no component reads environment
//! variables on its own.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SyncError;

/// Environment variable that overrides the cache root entirely.
pub const CACHE_DIR_ENV: &str = "CSAF_MIRROR_CACHE_DIR";

const CACHE_SUBDIR: &str = "csaf-mirror";

/// Where cached datasets live on disk.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub root: PathBuf,
}

impl CacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the cache root from the environment.
    ///
    /// Precedence: `CSAF_MIRROR_CACHE_DIR`, then `XDG_CACHE_HOME/csaf-mirror`,
    /// then the platform cache directory (`~/.cache/csaf-mirror` on Unix,
    /// `%LOCALAPPDATA%/csaf-mirror` on Windows).
    pub fn resolve() -> Self {
        if let Ok(dir) = env::var(CACHE_DIR_ENV) {
            if !dir.is_empty() {
                debug!(root = %dir, "cache root taken from override variable");
                return Self::new(dir);
            }
        }

        if let Ok(xdg) = env::var("XDG_CACHE_HOME") {
            if !xdg.is_empty() {
                return Self::new(Path::new(&xdg).join(CACHE_SUBDIR));
            }
        }

        match dirs::cache_dir() {
            Some(base) => Self::new(base.join(CACHE_SUBDIR)),
            // No resolvable home directory; fall back to a relative path.
            None => Self::new(PathBuf::from(".cache")),
        }
    }

    /// Create the cache root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<&Path, SyncError> {
        fs::create_dir_all(&self.root).map_err(|e| SyncError::storage(&self.root, e))?;
        Ok(&self.root)
    }

    pub fn dataset_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}
