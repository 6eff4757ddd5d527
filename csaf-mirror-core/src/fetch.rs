//! # fetch: transport contract for remote resources
//!
//! This module defines a single trait ([`Fetcher`]) abstracting the HTTP
//! transport, plus the reqwest-backed production implementation
//! ([`HttpFetcher`]). The engine only specifies *what* is fetched and how
//! results are interpreted; everything about connections, TLS and redirects
//! lives behind this trait.
//!
//! ## Mocking & Testing
//! The trait is annotated for `mockall` so the orchestrator and strategy
//! tests can script exact request/response sequences without a network.
//!
//! ## Contract
//! - All fetches are sequential; implementations must not assume concurrent
//!   callers within one sync operation.
//! - `fetch_optional` treats a 404 as an accepted outcome (`Ok(None)`); it is
//!   used only for optional discovery resources such as the archive pointer,
//!   never for per-file fetches.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use mockall::automock;

use crate::error::SyncError;

/// Trait for fetching remote resources over HTTP.
/// Implemented by the real client and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a resource and return its body. Any non-2xx status is an error.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError>;

    /// Fetch an optional resource: a 404 yields `Ok(None)` instead of an
    /// error. Any other non-2xx status or transport failure is still fatal.
    async fn fetch_optional(&self, url: &str) -> Result<Option<Vec<u8>>, SyncError>;

    /// Stream a resource directly to a local file, never buffering the whole
    /// body in memory. Used for bulk archives, which may be large.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), SyncError>;
}

/// Production [`Fetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, SyncError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|e| SyncError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    async fn fetch_optional(&self, url: &str) -> Result<Option<Vec<u8>>, SyncError> {
        let response = self.get(url).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.bytes().await.map_err(|e| SyncError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(body.to_vec()))
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<(), SyncError> {
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut out = File::create(dest).map_err(|e| SyncError::storage(dest, e))?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            out.write_all(&chunk)
                .map_err(|e| SyncError::storage(dest, e))?;
        }
        Ok(())
    }
}
