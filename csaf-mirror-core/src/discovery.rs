//! Discovery documents: the CSAF provider-metadata and aggregator JSON
//! formats, reduced to what the mirror consumes: a list of directory URLs
//! per provider, and a list of providers per aggregator.
//!
//! Schemas:
//! <https://docs.oasis-open.org/csaf/csaf/v2.0/os/schemas/provider_json_schema.json>
//! <https://docs.oasis-open.org/csaf/csaf/v2.0/os/schemas/aggregator_json_schema.json>

use serde::Deserialize;

use crate::error::SyncError;
use crate::fetch::Fetcher;

/// BSI aggregator used when no explicit aggregator URL is given.
pub const DEFAULT_AGGREGATOR_URL: &str =
    "https://wid.cert-bund.de/.well-known/csaf-aggregator/aggregator.json";

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub distributions: Vec<Distribution>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub publisher: Publisher,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Publisher {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub contact_details: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Distribution {
    #[serde(default)]
    pub directory_url: String,
    #[serde(default)]
    pub rolie: Option<Rolie>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rolie {
    #[serde(default)]
    pub feeds: Vec<RolieFeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolieFeed {
    #[serde(default)]
    pub url: String,
}

impl Distribution {
    /// All directory URLs for this distribution.
    ///
    /// An explicit `directory_url` wins. Otherwise each ROLIE feed URL is
    /// turned into a directory URL by stripping its final path segment,
    /// de-duplicated in first-seen order.
    pub fn directory_urls(&self) -> Result<Vec<String>, SyncError> {
        if !self.directory_url.is_empty() {
            return Ok(vec![self.directory_url.clone()]);
        }

        if let Some(rolie) = &self.rolie {
            let mut urls: Vec<String> = Vec::new();
            for feed in &rolie.feeds {
                if feed.url.is_empty() {
                    continue;
                }
                let Some(last_slash) = feed.url.rfind('/') else {
                    continue;
                };
                let dir_url = feed.url[..=last_slash].to_string();
                if !urls.contains(&dir_url) {
                    urls.push(dir_url);
                }
            }
            if !urls.is_empty() {
                return Ok(urls);
            }
        }

        Err(SyncError::Validation {
            context: "distribution".to_string(),
            reason: "no directory URL or ROLIE feeds found".to_string(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Aggregator {
    #[serde(default)]
    pub aggregator: AggregatorInfo,
    #[serde(default)]
    pub canonical_url: String,
    #[serde(default)]
    pub csaf_providers: Vec<CsafProvider>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AggregatorInfo {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsafProvider {
    pub metadata: ProviderInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderInfo {
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub publisher: Publisher,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub url: String,
}

/// Fetch and validate a provider-metadata document.
pub async fn fetch_provider<F>(
    fetcher: &F,
    provider_url: &str,
) -> Result<ProviderMetadata, SyncError>
where
    F: Fetcher + ?Sized,
{
    let data = fetcher.fetch(provider_url).await?;
    let provider: ProviderMetadata =
        serde_json::from_slice(&data).map_err(|e| SyncError::Parse {
            context: provider_url.to_string(),
            source: e,
        })?;

    if provider.distributions.is_empty() {
        return Err(SyncError::Validation {
            context: provider_url.to_string(),
            reason: "no distributions listed".to_string(),
        });
    }
    Ok(provider)
}

/// Fetch and validate an aggregator document.
pub async fn fetch_aggregator<F>(fetcher: &F, aggregator_url: &str) -> Result<Aggregator, SyncError>
where
    F: Fetcher + ?Sized,
{
    let data = fetcher.fetch(aggregator_url).await?;
    let aggregator: Aggregator = serde_json::from_slice(&data).map_err(|e| SyncError::Parse {
        context: aggregator_url.to_string(),
        source: e,
    })?;

    if aggregator.csaf_providers.is_empty() {
        return Err(SyncError::Validation {
            context: aggregator_url.to_string(),
            reason: "no providers listed".to_string(),
        });
    }
    Ok(aggregator)
}
