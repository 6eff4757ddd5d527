//! Command-line interface: argument definitions and command routing.
//!
//! Commands are non-interactive; batch flows (`download --provider`,
//! `sync --all`, `clear --all`) take every item and report collected
//! failures together instead of prompting for a selection.

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use csaf_mirror_core::catalog;
use csaf_mirror_core::config::CacheConfig;
use csaf_mirror_core::discovery::{self, DEFAULT_AGGREGATOR_URL};
use csaf_mirror_core::error::SyncError;
use csaf_mirror_core::fetch::HttpFetcher;
use csaf_mirror_core::metadata;
use csaf_mirror_core::sync::sync_directory;

/// CLI for csaf-mirror: mirror CSAF advisory directories into a local cache.
#[derive(Parser)]
#[clap(
    name = "csaf-mirror",
    version,
    about = "Mirror CSAF advisory directories into a local, incrementally updated cache"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a CSAF data set or update an existing one
    Download {
        /// URL to a provider-metadata.json that points to one or more data sets
        #[clap(long, short = 'p', conflicts_with = "directory")]
        provider: Option<String>,
        /// URL to a CSAF directory that contains an index.txt file
        #[clap(long, short = 'd')]
        directory: Option<String>,
    },
    /// List providers advertised by a CSAF aggregator
    Providers {
        /// Aggregator document URL (defaults to the BSI aggregator)
        #[clap(long)]
        aggregator: Option<String>,
    },
    /// List locally cached data sets and their sizes
    List,
    /// Re-synchronise cached data sets from their recorded source URLs
    Sync {
        /// Name of one cached data set
        name: Option<String>,
        /// Re-synchronise every cached data set
        #[clap(long, conflicts_with = "name")]
        all: bool,
    },
    /// Delete cached data sets
    Clear {
        /// Name of one cached data set
        name: Option<String>,
        /// Delete every cached data set
        #[clap(long, conflicts_with = "name")]
        all: bool,
    },
}

/// Async CLI entrypoint, shared by `main()` and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let config = CacheConfig::resolve();
    let fetcher = HttpFetcher::new();

    match cli.command {
        Commands::Download {
            provider,
            directory,
        } => match (provider, directory) {
            (_, Some(directory_url)) => download_directory(&fetcher, &config, &directory_url).await,
            (Some(provider_url), None) => download_provider(&fetcher, &config, &provider_url).await,
            (None, None) => bail!(
                "nothing to download: pass --directory or --provider \
                 (use `csaf-mirror providers` to discover providers)"
            ),
        },
        Commands::Providers { aggregator } => {
            let url = aggregator.as_deref().unwrap_or(DEFAULT_AGGREGATOR_URL);
            list_providers(&fetcher, url).await
        }
        Commands::List => list_datasets(&config),
        Commands::Sync { name, all } => sync_cached(&fetcher, &config, name, all).await,
        Commands::Clear { name, all } => clear_cached(&config, name, all),
    }
}

async fn download_directory(
    fetcher: &HttpFetcher,
    config: &CacheConfig,
    directory_url: &str,
) -> Result<()> {
    println!("Downloading from directory: {directory_url}");
    let report = sync_directory(fetcher, config, directory_url).await?;
    println!("Successfully downloaded to: {}", report.path.display());
    Ok(())
}

async fn download_provider(
    fetcher: &HttpFetcher,
    config: &CacheConfig,
    provider_url: &str,
) -> Result<()> {
    println!("Fetching provider metadata from: {provider_url}");
    let provider = discovery::fetch_provider(fetcher, provider_url).await?;
    println!(
        "Provider: {} ({})",
        provider.publisher.name, provider.publisher.category
    );

    let mut directory_urls: Vec<String> = Vec::new();
    for distribution in &provider.distributions {
        match distribution.directory_urls() {
            Ok(urls) => directory_urls.extend(urls),
            Err(e) => eprintln!("Warning: skipping distribution: {e}"),
        }
    }
    if directory_urls.is_empty() {
        bail!("no usable distribution directories in {provider_url}");
    }

    let mut failures: Vec<(String, SyncError)> = Vec::new();
    for directory_url in &directory_urls {
        info!(url = %directory_url, "downloading distribution directory");
        match sync_directory(fetcher, config, directory_url).await {
            Ok(report) => println!("Downloaded to: {}", report.path.display()),
            Err(e) => failures.push((directory_url.clone(), e)),
        }
    }

    for (url, e) in &failures {
        eprintln!("Failed to download {url}: {e}");
    }
    if !failures.is_empty() {
        bail!("completed with {} error(s)", failures.len());
    }
    Ok(())
}

async fn list_providers(fetcher: &HttpFetcher, aggregator_url: &str) -> Result<()> {
    println!("Fetching CSAF provider list from: {aggregator_url}");
    let aggregator = discovery::fetch_aggregator(fetcher, aggregator_url).await?;

    for provider in &aggregator.csaf_providers {
        println!(
            "{} ({})\n    {}",
            provider.metadata.publisher.name,
            provider.metadata.publisher.namespace,
            provider.metadata.url
        );
    }
    Ok(())
}

fn list_datasets(config: &CacheConfig) -> Result<()> {
    let records = catalog::list_datasets(config)?;
    if records.is_empty() {
        println!("No cached data sets in {}", config.root.display());
        return Ok(());
    }

    for record in records {
        let last_sync = metadata::load(&record.path)
            .ok()
            .flatten()
            .map(|meta| meta.last_sync.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "{}  {}  (last sync: {})",
            record.name,
            format_size(record.size_bytes),
            last_sync
        );
    }
    Ok(())
}

async fn sync_cached(
    fetcher: &HttpFetcher,
    config: &CacheConfig,
    name: Option<String>,
    all: bool,
) -> Result<()> {
    if all {
        let outcome = catalog::sync_all(fetcher, config).await?;
        for report in &outcome.reports {
            println!("Synchronised {}", report.dataset);
        }
        for (dataset, e) in &outcome.failures {
            eprintln!("Failed to synchronise {dataset}: {e}");
        }
        if !outcome.failures.is_empty() {
            bail!("completed with {} error(s)", outcome.failures.len());
        }
        return Ok(());
    }

    let name = name.ok_or_else(|| anyhow!("pass a data set name or --all"))?;
    let url = catalog::source_url(config, &name)?;
    let report = sync_directory(fetcher, config, &url).await?;
    println!("Synchronised {} from {url}", report.dataset);
    Ok(())
}

fn clear_cached(config: &CacheConfig, name: Option<String>, all: bool) -> Result<()> {
    if all {
        let outcome = catalog::clear_all(config)?;
        for dataset in &outcome.removed {
            println!("Cleared {dataset}");
        }
        for (dataset, e) in &outcome.failures {
            eprintln!("Failed to clear {dataset}: {e}");
        }
        if !outcome.failures.is_empty() {
            bail!("completed with {} error(s)", outcome.failures.len());
        }
        return Ok(());
    }

    let name = name.ok_or_else(|| anyhow!("pass a data set name or --all"))?;
    catalog::clear_dataset(config, &name)?;
    println!("Cleared {name}");
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    match bytes {
        b if b >= GIB => format!("{:.1} GiB", b as f64 / GIB as f64),
        b if b >= MIB => format!("{:.1} MiB", b as f64 / MIB as f64),
        b if b >= KIB => format!("{:.1} KiB", b as f64 / KIB as f64),
        b => format!("{b} B"),
    }
}
