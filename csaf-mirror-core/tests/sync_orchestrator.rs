//! Orchestrator tests: scripted fetch sequences against a temporary cache.

use std::path::{Path, PathBuf};

use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use csaf_mirror_core::config::CacheConfig;
use csaf_mirror_core::download::sanitize_directory_name;
use csaf_mirror_core::error::SyncError;
use csaf_mirror_core::fetch::MockFetcher;
use csaf_mirror_core::metadata::{self, SyncMetadata};
use csaf_mirror_core::sync::{sync_directory, SyncOutcome};

const DIRECTORY_URL: &str = "https://example.com/csaf/";

fn dataset_dir(config: &CacheConfig) -> PathBuf {
    config.root.join(sanitize_directory_name(DIRECTORY_URL))
}

fn write_metadata(dir: &Path, last_sync: chrono::DateTime<Utc>) {
    std::fs::create_dir_all(dir).unwrap();
    metadata::save(
        dir,
        &SyncMetadata {
            last_sync,
            source_url: DIRECTORY_URL.to_string(),
        },
    )
    .unwrap();
}

#[tokio::test]
async fn incremental_sync_fetches_only_files_changed_since_last_sync() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());
    let last_sync = Utc::now() - Duration::hours(1);
    write_metadata(&dataset_dir(&config), last_sync);

    let unchanged = (last_sync - Duration::hours(1)).to_rfc3339();
    let changed = (last_sync + Duration::minutes(30)).to_rfc3339();
    let changes_csv = format!("a.json,{unchanged}\nsub/b.json,{changed}\n");

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|url: &str| url == "https://example.com/csaf/changes.csv")
        .times(1)
        .return_once(move |_| Ok(changes_csv.into_bytes()));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url == "https://example.com/csaf/sub/b.json")
        .times(1)
        .return_once(|_| Ok(b"{\"document\":\"b\"}".to_vec()));

    let report = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Incremental { updated: 1 });
    let target = dataset_dir(&config);
    assert_eq!(
        std::fs::read(target.join("sub/b.json")).unwrap(),
        b"{\"document\":\"b\"}"
    );
    assert!(!target.join("a.json").exists());

    let refreshed = metadata::load(&target).unwrap().unwrap();
    assert!(refreshed.last_sync > last_sync);
    assert_eq!(refreshed.source_url, DIRECTORY_URL);
}

#[tokio::test]
async fn empty_change_set_is_a_noop_success_that_still_refreshes_metadata() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());
    let last_sync = Utc::now() - Duration::hours(1);
    write_metadata(&dataset_dir(&config), last_sync);

    let old = (last_sync - Duration::hours(2)).to_rfc3339();
    let changes_csv = format!("a.json,{old}\n");

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/changes.csv"))
        .times(1)
        .return_once(move |_| Ok(changes_csv.into_bytes()));

    let report = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::Incremental { updated: 0 });
    // The stamp advances even with nothing to fetch, so an unchanged
    // upstream is not forced into a full sync three weeks later.
    let refreshed = metadata::load(&dataset_dir(&config)).unwrap().unwrap();
    assert!(refreshed.last_sync > last_sync);
}

#[tokio::test]
async fn archive_probe_404_falls_back_to_the_file_listing() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_optional()
        .withf(|url: &str| url == "https://example.com/csaf/archive_latest.txt")
        .times(1)
        .return_once(|_| Ok(None));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url == "https://example.com/csaf/index.txt")
        .times(1)
        .return_once(|_| Ok(b"2024/a.json\n\n2024/b.json\n".to_vec()));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/2024/a.json") || url.ends_with("/2024/b.json"))
        .times(2)
        .returning(|url: &str| Ok(url.as_bytes().to_vec()));

    let report = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::FullListing { files: 2 });
    let target = dataset_dir(&config);
    assert!(target.join("2024/a.json").exists());
    assert!(target.join("2024/b.json").exists());
    assert!(metadata::load(&target).unwrap().is_some());
}

#[tokio::test]
async fn blank_listing_fails_with_no_files_found_and_writes_no_metadata() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_optional()
        .withf(|url: &str| url.ends_with("/archive_latest.txt"))
        .return_once(|_| Ok(None));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/index.txt"))
        .return_once(|_| Ok(b"\n   \n\n".to_vec()));

    let err = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NoFilesFound { .. }));
    assert!(metadata::load(&dataset_dir(&config)).unwrap().is_none());
}

#[tokio::test]
async fn stale_cache_full_sync_unpacks_archive_and_replaces_prior_state() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());

    // Stale cache with leftover incremental state.
    let target = dataset_dir(&config);
    write_metadata(&target, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    std::fs::write(target.join("stray.json"), b"{}").unwrap();

    // One-entry tar, zstd-compressed, as the remote archive.
    let payload = b"{\"document\":{\"title\":\"advisory A\"}}";
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(payload.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "2024/advisory-a.json", &payload[..])
        .unwrap();
    let tar_bytes = builder.into_inner().unwrap();
    let compressed = zstd::stream::encode_all(&tar_bytes[..], 0).unwrap();

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_optional()
        .withf(|url: &str| url.ends_with("/archive_latest.txt"))
        .times(1)
        .return_once(|_| Ok(Some(b"csaf_advisories.tar.zst\n".to_vec())));
    fetcher
        .expect_fetch_to_file()
        .withf(|url: &str, _dest: &Path| {
            url == "https://example.com/csaf/csaf_advisories.tar.zst"
        })
        .times(1)
        .return_once(move |_, dest| {
            std::fs::write(dest, &compressed).unwrap();
            Ok(())
        });

    let report = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();

    assert_eq!(report.outcome, SyncOutcome::FullArchive);
    assert_eq!(
        std::fs::read(target.join("2024/advisory-a.json")).unwrap(),
        payload
    );
    // Full sync replaces prior state; intermediates are cleaned up.
    assert!(!target.join("stray.json").exists());
    assert!(!target.join("archive.tar.zst").exists());
    assert!(!target.join("archive.tar").exists());
    assert!(metadata::load(&target).unwrap().is_some());
}

#[tokio::test]
async fn failed_sync_leaves_previous_metadata_authoritative() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());
    let last_sync = Utc::now() - Duration::hours(1);
    write_metadata(&dataset_dir(&config), last_sync);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/changes.csv"))
        .return_once(|url: &str| {
            Err(SyncError::Transport {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
        });

    let err = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Transport { .. }));

    let unchanged = metadata::load(&dataset_dir(&config)).unwrap().unwrap();
    assert_eq!(unchanged.last_sync, last_sync);
}

#[tokio::test]
async fn full_sync_then_unchanged_incremental_is_idempotent() {
    let cache = tempdir().unwrap();
    let config = CacheConfig::new(cache.path());

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch_optional()
        .withf(|url: &str| url.ends_with("/archive_latest.txt"))
        .times(1)
        .return_once(|_| Ok(None));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/index.txt"))
        .times(1)
        .return_once(|_| Ok(b"a.json\n".to_vec()));
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/a.json"))
        .times(1)
        .return_once(|_| Ok(b"{\"document\":\"a\"}".to_vec()));

    let first = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();
    assert_eq!(first.outcome, SyncOutcome::FullListing { files: 1 });

    let target = dataset_dir(&config);
    let content_after_first = std::fs::read(target.join("a.json")).unwrap();
    let stamp_after_first = metadata::load(&target).unwrap().unwrap().last_sync;

    // Second run sees a fresh cache and an upstream with no new changes.
    let old = (Utc::now() - Duration::hours(1)).to_rfc3339();
    fetcher
        .expect_fetch()
        .withf(|url: &str| url.ends_with("/changes.csv"))
        .times(1)
        .return_once(move |_| Ok(format!("a.json,{old}\n").into_bytes()));

    let second = sync_directory(&fetcher, &config, DIRECTORY_URL)
        .await
        .unwrap();
    assert_eq!(second.outcome, SyncOutcome::Incremental { updated: 0 });
    assert_eq!(
        std::fs::read(target.join("a.json")).unwrap(),
        content_after_first
    );
    assert!(metadata::load(&target).unwrap().unwrap().last_sync >= stamp_after_first);
}
