use chrono::{Duration, TimeZone, Utc};
use tempfile::tempdir;

use csaf_mirror_core::error::SyncError;
use csaf_mirror_core::metadata::{self, SyncMetadata, METADATA_FILE};

#[test]
fn save_then_load_round_trips_the_record() {
    let dir = tempdir().unwrap();
    let record = SyncMetadata {
        last_sync: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        source_url: "https://example.com/csaf/".to_string(),
    };

    metadata::save(dir.path(), &record).unwrap();
    let loaded = metadata::load(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, record);

    // Persisted form is pretty-printed JSON with snake_case field names.
    let raw = std::fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
    assert!(raw.contains("\"last_sync\""));
    assert!(raw.contains("\"source_url\""));
    assert!(raw.contains('\n'));
}

#[test]
fn absent_record_is_not_an_error() {
    let dir = tempdir().unwrap();
    assert!(metadata::load(dir.path()).unwrap().is_none());

    let (valid, record) = metadata::validity(dir.path()).unwrap();
    assert!(!valid);
    assert!(record.is_none());
}

#[test]
fn malformed_record_is_a_parse_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(METADATA_FILE), b"{not json").unwrap();

    assert!(matches!(
        metadata::load(dir.path()),
        Err(SyncError::Parse { .. })
    ));
}

#[test]
fn record_exactly_at_the_window_edge_is_still_valid() {
    let dir = tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 22, 0, 0, 0).unwrap();
    let record = SyncMetadata {
        last_sync: now - metadata::freshness_window(),
        source_url: "https://example.com/csaf/".to_string(),
    };
    metadata::save(dir.path(), &record).unwrap();

    let (valid, loaded) = metadata::validity_at(dir.path(), now).unwrap();
    assert!(valid);
    assert_eq!(loaded.unwrap(), record);
}

#[test]
fn record_one_second_past_the_window_is_stale_but_returned() {
    let dir = tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 6, 22, 0, 0, 0).unwrap();
    let record = SyncMetadata {
        last_sync: now - metadata::freshness_window() - Duration::seconds(1),
        source_url: "https://example.com/csaf/".to_string(),
    };
    metadata::save(dir.path(), &record).unwrap();

    let (valid, loaded) = metadata::validity_at(dir.path(), now).unwrap();
    assert!(!valid);
    // Stale metadata still surfaces the previous sync time and source URL.
    assert_eq!(loaded.unwrap(), record);
}
