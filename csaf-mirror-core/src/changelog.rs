//! Parser for the remote change log (`changes.csv`): a two-column manifest
//! mapping relative file paths to their last-modified timestamps.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::SyncError;

/// Parse the raw bytes of a change log into a path → timestamp map.
///
/// Parsing is lenient on structure and strict on timestamps: blank lines and
/// rows with fewer than two columns are skipped, but a timestamp that is not
/// RFC 3339 aborts the whole parse, because it would make the "changed since
/// last sync" comparison meaningless. Duplicate paths resolve to the last
/// occurrence in file order.
pub fn parse_changes_csv(data: &[u8]) -> Result<HashMap<String, DateTime<Utc>>, SyncError> {
    let text = String::from_utf8_lossy(data);

    let mut changes = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut columns = line.split(',');
        let (Some(path), Some(timestamp)) = (columns.next(), columns.next()) else {
            continue; // malformed row
        };

        let timestamp = timestamp.trim();
        let parsed =
            DateTime::parse_from_rfc3339(timestamp).map_err(|e| SyncError::ChangeLogParse {
                value: timestamp.to_string(),
                source: e,
            })?;
        changes.insert(path.trim().to_string(), parsed.with_timezone(&Utc));
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_well_formed_rows() {
        let data = b"a.json,2024-01-01T00:00:00Z\nsub/b.json,2024-06-01T00:00:00Z\n";
        let changes = parse_changes_csv(data).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["a.json"], utc(2024, 1, 1));
        assert_eq!(changes["sub/b.json"], utc(2024, 6, 1));
    }

    #[test]
    fn skips_blank_lines_and_short_rows() {
        let data = b"\n   \na.json\na.json,2024-01-01T00:00:00Z\n\n";
        let changes = parse_changes_csv(data).unwrap();
        assert_eq!(changes.len(), 1);
        assert!(changes.contains_key("a.json"));
    }

    #[test]
    fn duplicate_paths_last_occurrence_wins() {
        let data = b"a.json,2024-01-01T00:00:00Z\na.json,2024-06-01T00:00:00Z\n";
        let changes = parse_changes_csv(data).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["a.json"], utc(2024, 6, 1));
    }

    #[test]
    fn bad_timestamp_is_fatal_with_offending_value() {
        let data = b"a.json,2024-01-01T00:00:00Z\nb.json,not-a-date\n";
        let err = parse_changes_csv(data).unwrap_err();
        match err {
            SyncError::ChangeLogParse { value, .. } => assert_eq!(value, "not-a-date"),
            other => panic!("expected ChangeLogParse, got {other:?}"),
        }
    }

    #[test]
    fn changed_set_contains_only_files_modified_after_last_sync() {
        let data = b"a.json,2024-01-01T00:00:00Z\nb.json,2024-06-01T00:00:00Z\n";
        let changes = parse_changes_csv(data).unwrap();

        let last_sync = utc(2024, 3, 1);
        let changed: Vec<&str> = changes
            .iter()
            .filter(|(_, ts)| **ts > last_sync)
            .map(|(path, _)| path.as_str())
            .collect();
        assert_eq!(changed, vec!["b.json"]);
    }
}
