// crates/labeldb-store/src/partition.rs
// ============================================================================
// Module: Time Partitioner
// Description: Fixed-window time partitioning and physical naming.
// Purpose: Map timestamps to partition windows, suffixes, and database files.
// Dependencies: chrono
// ============================================================================

//! ## Overview
//! Data is sharded into fixed 84-day windows. Each window is one physical
//! database file; within a file, table names carry the window suffix and the
//! lifetime index additionally carries the namespace. Everything here is a
//! pure function of its inputs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Partition window width in seconds: 3 x 4 x 7 x 24h (84 days).
pub const PARTITION_INTERVAL_SECS: i64 = 3 * 4 * 7 * 24 * 60 * 60;

// ============================================================================
// SECTION: Time Ranges
// ============================================================================

/// A closed time range with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    /// Inclusive range start.
    pub from: DateTime<Utc>,
    /// Inclusive range end.
    pub to: DateTime<Utc>,
}

/// Converts unix seconds to a datetime, saturating far outside the
/// representable range.
fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ============================================================================
// SECTION: Partition Functions
// ============================================================================

/// Returns the partition window containing `t`.
///
/// The window is `[floor(t/P)*P, floor(t/P)*P + P - 1s]`.
#[must_use]
pub fn partition_of(t: DateTime<Utc>) -> TimeRange {
    let secs = t.timestamp();
    let start = secs - secs.rem_euclid(PARTITION_INTERVAL_SECS);
    TimeRange {
        from: from_unix(start),
        to: from_unix(start + PARTITION_INTERVAL_SECS - 1),
    }
}

/// Splits `[from, to]` into one clipped sub-range per intersected partition
/// window, ordered by time.
///
/// The first element starts at `from` and the last ends at `to`;
/// intermediate elements span full windows. The result is non-empty whenever
/// `from <= to` — including the single-instant overlap when `to` lands
/// exactly on the first second of a window — and empty otherwise.
#[must_use]
pub fn partitions_covering(from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<TimeRange> {
    if from > to {
        return Vec::new();
    }
    let mut ranges = Vec::new();
    let mut cursor = partition_of(from).from;
    while cursor <= to {
        ranges.push(partition_of(cursor));
        cursor = from_unix(cursor.timestamp() + PARTITION_INTERVAL_SECS);
    }
    if let Some(first) = ranges.first_mut() {
        first.from = from;
    }
    if let Some(last) = ranges.last_mut() {
        last.to = to;
    }
    ranges
}

// ============================================================================
// SECTION: Physical Naming
// ============================================================================

/// Returns the table suffix `_<start:YYYYMMDD>_<end:YYYYMMDD>` for the
/// partition containing `t`.
#[must_use]
pub fn table_suffix(t: DateTime<Utc>) -> String {
    let p = partition_of(t);
    format!("_{}_{}", p.from.format("%Y%m%d"), p.to.format("%Y%m%d"))
}

/// Returns the lifetime-table suffix for `(partition of t, namespace)`.
///
/// The namespace is appended with `/` rewritten to `_` so it stays legal in
/// a table name.
#[must_use]
pub fn lifetime_table_suffix(t: DateTime<Utc>, namespace: &str) -> String {
    format!("{}_{}", table_suffix(t), namespace.replace('/', "_"))
}

/// Returns the database file name for the partition containing `t`.
#[must_use]
pub fn db_file_name(t: DateTime<Utc>) -> String {
    format!("labels{}.db", table_suffix(t))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn partition_of_aligns_to_window() {
        let p = partition_of(ts(PARTITION_INTERVAL_SECS * 7 + 12_345));
        assert_eq!(p.from.timestamp(), PARTITION_INTERVAL_SECS * 7);
        assert_eq!(p.to.timestamp(), PARTITION_INTERVAL_SECS * 8 - 1);
    }

    #[test]
    fn partition_of_window_start_and_end() {
        let start = ts(PARTITION_INTERVAL_SECS * 3);
        let end = ts(PARTITION_INTERVAL_SECS * 4 - 1);
        assert_eq!(partition_of(start), partition_of(end));
        assert_eq!(partition_of(start).from, start);
        assert_eq!(partition_of(end).to, end);
    }

    #[test]
    fn covering_within_one_partition() {
        let from = ts(PARTITION_INTERVAL_SECS + 10);
        let to = ts(PARTITION_INTERVAL_SECS + 500);
        let ranges = partitions_covering(from, to);
        assert_eq!(ranges, vec![TimeRange { from, to }]);
    }

    #[test]
    fn covering_point_range() {
        let at = ts(PARTITION_INTERVAL_SECS * 2 + 42);
        let ranges = partitions_covering(at, at);
        assert_eq!(ranges, vec![TimeRange { from: at, to: at }]);
    }

    #[test]
    fn covering_empty_when_inverted() {
        assert!(partitions_covering(ts(10), ts(9)).is_empty());
    }

    #[test]
    fn covering_clips_across_partitions() {
        let from = ts(PARTITION_INTERVAL_SECS - 100);
        let to = ts(PARTITION_INTERVAL_SECS * 2 + 100);
        let ranges = partitions_covering(from, to);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].from, from);
        assert_eq!(ranges[0].to.timestamp(), PARTITION_INTERVAL_SECS - 1);
        assert_eq!(ranges[1].from.timestamp(), PARTITION_INTERVAL_SECS);
        assert_eq!(ranges[1].to.timestamp(), PARTITION_INTERVAL_SECS * 2 - 1);
        assert_eq!(ranges[2].from.timestamp(), PARTITION_INTERVAL_SECS * 2);
        assert_eq!(ranges[2].to, to);
    }

    #[test]
    fn covering_includes_window_touched_at_single_instant() {
        // A range ending exactly on the first second of the next window
        // intersects that window at one point and must include it.
        let from = ts(PARTITION_INTERVAL_SECS);
        let to = ts(PARTITION_INTERVAL_SECS * 2);
        let ranges = partitions_covering(from, to);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].from, to);
        assert_eq!(ranges[1].to, to);
    }

    #[test]
    fn suffix_formats_window_dates() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let p = partition_of(t);
        let expected = format!("_{}_{}", p.from.format("%Y%m%d"), p.to.format("%Y%m%d"));
        assert_eq!(table_suffix(t), expected);
        assert_eq!(db_file_name(t), format!("labels{expected}.db"));
        // Every instant in the window shares the suffix.
        assert_eq!(table_suffix(p.from), table_suffix(p.to));
    }

    #[test]
    fn lifetime_suffix_rewrites_namespace_slashes() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let suffix = lifetime_table_suffix(t, "AWS/EC2");
        assert!(suffix.ends_with("_AWS_EC2"));
        assert!(!suffix.contains('/'));
    }
}
