// crates/labeldb-store/src/record.rs
// ============================================================================
// Module: Write Engine
// Description: Idempotent per-partition identity upsert.
// Purpose: Maintain uniqueness, interval union, and partition coverage.
// Dependencies: chrono, labeldb-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Recording an identity clips its lifetime against every intersected
//! partition window and upserts one row per partition, each in its own
//! transaction:
//!
//! - At most one row exists per (partition, namespace, metric name, region,
//!   canonical dimensions); a re-record updates that row.
//! - The stored interval only widens: `from_timestamp` takes the minimum,
//!   `to_timestamp` the maximum of everything ever submitted.
//! - The lifetime index row mirrors the identity row's interval.
//!
//! Cross-partition writes are deliberately non-atomic; a failure leaves
//! earlier partitions committed and the caller's retry re-applies the
//! remainder idempotently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::Utc;
use labeldb_core::Metric;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;

use crate::error::StoreError;
use crate::partition::TimeRange;
use crate::partition::lifetime_table_suffix;
use crate::partition::partitions_covering;
use crate::partition::table_suffix;
use crate::store::LabelStore;

// ============================================================================
// SECTION: Write Engine
// ============================================================================

impl LabelStore {
    /// Records `metric` into every partition its lifetime intersects.
    ///
    /// Validation runs before any partition is touched: an inverted interval
    /// is rejected with [`StoreError::InvalidInterval`] and leaves no rows.
    ///
    /// # Errors
    ///
    /// Returns the first per-partition failure; partitions already committed
    /// stay committed.
    pub fn record_metric(&self, metric: &Metric) -> Result<(), StoreError> {
        if metric.to_ts < metric.from_ts {
            return Err(StoreError::InvalidInterval {
                from: metric.from_ts.timestamp(),
                to: metric.to_ts.timestamp(),
            });
        }
        let dimensions = serde_json::to_string(&metric.dimensions)?;

        for range in partitions_covering(metric.from_ts, metric.to_ts) {
            let handle = self.cache.get(range.from)?;
            let mut conn = handle.conn.lock().map_err(|_| StoreError::Poisoned)?;
            let tx = conn.transaction().map_err(StoreError::Write)?;
            self.schema.ensure(&tx, range.from, &metric.namespace)?;
            record_to_partition(&tx, metric, &dimensions, range)?;
            tx.commit().map_err(StoreError::Write)?;
        }
        Ok(())
    }
}

/// Upserts the identity row and its lifetime entry for one partition.
fn record_to_partition(
    tx: &Transaction<'_>,
    metric: &Metric,
    dimensions: &str,
    range: TimeRange,
) -> Result<(), StoreError> {
    let suffix = table_suffix(range.from);
    let clipped_from = range.from.timestamp();
    let clipped_to = range.to.timestamp();
    let now = Utc::now().timestamp();

    let existing: Option<(i64, i64, i64)> = tx
        .query_row(
            &format!(
                "SELECT metric_id, from_timestamp, to_timestamp FROM metrics{suffix}\n\
                 WHERE namespace = ?1 AND metric_name = ?2 AND region = ?3 AND dimensions = ?4"
            ),
            params![metric.namespace, metric.metric_name, metric.region, dimensions],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(StoreError::Write)?;

    let (metric_id, old_from, old_to) = match existing {
        None => {
            tx.execute(
                &format!(
                    "INSERT INTO metrics{suffix}\n\
                     \t(namespace, metric_name, region, dimensions,\n\
                     \t from_timestamp, to_timestamp, updated_at)\n\
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    metric.namespace,
                    metric.metric_name,
                    metric.region,
                    dimensions,
                    clipped_from,
                    clipped_to,
                    now
                ],
            )
            .map_err(StoreError::Write)?;
            (tx.last_insert_rowid(), clipped_from, clipped_to)
        }
        Some((metric_id, old_from, old_to)) => {
            tx.execute(
                &format!(
                    "UPDATE metrics{suffix} SET\n\
                     \tfrom_timestamp = ?1, to_timestamp = ?2, updated_at = ?3\n\
                     WHERE metric_id = ?4"
                ),
                params![
                    clipped_from.min(old_from),
                    clipped_to.max(old_to),
                    now,
                    metric_id
                ],
            )
            .map_err(StoreError::Write)?;
            (metric_id, old_from, old_to)
        }
    };

    let lifetime_suffix = lifetime_table_suffix(range.from, &metric.namespace);
    let inserted = tx
        .execute(
            &format!(
                "INSERT OR IGNORE INTO metrics_lifetime{lifetime_suffix}\n\
                 \t(metric_id, from_timestamp, to_timestamp)\n\
                 VALUES (?1, ?2, ?3)"
            ),
            params![metric_id, clipped_from, clipped_to],
        )
        .map_err(StoreError::Write)?;
    if inserted == 0 {
        tx.execute(
            &format!(
                "UPDATE metrics_lifetime{lifetime_suffix} SET\n\
                 \tfrom_timestamp = ?1, to_timestamp = ?2\n\
                 WHERE metric_id = ?3"
            ),
            params![clipped_from.min(old_from), clipped_to.max(old_to), metric_id],
        )
        .map_err(StoreError::Write)?;
    }

    Ok(())
}
