// crates/labeldb-store/src/query.rs
// ============================================================================
// Module: Query Engine
// Description: Range-constrained matcher lookups with cross-partition merge.
// Purpose: Resolve label matchers to identities alive during a window.
// Dependencies: chrono, labeldb-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! A query compiles its matchers once, then visits every partition window
//! intersecting `[from, to]`. Each partition joins the per-namespace
//! lifetime index against the identity table under the interval-overlap
//! predicate plus the compiled label predicates.
//!
//! Results merge into a caller-seeded map keyed by the content-derived
//! unique key; an identity found in several partitions keeps the union of
//! its per-partition lifetimes. A partition that was never written ("no such
//! table") contributes nothing; any other failure aborts the query.
//!
//! The per-partition `LIMIT` and the early exit bound work, but the final
//! trim to `limit` — after whatever ordering the caller applies — is the
//! caller's responsibility.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;
use labeldb_core::Dimensions;
use labeldb_core::Metric;
use labeldb_core::MetricSet;
use rusqlite::Row;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::error::StoreError;
use crate::matcher::CompiledMatchers;
use crate::matcher::LabelMatcher;
use crate::matcher::compile;
use crate::partition::TimeRange;
use crate::partition::lifetime_table_suffix;
use crate::partition::partitions_covering;
use crate::partition::table_suffix;
use crate::store::LabelStore;

// ============================================================================
// SECTION: Query Engine
// ============================================================================

impl LabelStore {
    /// Queries identities alive during `[from, to]` that satisfy every
    /// matcher, merging into `result` under the unique key.
    ///
    /// `limit == 0` means unlimited. With a positive limit, partition
    /// scanning stops once the merged set reaches it; the caller trims after
    /// ordering.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingNamespace`] for an incomplete matcher
    /// set and the first per-partition failure otherwise. Partitions with no
    /// data are not errors.
    pub fn query_metrics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        matchers: &[LabelMatcher],
        limit: usize,
        result: &mut MetricSet,
    ) -> Result<(), StoreError> {
        let compiled = compile(matchers)?;

        for range in partitions_covering(from, to) {
            match self.query_partition(range, &compiled, limit, result) {
                Ok(()) => {}
                Err(err) if is_missing_table(&err) => continue,
                Err(err) => return Err(err),
            }
            if limit > 0 && result.len() >= limit {
                break;
            }
        }
        Ok(())
    }

    /// Runs the compiled predicates against one partition and merges rows.
    fn query_partition(
        &self,
        range: TimeRange,
        compiled: &CompiledMatchers,
        limit: usize,
        result: &mut MetricSet,
    ) -> Result<(), StoreError> {
        let handle = self.cache.get(range.from)?;
        let conn = handle.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let suffix = table_suffix(range.from);
        let lifetime_suffix = lifetime_table_suffix(range.from, &compiled.namespace);

        // Lifetime interval overlaps the clipped query range.
        let mut predicates = vec![
            "ml.from_timestamp <= ?".to_owned(),
            "ml.to_timestamp >= ?".to_owned(),
        ];
        predicates.extend(compiled.predicates.iter().cloned());
        let mut args = vec![
            Value::Integer(range.to.timestamp()),
            Value::Integer(range.from.timestamp()),
        ];
        args.extend(compiled.args.iter().cloned());

        let mut sql = format!(
            "SELECT m.* FROM metrics_lifetime{lifetime_suffix} ml\n\
             JOIN metrics{suffix} m ON ml.metric_id = m.metric_id\n\
             WHERE {}",
            predicates.join(" AND ")
        );
        if limit > 0 {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(limit as i64));
        }

        let mut stmt = conn.prepare(&sql).map_err(StoreError::Query)?;
        let mut rows = stmt.query(params_from_iter(args)).map_err(StoreError::Query)?;
        while let Some(row) = rows.next().map_err(StoreError::Query)? {
            let metric = metric_from_row(row)?;
            merge(result, metric);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps one `metrics` row (identity column order) to a [`Metric`].
fn metric_from_row(row: &Row<'_>) -> Result<Metric, StoreError> {
    let dimensions_json: String = row.get(4).map_err(StoreError::Query)?;
    let dimensions: Dimensions = serde_json::from_str(&dimensions_json)?;
    Ok(Metric {
        namespace: row.get(1).map_err(StoreError::Query)?,
        metric_name: row.get(2).map_err(StoreError::Query)?,
        region: row.get(3).map_err(StoreError::Query)?,
        dimensions,
        from_ts: datetime_column(row, 5)?,
        to_ts: datetime_column(row, 6)?,
        updated_at: datetime_column(row, 7)?,
    })
}

/// Reads a unix-seconds column as a datetime.
fn datetime_column(row: &Row<'_>, index: usize) -> Result<DateTime<Utc>, StoreError> {
    let secs: i64 = row.get(index).map_err(StoreError::Query)?;
    DateTime::from_timestamp(secs, 0).ok_or(StoreError::TimestampRange(secs))
}

/// Merges one row into the result map, unioning lifetimes on key collision.
fn merge(result: &mut MetricSet, metric: Metric) {
    match result.entry(metric.unique_key()) {
        std::collections::btree_map::Entry::Occupied(mut entry) => {
            let stored = entry.get_mut();
            stored.from_ts = stored.from_ts.min(metric.from_ts);
            stored.to_ts = stored.to_ts.max(metric.to_ts);
        }
        std::collections::btree_map::Entry::Vacant(entry) => {
            entry.insert(metric);
        }
    }
}

/// A partition that was never written has no tables; treat it as empty.
fn is_missing_table(err: &StoreError) -> bool {
    matches!(err, StoreError::Query(inner) if inner.to_string().contains("no such table: "))
}
