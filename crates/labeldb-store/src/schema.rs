// crates/labeldb-store/src/schema.rs
// ============================================================================
// Module: Schema Bootstrapper
// Description: Idempotent per-(partition, namespace) table materialization.
// Purpose: Create identity and lifetime tables on first write, memoized.
// Dependencies: lru, rusqlite
// ============================================================================

//! ## Overview
//! A partition's tables come into existence on its first write: the identity
//! table is shared per partition, the lifetime index is additionally keyed by
//! namespace. The DDL is idempotent (`IF NOT EXISTS`), so the bounded memo is
//! purely a shortcut past repeated DDL round trips — evicting it is always
//! safe, and it is populated only after the DDL statement succeeds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use lru::LruCache;
use rusqlite::Transaction;

use crate::error::StoreError;
use crate::partition::lifetime_table_suffix;
use crate::partition::table_suffix;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bounded capacity of the schema-init memo.
const INIT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1_000) {
    Some(n) => n,
    None => panic!("init cache size must be non-zero"),
};

// ============================================================================
// SECTION: DDL
// ============================================================================

/// Renders the identity-table and lifetime-index DDL for one
/// (partition, namespace) pair.
///
/// The lifetime index is a 1-D rtree with 32-bit integer coordinates over
/// the identity's unix-second lifetime.
fn render_ddl(suffix: &str, lifetime_suffix: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS metrics{suffix} (\n\
         \tmetric_id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         \tnamespace TEXT NOT NULL,\n\
         \tmetric_name TEXT NOT NULL,\n\
         \tregion TEXT NOT NULL,\n\
         \tdimensions JSON NOT NULL,\n\
         \tfrom_timestamp INTEGER NOT NULL,\n\
         \tto_timestamp INTEGER NOT NULL,\n\
         \tupdated_at INTEGER NOT NULL\n\
         );\n\
         CREATE UNIQUE INDEX IF NOT EXISTS metrics{suffix}_identity_idx\n\
         \tON metrics{suffix} (namespace, metric_name, region, dimensions);\n\
         CREATE VIRTUAL TABLE IF NOT EXISTS metrics_lifetime{lifetime_suffix}\n\
         \tUSING rtree_i32(metric_id, from_timestamp, to_timestamp);"
    )
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Memoized schema bootstrapper shared by all write paths of a store.
pub(crate) struct SchemaRegistry {
    /// Lifetime-table suffixes whose DDL has been issued.
    memo: Mutex<LruCache<String, ()>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub(crate) fn new() -> Self {
        Self {
            memo: Mutex::new(LruCache::new(INIT_CACHE_SIZE)),
        }
    }

    /// Ensures the tables for `(partition of t, namespace)` exist, running
    /// the DDL under the caller's transaction when the memo misses.
    ///
    /// On DDL failure the memo is left untouched and the error propagates;
    /// the caller's transaction rolls back.
    pub(crate) fn ensure(
        &self,
        tx: &Transaction<'_>,
        t: DateTime<Utc>,
        namespace: &str,
    ) -> Result<(), StoreError> {
        let lifetime_suffix = lifetime_table_suffix(t, namespace);
        {
            let mut memo = self.memo.lock().map_err(|_| StoreError::Poisoned)?;
            if memo.get(&lifetime_suffix).is_some() {
                return Ok(());
            }
        }

        let ddl = render_ddl(&table_suffix(t), &lifetime_suffix);
        tx.execute_batch(&ddl).map_err(StoreError::SchemaInit)?;

        self.memo
            .lock()
            .map_err(|_| StoreError::Poisoned)?
            .put(lifetime_suffix, ());
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
