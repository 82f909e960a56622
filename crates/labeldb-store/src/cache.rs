// crates/labeldb-store/src/cache.rs
// ============================================================================
// Module: Partition Handle Cache
// Description: Lazily opened per-partition database handles with idle eviction.
// Purpose: Bound open file handles while keeping hot partitions ready.
// Dependencies: chrono, rusqlite, tracing
// ============================================================================

//! ## Overview
//! Each partition window is an independent database file. The cache opens a
//! handle on first access, stamps it with a last-used instant on every
//! access, and closes handles that sit idle beyond [`IDLE_TIMEOUT`].
//!
//! Invariants:
//! - The last-used stamp is updated on the stored entry itself, under the
//!   cache lock, on every `get`.
//! - Handles are `Arc`-shared: readers keep a removed handle alive until
//!   their statements finish; the file closes with the last reference.
//! - All cache mutation serializes on the internal map lock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::error::StoreError;
use crate::partition::db_file_name;
use crate::partition::table_suffix;
use crate::regexp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// How long a handle may sit unused before `cleanup_idle` closes it.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
/// Busy timeout applied to every partition connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);
/// WAL pages accumulated before SQLite checkpoints automatically.
const WAL_AUTOCHECKPOINT_PAGES: u32 = 100;

// ============================================================================
// SECTION: Handle
// ============================================================================

/// An open connection to one partition's database file.
pub(crate) struct PartitionHandle {
    /// The underlying connection, serialized per handle.
    pub(crate) conn: Mutex<Connection>,
}

/// Cache entry pairing a shared handle with its last-used stamp.
struct CachedPartition {
    handle: Arc<PartitionHandle>,
    last_used: Instant,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Lazily populated map from partition suffix to open handle.
pub(crate) struct PartitionCache {
    /// Directory holding the partition database files.
    dir: PathBuf,
    /// Open handles keyed by partition suffix.
    inner: Mutex<HashMap<String, CachedPartition>>,
}

impl PartitionCache {
    /// Creates an empty cache over `dir`.
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handle for the partition containing `t`, opening it on
    /// first access and stamping it as used now.
    pub(crate) fn get(&self, t: DateTime<Utc>) -> Result<Arc<PartitionHandle>, StoreError> {
        let suffix = table_suffix(t);
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(entry) = inner.get_mut(&suffix) {
            entry.last_used = Instant::now();
            return Ok(Arc::clone(&entry.handle));
        }

        let path = self.dir.join(db_file_name(t));
        let conn = open_partition(&path)?;
        let handle = Arc::new(PartitionHandle {
            conn: Mutex::new(conn),
        });
        inner.insert(
            suffix,
            CachedPartition {
                handle: Arc::clone(&handle),
                last_used: Instant::now(),
            },
        );
        Ok(handle)
    }

    /// Issues a truncating WAL checkpoint on every open handle.
    pub(crate) fn checkpoint_all(&self) -> Result<(), StoreError> {
        let handles = self.snapshot()?;
        for (suffix, handle) in handles {
            let conn = handle.conn.lock().map_err(|_| StoreError::Poisoned)?;
            let (busy, pages, moved) = conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(StoreError::Unavailable)?;
            debug!(suffix, busy, pages, moved, "wal checkpoint");
        }
        Ok(())
    }

    /// Closes and removes handles idle beyond [`IDLE_TIMEOUT`] as of `now`.
    ///
    /// Close failures are logged; the handle is removed regardless.
    pub(crate) fn cleanup_idle(&self, now: Instant) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let idle: Vec<String> = inner
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_used) > IDLE_TIMEOUT)
            .map(|(suffix, _)| suffix.clone())
            .collect();
        for suffix in idle {
            if let Some(entry) = inner.remove(&suffix) {
                if let Err(message) = close_handle(entry.handle) {
                    warn!(suffix, error = %message, "failed to close idle partition handle");
                } else {
                    info!(suffix, "closed idle partition handle");
                }
            }
        }
        Ok(())
    }

    /// Closes every handle, aggregating failures without short-circuiting.
    pub(crate) fn close_all(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        let mut failures = Vec::new();
        for (suffix, entry) in inner.drain() {
            if let Err(message) = close_handle(entry.handle) {
                warn!(suffix, error = %message, "failed to close partition handle");
                failures.push(format!("{suffix}: {message}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Close(failures.join("; ")))
        }
    }

    /// Snapshots the open handles without holding the map lock afterwards.
    fn snapshot(&self) -> Result<Vec<(String, Arc<PartitionHandle>)>, StoreError> {
        let inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(inner
            .iter()
            .map(|(suffix, entry)| (suffix.clone(), Arc::clone(&entry.handle)))
            .collect())
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Opens one partition database with the store's connection options.
fn open_partition(path: &std::path::Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(StoreError::Unavailable)?;
    conn.execute_batch("PRAGMA journal_mode = wal;")
        .map_err(StoreError::Unavailable)?;
    conn.execute_batch("PRAGMA synchronous = normal;")
        .map_err(StoreError::Unavailable)?;
    conn.execute_batch(&format!(
        "PRAGMA wal_autocheckpoint = {WAL_AUTOCHECKPOINT_PAGES};"
    ))
    .map_err(StoreError::Unavailable)?;
    conn.busy_timeout(BUSY_TIMEOUT).map_err(StoreError::Unavailable)?;
    regexp::register(&conn).map_err(StoreError::Unavailable)?;
    Ok(conn)
}

/// Closes a handle when this cache holds the last reference.
///
/// A handle still borrowed by an in-flight statement closes when that
/// reference drops; only an explicit close failure is reported.
fn close_handle(handle: Arc<PartitionHandle>) -> Result<(), String> {
    match Arc::try_unwrap(handle) {
        Ok(owned) => match owned.conn.into_inner() {
            Ok(conn) => conn.close().map_err(|(_, err)| err.to_string()),
            Err(_) => Err("connection mutex poisoned".to_owned()),
        },
        Err(_still_shared) => Ok(()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
