// crates/labeldb-store/src/store.rs
// ============================================================================
// Module: Partitioned Label Store
// Description: Store facade over partition handles and schema bootstrap.
// Purpose: Own shared state and expose lifecycle operations.
// Dependencies: chrono, rusqlite
// ============================================================================

//! ## Overview
//! [`LabelStore`] ties the partition handle cache and the schema-init memo
//! together. The write and query engines live in their own modules
//! ([`crate::record`], [`crate::query`]) and extend this type.
//!
//! The store is `Send + Sync`: reads may run concurrently with writes and
//! with each other, every connection is serialized behind its own mutex, and
//! the write-ahead log provides per-connection read/write isolation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use crate::cache::PartitionCache;
use crate::error::StoreError;
use crate::schema::SchemaRegistry;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Time-partitioned embedded label store.
pub struct LabelStore {
    /// Open partition handles with idle eviction.
    pub(crate) cache: PartitionCache,
    /// Memoized per-(partition, namespace) schema bootstrap.
    pub(crate) schema: SchemaRegistry,
}

impl LabelStore {
    /// Opens a store over `dir`, creating the directory when absent.
    ///
    /// Partition databases are opened lazily on first write or query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the directory cannot be prepared.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir(&dir)?;
        Ok(Self {
            cache: PartitionCache::new(dir),
            schema: SchemaRegistry::new(),
        })
    }

    /// Issues a truncating WAL checkpoint on every open partition handle.
    ///
    /// # Errors
    ///
    /// Returns the first checkpoint failure.
    pub fn wal_checkpoint(&self) -> Result<(), StoreError> {
        self.cache.checkpoint_all()
    }

    /// Closes partition handles idle beyond the idle timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] when the cache lock is poisoned;
    /// individual close failures are logged, not returned.
    pub fn cleanup_idle(&self) -> Result<(), StoreError> {
        self.cache.cleanup_idle(Instant::now())
    }

    /// Closes every open partition handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Close`] aggregating every per-handle failure;
    /// all handles are removed regardless.
    pub fn close(&self) -> Result<(), StoreError> {
        self.cache.close_all()
    }
}

/// Creates the store directory, rejecting a path occupied by a file.
fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    if dir.exists() && !dir.is_dir() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("path exists but is not a directory: {}", dir.display()),
        )));
    }
    std::fs::create_dir_all(dir).map_err(StoreError::Io)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
