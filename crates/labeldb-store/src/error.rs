// crates/labeldb-store/src/error.rs
// ============================================================================
// Module: Store Errors
// Description: Error taxonomy for the partitioned label store.
// Purpose: Give callers stable variants for retry and HTTP mapping decisions.
// Dependencies: rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every fallible store operation surfaces a [`StoreError`]. The taxonomy is
//! semantic rather than mechanical: the recorder consults
//! [`StoreError::is_retryable`] to decide between backoff and drop, and the
//! HTTP layer maps [`StoreError::MissingNamespace`] to a client error while
//! everything else becomes a server error.
//!
//! A partition that was never written reports `no such table: ` from the
//! query engine; that case is contained inside the query path and never
//! reaches callers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Errors returned by the partitioned label store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Submitted lifetime is inverted; rejected before any partition is
    /// touched and never retried.
    #[error("invalid interval: from timestamp {from} is greater than to timestamp {to}")]
    InvalidInterval {
        /// Submitted lifetime start (unix seconds).
        from: i64,
        /// Submitted lifetime end (unix seconds).
        to: i64,
    },
    /// Matcher set lacks the single required namespace equality matcher.
    #[error("exactly one namespace equality matcher with a non-empty value is required")]
    MissingNamespace,
    /// Matcher label name falls outside the Prometheus label charset.
    #[error("invalid label name: {0:?}")]
    InvalidLabelName(String),
    /// Filesystem-level failure preparing the store directory.
    #[error("store io error: {0}")]
    Io(#[source] std::io::Error),
    /// A partition database could not be opened or administered.
    #[error("partition unavailable: {0}")]
    Unavailable(#[source] rusqlite::Error),
    /// Partition DDL failed; the schema memo is left untouched.
    #[error("schema init failed: {0}")]
    SchemaInit(#[source] rusqlite::Error),
    /// Identity or lifetime upsert failed; the partition transaction rolls
    /// back.
    #[error("record failed: {0}")]
    Write(#[source] rusqlite::Error),
    /// Per-partition query failure other than a never-written partition.
    #[error("query failed: {0}")]
    Query(#[source] rusqlite::Error),
    /// Stored dimensions could not be encoded or decoded.
    #[error("dimension encoding failed: {0}")]
    Dimensions(#[from] serde_json::Error),
    /// A stored timestamp does not fit the representable datetime range.
    #[error("stored timestamp {0} is out of range")]
    TimestampRange(i64),
    /// One or more handles failed to close during shutdown.
    #[error("close failed: {0}")]
    Close(String),
    /// A store lock was poisoned by a panicking holder.
    #[error("store mutex poisoned")]
    Poisoned,
}

impl StoreError {
    /// Returns true when a retry with backoff can plausibly succeed.
    ///
    /// Validation failures are deterministic and excluded.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidInterval { .. } | Self::MissingNamespace | Self::InvalidLabelName(_)
        )
    }
}
