// crates/labeldb-server/src/fresh.rs
// ============================================================================
// Module: Fresh Metrics Contract
// Description: Collaborator interface for very recent identities.
// Purpose: Let deployments merge upstream listings into series results.
// Dependencies: labeldb-core, labeldb-store
// ============================================================================

//! ## Overview
//! CloudWatch publishes metrics with a delay the store cannot see past: a
//! query window touching the last 3h50m may concern identities not yet
//! scraped. Deployments can wire a [`FreshMetricsSource`] that lists
//! dimensions straight from the upstream API; the series handler merges its
//! results into the same keyed map before consulting the store. The
//! implementation lives outside this repository.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use labeldb_core::MetricSet;
use labeldb_store::LabelMatcher;
use labeldb_store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Window before "now" within which the fresh source is consulted.
///
/// Matches the scraper's backdating allowance for CloudWatch publication
/// delay (3h50m).
pub const FRESH_WINDOW: Duration = Duration::from_secs((3 * 60 + 50) * 60);

// ============================================================================
// SECTION: Contract
// ============================================================================

/// Source of identities too recent to have been scraped into the store.
pub trait FreshMetricsSource: Send + Sync {
    /// Lists identities satisfying `matchers`, merging into `result` under
    /// [`labeldb_core::Metric::unique_key`].
    ///
    /// # Errors
    ///
    /// Implementations surface upstream failures as [`StoreError::Query`]-
    /// compatible errors; the series handler maps them to a server error.
    fn query_metrics(
        &self,
        matchers: &[LabelMatcher],
        result: &mut MetricSet,
    ) -> Result<(), StoreError>;
}
