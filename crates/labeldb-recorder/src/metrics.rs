// crates/labeldb-recorder/src/metrics.rs
// ============================================================================
// Module: Recorder Metrics
// Description: Prometheus instrumentation for the recorder loop.
// Purpose: Expose record and WAL-checkpoint outcomes before the first event.
// Dependencies: prometheus-client
// ============================================================================

//! ## Overview
//! Counters and latency histograms for the two recorder activities: writing
//! identities and checkpointing the write-ahead log. Both `status` buckets
//! are pre-created at registration so `success` and `error` series appear in
//! scrapes before the first event occurs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::metrics::histogram::exponential_buckets;
use prometheus_client::registry::Registry;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Outcome label attached to recorder counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabels {
    /// `success` or `error`.
    pub status: String,
}

impl StatusLabels {
    fn success() -> Self {
        Self {
            status: "success".to_owned(),
        }
    }

    fn error() -> Self {
        Self {
            status: "error".to_owned(),
        }
    }
}

// ============================================================================
// SECTION: Recorder Metrics
// ============================================================================

/// Metrics owned by the recorder loop.
#[derive(Clone)]
pub struct RecorderMetrics {
    /// Identities processed, by outcome.
    record_total: Family<StatusLabels, Counter>,
    /// Latency of one record call including retries.
    record_duration_seconds: Histogram,
    /// WAL checkpoint sweeps, by outcome.
    wal_checkpoint_total: Family<StatusLabels, Counter>,
    /// Latency of one checkpoint sweep.
    wal_checkpoint_duration_seconds: Histogram,
}

impl std::fmt::Debug for RecorderMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderMetrics").finish_non_exhaustive()
    }
}

impl RecorderMetrics {
    /// Creates recorder metrics and registers them with `registry`.
    #[must_use]
    pub fn new(registry: &mut Registry) -> Self {
        // The text encoder suffixes counters with `_total` itself, so
        // counters register under their base name.
        let record_total = Family::<StatusLabels, Counter>::default();
        registry.register(
            "record",
            "Total number of recorded metric identities",
            record_total.clone(),
        );

        let record_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "record_duration_seconds",
            "Time taken to record one metric identity",
            record_duration_seconds.clone(),
        );

        let wal_checkpoint_total = Family::<StatusLabels, Counter>::default();
        registry.register(
            "wal_checkpoint",
            "Total number of WAL checkpoint sweeps",
            wal_checkpoint_total.clone(),
        );

        let wal_checkpoint_duration_seconds = Histogram::new(exponential_buckets(0.001, 2.0, 14));
        registry.register(
            "wal_checkpoint_duration_seconds",
            "Time taken by one WAL checkpoint sweep",
            wal_checkpoint_duration_seconds.clone(),
        );

        // Pre-create both outcome series so they scrape as 0 before any
        // event occurs.
        for family in [&record_total, &wal_checkpoint_total] {
            family.get_or_create(&StatusLabels::success());
            family.get_or_create(&StatusLabels::error());
        }

        Self {
            record_total,
            record_duration_seconds,
            wal_checkpoint_total,
            wal_checkpoint_duration_seconds,
        }
    }

    /// Counts one record outcome and its duration.
    pub fn observe_record(&self, success: bool, duration: Duration) {
        let labels = if success {
            StatusLabels::success()
        } else {
            StatusLabels::error()
        };
        self.record_total.get_or_create(&labels).inc();
        self.record_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Counts one checkpoint outcome and its duration.
    pub fn observe_checkpoint(&self, success: bool, duration: Duration) {
        let labels = if success {
            StatusLabels::success()
        } else {
            StatusLabels::error()
        };
        self.wal_checkpoint_total.get_or_create(&labels).inc();
        self.wal_checkpoint_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Returns the record counter for an outcome, for tests and health
    /// reporting.
    #[must_use]
    pub fn record_count(&self, status: &str) -> u64 {
        self.record_total
            .get_or_create(&StatusLabels {
                status: status.to_owned(),
            })
            .get()
    }

    /// Returns the checkpoint counter for an outcome.
    #[must_use]
    pub fn checkpoint_count(&self, status: &str) -> u64 {
        self.wal_checkpoint_total
            .get_or_create(&StatusLabels {
                status: status.to_owned(),
            })
            .get()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
