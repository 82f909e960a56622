// crates/labeldb-recorder/src/lib.rs
// ============================================================================
// Module: Recorder Loop
// Description: Single consumer of the ingest queue with retry and housekeeping.
// Purpose: Drain identity records into the store at a bounded rate.
// Dependencies: labeldb-core, labeldb-store, prometheus-client, tokio
// ============================================================================

//! ## Overview
//! The recorder is the only writer: it consumes the bounded ingest channel
//! serially, so no partition ever sees concurrent writers. Each identity
//! takes one rate-limit token and up to [`MAX_RETRY`] attempts with
//! exponential backoff; deterministic validation failures are dropped
//! without retry, and retry exhaustion drops the identity with an error log
//! and a counter increment — the loop never stops for one bad record.
//!
//! Every [`WAL_CHECKPOINT_INTERVAL`] the loop truncates the write-ahead logs
//! of all open partitions and closes idle handles. Closing the channel's
//! send side shuts the loop down: it drains buffered records, then exits.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod metrics;
pub mod rate_limit;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use labeldb_core::Metric;
use labeldb_store::LabelStore;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

pub use metrics::RecorderMetrics;
pub use rate_limit::TokenBucket;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bounded capacity of the ingest channel.
pub const INGEST_QUEUE_CAPACITY: usize = 1_000;
/// Sustained record rate in identities per second.
pub const RECORD_RATE_LIMIT: f64 = 200.0;
/// Rate limiter burst size.
pub const RECORD_RATE_BURST: f64 = 1.0;
/// Attempts per identity before it is dropped.
pub const MAX_RETRY: u32 = 3;
/// Base backoff between attempts; doubles per attempt.
pub const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Interval between WAL checkpoint sweeps.
pub const WAL_CHECKPOINT_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

// ============================================================================
// SECTION: Recorder
// ============================================================================

/// Creates the bounded ingest channel producers feed and the recorder
/// drains.
#[must_use]
pub fn ingest_channel() -> (mpsc::Sender<Metric>, mpsc::Receiver<Metric>) {
    mpsc::channel(INGEST_QUEUE_CAPACITY)
}

/// Single consumer of the ingest queue.
pub struct Recorder {
    store: Arc<LabelStore>,
    receiver: mpsc::Receiver<Metric>,
    limiter: TokenBucket,
    metrics: RecorderMetrics,
    checkpoint_interval: Duration,
}

impl Recorder {
    /// Builds a recorder over `store` draining `receiver`.
    #[must_use]
    pub fn new(
        store: Arc<LabelStore>,
        receiver: mpsc::Receiver<Metric>,
        metrics: RecorderMetrics,
    ) -> Self {
        Self {
            store,
            receiver,
            limiter: TokenBucket::new(RECORD_RATE_LIMIT, RECORD_RATE_BURST),
            metrics,
            checkpoint_interval: WAL_CHECKPOINT_INTERVAL,
        }
    }

    /// Overrides the checkpoint interval (tests and operational tuning).
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: Duration) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Runs until the ingest channel closes, then drains and returns.
    pub async fn run(mut self) {
        let start = tokio::time::Instant::now() + self.checkpoint_interval;
        let mut checkpoint = tokio::time::interval_at(start, self.checkpoint_interval);
        checkpoint.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.receiver.recv() => {
                    match received {
                        Some(metric) => {
                            self.limiter.acquire().await;
                            self.record_with_retry(&metric).await;
                        }
                        None => break,
                    }
                }
                _ = checkpoint.tick() => {
                    self.run_checkpoint();
                }
            }
        }
        info!("ingest channel closed, recorder loop drained");
    }

    /// Records one identity with bounded retry and backoff.
    async fn record_with_retry(&self, metric: &Metric) {
        let started = Instant::now();
        for attempt in 0..MAX_RETRY {
            match self.store.record_metric(metric) {
                Ok(()) => {
                    self.metrics.observe_record(true, started.elapsed());
                    return;
                }
                Err(err) if !err.is_retryable() => {
                    error!(
                        error = %err,
                        namespace = %metric.namespace,
                        metric_name = %metric.metric_name,
                        "dropped invalid metric identity"
                    );
                    self.metrics.observe_record(false, started.elapsed());
                    return;
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        attempt,
                        namespace = %metric.namespace,
                        metric_name = %metric.metric_name,
                        "failed to record metric identity"
                    );
                    if attempt + 1 < MAX_RETRY {
                        tokio::time::sleep(RETRY_BACKOFF_BASE * 2_u32.pow(attempt)).await;
                    }
                }
            }
        }
        error!(
            namespace = %metric.namespace,
            metric_name = %metric.metric_name,
            "dropped metric identity after retry exhaustion"
        );
        self.metrics.observe_record(false, started.elapsed());
    }

    /// Checkpoints every open partition, then closes idle handles.
    fn run_checkpoint(&self) {
        let started = Instant::now();
        match self.store.wal_checkpoint() {
            Ok(()) => {
                self.metrics.observe_checkpoint(true, started.elapsed());
                debug!("wal checkpoint sweep completed");
            }
            Err(err) => {
                self.metrics.observe_checkpoint(false, started.elapsed());
                error!(error = %err, "wal checkpoint sweep failed");
            }
        }
        if let Err(err) = self.store.cleanup_idle() {
            error!(error = %err, "idle handle cleanup failed");
        }
    }
}
