// crates/labeldb-server/src/lib.rs
// ============================================================================
// Module: Label Query Surface
// Description: HTTP surface and selector parsing for the label store.
// Purpose: Expose /api/v1/series and /metrics; host the service binaries.
// Dependencies: labeldb-store, labeldb-recorder, axum, prometheus-client
// ============================================================================

//! ## Overview
//! This crate carries everything between the wire and the store: the
//! Prometheus selector parser, the series endpoint with its request
//! instrumentation, the metrics exposition route, and the contract for the
//! fresh-metrics collaborator. The `recorder` and `query` binaries assemble
//! these pieces into the two service processes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod api;
pub mod fresh;
pub mod selector;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use api::AppState;
pub use api::HttpMetrics;
pub use api::SharedRegistry;
pub use api::metrics_router;
pub use api::router;
pub use fresh::FRESH_WINDOW;
pub use fresh::FreshMetricsSource;
pub use selector::SelectorError;
pub use selector::parse_selector;
