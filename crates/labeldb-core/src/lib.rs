// crates/labeldb-core/src/lib.rs
// ============================================================================
// Module: Metric Identity Model
// Description: Core types shared by the label store, recorder, and query API.
// Purpose: Define metric identities, canonical dimension JSON, and label shaping.
// Dependencies: chrono, serde
// ============================================================================

//! ## Overview
//! This crate defines the metric identity model: the tuple of namespace,
//! metric name, region, and dimension set, together with the lifetime
//! interval during which the identity was observed. The canonical dimension
//! encoding and the content-derived unique key defined here are relied on by
//! the store's uniqueness index and by cross-partition result merging.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod metric;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use metric::Dimension;
pub use metric::Dimensions;
pub use metric::Metric;
pub use metric::MetricSet;
pub use metric::RESERVED_NAME_LABEL;
pub use metric::safe_metric_name;
