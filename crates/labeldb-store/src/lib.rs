// crates/labeldb-store/src/lib.rs
// ============================================================================
// Module: Partitioned Label Store
// Description: Time-partitioned embedded store and matcher query engine.
// Purpose: Index metric identities for range-constrained label lookups.
// Dependencies: labeldb-core, rusqlite, lru, fancy-regex, chrono
// ============================================================================

//! ## Overview
//! This crate stores metric identities — not samples — sharded into fixed
//! 84-day partition windows, one SQLite file per window. Each partition
//! carries an identity table plus a per-namespace rtree lifetime index, and
//! answers "which identities matching these label matchers were alive during
//! `[from, to]`?" queries for a Prometheus-compatible series API.
//!
//! Matcher regular expressions follow PCRE semantics via a backtracking
//! engine, which is a documented compatibility break from Prometheus's
//! RE2-class matchers.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod cache;
mod error;
pub mod matcher;
pub mod partition;
mod query;
mod record;
pub mod regexp;
mod schema;
mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::StoreError;
pub use matcher::LabelMatcher;
pub use matcher::MatchOp;
pub use store::LabelStore;
