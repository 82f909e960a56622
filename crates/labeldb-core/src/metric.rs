// crates/labeldb-core/src/metric.rs
// ============================================================================
// Module: Metric Identity
// Description: Metric identities, dimensions, and Prometheus label shaping.
// Purpose: Provide canonical serialization and stable merge keys.
// Dependencies: chrono, serde
// ============================================================================

//! ## Overview
//! A [`Metric`] is a dimensional identity: (namespace, metric name, region,
//! dimension set) plus the lifetime interval `[from_ts, to_ts]` during which
//! it was observed. Identities carry no samples.
//!
//! Invariants:
//! - [`Dimensions`] serialize to a JSON object with keys in lexicographic
//!   order and no whitespace variance; the store's uniqueness index compares
//!   this encoding byte for byte.
//! - The reserved `__name__` key is filtered on both serialization and
//!   deserialization.
//! - [`Metric::unique_key`] is stable across partitions and is the only
//!   cross-partition merge key; per-partition row ids never leave the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::ser::SerializeMap;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved Prometheus label carrying the sanitized metric name.
///
/// Dimensions never store this key; it is filtered during encoding and
/// decoding and reintroduced only by [`Metric::labels`].
pub const RESERVED_NAME_LABEL: &str = "__name__";

// ============================================================================
// SECTION: Dimensions
// ============================================================================

/// A single dimension name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Dimension name.
    pub name: String,
    /// Dimension value.
    pub value: String,
}

/// An ordered dimension set, kept sorted by dimension name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimensions(Vec<Dimension>);

impl Dimensions {
    /// Builds a dimension set from name/value pairs.
    ///
    /// Pairs are sorted by name; the reserved `__name__` key is dropped.
    #[must_use]
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut dims: Vec<Dimension> = pairs
            .into_iter()
            .map(|(name, value)| Dimension {
                name: name.into(),
                value: value.into(),
            })
            .filter(|d| d.name != RESERVED_NAME_LABEL)
            .collect();
        dims.sort_by(|a, b| a.name.cmp(&b.name));
        Self(dims)
    }

    /// Returns the dimensions in name order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Dimension> {
        self.0.iter()
    }

    /// Returns the number of dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dimensions {
    type Item = &'a Dimension;
    type IntoIter = std::slice::Iter<'a, Dimension>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Dimensions {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // The set is sorted at construction; emit entries in stored order so
        // the encoding stays byte-stable for the uniqueness index.
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for d in &self.0 {
            map.serialize_entry(&d.name, &d.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Dimensions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<String, String>::deserialize(deserializer)?;
        Ok(Self::from_pairs(entries))
    }
}

// ============================================================================
// SECTION: Metric
// ============================================================================

/// A metric identity with its observed lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    /// Enclosing namespace, e.g. `AWS/EC2`. Never empty.
    pub namespace: String,
    /// Metric name as published by the source. Never empty.
    pub metric_name: String,
    /// Region the identity was observed in. Never empty.
    pub region: String,
    /// Dimension set further identifying the metric.
    pub dimensions: Dimensions,
    /// Start of the observed lifetime (inclusive, UTC seconds).
    pub from_ts: DateTime<Utc>,
    /// End of the observed lifetime (inclusive, UTC seconds).
    pub to_ts: DateTime<Utc>,
    /// Wall-clock timestamp of the most recent write.
    pub updated_at: DateTime<Utc>,
}

/// Query results keyed by [`Metric::unique_key`].
pub type MetricSet = BTreeMap<String, Metric>;

impl Metric {
    /// Returns the content-derived key identifying this metric across
    /// partitions.
    ///
    /// The key concatenates namespace, metric name, region, and every
    /// dimension pair in name order. Per-partition row ids are unstable and
    /// must never be used for merging.
    #[must_use]
    pub fn unique_key(&self) -> String {
        let mut key = String::with_capacity(
            self.namespace.len() + self.metric_name.len() + self.region.len(),
        );
        key.push_str(&self.namespace);
        key.push_str(&self.metric_name);
        key.push_str(&self.region);
        for d in &self.dimensions {
            key.push_str(&d.name);
            key.push_str(&d.value);
        }
        key
    }

    /// Shapes the identity into a Prometheus label map.
    ///
    /// `__name__` carries the sanitized metric name; `MetricName` preserves
    /// the original spelling for round-tripping.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(RESERVED_NAME_LABEL.to_owned(), safe_metric_name(&self.metric_name));
        labels.insert("MetricName".to_owned(), self.metric_name.clone());
        labels.insert("Namespace".to_owned(), self.namespace.clone());
        labels.insert("Region".to_owned(), self.region.clone());
        for d in &self.dimensions {
            labels.insert(d.name.clone(), d.value.clone());
        }
        labels
    }
}

// ============================================================================
// SECTION: Metric Name Sanitization
// ============================================================================

/// Rewrites a metric name into the Prometheus-legal charset.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Every
/// character outside `[A-Za-z0-9_:]` becomes `_`, and a leading decimal
/// digit is replaced with `_`. The function is idempotent.
#[must_use]
pub fn safe_metric_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.as_bytes()[0].is_ascii_digit() {
        out.replace_range(0..1, "_");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_metric() -> Metric {
        Metric {
            namespace: "AWS/EC2".to_owned(),
            metric_name: "CPUUtilization".to_owned(),
            region: "us-east-1".to_owned(),
            dimensions: Dimensions::from_pairs([("InstanceId", "i-012345")]),
            from_ts: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            to_ts: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn dimensions_serialize_sorted_and_compact() {
        let dims = Dimensions::from_pairs([("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        let json = serde_json::to_string(&dims).unwrap();
        assert_eq!(json, r#"{"alpha":"2","mid":"3","zeta":"1"}"#);
    }

    #[test]
    fn dimensions_filter_reserved_name_label() {
        let dims = Dimensions::from_pairs([("__name__", "sneaky"), ("dim1", "v1")]);
        let json = serde_json::to_string(&dims).unwrap();
        assert_eq!(json, r#"{"dim1":"v1"}"#);

        let parsed: Dimensions =
            serde_json::from_str(r#"{"dim1":"v1","__name__":"sneaky"}"#).unwrap();
        assert_eq!(parsed, Dimensions::from_pairs([("dim1", "v1")]));
    }

    #[test]
    fn dimensions_round_trip() {
        let dims = Dimensions::from_pairs([("b", "2"), ("a", "1")]);
        let json = serde_json::to_string(&dims).unwrap();
        let parsed: Dimensions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dims);
    }

    #[test]
    fn unique_key_is_order_insensitive() {
        let mut a = sample_metric();
        a.dimensions = Dimensions::from_pairs([("x", "1"), ("a", "2")]);
        let mut b = sample_metric();
        b.dimensions = Dimensions::from_pairs([("a", "2"), ("x", "1")]);
        assert_eq!(a.unique_key(), b.unique_key());
        assert_eq!(a.unique_key(), "AWS/EC2CPUUtilizationus-east-1a2x1");
    }

    #[test]
    fn labels_shape() {
        let labels = sample_metric().labels();
        assert_eq!(labels.get("__name__").unwrap(), "CPUUtilization");
        assert_eq!(labels.get("MetricName").unwrap(), "CPUUtilization");
        assert_eq!(labels.get("Namespace").unwrap(), "AWS/EC2");
        assert_eq!(labels.get("Region").unwrap(), "us-east-1");
        assert_eq!(labels.get("InstanceId").unwrap(), "i-012345");
    }

    #[test]
    fn labels_sanitize_name() {
        let mut m = sample_metric();
        m.metric_name = "5xxErrorRate%".to_owned();
        assert_eq!(m.labels().get("__name__").unwrap(), "_xxErrorRate_");
        assert_eq!(m.labels().get("MetricName").unwrap(), "5xxErrorRate%");
    }

    #[test]
    fn safe_metric_name_rewrites_invalid_characters() {
        assert_eq!(safe_metric_name("cpu.usage-total"), "cpu_usage_total");
        assert_eq!(safe_metric_name("name:with:colons"), "name:with:colons");
        assert_eq!(safe_metric_name("4xxErrors"), "_xxErrors");
        assert_eq!(safe_metric_name(""), "");
    }

    #[test]
    fn safe_metric_name_is_idempotent() {
        for name in ["cpu.usage", "9lives", "ok_name", "a b c", "日本語"] {
            let once = safe_metric_name(name);
            assert_eq!(safe_metric_name(&once), once);
        }
    }
}
