// crates/labeldb-server/tests/series_api.rs
// ============================================================================
// Module: Series API Tests
// Description: Validate the /api/v1/series HTTP surface.
// Purpose: Exercise parameter parsing, label shaping, and error mapping.
// Dependencies: labeldb-server, labeldb-store, axum, tower, http-body-util
// ============================================================================

//! ## Overview
//! Drives the router with in-memory requests: successful series lookups with
//! shaped label maps, limit trimming, client errors for malformed selectors
//! and timestamps and for matcher sets without a namespace, and the metrics
//! exposition route.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Utc;
use http_body_util::BodyExt;
use labeldb_core::Dimensions;
use labeldb_core::Metric;
use labeldb_server::AppState;
use labeldb_server::HttpMetrics;
use labeldb_server::SharedRegistry;
use labeldb_server::router;
use labeldb_store::LabelStore;
use prometheus_client::registry::Registry;
use tempfile::TempDir;
use tower::util::ServiceExt;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const BASE: i64 = 1_735_689_600; // 2025-01-01T00:00:00Z

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn seeded_router() -> (TempDir, Router) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(LabelStore::open(dir.path()).unwrap());
    for (name, value) in [("CPUUtilization", "i-1"), ("NetworkIn", "i-2")] {
        store
            .record_metric(&Metric {
                namespace: "AWS/EC2".to_owned(),
                metric_name: name.to_owned(),
                region: "us-east-1".to_owned(),
                dimensions: Dimensions::from_pairs([("InstanceId", value)]),
                from_ts: ts(BASE),
                to_ts: ts(BASE + 3_600),
                updated_at: ts(BASE + 3_600),
            })
            .unwrap();
    }

    let mut registry = Registry::default();
    let metrics = HttpMetrics::new(&mut registry);
    let state = AppState {
        store,
        fresh: None,
        metrics,
        registry: SharedRegistry::new(registry),
    };
    (dir, router(state))
}

fn series_uri(selectors: &[&str], start: &str, end: &str, limit: Option<usize>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for selector in selectors {
        serializer.append_pair("match[]", selector);
    }
    serializer.append_pair("start", start);
    serializer.append_pair("end", end);
    if let Some(limit) = limit {
        serializer.append_pair("limit", &limit.to_string());
    }
    format!("/api/v1/series?{}", serializer.finish())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

// ============================================================================
// SECTION: Success Paths
// ============================================================================

#[tokio::test]
async fn series_returns_shaped_labels() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &[r#"{Namespace="AWS/EC2",__name__="CPUUtilization"}"#],
        "2025-01-01T00:00:00Z",
        "2025-01-01T01:00:00Z",
        None,
    );
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["__name__"], "CPUUtilization");
    assert_eq!(data[0]["MetricName"], "CPUUtilization");
    assert_eq!(data[0]["Namespace"], "AWS/EC2");
    assert_eq!(data[0]["Region"], "us-east-1");
    assert_eq!(data[0]["InstanceId"], "i-1");
}

#[tokio::test]
async fn series_accepts_unix_timestamps_and_merges_selectors() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &[
            r#"CPUUtilization{Namespace="AWS/EC2"}"#,
            r#"NetworkIn{Namespace="AWS/EC2"}"#,
        ],
        &BASE.to_string(),
        &(BASE + 3_600).to_string(),
        None,
    );
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn series_trims_to_limit() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &[r#"{Namespace="AWS/EC2"}"#],
        &BASE.to_string(),
        &(BASE + 3_600).to_string(),
        Some(1),
    );
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn series_outside_window_is_empty() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &[r#"{Namespace="AWS/EC2"}"#],
        &(BASE - 7_200).to_string(),
        &(BASE - 3_600).to_string(),
        None,
    );
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

// ============================================================================
// SECTION: Client Errors
// ============================================================================

#[tokio::test]
async fn malformed_selector_is_a_client_error() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(&["{broken"], "0", "1", None);
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("invalid match[] parameter"));
}

#[tokio::test]
async fn missing_namespace_is_a_client_error() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &["CPUUtilization"],
        &BASE.to_string(),
        &(BASE + 10).to_string(),
        None,
    );
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("namespace"));
}

#[tokio::test]
async fn bad_timestamp_is_a_client_error() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(&[r#"{Namespace="AWS/EC2"}"#], "yesterday", "1", None);
    let (status, body) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("start timestamp"));
}

#[tokio::test]
async fn missing_match_is_a_client_error() {
    let (_dir, router) = seeded_router();
    let (status, body) = get(&router, "/api/v1/series?start=0&end=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("match[]"));
}

// ============================================================================
// SECTION: Metrics Exposition
// ============================================================================

#[tokio::test]
async fn metrics_route_reports_request_counters() {
    let (_dir, router) = seeded_router();
    let uri = series_uri(
        &[r#"{Namespace="AWS/EC2"}"#],
        &BASE.to_string(),
        &(BASE + 10).to_string(),
        None,
    );
    let (status, _) = get(&router, &uri).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("http_requests_total"));
    assert!(body.contains(r#"code="200""#));
}
