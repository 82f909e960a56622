// crates/labeldb-server/src/api.rs
// ============================================================================
// Module: Series API
// Description: Prometheus-compatible /api/v1/series endpoint and /metrics.
// Purpose: Serve label queries over HTTP with request instrumentation.
// Dependencies: axum, chrono, labeldb-store, prometheus-client, serde_json, url
// ============================================================================

//! ## Overview
//! `GET /api/v1/series?match[]=<selector>&start=<ts>&end=<ts>&limit=<n>`
//! parses each selector, queries the store over `[start, end]`, and returns
//! `{"status":"success","data":[{label: value, …}]}` shaped from each
//! identity's label map. `start`/`end` accept RFC3339 or unix seconds.
//!
//! Selector, timestamp, and limit parse failures — and a matcher set without
//! its namespace — return 400 with a plain-text reason; store failures
//! return 500. When the window reaches into the fresh horizon and a
//! [`FreshMetricsSource`] is wired, its results are merged first under the
//! same unique key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

use axum::Router;
use axum::extract::RawQuery;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use chrono::DateTime;
use chrono::Duration as ChronoDuration;
use chrono::Utc;
use labeldb_core::MetricSet;
use labeldb_store::LabelMatcher;
use labeldb_store::LabelStore;
use labeldb_store::StoreError;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::metrics::histogram::exponential_buckets;
use prometheus_client::registry::Registry;
use tracing::info;
use tracing::warn;

use crate::fresh::FRESH_WINDOW;
use crate::fresh::FreshMetricsSource;
use crate::selector::parse_selector;

// ============================================================================
// SECTION: Shared Registry
// ============================================================================

/// Handle to the process-wide Prometheus registry.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SharedRegistry {
    /// Wraps a populated registry for serving.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    /// Encodes every registered metric in Prometheus text format.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut output = String::new();
        match self.inner.lock() {
            Ok(registry) => {
                if encode(&mut output, &registry).is_err() {
                    warn!("failed to encode prometheus metrics");
                    output.clear();
                }
            }
            Err(_) => warn!("metrics registry mutex poisoned"),
        }
        output
    }
}

// ============================================================================
// SECTION: HTTP Metrics
// ============================================================================

/// Labels for the request counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RequestLabels {
    /// Response status code.
    code: String,
    /// Request method.
    method: String,
}

/// Labels for per-handler histograms.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct HandlerLabels {
    /// Handler path.
    handler: String,
}

fn duration_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.0625, 2.0, 10))
}

fn size_histogram() -> Histogram {
    Histogram::new(exponential_buckets(100.0, 2.0, 10))
}

/// Request instrumentation for the query surface.
#[derive(Clone)]
pub struct HttpMetrics {
    requests_total: Family<RequestLabels, Counter>,
    request_duration_seconds: Family<HandlerLabels, Histogram>,
    response_size_bytes: Family<HandlerLabels, Histogram>,
}

impl HttpMetrics {
    /// Creates HTTP metrics and registers them with `registry`.
    #[must_use]
    pub fn new(registry: &mut Registry) -> Self {
        // Counters register under their base name; the text encoder adds
        // the `_total` suffix.
        let requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "http_requests",
            "Total number of requests",
            requests_total.clone(),
        );

        let request_duration_seconds =
            Family::<HandlerLabels, Histogram>::new_with_constructor(
                duration_histogram as fn() -> Histogram,
            );
        registry.register(
            "http_request_duration_seconds",
            "A histogram of latencies for requests",
            request_duration_seconds.clone(),
        );

        let response_size_bytes = Family::<HandlerLabels, Histogram>::new_with_constructor(
            size_histogram as fn() -> Histogram,
        );
        registry.register(
            "http_response_size_bytes",
            "A histogram of response sizes for requests",
            response_size_bytes.clone(),
        );

        Self {
            requests_total,
            request_duration_seconds,
            response_size_bytes,
        }
    }

    fn observe(&self, handler: &str, method: &str, code: StatusCode, started: Instant, bytes: usize) {
        self.requests_total
            .get_or_create(&RequestLabels {
                code: code.as_u16().to_string(),
                method: method.to_owned(),
            })
            .inc();
        let labels = HandlerLabels {
            handler: handler.to_owned(),
        };
        self.request_duration_seconds
            .get_or_create(&labels)
            .observe(started.elapsed().as_secs_f64());
        self.response_size_bytes
            .get_or_create(&labels)
            .observe(bytes as f64);
    }
}

// ============================================================================
// SECTION: Application State
// ============================================================================

/// Shared state of the query surface.
#[derive(Clone)]
pub struct AppState {
    /// The label store queries run against.
    pub store: Arc<LabelStore>,
    /// Optional source of not-yet-scraped identities.
    pub fresh: Option<Arc<dyn FreshMetricsSource>>,
    /// Request instrumentation.
    pub metrics: HttpMetrics,
    /// Registry served at /metrics.
    pub registry: SharedRegistry,
}

/// Builds the query-surface router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/series", get(series))
        .route("/metrics", get(serve_metrics))
        .with_state(state)
}

/// Builds a router serving only /metrics (recorder process).
#[must_use]
pub fn metrics_router(registry: SharedRegistry) -> Router {
    Router::new().route("/metrics", get(serve_metrics_only)).with_state(registry)
}

// ============================================================================
// SECTION: Series Handler
// ============================================================================

/// Parsed series-request parameters.
#[derive(Debug)]
struct SeriesParams {
    selectors: Vec<Vec<LabelMatcher>>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
}

async fn series(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    let started = Instant::now();
    let raw = raw.unwrap_or_default();

    let (code, body, content_type) = match parse_series_params(&raw) {
        Err(reason) => (StatusCode::BAD_REQUEST, reason, "text/plain; charset=utf-8"),
        Ok(params) => {
            let store = Arc::clone(&state.store);
            let fresh = state.fresh.clone();
            let outcome =
                tokio::task::spawn_blocking(move || run_series_query(&store, fresh.as_deref(), &params))
                    .await;
            match outcome {
                Ok(Ok(body)) => (StatusCode::OK, body, "application/json"),
                Ok(Err((code, reason))) => (code, reason, "text/plain; charset=utf-8"),
                Err(join_err) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("query task failed: {join_err}"),
                    "text/plain; charset=utf-8",
                ),
            }
        }
    };

    info!(
        query = %raw,
        status = code.as_u16(),
        duration_ms = started.elapsed().as_secs_f64() * 1000.0,
        "series request"
    );
    state.metrics.observe("/api/v1/series", "GET", code, started, body.len());
    (code, [(CONTENT_TYPE, content_type)], body).into_response()
}

/// Parses the raw query string into series parameters.
fn parse_series_params(raw: &str) -> Result<SeriesParams, String> {
    let mut matches = Vec::new();
    let mut start = None;
    let mut end = None;
    let mut limit = 0_usize;

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        match key.as_ref() {
            "match[]" => matches.push(value.into_owned()),
            "start" => start = Some(value.into_owned()),
            "end" => end = Some(value.into_owned()),
            "limit" => {
                limit = value
                    .parse()
                    .map_err(|err| format!("failed to parse limit: {err}"))?;
            }
            _ => {}
        }
    }

    if matches.is_empty() {
        return Err("missing match[] parameter".to_owned());
    }
    let selectors = matches
        .iter()
        .map(|selector| {
            parse_selector(selector)
                .map_err(|err| format!("invalid match[] parameter: {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let start = parse_time(start.as_deref().unwrap_or_default())
        .map_err(|err| format!("failed to parse start timestamp: {err}"))?;
    let end = parse_time(end.as_deref().unwrap_or_default())
        .map_err(|err| format!("failed to parse end timestamp: {err}"))?;

    Ok(SeriesParams {
        selectors,
        start,
        end,
        limit,
    })
}

/// Parses an RFC3339 or unix-seconds timestamp.
fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| format!("not an RFC3339 or unix timestamp: {value:?}"))
}

/// Runs the store (and fresh) queries and shapes the response body.
fn run_series_query(
    store: &LabelStore,
    fresh: Option<&dyn FreshMetricsSource>,
    params: &SeriesParams,
) -> Result<String, (StatusCode, String)> {
    let mut result = MetricSet::new();

    // Identities inside the publication-delay horizon may not be scraped
    // yet; consult the fresh source first so the store query can union
    // lifetimes into its entries.
    if let Some(fresh) = fresh {
        let horizon = Utc::now() - ChronoDuration::from_std(FRESH_WINDOW).unwrap_or_default();
        if params.end > horizon {
            for matchers in &params.selectors {
                fresh.query_metrics(matchers, &mut result).map_err(|err| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("failed to query fresh metrics: {err}"),
                    )
                })?;
            }
        }
    }

    for matchers in &params.selectors {
        store
            .query_metrics(params.start, params.end, matchers, params.limit, &mut result)
            .map_err(|err| match err {
                StoreError::MissingNamespace | StoreError::InvalidLabelName(_) => (
                    StatusCode::BAD_REQUEST,
                    format!("failed to query metrics: {err}"),
                ),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to query metrics: {other}"),
                ),
            })?;
    }

    let mut data: Vec<_> = result.values().map(labeldb_core::Metric::labels).collect();
    if params.limit > 0 && data.len() > params.limit {
        data.truncate(params.limit);
    }

    let response = serde_json::json!({
        "status": "success",
        "data": data,
    });
    Ok(response.to_string())
}

// ============================================================================
// SECTION: Metrics Handlers
// ============================================================================

async fn serve_metrics(State(state): State<AppState>) -> Response {
    metrics_response(&state.registry)
}

async fn serve_metrics_only(State(registry): State<SharedRegistry>) -> Response {
    metrics_response(&registry)
}

fn metrics_response(registry: &SharedRegistry) -> Response {
    (
        StatusCode::OK,
        [(
            CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        registry.encode(),
    )
        .into_response()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_both_formats() {
        let rfc = parse_time("2025-01-01T00:00:00Z").unwrap();
        let unix = parse_time("1735689600").unwrap();
        assert_eq!(rfc, unix);
        assert!(parse_time("yesterday").is_err());
        assert!(parse_time("").is_err());
    }

    #[test]
    fn parse_series_params_collects_repeated_matches() {
        let params = parse_series_params(
            "match[]=cpu%7BNamespace%3D%22test%22%7D&match[]=mem&start=0&end=100&limit=5",
        )
        .unwrap();
        assert_eq!(params.selectors.len(), 2);
        assert_eq!(params.limit, 5);
        assert_eq!(params.start.timestamp(), 0);
        assert_eq!(params.end.timestamp(), 100);
    }

    #[test]
    fn parse_series_params_requires_match() {
        assert!(parse_series_params("start=0&end=1").is_err());
    }

    #[test]
    fn parse_series_params_rejects_bad_selector_and_limit() {
        assert!(parse_series_params("match[]=%7Bbad&start=0&end=1").is_err());
        assert!(parse_series_params("match[]=cpu&start=0&end=1&limit=ten").is_err());
    }
}
