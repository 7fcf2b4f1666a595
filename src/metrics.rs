//! Prometheus metrics.
//!
//! Exposes:
//! - `insider_graph_command_duration_seconds` / `insider_graph_command_total` (CLI commands)
//! - `insider_graph_ingestion_runs_total` and `insider_graph_ingestion_run_duration_seconds`
//! - `insider_graph_articles_total` (per-article outcome)
//! - `insider_graph_qa_requests_total` and `insider_graph_qa_duration_seconds`
//! - `insider_graph_http_requests_total` (route and status)
//! - process metrics via `process` collector

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tracing::warn;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 50ms up to ~3 minutes.
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 14).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "insider_graph_command_duration_seconds",
        "CLI command duration in seconds",
        &["command"],
        buckets
    )
    .expect("failed to register command duration histogram")
});

static COMMAND_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insider_graph_command_total",
        "Total command executions by status",
        &["command", "status"]
    )
    .expect("failed to register command counter")
});

static COMMAND_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "insider_graph_command_inflight",
        "Number of in-flight commands",
        &["command"]
    )
    .expect("failed to register inflight gauge")
});

static INGESTION_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insider_graph_ingestion_runs_total",
        "Ingestion runs by status",
        &["status"]
    )
    .expect("failed to register ingestion run counter")
});

static INGESTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // One run is a handful of model calls: 0.5s up to ~17 minutes.
    let buckets =
        prometheus::exponential_buckets(0.5, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "insider_graph_ingestion_run_duration_seconds",
        "Ingestion run duration in seconds",
        &["status"],
        buckets
    )
    .expect("failed to register ingestion duration histogram")
});

static ARTICLES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insider_graph_articles_total",
        "Articles processed by outcome",
        &["outcome"]
    )
    .expect("failed to register article counter")
});

static QA_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insider_graph_qa_requests_total",
        "Questions answered by outcome",
        &["outcome"]
    )
    .expect("failed to register qa counter")
});

static QA_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets =
        prometheus::exponential_buckets(0.05, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "insider_graph_qa_duration_seconds",
        "Question answering latency in seconds",
        &["outcome"],
        buckets
    )
    .expect("failed to register qa duration histogram")
});

static HTTP_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insider_graph_http_requests_total",
        "HTTP requests by route and status code",
        &["route", "status"]
    )
    .expect("failed to register http counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&COMMAND_DURATION);
    Lazy::force(&COMMAND_TOTAL);
    Lazy::force(&COMMAND_INFLIGHT);
    Lazy::force(&INGESTION_RUNS);
    Lazy::force(&INGESTION_DURATION);
    Lazy::force(&ARTICLES);
    Lazy::force(&QA_REQUESTS);
    Lazy::force(&QA_DURATION);
    Lazy::force(&HTTP_REQUESTS);
}

/// Increment inflight gauge for a command.
pub fn record_command_start(command: &'static str) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).inc();
}

/// Record command completion with duration and status.
pub fn record_command_result(command: &'static str, duration: Duration, success: bool) {
    init_collectors();
    COMMAND_INFLIGHT.with_label_values(&[command]).dec();
    COMMAND_DURATION
        .with_label_values(&[command])
        .observe(duration.as_secs_f64());
    COMMAND_TOTAL
        .with_label_values(&[command, if success { "ok" } else { "error" }])
        .inc();
}

/// Record a finished ingestion run.
pub fn record_ingestion_run(duration: Duration, success: bool) {
    init_collectors();
    let status = if success { "ok" } else { "error" };
    INGESTION_RUNS.with_label_values(&[status]).inc();
    INGESTION_DURATION
        .with_label_values(&[status])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one article (`merged`, `skipped_extraction`, ...).
pub fn record_article(outcome: &str) {
    init_collectors();
    ARTICLES.with_label_values(&[outcome]).inc();
}

/// Record an answered (or failed) question.
pub fn record_qa(outcome: &str, duration: Duration) {
    init_collectors();
    QA_REQUESTS.with_label_values(&[outcome]).inc();
    QA_DURATION
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

/// Record an HTTP response.
pub fn record_http(route: &str, status: u16) {
    init_collectors();
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[route, status.as_str()])
        .inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn render() -> Result<(String, Vec<u8>), prometheus::Error> {
    init_collectors();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}
