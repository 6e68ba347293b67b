//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "dcut_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dcut_http_request_duration_seconds";

    // Reconciliation metrics
    pub const CALLBACKS_RECEIVED_TOTAL: &str = "dcut_callbacks_received_total";
    pub const STATUS_POLLS_TOTAL: &str = "dcut_status_polls_total";
    pub const FINALIZE_COMPLETED_TOTAL: &str = "dcut_finalize_completed_total";
    pub const FINALIZE_FAILED_TOTAL: &str = "dcut_finalize_failed_total";
    pub const EXTENSIONS_SUBMITTED_TOTAL: &str = "dcut_extensions_submitted_total";
    pub const ARCHIVED_BYTES_TOTAL: &str = "dcut_archived_bytes_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a received provider callback.
pub fn record_callback_received(outcome: &str) {
    counter!(names::CALLBACKS_RECEIVED_TOTAL, "outcome" => outcome.to_string()).increment(1);
}

/// Record a status poll.
pub fn record_status_poll(result: &str) {
    counter!(names::STATUS_POLLS_TOTAL, "result" => result.to_string()).increment(1);
}

/// Record a finalization outcome.
pub fn record_finalize(success: bool) {
    if success {
        counter!(names::FINALIZE_COMPLETED_TOTAL).increment(1);
    } else {
        counter!(names::FINALIZE_FAILED_TOTAL).increment(1);
    }
}

/// Record a submitted extension job.
pub fn record_extension_submitted() {
    counter!(names::EXTENSIONS_SUBMITTED_TOTAL).increment(1);
}

/// Record bytes archived to blob storage.
pub fn record_archived_bytes(bytes: u64) {
    counter!(names::ARCHIVED_BYTES_TOTAL).increment(bytes);
}

/// Collapse id segments so path labels stay low-cardinality.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() >= 16 || segment.chars().all(|c| c.is_ascii_digit()) && !segment.is_empty() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// HTTP metrics middleware.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
