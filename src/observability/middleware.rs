use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use crate::observability::Metrics;

/// Request-level observability middleware: wraps every request in a span and
/// records HTTP metrics keyed by a normalized endpoint label.
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let endpoint = normalize_endpoint(request.uri().path());
    let start = Instant::now();

    metrics.increment_in_flight(&method, &endpoint);

    let span = tracing::info_span!(
        "http_request",
        "http.method" = %method,
        "http.route" = %endpoint,
        "http.status_code" = tracing::field::Empty,
        "otel.kind" = "server",
    );

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    span.record("http.status_code", status);

    metrics.record_http_request(&method, &endpoint, status, start.elapsed().as_secs_f64());
    metrics.decrement_in_flight(&method, &endpoint);

    response
}

/// Collapse per-record paths into one endpoint label so metric cardinality
/// stays bounded.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/expenses" => path.to_string(),
        "/health/status" | "/metrics" => path.to_string(),
        p if p.starts_with("/expenses/") => "/expenses/:expense_id".to_string(),
        _ => "unknown".to_string(),
    }
}
