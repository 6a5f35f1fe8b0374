use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::metrics::ReservoirKind;
use crate::AppState;

/// Metric that every `/api/` request's latency is recorded into.
pub const REQUEST_LATENCY_METRIC: &str = "http.request_us";

/// Tower-compatible middleware that adds two response headers:
///
///   X-Response-Time-Us  — total handler wall time in microseconds
///   Server-Timing       — same value in the standard Server-Timing format
///
/// and records the latency (labelled with method and path) into the
/// `REQUEST_LATENCY_METRIC` HDR histogram, whatever the registry's default kind.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let start = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = start.elapsed();
    let us = elapsed.as_micros();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = us.to_string().parse() {
        response.headers_mut().insert("X-Response-Time-Us", val);
    }

    let server_timing = format!("total;dur={:.3}", elapsed.as_secs_f64() * 1000.0);
    if let Ok(val) = server_timing.parse() {
        response.headers_mut().insert("Server-Timing", val);
    }

    // Skip the SSE stream, whose "latency" is the connection lifetime
    if path.starts_with("/api/") && !path.ends_with("/stream") {
        let label = format!("{method} {path}");
        let value = i64::try_from(us).unwrap_or(i64::MAX);
        let recorded = state
            .metrics
            .histogram(REQUEST_LATENCY_METRIC, ReservoirKind::Hdr)
            .and_then(|latency| latency.update(value, Some(&label)));
        if let Err(e) = recorded {
            warn!(error = %e, "failed to record request latency");
        }

        debug!(
            status = response.status().as_u16(),
            %method,
            %path,
            us = value,
            "request"
        );
    }

    response
}
