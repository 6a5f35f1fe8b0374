use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::warn;

use super::report::MetricsReport;
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Returns a single JSON report of every metric — useful for curl / debugging.

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsReport> {
    Json(state.metrics.report())
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events endpoint.
/// Pushes a full `MetricsReport` as JSON every `stream_interval_ms`.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_millis(state.config.stream_interval_ms));

    let stream = IntervalStream::new(interval).map(move |_| {
        let report = state.metrics.report();
        let json = serde_json::to_string(&report).unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize metrics report");
            String::new()
        });
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
