use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::metrics::stream;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Whole-registry views ────────────────────────────────
        .route("/api/metrics", get(stream::get_metrics))
        .route("/api/metrics/stream", get(stream::metrics_stream))
        .route("/api/metrics/reset", post(handlers::metrics::reset_metrics))
        // ── Single metric ───────────────────────────────────────
        .route(
            "/api/metrics/:name",
            get(handlers::metrics::get_metric).post(handlers::metrics::record_value),
        )
        .route("/api/metrics/:name/quantile", get(handlers::metrics::get_quantile))
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(state.clone(), timing::timing_middleware))
        .layer(CorsLayer::permissive())
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
}
