use std::sync::Arc;

use metrics_snapshot::config::Config;
use metrics_snapshot::{server, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ── 1. Logging ───────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── 2. Configuration ─────────────────────────────────────────
    let config = Config::from_env().unwrap_or_else(|e| {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    });
    info!(
        bind_addr = %config.bind_addr,
        default_kind = ?config.default_kind,
        reservoir_size = config.reservoir.size,
        "starting metrics snapshot server"
    );

    // ── 3. Build shared state ────────────────────────────────────
    let addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(config));

    // ── 4. Build Axum router ─────────────────────────────────────
    let app = server::create_router(state);

    // ── 5. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        });

    info!("Metrics JSON    → http://{addr}/api/metrics");
    info!("Metrics SSE     → http://{addr}/api/metrics/stream");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
